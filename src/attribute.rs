//! Per-point attribute descriptors and the typed buffers that hold
//! their decoded values, plus the pack/unpack codec (including the
//! Morton-interleaved substitution used for positions and colors when
//! Brotli compression is active, see [`AttributeBuffer::pack`]).

use crate::error::{Error, Result};
use crate::morton::{dealign24b, encode3};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// The element type of an attribute, fixed for the lifetime of the descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    Undefined,
}

impl AttributeKind {
    /// Byte width of one element of this kind (0 for `Undefined`).
    pub fn width(self) -> usize {
        match self {
            AttributeKind::Int8 | AttributeKind::Uint8 => 1,
            AttributeKind::Int16 | AttributeKind::Uint16 => 2,
            AttributeKind::Int32 | AttributeKind::Uint32 | AttributeKind::Float32 => 4,
            AttributeKind::Int64 | AttributeKind::Uint64 | AttributeKind::Float64 => 8,
            AttributeKind::Undefined => 0,
        }
    }

    /// Name used in `metadata.json`'s `attributes[].type` field.
    pub fn wire_name(self) -> &'static str {
        match self {
            AttributeKind::Int8 => "int8",
            AttributeKind::Int16 => "int16",
            AttributeKind::Int32 => "int32",
            AttributeKind::Int64 => "int64",
            AttributeKind::Uint8 => "uint8",
            AttributeKind::Uint16 => "uint16",
            AttributeKind::Uint32 => "uint32",
            AttributeKind::Uint64 => "uint64",
            AttributeKind::Float32 => "float",
            AttributeKind::Float64 => "double",
            AttributeKind::Undefined => "undefined",
        }
    }

    /// Parses the wire name back into a kind; unknown names become `Undefined`.
    pub fn from_wire_name(name: &str) -> Self {
        match name {
            "int8" => AttributeKind::Int8,
            "int16" => AttributeKind::Int16,
            "int32" => AttributeKind::Int32,
            "int64" => AttributeKind::Int64,
            "uint8" => AttributeKind::Uint8,
            "uint16" => AttributeKind::Uint16,
            "uint32" => AttributeKind::Uint32,
            "uint64" => AttributeKind::Uint64,
            "float" => AttributeKind::Float32,
            "double" => AttributeKind::Float64,
            _ => AttributeKind::Undefined,
        }
    }
}

impl Serialize for AttributeKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.wire_name())
    }
}

impl<'de> Deserialize<'de> for AttributeKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(AttributeKind::from_wire_name(&s))
    }
}

/// A named per-point field with a fixed type and arity.
///
/// Invariant: `size == num_elements * element_size` and `element_size ==
/// kind.width()`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub size: usize,
    #[serde(rename = "numElements")]
    pub num_elements: usize,
    #[serde(rename = "elementSize")]
    pub element_size: usize,
    #[serde(rename = "type")]
    pub kind: AttributeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Vec<f64>>,
}

impl AttributeDescriptor {
    /// Builds a descriptor, computing `size` and `element_size` from `kind`.
    pub fn new(name: impl Into<String>, kind: AttributeKind, num_elements: usize) -> Self {
        let element_size = kind.width();
        AttributeDescriptor {
            name: name.into(),
            description: None,
            size: num_elements * element_size,
            num_elements,
            element_size,
            kind,
            min: None,
            max: None,
        }
    }
}

/// Canonical attribute registry: the descriptors known ahead of time by
/// name, matching the fixed set an ingest pipeline draws from.
pub mod registry {
    use super::{AttributeDescriptor, AttributeKind};

    pub fn position() -> AttributeDescriptor {
        AttributeDescriptor::new("position", AttributeKind::Int32, 3)
    }
    pub fn rgb() -> AttributeDescriptor {
        AttributeDescriptor::new("rgb", AttributeKind::Uint16, 3)
    }
    pub fn intensity() -> AttributeDescriptor {
        AttributeDescriptor::new("intensity", AttributeKind::Uint16, 1)
    }
    pub fn classification() -> AttributeDescriptor {
        AttributeDescriptor::new("classification", AttributeKind::Uint8, 1)
    }
    pub fn return_number() -> AttributeDescriptor {
        AttributeDescriptor::new("return number", AttributeKind::Uint8, 1)
    }
    pub fn number_of_returns() -> AttributeDescriptor {
        AttributeDescriptor::new("number of returns", AttributeKind::Uint8, 1)
    }
    pub fn point_source_id() -> AttributeDescriptor {
        AttributeDescriptor::new("point source id", AttributeKind::Uint16, 1)
    }
    pub fn gps_time() -> AttributeDescriptor {
        AttributeDescriptor::new("gps-time", AttributeKind::Float64, 1)
    }
    pub fn normal() -> AttributeDescriptor {
        AttributeDescriptor::new("normal", AttributeKind::Float32, 3)
    }
    pub fn scan_angle() -> AttributeDescriptor {
        AttributeDescriptor::new("scan angle", AttributeKind::Int16, 1)
    }
    pub fn user_data() -> AttributeDescriptor {
        AttributeDescriptor::new("user data", AttributeKind::Uint8, 1)
    }
    pub fn classification_flags() -> AttributeDescriptor {
        AttributeDescriptor::new("classification flags", AttributeKind::Uint8, 1)
    }
}

/// One tuple's worth of component values for a single point.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue {
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Uint8(Vec<u8>),
    Uint16(Vec<u16>),
    Uint32(Vec<u32>),
    Uint64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

/// A decoded, typed attribute array bound to its descriptor.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeBuffer {
    pub descriptor: AttributeDescriptor,
    /// Flattened, per-point tuples: `values.len() == descriptor.num_elements * point_count`.
    pub values: AttributeValue,
}

impl AttributeBuffer {
    /// Number of points (tuples) held by this buffer.
    pub fn point_count(&self) -> usize {
        let n = match &self.values {
            AttributeValue::Int8(v) => v.len(),
            AttributeValue::Int16(v) => v.len(),
            AttributeValue::Int32(v) => v.len(),
            AttributeValue::Int64(v) => v.len(),
            AttributeValue::Uint8(v) => v.len(),
            AttributeValue::Uint16(v) => v.len(),
            AttributeValue::Uint32(v) => v.len(),
            AttributeValue::Uint64(v) => v.len(),
            AttributeValue::Float32(v) => v.len(),
            AttributeValue::Float64(v) => v.len(),
        };
        if self.descriptor.num_elements == 0 {
            0
        } else {
            n / self.descriptor.num_elements
        }
    }

    /// Packs this buffer into its interleaved little-endian byte form.
    ///
    /// When `brotli` is true and the descriptor is `position` or `rgb`,
    /// substitutes the Morton-interleaved form and rewrites the returned
    /// descriptor accordingly (see module docs).
    pub fn pack(&self, brotli: bool) -> Result<(AttributeDescriptor, Vec<u8>)> {
        if brotli && self.descriptor.name == "position" {
            return self.pack_position_morton();
        }
        if brotli && self.descriptor.name == "rgb" {
            return self.pack_rgb_morton();
        }
        Ok((self.descriptor.clone(), pack_plain(&self.values)?))
    }

    fn pack_position_morton(&self) -> Result<(AttributeDescriptor, Vec<u8>)> {
        let AttributeValue::Int32(values) = &self.values else {
            return Ok((self.descriptor.clone(), pack_plain(&self.values)?));
        };
        let n = self.point_count();
        let mut min = [i32::MAX; 3];
        for p in 0..n {
            for axis in 0..3 {
                let v = values[p * 3 + axis];
                if v < min[axis] {
                    min[axis] = v;
                }
            }
        }
        if n == 0 {
            min = [0; 3];
        }

        let mut out = Vec::with_capacity(n * 16);
        for p in 0..n {
            let shifted: [u32; 3] = [
                (values[p * 3] - min[0]) as u32,
                (values[p * 3 + 1] - min[1]) as u32,
                (values[p * 3 + 2] - min[2]) as u32,
            ];
            let low: [u32; 3] = [shifted[0] & 0xffff, shifted[1] & 0xffff, shifted[2] & 0xffff];
            let high: [u32; 3] = [shifted[0] >> 16, shifted[1] >> 16, shifted[2] >> 16];
            let mc_l = encode3(low[0], low[1], low[2]);
            let mc_h = encode3(high[0], high[1], high[2]);
            out.write_u64::<LittleEndian>(mc_h)?;
            out.write_u64::<LittleEndian>(mc_l)?;
        }

        let descriptor = AttributeDescriptor::new("position_morton", AttributeKind::Uint64, 2);
        Ok((descriptor, out))
    }

    fn pack_rgb_morton(&self) -> Result<(AttributeDescriptor, Vec<u8>)> {
        let AttributeValue::Uint16(values) = &self.values else {
            return Ok((self.descriptor.clone(), pack_plain(&self.values)?));
        };
        let n = self.point_count();
        let mut out = Vec::with_capacity(n * 8);
        for p in 0..n {
            let r = values[p * 3] as u32;
            let g = values[p * 3 + 1] as u32;
            let b = values[p * 3 + 2] as u32;
            out.write_u64::<LittleEndian>(encode3(r, g, b))?;
        }
        let descriptor = AttributeDescriptor::new("rgb_morton", AttributeKind::Uint64, 1);
        Ok((descriptor, out))
    }

    /// Unpacks `bytes` according to `descriptor`, reversing the Morton
    /// substitution (and restoring the original descriptor name/kind) when
    /// `brotli` is true and the descriptor names a Morton form.
    pub fn unpack(descriptor: &AttributeDescriptor, bytes: &[u8], brotli: bool) -> Result<Self> {
        if brotli && descriptor.name == "position_morton" {
            return unpack_position_morton(bytes);
        }
        if brotli && descriptor.name == "rgb_morton" {
            return unpack_rgb_morton(bytes);
        }
        if descriptor.size == 0 || bytes.len() % descriptor.size != 0 {
            return Err(Error::AttributeMismatch {
                name: descriptor.name.clone(),
                len: bytes.len(),
                size: descriptor.size,
            });
        }
        let values = unpack_plain(descriptor, bytes)?;
        Ok(AttributeBuffer {
            descriptor: descriptor.clone(),
            values,
        })
    }
}

/// Recovers a single axis' 16-bit half (low or high) from a 48-bit
/// tri-interleaved Morton code: each 24-bit chunk of the code yields one
/// byte of the lane via [`dealign24b`], and the two bytes recombine into
/// the original 16-bit value.
fn decode_lane16(code: u64, lane: u32) -> u32 {
    let chunk0 = (code & 0xffffff) as u32;
    let chunk1 = ((code >> 24) & 0xffffff) as u32;
    let lo = dealign24b(chunk0 >> lane) & 0xff;
    let hi = dealign24b(chunk1 >> lane) & 0xff;
    lo | (hi << 8)
}

fn unpack_position_morton(bytes: &[u8]) -> Result<AttributeBuffer> {
    // 16 bytes per point: [mc_h: u64][mc_l: u64]
    if bytes.len() % 16 != 0 {
        return Err(Error::AttributeMismatch {
            name: "position_morton".to_string(),
            len: bytes.len(),
            size: 16,
        });
    }
    let n = bytes.len() / 16;
    let mut cursor = Cursor::new(bytes);
    let mut values = Vec::with_capacity(n * 3);
    for _ in 0..n {
        let mc_h = cursor.read_u64::<LittleEndian>()?;
        let mc_l = cursor.read_u64::<LittleEndian>()?;
        for lane in 0..3u32 {
            let low16 = decode_lane16(mc_l, lane);
            let high16 = decode_lane16(mc_h, lane);
            values.push(((high16 << 16) | low16) as i32);
        }
    }
    Ok(AttributeBuffer {
        descriptor: registry::position(),
        values: AttributeValue::Int32(values),
    })
}

fn unpack_rgb_morton(bytes: &[u8]) -> Result<AttributeBuffer> {
    if bytes.len() % 8 != 0 {
        return Err(Error::AttributeMismatch {
            name: "rgb_morton".to_string(),
            len: bytes.len(),
            size: 8,
        });
    }
    let n = bytes.len() / 8;
    let mut cursor = Cursor::new(bytes);
    let mut values = Vec::with_capacity(n * 3);
    for _ in 0..n {
        let code = cursor.read_u64::<LittleEndian>()?;
        values.push(decode_lane16(code, 0) as u16);
        values.push(decode_lane16(code, 1) as u16);
        values.push(decode_lane16(code, 2) as u16);
    }
    Ok(AttributeBuffer {
        descriptor: registry::rgb(),
        values: AttributeValue::Uint16(values),
    })
}

fn pack_plain(values: &AttributeValue) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    match values {
        AttributeValue::Int8(v) => {
            for &x in v {
                out.write_i8(x)?;
            }
        }
        AttributeValue::Int16(v) => {
            for &x in v {
                out.write_i16::<LittleEndian>(x)?;
            }
        }
        AttributeValue::Int32(v) => {
            for &x in v {
                out.write_i32::<LittleEndian>(x)?;
            }
        }
        AttributeValue::Int64(v) => {
            for &x in v {
                out.write_i64::<LittleEndian>(x)?;
            }
        }
        AttributeValue::Uint8(v) => out.extend_from_slice(v),
        AttributeValue::Uint16(v) => {
            for &x in v {
                out.write_u16::<LittleEndian>(x)?;
            }
        }
        AttributeValue::Uint32(v) => {
            for &x in v {
                out.write_u32::<LittleEndian>(x)?;
            }
        }
        AttributeValue::Uint64(v) => {
            for &x in v {
                out.write_u64::<LittleEndian>(x)?;
            }
        }
        AttributeValue::Float32(v) => {
            for &x in v {
                out.write_f32::<LittleEndian>(x)?;
            }
        }
        AttributeValue::Float64(v) => {
            for &x in v {
                out.write_f64::<LittleEndian>(x)?;
            }
        }
    }
    Ok(out)
}

fn unpack_plain(descriptor: &AttributeDescriptor, bytes: &[u8]) -> Result<AttributeValue> {
    let mut cursor = Cursor::new(bytes);
    let count = bytes.len() / descriptor.element_size.max(1);
    Ok(match descriptor.kind {
        AttributeKind::Int8 => {
            let mut v = Vec::with_capacity(count);
            for _ in 0..count {
                v.push(cursor.read_i8()?);
            }
            AttributeValue::Int8(v)
        }
        AttributeKind::Int16 => {
            let mut v = Vec::with_capacity(count);
            for _ in 0..count {
                v.push(cursor.read_i16::<LittleEndian>()?);
            }
            AttributeValue::Int16(v)
        }
        AttributeKind::Int32 => {
            let mut v = Vec::with_capacity(count);
            for _ in 0..count {
                v.push(cursor.read_i32::<LittleEndian>()?);
            }
            AttributeValue::Int32(v)
        }
        AttributeKind::Int64 => {
            let mut v = Vec::with_capacity(count);
            for _ in 0..count {
                v.push(cursor.read_i64::<LittleEndian>()?);
            }
            AttributeValue::Int64(v)
        }
        AttributeKind::Uint8 => AttributeValue::Uint8(bytes.to_vec()),
        AttributeKind::Uint16 => {
            let mut v = Vec::with_capacity(count);
            for _ in 0..count {
                v.push(cursor.read_u16::<LittleEndian>()?);
            }
            AttributeValue::Uint16(v)
        }
        AttributeKind::Uint32 => {
            let mut v = Vec::with_capacity(count);
            for _ in 0..count {
                v.push(cursor.read_u32::<LittleEndian>()?);
            }
            AttributeValue::Uint32(v)
        }
        AttributeKind::Uint64 => {
            let mut v = Vec::with_capacity(count);
            for _ in 0..count {
                v.push(cursor.read_u64::<LittleEndian>()?);
            }
            AttributeValue::Uint64(v)
        }
        AttributeKind::Float32 => {
            let mut v = Vec::with_capacity(count);
            for _ in 0..count {
                v.push(cursor.read_f32::<LittleEndian>()?);
            }
            AttributeValue::Float32(v)
        }
        AttributeKind::Float64 => {
            let mut v = Vec::with_capacity(count);
            for _ in 0..count {
                v.push(cursor.read_f64::<LittleEndian>()?);
            }
            AttributeValue::Float64(v)
        }
        AttributeKind::Undefined => AttributeValue::Uint8(bytes.to_vec()),
    })
}
