//! Reads and writes a node's attribute payload block: the concatenation
//! of every attribute buffer the node covers (`attrStart..attrEnd`),
//! optionally wrapped in a single Brotli frame.

use crate::attribute::{AttributeBuffer, AttributeDescriptor, AttributeKind};
use crate::brotli_codec;
use crate::error::{Error, Result};
use std::io::{Read, Seek, SeekFrom, Write};

/// Packs `buffers` (already in `attrStart..attrEnd` order) into one block,
/// Brotli-compressing the whole block when `brotli` is set.
pub fn pack_node_payload(
    buffers: &[AttributeBuffer],
    brotli: bool,
    brotli_quality: u32,
) -> Result<Vec<u8>> {
    let mut raw = Vec::new();
    for buffer in buffers {
        let (_, bytes) = buffer.pack(brotli)?;
        raw.extend_from_slice(&bytes);
    }
    if brotli {
        brotli_codec::encode(&raw, brotli_quality)
    } else {
        Ok(raw)
    }
}

/// Inverse of [`pack_node_payload`]: splits the (possibly Brotli-decoded)
/// block back into one buffer per descriptor in `attributes[attr_start..attr_end]`.
pub fn unpack_node_payload(
    raw_block: &[u8],
    attributes: &[AttributeDescriptor],
    attr_start: usize,
    attr_end: usize,
    num_points: u32,
    brotli: bool,
) -> Result<Vec<AttributeBuffer>> {
    let decoded = if brotli {
        brotli_codec::decode(raw_block)?
    } else {
        raw_block.to_vec()
    };

    let mut cursor = 0usize;
    let mut out = Vec::with_capacity(attr_end.saturating_sub(attr_start));
    for descriptor in &attributes[attr_start..attr_end] {
        let wire = wire_descriptor(descriptor, brotli);
        let take = wire.size * num_points as usize;
        if cursor + take > decoded.len() {
            return Err(Error::PayloadShort(format!(
                "attribute {} needs {take} bytes at offset {cursor} but block is {} bytes",
                descriptor.name,
                decoded.len()
            )));
        }
        let slice = &decoded[cursor..cursor + take];
        out.push(AttributeBuffer::unpack(&wire, slice, brotli)?);
        cursor += take;
    }
    if cursor != decoded.len() {
        return Err(Error::PayloadShort(format!(
            "decoded block is {} bytes but attributes only account for {cursor}",
            decoded.len()
        )));
    }
    Ok(out)
}

/// The descriptor shape an attribute actually takes on the wire: the
/// Morton-substituted form for `position`/`rgb` when `brotli` is set,
/// the canonical descriptor otherwise.
fn wire_descriptor(canonical: &AttributeDescriptor, brotli: bool) -> AttributeDescriptor {
    if brotli && canonical.name == "position" {
        AttributeDescriptor::new("position_morton", AttributeKind::Uint64, 2)
    } else if brotli && canonical.name == "rgb" {
        AttributeDescriptor::new("rgb_morton", AttributeKind::Uint64, 1)
    } else {
        canonical.clone()
    }
}

/// Reads exactly `byte_size` bytes at `byte_offset` from an open payload file.
pub fn read_node_block<R: Read + Seek>(
    file: &mut R,
    byte_offset: i64,
    byte_size: i64,
) -> Result<Vec<u8>> {
    file.seek(SeekFrom::Start(byte_offset as u64))?;
    let mut buf = vec![0u8; byte_size.max(0) as usize];
    file.read_exact(&mut buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::PayloadShort(format!(
                "expected {byte_size} bytes at offset {byte_offset}, file ended early"
            ))
        } else {
            Error::Io(e)
        }
    })?;
    Ok(buf)
}

/// Appends `block` to an open payload file at its current position.
pub fn write_node_block<W: Write>(file: &mut W, block: &[u8]) -> Result<()> {
    file.write_all(block)?;
    Ok(())
}
