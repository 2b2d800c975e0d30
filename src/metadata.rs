//! The `metadata.json` descriptor: bounds, scale, per-archive attribute
//! list, hierarchy chunking parameters, and the optional Brotli encoding
//! flag.

use crate::attribute::AttributeDescriptor;
use crate::bounds::Bounds;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

pub const POTREE_VERSION: &str = "2.0";
pub const BROTLI_ENCODING: &str = "BROTLI";

/// `Metadata.hierarchy`: the parameters needed to start `parseHierarchy`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HierarchyMetadata {
    #[serde(rename = "stepSize")]
    pub step_size: u32,
    #[serde(rename = "firstChunkSize")]
    pub first_chunk_size: i64,
}

/// The JSON descriptor for an archive.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Metadata {
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<u64>,
    #[serde(rename = "pointsProcessed", default, skip_serializing_if = "Option::is_none")]
    pub points_processed: Option<u64>,
    #[serde(rename = "nodesProcessed", default, skip_serializing_if = "Option::is_none")]
    pub nodes_processed: Option<u64>,
    #[serde(rename = "durationMS", default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    #[serde(rename = "boundingBox")]
    pub bounding_box: Bounds,
    pub attributes: Vec<AttributeDescriptor>,
    #[serde(rename = "bytesPerPoint")]
    pub bytes_per_point: usize,
    pub scale: [f64; 3],

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spacing: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hierarchy: Option<HierarchyMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<String>,

    /// Fields this crate doesn't model directly, kept so a load-then-save
    /// round trip doesn't silently drop them.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Metadata {
    /// Builds a fresh descriptor for `attributes`, with `bytesPerPoint`
    /// derived from them and an identity scale.
    pub fn new(attributes: Vec<AttributeDescriptor>, bounding_box: Bounds) -> Self {
        let bytes_per_point = attributes.iter().map(|a| a.size).sum();
        Metadata {
            version: POTREE_VERSION.to_string(),
            points: None,
            points_processed: None,
            nodes_processed: None,
            duration_ms: None,
            bounding_box,
            attributes,
            bytes_per_point,
            scale: [1.0, 1.0, 1.0],
            offset: None,
            spacing: None,
            hierarchy: None,
            encoding: None,
            projection: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn is_brotli(&self) -> bool {
        self.encoding.as_deref() == Some(BROTLI_ENCODING)
    }

    pub fn set_brotli(&mut self, brotli: bool) {
        self.encoding = if brotli {
            Some(BROTLI_ENCODING.to_string())
        } else {
            None
        };
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::MetadataNotFound(path.to_path_buf()));
        }
        let file = File::open(path)?;
        let metadata = serde_json::from_reader(file)?;
        Ok(metadata)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).map_err(Error::MetadataParse)?;
        Ok(())
    }
}
