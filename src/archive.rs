//! The top-level controller: orchestrates `Load` (metadata -> hierarchy
//! -> payload unpack) and `Save` (payload assembly -> hierarchy layout ->
//! metadata) over the three files that make up an archive directory.

use crate::attribute::AttributeBuffer;
use crate::attribute::AttributeDescriptor;
use crate::bounds::Bounds;
use crate::error::{Error, Result};
use crate::hierarchy;
use crate::metadata::{HierarchyMetadata, Metadata};
use crate::node::{Node, NodeKind, NodeTree, ROOT_NAME};
use crate::payload;
use std::collections::HashMap;
use std::fs::File;
use std::io::Seek;
use std::path::{Path, PathBuf};

/// Default depth per hierarchy chunk.
pub const DEFAULT_STEP_SIZE: u32 = 4;
/// A conservative default Brotli quality; the wire format treats Brotli
/// as a black box and places no constraint on this knob.
pub const DEFAULT_BROTLI_QUALITY: u32 = 9;

/// Tuning knobs for `Archive::save`, passed explicitly at construction
/// time rather than read from the environment.
#[derive(Clone, Copy, Debug)]
pub struct ArchiveOptions {
    pub step_size: u32,
    pub brotli: bool,
    pub brotli_quality: u32,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        ArchiveOptions {
            step_size: DEFAULT_STEP_SIZE,
            brotli: false,
            brotli_quality: DEFAULT_BROTLI_QUALITY,
        }
    }
}

impl ArchiveOptions {
    pub fn validate(&self) -> Result<()> {
        if self.step_size == 0 {
            return Err(Error::InvalidConfiguration(
                "step_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// An in-memory octree archive: the node tree, its decoded per-node
/// attribute buffers, the JSON descriptor, and the options that govern
/// how it will be laid out on save.
pub struct Archive {
    pub path: PathBuf,
    pub tree: NodeTree,
    pub metadata: Metadata,
    pub options: ArchiveOptions,
    pub node_buffers: HashMap<String, Vec<AttributeBuffer>>,
}

impl Archive {
    /// Starts a fresh, empty archive rooted at a single leaf node.
    pub fn new(
        path: impl Into<PathBuf>,
        attributes: Vec<AttributeDescriptor>,
        bounding_box: Bounds,
        options: ArchiveOptions,
    ) -> Result<Self> {
        options.validate()?;
        let mut tree = NodeTree::new();
        let mut root = Node::new(ROOT_NAME, NodeKind::Leaf);
        root.attr_start = 0;
        root.attr_end = attributes.len();
        tree.insert(root);
        let metadata = Metadata::new(attributes, bounding_box);
        Ok(Archive {
            path: path.into(),
            tree,
            metadata,
            options,
            node_buffers: HashMap::new(),
        })
    }

    /// Replaces a node's point count and attribute buffers, inserting it
    /// into the tree if it isn't already present.
    pub fn set_node(&mut self, node: Node, buffers: Vec<AttributeBuffer>) {
        self.node_buffers.insert(node.name.clone(), buffers);
        self.tree.insert(node);
    }

    /// Loads a complete archive (metadata, hierarchy, and every node's
    /// payload) from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        log::info!("loading archive at {}", path.display());

        let metadata_path = path.join("metadata.json");
        let metadata = Metadata::load(&metadata_path)?;
        let brotli = metadata.is_brotli();

        let mut tree = NodeTree::new();
        let step_size = match &metadata.hierarchy {
            Some(h) => {
                let hierarchy_path = path.join("hierarchy.bin");
                if !hierarchy_path.is_file() {
                    return Err(Error::HierarchyNotFound(hierarchy_path));
                }
                let mut hierarchy_file = File::open(&hierarchy_path)?;
                log::debug!(
                    "loading hierarchy chunk at offset 0, {} bytes",
                    h.first_chunk_size
                );
                tree = hierarchy::parse_hierarchy(&mut hierarchy_file, h.first_chunk_size, h.step_size)?;
                h.step_size
            }
            None => {
                tree.insert(Node::new(ROOT_NAME, NodeKind::Leaf));
                DEFAULT_STEP_SIZE
            }
        };

        // the on-disk node record carries no attribute range; every node
        // covers the archive's full attribute list.
        let attr_end = metadata.attributes.len();
        for node in tree.nodes.values_mut() {
            node.attr_start = 0;
            node.attr_end = attr_end;
        }

        let octree_path = path.join("octree.bin");
        if !octree_path.is_file() {
            return Err(Error::PayloadNotFound(octree_path));
        }
        let mut octree_file = File::open(&octree_path)?;

        let mut node_buffers = HashMap::with_capacity(tree.len());
        let names: Vec<String> = tree.nodes.keys().cloned().collect();
        for name in names {
            let node = tree.get(&name).expect("name came from this tree");
            if node.byte_size == 0 {
                node_buffers.insert(name, Vec::new());
                continue;
            }
            let raw = payload::read_node_block(&mut octree_file, node.byte_offset, node.byte_size)?;
            if log::log_enabled!(log::Level::Trace) {
                log::trace!(
                    "decoding node {name}: {} encoded bytes, {} points",
                    raw.len(),
                    node.num_points
                );
            }
            let buffers = payload::unpack_node_payload(
                &raw,
                &metadata.attributes,
                node.attr_start,
                node.attr_end,
                node.num_points,
                brotli,
            )?;
            node_buffers.insert(name, buffers);
        }

        log::info!(
            "loaded archive at {} with {} nodes",
            path.display(),
            tree.len()
        );

        Ok(Archive {
            path,
            tree,
            metadata,
            options: ArchiveOptions {
                step_size,
                brotli,
                brotli_quality: DEFAULT_BROTLI_QUALITY,
            },
            node_buffers,
        })
    }

    /// Writes the payload, hierarchy, and metadata files, in that order,
    /// to `self.path`.
    pub fn save(&mut self) -> Result<()> {
        self.options.validate()?;
        std::fs::create_dir_all(&self.path)?;
        log::info!("saving archive to {}", self.path.display());

        let order = self.tree.preorder(ROOT_NAME);
        let mut total_points: u64 = 0;
        {
            let octree_path = self.path.join("octree.bin");
            let mut octree_file = File::create(&octree_path)?;
            for name in &order {
                let buffers = self.node_buffers.get(name).cloned().unwrap_or_default();
                let block = payload::pack_node_payload(
                    &buffers,
                    self.options.brotli,
                    self.options.brotli_quality,
                )?;
                let offset = octree_file.stream_position()? as i64;
                payload::write_node_block(&mut octree_file, &block)?;

                let node = self
                    .tree
                    .get_mut(name)
                    .expect("name came from this tree's own traversal");
                node.byte_offset = offset;
                node.byte_size = block.len() as i64;
                total_points += node.num_points as u64;
            }
        }

        if total_points == 0 {
            log::warn!("saving archive with zero points at {}", self.path.display());
        }

        let chunks = hierarchy::create_chunks(&self.tree, ROOT_NAME, self.options.step_size);
        let hierarchy_bytes = hierarchy::write_hierarchy(&self.tree, &chunks, self.options.step_size)?;
        std::fs::write(self.path.join("hierarchy.bin"), &hierarchy_bytes)?;

        self.metadata.hierarchy = Some(HierarchyMetadata {
            step_size: self.options.step_size,
            first_chunk_size: chunks[0].byte_len(),
        });
        self.metadata.set_brotli(self.options.brotli);
        self.metadata.points = Some(total_points);
        self.metadata.save(&self.path.join("metadata.json"))?;

        log::info!(
            "saved archive to {} with {} chunks, {} bytes of hierarchy",
            self.path.display(),
            chunks.len(),
            hierarchy_bytes.len()
        );
        Ok(())
    }
}
