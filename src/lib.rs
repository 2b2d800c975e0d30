//! Reader and writer for chunked octree point cloud archives: a JSON
//! metadata descriptor plus a chunked hierarchy file and a payload file,
//! in the vein of [Potree](https://potree.org/)'s 2.0 octree format.
//!
//! Usage example:
//! ```no_run
//! use octree_archive::Archive;
//!
//! fn main() -> octree_archive::Result<()> {
//!     let archive = Archive::load("example-archive")?;
//!     for (name, node) in &archive.tree.nodes {
//!         println!("{name}: {} points", node.num_points);
//!     }
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod attribute;
pub mod bounds;
mod brotli_codec;
pub mod error;
pub mod hierarchy;
pub mod metadata;
pub mod node;
pub mod morton;
pub mod payload;

pub use archive::{Archive, ArchiveOptions};
pub use attribute::{AttributeBuffer, AttributeDescriptor, AttributeKind, AttributeValue};
pub use bounds::Bounds;
pub use error::{Error, Result};
pub use metadata::Metadata;
pub use node::{Node, NodeKind, NodeTree};
