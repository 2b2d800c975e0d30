use thiserror::Error;

/// crate specific Result type
pub type Result<T> = std::result::Result<T, Error>;

/// crate specific Error enum
#[derive(Error, Debug)]
pub enum Error {
    /// `metadata.json` is missing from the archive directory
    #[error("metadata.json not found in {0}")]
    MetadataNotFound(std::path::PathBuf),

    /// `hierarchy.bin` is missing although `metadata.hierarchy` is set
    #[error("hierarchy.bin not found in {0}")]
    HierarchyNotFound(std::path::PathBuf),

    /// `octree.bin` is missing from the archive directory
    #[error("octree.bin not found in {0}")]
    PayloadNotFound(std::path::PathBuf),

    /// `metadata.json` could not be parsed, or is missing a required field
    #[error("failed to parse metadata: {0}")]
    MetadataParse(#[from] serde_json::Error),

    /// A hierarchy record read short, or a proxy pointed outside the file
    #[error("hierarchy.bin is truncated or a proxy points outside the file: {0}")]
    HierarchyShort(String),

    /// The payload range for a node exceeds the file, or decoded size mismatches
    #[error("octree.bin payload is short or mismatched: {0}")]
    PayloadShort(String),

    /// An attribute buffer's byte length is not a multiple of its descriptor size
    #[error("attribute buffer length {len} is not a multiple of descriptor size {size} for {name}")]
    AttributeMismatch {
        /// attribute name
        name: String,
        /// buffer length in bytes
        len: usize,
        /// descriptor size in bytes
        size: usize,
    },

    /// The Brotli codec failed to encode or decode a block
    #[error("brotli codec failure: {0}")]
    CodecFailure(String),

    /// `ArchiveOptions` were constructed with an invalid combination of fields
    #[error("invalid archive configuration: {0}")]
    InvalidConfiguration(String),

    /// [std::io::Error]
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
