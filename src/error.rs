//! Error types for container parsing, decompression and schema setup

use thiserror::Error;

/// Errors that can occur while unpacking a compressed container.
///
/// The row decoder never produces these: corrupted rows degrade to
/// zero/null outputs instead of failing the decode pass.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Container signature or structure not recognized
    #[error("Unrecognized format: {0}")]
    Format(String),
    /// A declared field extends past the end of the buffer
    #[error("Truncated input: {0}")]
    TruncatedInput(String),
    /// Fixed-capacity destination cannot hold the decoded stream
    #[error("Destination buffer too small: capacity of {capacity} bytes exhausted")]
    BufferTooSmall { capacity: usize },
    /// Codec-level decode failure in the middle of a stream
    #[error("Stream corruption: {0}")]
    StreamCorruption(String),
    /// Recognized container carrying an unsupported inner method
    #[error("Unsupported compression: {0}")]
    UnsupportedCompression(String),
}

/// Errors that can occur when building a schema descriptor or preparing a decode pass
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The flattened schema violates a structural invariant
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
    /// Output columns do not match the schema they are decoded from
    #[error("Column mismatch: {0}")]
    ColumnMismatch(String),
}
