//! Compressed container recognition
//!
//! Sniffs the binary layout of gzip, zip and bzip2 containers and extracts the
//! compressed payload span together with whatever metadata the container
//! declares (uncompressed size, CRC32, original file name).
//!
//! All header fields are read with explicit bounds-checked little-endian
//! readers at byte offsets; nothing is overlaid onto raw memory.

mod gzip;
mod zip;

use tracing::debug;

use crate::codec::CompressionType;
use crate::error::CodecError;

pub use gzip::{parse_gzip, parse_gzip_strict, GzipHeader};
pub use zip::{parse_zip, parse_zip_strict};

/// Kind of container a payload was extracted from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContainerKind {
    /// Headerless stream, the payload is the whole input
    #[default]
    Raw,
    Gzip,
    Zip,
    Bzip2,
}

impl ContainerKind {
    pub fn name(&self) -> &'static str {
        match self {
            ContainerKind::Raw => "raw",
            ContainerKind::Gzip => "gzip",
            ContainerKind::Zip => "zip",
            ContainerKind::Bzip2 => "bzip2",
        }
    }
}

impl std::fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A recognized container and the compressed payload it wraps.
///
/// The payload always lies within the input buffer the container was parsed
/// from; `payload_offset` is its position in that buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedContainer<'a> {
    /// Container format
    pub kind: ContainerKind,
    /// Compressed payload bytes
    pub payload: &'a [u8],
    /// Byte offset of `payload` within the input
    pub payload_offset: usize,
    /// Uncompressed size as declared by the container.
    ///
    /// For gzip this is the size modulo 2^32 and only usable as a capacity hint.
    pub declared_uncompressed_size: Option<u32>,
    /// CRC32 of the uncompressed data, when the container records one
    pub crc32: Option<u32>,
    /// Original file name (gzip FNAME or zip entry name)
    pub name: Option<&'a [u8]>,
    /// Gzip base header and optional fields
    pub gzip: Option<GzipHeader<'a>>,
}

impl<'a> CompressedContainer<'a> {
    /// Wrap a whole buffer as a container without framing metadata.
    pub fn raw(kind: ContainerKind, bytes: &'a [u8]) -> Self {
        Self {
            kind,
            payload: bytes,
            payload_offset: 0,
            declared_uncompressed_size: None,
            crc32: None,
            name: None,
            gzip: None,
        }
    }
}

/// Bzip2 stream signature preceding the block-size digit
const BZIP2_MAGIC: [u8; 3] = *b"BZh";

/// Detect a bzip2 stream header ("BZh" followed by a block size digit '1'..='9').
///
/// The whole buffer is returned as payload since bzip2 does not record the
/// uncompressed size.
pub fn detect_bzip2(bytes: &[u8]) -> Option<CompressedContainer<'_>> {
    if bytes.len() <= 4 || bytes[..3] != BZIP2_MAGIC {
        return None;
    }
    if !(b'1'..=b'9').contains(&bytes[3]) {
        return None;
    }
    Some(CompressedContainer::raw(ContainerKind::Bzip2, bytes))
}

/// Locate the container wrapping `bytes`.
///
/// With [`CompressionType::Infer`] the parsers are tried in order gzip, zip,
/// bzip2 and the first structural match wins. An explicit container hint goes
/// straight to the matching parser and reports why it rejected the input.
///
/// # Errors
/// - `CodecError::Format` if no parser recognizes the input
/// - any error of the strict gzip/zip parsers when a hint selects them
/// - `CodecError::UnsupportedCompression` if the hint is not a container format
pub fn detect_container(
    bytes: &[u8],
    hint: CompressionType,
) -> Result<CompressedContainer<'_>, CodecError> {
    let container = match hint {
        CompressionType::Infer => parse_gzip(bytes)
            .or_else(|| parse_zip(bytes))
            .or_else(|| detect_bzip2(bytes))
            .ok_or_else(|| {
                CodecError::Format("input is not a gzip, zip or bzip2 container".to_string())
            })?,
        CompressionType::Gzip => parse_gzip_strict(bytes)?,
        CompressionType::Zip => parse_zip_strict(bytes)?,
        CompressionType::Bzip2 => detect_bzip2(bytes).ok_or_else(|| {
            CodecError::Format("missing bzip2 'BZh1'..'BZh9' signature".to_string())
        })?,
        other => {
            return Err(CodecError::UnsupportedCompression(format!(
                "'{}' is not a container format",
                other
            )))
        }
    };

    debug!(
        kind = %container.kind,
        payload_offset = container.payload_offset,
        payload_len = container.payload.len(),
        declared_size = ?container.declared_uncompressed_size,
        "detected compressed container"
    );
    Ok(container)
}

// ============================================================================
// Little-endian field readers
// ============================================================================

#[inline]
pub(crate) fn read_u16_le(bytes: &[u8], offset: usize) -> Option<u16> {
    let field = bytes.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([field[0], field[1]]))
}

#[inline]
pub(crate) fn read_u32_le(bytes: &[u8], offset: usize) -> Option<u32> {
    let field = bytes.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([field[0], field[1], field[2], field[3]]))
}
