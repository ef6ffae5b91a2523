//! Decompression engine
//!
//! Turns a compressed input (optionally wrapped in a gzip, zip or bzip2
//! container) into an owned decompressed buffer. Container recognition lives
//! in [`crate::archive`]; this module picks the codec, seeds the destination
//! capacity and verifies container checksums.

mod block;
mod bz;
mod inflate;
mod lz;

use std::ops::Deref;

use bytes::Bytes;
use tracing::debug;

#[cfg(feature = "xz")]
use std::io::Read;
#[cfg(feature = "xz")]
use xz2::read::XzDecoder;

use crate::archive::{detect_container, ContainerKind};
use crate::error::CodecError;

pub use block::{
    block_decompressor, BlockDecompressor, InflateBlockDecompressor, LzBlockDecompressor,
};
pub use bz::block_codec_decompress;
pub use inflate::{inflate_fixed, inflate_grow};
pub use lz::{lz_decode, lz_decompress, lz_decompressed_len};

/// Default step by which a growing inflate destination is extended
pub const DEFAULT_GROWTH_INCREMENT: usize = 64 * 1024 * 1024;

/// Fixed margin added to the capacity guess when the uncompressed size is unknown
const CAPACITY_MARGIN: usize = 4096;

/// Upper bound on the DEFLATE expansion ratio; caps declared sizes used as hints
const DEFLATE_MAX_RATIO: usize = 1032;

/// Compression applied to an input buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionType {
    /// Sniff the container (gzip, then zip, then bzip2)
    #[default]
    Infer,
    /// Uncompressed; the input is copied through
    None,
    Gzip,
    Zip,
    Bzip2,
    /// XZ/LZMA stream
    Xz,
    /// Headerless raw DEFLATE stream
    Inflate,
    /// Headerless LZ (snappy raw) stream
    Snappy,
}

impl CompressionType {
    /// Parse a compression type from its name.
    ///
    /// # Examples
    /// ```
    /// use colingest::codec::CompressionType;
    ///
    /// assert_eq!(CompressionType::from_name("auto").unwrap(), CompressionType::Infer);
    /// assert_eq!(CompressionType::from_name("deflate").unwrap(), CompressionType::Inflate);
    /// assert!(CompressionType::from_name("lz4").is_err());
    /// ```
    pub fn from_name(name: &str) -> Result<Self, CodecError> {
        match name.to_ascii_lowercase().as_str() {
            "auto" | "infer" => Ok(CompressionType::Infer),
            "none" | "null" => Ok(CompressionType::None),
            "gzip" => Ok(CompressionType::Gzip),
            "zip" => Ok(CompressionType::Zip),
            "bzip2" => Ok(CompressionType::Bzip2),
            "xz" => Ok(CompressionType::Xz),
            "deflate" | "inflate" => Ok(CompressionType::Inflate),
            "snappy" => Ok(CompressionType::Snappy),
            unknown => Err(CodecError::UnsupportedCompression(format!(
                "Unknown compression '{}'. Supported: auto, none, gzip, zip, bzip2, xz, deflate, snappy",
                unknown
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CompressionType::Infer => "infer",
            CompressionType::None => "none",
            CompressionType::Gzip => "gzip",
            CompressionType::Zip => "zip",
            CompressionType::Bzip2 => "bzip2",
            CompressionType::Xz => "xz",
            CompressionType::Inflate => "deflate",
            CompressionType::Snappy => "snappy",
        }
    }

    /// Whether this type is handled by container recognition
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            CompressionType::Infer
                | CompressionType::Gzip
                | CompressionType::Zip
                | CompressionType::Bzip2
        )
    }
}

impl std::fmt::Display for CompressionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Tuning knobs for [`decompress_with_options`]
#[derive(Debug, Clone)]
pub struct DecompressOptions {
    /// Bytes added to a growing inflate destination each time it fills
    pub growth_increment: usize,
    /// Verify the container CRC32 against the decompressed output
    pub verify_checksum: bool,
}

impl Default for DecompressOptions {
    fn default() -> Self {
        Self {
            growth_increment: DEFAULT_GROWTH_INCREMENT,
            verify_checksum: true,
        }
    }
}

impl DecompressOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_growth_increment(mut self, bytes: usize) -> Self {
        self.growth_increment = bytes.max(1);
        self
    }

    pub fn with_verify_checksum(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }
}

/// Owned decompressed bytes and the container they were unpacked from.
///
/// Byte views produced by the row decoder borrow from this buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecompressedBuffer {
    data: Bytes,
    kind: ContainerKind,
}

impl DecompressedBuffer {
    pub fn new(data: impl Into<Bytes>, kind: ContainerKind) -> Self {
        Self {
            data: data.into(),
            kind,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Deref for DecompressedBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl AsRef<[u8]> for DecompressedBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

/// Decompress `src` with default options.
///
/// See [`decompress_with_options`].
pub fn decompress(src: &[u8], hint: CompressionType) -> Result<DecompressedBuffer, CodecError> {
    decompress_with_options(src, hint, &DecompressOptions::default())
}

/// Decompress `src` according to `hint`.
///
/// Container hints (including [`CompressionType::Infer`]) run container
/// recognition first. The destination is seeded from the declared uncompressed
/// size when the container records a non-zero one (bounded by what the payload
/// could possibly inflate to), otherwise at four times the
/// compressed size plus a fixed margin; the inflate and bzip2 paths grow past
/// that as needed.
///
/// # Errors
/// - `CodecError::Format` for empty input or an unrecognized container
/// - any container parser or codec error
/// - `CodecError::StreamCorruption` if a container CRC32 does not match
pub fn decompress_with_options(
    src: &[u8],
    hint: CompressionType,
    options: &DecompressOptions,
) -> Result<DecompressedBuffer, CodecError> {
    if src.is_empty() {
        return Err(CodecError::Format("empty input".to_string()));
    }

    let buffer = match hint {
        CompressionType::None => DecompressedBuffer::new(src.to_vec(), ContainerKind::Raw),
        CompressionType::Inflate => {
            let data = inflate_grow(src, estimate_capacity(src.len()), options.growth_increment)?;
            DecompressedBuffer::new(data, ContainerKind::Raw)
        }
        CompressionType::Snappy => DecompressedBuffer::new(lz_decompress(src)?, ContainerKind::Raw),
        CompressionType::Xz => DecompressedBuffer::new(decompress_xz(src)?, ContainerKind::Raw),
        CompressionType::Infer | CompressionType::Gzip | CompressionType::Zip | CompressionType::Bzip2 => {
            let container = detect_container(src, hint)?;
            let capacity = match container.declared_uncompressed_size {
                Some(size) if size > 0 => (size as usize).min(
                    container
                        .payload
                        .len()
                        .saturating_mul(DEFLATE_MAX_RATIO)
                        .saturating_add(CAPACITY_MARGIN),
                ),
                _ => estimate_capacity(container.payload.len()),
            };

            let data = match container.kind {
                ContainerKind::Gzip | ContainerKind::Zip => {
                    let data = inflate_grow(container.payload, capacity, options.growth_increment)?;
                    if options.verify_checksum {
                        if let Some(expected) = container.crc32 {
                            verify_crc32(&data, expected, container.kind)?;
                        }
                    }
                    data
                }
                ContainerKind::Bzip2 => block_codec_decompress(container.payload, capacity)?,
                ContainerKind::Raw => container.payload.to_vec(),
            };
            DecompressedBuffer::new(data, container.kind)
        }
    };

    debug!(
        compression = %hint,
        container = %buffer.kind(),
        compressed_len = src.len(),
        decompressed_len = buffer.len(),
        "decompressed input"
    );
    Ok(buffer)
}

/// Capacity guess for a stream whose uncompressed size is unknown
fn estimate_capacity(compressed_len: usize) -> usize {
    compressed_len
        .saturating_mul(4)
        .saturating_add(CAPACITY_MARGIN)
}

fn verify_crc32(data: &[u8], expected: u32, kind: ContainerKind) -> Result<(), CodecError> {
    let actual = crc32fast::hash(data);
    if actual != expected {
        return Err(CodecError::StreamCorruption(format!(
            "{} CRC32 mismatch: expected 0x{:08X}, got 0x{:08X}",
            kind, expected, actual
        )));
    }
    Ok(())
}

#[cfg(feature = "xz")]
fn decompress_xz(src: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut decoder = XzDecoder::new(src);
    let mut decompressed = Vec::with_capacity(estimate_capacity(src.len()));
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| CodecError::StreamCorruption(format!("Xz decompression failed: {}", e)))?;
    Ok(decompressed)
}

#[cfg(not(feature = "xz"))]
fn decompress_xz(_src: &[u8]) -> Result<Vec<u8>, CodecError> {
    Err(CodecError::UnsupportedCompression(
        "Xz support not enabled. Enable the 'xz' feature.".to_string(),
    ))
}
