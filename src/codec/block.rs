//! Fixed-destination block decompressors
//!
//! Used when the caller already knows the decoded size of a block (for example
//! from a block index) and owns the destination buffer.

use crate::archive::parse_gzip_strict;
use crate::error::CodecError;

use super::inflate::inflate_fixed;
use super::lz::lz_decode;
use super::CompressionType;

/// Decodes one compressed block into a caller-provided buffer
pub trait BlockDecompressor: Send + Sync {
    /// Decode `src` into `dst`, returning the number of bytes written.
    fn decompress_into(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError>;

    /// Codec name for diagnostics
    fn name(&self) -> &'static str;
}

/// Raw DEFLATE, optionally wrapped in a gzip member
#[derive(Debug, Clone, Copy, Default)]
pub struct InflateBlockDecompressor {
    gzip_header: bool,
}

impl InflateBlockDecompressor {
    pub fn raw() -> Self {
        Self { gzip_header: false }
    }

    pub fn gzip() -> Self {
        Self { gzip_header: true }
    }
}

impl BlockDecompressor for InflateBlockDecompressor {
    fn decompress_into(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
        if self.gzip_header {
            let member = parse_gzip_strict(src)?;
            inflate_fixed(member.payload, dst)
        } else {
            inflate_fixed(src, dst)
        }
    }

    fn name(&self) -> &'static str {
        if self.gzip_header {
            "gzip"
        } else {
            "deflate"
        }
    }
}

/// LZ (snappy raw) block decoder
#[derive(Debug, Clone, Copy, Default)]
pub struct LzBlockDecompressor;

impl BlockDecompressor for LzBlockDecompressor {
    fn decompress_into(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
        lz_decode(src, dst)
    }

    fn name(&self) -> &'static str {
        "snappy"
    }
}

/// Select the fixed-destination decompressor for a compression type.
///
/// # Errors
/// `CodecError::UnsupportedCompression` for types without a fixed-destination
/// decoder (containers that can only be decoded with growth, passthrough, and
/// detection).
pub fn block_decompressor(kind: CompressionType) -> Result<Box<dyn BlockDecompressor>, CodecError> {
    match kind {
        CompressionType::Gzip => Ok(Box::new(InflateBlockDecompressor::gzip())),
        CompressionType::Inflate => Ok(Box::new(InflateBlockDecompressor::raw())),
        CompressionType::Snappy => Ok(Box::new(LzBlockDecompressor)),
        other => Err(CodecError::UnsupportedCompression(format!(
            "no fixed-destination block decoder for '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{DeflateEncoder, GzEncoder};
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_factory_selection() {
        assert_eq!(block_decompressor(CompressionType::Gzip).unwrap().name(), "gzip");
        assert_eq!(block_decompressor(CompressionType::Inflate).unwrap().name(), "deflate");
        assert_eq!(block_decompressor(CompressionType::Snappy).unwrap().name(), "snappy");
        for kind in [
            CompressionType::Infer,
            CompressionType::None,
            CompressionType::Zip,
            CompressionType::Bzip2,
            CompressionType::Xz,
        ] {
            assert!(matches!(
                block_decompressor(kind),
                Err(CodecError::UnsupportedCompression(_))
            ));
        }
    }

    #[test]
    fn test_gzip_block_strips_header() {
        let original = b"block payload ".repeat(50);
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&original).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut dst = vec![0u8; original.len()];
        let written = InflateBlockDecompressor::gzip()
            .decompress_into(&compressed, &mut dst)
            .unwrap();
        assert_eq!(written, original.len());
        assert_eq!(dst, original);
    }

    #[test]
    fn test_raw_block_too_small() {
        let original = vec![7u8; 4096];
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&original).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut dst = vec![0u8; 1024];
        assert_eq!(
            InflateBlockDecompressor::raw().decompress_into(&compressed, &mut dst),
            Err(CodecError::BufferTooSmall { capacity: 1024 })
        );
    }

    #[test]
    fn test_lz_block() {
        let src = [0x08, 0x0C, b'a', b'b', b'c', b'd', 0x01, 0x04];
        let mut dst = [0u8; 8];
        assert_eq!(LzBlockDecompressor.decompress_into(&src, &mut dst).unwrap(), 8);
        assert_eq!(&dst, b"abcdabcd");
    }
}
