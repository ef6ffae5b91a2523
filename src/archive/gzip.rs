//! Gzip member parsing (RFC 1952)
//!
//! Layout: 10-byte base header, optional fields selected by the flag byte
//! (extra, name, comment, header CRC, strictly in that order), the raw DEFLATE
//! payload, and an 8-byte trailer holding the CRC32 and the uncompressed size
//! modulo 2^32, both little-endian.

use crate::error::CodecError;

use super::{read_u16_le, read_u32_le, CompressedContainer, ContainerKind};

/// Gzip magic bytes
pub(crate) const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Size of the fixed base header
const BASE_HEADER_SIZE: usize = 10;

/// Size of the CRC32 + ISIZE trailer
const TRAILER_SIZE: usize = 8;

/// The only compression method defined by the format
const METHOD_DEFLATE: u8 = 8;

const FLAG_HCRC: u8 = 0x02;
const FLAG_EXTRA: u8 = 0x04;
const FLAG_NAME: u8 = 0x08;
const FLAG_COMMENT: u8 = 0x10;

/// Gzip base header and the optional fields present in a member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GzipHeader<'a> {
    /// Compression method byte (8 = deflate)
    pub method: u8,
    /// Raw flag byte
    pub flags: u8,
    /// Modification time (Unix format), zero if unknown
    pub mtime: u32,
    /// Compressor-specific extra flags
    pub extra_flags: u8,
    /// Operating system id
    pub os: u8,
    /// FEXTRA payload without its length prefix
    pub extra: Option<&'a [u8]>,
    /// FCOMMENT without the terminating zero
    pub comment: Option<&'a [u8]>,
    /// FHCRC value
    pub header_crc: Option<u16>,
}

/// Parse a gzip member, returning `None` on any mismatch or truncation.
pub fn parse_gzip(bytes: &[u8]) -> Option<CompressedContainer<'_>> {
    parse_gzip_strict(bytes).ok()
}

/// Parse a gzip member, reporting why the input was rejected.
///
/// # Errors
/// - `CodecError::Format` if the magic bytes do not match or the payload is empty
/// - `CodecError::TruncatedInput` if an optional field or the trailer runs past the end
/// - `CodecError::UnsupportedCompression` if the method byte is not deflate
pub fn parse_gzip_strict(bytes: &[u8]) -> Result<CompressedContainer<'_>, CodecError> {
    if bytes.len() < GZIP_MAGIC.len() || bytes[..2] != GZIP_MAGIC {
        return Err(CodecError::Format("missing gzip magic bytes".to_string()));
    }
    if bytes.len() < BASE_HEADER_SIZE + TRAILER_SIZE {
        return Err(CodecError::TruncatedInput(format!(
            "gzip stream of {} bytes is shorter than header and trailer",
            bytes.len()
        )));
    }

    let method = bytes[2];
    let flags = bytes[3];
    let mtime = read_u32_le(bytes, 4).unwrap_or(0);
    let mut offset = BASE_HEADER_SIZE;

    let extra = if flags & FLAG_EXTRA != 0 {
        let xlen = read_u16_le(bytes, offset)
            .ok_or_else(|| truncated("extra field length"))? as usize;
        offset += 2;
        let field = bytes
            .get(offset..offset + xlen)
            .ok_or_else(|| truncated("extra field"))?;
        offset += xlen;
        Some(field)
    } else {
        None
    };

    let name = if flags & FLAG_NAME != 0 {
        let (field, next) = zero_terminated(bytes, offset).ok_or_else(|| truncated("file name"))?;
        offset = next;
        Some(field)
    } else {
        None
    };

    let comment = if flags & FLAG_COMMENT != 0 {
        let (field, next) = zero_terminated(bytes, offset).ok_or_else(|| truncated("comment"))?;
        offset = next;
        Some(field)
    } else {
        None
    };

    let header_crc = if flags & FLAG_HCRC != 0 {
        let crc = read_u16_le(bytes, offset).ok_or_else(|| truncated("header CRC16"))?;
        offset += 2;
        Some(crc)
    } else {
        None
    };

    if bytes.len() - offset < TRAILER_SIZE {
        return Err(truncated("trailer"));
    }
    let trailer = bytes.len() - TRAILER_SIZE;
    let crc32 = read_u32_le(bytes, trailer).ok_or_else(|| truncated("trailer"))?;
    let isize = read_u32_le(bytes, trailer + 4).ok_or_else(|| truncated("trailer"))?;

    if method != METHOD_DEFLATE {
        return Err(CodecError::UnsupportedCompression(format!(
            "gzip compression method {} (only deflate is supported)",
            method
        )));
    }
    if trailer == offset {
        return Err(CodecError::Format(
            "gzip member has no compressed payload".to_string(),
        ));
    }

    Ok(CompressedContainer {
        kind: ContainerKind::Gzip,
        payload: &bytes[offset..trailer],
        payload_offset: offset,
        declared_uncompressed_size: Some(isize),
        crc32: Some(crc32),
        name,
        gzip: Some(GzipHeader {
            method,
            flags,
            mtime,
            extra_flags: bytes[8],
            os: bytes[9],
            extra,
            comment,
            header_crc,
        }),
    })
}

/// Split a zero-terminated field starting at `offset`, returning the field
/// (without terminator) and the offset just past the terminator.
fn zero_terminated(bytes: &[u8], offset: usize) -> Option<(&[u8], usize)> {
    let rest = bytes.get(offset..)?;
    let len = rest.iter().position(|&b| b == 0)?;
    Some((&rest[..len], offset + len + 1))
}

fn truncated(field: &str) -> CodecError {
    CodecError::TruncatedInput(format!("gzip {} extends past end of input", field))
}
