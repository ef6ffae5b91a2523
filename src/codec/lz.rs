//! LZ77-style block decoder (snappy raw stream format)
//!
//! Stream layout:
//! - Varint length prefix (7-bit groups, continuation in the MSB, at most 5
//!   groups) giving the total decoded size
//! - A sequence of tagged elements, selected by the low two bits of the tag:
//!   - `00` literal run; the upper 6 bits hold `length - 1`, or values 60..=63
//!     announce 1..=4 little-endian length bytes following the tag
//!   - `01` copy, length `4 + bits[2..5]`, 11-bit offset from `bits[5..8]` and
//!     one trailing byte
//!   - `10` copy, length `1 + bits[2..8]`, 2-byte little-endian offset
//!   - `11` copy, length `1 + bits[2..8]`, 4-byte little-endian offset
//!
//! Every copy must reference already produced output (`1 <= offset <= pos`).

use crate::error::CodecError;

/// Maximum number of 7-bit groups in the length prefix
const MAX_LENGTH_GROUPS: usize = 5;

/// Literal length field values at or above this announce explicit length bytes
const LITERAL_EXPLICIT_LENGTH: usize = 60;

/// Read the declared decoded size from the stream's length prefix.
///
/// # Returns
/// The decoded size and the number of prefix bytes.
///
/// # Errors
/// - `CodecError::TruncatedInput` if the prefix runs past the end of `src`
/// - `CodecError::StreamCorruption` if the prefix has more than 5 groups or
///   does not fit in 32 bits
pub fn lz_decompressed_len(src: &[u8]) -> Result<(usize, usize), CodecError> {
    let mut value: u64 = 0;
    for (i, &byte) in src.iter().enumerate().take(MAX_LENGTH_GROUPS) {
        value |= ((byte & 0x7f) as u64) << (7 * i);
        if byte & 0x80 == 0 {
            if value > u32::MAX as u64 {
                return Err(CodecError::StreamCorruption(format!(
                    "LZ length prefix {} exceeds 32 bits",
                    value
                )));
            }
            return Ok((value as usize, i + 1));
        }
    }
    if src.len() < MAX_LENGTH_GROUPS {
        Err(CodecError::TruncatedInput(
            "LZ length prefix extends past end of input".to_string(),
        ))
    } else {
        Err(CodecError::StreamCorruption(
            "LZ length prefix longer than 5 bytes".to_string(),
        ))
    }
}

/// Decode an LZ stream into `dst`.
///
/// Succeeds only when exactly the declared number of bytes has been produced
/// and the source is exhausted at an element boundary. On failure `dst` may
/// hold partial output which must be discarded.
///
/// # Returns
/// The number of bytes written (the declared decoded size).
///
/// # Errors
/// - `CodecError::Format` if the declared size is zero
/// - `CodecError::BufferTooSmall` if the declared size exceeds `dst`
/// - `CodecError::TruncatedInput` if an element runs past the end of `src`
/// - `CodecError::StreamCorruption` for invalid copy offsets, elements running
///   past the declared size, or trailing bytes after the declared size
pub fn lz_decode(src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
    let (total, mut cur) = lz_decompressed_len(src)?;
    if total == 0 {
        return Err(CodecError::Format("LZ stream declares zero length".to_string()));
    }
    if total > dst.len() {
        return Err(CodecError::BufferTooSmall {
            capacity: dst.len(),
        });
    }

    let mut pos = 0usize;
    while pos < total {
        let tag = *src
            .get(cur)
            .ok_or_else(|| truncated(pos, total))?;
        cur += 1;

        if tag & 3 == 0 {
            let mut len = (tag >> 2) as usize;
            if len >= LITERAL_EXPLICIT_LENGTH {
                let num_bytes = len - LITERAL_EXPLICIT_LENGTH + 1;
                let bytes = src
                    .get(cur..cur + num_bytes)
                    .ok_or_else(|| truncated(pos, total))?;
                len = bytes
                    .iter()
                    .rev()
                    .fold(0usize, |acc, &b| (acc << 8) | b as usize);
                cur += num_bytes;
            }
            len += 1;
            if len > total - pos {
                return Err(overrun(pos, len, total));
            }
            let literal = src.get(cur..cur + len).ok_or_else(|| truncated(pos, total))?;
            dst[pos..pos + len].copy_from_slice(literal);
            cur += len;
            pos += len;
            continue;
        }

        let (len, offset) = match tag & 3 {
            1 => {
                let low = *src.get(cur).ok_or_else(|| truncated(pos, total))?;
                cur += 1;
                let offset = (((tag & 0xe0) as usize) << 3) | low as usize;
                (((tag >> 2) & 7) as usize + 4, offset)
            }
            2 => {
                let bytes = src.get(cur..cur + 2).ok_or_else(|| truncated(pos, total))?;
                cur += 2;
                ((tag >> 2) as usize + 1, u16::from_le_bytes([bytes[0], bytes[1]]) as usize)
            }
            _ => {
                let bytes = src.get(cur..cur + 4).ok_or_else(|| truncated(pos, total))?;
                cur += 4;
                let offset = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                ((tag >> 2) as usize + 1, offset as usize)
            }
        };

        if offset == 0 || offset > pos {
            return Err(CodecError::StreamCorruption(format!(
                "LZ copy offset {} invalid at output position {}",
                offset, pos
            )));
        }
        if len > total - pos {
            return Err(overrun(pos, len, total));
        }
        // Copies may overlap their own output, so go byte by byte when they do
        if offset >= len {
            dst.copy_within(pos - offset..pos - offset + len, pos);
        } else {
            for i in pos..pos + len {
                dst[i] = dst[i - offset];
            }
        }
        pos += len;
    }

    if cur != src.len() {
        return Err(CodecError::StreamCorruption(format!(
            "{} trailing bytes after LZ stream of {} bytes",
            src.len() - cur,
            total
        )));
    }
    Ok(total)
}

/// Decode an LZ stream into a buffer sized from its length prefix.
pub fn lz_decompress(src: &[u8]) -> Result<Vec<u8>, CodecError> {
    let (total, _) = lz_decompressed_len(src)?;
    let mut dst = vec![0u8; total];
    let written = lz_decode(src, &mut dst)?;
    dst.truncate(written);
    Ok(dst)
}

fn truncated(pos: usize, total: usize) -> CodecError {
    CodecError::TruncatedInput(format!(
        "LZ stream ended at output position {} of {}",
        pos, total
    ))
}

fn overrun(pos: usize, len: usize, total: usize) -> CodecError {
    CodecError::StreamCorruption(format!(
        "LZ element of {} bytes at position {} overruns declared length {}",
        len, pos, total
    ))
}
