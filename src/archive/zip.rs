//! Single-entry zip extraction
//!
//! Finds the End-Of-Central-Directory record by scanning backward from the end
//! of the buffer (within the maximum trailing comment length), walks the
//! central directory and returns the first deflate entry with non-zero sizes.
//! Multi-entry extraction is intentionally not supported: ingestion expects
//! one data file per archive.

use tracing::{debug, trace};

use crate::error::CodecError;

use super::{read_u16_le, read_u32_le, CompressedContainer, ContainerKind};

const EOCD_SIGNATURE: u32 = 0x0605_4b50;
const ZIP64_LOCATOR_SIGNATURE: u32 = 0x0706_4b50;
const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4b50;
const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4b50;

/// EOCD record size including the comment length field
const EOCD_SIZE: usize = 22;
const ZIP64_LOCATOR_SIZE: usize = 20;
const CENTRAL_HEADER_SIZE: usize = 46;
const LOCAL_HEADER_SIZE: usize = 30;
const MAX_COMMENT_LEN: usize = 0xffff;

const METHOD_DEFLATE: u16 = 8;

/// Parsed End-Of-Central-Directory record
#[derive(Debug, Clone, Copy)]
struct EndOfCentralDirectory {
    num_entries: u16,
    cdir_size: u32,
    cdir_offset: u32,
    zip64_locator: bool,
}

impl EndOfCentralDirectory {
    fn has_zip64_sentinels(&self) -> bool {
        self.num_entries == u16::MAX
            || self.cdir_size == u32::MAX
            || self.cdir_offset == u32::MAX
    }
}

/// Parse a zip archive, returning `None` if no usable entry is found.
pub fn parse_zip(bytes: &[u8]) -> Option<CompressedContainer<'_>> {
    parse_zip_strict(bytes).ok()
}

/// Parse a zip archive and return its first deflate entry.
///
/// # Errors
/// - `CodecError::Format` if no valid end-of-central-directory record is found
///   (including multi-disk archives, which are rejected)
/// - `CodecError::UnsupportedCompression` for Zip64 archives or when no entry
///   is deflate-compressed with non-zero sizes
/// - `CodecError::TruncatedInput` if the only candidate entry runs past the end
pub fn parse_zip_strict(bytes: &[u8]) -> Result<CompressedContainer<'_>, CodecError> {
    let eocd = find_end_of_central_directory(bytes)?;
    if eocd.zip64_locator && eocd.has_zip64_sentinels() {
        return Err(CodecError::UnsupportedCompression(
            "zip64 archives are not supported".to_string(),
        ));
    }

    let cdir_start = eocd.cdir_offset as usize;
    let cdir_size = eocd.cdir_size as usize;
    let mut entry_offset = 0usize;
    let mut truncated_entry = false;

    for index in 0..eocd.num_entries {
        let at = cdir_start + entry_offset;
        if read_u32_le(bytes, at) != Some(CENTRAL_HEADER_SIGNATURE)
            || at + CENTRAL_HEADER_SIZE > bytes.len()
        {
            debug!(index, "central directory entry has a bad signature");
            break;
        }
        let field = |rel: usize| read_u16_le(bytes, at + rel).unwrap_or(0) as usize;
        let method = field(10) as u16;
        let crc32 = read_u32_le(bytes, at + 16).unwrap_or(0);
        let comp_size = read_u32_le(bytes, at + 20).unwrap_or(0);
        let uncomp_size = read_u32_le(bytes, at + 24).unwrap_or(0);
        let name_len = field(28);
        let entry_len = CENTRAL_HEADER_SIZE + name_len + field(30) + field(32);
        let local_offset = read_u32_le(bytes, at + 42).unwrap_or(0) as usize;

        if entry_offset + entry_len > cdir_size {
            debug!(index, "central directory entry overruns the directory");
            break;
        }
        trace!(index, method, comp_size, uncomp_size, local_offset, "zip entry");

        if method == METHOD_DEFLATE && comp_size > 0 && uncomp_size > 0 {
            match locate_entry_data(bytes, local_offset, comp_size as usize) {
                Some(data_start) => {
                    let name_start = at + CENTRAL_HEADER_SIZE;
                    return Ok(CompressedContainer {
                        kind: ContainerKind::Zip,
                        payload: &bytes[data_start..data_start + comp_size as usize],
                        payload_offset: data_start,
                        declared_uncompressed_size: Some(uncomp_size),
                        crc32: Some(crc32),
                        name: bytes.get(name_start..name_start + name_len),
                        gzip: None,
                    });
                }
                None => truncated_entry = true,
            }
        }
        entry_offset += entry_len;
    }

    if truncated_entry {
        Err(CodecError::TruncatedInput(
            "zip entry data extends past end of input".to_string(),
        ))
    } else {
        Err(CodecError::UnsupportedCompression(
            "zip archive has no deflate entry with non-zero size".to_string(),
        ))
    }
}

/// Validate the local file header at `offset` and return where its data begins.
fn locate_entry_data(bytes: &[u8], offset: usize, comp_size: usize) -> Option<usize> {
    if read_u32_le(bytes, offset)? != LOCAL_HEADER_SIGNATURE {
        return None;
    }
    if read_u16_le(bytes, offset + 8)? != METHOD_DEFLATE {
        return None;
    }
    let name_len = read_u16_le(bytes, offset + 26)? as usize;
    let extra_len = read_u16_le(bytes, offset + 28)? as usize;
    let data_start = offset + LOCAL_HEADER_SIZE + name_len + extra_len;
    if data_start > bytes.len() || comp_size > bytes.len() - data_start {
        return None;
    }
    Some(data_start)
}

/// Scan backward for an EOCD record describing a single-disk archive whose
/// central directory starts with a valid file header.
fn find_end_of_central_directory(bytes: &[u8]) -> Result<EndOfCentralDirectory, CodecError> {
    if bytes.len() < EOCD_SIZE {
        return Err(CodecError::Format(
            "input too short for a zip end-of-central-directory record".to_string(),
        ));
    }
    let last = bytes.len() - EOCD_SIZE;
    let first = last.saturating_sub(MAX_COMMENT_LEN);
    let mut saw_multi_disk = false;

    for at in (first..=last).rev() {
        if read_u32_le(bytes, at) != Some(EOCD_SIGNATURE) {
            continue;
        }
        let u16_at = |rel: usize| read_u16_le(bytes, at + rel).unwrap_or(0);
        let u32_at = |rel: usize| read_u32_le(bytes, at + rel).unwrap_or(0);
        let (disk_id, start_disk) = (u16_at(4), u16_at(6));
        let (num_entries, total_entries) = (u16_at(8), u16_at(10));
        let cdir_size = u32_at(12);
        let cdir_offset = u32_at(16);
        let comment_len = u16_at(20) as usize;

        if disk_id != start_disk || num_entries != total_entries {
            saw_multi_disk = true;
            continue;
        }
        if (cdir_size as usize) < CENTRAL_HEADER_SIZE * num_entries as usize
            || cdir_offset as usize >= bytes.len()
            || at + EOCD_SIZE + comment_len > bytes.len()
        {
            continue;
        }
        if read_u32_le(bytes, cdir_offset as usize) != Some(CENTRAL_HEADER_SIGNATURE) {
            continue;
        }

        let zip64_locator = at >= ZIP64_LOCATOR_SIZE
            && read_u32_le(bytes, at - ZIP64_LOCATOR_SIZE) == Some(ZIP64_LOCATOR_SIGNATURE);
        return Ok(EndOfCentralDirectory {
            num_entries,
            cdir_size,
            cdir_offset,
            zip64_locator,
        });
    }

    if saw_multi_disk {
        Err(CodecError::Format(
            "multi-disk zip archives are not supported".to_string(),
        ))
    } else {
        Err(CodecError::Format(
            "zip end-of-central-directory record not found".to_string(),
        ))
    }
}
