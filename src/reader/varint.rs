//! Varint encoding and decoding for the row decoder.
//!
//! Rows use the protobuf-style varint:
//! - Each byte has 7 bits of data and 1 continuation bit (MSB)
//! - Groups are in little-endian order
//!
//! Signed values are zig-zag mapped first:
//! - 0 -> 0, -1 -> 1, 1 -> 2, -2 -> 3, 2 -> 4, ...
//! - Encoding: (n << 1) ^ (n >> 63)
//! - Decoding: (n >> 1) ^ -(n & 1)
//!
//! Decoding never fails. Reading at or past `end` yields 0 without moving the
//! cursor, and a varint cut off by `end` yields the groups read so far.

/// Groups beyond this carry no bits of a 64-bit value
const MAX_VARINT_GROUPS: u32 = 10;

// ============================================================================
// Decoding Functions
// ============================================================================

/// Decode an unsigned varint at `*pos`, never reading at or past `end`.
#[inline]
pub fn read_varint(data: &[u8], pos: &mut usize, end: usize) -> u64 {
    let end = end.min(data.len());
    let mut result: u64 = 0;
    let mut groups: u32 = 0;

    while *pos < end {
        let byte = data[*pos];
        *pos += 1;
        if groups < MAX_VARINT_GROUPS {
            result |= ((byte & 0x7F) as u64) << (7 * groups);
        }
        groups += 1;
        if byte & 0x80 == 0 {
            break;
        }
    }
    result
}

/// Decode a zig-zag encoded signed varint at `*pos`.
#[inline]
pub fn read_zigzag(data: &[u8], pos: &mut usize, end: usize) -> i64 {
    zigzag_decode(read_varint(data, pos, end))
}

/// Restore the sign of a zig-zag mapped value.
#[inline]
pub fn zigzag_decode(unsigned: u64) -> i64 {
    ((unsigned >> 1) as i64) ^ (-((unsigned & 1) as i64))
}

// ============================================================================
// Encoding Functions
// ============================================================================

/// Encode an unsigned integer as a varint.
pub fn encode_varint(mut value: u64) -> Vec<u8> {
    let mut result = Vec::new();
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        result.push(byte);
        if value == 0 {
            return result;
        }
    }
}

/// Encode a signed integer as a zig-zag varint.
pub fn encode_zigzag(value: i64) -> Vec<u8> {
    encode_varint(((value << 1) ^ (value >> 63)) as u64)
}
