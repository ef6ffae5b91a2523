//! Raw (headerless) DEFLATE decoding
//!
//! Two entry points over the same streaming state machine: a single-shot
//! decode into a caller-sized destination, and a growing decode that extends
//! the destination by a fixed increment whenever it fills before the end of
//! the stream.

use flate2::{Decompress, FlushDecompress, Status};
use tracing::debug;

use crate::error::CodecError;

/// Decode a raw DEFLATE stream into `dst` in one pass.
///
/// # Returns
/// The number of bytes written to `dst`.
///
/// # Errors
/// - `CodecError::BufferTooSmall` if `dst` fills before the end of the stream
/// - `CodecError::TruncatedInput` if the input ends before the end-of-stream marker
/// - `CodecError::StreamCorruption` if the stream is malformed
pub fn inflate_fixed(src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
    let mut state = Decompress::new(false);
    let status = state
        .decompress(src, dst, FlushDecompress::Finish)
        .map_err(|e| CodecError::StreamCorruption(format!("Inflate failed: {}", e)))?;
    let written = state.total_out() as usize;

    match status {
        Status::StreamEnd => Ok(written),
        Status::Ok | Status::BufError if written == dst.len() => {
            Err(CodecError::BufferTooSmall {
                capacity: dst.len(),
            })
        }
        Status::Ok | Status::BufError => Err(CodecError::TruncatedInput(format!(
            "deflate stream ended after {} of {} input bytes without an end-of-stream marker",
            state.total_in(),
            src.len()
        ))),
    }
}

/// Decode a raw DEFLATE stream, growing the destination as needed.
///
/// The destination starts with `initial_capacity` bytes of room and grows by
/// `growth_increment` bytes each time it fills before the end-of-stream marker.
/// The result is trimmed to the bytes actually produced.
///
/// # Errors
/// - `CodecError::TruncatedInput` if the input ends before the end-of-stream marker
/// - `CodecError::StreamCorruption` if the stream is malformed
pub fn inflate_grow(
    src: &[u8],
    initial_capacity: usize,
    growth_increment: usize,
) -> Result<Vec<u8>, CodecError> {
    let growth_increment = growth_increment.max(1);
    let mut state = Decompress::new(false);
    let mut dst = Vec::with_capacity(initial_capacity.max(1));

    loop {
        if dst.len() == dst.capacity() {
            let before = dst.capacity();
            dst.reserve_exact(growth_increment);
            debug!(from = before, to = dst.capacity(), "growing inflate destination");
        }

        let consumed = state.total_in() as usize;
        let produced = state.total_out();
        let status = state
            .decompress_vec(&src[consumed..], &mut dst, FlushDecompress::None)
            .map_err(|e| CodecError::StreamCorruption(format!("Inflate failed: {}", e)))?;

        if matches!(status, Status::StreamEnd) {
            break;
        }
        let progressed = state.total_in() as usize != consumed || state.total_out() != produced;
        if !progressed && dst.len() < dst.capacity() {
            return Err(CodecError::TruncatedInput(format!(
                "deflate stream ended after {} input bytes without an end-of-stream marker",
                consumed
            )));
        }
    }

    dst.shrink_to_fit();
    Ok(dst)
}
