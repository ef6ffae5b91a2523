//! Bzip2 block codec with resumable output growth
//!
//! The decoder is driven repeatedly over the same stream state. Whenever it
//! reports that the output buffer is full, the destination grows by 50% and
//! decoding resumes from the exact source offset already consumed.

use bzip2::{Decompress, Status};
use tracing::debug;

use crate::error::CodecError;

/// Decompress a bzip2 stream into a buffer that starts at `initial_capacity`
/// bytes and grows by half of its current size whenever it fills.
///
/// # Errors
/// - `CodecError::TruncatedInput` if the stream ends before its end-of-stream marker
/// - `CodecError::StreamCorruption` if the block decoder rejects the data
pub fn block_codec_decompress(src: &[u8], initial_capacity: usize) -> Result<Vec<u8>, CodecError> {
    let mut state = Decompress::new(false);
    let mut dst = Vec::with_capacity(initial_capacity.max(2));

    loop {
        let consumed = state.total_in() as usize;
        let produced = state.total_out();
        let status = state
            .decompress_vec(&src[consumed..], &mut dst)
            .map_err(|e| CodecError::StreamCorruption(format!("Bzip2 decompression failed: {}", e)))?;

        if matches!(status, Status::StreamEnd) {
            break;
        }

        if dst.len() == dst.capacity() {
            // Output buffer full: grow by 50% and resume
            let before = dst.capacity();
            dst.reserve_exact((before / 2).max(1));
            debug!(from = before, to = dst.capacity(), "growing bzip2 destination");
            continue;
        }

        let progressed = state.total_in() as usize != consumed || state.total_out() != produced;
        if !progressed {
            return Err(CodecError::TruncatedInput(format!(
                "bzip2 stream ended after {} input bytes without an end-of-stream marker",
                consumed
            )));
        }
    }

    dst.shrink_to_fit();
    Ok(dst)
}
