//! Data blocks and the per-decode block plan
//!
//! A [`DataBlock`] is a contiguous run of encoded rows inside a decompressed
//! buffer, produced by an external block indexer. Planning clamps every block
//! to the buffer and to the caller's row window, and assigns each block the
//! output rows it may write so that no row is written twice.

use std::ops::Range;

use tracing::warn;

/// A contiguous run of encoded rows within a decompressed buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataBlock {
    /// Start of the block's bytes in the decompressed buffer
    pub byte_offset: usize,
    /// Length of the block's bytes
    pub byte_size: usize,
    /// Global index of the block's first row
    pub first_row_index: usize,
    /// Number of rows encoded in the block
    pub row_count: usize,
}

impl DataBlock {
    pub fn new(byte_offset: usize, byte_size: usize, first_row_index: usize, row_count: usize) -> Self {
        Self {
            byte_offset,
            byte_size,
            first_row_index,
            row_count,
        }
    }

    /// Global index one past the block's last row
    pub fn end_row_index(&self) -> usize {
        self.first_row_index.saturating_add(self.row_count)
    }

    /// Whether every row has exactly `min_row_size` bytes, which is the case
    /// precisely when the block is no larger than that many minimal rows.
    pub fn is_fixed_width(&self, min_row_size: usize) -> bool {
        min_row_size > 0
            && self.row_count > 0
            && min_row_size.checked_mul(self.row_count) == Some(self.byte_size)
    }
}

/// One block scheduled for decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PlannedBlock {
    /// Position in the caller's block list
    pub index: usize,
    pub block: DataBlock,
    /// Byte span clamped to the buffer
    pub span: Range<usize>,
    /// Output rows this block may write (may be empty)
    pub output_rows: Range<usize>,
}

/// Plan the decode of `blocks` over a buffer of `buffer_len` bytes for the
/// global row window `[first_row, first_row + rows)`.
///
/// Blocks entirely outside the window are dropped. The result is ordered by
/// first row, and the output row ranges are increasing and disjoint.
pub(crate) fn plan_blocks(
    blocks: &[DataBlock],
    buffer_len: usize,
    first_row: usize,
    rows: usize,
) -> Vec<PlannedBlock> {
    let window_end = first_row.saturating_add(rows);

    let mut order: Vec<usize> = (0..blocks.len()).collect();
    order.sort_by_key(|&i| blocks[i].first_row_index);

    let mut planned = Vec::with_capacity(blocks.len());
    let mut written_up_to = 0usize;

    for index in order {
        let block = blocks[index];
        if block.row_count == 0
            || block.end_row_index() <= first_row
            || block.first_row_index >= window_end
        {
            continue;
        }

        let start = block.byte_offset.min(buffer_len);
        let end = block.byte_offset.saturating_add(block.byte_size).min(buffer_len);
        if end - start != block.byte_size {
            warn!(
                block = index,
                byte_offset = block.byte_offset,
                byte_size = block.byte_size,
                buffer_len,
                "block span exceeds the decompressed buffer, clamping"
            );
        }

        let mut out_start = block.first_row_index.max(first_row) - first_row;
        let out_end = block.end_row_index().min(window_end) - first_row;
        if out_start < written_up_to {
            warn!(
                block = index,
                first_row_index = block.first_row_index,
                overlap = written_up_to.min(out_end) - out_start,
                "block overlaps rows of a previous block, overlapping rows are not written"
            );
            out_start = written_up_to.min(out_end);
        }
        written_up_to = written_up_to.max(out_end);

        planned.push(PlannedBlock {
            index,
            block,
            span: start..end,
            output_rows: out_start..out_end,
        });
    }
    planned
}
