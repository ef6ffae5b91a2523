//! Block-parallel row decoding into column buffers
//!
//! Blocks are independent and decode as separate rayon tasks. Inside a block
//! rows normally decode one after another, since each row starts where the
//! previous one ended. When every row of a block has exactly the schema's
//! minimum row size, row offsets are known up front and the rows are spread
//! over parallel lanes instead.

use rayon::prelude::*;
use tracing::debug;

use crate::error::SchemaError;
use crate::schema::SchemaDescriptor;

use super::block::{plan_blocks, DataBlock, PlannedBlock};
use super::column::{ColumnSet, NullTracker, RowSink};
use super::row::decode_row;

/// Default upper bound on parallel lanes within one fixed-width block
pub const DEFAULT_MAX_LANES: usize = 32;

/// Configuration for [`RowDecoder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeConfig {
    /// First global row written to the output (default: 0)
    pub first_row: usize,
    /// Maximum number of rows written, further capped by the column set size
    /// (default: unlimited)
    pub max_rows: usize,
    /// Minimum encoded row size used to detect fixed-width blocks
    /// (default: None = derived from the schema)
    pub min_row_size: Option<usize>,
    /// Decode blocks and fixed-width lanes in parallel (default: true)
    pub parallel: bool,
    /// Maximum lanes per fixed-width block (default: 32)
    pub max_lanes: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            first_row: 0,
            max_rows: usize::MAX,
            min_row_size: None,
            parallel: true,
            max_lanes: DEFAULT_MAX_LANES,
        }
    }
}

impl DecodeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_first_row(mut self, first_row: usize) -> Self {
        self.first_row = first_row;
        self
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn with_min_row_size(mut self, min_row_size: usize) -> Self {
        self.min_row_size = Some(min_row_size);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Decode every block strictly sequentially on the calling thread.
    pub fn sequential(self) -> Self {
        self.with_parallel(false)
    }

    pub fn with_max_lanes(mut self, max_lanes: usize) -> Self {
        self.max_lanes = max_lanes.max(1);
        self
    }
}

/// Outcome of decoding one block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockReport {
    /// Position of the block in the list passed to [`RowDecoder::decode`]
    pub block_index: usize,
    /// Rows parsed, including rows outside the output window
    pub rows_decoded: usize,
    /// Bytes of the block span consumed
    pub bytes_consumed: usize,
    /// Whether the block took the fixed-width lane path
    pub fixed_width: bool,
}

/// Per-block results of a decode pass, ordered by first row.
///
/// The decoder does not validate stream well-formedness; comparing these
/// figures against the block index is left to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeSummary {
    pub blocks: Vec<BlockReport>,
}

impl DecodeSummary {
    pub fn rows_decoded(&self) -> usize {
        self.blocks.iter().map(|b| b.rows_decoded).sum()
    }

    pub fn bytes_consumed(&self) -> usize {
        self.blocks.iter().map(|b| b.bytes_consumed).sum()
    }

    pub fn block(&self, block_index: usize) -> Option<&BlockReport> {
        self.blocks.iter().find(|b| b.block_index == block_index)
    }
}

/// Decodes encoded rows into caller-allocated column buffers.
#[derive(Debug, Clone)]
pub struct RowDecoder<'a> {
    schema: &'a SchemaDescriptor,
    config: DecodeConfig,
    min_row_size: usize,
}

impl<'a> RowDecoder<'a> {
    pub fn new(schema: &'a SchemaDescriptor, config: DecodeConfig) -> Self {
        let min_row_size = config.min_row_size.unwrap_or_else(|| schema.min_row_size());
        Self {
            schema,
            config,
            min_row_size,
        }
    }

    pub fn schema(&self) -> &'a SchemaDescriptor {
        self.schema
    }

    pub fn config(&self) -> &DecodeConfig {
        &self.config
    }

    pub fn min_row_size(&self) -> usize {
        self.min_row_size
    }

    /// Decode the rows of `blocks` from `data` into `columns`.
    ///
    /// Row `r` of the window `[first_row, first_row + max_rows)` lands in
    /// output slot `r - first_row`. Rows outside the window are parsed but
    /// not written. Malformed rows degrade to zero or null values; nothing
    /// mid-row is reported as an error.
    ///
    /// # Errors
    /// `SchemaError::ColumnMismatch` if `columns` does not match the schema's
    /// columns in number, storage or length.
    pub fn decode(
        &self,
        data: &'a [u8],
        blocks: &[DataBlock],
        columns: &mut ColumnSet<'a>,
    ) -> Result<DecodeSummary, SchemaError> {
        self.check_columns(columns)?;

        let rows = self.config.max_rows.min(columns.max_rows());
        let plan = plan_blocks(blocks, data.len(), self.config.first_row, rows);
        debug!(
            blocks = blocks.len(),
            planned = plan.len(),
            first_row = self.config.first_row,
            rows,
            min_row_size = self.min_row_size,
            parallel = self.config.parallel,
            "planned row decode"
        );

        let (slots, trackers): (Vec<_>, Vec<NullTracker<'_>>) = columns
            .columns_mut()
            .iter_mut()
            .map(|column| column.split_for_decode())
            .unzip();

        let mut rest = RowSink::new(0, rows, slots, &trackers);
        let mut tasks = Vec::with_capacity(plan.len());
        for planned in plan {
            let (_, tail) = rest.split_at(planned.output_rows.start);
            let (sink, tail) = tail.split_at(planned.output_rows.end);
            rest = tail;
            tasks.push((planned, sink));
        }

        let reports: Vec<BlockReport> = if self.config.parallel {
            tasks
                .into_par_iter()
                .map(|(planned, sink)| self.decode_block(data, planned, sink))
                .collect()
        } else {
            tasks
                .into_iter()
                .map(|(planned, sink)| self.decode_block(data, planned, sink))
                .collect()
        };

        Ok(DecodeSummary { blocks: reports })
    }

    fn check_columns(&self, columns: &ColumnSet<'a>) -> Result<(), SchemaError> {
        if columns.len() != self.schema.column_count() {
            return Err(SchemaError::ColumnMismatch(format!(
                "schema has {} output columns, column set has {}",
                self.schema.column_count(),
                columns.len()
            )));
        }
        for (i, column) in columns.columns().iter().enumerate() {
            let expected = self.schema.column_type(i);
            if Some(column.data().column_type()) != expected {
                return Err(SchemaError::ColumnMismatch(format!(
                    "column {} holds {:?} values, schema expects {:?}",
                    i,
                    column.data().column_type(),
                    expected
                )));
            }
            if column.len() != columns.max_rows() {
                return Err(SchemaError::ColumnMismatch(format!(
                    "column {} has {} rows, column set expects {}",
                    i,
                    column.len(),
                    columns.max_rows()
                )));
            }
        }
        Ok(())
    }

    /// Output slot of block row `r`, `None` below the window
    #[inline]
    fn output_row(&self, block: &DataBlock, r: usize) -> Option<usize> {
        (block.first_row_index + r).checked_sub(self.config.first_row)
    }

    fn decode_block(&self, data: &'a [u8], planned: PlannedBlock, sink: RowSink<'_, 'a>) -> BlockReport {
        let PlannedBlock {
            index, block, span, ..
        } = planned;

        let fixed_width = self.config.parallel
            && block.row_count > 1
            && span.len() == block.byte_size
            && block.is_fixed_width(self.min_row_size);

        let (rows_decoded, end) = if fixed_width {
            (block.row_count, self.decode_lanes(data, &block, span.start, sink))
        } else {
            self.decode_sequential(data, &block, span.start, span.end, sink)
        };

        let report = BlockReport {
            block_index: index,
            rows_decoded,
            bytes_consumed: end.min(span.end) - span.start,
            fixed_width,
        };
        debug!(
            block = index,
            rows = report.rows_decoded,
            bytes = report.bytes_consumed,
            fixed_width,
            "decoded block"
        );
        report
    }

    /// Decode rows one after another; each row starts where the previous ended
    fn decode_sequential(
        &self,
        data: &'a [u8],
        block: &DataBlock,
        start: usize,
        end: usize,
        mut sink: RowSink<'_, 'a>,
    ) -> (usize, usize) {
        let mut pos = start;
        let mut rows = 0;
        for r in 0..block.row_count {
            if pos >= end && self.min_row_size > 0 {
                break;
            }
            let row = self.output_row(block, r);
            pos = decode_row(self.schema, data, pos, end, row, &mut sink);
            rows += 1;
        }
        (rows, pos)
    }

    /// Decode a fixed-width block across lanes, returning the furthest
    /// position any row reached
    fn decode_lanes(
        &self,
        data: &'a [u8],
        block: &DataBlock,
        start: usize,
        sink: RowSink<'_, 'a>,
    ) -> usize {
        let end = start + block.byte_size;
        let lanes = self.config.max_lanes.max(1).min(block.row_count);
        let per_lane = block.row_count.div_ceil(lanes);

        let mut rest = sink;
        let mut lane_tasks = Vec::with_capacity(lanes);
        for lane in 0..lanes {
            let first = lane * per_lane;
            let last = (first + per_lane).min(block.row_count);
            if first >= last {
                break;
            }
            let boundary = (block.first_row_index + last).saturating_sub(self.config.first_row);
            let (lane_sink, tail) = rest.split_at(boundary);
            rest = tail;
            lane_tasks.push((first..last, lane_sink));
        }

        lane_tasks
            .into_par_iter()
            .map(|(rows, mut lane_sink)| {
                let mut furthest = start;
                for r in rows {
                    let row_start = start + r * self.min_row_size;
                    let row = self.output_row(block, r);
                    let row_end = decode_row(self.schema, data, row_start, end, row, &mut lane_sink);
                    furthest = furthest.max(row_end);
                }
                furthest
            })
            .max()
            .unwrap_or(start)
    }
}
