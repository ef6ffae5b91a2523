//! Row decoder
//!
//! Decodes variable-length encoded rows from a decompressed buffer into
//! typed column buffers, driven by a flattened [`crate::schema::SchemaDescriptor`]
//! and a list of [`DataBlock`]s.

mod block;
mod column;
mod decoder;
mod row;
pub mod varint;

pub use block::DataBlock;
pub use column::{ByteView, ColumnData, ColumnSet, OutputColumn, ValidityBitmap};
pub use decoder::{BlockReport, DecodeConfig, DecodeSummary, RowDecoder, DEFAULT_MAX_LANES};
pub use varint::{encode_varint, encode_zigzag, read_varint, read_zigzag};
