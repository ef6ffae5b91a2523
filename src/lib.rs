//! Compressed container unpacking and schema-driven row decoding
//!
//! The pipeline has two halves:
//! - [`archive`] and [`codec`] recognize a gzip, zip or bzip2 container (or a
//!   headerless deflate, LZ or xz stream) and unpack it into an owned
//!   [`DecompressedBuffer`].
//! - [`reader`] walks a flattened [`SchemaDescriptor`] to decode the encoded
//!   rows of that buffer into typed column buffers with validity bitmaps,
//!   decoding blocks in parallel.
//!
//! ```
//! use colingest::{
//!     ColumnSet, DataBlock, DecodeConfig, RowDecoder, SchemaDescriptor, SchemaTree,
//! };
//!
//! let schema = SchemaDescriptor::from_tree(&SchemaTree::Record(vec![
//!     SchemaTree::Long,
//!     SchemaTree::String,
//! ]))
//! .unwrap();
//!
//! // Two rows: (1, "a") and (-2, "bc")
//! let data = [0x02, 0x02, b'a', 0x03, 0x04, b'b', b'c'];
//! let blocks = [DataBlock::new(0, data.len(), 0, 2)];
//!
//! let mut columns = ColumnSet::for_schema(&schema, 2);
//! let summary = RowDecoder::new(&schema, DecodeConfig::default())
//!     .decode(&data, &blocks, &mut columns)
//!     .unwrap();
//!
//! assert_eq!(summary.rows_decoded(), 2);
//! assert_eq!(columns.columns()[0].data().as_longs(), Some(&[1, -2][..]));
//! ```

pub mod archive;
pub mod codec;
pub mod error;
pub mod reader;
pub mod schema;

pub use archive::{
    detect_bzip2, detect_container, parse_gzip, parse_zip, CompressedContainer, ContainerKind,
    GzipHeader,
};
pub use codec::{
    block_codec_decompress, block_decompressor, decompress, decompress_with_options,
    inflate_fixed, inflate_grow, lz_decode, BlockDecompressor, CompressionType,
    DecompressOptions, DecompressedBuffer,
};
pub use error::{CodecError, SchemaError};
pub use reader::{
    BlockReport, ByteView, ColumnData, ColumnSet, DataBlock, DecodeConfig, DecodeSummary,
    OutputColumn, RowDecoder, ValidityBitmap,
};
pub use schema::{
    ColumnType, DictionaryEntry, SchemaDescriptor, SchemaKind, SchemaNode, SchemaTree,
    MAX_NESTING_DEPTH,
};
