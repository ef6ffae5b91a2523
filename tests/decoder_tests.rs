//! End-to-end row decoding tests
//!
//! Rows are encoded by hand with the zig-zag helpers and decoded through the
//! public API, including straight out of a decompressed buffer.

use std::io::Write;

use colingest::codec::{decompress, CompressionType};
use colingest::reader::{encode_zigzag, ColumnSet, DataBlock, DecodeConfig, RowDecoder};
use colingest::schema::{ColumnType, SchemaDescriptor, SchemaTree};
use colingest::{OutputColumn, SchemaError};

fn record(fields: Vec<SchemaTree>) -> SchemaDescriptor {
    SchemaDescriptor::from_tree(&SchemaTree::Record(fields)).unwrap()
}

fn zz(values: &[i64]) -> Vec<u8> {
    values.iter().flat_map(|&v| encode_zigzag(v)).collect()
}

fn string_field(text: &str) -> Vec<u8> {
    let mut out = encode_zigzag(text.len() as i64);
    out.extend_from_slice(text.as_bytes());
    out
}

// ============================================================================
// Unions and nulls
// ============================================================================

#[test]
fn test_nullable_int_sets_validity() {
    let schema = record(vec![SchemaTree::nullable(SchemaTree::Int)]);
    // One discriminant byte per row: null, -1, 42
    let data = [0x00, 0x01, 0x01, 0x01, 0x54];
    let blocks = [DataBlock::new(0, data.len(), 0, 3)];

    let mut columns = ColumnSet::for_schema(&schema, 3);
    let summary = RowDecoder::new(&schema, DecodeConfig::default())
        .decode(&data, &blocks, &mut columns)
        .unwrap();

    assert_eq!(summary.rows_decoded(), 3);
    assert_eq!(summary.bytes_consumed(), data.len());
    let column = &columns.columns()[0];
    assert_eq!(column.data().as_ints(), Some(&[0, -1, 42][..]));
    assert!(!column.is_valid(0));
    assert!(column.is_valid(1));
    assert!(column.is_valid(2));
    assert_eq!(column.null_count(), 1);
}

#[test]
fn test_invalid_union_branch_leaves_rest_of_row_default() {
    let schema = record(vec![SchemaTree::nullable(SchemaTree::Int), SchemaTree::Long]);
    let data = [0x0a, 0x08];
    let blocks = [DataBlock::new(0, data.len(), 0, 1)];

    let mut columns = ColumnSet::for_schema(&schema, 1);
    RowDecoder::new(&schema, DecodeConfig::default())
        .decode(&data, &blocks, &mut columns)
        .unwrap();

    assert_eq!(columns.columns()[0].data().as_ints(), Some(&[0][..]));
    assert_eq!(columns.columns()[1].data().as_longs(), Some(&[0][..]));
    assert_eq!(columns.columns()[0].null_count(), 0);
}

#[test]
fn test_null_only_rows_consume_no_bytes() {
    let schema = record(vec![SchemaTree::Null]);
    assert_eq!(schema.min_row_size(), 0);
    let blocks = [DataBlock::new(0, 0, 0, 5)];

    let mut columns = ColumnSet::for_schema(&schema, 5);
    let summary = RowDecoder::new(&schema, DecodeConfig::default())
        .decode(&[], &blocks, &mut columns)
        .unwrap();

    assert_eq!(summary.rows_decoded(), 5);
    assert_eq!(summary.bytes_consumed(), 0);
    assert_eq!(columns.columns()[0].data().column_type(), ColumnType::Null);
    assert_eq!(columns.columns()[0].null_count(), 5);
}

// ============================================================================
// Arrays, nested records, enums
// ============================================================================

#[test]
fn test_array_count_and_following_field() {
    let schema = record(vec![SchemaTree::array(SchemaTree::Long), SchemaTree::Int]);
    assert_eq!(
        schema.column_types(),
        &[ColumnType::Long, ColumnType::Long, ColumnType::Int]
    );

    let mut data = zz(&[3, 1, 2, 3, 0]);
    data.extend(zz(&[7]));
    let blocks = [DataBlock::new(0, data.len(), 0, 1)];

    let mut columns = ColumnSet::for_schema(&schema, 1);
    let summary = RowDecoder::new(&schema, DecodeConfig::default())
        .decode(&data, &blocks, &mut columns)
        .unwrap();

    assert_eq!(summary.bytes_consumed(), data.len());
    assert_eq!(columns.columns()[0].data().as_longs(), Some(&[3][..]));
    assert_eq!(columns.columns()[1].data().as_longs(), Some(&[3][..]));
    assert_eq!(columns.columns()[2].data().as_ints(), Some(&[7][..]));
}

#[test]
fn test_corrupt_zero_width_array_counts_do_not_overflow() {
    let schema = record(vec![SchemaTree::array(SchemaTree::Null)]);
    let mut data = Vec::new();
    for _ in 0..3 {
        data.extend(zz(&[i64::MIN, 0]));
    }
    let blocks = [DataBlock::new(0, data.len(), 0, 1)];

    let mut columns = ColumnSet::for_schema(&schema, 1);
    let summary = RowDecoder::new(&schema, DecodeConfig::new().sequential())
        .decode(&data, &blocks, &mut columns)
        .unwrap();

    assert_eq!(summary.rows_decoded(), 1);
    assert_eq!(columns.columns()[0].data().as_longs(), Some(&[i64::MAX][..]));
}

#[test]
fn test_nested_record_with_enum() {
    let schema = record(vec![
        SchemaTree::Record(vec![SchemaTree::Int, SchemaTree::String]),
        SchemaTree::enumeration(["RED", "GREEN"]),
        SchemaTree::Double,
    ]);
    let mut data = zz(&[5]);
    data.extend(string_field("hi"));
    data.extend(zz(&[1]));
    data.extend_from_slice(&2.5f64.to_le_bytes());
    let blocks = [DataBlock::new(0, data.len(), 0, 1)];

    let mut columns = ColumnSet::for_schema(&schema, 1);
    RowDecoder::new(&schema, DecodeConfig::default())
        .decode(&data, &blocks, &mut columns)
        .unwrap();

    assert_eq!(columns.columns()[0].data().as_ints(), Some(&[5][..]));
    let text = columns.columns()[1].data().as_views().unwrap();
    assert_eq!(text[0].as_str(), Some("hi"));
    let color = columns.columns()[2].data().as_views().unwrap();
    assert_eq!(color[0].as_str(), Some("GREEN"));
    assert_eq!(columns.columns()[3].data().as_doubles(), Some(&[2.5][..]));
}

// ============================================================================
// Row windows and block layout
// ============================================================================

fn small_long_rows(values: &[i64]) -> (Vec<u8>, Vec<DataBlock>) {
    let data = zz(values);
    let blocks = vec![
        DataBlock::new(0, 4, 0, 4),
        DataBlock::new(4, 4, 4, 4),
        DataBlock::new(8, 2, 8, 2),
    ];
    (data, blocks)
}

#[test]
fn test_row_window_skips_blocks_outside() {
    let schema = record(vec![SchemaTree::Long]);
    let values: Vec<i64> = (0..10).map(|i| i * 3).collect();
    let (data, blocks) = small_long_rows(&values);

    let config = DecodeConfig::new().with_first_row(3).with_max_rows(5);
    let mut columns = ColumnSet::for_schema(&schema, 5);
    let summary = RowDecoder::new(&schema, config)
        .decode(&data, &blocks, &mut columns)
        .unwrap();

    assert_eq!(
        columns.columns()[0].data().as_longs(),
        Some(&[9, 12, 15, 18, 21][..])
    );
    assert_eq!(summary.blocks.len(), 2);
    assert!(summary.block(2).is_none());
    assert_eq!(summary.block(0).unwrap().rows_decoded, 4);
}

#[test]
fn test_window_capped_by_column_set() {
    let schema = record(vec![SchemaTree::Long]);
    let values: Vec<i64> = (0..10).collect();
    let (data, blocks) = small_long_rows(&values);

    let mut columns = ColumnSet::for_schema(&schema, 6);
    let summary = RowDecoder::new(&schema, DecodeConfig::default())
        .decode(&data, &blocks, &mut columns)
        .unwrap();

    assert_eq!(
        columns.columns()[0].data().as_longs(),
        Some(&[0, 1, 2, 3, 4, 5][..])
    );
    assert_eq!(summary.blocks.len(), 2);
}

#[test]
fn test_blocks_listed_out_of_order() {
    let schema = record(vec![SchemaTree::Long]);
    let values: Vec<i64> = (0..10).map(|i| -i).collect();
    let (data, mut blocks) = small_long_rows(&values);
    blocks.reverse();

    let mut columns = ColumnSet::for_schema(&schema, 10);
    let summary = RowDecoder::new(&schema, DecodeConfig::default())
        .decode(&data, &blocks, &mut columns)
        .unwrap();

    assert_eq!(columns.columns()[0].data().as_longs(), Some(&values[..]));
    let order: Vec<usize> = summary.blocks.iter().map(|b| b.block_index).collect();
    assert_eq!(order, vec![2, 1, 0]);
}

#[test]
fn test_overlapping_block_keeps_earlier_rows() {
    let schema = record(vec![SchemaTree::Long]);
    let data = zz(&[10, 11, 12, 13, 50, 51, 14, 15]);
    // The second block claims rows 2..6; rows 2 and 3 already belong to the first
    let blocks = [DataBlock::new(0, 4, 0, 4), DataBlock::new(4, 4, 2, 4)];

    for config in [DecodeConfig::default(), DecodeConfig::new().sequential()] {
        let mut columns = ColumnSet::for_schema(&schema, 6);
        let summary = RowDecoder::new(&schema, config)
            .decode(&data, &blocks, &mut columns)
            .unwrap();
        assert_eq!(
            columns.columns()[0].data().as_longs(),
            Some(&[10, 11, 12, 13, 14, 15][..])
        );
        assert_eq!(summary.rows_decoded(), 8);
    }
}

#[test]
fn test_truncated_row_degrades() {
    let schema = record(vec![SchemaTree::Long, SchemaTree::String, SchemaTree::Double]);
    // String claims 10 bytes, only 3 follow; the block also claims too much
    let data = [0x04, 0x14, b'a', b'b', b'c'];
    let blocks = [DataBlock::new(0, 100, 0, 1)];

    let mut columns = ColumnSet::for_schema(&schema, 1);
    let summary = RowDecoder::new(&schema, DecodeConfig::default())
        .decode(&data, &blocks, &mut columns)
        .unwrap();

    assert_eq!(columns.columns()[0].data().as_longs(), Some(&[2][..]));
    assert!(columns.columns()[1].data().as_views().unwrap()[0].is_null());
    assert_eq!(columns.columns()[2].data().as_doubles(), Some(&[0.0][..]));
    assert_eq!(summary.bytes_consumed(), data.len());
}

#[test]
fn test_column_set_mismatch() {
    let schema = record(vec![SchemaTree::Long, SchemaTree::String]);
    let decoder = RowDecoder::new(&schema, DecodeConfig::default());
    let blocks = [DataBlock::new(0, 0, 0, 0)];

    let mut too_few = ColumnSet::from_columns(vec![OutputColumn::new(ColumnType::Long, 2)], 2);
    assert!(matches!(
        decoder.decode(&[], &blocks, &mut too_few),
        Err(SchemaError::ColumnMismatch(_))
    ));

    let mut wrong_type = ColumnSet::from_columns(
        vec![
            OutputColumn::new(ColumnType::Int, 2),
            OutputColumn::new(ColumnType::Bytes, 2),
        ],
        2,
    );
    assert!(matches!(
        decoder.decode(&[], &blocks, &mut wrong_type),
        Err(SchemaError::ColumnMismatch(_))
    ));

    let mut short = ColumnSet::from_columns(
        vec![
            OutputColumn::new(ColumnType::Long, 2),
            OutputColumn::new(ColumnType::Bytes, 1),
        ],
        2,
    );
    assert!(matches!(
        decoder.decode(&[], &blocks, &mut short),
        Err(SchemaError::ColumnMismatch(_))
    ));
}

// ============================================================================
// Decompress, then decode
// ============================================================================

fn customer_rows(count: usize) -> (Vec<u8>, Vec<DataBlock>) {
    let mut data = Vec::new();
    let mut blocks = Vec::new();
    let per_block = 250;
    for first in (0..count).step_by(per_block) {
        let start = data.len();
        let rows = per_block.min(count - first);
        for id in first..first + rows {
            data.extend(encode_zigzag(id as i64 * 7 - 1000));
            data.extend(string_field(&format!("customer-{}", id)));
            if id % 3 == 0 {
                data.push(0);
            } else {
                data.push(1);
                data.extend_from_slice(&(id as f64 / 4.0).to_le_bytes());
            }
        }
        blocks.push(DataBlock::new(start, data.len() - start, first, rows));
    }
    (data, blocks)
}

fn customer_schema() -> SchemaDescriptor {
    record(vec![
        SchemaTree::Long,
        SchemaTree::String,
        SchemaTree::nullable(SchemaTree::Double),
    ])
}

fn check_customers(columns: &ColumnSet<'_>, count: usize) {
    let ids = columns.columns()[0].data().as_longs().unwrap();
    let names = columns.columns()[1].data().as_views().unwrap();
    let balance = &columns.columns()[2];
    let amounts = balance.data().as_doubles().unwrap();
    for id in 0..count {
        assert_eq!(ids[id], id as i64 * 7 - 1000);
        assert_eq!(names[id].as_str(), Some(format!("customer-{}", id).as_str()));
        if id % 3 == 0 {
            assert!(!balance.is_valid(id));
        } else {
            assert!(balance.is_valid(id));
            assert_eq!(amounts[id], id as f64 / 4.0);
        }
    }
    assert_eq!(balance.null_count() as usize, count.div_ceil(3));
}

#[test]
fn test_gzip_buffer_end_to_end() {
    let count = 1000;
    let (rows, blocks) = customer_rows(count);
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&rows).unwrap();
    let compressed = encoder.finish().unwrap();

    let buffer = decompress(&compressed, CompressionType::Infer).unwrap();
    assert_eq!(buffer.len(), rows.len());

    let schema = customer_schema();
    let mut columns = ColumnSet::for_schema(&schema, count);
    let summary = RowDecoder::new(&schema, DecodeConfig::default())
        .decode(buffer.as_bytes(), &blocks, &mut columns)
        .unwrap();

    assert_eq!(summary.rows_decoded(), count);
    assert_eq!(summary.bytes_consumed(), rows.len());
    check_customers(&columns, count);
}

#[test]
fn test_lz_buffer_end_to_end_sequential() {
    let count = 600;
    let (rows, blocks) = customer_rows(count);
    let compressed = snap::raw::Encoder::new().compress_vec(&rows).unwrap();

    let buffer = decompress(&compressed, CompressionType::Snappy).unwrap();
    let schema = customer_schema();
    let mut columns = ColumnSet::for_schema(&schema, count);
    RowDecoder::new(&schema, DecodeConfig::new().sequential())
        .decode(buffer.as_bytes(), &blocks, &mut columns)
        .unwrap();

    check_customers(&columns, count);
}
