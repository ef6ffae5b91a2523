//! Recursive-descent decoding of one encoded row.
//!
//! The cursor walks the flattened schema from the first top-level node to the
//! end of the node list, consuming bytes from the block span and writing each
//! leaf into its output column. Decoding never fails: reads past the span
//! yield zeros or null views, and an invalid union branch halts the rest of
//! the row, leaving the remaining columns at their defaults.

use crate::schema::{SchemaDescriptor, SchemaKind};

use super::column::{ByteView, RowSink};
use super::varint::{read_varint, read_zigzag};

/// Decode one row starting at `pos`, reading no further than `end`.
///
/// `row` is the output row the values go to, or `None` when the row is only
/// parsed to advance the cursor. Returns the position after the row, which
/// may exceed `end` for truncated fixed-width fields.
///
/// Enum views borrow from the schema's dictionary, so the schema must live as
/// long as the data.
pub(crate) fn decode_row<'a>(
    schema: &'a SchemaDescriptor,
    data: &'a [u8],
    pos: usize,
    end: usize,
    row: Option<usize>,
    sink: &mut RowSink<'_, 'a>,
) -> usize {
    let row = row.filter(|_| sink.writable(row));
    let mut cursor = RowCursor {
        schema,
        data,
        pos,
        end: end.min(data.len()),
        row,
        sink,
        halted: false,
    };
    let mut i = 0;
    while i < schema.len() {
        i = cursor.decode_node(i);
    }
    cursor.pos
}

struct RowCursor<'r, 's, 'a> {
    schema: &'a SchemaDescriptor,
    data: &'a [u8],
    pos: usize,
    end: usize,
    row: Option<usize>,
    sink: &'r mut RowSink<'s, 'a>,
    halted: bool,
}

impl<'a> RowCursor<'_, '_, 'a> {
    /// Decode the subtree at node `i`, returning the index just past it
    fn decode_node(&mut self, i: usize) -> usize {
        let node = self.schema.nodes()[i];
        let next = node.subtree_end(i);
        if self.halted {
            return next;
        }

        match node.kind {
            SchemaKind::Null => {
                if let Some(column) = node.column {
                    self.sink.set_null(column, self.row);
                }
            }
            SchemaKind::Boolean => {
                if self.pos < self.end {
                    let value = self.data[self.pos] != 0;
                    if let Some(column) = node.column {
                        self.sink.set_boolean(column, self.row, value);
                    }
                }
                self.pos += 1;
            }
            SchemaKind::Int | SchemaKind::Long => {
                let value = read_zigzag(self.data, &mut self.pos, self.end);
                if let Some(column) = node.column {
                    self.sink.set_integer(column, self.row, value);
                }
            }
            SchemaKind::Float => {
                let value = self
                    .fixed::<4>()
                    .map_or(0.0, f32::from_le_bytes);
                if let Some(column) = node.column {
                    self.sink.set_float(column, self.row, value);
                }
            }
            SchemaKind::Double => {
                let value = self
                    .fixed::<8>()
                    .map_or(0.0, f64::from_le_bytes);
                if let Some(column) = node.column {
                    self.sink.set_double(column, self.row, value);
                }
            }
            SchemaKind::String | SchemaKind::Bytes => {
                let len = read_zigzag(self.data, &mut self.pos, self.end);
                let view = self.take_view(len);
                if let Some(column) = node.column {
                    self.sink.set_view(column, self.row, view);
                }
            }
            SchemaKind::Enum => {
                let ordinal = read_zigzag(self.data, &mut self.pos, self.end);
                let view = usize::try_from(ordinal)
                    .ok()
                    .and_then(|o| o.checked_add(node.dictionary_base as usize))
                    .and_then(|index| self.schema.dictionary_entry(index))
                    .map_or(ByteView::null(), ByteView::new);
                if let Some(column) = node.column {
                    self.sink.set_view(column, self.row, view);
                }
            }
            SchemaKind::Record => {
                let mut j = i + 1;
                while j < next {
                    j = self.decode_node(j);
                }
            }
            SchemaKind::Union => {
                let branch = self.discriminant();
                match self.union_branch(i, next, branch) {
                    Some(j) => {
                        self.decode_node(j);
                    }
                    None => self.halted = true,
                }
            }
            SchemaKind::Array => {
                let items = self.decode_array(i + 1);
                if let Some(column) = node.column {
                    self.sink
                        .set_integer(column, self.row, i64::try_from(items).unwrap_or(i64::MAX));
                }
            }
        }
        next
    }

    /// Read `N` little-endian bytes if they are all inside the span.
    /// The cursor advances by `N` either way.
    fn fixed<const N: usize>(&mut self) -> Option<[u8; N]> {
        let start = self.pos;
        self.pos += N;
        if self.pos <= self.end {
            let mut bytes = [0u8; N];
            bytes.copy_from_slice(&self.data[start..self.pos]);
            Some(bytes)
        } else {
            None
        }
    }

    /// View of the next `len` bytes, or a null view when `len` is negative
    /// or runs past the span (the cursor then stays put)
    fn take_view(&mut self, len: i64) -> ByteView<'a> {
        let Ok(len) = usize::try_from(len) else {
            return ByteView::null();
        };
        if self.pos > self.end || len > self.end - self.pos {
            return ByteView::null();
        }
        let view = ByteView::new(&self.data[self.pos..self.pos + len]);
        self.pos += len;
        view
    }

    /// One raw discriminant byte; 0 once the span is exhausted
    fn discriminant(&mut self) -> usize {
        if self.pos < self.end {
            let byte = self.data[self.pos];
            self.pos += 1;
            byte as usize
        } else {
            0
        }
    }

    /// Node index of union branch `branch` among the children of node `i`
    fn union_branch(&self, i: usize, end: usize, branch: usize) -> Option<usize> {
        let nodes = self.schema.nodes();
        let mut j = i + 1;
        for _ in 0..branch {
            if j >= end {
                return None;
            }
            j = nodes[j].subtree_end(j);
        }
        (j < end).then_some(j)
    }

    /// Decode the blocks of an array whose item subtree starts at `item`,
    /// returning the number of items seen.
    ///
    /// Leaves under the array keep the value of the last decoded item.
    fn decode_array(&mut self, item: usize) -> u64 {
        let mut total: u64 = 0;

        'blocks: while self.pos < self.end {
            let count = read_zigzag(self.data, &mut self.pos, self.end);
            if count < 0 {
                // Negative count: a byte size follows, which is not needed
                read_varint(self.data, &mut self.pos, self.end);
            }
            let count = count.unsigned_abs();
            if count == 0 {
                break;
            }

            for k in 0..count {
                if self.pos >= self.end {
                    break 'blocks;
                }
                let before = self.pos;
                self.decode_node(item);
                total = total.saturating_add(1);
                if self.halted {
                    break 'blocks;
                }
                if self.pos == before {
                    // Zero-width items: the rest of the block decodes identically
                    total = total.saturating_add(count - k - 1);
                    break;
                }
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::column::{NullTracker, OutputColumn};
    use crate::reader::varint::encode_zigzag;
    use crate::schema::SchemaTree;

    /// Decode a single row into fresh one-row columns
    fn decode_one<'a>(
        schema: &'a SchemaDescriptor,
        data: &'a [u8],
    ) -> (usize, Vec<OutputColumn<'a>>) {
        let mut columns: Vec<OutputColumn<'a>> = schema
            .column_types()
            .iter()
            .map(|&t| OutputColumn::new(t, 1))
            .collect();
        let end;
        {
            let (slots, trackers): (Vec<_>, Vec<NullTracker<'_>>) = columns
                .iter_mut()
                .map(OutputColumn::split_for_decode)
                .unzip();
            let mut sink = RowSink::new(0, 1, slots, &trackers);
            end = decode_row(schema, data, 0, data.len(), Some(0), &mut sink);
        }
        (end, columns)
    }

    #[test]
    fn test_primitives() {
        let schema = SchemaDescriptor::from_tree(&SchemaTree::Record(vec![
            SchemaTree::Boolean,
            SchemaTree::Int,
            SchemaTree::Long,
            SchemaTree::Float,
            SchemaTree::Double,
            SchemaTree::String,
        ]))
        .unwrap();
        let mut data = vec![1u8];
        data.extend(encode_zigzag(-5));
        data.extend(encode_zigzag(1 << 40));
        data.extend(1.5f32.to_le_bytes());
        data.extend((-2.25f64).to_le_bytes());
        data.extend(encode_zigzag(3));
        data.extend(b"abc");

        let (end, columns) = decode_one(&schema, &data);
        assert_eq!(end, data.len());
        assert_eq!(columns[0].data().as_booleans(), Some(&[true][..]));
        assert_eq!(columns[1].data().as_ints(), Some(&[-5][..]));
        assert_eq!(columns[2].data().as_longs(), Some(&[1i64 << 40][..]));
        assert_eq!(columns[3].data().as_floats(), Some(&[1.5][..]));
        assert_eq!(columns[4].data().as_doubles(), Some(&[-2.25][..]));
        assert_eq!(columns[5].data().as_views().unwrap()[0].as_str(), Some("abc"));
    }

    #[test]
    fn test_int_truncated_to_32_bits() {
        let schema = SchemaDescriptor::from_tree(&SchemaTree::Int).unwrap();
        let data = encode_zigzag((1i64 << 32) + 7);
        let (_, columns) = decode_one(&schema, &data);
        assert_eq!(columns[0].data().as_ints(), Some(&[7][..]));
    }

    #[test]
    fn test_truncated_double_still_advances() {
        let schema =
            SchemaDescriptor::from_tree(&SchemaTree::Record(vec![SchemaTree::Double, SchemaTree::Int]))
                .unwrap();
        let data = [1, 2, 3];
        let (end, columns) = decode_one(&schema, &data);
        assert_eq!(end, 8);
        assert_eq!(columns[0].data().as_doubles(), Some(&[0.0][..]));
        assert_eq!(columns[1].data().as_ints(), Some(&[0][..]));
    }

    #[test]
    fn test_string_overrun_gives_null_view() {
        let schema =
            SchemaDescriptor::from_tree(&SchemaTree::Record(vec![SchemaTree::String, SchemaTree::Int]))
                .unwrap();
        let mut data = encode_zigzag(50);
        data.extend(encode_zigzag(9));
        let (end, columns) = decode_one(&schema, &data);
        assert!(columns[0].data().as_views().unwrap()[0].is_null());
        // The cursor stays after the length, so the next field still decodes
        assert_eq!(columns[1].data().as_ints(), Some(&[9][..]));
        assert_eq!(end, data.len());
    }

    #[test]
    fn test_negative_string_length_gives_null_view() {
        let schema = SchemaDescriptor::from_tree(&SchemaTree::Bytes).unwrap();
        let data = encode_zigzag(-3);
        let (_, columns) = decode_one(&schema, &data);
        assert!(columns[0].data().as_views().unwrap()[0].is_null());
    }

    #[test]
    fn test_enum_resolves_through_dictionary() {
        let schema = SchemaDescriptor::from_tree(&SchemaTree::Record(vec![
            SchemaTree::enumeration(["A", "B"]),
            SchemaTree::enumeration(["X", "Y", "Z"]),
        ]))
        .unwrap();
        let data = [0x02, 0x04];
        let (_, columns) = decode_one(&schema, &data);
        assert_eq!(columns[0].data().as_views().unwrap()[0].as_str(), Some("B"));
        assert_eq!(columns[1].data().as_views().unwrap()[0].as_str(), Some("Z"));

        let (_, columns) = decode_one(&schema, &[0x01, 0x0A]);
        assert!(columns[0].data().as_views().unwrap()[0].is_null());
        assert!(columns[1].data().as_views().unwrap()[0].is_null());
    }

    #[test]
    fn test_invalid_union_branch_halts_row() {
        let schema = SchemaDescriptor::from_tree(&SchemaTree::Record(vec![
            SchemaTree::nullable(SchemaTree::Int),
            SchemaTree::Int,
        ]))
        .unwrap();
        let (end, columns) = decode_one(&schema, &[0x04, 0x02]);
        assert_eq!(end, 1);
        assert_eq!(columns[1].data().as_ints(), Some(&[0][..]));
        assert!(columns[0].is_valid(0));
    }

    #[test]
    fn test_union_skips_nested_branch() {
        let schema = SchemaDescriptor::from_tree(&SchemaTree::Union(vec![
            SchemaTree::Record(vec![SchemaTree::Int, SchemaTree::array(SchemaTree::Long)]),
            SchemaTree::String,
        ]))
        .unwrap();
        // Discriminant byte 1 selects the string branch
        let mut data = vec![1u8];
        data.extend(encode_zigzag(2));
        data.extend(b"hi");
        let (end, columns) = decode_one(&schema, &data);
        assert_eq!(end, data.len());
        let string_column = schema.column_count() - 1;
        assert_eq!(
            columns[string_column].data().as_views().unwrap()[0].as_str(),
            Some("hi")
        );
    }

    #[test]
    fn test_array_blocks_and_negative_count() {
        let schema = SchemaDescriptor::from_tree(&SchemaTree::Record(vec![
            SchemaTree::array(SchemaTree::Int),
            SchemaTree::Int,
        ]))
        .unwrap();
        let mut data = Vec::new();
        data.extend(encode_zigzag(2));
        data.extend(encode_zigzag(10));
        data.extend(encode_zigzag(20));
        // Negative count with a byte-size prefix
        data.extend(encode_zigzag(-1));
        data.extend(encode_zigzag(1));
        data.extend(encode_zigzag(30));
        data.extend(encode_zigzag(0));
        data.extend(encode_zigzag(77));

        let (end, columns) = decode_one(&schema, &data);
        assert_eq!(end, data.len());
        assert_eq!(columns[0].data().as_longs(), Some(&[3][..]));
        assert_eq!(columns[1].data().as_ints(), Some(&[30][..]));
        assert_eq!(columns[2].data().as_ints(), Some(&[77][..]));
    }

    #[test]
    fn test_array_of_zero_width_items() {
        let schema = SchemaDescriptor::from_tree(&SchemaTree::Record(vec![
            SchemaTree::array(SchemaTree::Null),
            SchemaTree::Int,
        ]))
        .unwrap();
        let mut data = encode_zigzag(1_000_000_000);
        data.extend(encode_zigzag(0));
        data.extend(encode_zigzag(5));
        let (end, columns) = decode_one(&schema, &data);
        assert_eq!(end, data.len());
        assert_eq!(columns[0].data().as_longs(), Some(&[1_000_000_000][..]));
        assert_eq!(columns[2].data().as_ints(), Some(&[5][..]));
    }

    #[test]
    fn test_unwritable_row_only_advances() {
        let schema = SchemaDescriptor::from_tree(&SchemaTree::nullable(SchemaTree::Long)).unwrap();
        let mut column = OutputColumn::new(schema.column_types()[0], 1);
        let end;
        {
            let (slots, tracker) = column.split_for_decode();
            let trackers = [tracker];
            let mut sink = RowSink::new(0, 1, vec![slots], &trackers);
            end = decode_row(&schema, &[0x00], 0, 1, None, &mut sink);
        }
        assert_eq!(end, 1);
        assert!(column.is_valid(0));
        assert_eq!(column.null_count(), 0);
    }

    #[test]
    fn test_union_discriminant_is_one_raw_byte() {
        let schema = SchemaDescriptor::from_tree(&SchemaTree::Record(vec![
            SchemaTree::nullable(SchemaTree::Int),
        ]))
        .unwrap();
        let (end, columns) = decode_one(&schema, &[0x01, 0x01]);
        assert_eq!(end, 2);
        assert_eq!(columns[0].data().as_ints(), Some(&[-1][..]));
        assert!(columns[0].is_valid(0));

        let (end, columns) = decode_one(&schema, &[0x00]);
        assert_eq!(end, 1);
        assert!(!columns[0].is_valid(0));
        assert_eq!(columns[0].null_count(), 1);
    }

    #[test]
    fn test_huge_zero_width_array_counts_saturate() {
        let schema = SchemaDescriptor::from_tree(&SchemaTree::Record(vec![
            SchemaTree::array(SchemaTree::Null),
            SchemaTree::Int,
        ]))
        .unwrap();
        // Three blocks of |i64::MIN| zero-width items each
        let mut data = Vec::new();
        for _ in 0..3 {
            data.extend(encode_zigzag(i64::MIN));
            data.extend(encode_zigzag(0));
        }
        data.extend(encode_zigzag(0));
        data.extend(encode_zigzag(9));

        let (end, columns) = decode_one(&schema, &data);
        assert_eq!(end, data.len());
        assert_eq!(columns[0].data().as_longs(), Some(&[i64::MAX][..]));
        assert_eq!(columns[2].data().as_ints(), Some(&[9][..]));
    }
}
