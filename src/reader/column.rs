//! Output column buffers filled by the row decoder.
//!
//! Each schema column gets a pre-sized value vector (one slot per output row),
//! a validity bitmap and a null counter. Value slots are handed to decode
//! tasks as disjoint mutable sub-slices; the bitmap and counter are shared
//! between tasks and only updated atomically.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::schema::{ColumnType, SchemaDescriptor};

/// Non-owning view of string/bytes data inside the decompressed buffer.
///
/// The default view is null.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ByteView<'a>(Option<&'a [u8]>);

impl<'a> ByteView<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self(Some(bytes))
    }

    pub fn null() -> Self {
        Self(None)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        self.0
    }

    /// The view as UTF-8, `None` when null or not valid UTF-8
    pub fn as_str(&self) -> Option<&'a str> {
        self.0.and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Length in bytes; zero for a null view
    pub fn len(&self) -> usize {
        self.0.map_or(0, <[u8]>::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One validity bit per row; a set bit means the value is present.
#[derive(Debug)]
pub struct ValidityBitmap {
    words: Vec<AtomicU32>,
    len: usize,
}

impl ValidityBitmap {
    /// Bitmap of `len` rows, all valid
    pub fn all_valid(len: usize) -> Self {
        let word_count = len.div_ceil(32);
        let words = (0..word_count)
            .map(|w| {
                let bits = (len - w * 32).min(32);
                AtomicU32::new(if bits == 32 { u32::MAX } else { (1u32 << bits) - 1 })
            })
            .collect();
        Self { words, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_valid(&self, row: usize) -> bool {
        row < self.len && self.words[row / 32].load(Ordering::Relaxed) & (1 << (row % 32)) != 0
    }

    /// Clear the validity bit of `row`; ignored past the end
    pub fn clear(&self, row: usize) {
        if row < self.len {
            self.words[row / 32].fetch_and(!(1u32 << (row % 32)), Ordering::Relaxed);
        }
    }

    /// Number of rows whose bit is cleared
    pub fn count_invalid(&self) -> usize {
        let set: usize = self
            .words
            .iter()
            .map(|w| w.load(Ordering::Relaxed).count_ones() as usize)
            .sum();
        self.len - set
    }
}

/// Typed value slots of one output column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData<'a> {
    /// Validity only
    Null,
    Boolean(Vec<bool>),
    Int(Vec<i32>),
    Long(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Bytes(Vec<ByteView<'a>>),
}

impl<'a> ColumnData<'a> {
    fn zeroed(column_type: ColumnType, rows: usize) -> Self {
        match column_type {
            ColumnType::Null => ColumnData::Null,
            ColumnType::Boolean => ColumnData::Boolean(vec![false; rows]),
            ColumnType::Int => ColumnData::Int(vec![0; rows]),
            ColumnType::Long => ColumnData::Long(vec![0; rows]),
            ColumnType::Float => ColumnData::Float(vec![0.0; rows]),
            ColumnType::Double => ColumnData::Double(vec![0.0; rows]),
            ColumnType::Bytes => ColumnData::Bytes(vec![ByteView::null(); rows]),
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnData::Null => ColumnType::Null,
            ColumnData::Boolean(_) => ColumnType::Boolean,
            ColumnData::Int(_) => ColumnType::Int,
            ColumnData::Long(_) => ColumnType::Long,
            ColumnData::Float(_) => ColumnType::Float,
            ColumnData::Double(_) => ColumnType::Double,
            ColumnData::Bytes(_) => ColumnType::Bytes,
        }
    }

    pub fn as_booleans(&self) -> Option<&[bool]> {
        match self {
            ColumnData::Boolean(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ints(&self) -> Option<&[i32]> {
        match self {
            ColumnData::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_longs(&self) -> Option<&[i64]> {
        match self {
            ColumnData::Long(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_floats(&self) -> Option<&[f32]> {
        match self {
            ColumnData::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_doubles(&self) -> Option<&[f64]> {
        match self {
            ColumnData::Double(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_views(&self) -> Option<&[ByteView<'a>]> {
        match self {
            ColumnData::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn slots_mut(&mut self) -> Slots<'_, 'a> {
        match self {
            ColumnData::Null => Slots::Null,
            ColumnData::Boolean(v) => Slots::Boolean(v),
            ColumnData::Int(v) => Slots::Int(v),
            ColumnData::Long(v) => Slots::Long(v),
            ColumnData::Float(v) => Slots::Float(v),
            ColumnData::Double(v) => Slots::Double(v),
            ColumnData::Bytes(v) => Slots::Bytes(v),
        }
    }
}

/// A decoded column: values, validity and null count
#[derive(Debug)]
pub struct OutputColumn<'a> {
    data: ColumnData<'a>,
    validity: ValidityBitmap,
    null_count: AtomicU64,
}

impl<'a> OutputColumn<'a> {
    pub fn new(column_type: ColumnType, rows: usize) -> Self {
        Self {
            data: ColumnData::zeroed(column_type, rows),
            validity: ValidityBitmap::all_valid(rows),
            null_count: AtomicU64::new(0),
        }
    }

    pub fn data(&self) -> &ColumnData<'a> {
        &self.data
    }

    pub fn into_data(self) -> ColumnData<'a> {
        self.data
    }

    pub fn validity(&self) -> &ValidityBitmap {
        &self.validity
    }

    pub fn is_valid(&self, row: usize) -> bool {
        self.validity.is_valid(row)
    }

    /// Number of null branches taken for this column
    pub fn null_count(&self) -> u64 {
        self.null_count.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.validity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validity.is_empty()
    }

    /// Split into value slots and the shared null-tracking state
    pub(crate) fn split_for_decode(&mut self) -> (Slots<'_, 'a>, NullTracker<'_>) {
        (
            self.data.slots_mut(),
            NullTracker {
                validity: &self.validity,
                null_count: &self.null_count,
            },
        )
    }
}

/// Caller-owned output buffers for every column of a schema
#[derive(Debug)]
pub struct ColumnSet<'a> {
    columns: Vec<OutputColumn<'a>>,
    max_rows: usize,
}

impl<'a> ColumnSet<'a> {
    /// Allocate `max_rows` zeroed, valid slots for every schema column.
    pub fn for_schema(schema: &SchemaDescriptor, max_rows: usize) -> Self {
        Self::from_columns(
            schema
                .column_types()
                .iter()
                .map(|&t| OutputColumn::new(t, max_rows))
                .collect(),
            max_rows,
        )
    }

    pub fn from_columns(columns: Vec<OutputColumn<'a>>, max_rows: usize) -> Self {
        Self { columns, max_rows }
    }

    pub fn columns(&self) -> &[OutputColumn<'a>] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&OutputColumn<'a>> {
        self.columns.get(index)
    }

    pub fn into_columns(self) -> Vec<OutputColumn<'a>> {
        self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    pub(crate) fn columns_mut(&mut self) -> &mut [OutputColumn<'a>] {
        &mut self.columns
    }
}

/// Shared, atomically updated null state of one column
#[derive(Debug, Clone, Copy)]
pub(crate) struct NullTracker<'s> {
    validity: &'s ValidityBitmap,
    null_count: &'s AtomicU64,
}

impl NullTracker<'_> {
    pub(crate) fn mark_null(&self, row: usize) {
        self.validity.clear(row);
        self.null_count.fetch_add(1, Ordering::Relaxed);
    }
}

/// Mutable value slots for a contiguous range of output rows
#[derive(Debug)]
pub(crate) enum Slots<'s, 'a> {
    Null,
    Boolean(&'s mut [bool]),
    Int(&'s mut [i32]),
    Long(&'s mut [i64]),
    Float(&'s mut [f32]),
    Double(&'s mut [f64]),
    Bytes(&'s mut [ByteView<'a>]),
}

impl<'s, 'a> Slots<'s, 'a> {
    /// Split at `mid` rows (clamped to the slot count)
    pub(crate) fn split_at(self, mid: usize) -> (Self, Self) {
        fn split<T>(slots: &mut [T], mid: usize) -> (&mut [T], &mut [T]) {
            let mid = mid.min(slots.len());
            slots.split_at_mut(mid)
        }
        match self {
            Slots::Null => (Slots::Null, Slots::Null),
            Slots::Boolean(v) => {
                let (a, b) = split(v, mid);
                (Slots::Boolean(a), Slots::Boolean(b))
            }
            Slots::Int(v) => {
                let (a, b) = split(v, mid);
                (Slots::Int(a), Slots::Int(b))
            }
            Slots::Long(v) => {
                let (a, b) = split(v, mid);
                (Slots::Long(a), Slots::Long(b))
            }
            Slots::Float(v) => {
                let (a, b) = split(v, mid);
                (Slots::Float(a), Slots::Float(b))
            }
            Slots::Double(v) => {
                let (a, b) = split(v, mid);
                (Slots::Double(a), Slots::Double(b))
            }
            Slots::Bytes(v) => {
                let (a, b) = split(v, mid);
                (Slots::Bytes(a), Slots::Bytes(b))
            }
        }
    }
}

/// Write access to a contiguous range of output rows across all columns.
///
/// Rows outside `[start, start + len)` are silently dropped, which is how
/// rows outside the caller's window or already written by an overlapping
/// block are kept out of the output.
#[derive(Debug)]
pub(crate) struct RowSink<'s, 'a> {
    start: usize,
    len: usize,
    slots: Vec<Slots<'s, 'a>>,
    nulls: &'s [NullTracker<'s>],
}

impl<'s, 'a> RowSink<'s, 'a> {
    pub(crate) fn new(
        start: usize,
        len: usize,
        slots: Vec<Slots<'s, 'a>>,
        nulls: &'s [NullTracker<'s>],
    ) -> Self {
        Self {
            start,
            len,
            slots,
            nulls,
        }
    }

    #[cfg(test)]
    pub(crate) fn start(&self) -> usize {
        self.start
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Split off the rows from `row` (an absolute output row) onwards.
    pub(crate) fn split_at(self, row: usize) -> (Self, Self) {
        let mid = row.saturating_sub(self.start).min(self.len);
        let mut head = Vec::with_capacity(self.slots.len());
        let mut tail = Vec::with_capacity(self.slots.len());
        for slots in self.slots {
            let (a, b) = slots.split_at(mid);
            head.push(a);
            tail.push(b);
        }
        (
            Self {
                start: self.start,
                len: mid,
                slots: head,
                nulls: self.nulls,
            },
            Self {
                start: self.start + mid,
                len: self.len - mid,
                slots: tail,
                nulls: self.nulls,
            },
        )
    }

    /// Slot offset for `row`, if this sink owns it
    #[inline]
    fn local(&self, row: Option<usize>) -> Option<usize> {
        let row = row?;
        let local = row.checked_sub(self.start)?;
        (local < self.len).then_some(local)
    }

    #[inline]
    pub(crate) fn writable(&self, row: Option<usize>) -> bool {
        self.local(row).is_some()
    }

    pub(crate) fn set_null(&mut self, column: usize, row: Option<usize>) {
        if self.local(row).is_some() {
            if let (Some(tracker), Some(row)) = (self.nulls.get(column), row) {
                tracker.mark_null(row);
            }
        }
    }

    pub(crate) fn set_boolean(&mut self, column: usize, row: Option<usize>, value: bool) {
        if let Some(i) = self.local(row) {
            if let Some(Slots::Boolean(v)) = self.slots.get_mut(column) {
                v[i] = value;
            }
        }
    }

    /// Store an integer, truncated to 32 bits for int columns
    pub(crate) fn set_integer(&mut self, column: usize, row: Option<usize>, value: i64) {
        if let Some(i) = self.local(row) {
            match self.slots.get_mut(column) {
                Some(Slots::Int(v)) => v[i] = value as i32,
                Some(Slots::Long(v)) => v[i] = value,
                _ => {}
            }
        }
    }

    pub(crate) fn set_float(&mut self, column: usize, row: Option<usize>, value: f32) {
        if let Some(i) = self.local(row) {
            if let Some(Slots::Float(v)) = self.slots.get_mut(column) {
                v[i] = value;
            }
        }
    }

    pub(crate) fn set_double(&mut self, column: usize, row: Option<usize>, value: f64) {
        if let Some(i) = self.local(row) {
            if let Some(Slots::Double(v)) = self.slots.get_mut(column) {
                v[i] = value;
            }
        }
    }

    pub(crate) fn set_view(&mut self, column: usize, row: Option<usize>, view: ByteView<'a>) {
        if let Some(i) = self.local(row) {
            if let Some(Slots::Bytes(v)) = self.slots.get_mut(column) {
                v[i] = view;
            }
        }
    }
}
