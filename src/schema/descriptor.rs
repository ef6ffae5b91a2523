//! Validated flattened schema plus the global enum dictionary.

use bytes::Bytes;

use crate::error::SchemaError;

use super::types::{ColumnType, DictionaryEntry, SchemaKind, SchemaNode, SchemaTree};

/// Deepest node nesting accepted; row decoding recurses once per level
pub const MAX_NESTING_DEPTH: usize = 256;

/// Flattened schema shared read-only by every decode worker.
///
/// Construction validates the subtree counts, so decoders can skip and
/// re-enter subtrees without bounds surprises.
#[derive(Debug, Clone)]
pub struct SchemaDescriptor {
    nodes: Vec<SchemaNode>,
    dictionary: Vec<DictionaryEntry>,
    dictionary_data: Bytes,
    column_types: Vec<ColumnType>,
}

impl SchemaDescriptor {
    /// Validate and wrap a flattened schema.
    ///
    /// # Errors
    /// `SchemaError::InvalidSchema` when:
    /// - a leaf has a non-zero `subtree_count`
    /// - a container's children do not tile its subtree exactly
    /// - an array does not have exactly one item subtree, or a union has no branch
    /// - the top-level subtrees do not tile the node list
    /// - nodes nest [`MAX_NESTING_DEPTH`] levels or deeper
    /// - a dictionary entry lies outside `dictionary_data`
    /// - an enum's `dictionary_base` lies past the dictionary
    /// - a record or union claims an output column, or two nodes sharing a
    ///   column disagree on its storage
    pub fn new(
        nodes: Vec<SchemaNode>,
        dictionary: Vec<DictionaryEntry>,
        dictionary_data: impl Into<Bytes>,
    ) -> Result<Self, SchemaError> {
        let dictionary_data = dictionary_data.into();

        for (i, entry) in dictionary.iter().enumerate() {
            let end = entry.offset as u64 + entry.length as u64;
            if end > dictionary_data.len() as u64 {
                return Err(SchemaError::InvalidSchema(format!(
                    "dictionary entry {} ({}..{}) lies outside {} bytes of dictionary data",
                    i,
                    entry.offset,
                    end,
                    dictionary_data.len()
                )));
            }
        }

        let mut i = 0;
        while i < nodes.len() {
            i = validate_subtree(&nodes, i, nodes.len(), 0)?;
        }

        let column_types = assign_column_types(&nodes, dictionary.len())?;

        Ok(Self {
            nodes,
            dictionary,
            dictionary_data,
            column_types,
        })
    }

    /// Flatten a nested schema tree in pre-order.
    ///
    /// Every value leaf and every array gets its own output column (an array's
    /// column holds the row's item count). A union's `null` branches share the
    /// column of its first non-null leaf or array branch, so selecting `null`
    /// clears that column's validity. Enum symbols are appended to the global
    /// dictionary.
    pub fn from_tree(tree: &SchemaTree) -> Result<Self, SchemaError> {
        let mut builder = Flattener::default();
        match tree {
            // A top-level record's fields become the top-level subtrees
            SchemaTree::Record(fields) => {
                for field in fields {
                    builder.push(field);
                }
            }
            other => {
                builder.push(other);
            }
        }
        Self::new(builder.nodes, builder.dictionary, builder.data)
    }

    pub fn nodes(&self) -> &[SchemaNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.column_types.len()
    }

    /// Storage class of output column `column`
    pub fn column_type(&self, column: usize) -> Option<ColumnType> {
        self.column_types.get(column).copied()
    }

    pub fn column_types(&self) -> &[ColumnType] {
        &self.column_types
    }

    pub fn dictionary(&self) -> &[DictionaryEntry] {
        &self.dictionary
    }

    /// Bytes of dictionary entry `index`, or `None` when out of range
    #[inline]
    pub fn dictionary_entry(&self, index: usize) -> Option<&[u8]> {
        let entry = self.dictionary.get(index)?;
        let start = entry.offset as usize;
        self.dictionary_data.get(start..start + entry.length as usize)
    }

    /// Smallest number of bytes a well-formed row can occupy.
    ///
    /// A block whose byte size equals this times its row count consists of
    /// fixed-width rows only.
    pub fn min_row_size(&self) -> usize {
        let mut total = 0;
        let mut i = 0;
        while i < self.nodes.len() {
            let (size, next) = self.min_subtree_size(i);
            total += size;
            i = next;
        }
        total
    }

    fn min_subtree_size(&self, i: usize) -> (usize, usize) {
        let node = &self.nodes[i];
        let end = node.subtree_end(i);
        let size = match node.kind {
            SchemaKind::Null => 0,
            SchemaKind::Float => 4,
            SchemaKind::Double => 8,
            SchemaKind::Boolean
            | SchemaKind::Int
            | SchemaKind::Long
            | SchemaKind::Enum
            | SchemaKind::String
            | SchemaKind::Bytes => 1,
            // Only the block count; an empty array has no items
            SchemaKind::Array => 1,
            SchemaKind::Record => {
                let mut sum = 0;
                let mut j = i + 1;
                while j < end {
                    let (size, next) = self.min_subtree_size(j);
                    sum += size;
                    j = next;
                }
                sum
            }
            SchemaKind::Union => {
                let mut min = usize::MAX;
                let mut j = i + 1;
                while j < end {
                    let (size, next) = self.min_subtree_size(j);
                    min = min.min(size);
                    j = next;
                }
                1 + if min == usize::MAX { 0 } else { min }
            }
        };
        (size, end)
    }
}

/// Check the subtree rooted at `i`, which must end at or before `limit`.
/// Returns the index just past it.
fn validate_subtree(
    nodes: &[SchemaNode],
    i: usize,
    limit: usize,
    depth: usize,
) -> Result<usize, SchemaError> {
    let node = &nodes[i];
    if depth >= MAX_NESTING_DEPTH {
        return Err(SchemaError::InvalidSchema(format!(
            "node {} ({}) nests {} levels deep, limit is {}",
            i, node.kind, depth, MAX_NESTING_DEPTH
        )));
    }
    let end = node.subtree_end(i);
    if end > limit {
        return Err(SchemaError::InvalidSchema(format!(
            "node {} ({}) spans {} descendants, past the end of its parent at {}",
            i, node.kind, node.subtree_count, limit
        )));
    }

    if !node.kind.is_container() {
        if node.subtree_count != 0 {
            return Err(SchemaError::InvalidSchema(format!(
                "leaf node {} ({}) has subtree_count {}",
                i, node.kind, node.subtree_count
            )));
        }
        return Ok(end);
    }

    let mut children = 0;
    let mut j = i + 1;
    while j < end {
        j = validate_subtree(nodes, j, end, depth + 1)?;
        children += 1;
    }

    match node.kind {
        SchemaKind::Array if children != 1 => Err(SchemaError::InvalidSchema(format!(
            "array node {} has {} item subtrees, expected 1",
            i, children
        ))),
        SchemaKind::Union if children == 0 => Err(SchemaError::InvalidSchema(format!(
            "union node {} has no branches",
            i
        ))),
        _ => Ok(end),
    }
}

fn assign_column_types(
    nodes: &[SchemaNode],
    dictionary_len: usize,
) -> Result<Vec<ColumnType>, SchemaError> {
    let mut types: Vec<Option<ColumnType>> = Vec::new();

    for (i, node) in nodes.iter().enumerate() {
        if node.kind == SchemaKind::Enum && node.dictionary_base as usize > dictionary_len {
            return Err(SchemaError::InvalidSchema(format!(
                "enum node {} has dictionary base {} past {} dictionary entries",
                i, node.dictionary_base, dictionary_len
            )));
        }

        let Some(column) = node.column else { continue };
        let Some(column_type) = node.kind.column_type() else {
            return Err(SchemaError::InvalidSchema(format!(
                "{} node {} cannot own output column {}",
                node.kind, i, column
            )));
        };
        if types.len() <= column {
            types.resize(column + 1, None);
        }
        types[column] = match (types[column], column_type) {
            (None, t) => Some(t),
            // Null nodes only touch validity and adopt the column's storage
            (Some(existing), ColumnType::Null) => Some(existing),
            (Some(ColumnType::Null), t) => Some(t),
            (Some(existing), t) if existing == t => Some(t),
            (Some(existing), t) => {
                return Err(SchemaError::InvalidSchema(format!(
                    "column {} is shared by {:?} and {:?} nodes",
                    column, existing, t
                )))
            }
        };
    }

    Ok(types
        .into_iter()
        .map(|t| t.unwrap_or(ColumnType::Null))
        .collect())
}

#[derive(Default)]
struct Flattener {
    nodes: Vec<SchemaNode>,
    dictionary: Vec<DictionaryEntry>,
    data: Vec<u8>,
    next_column: usize,
}

impl Flattener {
    fn allocate_column(&mut self) -> usize {
        let column = self.next_column;
        self.next_column += 1;
        column
    }

    /// Append `tree` in pre-order, returning the index of its root node
    fn push(&mut self, tree: &SchemaTree) -> usize {
        let index = self.nodes.len();
        let leaf = |kind| SchemaNode::leaf(kind, None);

        match tree {
            SchemaTree::Null => self.push_leaf(leaf(SchemaKind::Null)),
            SchemaTree::Boolean => self.push_leaf(leaf(SchemaKind::Boolean)),
            SchemaTree::Int => self.push_leaf(leaf(SchemaKind::Int)),
            SchemaTree::Long => self.push_leaf(leaf(SchemaKind::Long)),
            SchemaTree::Float => self.push_leaf(leaf(SchemaKind::Float)),
            SchemaTree::Double => self.push_leaf(leaf(SchemaKind::Double)),
            SchemaTree::Bytes => self.push_leaf(leaf(SchemaKind::Bytes)),
            SchemaTree::String => self.push_leaf(leaf(SchemaKind::String)),
            SchemaTree::Enum(symbols) => {
                let base = self.dictionary.len() as u32;
                for symbol in symbols {
                    self.dictionary.push(DictionaryEntry {
                        offset: self.data.len() as u32,
                        length: symbol.len() as u32,
                    });
                    self.data.extend_from_slice(symbol.as_bytes());
                }
                self.push_leaf(SchemaNode::enumeration(base, None));
            }
            SchemaTree::Array(item) => {
                let column = self.allocate_column();
                self.nodes
                    .push(SchemaNode::container(SchemaKind::Array, 0, Some(column)));
                self.push(item);
                self.close(index);
            }
            SchemaTree::Record(fields) => {
                self.nodes
                    .push(SchemaNode::container(SchemaKind::Record, 0, None));
                for field in fields {
                    self.push(field);
                }
                self.close(index);
            }
            SchemaTree::Union(branches) => {
                self.nodes.push(SchemaNode::container(SchemaKind::Union, 0, None));
                let mut null_branches = Vec::new();
                let mut value_column = None;
                let mut value_seen = false;
                for branch in branches {
                    if matches!(branch, SchemaTree::Null) {
                        let at = self.nodes.len();
                        self.nodes.push(SchemaNode::leaf(SchemaKind::Null, None));
                        null_branches.push(at);
                    } else {
                        let at = self.push(branch);
                        if !value_seen {
                            value_seen = true;
                            value_column = self.nodes[at].column;
                        }
                    }
                }
                // A union of nulls only still records its nulls somewhere
                if !value_seen && !null_branches.is_empty() {
                    value_column = Some(self.allocate_column());
                }
                for at in null_branches {
                    self.nodes[at].column = value_column;
                }
                self.close(index);
            }
        }
        index
    }

    fn push_leaf(&mut self, mut node: SchemaNode) {
        node.column = Some(self.allocate_column());
        self.nodes.push(node);
    }

    fn close(&mut self, index: usize) {
        self.nodes[index].subtree_count = (self.nodes.len() - index - 1) as u32;
    }
}
