//! Flattened schema node types.
//!
//! A schema tree is stored as a pre-order list of [`SchemaNode`]s. Each node
//! records how many flattened descendants follow it, so a whole subtree can be
//! skipped by jumping `1 + subtree_count` entries ahead.

/// Kind of a flattened schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaKind {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,
    /// Dictionary-encoded string, resolved through the global dictionary
    Enum,
    /// Record; children are the fields in order
    Record,
    /// Union; children are the branches in order
    Union,
    /// Array; the single child subtree is the item schema
    Array,
}

impl SchemaKind {
    /// Whether nodes of this kind own child subtrees
    pub fn is_container(&self) -> bool {
        matches!(self, SchemaKind::Record | SchemaKind::Union | SchemaKind::Array)
    }

    /// Storage class of the output column a node of this kind writes to.
    ///
    /// Records and unions write no values of their own.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            SchemaKind::Null => Some(ColumnType::Null),
            SchemaKind::Boolean => Some(ColumnType::Boolean),
            SchemaKind::Int => Some(ColumnType::Int),
            SchemaKind::Long | SchemaKind::Array => Some(ColumnType::Long),
            SchemaKind::Float => Some(ColumnType::Float),
            SchemaKind::Double => Some(ColumnType::Double),
            SchemaKind::Bytes | SchemaKind::String | SchemaKind::Enum => Some(ColumnType::Bytes),
            SchemaKind::Record | SchemaKind::Union => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SchemaKind::Null => "null",
            SchemaKind::Boolean => "boolean",
            SchemaKind::Int => "int",
            SchemaKind::Long => "long",
            SchemaKind::Float => "float",
            SchemaKind::Double => "double",
            SchemaKind::Bytes => "bytes",
            SchemaKind::String => "string",
            SchemaKind::Enum => "enum",
            SchemaKind::Record => "record",
            SchemaKind::Union => "union",
            SchemaKind::Array => "array",
        }
    }
}

impl std::fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Physical storage of an output column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// Validity only, no value slots
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    /// Borrowed byte views (string, bytes and enum symbols)
    Bytes,
}

/// One entry of the pre-order flattened schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaNode {
    pub kind: SchemaKind,
    /// Number of flattened nodes below this one
    pub subtree_count: u32,
    /// First dictionary entry of an enum's symbols
    pub dictionary_base: u32,
    /// Output column written by this node, if any
    pub column: Option<usize>,
}

impl SchemaNode {
    /// A leaf node writing to `column`.
    pub fn leaf(kind: SchemaKind, column: Option<usize>) -> Self {
        Self {
            kind,
            subtree_count: 0,
            dictionary_base: 0,
            column,
        }
    }

    /// A container node spanning `subtree_count` descendants.
    pub fn container(kind: SchemaKind, subtree_count: u32, column: Option<usize>) -> Self {
        Self {
            kind,
            subtree_count,
            dictionary_base: 0,
            column,
        }
    }

    /// An enum node whose symbols start at `dictionary_base`.
    pub fn enumeration(dictionary_base: u32, column: Option<usize>) -> Self {
        Self {
            kind: SchemaKind::Enum,
            subtree_count: 0,
            dictionary_base,
            column,
        }
    }

    /// Index just past this node's subtree, given the node's own index
    #[inline]
    pub fn subtree_end(&self, index: usize) -> usize {
        index + 1 + self.subtree_count as usize
    }
}

/// Location of one dictionary string inside the dictionary data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DictionaryEntry {
    pub offset: u32,
    pub length: u32,
}

/// Nested schema used to build a flattened descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaTree {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,
    /// Enum with its symbols in ordinal order
    Enum(Vec<String>),
    Array(Box<SchemaTree>),
    Record(Vec<SchemaTree>),
    Union(Vec<SchemaTree>),
}

impl SchemaTree {
    pub fn array(item: SchemaTree) -> Self {
        SchemaTree::Array(Box::new(item))
    }

    /// `[null, inner]`, the usual nullable field
    pub fn nullable(inner: SchemaTree) -> Self {
        SchemaTree::Union(vec![SchemaTree::Null, inner])
    }

    pub fn enumeration<S: Into<String>>(symbols: impl IntoIterator<Item = S>) -> Self {
        SchemaTree::Enum(symbols.into_iter().map(Into::into).collect())
    }
}
