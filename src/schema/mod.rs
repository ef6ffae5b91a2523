//! Flattened schema consumed by the row decoder.
//!
//! The schema is produced externally (from a file's metadata section) as a
//! pre-order node list plus a global string dictionary for enum symbols.
//! [`SchemaDescriptor::from_tree`] builds the same layout from a nested
//! [`SchemaTree`].

mod descriptor;
mod types;

pub use descriptor::{SchemaDescriptor, MAX_NESTING_DEPTH};
pub use types::*;
