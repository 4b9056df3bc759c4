//! Core types for cached, protocol-addressable tables.
//!
//! A table exposes a volatile set of external entities as rows ordered by a
//! protocol index. This crate holds the pieces every table shares: the index
//! codec, typed values, row contexts, table definitions and the
//! [`EntitySource`] seam through which rows are populated.

#![forbid(unsafe_code)]

pub mod columns;
pub mod index;
pub mod row;
pub mod value;

pub use columns::{Accessor, ColumnId, ColumnRead, ColumnSpec, DefError, FieldId, FieldSpec, ReadFn, TableDef, TableDefBuilder};
pub use index::{decode, derive_index, encode, parse_index, Index, IndexKey, MAX_INDEX};
pub use row::{RowBuilder, RowContext};
pub use value::{parse_phys_address, FieldKind, TypedValue, PHYS_ADDRESS_LEN, U64};

/// Why an entity produced no row.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    /// Intentionally excluded by the source's skip predicate.
    #[error("skipped entity {key}")]
    Skip { key: String },
    /// Natural key does not map to a valid index.
    #[error("invalid entity key {key:?}: {reason}")]
    Invalid { key: String, reason: &'static str },
}

impl IndexError {
    /// Short label used for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            IndexError::Skip { .. } => "skip",
            IndexError::Invalid { .. } => "invalid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("malformed index key: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("entity source unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced to the protocol layer. None of these leave a table half-built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error(transparent)]
    MalformedKey(#[from] KeyError),
    #[error("unknown column {0}")]
    UnknownColumn(ColumnId),
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),
}

/// Source of the entities a table is built from.
///
/// One call to [`EntitySource::enumerate`] is one pass over the store's
/// current state. Extraction must be pure: it reads the entity and never
/// mutates it, and absent source data yields the kind's zero value.
pub trait EntitySource: Send + Sync {
    type Entity;

    fn enumerate(&self) -> Result<Vec<Self::Entity>, SourceError>;

    fn natural_key<'e>(&self, entity: &'e Self::Entity) -> &'e str;

    /// Entities for which this returns true never become rows.
    fn skip(&self, _entity: &Self::Entity) -> bool { false }

    fn extract_field(&self, entity: &Self::Entity, field: FieldId) -> TypedValue;
}

pub mod prelude {
    pub use super::{
        ColumnRead, EntitySource, FieldKind, Index, IndexError, IndexKey, RowContext, SourceError, TableDef, TableError,
        TypedValue, U64,
    };
}
