#![forbid(unsafe_code)]

use tracing::warn;

use crate::columns::{FieldId, TableDef};
use crate::{Index, IndexKey, TypedValue};

/// One cached row. Immutable once built; a newer generation replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowContext {
    index: Index,
    key: IndexKey,
    values: Box<[TypedValue]>,
}

impl RowContext {
    pub fn index(&self) -> Index { self.index }
    pub fn key(&self) -> &IndexKey { &self.key }

    /// Value at a field slot (see [`TableDef::slot`]).
    pub fn value(&self, slot: usize) -> Option<&TypedValue> { self.values.get(slot) }

    pub fn field(&self, def: &TableDef, id: FieldId) -> Option<&TypedValue> {
        def.slot(id).and_then(|s| self.values.get(s))
    }
}

/// Populates a row during reload. Every field starts at its kind's zero value.
pub struct RowBuilder<'d> {
    def: &'d TableDef,
    index: Index,
    key: IndexKey,
    values: Vec<TypedValue>,
}

impl<'d> RowBuilder<'d> {
    pub fn new(def: &'d TableDef, index: Index, key: IndexKey) -> Self {
        let values = def.fields().iter().map(|f| f.kind.zero()).collect();
        Self { def, index, key, values }
    }

    /// Store a field value. Values outside the declared kind/size contract are
    /// replaced by the zero value; returns whether the value was accepted.
    pub fn set(&mut self, id: FieldId, value: TypedValue) -> bool {
        let Some(slot) = self.def.slot(id) else {
            warn!(table = self.def.name(), field = id, "undeclared field");
            return false;
        };
        let spec = &self.def.fields()[slot];
        if !spec.kind.admits(&value) {
            warn!(table = self.def.name(), field = spec.name, index = %self.index, got = value.kind_name(), "field value violates declared kind; using zero");
            self.values[slot] = spec.kind.zero();
            return false;
        }
        self.values[slot] = value;
        true
    }

    pub fn finish(self) -> RowContext {
        RowContext { index: self.index, key: self.key, values: self.values.into_boxed_slice() }
    }
}
