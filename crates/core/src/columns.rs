//! Table definitions: declared fields and the column-id -> accessor registry.
//!
//! This module provides:
//! - Field specs (stable field ids + declared kinds) that fix a row's shape
//! - Column specs mapping a protocol column id to a typed accessor
//! - Range handling: in-range but unregistered/reserved columns read as `Skip`,
//!   out-of-range ids are `UnknownColumn`

#![forbid(unsafe_code)]

use std::ops::RangeInclusive;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::row::RowContext;
use crate::{FieldKind, TypedValue};

pub type FieldId = u32;
pub type ColumnId = u32;

/// Accessor registered once per column at table-definition time.
pub type ReadFn = Arc<dyn Fn(&RowContext) -> TypedValue + Send + Sync>;

#[derive(Clone, Debug, PartialEq)]
pub struct FieldSpec {
    pub id: FieldId,
    pub name: &'static str,
    pub kind: FieldKind,
}

#[derive(Clone)]
pub enum Accessor {
    Read(ReadFn),
    /// Syntactically valid column with no readable value (e.g. a not-accessible index column).
    Reserved,
}

#[derive(Clone)]
pub struct ColumnSpec {
    pub id: ColumnId,
    pub label: &'static str,
    pub kind: Option<FieldKind>,
    pub accessor: Accessor,
}

impl std::fmt::Debug for ColumnSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnSpec")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("kind", &self.kind)
            .field("reserved", &matches!(self.accessor, Accessor::Reserved))
            .finish()
    }
}

/// Outcome of reading one column of one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRead {
    Value(TypedValue),
    /// Column is in range but has no instance; callers report "no such instance".
    Skip,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DefError {
    #[error("duplicate field id {0}")]
    DuplicateField(FieldId),
    #[error("duplicate column id {0}")]
    DuplicateColumn(ColumnId),
    #[error("column {0} outside declared range {1}..={2}")]
    ColumnOutOfRange(ColumnId, ColumnId, ColumnId),
    #[error("column {column} refers to undeclared field {field}")]
    MissingField { column: ColumnId, field: FieldId },
}

/// Immutable shape of one table.
#[derive(Debug)]
pub struct TableDef {
    name: &'static str,
    columns_range: RangeInclusive<ColumnId>,
    fields: Vec<FieldSpec>,
    slots: FxHashMap<FieldId, usize>,
    columns: FxHashMap<ColumnId, ColumnSpec>,
}

impl TableDef {
    pub fn builder(name: &'static str, columns: RangeInclusive<ColumnId>) -> TableDefBuilder {
        TableDefBuilder { name, columns_range: columns, fields: Vec::new(), columns: Vec::new() }
    }

    pub fn name(&self) -> &'static str { self.name }
    pub fn min_column(&self) -> ColumnId { *self.columns_range.start() }
    pub fn max_column(&self) -> ColumnId { *self.columns_range.end() }
    pub fn fields(&self) -> &[FieldSpec] { &self.fields }

    /// Position of a field in a row's value array.
    pub fn slot(&self, field: FieldId) -> Option<usize> { self.slots.get(&field).copied() }

    pub fn column(&self, id: ColumnId) -> Option<&ColumnSpec> { self.columns.get(&id) }

    /// Registered columns in ascending id order.
    pub fn columns(&self) -> Vec<&ColumnSpec> {
        let mut cols: Vec<&ColumnSpec> = self.columns.values().collect();
        cols.sort_by_key(|c| c.id);
        cols
    }

    /// Dispatch a column read. Values are returned by copy.
    pub fn read(&self, row: &RowContext, column: ColumnId) -> Result<ColumnRead, crate::TableError> {
        if !self.columns_range.contains(&column) {
            tracing::error!(table = self.name, column, "unknown column");
            return Err(crate::TableError::UnknownColumn(column));
        }
        match self.columns.get(&column).map(|c| &c.accessor) {
            Some(Accessor::Read(f)) => Ok(ColumnRead::Value(f(row))),
            Some(Accessor::Reserved) | None => {
                tracing::debug!(table = self.name, column, "column is reserved; skipping");
                Ok(ColumnRead::Skip)
            }
        }
    }
}

pub struct TableDefBuilder {
    name: &'static str,
    columns_range: RangeInclusive<ColumnId>,
    fields: Vec<FieldSpec>,
    columns: Vec<PendingColumn>,
}

enum PendingColumn {
    Field { id: ColumnId, label: &'static str, field: FieldId },
    Reserved { id: ColumnId, label: &'static str },
}

impl TableDefBuilder {
    pub fn field(mut self, id: FieldId, name: &'static str, kind: FieldKind) -> Self {
        self.fields.push(FieldSpec { id, name, kind });
        self
    }

    /// Declare a field and expose it under a column with the same id.
    pub fn field_column(self, id: ColumnId, name: &'static str, kind: FieldKind) -> Self {
        self.field(id, name, kind).column(id, name, id)
    }

    pub fn column(mut self, id: ColumnId, label: &'static str, field: FieldId) -> Self {
        self.columns.push(PendingColumn::Field { id, label, field });
        self
    }

    pub fn reserved(mut self, id: ColumnId, label: &'static str) -> Self {
        self.columns.push(PendingColumn::Reserved { id, label });
        self
    }

    pub fn build(self) -> Result<TableDef, DefError> {
        let mut slots: FxHashMap<FieldId, usize> = FxHashMap::default();
        for (i, f) in self.fields.iter().enumerate() {
            if slots.insert(f.id, i).is_some() { return Err(DefError::DuplicateField(f.id)); }
        }
        let (lo, hi) = (*self.columns_range.start(), *self.columns_range.end());
        let mut columns: FxHashMap<ColumnId, ColumnSpec> = FxHashMap::default();
        for pc in self.columns {
            let spec = match pc {
                PendingColumn::Field { id, label, field } => {
                    let slot = *slots.get(&field).ok_or(DefError::MissingField { column: id, field })?;
                    let kind = self.fields[slot].kind;
                    let read: ReadFn = Arc::new(move |row: &RowContext| row.value(slot).cloned().unwrap_or_else(|| kind.zero()));
                    ColumnSpec { id, label, kind: Some(kind), accessor: Accessor::Read(read) }
                }
                PendingColumn::Reserved { id, label } => ColumnSpec { id, label, kind: None, accessor: Accessor::Reserved },
            };
            if spec.id < lo || spec.id > hi { return Err(DefError::ColumnOutOfRange(spec.id, lo, hi)); }
            let id = spec.id;
            if columns.insert(id, spec).is_some() { return Err(DefError::DuplicateColumn(id)); }
        }
        Ok(TableDef { name: self.name, columns_range: self.columns_range, fields: self.fields, slots, columns })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{encode, parse_index, RowBuilder, TableError};

    fn def() -> TableDef {
        TableDef::builder("t", 1..=5)
            .reserved(1, "idx")
            .field_column(2, "name", FieldKind::OctetString { max_len: 8 })
            .field_column(3, "octets", FieldKind::Counter32)
            .field(10, "hidden", FieldKind::Integer32)
            .build()
            .unwrap()
    }

    #[test]
    fn dispatches_by_column_id() {
        let d = def();
        let idx = parse_index("4").unwrap();
        let mut b = RowBuilder::new(&d, idx, encode(idx));
        b.set(3, TypedValue::Counter32(1000));
        let row = b.finish();
        assert_eq!(d.read(&row, 3).unwrap(), ColumnRead::Value(TypedValue::Counter32(1000)));
        // unpopulated field reads as its zero value
        assert_eq!(d.read(&row, 2).unwrap(), ColumnRead::Value(TypedValue::OctetString(Vec::new())));
    }

    #[test]
    fn reserved_and_unregistered_in_range_skip() {
        let d = def();
        let idx = parse_index("1").unwrap();
        let row = RowBuilder::new(&d, idx, encode(idx)).finish();
        assert_eq!(d.read(&row, 1).unwrap(), ColumnRead::Skip);
        assert_eq!(d.read(&row, 5).unwrap(), ColumnRead::Skip);
        assert_eq!(d.read(&row, 0), Err(TableError::UnknownColumn(0)));
        assert_eq!(d.read(&row, 6), Err(TableError::UnknownColumn(6)));
    }

    #[test]
    fn build_validates_registrations() {
        let e = TableDef::builder("t", 1..=3).column(2, "x", 99).build().unwrap_err();
        assert_eq!(e, DefError::MissingField { column: 2, field: 99 });
        let e = TableDef::builder("t", 1..=3).field_column(4, "x", FieldKind::Integer32).build().unwrap_err();
        assert_eq!(e, DefError::ColumnOutOfRange(4, 1, 3));
        let e = TableDef::builder("t", 1..=3).reserved(1, "a").reserved(1, "b").build().unwrap_err();
        assert_eq!(e, DefError::DuplicateColumn(1));
    }

    #[test]
    fn columns_listed_in_order() {
        let d = def();
        let ids: Vec<ColumnId> = d.columns().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
