//! Table provider: exact / next / bulk row lookup and column dispatch.
//!
//! Every protocol request runs inside a [`Transaction`], which pins one
//! snapshot generation for its whole lifetime. Rows are handed out as borrows
//! of that pinned generation, so nothing outlives the transaction except
//! copied column values.

#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex};

use ifmib_core::{decode, ColumnId, ColumnRead, EntitySource, IndexKey, RowContext, TableDef, TableError, TypedValue};
use ifmib_store::{CacheConfig, Clock, Snapshot, SnapshotCache};
use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::debug;

/// One column instance returned by get-next / get-bulk / walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cell {
    pub key: IndexKey,
    pub column: ColumnId,
    pub value: TypedValue,
}

/// Rows flagged deleted by finished transactions, scoped to one generation.
#[derive(Debug, Default)]
struct Tombstones {
    generation: u64,
    keys: FxHashSet<IndexKey>,
}

pub struct TableProvider<S: EntitySource> {
    cache: SnapshotCache<S>,
    tombstones: Mutex<Tombstones>,
}

impl<S: EntitySource> TableProvider<S> {
    pub fn new(source: S, def: Arc<TableDef>, config: CacheConfig) -> Self {
        Self::from_cache(SnapshotCache::new(source, def, config))
    }

    pub fn with_clock(source: S, def: Arc<TableDef>, config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self::from_cache(SnapshotCache::with_clock(source, def, config, clock))
    }

    pub fn from_cache(cache: SnapshotCache<S>) -> Self {
        Self { cache, tombstones: Mutex::new(Tombstones::default()) }
    }

    pub fn name(&self) -> &'static str { self.cache.def().name() }
    pub fn def(&self) -> &TableDef { self.cache.def() }
    pub fn cache(&self) -> &SnapshotCache<S> { &self.cache }

    /// The underlying store changed; reload on next access.
    pub fn invalidate(&self) { self.cache.invalidate() }

    /// Pre-request phase: pin the current (possibly refreshed) generation.
    pub fn begin_transaction(&self) -> Result<Transaction<'_, S>, TableError> {
        let snap = self.cache.get_current()?;
        let hidden = {
            let t = self.tombstones.lock().unwrap_or_else(|e| e.into_inner());
            if t.generation == snap.generation() { t.keys.clone() } else { FxHashSet::default() }
        };
        debug!(table = self.name(), generation = snap.generation(), hidden = hidden.len(), "transaction begin");
        Ok(Transaction { provider: self, snap, hidden, flagged: FxHashSet::default() })
    }

    /// get: value of `column` at `key`. `None` means no such instance.
    pub fn get(&self, key: &IndexKey, column: ColumnId) -> Result<Option<TypedValue>, TableError> {
        metrics::counter!("table_requests_total", 1u64, "table" => self.name(), "op" => "get");
        let txn = self.begin_transaction()?;
        let Some(row) = txn.lookup_exact(key)? else { return Ok(None) };
        let out = match txn.get_column(row, column)? {
            ColumnRead::Value(v) => Some(v),
            ColumnRead::Skip => None,
        };
        txn.end();
        Ok(out)
    }

    /// get-next within one column. `None` means end of column.
    pub fn get_next(&self, key: &IndexKey, column: ColumnId) -> Result<Option<Cell>, TableError> {
        metrics::counter!("table_requests_total", 1u64, "table" => self.name(), "op" => "get_next");
        let txn = self.begin_transaction()?;
        let out = txn.column_after(key, column, 1)?.pop();
        txn.end();
        Ok(out)
    }

    /// get-bulk within one column: up to `max_repetitions` successive instances.
    pub fn get_bulk(&self, key: &IndexKey, column: ColumnId, max_repetitions: usize) -> Result<Vec<Cell>, TableError> {
        metrics::counter!("table_requests_total", 1u64, "table" => self.name(), "op" => "get_bulk");
        let txn = self.begin_transaction()?;
        let out = txn.column_after(key, column, max_repetitions)?;
        txn.end();
        Ok(out)
    }

    /// Whole column from one generation, in index order.
    pub fn walk(&self, column: ColumnId) -> Result<Vec<Cell>, TableError> {
        metrics::counter!("table_requests_total", 1u64, "table" => self.name(), "op" => "walk");
        let txn = self.begin_transaction()?;
        let out = txn.column_after(&IndexKey::empty(), column, usize::MAX)?;
        txn.end();
        Ok(out)
    }

    fn retire(&self, generation: u64, flagged: FxHashSet<IndexKey>) {
        if flagged.is_empty() { return; }
        let mut t = self.tombstones.lock().unwrap_or_else(|e| e.into_inner());
        if generation > t.generation {
            t.generation = generation;
            t.keys.clear();
        }
        if generation == t.generation {
            debug!(table = self.name(), generation, rows = flagged.len(), "releasing rows flagged deleted");
            t.keys.extend(flagged);
        }
    }
}

/// One protocol request cycle over a single pinned generation.
///
/// Dropping the transaction is the post-request phase; [`Transaction::end`]
/// makes it explicit.
pub struct Transaction<'p, S: EntitySource> {
    provider: &'p TableProvider<S>,
    snap: Arc<Snapshot>,
    hidden: FxHashSet<IndexKey>,
    flagged: FxHashSet<IndexKey>,
}

impl<'p, S: EntitySource> Transaction<'p, S> {
    pub fn generation(&self) -> u64 { self.snap.generation() }

    fn visible(&self, row: &RowContext) -> bool { !self.hidden.contains(row.key()) }

    /// Exact match. The key must have the table's single-index shape.
    pub fn lookup_exact(&self, key: &IndexKey) -> Result<Option<&RowContext>, TableError> {
        decode(key)?;
        Ok(self.snap.get(key).filter(|r| self.visible(r)))
    }

    /// Smallest row key strictly greater than `key`.
    pub fn lookup_next(&self, key: &IndexKey) -> Option<&RowContext> {
        self.snap.rows_after(key).iter().find(|r| self.visible(r))
    }

    /// Up to `max` rows strictly after `key`.
    pub fn lookup_bulk(&self, key: &IndexKey, max: usize) -> Vec<&RowContext> {
        self.snap.rows_after(key).iter().filter(|r| self.visible(r)).take(max).collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = &RowContext> + '_ {
        self.snap.rows().iter().filter(move |r| self.visible(r))
    }

    pub fn get_column(&self, row: &RowContext, column: ColumnId) -> Result<ColumnRead, TableError> {
        self.provider.def().read(row, column)
    }

    /// Flag a row deleted. It stays readable for the rest of this transaction
    /// and disappears from later transactions on the same generation.
    pub fn flag_deleted(&mut self, key: &IndexKey) -> bool {
        if self.snap.get(key).is_none() { return false; }
        self.flagged.insert(key.clone())
    }

    fn column_after(&self, key: &IndexKey, column: ColumnId, max: usize) -> Result<Vec<Cell>, TableError> {
        let def = self.provider.def();
        if column < def.min_column() || column > def.max_column() {
            return Err(TableError::UnknownColumn(column));
        }
        let mut out = Vec::new();
        for row in self.lookup_bulk(key, max) {
            match self.get_column(row, column)? {
                ColumnRead::Value(value) => out.push(Cell { key: row.key().clone(), column, value }),
                // a skipped column has no instances in any row
                ColumnRead::Skip => break,
            }
        }
        Ok(out)
    }

    /// Post-request phase.
    pub fn end(self) {}
}

impl<'p, S: EntitySource> Drop for Transaction<'p, S> {
    fn drop(&mut self) {
        let flagged = std::mem::take(&mut self.flagged);
        debug!(table = self.provider.name(), generation = self.snap.generation(), "transaction end");
        self.provider.retire(self.snap.generation(), flagged);
    }
}
