//! One generation of rows, built in a single reload pass.
//!
//! Rows live in one vector sorted by index key (arena per generation); the
//! whole generation is released together when its last reader drops it.

#![forbid(unsafe_code)]

use std::time::Instant;

use chrono::{DateTime, Utc};
use ifmib_core::{derive_index, encode, EntitySource, Index, IndexError, IndexKey, RowBuilder, RowContext, TableDef};
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ReloadError;

/// Counts from the reload pass that produced a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReloadStats {
    pub enumerated: usize,
    pub rows: usize,
    pub skipped: usize,
    pub invalid: usize,
    pub collisions: usize,
}

#[derive(Debug)]
pub struct Snapshot {
    generation: u64,
    rows: Vec<RowContext>,
    loaded_at: DateTime<Utc>,
    /// `None` when the TTL does not fit in an `Instant`; such a snapshot only
    /// expires through invalidation.
    valid_until: Option<Instant>,
    stats: ReloadStats,
}

impl Snapshot {
    /// Generation 0: no rows, already expired.
    pub fn empty(now: Instant) -> Self {
        Self { generation: 0, rows: Vec::new(), loaded_at: Utc::now(), valid_until: Some(now), stats: ReloadStats::default() }
    }

    pub fn generation(&self) -> u64 { self.generation }
    pub fn loaded_at(&self) -> DateTime<Utc> { self.loaded_at }
    pub fn valid_until(&self) -> Option<Instant> { self.valid_until }
    pub fn stats(&self) -> ReloadStats { self.stats }
    pub fn len(&self) -> usize { self.rows.len() }
    pub fn is_empty(&self) -> bool { self.rows.is_empty() }

    pub fn is_expired(&self, now: Instant) -> bool {
        match self.valid_until { Some(t) => now >= t, None => false }
    }

    /// Rows in ascending index-key order.
    pub fn rows(&self) -> &[RowContext] { &self.rows }

    pub fn get(&self, key: &IndexKey) -> Option<&RowContext> {
        self.rows.binary_search_by(|r| r.key().cmp(key)).ok().map(|i| &self.rows[i])
    }

    /// Rows whose key is strictly greater than `key`.
    pub fn rows_after(&self, key: &IndexKey) -> &[RowContext] {
        let start = self.rows.partition_point(|r| r.key() <= key);
        &self.rows[start..]
    }

    pub fn next_after(&self, key: &IndexKey) -> Option<&RowContext> { self.rows_after(key).first() }
}

/// Build a generation from one enumeration pass.
///
/// Skipped and invalid entities are dropped; on an index collision the first
/// entity in enumeration order keeps the index. Only allocation failure, or
/// running past `max_rows`, aborts the pass.
pub fn build_generation<S: EntitySource + ?Sized>(
    source: &S,
    def: &TableDef,
    entities: &[S::Entity],
    generation: u64,
    valid_until: Option<Instant>,
    max_rows: Option<usize>,
) -> Result<Snapshot, ReloadError> {
    let table = def.name();
    let mut stats = ReloadStats { enumerated: entities.len(), ..ReloadStats::default() };
    let mut rows: Vec<RowContext> = Vec::new();
    rows.try_reserve_exact(entities.len()).map_err(|e| ReloadError::Allocation(e.to_string()))?;
    let mut owners: FxHashMap<Index, &str> = FxHashMap::default();
    owners.try_reserve(entities.len()).map_err(|e| ReloadError::Allocation(e.to_string()))?;

    for entity in entities {
        let name = source.natural_key(entity);
        let index = match derive_index(source, entity) {
            Ok(i) => i,
            Err(e) => {
                match e {
                    IndexError::Skip { .. } => stats.skipped += 1,
                    IndexError::Invalid { .. } => stats.invalid += 1,
                }
                debug!(table, entity = name, reason = e.reason(), error = %e, "entity omitted");
                metrics::counter!("snapshot_rows_skipped_total", 1u64, "table" => table, "reason" => e.reason());
                continue;
            }
        };
        if let Some(first) = owners.get(&index) {
            warn!(table, index = %index, kept = *first, dropped = name, "index collision; keeping first entity");
            metrics::counter!("snapshot_index_collisions_total", 1u64, "table" => table);
            stats.collisions += 1;
            continue;
        }
        owners.insert(index, name);

        if max_rows.map_or(false, |max| rows.len() >= max) {
            return Err(ReloadError::Allocation(format!("row budget of {} exhausted", rows.len())));
        }
        let mut b = RowBuilder::new(def, index, encode(index));
        for f in def.fields() {
            b.set(f.id, source.extract_field(entity, f.id));
        }
        rows.push(b.finish());
    }

    rows.sort_unstable_by(|a, b| a.key().cmp(b.key()));
    stats.rows = rows.len();
    if stats.enumerated == 0 {
        info!(table, generation, "source enumerated no entities; serving empty table");
    }
    Ok(Snapshot { generation, rows, loaded_at: Utc::now(), valid_until, stats })
}
