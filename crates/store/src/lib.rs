//! Snapshot cache: TTL-scoped generations of rows with at-most-one reload in flight.
//!
//! Readers load the live generation lock-free through [`ArcSwap`]; a reader
//! that holds an `Arc<Snapshot>` keeps seeing that generation until it drops
//! it, whatever reloads happen meanwhile.

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use ifmib_core::{EntitySource, SourceError, TableDef, TableError};
use serde::Serialize;
use tracing::{debug, info, warn};

pub mod clock;
pub mod snapshot;

pub use clock::{Clock, ManualClock, SystemClock};
pub use snapshot::{build_generation, ReloadStats, Snapshot};

pub const DEFAULT_TTL_SECS: u64 = 30;

/// Cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    /// Carried for parity with writable sibling tables; this cache never sees writes.
    pub dont_invalidate_on_set: bool,
    /// Row budget per generation. A reload that needs more rows fails as an
    /// allocation failure and the previous generation stays in service.
    pub max_rows: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self { Self { ttl_secs: DEFAULT_TTL_SECS, dont_invalidate_on_set: true, max_rows: None } }
}

impl CacheConfig {
    /// Defaults overridden by `IFMIB_CACHE_TTL_SECS`, `IFMIB_CACHE_INVALIDATE_ON_SET` and `IFMIB_CACHE_MAX_ROWS`.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(ttl) = std::env::var("IFMIB_CACHE_TTL_SECS").ok().and_then(|s| s.parse::<u64>().ok()) {
            cfg.ttl_secs = ttl;
        }
        if let Ok(v) = std::env::var("IFMIB_CACHE_INVALIDATE_ON_SET") {
            cfg.dont_invalidate_on_set = !matches!(v.as_str(), "1" | "true" | "yes");
        }
        if let Some(max) = std::env::var("IFMIB_CACHE_MAX_ROWS").ok().and_then(|s| s.parse::<usize>().ok()) {
            cfg.max_rows = Some(max);
        }
        cfg
    }

    pub fn ttl(&self) -> Duration { Duration::from_secs(self.ttl_secs) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReloadError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("allocation failed while building generation: {0}")]
    Allocation(String),
}

impl From<ReloadError> for TableError {
    fn from(e: ReloadError) -> Self { TableError::ResourceUnavailable(e.to_string()) }
}

/// Holds the live generation for one table and refreshes it from the source.
pub struct SnapshotCache<S: EntitySource> {
    source: S,
    def: Arc<TableDef>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    current: ArcSwap<Snapshot>,
    /// Invalidation epoch, bumped by `invalidate()` and by failed reloads.
    requested: AtomicU64,
    /// Epoch the published generation satisfies; stored after the snapshot.
    served: AtomicU64,
    reload_gate: Mutex<()>,
    /// Completed reload attempts, successful or not.
    attempts: AtomicU64,
}

impl<S: EntitySource> SnapshotCache<S> {
    pub fn new(source: S, def: Arc<TableDef>, config: CacheConfig) -> Self {
        Self::with_clock(source, def, config, Arc::new(SystemClock))
    }

    pub fn with_clock(source: S, def: Arc<TableDef>, config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let empty = Snapshot::empty(clock.now());
        Self {
            source,
            def,
            config,
            clock,
            current: ArcSwap::from_pointee(empty),
            requested: AtomicU64::new(1),
            served: AtomicU64::new(0),
            reload_gate: Mutex::new(()),
            attempts: AtomicU64::new(0),
        }
    }

    pub fn def(&self) -> &Arc<TableDef> { &self.def }
    pub fn source(&self) -> &S { &self.source }
    pub fn config(&self) -> &CacheConfig { &self.config }

    /// Live generation without any freshness check.
    pub fn peek(&self) -> Arc<Snapshot> { self.current.load_full() }

    pub fn is_stale(&self) -> bool {
        self.served.load(Ordering::Acquire) < self.requested.load(Ordering::Acquire)
            || self.current.load().is_expired(self.clock.now())
    }

    /// Force the next `get_current()` to reload regardless of TTL.
    pub fn invalidate(&self) {
        debug!(table = self.def.name(), "cache invalidated");
        self.requested.fetch_add(1, Ordering::AcqRel);
    }

    /// Live generation, reloading first when expired or invalidated.
    ///
    /// Concurrent callers that find the cache stale wait for the single
    /// in-flight reload instead of starting their own. A source failure keeps
    /// the previous generation in service and leaves the cache stale.
    pub fn get_current(&self) -> Result<Arc<Snapshot>, ReloadError> {
        if !self.is_stale() {
            return Ok(self.current.load_full());
        }
        match self.reload_if_stale() {
            Ok(snap) => Ok(snap),
            Err(ReloadError::Source(_)) => Ok(self.current.load_full()),
            Err(e) => Err(e),
        }
    }

    /// Unconditional reload, still serialised with other reloads.
    pub fn reload(&self) -> Result<Arc<Snapshot>, ReloadError> {
        let _gate = self.reload_gate.lock().unwrap_or_else(|e| e.into_inner());
        self.reload_locked()
    }

    fn reload_if_stale(&self) -> Result<Arc<Snapshot>, ReloadError> {
        let seen = self.attempts.load(Ordering::Acquire);
        let _gate = self.reload_gate.lock().unwrap_or_else(|e| e.into_inner());
        if self.attempts.load(Ordering::Acquire) != seen || !self.is_stale() {
            // another caller finished a reload while we waited for the gate
            return Ok(self.current.load_full());
        }
        self.reload_locked()
    }

    fn reload_locked(&self) -> Result<Arc<Snapshot>, ReloadError> {
        let table = self.def.name();
        let started = Instant::now();
        // an invalidate() racing this pass bumps past `target` and stays pending
        let target = self.requested.load(Ordering::Acquire);
        let result = self.build_next();
        self.attempts.fetch_add(1, Ordering::AcqRel);
        let ms = started.elapsed().as_secs_f64() * 1000.0;
        metrics::histogram!("snapshot_reload_ms", ms, "table" => table);
        match result {
            Ok(next) => {
                let next = Arc::new(next);
                self.current.store(Arc::clone(&next));
                self.served.fetch_max(target, Ordering::AcqRel);
                let st = next.stats();
                metrics::counter!("snapshot_reload_total", 1u64, "table" => table, "outcome" => "ok");
                metrics::gauge!("snapshot_rows", st.rows as f64, "table" => table);
                info!(table, generation = next.generation(), rows = st.rows, skipped = st.skipped, invalid = st.invalid, collisions = st.collisions, ms, "snapshot reloaded");
                Ok(next)
            }
            Err(e) => {
                self.requested.fetch_add(1, Ordering::AcqRel);
                let outcome = match e { ReloadError::Source(_) => "source_unavailable", ReloadError::Allocation(_) => "allocation_failure" };
                metrics::counter!("snapshot_reload_total", 1u64, "table" => table, "outcome" => outcome);
                warn!(table, error = %e, serving_generation = self.current.load().generation(), "reload failed; keeping previous generation");
                Err(e)
            }
        }
    }

    fn build_next(&self) -> Result<Snapshot, ReloadError> {
        let entities = self.source.enumerate()?;
        let generation = self.current.load().generation() + 1;
        let valid_until = self.clock.now().checked_add(self.config.ttl());
        build_generation(&self.source, &self.def, &entities, generation, valid_until, self.config.max_rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let c = CacheConfig::default();
        assert_eq!(c.ttl(), Duration::from_secs(30));
        assert!(c.dont_invalidate_on_set);
    }
}
