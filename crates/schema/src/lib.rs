//! Interface tables: entity records, stores and the two table definitions.
//!
//! Both tables enumerate the same interface store; each gets its own
//! provider and cache.

#![forbid(unsafe_code)]

use std::path::Path;
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use ifmib_core::SourceError;
use ifmib_store::CacheConfig;
use ifmib_table::TableProvider;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::info;

pub mod extract;
pub mod if_table;
pub mod if_x_table;

pub use if_table::{if_table_def, IfTableSource};
pub use if_x_table::{if_x_table_def, IfXTableSource};

/// Transient view of one interface row from the state database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceRecord {
    pub name: String,
    #[serde(default)]
    pub admin_state: Option<String>,
    #[serde(default)]
    pub link_state: Option<String>,
    #[serde(default)]
    pub mtu: Option<i64>,
    /// Bits per second.
    #[serde(default)]
    pub link_speed: Option<u64>,
    #[serde(default)]
    pub mac_in_use: Option<String>,
    #[serde(default)]
    pub statistics: FxHashMap<String, u64>,
    /// Pluggable-module info (connector, vendor, ...).
    #[serde(default)]
    pub pm_info: FxHashMap<String, String>,
}

impl InterfaceRecord {
    pub fn named(name: impl Into<String>) -> Self { Self { name: name.into(), ..Self::default() } }
}

/// Point-in-time enumeration of interfaces.
pub trait InterfaceStore: Send + Sync {
    fn interfaces(&self) -> Result<Vec<InterfaceRecord>, SourceError>;
}

impl<T: InterfaceStore + ?Sized> InterfaceStore for Arc<T> {
    fn interfaces(&self) -> Result<Vec<InterfaceRecord>, SourceError> { (**self).interfaces() }
}

/// In-memory store; enumeration order is insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<Vec<InterfaceRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn from_records(rows: Vec<InterfaceRecord>) -> Self { Self { rows: RwLock::new(rows) } }

    /// Load a JSON array of interface records.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let rows: Vec<InterfaceRecord> = serde_json::from_str(s).context("parsing interface records")?;
        Ok(Self::from_records(rows))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let store = Self::from_json_str(&raw)?;
        info!(path = %path.display(), interfaces = store.len(), "loaded interface records");
        Ok(store)
    }

    pub fn len(&self) -> usize { self.rows.read().unwrap_or_else(|e| e.into_inner()).len() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Insert or replace by name.
    pub fn upsert(&self, rec: InterfaceRecord) {
        let mut rows = self.rows.write().unwrap_or_else(|e| e.into_inner());
        match rows.iter_mut().find(|r| r.name == rec.name) {
            Some(slot) => *slot = rec,
            None => rows.push(rec),
        }
    }

    pub fn remove(&self, name: &str) -> bool {
        let mut rows = self.rows.write().unwrap_or_else(|e| e.into_inner());
        let before = rows.len();
        rows.retain(|r| r.name != name);
        rows.len() != before
    }
}

impl InterfaceStore for MemoryStore {
    fn interfaces(&self) -> Result<Vec<InterfaceRecord>, SourceError> {
        Ok(self.rows.read().unwrap_or_else(|e| e.into_inner()).clone())
    }
}

pub type IfTable<S> = TableProvider<IfTableSource<S>>;
pub type IfXTable<S> = TableProvider<IfXTableSource<S>>;

pub fn if_table<S: InterfaceStore>(store: S, config: CacheConfig) -> Result<IfTable<S>> {
    let def = if_table_def().context("building ifTable definition")?;
    Ok(TableProvider::new(IfTableSource::new(store), Arc::new(def), config))
}

pub fn if_x_table<S: InterfaceStore>(store: S, config: CacheConfig) -> Result<IfXTable<S>> {
    let def = if_x_table_def().context("building ifXTable definition")?;
    Ok(TableProvider::new(IfXTableSource::new(store), Arc::new(def), config))
}
