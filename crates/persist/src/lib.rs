//! SQLite interface store: stands in for the switch's state database.
//! One interface row plus its statistics and pm_info key/value rows.

#![forbid(unsafe_code)]

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use ifmib_core::SourceError;
use ifmib_schema::{InterfaceRecord, InterfaceStore};
use metrics::{counter, histogram};
use rustc_hash::FxHashMap;
use tracing::debug;

/// SQLite-backed store. Simple, synchronous; one enumeration reads all three tables.
pub struct SqliteStore {
    db: Mutex<rusqlite::Connection>,
}

impl SqliteStore {
    pub fn open_default() -> Result<Self> {
        let path = std::env::var("IFMIB_DB_PATH").unwrap_or_else(|_| default_db_path());
        Self::open(&path)
    }

    pub fn open(path: &str) -> Result<Self> {
        let started = std::time::Instant::now();
        let db = rusqlite::Connection::open(path).with_context(|| format!("opening sqlite db at {}", path))?;
        db.pragma_update(None, "journal_mode", "WAL").ok();
        db.pragma_update(None, "synchronous", "NORMAL").ok();
        let me = Self::init(db)?;
        histogram!("persist_open_ms", started.elapsed().as_secs_f64() * 1000.0);
        Ok(me)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(rusqlite::Connection::open_in_memory().context("opening in-memory sqlite db")?)
    }

    fn init(db: rusqlite::Connection) -> Result<Self> {
        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS interface (
                name        TEXT PRIMARY KEY,
                admin_state TEXT,
                link_state  TEXT,
                mtu         INTEGER,
                link_speed  INTEGER,
                mac_in_use  TEXT
            );
            CREATE TABLE IF NOT EXISTS interface_statistics (
                name  TEXT NOT NULL,
                key   TEXT NOT NULL,
                value INTEGER NOT NULL,
                PRIMARY KEY (name, key)
            );
            CREATE TABLE IF NOT EXISTS interface_pm_info (
                name  TEXT NOT NULL,
                key   TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (name, key)
            );",
        )
        .context("creating interface tables")?;
        Ok(Self { db: Mutex::new(db) })
    }

    fn conn(&self) -> MutexGuard<'_, rusqlite::Connection> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert or replace one interface with its statistics and pm_info.
    pub fn upsert(&self, rec: &InterfaceRecord) -> Result<()> {
        let started = std::time::Instant::now();
        let mut db = self.conn();
        let tx = db.transaction()?;
        tx.execute(
            "INSERT INTO interface(name, admin_state, link_state, mtu, link_speed, mac_in_use)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(name) DO UPDATE SET
                admin_state = excluded.admin_state,
                link_state  = excluded.link_state,
                mtu         = excluded.mtu,
                link_speed  = excluded.link_speed,
                mac_in_use  = excluded.mac_in_use",
            (
                &rec.name,
                &rec.admin_state,
                &rec.link_state,
                rec.mtu,
                rec.link_speed.map(|v| i64::try_from(v).unwrap_or(i64::MAX)),
                &rec.mac_in_use,
            ),
        )?;
        tx.execute("DELETE FROM interface_statistics WHERE name = ?1", [&rec.name])?;
        tx.execute("DELETE FROM interface_pm_info WHERE name = ?1", [&rec.name])?;
        {
            let mut st = tx.prepare("INSERT INTO interface_statistics(name, key, value) VALUES (?1, ?2, ?3)")?;
            for (k, v) in rec.statistics.iter() {
                st.execute((&rec.name, k, i64::try_from(*v).unwrap_or(i64::MAX)))?;
            }
            let mut pm = tx.prepare("INSERT INTO interface_pm_info(name, key, value) VALUES (?1, ?2, ?3)")?;
            for (k, v) in rec.pm_info.iter() {
                pm.execute((&rec.name, k, v))?;
            }
        }
        tx.commit()?;
        histogram!("persist_upsert_ms", started.elapsed().as_secs_f64() * 1000.0);
        counter!("persist_upsert_total", 1u64);
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Result<bool> {
        let mut db = self.conn();
        let tx = db.transaction()?;
        let n = tx.execute("DELETE FROM interface WHERE name = ?1", [name])?;
        tx.execute("DELETE FROM interface_statistics WHERE name = ?1", [name])?;
        tx.execute("DELETE FROM interface_pm_info WHERE name = ?1", [name])?;
        tx.commit()?;
        Ok(n > 0)
    }

    fn load_all(&self) -> rusqlite::Result<Vec<InterfaceRecord>> {
        let db = self.conn();
        let mut out: Vec<InterfaceRecord> = Vec::new();
        let mut pos: FxHashMap<String, usize> = FxHashMap::default();

        let mut stmt = db.prepare(
            "SELECT name, admin_state, link_state, mtu, link_speed, mac_in_use FROM interface ORDER BY rowid",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let name: String = row.get(0)?;
            let link_speed: Option<i64> = row.get(4)?;
            pos.insert(name.clone(), out.len());
            out.push(InterfaceRecord {
                name,
                admin_state: row.get(1)?,
                link_state: row.get(2)?,
                mtu: row.get(3)?,
                link_speed: link_speed.and_then(|v| u64::try_from(v).ok()),
                mac_in_use: row.get(5)?,
                ..InterfaceRecord::default()
            });
        }

        let mut stmt = db.prepare("SELECT name, key, value FROM interface_statistics")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let name: String = row.get(0)?;
            let value: i64 = row.get(2)?;
            if let Some(i) = pos.get(&name) {
                out[*i].statistics.insert(row.get(1)?, u64::try_from(value).unwrap_or(0));
            }
        }

        let mut stmt = db.prepare("SELECT name, key, value FROM interface_pm_info")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let name: String = row.get(0)?;
            if let Some(i) = pos.get(&name) {
                out[*i].pm_info.insert(row.get(1)?, row.get(2)?);
            }
        }
        Ok(out)
    }
}

impl InterfaceStore for SqliteStore {
    fn interfaces(&self) -> Result<Vec<InterfaceRecord>, SourceError> {
        let started = std::time::Instant::now();
        let out = self.load_all().map_err(|e| SourceError::Unavailable(e.to_string()))?;
        histogram!("persist_enumerate_ms", started.elapsed().as_secs_f64() * 1000.0);
        debug!(interfaces = out.len(), "enumerated interfaces");
        Ok(out)
    }
}

fn default_db_path() -> String {
    if let Some(home) = std::env::var_os("HOME") {
        let mut p = std::path::PathBuf::from(home);
        p.push(".ifmib");
        let _ = std::fs::create_dir_all(&p);
        p.push("ifmib.db");
        return p.to_string_lossy().to_string();
    }
    // Fallback to current directory
    "ifmib.db".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db() -> String {
        let dir = std::env::temp_dir();
        let f = format!("ifmib-test-{}.db", std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos());
        dir.join(f).to_string_lossy().to_string()
    }

    fn rec(name: &str) -> InterfaceRecord {
        let mut r = InterfaceRecord::named(name);
        r.admin_state = Some("up".into());
        r.link_speed = Some(u64::MAX);
        r.statistics.insert("rx_bytes".into(), 1000);
        r.pm_info.insert("connector".into(), "QSFP".into());
        r
    }

    #[test]
    fn upsert_enumerate_remove() {
        let path = temp_db();
        let s = SqliteStore::open(&path).unwrap();
        s.upsert(&rec("2")).unwrap();
        s.upsert(&rec("1")).unwrap();
        let mut updated = rec("2");
        updated.statistics.clear();
        updated.mtu = Some(9000);
        s.upsert(&updated).unwrap();

        let all = s.interfaces().unwrap();
        assert_eq!(all.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(), vec!["2", "1"]);
        assert_eq!(all[0].mtu, Some(9000));
        assert!(all[0].statistics.is_empty());
        assert_eq!(all[1].statistics.get("rx_bytes"), Some(&1000));
        assert_eq!(all[1].pm_info.get("connector").map(String::as_str), Some("QSFP"));
        assert_eq!(all[1].link_speed, Some(i64::MAX as u64));

        assert!(s.remove("2").unwrap());
        assert!(!s.remove("2").unwrap());
        assert_eq!(s.interfaces().unwrap().len(), 1);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn reopen_keeps_rows() {
        let path = temp_db();
        SqliteStore::open(&path).unwrap().upsert(&rec("7")).unwrap();
        let again = SqliteStore::open(&path).unwrap();
        assert_eq!(again.interfaces().unwrap()[0].name, "7");
        let _ = std::fs::remove_file(&path);
    }
}
