#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ifmib_core::{EntitySource, FieldId, FieldKind, SourceError, TableDef, TypedValue};

pub const F_NAME: FieldId = 2;
pub const F_OCTETS: FieldId = 3;

#[derive(Debug, Clone)]
pub struct Ent { pub name: String, pub octets: u64 }

pub fn ent(name: &str, octets: u64) -> Ent { Ent { name: name.to_string(), octets } }

/// Scripted source: counts enumerations, can fail or stall on demand.
#[derive(Default)]
pub struct FakeSource {
    pub ents: Mutex<Vec<Ent>>,
    pub enumerations: AtomicUsize,
    pub fail: AtomicBool,
    pub delay_ms: AtomicUsize,
}

impl FakeSource {
    pub fn with(ents: Vec<Ent>) -> Self { Self { ents: Mutex::new(ents), ..Default::default() } }
    pub fn set(&self, ents: Vec<Ent>) { *self.ents.lock().unwrap() = ents; }
    pub fn count(&self) -> usize { self.enumerations.load(Ordering::SeqCst) }
}

impl EntitySource for FakeSource {
    type Entity = Ent;

    fn enumerate(&self) -> Result<Vec<Ent>, SourceError> {
        self.enumerations.fetch_add(1, Ordering::SeqCst);
        let d = self.delay_ms.load(Ordering::SeqCst);
        if d > 0 { std::thread::sleep(Duration::from_millis(d as u64)); }
        if self.fail.load(Ordering::SeqCst) { return Err(SourceError::Unavailable("db down".into())); }
        Ok(self.ents.lock().unwrap().clone())
    }

    fn natural_key<'e>(&self, e: &'e Ent) -> &'e str { &e.name }

    fn skip(&self, e: &Ent) -> bool { e.name.contains('-') }

    fn extract_field(&self, e: &Ent, field: FieldId) -> TypedValue {
        match field {
            F_NAME => TypedValue::OctetString(e.name.as_bytes().to_vec()),
            F_OCTETS => TypedValue::counter32_wrapping(e.octets),
            _ => TypedValue::Integer32(0),
        }
    }
}

pub fn def() -> Arc<TableDef> {
    Arc::new(
        TableDef::builder("testTable", 1..=4)
            .reserved(1, "testIndex")
            .field_column(F_NAME, "testName", FieldKind::OctetString { max_len: 64 })
            .field_column(F_OCTETS, "testOctets", FieldKind::Counter32)
            .build()
            .unwrap(),
    )
}

pub fn indices(snap: &ifmib_store::Snapshot) -> Vec<u32> {
    snap.rows().iter().map(|r| r.index().get()).collect()
}
