#![forbid(unsafe_code)]

use std::sync::Arc;

use ifmib_core::{IndexKey, TypedValue, U64};
use ifmib_schema::extract::RX_BYTES;
use ifmib_schema::if_table::*;
use ifmib_schema::if_x_table::*;
use ifmib_schema::{if_table, if_x_table, InterfaceRecord, MemoryStore};
use ifmib_store::CacheConfig;

fn key(v: u32) -> IndexKey { IndexKey::from_subids(&[v]) }

fn rec(name: &str, rx_bytes: u64) -> InterfaceRecord {
    let mut r = InterfaceRecord::named(name);
    r.statistics.insert(RX_BYTES.to_string(), rx_bytes);
    r
}

#[test]
fn mixed_names_yield_numeric_rows_only() {
    let store = MemoryStore::from_records(vec![rec("1", 1000), rec("2", 0), rec("eth-mgmt", 0), rec("0", 0)]);
    let t = if_table(store, CacheConfig::default()).unwrap();

    let txn = t.begin_transaction().unwrap();
    let idx: Vec<u32> = txn.rows().map(|r| r.index().get()).collect();
    assert_eq!(idx, vec![1, 2]);
    txn.end();

    assert_eq!(t.get(&key(1), IF_IN_OCTETS).unwrap(), Some(TypedValue::Counter32(1000)));
    assert_eq!(t.get(&key(2), IF_IN_OCTETS).unwrap(), Some(TypedValue::Counter32(0)));
    assert_eq!(t.get(&key(3), IF_IN_OCTETS).unwrap(), None);
    // zero is never a valid index
    assert!(t.get(&key(0), IF_IN_OCTETS).is_err());
    // ifIndex itself is not-accessible
    assert_eq!(t.get(&key(1), IF_INDEX).unwrap(), None);
}

#[test]
fn if_table_columns_from_record() {
    let mut r = InterfaceRecord::named("3");
    r.admin_state = Some("up".into());
    r.link_state = Some("up".into());
    r.link_speed = Some(40_000_000_000);
    r.mtu = Some(1500);
    r.mac_in_use = Some("70:72:cf:fd:e9:26".into());
    r.statistics.insert("tx_errors".into(), (1u64 << 32) + 3);
    let t = if_table(MemoryStore::from_records(vec![r]), CacheConfig::default()).unwrap();

    let k = key(3);
    assert_eq!(t.get(&k, IF_ADMIN_STATUS).unwrap(), Some(TypedValue::Integer32(1)));
    assert_eq!(t.get(&k, IF_OPER_STATUS).unwrap(), Some(TypedValue::Integer32(1)));
    assert_eq!(t.get(&k, IF_SPEED).unwrap(), Some(TypedValue::Gauge32(u32::MAX)));
    assert_eq!(t.get(&k, IF_MTU).unwrap(), Some(TypedValue::Integer32(1500)));
    assert_eq!(t.get(&k, IF_PHYS_ADDRESS).unwrap(), Some(TypedValue::PhysAddress(vec![0x70, 0x72, 0xcf, 0xfd, 0xe9, 0x26])));
    // Counter32 wraps
    assert_eq!(t.get(&k, IF_OUT_ERRORS).unwrap(), Some(TypedValue::Counter32(3)));
    assert_eq!(t.get(&k, IF_DESCR).unwrap(), Some(TypedValue::OctetString(Vec::new())));
    assert!(matches!(t.get(&k, IF_SPECIFIC).unwrap(), Some(TypedValue::ObjectId(o)) if o.is_empty()));
    assert!(t.get(&k, 23).is_err());
}

#[test]
fn bad_mac_yields_empty_address() {
    let mut r = InterfaceRecord::named("4");
    r.mac_in_use = Some("70:72:cf".into());
    let t = if_table(MemoryStore::from_records(vec![r]), CacheConfig::default()).unwrap();
    assert_eq!(t.get(&key(4), IF_PHYS_ADDRESS).unwrap(), Some(TypedValue::PhysAddress(Vec::new())));
}

#[test]
fn x_table_splits_high_capacity_counters() {
    let big = 0x0000_0002_0000_0010u64;
    let mut r = rec("5", big);
    r.link_state = Some("up".into());
    r.link_speed = Some(25_000_000_000);
    r.pm_info.insert("connector".into(), "SFP28".into());
    let t = if_x_table(MemoryStore::from_records(vec![r, rec("5-1", 1)]), CacheConfig::default()).unwrap();

    let k = key(5);
    assert_eq!(t.get(&k, IF_HC_IN_OCTETS).unwrap(), Some(TypedValue::Counter64(U64 { high: 2, low: 0x10 })));
    assert_eq!(t.get(&k, IF_HC_OUT_OCTETS).unwrap(), Some(TypedValue::Counter64(U64::default())));
    assert_eq!(t.get(&k, IF_NAME).unwrap(), Some(TypedValue::OctetString(b"5".to_vec())));
    assert_eq!(t.get(&k, IF_HIGH_SPEED).unwrap(), Some(TypedValue::Gauge32(25_000)));
    assert_eq!(t.get(&k, IF_CONNECTOR_PRESENT).unwrap(), Some(TypedValue::Integer32(1)));
    assert_eq!(t.walk(IF_NAME).unwrap().len(), 1);
}

#[test]
fn tables_share_store_but_not_caches() {
    let store = Arc::new(MemoryStore::from_records(vec![rec("1", 0)]));
    let a = if_table(Arc::clone(&store), CacheConfig::default()).unwrap();
    let b = if_x_table(Arc::clone(&store), CacheConfig::default()).unwrap();
    assert_eq!(a.walk(IF_IN_OCTETS).unwrap().len(), 1);

    store.upsert(rec("9", 0));
    // b loads for the first time and sees the new row; a still serves its generation
    assert_eq!(b.walk(IF_NAME).unwrap().len(), 2);
    assert_eq!(a.walk(IF_IN_OCTETS).unwrap().len(), 1);
    a.invalidate();
    assert_eq!(a.walk(IF_IN_OCTETS).unwrap().len(), 2);
}
