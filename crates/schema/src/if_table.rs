//! Interface table (one row per physical interface, indexed by ifIndex).

#![forbid(unsafe_code)]

use ifmib_core::{ColumnId, DefError, EntitySource, FieldId, FieldKind, SourceError, TableDef, TypedValue};

use crate::extract::{self, is_composite, statistic};
use crate::{InterfaceRecord, InterfaceStore};

// ---------------- Column IDs (stable) ----------------
pub const IF_INDEX: ColumnId = 1;
pub const IF_DESCR: ColumnId = 2;
pub const IF_TYPE: ColumnId = 3;
pub const IF_MTU: ColumnId = 4;
pub const IF_SPEED: ColumnId = 5;
pub const IF_PHYS_ADDRESS: ColumnId = 6;
pub const IF_ADMIN_STATUS: ColumnId = 7;
pub const IF_OPER_STATUS: ColumnId = 8;
pub const IF_LAST_CHANGE: ColumnId = 9;
pub const IF_IN_OCTETS: ColumnId = 10;
pub const IF_IN_UCAST_PKTS: ColumnId = 11;
pub const IF_IN_NUCAST_PKTS: ColumnId = 12;
pub const IF_IN_DISCARDS: ColumnId = 13;
pub const IF_IN_ERRORS: ColumnId = 14;
pub const IF_IN_UNKNOWN_PROTOS: ColumnId = 15;
pub const IF_OUT_OCTETS: ColumnId = 16;
pub const IF_OUT_UCAST_PKTS: ColumnId = 17;
pub const IF_OUT_NUCAST_PKTS: ColumnId = 18;
pub const IF_OUT_DISCARDS: ColumnId = 19;
pub const IF_OUT_ERRORS: ColumnId = 20;
pub const IF_OUT_QLEN: ColumnId = 21;
pub const IF_SPECIFIC: ColumnId = 22;

pub const IF_DESCR_MAX_LEN: usize = 255;
pub const IF_SPECIFIC_MAX_LEN: usize = 128;

pub fn if_table_def() -> Result<TableDef, DefError> {
    TableDef::builder("ifTable", IF_INDEX..=IF_SPECIFIC)
        // index column is not-accessible
        .reserved(IF_INDEX, "ifIndex")
        .field_column(IF_DESCR, "ifDescr", FieldKind::OctetString { max_len: IF_DESCR_MAX_LEN })
        .field_column(IF_TYPE, "ifType", FieldKind::Integer32)
        .field_column(IF_MTU, "ifMtu", FieldKind::Integer32)
        .field_column(IF_SPEED, "ifSpeed", FieldKind::Gauge32)
        .field_column(IF_PHYS_ADDRESS, "ifPhysAddress", FieldKind::PhysAddress)
        .field_column(IF_ADMIN_STATUS, "ifAdminStatus", FieldKind::Integer32)
        .field_column(IF_OPER_STATUS, "ifOperStatus", FieldKind::Integer32)
        .field_column(IF_LAST_CHANGE, "ifLastChange", FieldKind::TimeTicks)
        .field_column(IF_IN_OCTETS, "ifInOctets", FieldKind::Counter32)
        .field_column(IF_IN_UCAST_PKTS, "ifInUcastPkts", FieldKind::Counter32)
        .field_column(IF_IN_NUCAST_PKTS, "ifInNUcastPkts", FieldKind::Counter32)
        .field_column(IF_IN_DISCARDS, "ifInDiscards", FieldKind::Counter32)
        .field_column(IF_IN_ERRORS, "ifInErrors", FieldKind::Counter32)
        .field_column(IF_IN_UNKNOWN_PROTOS, "ifInUnknownProtos", FieldKind::Counter32)
        .field_column(IF_OUT_OCTETS, "ifOutOctets", FieldKind::Counter32)
        .field_column(IF_OUT_UCAST_PKTS, "ifOutUcastPkts", FieldKind::Counter32)
        .field_column(IF_OUT_NUCAST_PKTS, "ifOutNUcastPkts", FieldKind::Counter32)
        .field_column(IF_OUT_DISCARDS, "ifOutDiscards", FieldKind::Counter32)
        .field_column(IF_OUT_ERRORS, "ifOutErrors", FieldKind::Counter32)
        .field_column(IF_OUT_QLEN, "ifOutQLen", FieldKind::Gauge32)
        .field_column(IF_SPECIFIC, "ifSpecific", FieldKind::ObjectId { max_len: IF_SPECIFIC_MAX_LEN })
        .build()
}

/// Interface entities as seen by the interface table.
pub struct IfTableSource<S> {
    store: S,
}

impl<S> IfTableSource<S> {
    pub fn new(store: S) -> Self { Self { store } }
    pub fn store(&self) -> &S { &self.store }
}

impl<S: InterfaceStore> EntitySource for IfTableSource<S> {
    type Entity = InterfaceRecord;

    fn enumerate(&self) -> Result<Vec<InterfaceRecord>, SourceError> { self.store.interfaces() }

    fn natural_key<'e>(&self, e: &'e InterfaceRecord) -> &'e str { &e.name }

    fn skip(&self, e: &InterfaceRecord) -> bool { is_composite(&e.name) }

    fn extract_field(&self, e: &InterfaceRecord, field: FieldId) -> TypedValue {
        match field {
            IF_MTU => TypedValue::Integer32(extract::mtu(e)),
            IF_SPEED => TypedValue::gauge32_saturating(extract::speed_bps(e)),
            IF_PHYS_ADDRESS => TypedValue::PhysAddress(extract::phys_address(e)),
            IF_ADMIN_STATUS => TypedValue::Integer32(extract::admin_status(e)),
            IF_OPER_STATUS => TypedValue::Integer32(extract::oper_status(e)),
            IF_IN_OCTETS => TypedValue::counter32_wrapping(statistic(e, extract::RX_BYTES)),
            IF_IN_UCAST_PKTS => TypedValue::counter32_wrapping(statistic(e, extract::RX_PACKETS)),
            IF_IN_DISCARDS => TypedValue::counter32_wrapping(statistic(e, extract::RX_DROPPED)),
            IF_IN_ERRORS => TypedValue::counter32_wrapping(statistic(e, extract::RX_ERRORS)),
            IF_OUT_OCTETS => TypedValue::counter32_wrapping(statistic(e, extract::TX_BYTES)),
            IF_OUT_UCAST_PKTS => TypedValue::counter32_wrapping(statistic(e, extract::TX_PACKETS)),
            IF_OUT_DISCARDS => TypedValue::counter32_wrapping(statistic(e, extract::TX_DROPPED)),
            IF_OUT_ERRORS => TypedValue::counter32_wrapping(statistic(e, extract::TX_ERRORS)),
            IF_DESCR => TypedValue::OctetString(Vec::new()),
            IF_TYPE => TypedValue::Integer32(0),
            IF_LAST_CHANGE => TypedValue::TimeTicks(0),
            IF_IN_NUCAST_PKTS | IF_IN_UNKNOWN_PROTOS | IF_OUT_NUCAST_PKTS => TypedValue::Counter32(0),
            IF_OUT_QLEN => TypedValue::Gauge32(0),
            IF_SPECIFIC => FieldKind::ObjectId { max_len: IF_SPECIFIC_MAX_LEN }.zero(),
            _ => TypedValue::Integer32(0),
        }
    }
}
