//! Interface extension table: names, broadcast/multicast and 64-bit counters.

#![forbid(unsafe_code)]

use ifmib_core::{ColumnId, DefError, EntitySource, FieldId, FieldKind, SourceError, TableDef, TypedValue};

use crate::extract::{self, is_composite, statistic};
use crate::{InterfaceRecord, InterfaceStore};

// ---------------- Column IDs (stable) ----------------
pub const IF_NAME: ColumnId = 1;
pub const IF_IN_MULTICAST_PKTS: ColumnId = 2;
pub const IF_IN_BROADCAST_PKTS: ColumnId = 3;
pub const IF_OUT_MULTICAST_PKTS: ColumnId = 4;
pub const IF_OUT_BROADCAST_PKTS: ColumnId = 5;
pub const IF_HC_IN_OCTETS: ColumnId = 6;
pub const IF_HC_IN_UCAST_PKTS: ColumnId = 7;
pub const IF_HC_IN_MULTICAST_PKTS: ColumnId = 8;
pub const IF_HC_IN_BROADCAST_PKTS: ColumnId = 9;
pub const IF_HC_OUT_OCTETS: ColumnId = 10;
pub const IF_HC_OUT_UCAST_PKTS: ColumnId = 11;
pub const IF_HC_OUT_MULTICAST_PKTS: ColumnId = 12;
pub const IF_HC_OUT_BROADCAST_PKTS: ColumnId = 13;
pub const IF_LINK_UP_DOWN_TRAP_ENABLE: ColumnId = 14;
pub const IF_HIGH_SPEED: ColumnId = 15;
pub const IF_PROMISCUOUS_MODE: ColumnId = 16;
pub const IF_CONNECTOR_PRESENT: ColumnId = 17;
pub const IF_ALIAS: ColumnId = 18;
pub const IF_COUNTER_DISCONTINUITY_TIME: ColumnId = 19;

pub const IF_NAME_MAX_LEN: usize = 255;
pub const IF_ALIAS_MAX_LEN: usize = 64;

pub fn if_x_table_def() -> Result<TableDef, DefError> {
    TableDef::builder("ifXTable", IF_NAME..=IF_COUNTER_DISCONTINUITY_TIME)
        .field_column(IF_NAME, "ifName", FieldKind::OctetString { max_len: IF_NAME_MAX_LEN })
        .field_column(IF_IN_MULTICAST_PKTS, "ifInMulticastPkts", FieldKind::Counter32)
        .field_column(IF_IN_BROADCAST_PKTS, "ifInBroadcastPkts", FieldKind::Counter32)
        .field_column(IF_OUT_MULTICAST_PKTS, "ifOutMulticastPkts", FieldKind::Counter32)
        .field_column(IF_OUT_BROADCAST_PKTS, "ifOutBroadcastPkts", FieldKind::Counter32)
        .field_column(IF_HC_IN_OCTETS, "ifHCInOctets", FieldKind::Counter64)
        .field_column(IF_HC_IN_UCAST_PKTS, "ifHCInUcastPkts", FieldKind::Counter64)
        .field_column(IF_HC_IN_MULTICAST_PKTS, "ifHCInMulticastPkts", FieldKind::Counter64)
        .field_column(IF_HC_IN_BROADCAST_PKTS, "ifHCInBroadcastPkts", FieldKind::Counter64)
        .field_column(IF_HC_OUT_OCTETS, "ifHCOutOctets", FieldKind::Counter64)
        .field_column(IF_HC_OUT_UCAST_PKTS, "ifHCOutUcastPkts", FieldKind::Counter64)
        .field_column(IF_HC_OUT_MULTICAST_PKTS, "ifHCOutMulticastPkts", FieldKind::Counter64)
        .field_column(IF_HC_OUT_BROADCAST_PKTS, "ifHCOutBroadcastPkts", FieldKind::Counter64)
        .field_column(IF_LINK_UP_DOWN_TRAP_ENABLE, "ifLinkUpDownTrapEnable", FieldKind::Integer32)
        .field_column(IF_HIGH_SPEED, "ifHighSpeed", FieldKind::Gauge32)
        .field_column(IF_PROMISCUOUS_MODE, "ifPromiscuousMode", FieldKind::Integer32)
        .field_column(IF_CONNECTOR_PRESENT, "ifConnectorPresent", FieldKind::Integer32)
        .field_column(IF_ALIAS, "ifAlias", FieldKind::OctetString { max_len: IF_ALIAS_MAX_LEN })
        .field_column(IF_COUNTER_DISCONTINUITY_TIME, "ifCounterDiscontinuityTime", FieldKind::TimeTicks)
        .build()
}

pub struct IfXTableSource<S> {
    store: S,
}

impl<S> IfXTableSource<S> {
    pub fn new(store: S) -> Self { Self { store } }
    pub fn store(&self) -> &S { &self.store }
}

impl<S: InterfaceStore> EntitySource for IfXTableSource<S> {
    type Entity = InterfaceRecord;

    fn enumerate(&self) -> Result<Vec<InterfaceRecord>, SourceError> { self.store.interfaces() }

    fn natural_key<'e>(&self, e: &'e InterfaceRecord) -> &'e str { &e.name }

    fn skip(&self, e: &InterfaceRecord) -> bool { is_composite(&e.name) }

    fn extract_field(&self, e: &InterfaceRecord, field: FieldId) -> TypedValue {
        match field {
            IF_NAME => TypedValue::OctetString(e.name.as_bytes().to_vec()),
            IF_HC_IN_OCTETS => TypedValue::counter64(statistic(e, extract::RX_BYTES)),
            IF_HC_IN_UCAST_PKTS => TypedValue::counter64(statistic(e, extract::RX_PACKETS)),
            IF_HC_OUT_OCTETS => TypedValue::counter64(statistic(e, extract::TX_BYTES)),
            IF_HC_OUT_UCAST_PKTS => TypedValue::counter64(statistic(e, extract::TX_PACKETS)),
            IF_HC_IN_MULTICAST_PKTS | IF_HC_IN_BROADCAST_PKTS | IF_HC_OUT_MULTICAST_PKTS | IF_HC_OUT_BROADCAST_PKTS => {
                TypedValue::counter64(0)
            }
            IF_IN_MULTICAST_PKTS | IF_IN_BROADCAST_PKTS | IF_OUT_MULTICAST_PKTS | IF_OUT_BROADCAST_PKTS => {
                TypedValue::Counter32(0)
            }
            IF_HIGH_SPEED => TypedValue::gauge32_saturating(extract::high_speed_mbps(e)),
            IF_CONNECTOR_PRESENT => TypedValue::Integer32(extract::connector_present(e)),
            IF_ALIAS => TypedValue::OctetString(Vec::new()),
            IF_COUNTER_DISCONTINUITY_TIME => TypedValue::TimeTicks(0),
            _ => TypedValue::Integer32(0),
        }
    }
}
