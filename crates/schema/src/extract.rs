//! Pure per-field extraction from one interface record.

#![forbid(unsafe_code)]

use ifmib_core::parse_phys_address;

use crate::InterfaceRecord;

// Statistics keys as published by the switch daemon
pub const RX_PACKETS: &str = "rx_packets";
pub const RX_BYTES: &str = "rx_bytes";
pub const TX_PACKETS: &str = "tx_packets";
pub const TX_BYTES: &str = "tx_bytes";
pub const RX_DROPPED: &str = "rx_dropped";
pub const RX_ERRORS: &str = "rx_errors";
pub const TX_DROPPED: &str = "tx_dropped";
pub const TX_ERRORS: &str = "tx_errors";

/// Splitter children and other composite interfaces carry this in their name.
pub const COMPOSITE_SEPARATOR: char = '-';

pub fn is_composite(name: &str) -> bool { name.contains(COMPOSITE_SEPARATOR) }

/// Accumulated statistic, 0 when the key is absent.
pub fn statistic(rec: &InterfaceRecord, key: &str) -> u64 {
    rec.statistics.get(key).copied().unwrap_or(0)
}

// up(1), down(2), testing(3); 0 when unset or unrecognised
fn status_code(state: Option<&str>) -> i32 {
    match state {
        Some("up") => 1,
        Some("down") => 2,
        Some("testing") => 3,
        _ => 0,
    }
}

pub fn admin_status(rec: &InterfaceRecord) -> i32 { status_code(rec.admin_state.as_deref()) }

pub fn oper_status(rec: &InterfaceRecord) -> i32 { status_code(rec.link_state.as_deref()) }

/// Link speed in bits per second; only reported while the link is up.
pub fn speed_bps(rec: &InterfaceRecord) -> u64 {
    if rec.link_state.as_deref() != Some("up") { return 0; }
    rec.link_speed.unwrap_or(0)
}

pub fn high_speed_mbps(rec: &InterfaceRecord) -> u64 { speed_bps(rec) / 1_000_000 }

pub fn mtu(rec: &InterfaceRecord) -> i32 {
    rec.mtu.and_then(|m| i32::try_from(m).ok()).unwrap_or(0)
}

pub fn phys_address(rec: &InterfaceRecord) -> Vec<u8> {
    rec.mac_in_use.as_deref().map(parse_phys_address).unwrap_or_default()
}

/// TruthValue: true(1) when pluggable-module info reports a connector.
pub fn connector_present(rec: &InterfaceRecord) -> i32 {
    if rec.pm_info.contains_key("connector") { 1 } else { 2 }
}
