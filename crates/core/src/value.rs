//! Typed column values and their size contracts.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Length of a hardware (MAC) address in octets.
pub const PHYS_ADDRESS_LEN: usize = 6;

/// Declared semantic type of a field/column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Integer32,
    Gauge32,
    Counter32,
    TimeTicks,
    Counter64,
    /// Variable-length byte string with an upper bound on its length.
    OctetString { max_len: usize },
    /// Either empty (unset) or exactly 6 octets.
    PhysAddress,
    /// Sub-identifier sequence with an upper bound on its length.
    ObjectId { max_len: usize },
}

impl FieldKind {
    /// Well-defined value for a field that has not been populated.
    pub fn zero(self) -> TypedValue {
        match self {
            FieldKind::Integer32 => TypedValue::Integer32(0),
            FieldKind::Gauge32 => TypedValue::Gauge32(0),
            FieldKind::Counter32 => TypedValue::Counter32(0),
            FieldKind::TimeTicks => TypedValue::TimeTicks(0),
            FieldKind::Counter64 => TypedValue::Counter64(U64::default()),
            FieldKind::OctetString { .. } => TypedValue::OctetString(Vec::new()),
            FieldKind::PhysAddress => TypedValue::PhysAddress(Vec::new()),
            FieldKind::ObjectId { .. } => TypedValue::ObjectId(SmallVec::new()),
        }
    }

    /// Whether `value` is of this kind and within its size bounds.
    pub fn admits(self, value: &TypedValue) -> bool {
        match (self, value) {
            (FieldKind::Integer32, TypedValue::Integer32(_))
            | (FieldKind::Gauge32, TypedValue::Gauge32(_))
            | (FieldKind::Counter32, TypedValue::Counter32(_))
            | (FieldKind::TimeTicks, TypedValue::TimeTicks(_))
            | (FieldKind::Counter64, TypedValue::Counter64(_)) => true,
            (FieldKind::OctetString { max_len }, TypedValue::OctetString(b)) => b.len() <= max_len,
            (FieldKind::PhysAddress, TypedValue::PhysAddress(b)) => b.is_empty() || b.len() == PHYS_ADDRESS_LEN,
            (FieldKind::ObjectId { max_len }, TypedValue::ObjectId(o)) => o.len() <= max_len,
            _ => false,
        }
    }
}

/// 64-bit counter carried as a {high, low} pair of 32-bit halves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct U64 {
    pub high: u32,
    pub low: u32,
}

impl U64 {
    pub fn split(value: u64) -> Self {
        Self { high: ((value >> 32) & 0xFFFF_FFFF) as u32, low: (value & 0xFFFF_FFFF) as u32 }
    }

    pub fn join(self) -> u64 { ((self.high as u64) << 32) | self.low as u64 }
}

impl From<u64> for U64 {
    fn from(v: u64) -> Self { Self::split(v) }
}

/// A single column value. Variable-length variants own their bytes, so a value
/// handed to a caller never aliases row storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TypedValue {
    Integer32(i32),
    Gauge32(u32),
    Counter32(u32),
    TimeTicks(u32),
    Counter64(U64),
    OctetString(Vec<u8>),
    PhysAddress(Vec<u8>),
    ObjectId(SmallVec<[u32; 16]>),
}

impl TypedValue {
    /// Build a Counter32 from a 64-bit accumulator; the counter wraps at 2^32.
    pub fn counter32_wrapping(acc: u64) -> Self { TypedValue::Counter32(acc as u32) }

    pub fn counter64(acc: u64) -> Self { TypedValue::Counter64(U64::split(acc)) }

    /// Gauge32 saturates at its maximum instead of wrapping.
    pub fn gauge32_saturating(v: u64) -> Self { TypedValue::Gauge32(v.min(u32::MAX as u64) as u32) }

    pub fn kind_name(&self) -> &'static str {
        match self {
            TypedValue::Integer32(_) => "integer32",
            TypedValue::Gauge32(_) => "gauge32",
            TypedValue::Counter32(_) => "counter32",
            TypedValue::TimeTicks(_) => "timeticks",
            TypedValue::Counter64(_) => "counter64",
            TypedValue::OctetString(_) => "octet_string",
            TypedValue::PhysAddress(_) => "phys_address",
            TypedValue::ObjectId(_) => "object_id",
        }
    }
}

impl std::fmt::Display for TypedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypedValue::Integer32(v) => write!(f, "INTEGER: {}", v),
            TypedValue::Gauge32(v) => write!(f, "Gauge32: {}", v),
            TypedValue::Counter32(v) => write!(f, "Counter32: {}", v),
            TypedValue::TimeTicks(v) => write!(f, "Timeticks: ({})", v),
            TypedValue::Counter64(c) => write!(f, "Counter64: {}", c.join()),
            TypedValue::OctetString(b) => write!(f, "STRING: \"{}\"", String::from_utf8_lossy(b)),
            TypedValue::PhysAddress(b) => {
                f.write_str("Hex-STRING:")?;
                for octet in b { write!(f, " {:02X}", octet)?; }
                Ok(())
            }
            TypedValue::ObjectId(o) => {
                f.write_str("OID: ")?;
                if o.is_empty() { return f.write_str("0.0"); }
                for (i, s) in o.iter().enumerate() {
                    if i > 0 { f.write_str(".")?; }
                    write!(f, "{}", s)?;
                }
                Ok(())
            }
        }
    }
}

/// Decode `aa:bb:cc:dd:ee:ff` or `aa-bb-cc-dd-ee-ff` into 6 octets.
/// Any other shape yields an empty result, never a partial decode.
pub fn parse_phys_address(s: &str) -> Vec<u8> {
    let s = s.trim();
    let sep = if s.contains(':') { ':' } else { '-' };
    let mut out = Vec::with_capacity(PHYS_ADDRESS_LEN);
    for part in s.split(sep) {
        if part.is_empty() || part.len() > 2 || out.len() == PHYS_ADDRESS_LEN {
            return Vec::new();
        }
        match u8::from_str_radix(part, 16) {
            Ok(b) => out.push(b),
            Err(_) => return Vec::new(),
        }
    }
    if out.len() != PHYS_ADDRESS_LEN { return Vec::new(); }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_split_recombines() {
        for v in [0u64, 1, 1000, u32::MAX as u64, u32::MAX as u64 + 1, 0x1234_5678_9abc_def0, u64::MAX] {
            let c = U64::split(v);
            assert_eq!((c.high as u64) * (1u64 << 32) + c.low as u64, v);
            assert_eq!(c.join(), v);
        }
        let c = U64::split(0x0000_0001_0000_0002);
        assert_eq!((c.high, c.low), (1, 2));
    }

    #[test]
    fn phys_address_accepts_both_separators() {
        assert_eq!(parse_phys_address("70:72:cf:fd:e9:26"), vec![0x70, 0x72, 0xcf, 0xfd, 0xe9, 0x26]);
        assert_eq!(parse_phys_address("00-1B-21-0a-0b-0c"), vec![0x00, 0x1b, 0x21, 0x0a, 0x0b, 0x0c]);
    }

    #[test]
    fn phys_address_rejects_odd_shapes() {
        for s in ["", "70:72:cf:fd:e9", "70:72:cf:fd:e9:26:01", "70:72:cf:fd:e9:zz", "7072.cffd.e926", "70:72-cf:fd:e9:26", "700:72:cf:fd:e9:26", "70::cf:fd:e9:26"] {
            assert!(parse_phys_address(s).is_empty(), "{:?}", s);
        }
    }

    #[test]
    fn zero_values_satisfy_their_kind() {
        let kinds = [
            FieldKind::Integer32,
            FieldKind::Gauge32,
            FieldKind::Counter32,
            FieldKind::TimeTicks,
            FieldKind::Counter64,
            FieldKind::OctetString { max_len: 255 },
            FieldKind::PhysAddress,
            FieldKind::ObjectId { max_len: 128 },
        ];
        for k in kinds { assert!(k.admits(&k.zero()), "{:?}", k); }
    }

    #[test]
    fn admits_enforces_bounds_and_kind() {
        assert!(!FieldKind::OctetString { max_len: 2 }.admits(&TypedValue::OctetString(vec![1, 2, 3])));
        assert!(!FieldKind::PhysAddress.admits(&TypedValue::PhysAddress(vec![1, 2, 3])));
        assert!(!FieldKind::Counter32.admits(&TypedValue::Gauge32(1)));
    }

    #[test]
    fn serialises_tagged() {
        let v = serde_json::to_value(TypedValue::counter64(1u64 << 32)).unwrap();
        assert_eq!(v, serde_json::json!({"type": "counter64", "value": {"high": 1, "low": 0}}));
    }

    #[test]
    fn gauge_saturates_counter_wraps() {
        assert_eq!(TypedValue::gauge32_saturating(10_000_000_000), TypedValue::Gauge32(u32::MAX));
        assert_eq!(TypedValue::counter32_wrapping((1u64 << 32) + 5), TypedValue::Counter32(5));
    }
}
