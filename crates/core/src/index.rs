//! Index codec: natural key -> protocol index -> sortable index key.
//!
//! Tables served here have exactly one index column, so an [`IndexKey`] is a
//! one-element sub-identifier sequence. Keys compare lexicographically, which
//! is the ordering get-next walks in; for single-element keys this is plain
//! ascending numeric order.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{EntitySource, IndexError, KeyError};

/// Largest index a row may carry (the protocol index column is a positive Integer32).
pub const MAX_INDEX: u32 = i32::MAX as u32;

/// Protocol-level row identifier. Always in `1..=MAX_INDEX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Index(u32);

impl Index {
    pub fn new(v: u32) -> Option<Self> {
        if v == 0 || v > MAX_INDEX { None } else { Some(Self(v)) }
    }

    pub fn get(self) -> u32 { self.0 }
}

impl std::fmt::Display for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.0) }
}

/// Sortable instance suffix used for exact and strictly-greater lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexKey(SmallVec<[u32; 4]>);

impl IndexKey {
    pub fn from_subids(subids: &[u32]) -> Self { Self(SmallVec::from_slice(subids)) }

    /// The empty key sorts before every row; get-next on it yields the first row.
    pub fn empty() -> Self { Self(SmallVec::new()) }

    pub fn as_subids(&self) -> &[u32] { &self.0 }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl std::fmt::Display for IndexKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for s in self.0.iter() {
            if !first { f.write_str(".")?; }
            write!(f, "{}", s)?;
            first = false;
        }
        Ok(())
    }
}

impl std::str::FromStr for IndexKey {
    type Err = KeyError;

    /// Parses a dotted sub-identifier suffix such as `"7"` or `"1.3"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches('.');
        if s.is_empty() { return Ok(Self::empty()); }
        let mut out = SmallVec::new();
        for part in s.split('.') {
            let v = part.parse::<u32>().map_err(|_| KeyError::Malformed(s.to_string()))?;
            out.push(v);
        }
        Ok(Self(out))
    }
}

/// Parse a natural key as a bare positive integer index.
pub fn parse_index(natural_key: &str) -> Result<Index, IndexError> {
    let invalid = |reason: &'static str| IndexError::Invalid { key: natural_key.to_string(), reason };
    if natural_key.is_empty() { return Err(invalid("empty key")); }
    if !natural_key.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("not a bare integer"));
    }
    // all-digit input only fails to parse on overflow
    let v = natural_key.parse::<u64>().map_err(|_| invalid("out of range"))?;
    if v == 0 { return Err(invalid("zero index")); }
    if v > MAX_INDEX as u64 { return Err(invalid("out of range")); }
    Ok(Index(v as u32))
}

/// Apply the source's skip predicate, then derive the index from the natural key.
pub fn derive_index<S: EntitySource + ?Sized>(source: &S, entity: &S::Entity) -> Result<Index, IndexError> {
    let key = source.natural_key(entity);
    if source.skip(entity) {
        return Err(IndexError::Skip { key: key.to_string() });
    }
    parse_index(key)
}

pub fn encode(index: Index) -> IndexKey {
    let mut v = SmallVec::new();
    v.push(index.0);
    IndexKey(v)
}

pub fn decode(key: &IndexKey) -> Result<Index, KeyError> {
    match key.as_subids() {
        [v] => Index::new(*v).ok_or_else(|| KeyError::Malformed(key.to_string())),
        _ => Err(KeyError::Malformed(key.to_string())),
    }
}
