//! Strongly-typed identifiers.

use std::fmt;

/// Stable identifier for a live simulation object (exciton or polaron).
///
/// Allocated from a per-simulation monotonic counter; never reused within
/// a run. All event and occupancy bookkeeping is keyed by `ObjectId`, so
/// cross-references survive object creation and destruction without any
/// positional coupling between parallel containers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ObjectId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Linear index of a lattice site.
///
/// `SiteIndex(n)` is the n-th site in x-major, z-fastest canonical order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SiteIndex(pub usize);

impl fmt::Display for SiteIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for SiteIndex {
    fn from(v: usize) -> Self {
        Self(v)
    }
}
