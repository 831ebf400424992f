//! `MachineData` — the immutable platform snapshot the Discoverer produces
//! on each refresh.

use std::collections::BTreeMap;

/// One NUMA zone's HugeTLB- and ordinary-memory capacity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryArea {
    pub total_physical_bytes: u64,
    pub total_usable_bytes: u64,
    pub supported_page_sizes: Vec<u64>,
    pub default_huge_page_size: Option<u64>,
    /// page_size_bytes -> total pages available in this zone.
    pub huge_page_totals: BTreeMap<u64, u64>,
}

/// A distance-indexed memory locality domain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Zone {
    pub id: u32,
    pub distances: Vec<u32>,
    pub memory: Option<MemoryArea>,
}

/// Immutable snapshot of the platform, produced by the Discoverer on
/// startup and on every explicit refresh, then replaced atomically.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MachineData {
    pub default_page_size: u64,
    pub huge_page_sizes: Vec<u64>,
    pub zones: Vec<Zone>,
}

impl MachineData {
    /// An empty snapshot — used before the first successful refresh.
    pub fn empty(default_page_size: u64) -> Self {
        Self { default_page_size, huge_page_sizes: Vec::new(), zones: Vec::new() }
    }
}
