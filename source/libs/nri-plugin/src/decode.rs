//! Decodes a container's full environment against §4.5's wire format,
//! grouping the results by claim UID for the caller to apply.

use std::collections::{BTreeSet, HashMap, HashSet};

use cdi::{CdiEnvError, DecodedEnv};
use resource_model::{Allocation, Span};
use tracker::{AllocationMap, ClaimUid};

#[derive(Default)]
pub struct DecodedContainerEnv {
    pub numa_sets: HashMap<ClaimUid, BTreeSet<u32>>,
    pub allocations: HashMap<ClaimUid, AllocationMap>,
}

impl DecodedContainerEnv {
    /// All allocations across every claim this container referenced, keyed
    /// by resource name — the shape `hugetlb::limits_from_allocations` wants.
    pub fn all_allocations(&self) -> AllocationMap {
        let mut merged = AllocationMap::new();
        for claim_allocs in self.allocations.values() {
            for (name, alloc) in claim_allocs {
                merge_allocation(&mut merged, name, *alloc);
            }
        }
        merged
    }
}

/// Two sibling claims can each grant the same resource name to one
/// container (e.g. two HugeTLB claims of the same page size); their amounts
/// sum. The merged allocation's NUMA zone is that of whichever entry was
/// seen first — `hugetlb::limits_from_allocations` only reads amount and
/// identity, never NUMA zone, so this is not observable downstream.
fn merge_allocation(merged: &mut AllocationMap, name: &str, alloc: Allocation) {
    merged
        .entry(name.to_string())
        .and_modify(|existing| {
            let total = existing.amount_bytes() + alloc.amount_bytes();
            if let Ok(span) = Span::new(existing.ident(), total, existing.numa_zone()) {
                if let Ok(summed) = span.make_allocation(total) {
                    *existing = summed;
                }
            }
        })
        .or_insert(alloc);
}

/// Decodes every `"KEY=value"` line in `env` that carries this driver's
/// prefix and names a resource the discoverer currently knows about.
/// Malformed values for a recognised key are logged and skipped — this is
/// resynchronisation, it must not abort on one bad container.
pub fn decode_container_env(
    env: &[String],
    known_resource_names: &HashSet<String>,
    default_page_size: u64,
) -> DecodedContainerEnv {
    let mut decoded = DecodedContainerEnv::default();
    for line in env {
        let Some((key, value)) = line.split_once('=') else { continue };
        match cdi::decode_env_var(key, value, known_resource_names, default_page_size) {
            Ok(Some(DecodedEnv::NumaNodes { uid, nodes })) => {
                decoded.numa_sets.insert(ClaimUid::from(uid), nodes);
            }
            Ok(Some(DecodedEnv::Allocation { uid, alloc })) => {
                decoded
                    .allocations
                    .entry(ClaimUid::from(uid))
                    .or_default()
                    .insert(alloc.ident().name(), alloc);
            }
            Ok(None) => {}
            Err(err) => log_decode_error(key, &err),
        }
    }
    decoded
}

fn log_decode_error(key: &str, err: &CdiEnvError) {
    log::warn!("nri: malformed environment entry {key:?}: {err}");
}
