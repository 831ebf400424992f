//! The claim-allocation tracker: `ClaimUid -> (resource name -> Allocation)`
//! plus the reverse `PodSandboxId -> {ClaimUid}` index, under one
//! reader-writer lock.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use resource_model::Allocation;

use crate::ident::{ClaimUid, PodSandboxId};

/// A claim's allocation set, keyed by `ident.name()`.
pub type AllocationMap = HashMap<String, Allocation>;

struct TrackerState {
    allocations_by_claim: HashMap<ClaimUid, AllocationMap>,
    claims_by_sandbox: HashMap<PodSandboxId, HashSet<ClaimUid>>,
}

/// Concurrent, crash-tolerant map from claim identities to allocations and
/// from pod sandbox identities to the claims they own. Reads take the
/// shared lock mode and do not block each other; writes take the exclusive
/// mode. Never held simultaneously with the [`crate::Binder`]'s mutex.
#[derive(Default)]
pub struct Tracker {
    state: RwLock<TrackerState>,
}

impl Default for TrackerState {
    fn default() -> Self {
        Self { allocations_by_claim: HashMap::new(), claims_by_sandbox: HashMap::new() }
    }
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a claim's allocations. An unknown UID gets `allocs` cloned
    /// in wholesale; a known UID is merged key-by-key, each key in `allocs`
    /// overwriting or inserting into the existing map. Idempotent: repeating
    /// the same call leaves the same observable state.
    pub fn register_claim(&self, uid: ClaimUid, allocs: AllocationMap) {
        let mut state = self.state.write();
        state.allocations_by_claim.entry(uid).or_default().extend(allocs);
    }

    /// Removes a claim's allocations. A missing UID is not an error.
    pub fn unregister_claim(&self, uid: &ClaimUid) {
        self.state.write().allocations_by_claim.remove(uid);
    }

    /// Returns a deep copy of a claim's allocation map so callers cannot
    /// mutate tracker state through the result.
    pub fn get_allocations(&self, uid: &ClaimUid) -> Option<AllocationMap> {
        self.state.read().allocations_by_claim.get(uid).cloned()
    }

    /// Records that `sandbox_id` owns `uid`. Idempotent per `(uid,
    /// sandbox_id)`.
    pub fn bind_claim(&self, uid: ClaimUid, sandbox_id: PodSandboxId) {
        self.state.write().claims_by_sandbox.entry(sandbox_id).or_default().insert(uid);
    }

    /// Atomically removes the sandbox's claim set and unregisters every
    /// claim it owned. Returns the UIDs cleaned up so the caller can cascade
    /// [`crate::Binder::cleanup`].
    pub fn cleanup_pod(&self, sandbox_id: &PodSandboxId) -> Vec<ClaimUid> {
        let mut state = self.state.write();
        let Some(uids) = state.claims_by_sandbox.remove(sandbox_id) else {
            return Vec::new();
        };
        for uid in &uids {
            state.allocations_by_claim.remove(uid);
        }
        uids.into_iter().collect()
    }

    pub fn count_claims(&self) -> usize {
        self.state.read().allocations_by_claim.len()
    }

    pub fn count_pods(&self) -> usize {
        self.state.read().claims_by_sandbox.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resource_model::{ResourceIdent, ResourceKind, Span};

    fn alloc(amount: u64) -> Allocation {
        let ident = ResourceIdent::new(ResourceKind::Memory, 4096).unwrap();
        Span::new(ident, amount, 0).unwrap().make_allocation(amount).unwrap()
    }

    #[test]
    fn get_allocations_returns_a_copy() {
        let tracker = Tracker::new();
        let uid = ClaimUid::from("u1");
        let mut allocs = AllocationMap::new();
        allocs.insert("memory".to_string(), alloc(4096));
        tracker.register_claim(uid.clone(), allocs);

        let mut copy = tracker.get_allocations(&uid).unwrap();
        copy.clear();
        assert_eq!(tracker.get_allocations(&uid).unwrap().len(), 1);
    }

    #[test]
    fn register_claim_merges_keys() {
        let tracker = Tracker::new();
        let uid = ClaimUid::from("u1");
        let mut first = AllocationMap::new();
        first.insert("memory".to_string(), alloc(4096));
        tracker.register_claim(uid.clone(), first);

        let mut second = AllocationMap::new();
        second.insert("hugepages-2Mi".to_string(), alloc(2 * 1024 * 1024));
        tracker.register_claim(uid.clone(), second);

        assert_eq!(tracker.get_allocations(&uid).unwrap().len(), 2);
    }

    #[test]
    fn unregister_missing_uid_is_noop() {
        let tracker = Tracker::new();
        tracker.unregister_claim(&ClaimUid::from("nope"));
    }

    #[test]
    fn double_register_is_idempotent() {
        let tracker = Tracker::new();
        let uid = ClaimUid::from("u1");
        let mut allocs = AllocationMap::new();
        allocs.insert("memory".to_string(), alloc(4096));
        tracker.register_claim(uid.clone(), allocs.clone());
        tracker.register_claim(uid.clone(), allocs);
        assert_eq!(tracker.get_allocations(&uid).unwrap().len(), 1);
    }

    #[test]
    fn cleanup_pod_is_complete_and_cascades() {
        let tracker = Tracker::new();
        let pod = PodSandboxId::from("p1");
        let u1 = ClaimUid::from("u1");
        let u2 = ClaimUid::from("u2");

        let mut allocs1 = AllocationMap::new();
        allocs1.insert("memory".to_string(), alloc(4096));
        tracker.register_claim(u1.clone(), allocs1);
        let mut allocs2 = AllocationMap::new();
        allocs2.insert("hugepages-2Mi".to_string(), alloc(2 * 1024 * 1024));
        tracker.register_claim(u2.clone(), allocs2);
        tracker.bind_claim(u1.clone(), pod.clone());
        tracker.bind_claim(u2.clone(), pod.clone());

        let mut cleaned = tracker.cleanup_pod(&pod);
        cleaned.sort();
        let mut expected = vec![u1.clone(), u2.clone()];
        expected.sort();
        assert_eq!(cleaned, expected);

        assert!(tracker.get_allocations(&u1).is_none());
        assert!(tracker.get_allocations(&u2).is_none());
        assert_eq!(tracker.count_claims(), 0);
        assert_eq!(tracker.count_pods(), 0);
    }
}
