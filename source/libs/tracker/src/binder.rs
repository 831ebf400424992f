//! The exclusivity binder: enforces at most one consumer per claim.

use std::collections::HashMap;

use parking_lot::Mutex;
use thiserror::Error;

use crate::ident::{ClaimUid, OwnerIdent};

/// A claim already has a different owner than the one being bound.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("claim {uid} is already bound to {existing_owner}")]
pub struct AlreadyBound {
    pub uid: ClaimUid,
    pub existing_owner: OwnerIdent,
}

/// `ClaimUid -> OwnerIdent`, independently locked from the [`crate::Tracker`].
/// Consulted on every container create; kept separate from the tracker's
/// lock so the slow pod-cleanup path never blocks the hot container-create
/// path.
#[derive(Default)]
pub struct Binder {
    owner_by_claim: Mutex<HashMap<ClaimUid, OwnerIdent>>,
}

impl Binder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Succeeds if `uid` is unbound, or if its existing owner equals
    /// `owner` (idempotent re-bind). Fails with [`AlreadyBound`] if a
    /// different owner already holds the claim.
    pub fn set_owner(&self, uid: ClaimUid, owner: OwnerIdent) -> Result<(), AlreadyBound> {
        let mut map = self.owner_by_claim.lock();
        match map.get(&uid) {
            None => {
                map.insert(uid, owner);
                Ok(())
            }
            Some(existing) if *existing == owner => Ok(()),
            Some(existing) => Err(AlreadyBound { uid, existing_owner: existing.clone() }),
        }
    }

    pub fn find_owner(&self, uid: &ClaimUid) -> Option<OwnerIdent> {
        self.owner_by_claim.lock().get(uid).cloned()
    }

    /// Removes each UID unconditionally.
    pub fn cleanup(&self, uids: &[ClaimUid]) {
        let mut map = self.owner_by_claim.lock();
        for uid in uids {
            map.remove(uid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::{ContainerName, PodUid};

    fn owner(pod: &str, container: &str) -> OwnerIdent {
        OwnerIdent { pod_uid: PodUid::from(pod), container_name: ContainerName::from(container) }
    }

    #[test]
    fn exclusivity_rejects_a_different_owner() {
        let binder = Binder::new();
        let uid = ClaimUid::from("u1");
        binder.set_owner(uid.clone(), owner("p1", "c1")).unwrap();

        let err = binder.set_owner(uid.clone(), owner("p1", "c2")).unwrap_err();
        assert_eq!(err.existing_owner, owner("p1", "c1"));
    }

    #[test]
    fn rebinding_the_same_owner_is_idempotent() {
        let binder = Binder::new();
        let uid = ClaimUid::from("u1");
        binder.set_owner(uid.clone(), owner("p1", "c1")).unwrap();
        binder.set_owner(uid.clone(), owner("p1", "c1")).unwrap();
        assert_eq!(binder.find_owner(&uid), Some(owner("p1", "c1")));
    }

    #[test]
    fn cleanup_removes_unconditionally() {
        let binder = Binder::new();
        let uid = ClaimUid::from("u1");
        binder.set_owner(uid.clone(), owner("p1", "c1")).unwrap();
        binder.cleanup(&[uid.clone()]);
        assert!(binder.find_owner(&uid).is_none());
    }
}
