//! `publish_resources` / `prepare_resource_claims` / `unprepare_resource_claims`:
//! the three DRA kubelet-plugin operations this driver implements.

use std::collections::{BTreeSet, HashMap};

use cdi::{CdiError, CdiManager};
use discovery::{Discoverer, NotFound};
use resource_model::{Allocation, SpanError};
use thiserror::Error;
use tracker::{AllocationMap, ClaimUid, Tracker};

use crate::claim::{ClaimRef, PreparedDevice, ResourceClaim};
use crate::publisher::{PublishError, ResourcePublisher};

#[derive(Debug, Error)]
pub enum PrepareError {
    #[error(transparent)]
    UnknownDevice(#[from] NotFound),
    #[error(transparent)]
    Span(#[from] SpanError),
    #[error(transparent)]
    Cdi(#[from] CdiError),
}

#[derive(Debug, Error)]
pub enum UnprepareError {
    #[error(transparent)]
    Cdi(#[from] CdiError),
}

/// Implements §4.6. Holds shared, interface-typed references to the
/// components it reads and writes; owns no state of its own beyond the
/// identifiers naming this driver.
pub struct DraPlugin<'a> {
    discoverer: &'a Discoverer,
    tracker: &'a Tracker,
    cdi: &'a CdiManager,
    driver_name: String,
    vendor_class: String,
}

impl<'a> DraPlugin<'a> {
    pub fn new(
        discoverer: &'a Discoverer,
        tracker: &'a Tracker,
        cdi: &'a CdiManager,
        driver_name: impl Into<String>,
        vendor_class: impl Into<String>,
    ) -> Self {
        Self { discoverer, tracker, cdi, driver_name: driver_name.into(), vendor_class: vendor_class.into() }
    }

    /// Publishes the discoverer's current slices under a pool named after
    /// `node_name`. Errors are logged, not propagated: the next refresh
    /// tries again.
    pub fn publish_resources(&self, node_name: &str, publisher: &dyn ResourcePublisher) {
        let slices = self.discoverer.resource_slices();
        if let Err(err) = publisher.publish(node_name, &slices) {
            log::warn!("dra: failed to publish resource slices for pool {node_name:?}: {err}");
        }
    }

    /// Prepares every claim that carries an allocation result for this
    /// driver. One entry per input claim in the returned map.
    pub fn prepare_resource_claims(
        &self,
        claims: &[ResourceClaim],
    ) -> HashMap<ClaimUid, Result<Vec<PreparedDevice>, PrepareError>> {
        let mut results = HashMap::new();
        for claim in claims {
            let Some(allocation) = &claim.status.allocation else { continue };
            results.insert(claim.uid.clone(), self.prepare_one(&claim.uid, allocation));
        }
        results
    }

    fn prepare_one(
        &self,
        uid: &ClaimUid,
        allocation: &crate::claim::AllocationResult,
    ) -> Result<Vec<PreparedDevice>, PrepareError> {
        let mut numa_set = BTreeSet::new();
        let mut allocs: AllocationMap = AllocationMap::new();
        let mut prepared = Vec::new();

        for device in &allocation.devices {
            if device.driver_name != self.driver_name {
                continue;
            }
            let span = self.discoverer.span_for_device(&device.device_name)?;
            let amount = device.requested_bytes.unwrap_or_else(|| span.amount_bytes());
            let alloc: Allocation = span.make_allocation(amount)?;

            numa_set.insert(alloc.numa_zone());
            allocs.insert(alloc.ident().name(), alloc);
            prepared.push(PreparedDevice {
                pool_name: device.pool_name.clone(),
                device_name: device.device_name.clone(),
                cdi_device_id: format!("{}={}", self.vendor_class, uid),
            });
        }

        if numa_set.is_empty() {
            return Ok(Vec::new());
        }

        let mut envs = vec![cdi::encode_numa_nodes(uid.as_str(), &numa_set)];
        for alloc in allocs.values() {
            envs.push(cdi::encode_allocation(uid.as_str(), alloc));
        }

        self.cdi.add_device(uid.as_str(), envs)?;
        self.tracker.register_claim(uid.clone(), allocs);
        Ok(prepared)
    }

    /// Unprepares every given claim reference. A per-claim failure does not
    /// abort the batch.
    pub fn unprepare_resource_claims(
        &self,
        refs: &[ClaimRef],
    ) -> HashMap<ClaimUid, Result<(), UnprepareError>> {
        let mut results = HashMap::new();
        for claim_ref in refs {
            let outcome = match self.cdi.remove_device(claim_ref.uid.as_str()) {
                Ok(()) => {
                    self.tracker.unregister_claim(&claim_ref.uid);
                    Ok(())
                }
                Err(err) => Err(UnprepareError::from(err)),
            };
            results.insert(claim_ref.uid.clone(), outcome);
        }
        results
    }
}
