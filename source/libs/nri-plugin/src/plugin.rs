//! `synchronize` / `create_container` / `stop_container` / `remove_container`
//! / `remove_pod_sandbox`: the NRI container-runtime plugin surface, §4.7.

use discovery::Discoverer;
use hugetlb::{CgroupError, CgroupIo, Limit, LimitValue};
use thiserror::Error;
use tracker::{AlreadyBound, Binder, OwnerIdent, Tracker};

use crate::decode::decode_container_env;
use crate::pod::{Container, ContainerAdjustment, PodSandbox};

#[derive(Debug, Error)]
pub enum CreateContainerError {
    #[error(transparent)]
    AlreadyBound(#[from] AlreadyBound),
    #[error(transparent)]
    Cgroup(#[from] CgroupError),
}

/// Implements §4.7. Holds interface-typed references to the tracker,
/// binder and discoverer; the cgroup writer is injected so tests run
/// without touching a real cgroupfs.
pub struct NriPlugin<'a> {
    tracker: &'a Tracker,
    binder: &'a Binder,
    discoverer: &'a Discoverer,
    cgroup_io: &'a dyn CgroupIo,
    cgroup_mount: std::path::PathBuf,
    root_limits: Vec<Limit>,
}

impl<'a> NriPlugin<'a> {
    pub fn new(
        tracker: &'a Tracker,
        binder: &'a Binder,
        discoverer: &'a Discoverer,
        cgroup_io: &'a dyn CgroupIo,
        cgroup_mount: impl Into<std::path::PathBuf>,
        root_limits: Vec<Limit>,
    ) -> Self {
        Self { tracker, binder, discoverer, cgroup_io, cgroup_mount: cgroup_mount.into(), root_limits }
    }

    /// Reconstructs tracker and binder state from every running container's
    /// environment. Best-effort and idempotent: a malformed entry is logged
    /// and skipped rather than aborting the resync.
    pub fn synchronize(&self, containers: &[(PodSandbox, Container)]) {
        let machine = self.discoverer.machine_data();
        let known_names = self.discoverer.all_resource_names();

        for (pod, container) in containers {
            let decoded = decode_container_env(&container.env, &known_names, machine.default_page_size);
            for (uid, allocs) in decoded.allocations {
                self.tracker.register_claim(uid, allocs);
            }
            for uid in decoded.numa_sets.into_keys() {
                self.tracker.bind_claim(uid.clone(), pod.sandbox_id.clone());
                let owner = OwnerIdent { pod_uid: pod.uid.clone(), container_name: container.name.clone() };
                if let Err(err) = self.binder.set_owner(uid, owner) {
                    log::warn!("nri: synchronize found a conflicting claim owner: {err}");
                }
            }
        }
    }

    /// Decodes `container`'s environment, applies the same tracker/binder
    /// updates as [`NriPlugin::synchronize`], then writes the pod's cgroup
    /// HugeTLB limits as the sum of the root reservation, this container's
    /// allocations, and whatever siblings already wrote.
    pub fn create_container(
        &self,
        pod: &PodSandbox,
        container: &Container,
    ) -> Result<ContainerAdjustment, CreateContainerError> {
        let machine = self.discoverer.machine_data();
        let known_names = self.discoverer.all_resource_names();
        let decoded = decode_container_env(&container.env, &known_names, machine.default_page_size);

        for (uid, allocs) in &decoded.allocations {
            self.tracker.register_claim(uid.clone(), allocs.clone());
        }
        for uid in decoded.numa_sets.keys() {
            self.tracker.bind_claim(uid.clone(), pod.sandbox_id.clone());
            let owner = OwnerIdent { pod_uid: pod.uid.clone(), container_name: container.name.clone() };
            self.binder.set_owner(uid.clone(), owner)?;
        }

        let cg_parent = self.cgroup_mount.join(&pod.cgroup_parent);
        let container_allocs = decoded.all_allocations();
        let from_allocations = hugetlb::limits_from_allocations(&machine, &container_allocs);
        let from_system = hugetlb::limits_from_system_path(self.cgroup_io, &machine, &cg_parent);

        let effective = hugetlb::sum_limits(&hugetlb::sum_limits(&self.root_limits, &from_allocations), &from_system);
        hugetlb::set_system_limits(self.cgroup_io, &cg_parent, &effective)?;

        Ok(ContainerAdjustment)
    }

    /// No-op beyond structured logging: allocations are pod-scoped, not
    /// container-scoped.
    pub fn stop_container(&self, pod: &PodSandbox, container: &Container) {
        log::debug!("nri: stop_container pod={} container={}", pod.sandbox_id, container.name);
    }

    pub fn remove_container(&self, pod: &PodSandbox, container: &Container) {
        log::debug!("nri: remove_container pod={} container={}", pod.sandbox_id, container.name);
    }

    /// Releases every claim the pod owned and zeroes its cgroup HugeTLB
    /// limits, best effort. CDI device removal is DRA's job (Unprepare),
    /// not this one's.
    pub fn remove_pod_sandbox(&self, pod: &PodSandbox) {
        let uids = self.tracker.cleanup_pod(&pod.sandbox_id);
        self.binder.cleanup(&uids);

        let machine = self.discoverer.machine_data();
        let cg_parent = self.cgroup_mount.join(&pod.cgroup_parent);
        let zero_limits: Vec<Limit> = machine
            .huge_page_sizes
            .iter()
            .map(|&size| Limit {
                page_size_text: resource_model::units::kernel_hugepage_label(size),
                value: LimitValue::Set(0),
            })
            .collect();

        if let Err(err) = hugetlb::set_system_limits(self.cgroup_io, &cg_parent, &zero_limits) {
            if !is_missing_cgroup(&err) {
                log::warn!("nri: failed to zero cgroup limits for pod {}: {err}", pod.sandbox_id);
            }
        }
    }
}

fn is_missing_cgroup(err: &CgroupError) -> bool {
    matches!(err, CgroupError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
}
