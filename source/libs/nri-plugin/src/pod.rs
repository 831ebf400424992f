//! The subset of the NRI pod-sandbox/container wire model this surface
//! consumes. The NRI socket transport itself is an external collaborator
//! (§6); these are the plain domain types the orchestrator layer fills in.

use std::path::PathBuf;

use tracker::{ContainerName, PodSandboxId, PodUid};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PodSandbox {
    pub sandbox_id: PodSandboxId,
    pub uid: PodUid,
    /// Cgroup path for this pod, relative to the configured cgroup mount.
    pub cgroup_parent: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Container {
    pub name: ContainerName,
    /// The container's environment, as `"KEY=value"` assignments — this is
    /// where CDI's injected `MEMDRA_*` lines are found during resync.
    pub env: Vec<String>,
}

/// What this driver hands back to the runtime from `create_container`.
/// Always empty: the driver's container-create side effect is the cgroup
/// HugeTLB write, not an adjustment the runtime needs to apply.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContainerAdjustment;
