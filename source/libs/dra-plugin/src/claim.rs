//! The subset of the DRA kubelet-plugin wire model this surface consumes
//! and produces. The gRPC transport itself is an external collaborator
//! (§6): these are plain domain types the orchestrator layer fills in.

use discovery::DeviceName;
use tracker::ClaimUid;

/// One device selected by the scheduler for a claim. `requested_bytes`
/// is `None` when the whole span was allocated to this claim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceAllocationResult {
    pub driver_name: String,
    pub pool_name: String,
    pub device_name: DeviceName,
    pub requested_bytes: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AllocationResult {
    pub devices: Vec<DeviceAllocationResult>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClaimStatus {
    pub allocation: Option<AllocationResult>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceClaim {
    pub uid: ClaimUid,
    pub status: ClaimStatus,
}

/// Identifies a claim for [`crate::DraPlugin::unprepare_resource_claims`]
/// without needing its full status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimRef {
    pub uid: ClaimUid,
}

/// One device record returned to the orchestrator per successfully
/// prepared `DeviceAllocationResult`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedDevice {
    pub pool_name: String,
    pub device_name: DeviceName,
    /// `<vendor>/<class>=<device_name>` CDI qualified name.
    pub cdi_device_id: String,
}
