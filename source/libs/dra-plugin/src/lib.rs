//! The DRA kubelet-plugin surface: publishes resource slices and bridges
//! Prepare/Unprepare to the tracker and CDI spec manager.

#![forbid(unsafe_code)]

mod claim;
mod plugin;
mod publisher;

pub use claim::{AllocationResult, ClaimRef, ClaimStatus, DeviceAllocationResult, PreparedDevice, ResourceClaim};
pub use plugin::{DraPlugin, PrepareError, UnprepareError};
pub use publisher::{PublishError, ResourcePublisher};
