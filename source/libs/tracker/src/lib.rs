//! The allocation tracker and exclusivity binder: two independently locked
//! maps that together record which claims own which allocations, which pod
//! sandboxes own which claims, and which container owns which claim.

#![forbid(unsafe_code)]

mod binder;
mod ident;
mod tracker;

pub use binder::{AlreadyBound, Binder};
pub use ident::{ClaimUid, ContainerName, OwnerIdent, PodSandboxId, PodUid};
pub use tracker::{AllocationMap, Tracker};
