//! The NRI container-runtime plugin surface: decodes CDI-injected
//! environment variables back into tracker/binder state and enforces
//! cgroup v2 HugeTLB limits at container-create time.

#![forbid(unsafe_code)]

mod decode;
mod plugin;
mod pod;

pub use plugin::{CreateContainerError, NriPlugin};
pub use pod::{Container, ContainerAdjustment, PodSandbox};
