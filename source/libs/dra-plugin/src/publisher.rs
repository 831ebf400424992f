//! The publication sink the orchestrator layer injects. The actual DRA
//! kubelet-plugin gRPC transport lives outside this workspace (§6); this
//! trait is the seam the driver publishes slices through.

use discovery::Slice;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("failed to publish resource slices: {0}")]
pub struct PublishError(#[from] Box<dyn std::error::Error + Send + Sync>);

/// Accepts the driver's current resource slices under one named pool.
pub trait ResourcePublisher: Send + Sync {
    fn publish(&self, pool_name: &str, slices: &[Slice]) -> Result<(), PublishError>;
}
