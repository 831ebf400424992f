//! Device records published to the DRA surface, and the naming strategy
//! used to mint their opaque short identifiers.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Canonical attribute key carrying the NUMA zone a device lives on.
pub const ATTR_NUMA_NODE: &str = "numaNode";
/// Compatibility aliases kept in lockstep with [`ATTR_NUMA_NODE`] so a
/// scheduler can align this driver's devices with CPU/network devices on
/// the same zone.
pub const ATTR_NUMA_NODE_COMPAT: &[&str] = &["cpu.numaNode", "network.numaNode"];
pub const ATTR_PAGE_SIZE: &str = "pageSize";
pub const ATTR_HUGE_TLB: &str = "hugeTLB";

/// An opaque short device identifier. Consumers select devices by
/// attribute, never by name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceName(String);

impl DeviceName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for DeviceName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for DeviceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strategy for minting [`DeviceName`]s. Tests substitute a deterministic
/// stub; the default returns `<canonical resource name>-<6 random lowercase
/// alphanumerics>`.
pub trait DeviceNameGenerator: Send + Sync {
    fn generate(&self, canonical_resource_name: &str) -> DeviceName;
}

/// Default strategy: canonical name plus six random lowercase alphanumeric
/// characters.
#[derive(Default)]
pub struct RandomSuffixNameGenerator;

impl DeviceNameGenerator for RandomSuffixNameGenerator {
    fn generate(&self, canonical_resource_name: &str) -> DeviceName {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase() as char)
            .take(6)
            .collect();
        DeviceName(format!("{canonical_resource_name}-{suffix}"))
    }
}

/// A request policy: the default allocation size and the `[min, max, step]`
/// range a claim may request within.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestPolicy {
    pub default_bytes: u64,
    pub min_bytes: u64,
    pub max_bytes: u64,
    pub step_bytes: u64,
}

/// The device's single `"size"` capacity entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceCapacity {
    pub size_bytes: u64,
    pub policy: RequestPolicy,
}

/// Device attributes as published to the DRA surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceAttributes {
    pub numa_zone: u32,
    pub page_size_text: String,
    pub huge_tlb: bool,
}

/// One device record: an advertisable unit of a [`resource_model::Span`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Device {
    pub name: DeviceName,
    pub attributes: DeviceAttributes,
    pub capacity: DeviceCapacity,
}

/// An ordered list of devices sharing one canonical resource name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Slice {
    pub resource_name: String,
    pub devices: Vec<Device>,
}
