//! The Discoverer: builds [`MachineData`] from sysfs/procfs and derives the
//! device-name→span and resource-name→slice indices the DRA surface reads.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use resource_model::{IdentError, MachineData, ResourceIdent, ResourceKind, Span, SpanError};
use thiserror::Error;

use crate::device::{
    Device, DeviceAttributes, DeviceCapacity, DeviceName, DeviceNameGenerator, RandomSuffixNameGenerator,
    RequestPolicy, Slice, ATTR_HUGE_TLB, ATTR_NUMA_NODE, ATTR_NUMA_NODE_COMPAT, ATTR_PAGE_SIZE,
};
use crate::sysfs;

/// Errors building a [`MachineData`] snapshot.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("I/O error reading {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("no NUMA zones found under {0}")]
    NoZones(PathBuf),
    #[error("malformed value at {path}: {value:?}")]
    MalformedValue { path: PathBuf, value: String },
    #[error(transparent)]
    Ident(#[from] IdentError),
    #[error(transparent)]
    Span(#[from] SpanError),
}

/// A device name that the Discoverer has no record of.
#[derive(Debug, Error)]
#[error("unknown device: {0}")]
pub struct NotFound(pub DeviceName);

struct DiscovererState {
    machine: MachineData,
    device_index: HashMap<DeviceName, Span>,
    slices: Vec<Slice>,
}

/// Builds and caches resource slices from the host's NUMA/HugeTLB topology.
pub struct Discoverer {
    sysfs_root: PathBuf,
    name_gen: Box<dyn DeviceNameGenerator>,
    state: RwLock<DiscovererState>,
}

impl Discoverer {
    /// Builds a Discoverer rooted at `sysfs_root`, with empty caches until
    /// the first [`Discoverer::refresh`].
    pub fn new(sysfs_root: impl Into<PathBuf>) -> Self {
        Self::with_name_generator(sysfs_root, Box::new(RandomSuffixNameGenerator))
    }

    /// As [`Discoverer::new`], but with an injected device-naming strategy
    /// (tests use a deterministic stub).
    pub fn with_name_generator(
        sysfs_root: impl Into<PathBuf>,
        name_gen: Box<dyn DeviceNameGenerator>,
    ) -> Self {
        let default_page_size = sysfs::default_page_size();
        Self {
            sysfs_root: sysfs_root.into(),
            name_gen,
            state: RwLock::new(DiscovererState {
                machine: MachineData::empty(default_page_size),
                device_index: HashMap::new(),
                slices: Vec::new(),
            }),
        }
    }

    /// Rebuilds both indices. Idempotent. On failure the previous indices
    /// are preserved.
    pub fn refresh(&self) -> Result<(), DiscoveryError> {
        let machine = self.build_machine_data()?;
        let (device_index, slices) = build_indices(&machine, self.name_gen.as_ref());
        let mut state = self.state.write();
        state.machine = machine;
        state.device_index = device_index;
        state.slices = slices;
        Ok(())
    }

    /// The current slices. Order between slices is unspecified but stable
    /// between refreshes on unchanged hardware.
    pub fn resource_slices(&self) -> Vec<Slice> {
        self.state.read().slices.clone()
    }

    pub fn span_for_device(&self, name: &DeviceName) -> Result<Span, NotFound> {
        self.state
            .read()
            .device_index
            .get(name)
            .copied()
            .ok_or_else(|| NotFound(name.clone()))
    }

    /// Canonical resource names seen in the current slice set.
    pub fn all_resource_names(&self) -> HashSet<String> {
        self.state.read().slices.iter().map(|s| s.resource_name.clone()).collect()
    }

    /// The cached platform snapshot.
    pub fn machine_data(&self) -> MachineData {
        self.state.read().machine.clone()
    }

    /// Re-reads the platform without updating caches. Used by the HugeTLB
    /// subsystem when computing the root-reservation pool.
    pub fn fresh_machine_data(&self) -> Result<MachineData, DiscoveryError> {
        self.build_machine_data()
    }

    fn build_machine_data(&self) -> Result<MachineData, DiscoveryError> {
        let default_page_size = sysfs::default_page_size();
        let huge_page_sizes = sysfs::huge_page_sizes(&self.sysfs_root)?;
        let zones = sysfs::read_zones(&self.sysfs_root)?;
        Ok(MachineData { default_page_size, huge_page_sizes, zones })
    }
}

fn build_device(
    ident: ResourceIdent,
    span: &Span,
    name_gen: &dyn DeviceNameGenerator,
) -> Device {
    let name = name_gen.generate(&ident.name());
    let policy = if ident.needs_hugetlb() {
        RequestPolicy {
            default_bytes: ident.page_size_bytes(),
            min_bytes: ident.page_size_bytes(),
            max_bytes: span.amount_bytes(),
            step_bytes: ident.page_size_bytes(),
        }
    } else {
        RequestPolicy {
            default_bytes: (1024 * 1024).min(span.amount_bytes()),
            min_bytes: ident.page_size_bytes(),
            max_bytes: span.amount_bytes(),
            step_bytes: ident.page_size_bytes(),
        }
    };
    Device {
        name,
        attributes: DeviceAttributes {
            numa_zone: span.numa_zone(),
            page_size_text: resource_model::units::format_binary_si(ident.page_size_bytes()),
            huge_tlb: ident.needs_hugetlb(),
        },
        capacity: DeviceCapacity { size_bytes: span.amount_bytes(), policy },
    }
}

/// Exposes the NUMA-alignment attribute keys this driver writes, so other
/// layers (DRA publication) can reuse them verbatim.
pub fn numa_attribute_keys() -> (&'static str, &'static [&'static str]) {
    (ATTR_NUMA_NODE, ATTR_NUMA_NODE_COMPAT)
}

pub fn page_size_attribute_key() -> &'static str {
    ATTR_PAGE_SIZE
}

pub fn huge_tlb_attribute_key() -> &'static str {
    ATTR_HUGE_TLB
}

fn build_indices(
    machine: &MachineData,
    name_gen: &dyn DeviceNameGenerator,
) -> (HashMap<DeviceName, Span>, Vec<Slice>) {
    let mut device_index = HashMap::new();
    let mut slices_by_name: HashMap<String, Vec<Device>> = HashMap::new();

    for zone in &machine.zones {
        let Some(area) = &zone.memory else { continue };

        if area.total_usable_bytes > 0 {
            if let Ok(ident) = ResourceIdent::new(ResourceKind::Memory, machine.default_page_size) {
                if let Ok(span) = Span::new(ident, area.total_usable_bytes, zone.id) {
                    let device = build_device(ident, &span, name_gen);
                    device_index.insert(device.name.clone(), span);
                    slices_by_name.entry(ident.name()).or_default().push(device);
                }
            }
        } else {
            log::debug!("discovery: zone {} has zero usable memory, skipping", zone.id);
        }

        for (&page_size, &total_pages) in &area.huge_page_totals {
            if total_pages == 0 {
                log::debug!(
                    "discovery: zone {} has zero {}-byte huge pages, skipping",
                    zone.id,
                    page_size
                );
                continue;
            }
            let Ok(ident) = ResourceIdent::new(ResourceKind::Hugepages, page_size) else { continue };
            let amount = total_pages * page_size;
            if let Ok(span) = Span::new(ident, amount, zone.id) {
                let device = build_device(ident, &span, name_gen);
                device_index.insert(device.name.clone(), span);
                slices_by_name.entry(ident.name()).or_default().push(device);
            }
        }
    }

    let slices = slices_by_name
        .into_iter()
        .map(|(resource_name, devices)| Slice { resource_name, devices })
        .collect();
    (device_index, slices)
}
