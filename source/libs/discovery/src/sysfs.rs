//! Sysfs/procfs readers. All reads are rooted at a configurable `sysfs_root`
//! so tests can point at a fixture directory instead of the real `/sys`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use resource_model::units::kernel_hugepage_dir_to_bytes;
use resource_model::{MemoryArea, Zone};

use crate::DiscoveryError;

fn node_dir(sysfs_root: &Path) -> PathBuf {
    sysfs_root.join("devices/system/node")
}

fn global_hugepages_dir(sysfs_root: &Path) -> PathBuf {
    sysfs_root.join("kernel/mm/hugepages")
}

/// The default (non-HugeTLB) page size, read via `sysconf(_SC_PAGESIZE)`.
/// Falls back to 4 KiB when the syscall is unavailable, e.g. under a test
/// harness that does not run on Linux.
pub fn default_page_size() -> u64 {
    match nix::unistd::sysconf(nix::unistd::SysconfVar::PAGE_SIZE) {
        Ok(Some(size)) if size > 0 => size as u64,
        _ => 4096,
    }
}

/// Enumerates the HugeTLB page sizes the kernel supports, ascending.
pub fn huge_page_sizes(sysfs_root: &Path) -> Result<Vec<u64>, DiscoveryError> {
    let dir = global_hugepages_dir(sysfs_root);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(DiscoveryError::Io { path: dir, source: err }),
    };
    let mut sizes = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| DiscoveryError::Io { path: dir.clone(), source: err })?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Ok(bytes) = kernel_hugepage_dir_to_bytes(&name) {
            sizes.push(bytes);
        }
    }
    sizes.sort_unstable();
    Ok(sizes)
}

fn read_to_string(path: &Path) -> Result<String, DiscoveryError> {
    fs::read_to_string(path).map_err(|source| DiscoveryError::Io { path: path.to_path_buf(), source })
}

fn parse_distance(text: &str) -> Vec<u32> {
    text.split_whitespace().filter_map(|tok| tok.parse().ok()).collect()
}

/// Parses the `Node <id> MemTotal: <n> kB` line out of a per-node
/// `meminfo` file.
fn parse_mem_total_bytes(text: &str) -> Option<u64> {
    for line in text.lines() {
        if let Some(rest) = line.split("MemTotal:").nth(1) {
            let kb: u64 = rest.split_whitespace().next()?.parse().ok()?;
            return Some(kb * 1024);
        }
    }
    None
}

fn read_nr_hugepages(path: &Path) -> Result<u64, DiscoveryError> {
    let text = read_to_string(path)?;
    text.trim().parse().map_err(|_| DiscoveryError::MalformedValue {
        path: path.to_path_buf(),
        value: text.trim().to_string(),
    })
}

fn zone_huge_page_totals(
    node_path: &Path,
) -> Result<BTreeMap<u64, u64>, DiscoveryError> {
    let dir = node_path.join("hugepages");
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(err) => return Err(DiscoveryError::Io { path: dir, source: err }),
    };
    let mut totals = BTreeMap::new();
    for entry in entries {
        let entry = entry.map_err(|err| DiscoveryError::Io { path: dir.clone(), source: err })?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let Ok(page_size) = kernel_hugepage_dir_to_bytes(&name) else { continue };
        let nr = read_nr_hugepages(&entry.path().join("nr_hugepages"))?;
        totals.insert(page_size, nr);
    }
    Ok(totals)
}

/// Reads every `node<N>` directory under `sysfs_root` into a [`Zone`].
/// Individual zone read failures are logged and the zone is skipped rather
/// than failing the whole refresh.
pub fn read_zones(sysfs_root: &Path) -> Result<Vec<Zone>, DiscoveryError> {
    let dir = node_dir(sysfs_root);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(DiscoveryError::NoZones(dir))
        }
        Err(err) => return Err(DiscoveryError::Io { path: dir, source: err }),
    };

    let mut zones = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| DiscoveryError::Io { path: dir.clone(), source: err })?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let Some(id_str) = name.strip_prefix("node") else { continue };
        let Ok(id) = id_str.parse::<u32>() else { continue };
        let node_path = entry.path();

        match read_zone(&node_path, id) {
            Ok(zone) => zones.push(zone),
            Err(err) => {
                log::debug!("discovery: skipping node{id}: {err}");
            }
        }
    }
    zones.sort_by_key(|z| z.id);
    if zones.is_empty() {
        return Err(DiscoveryError::NoZones(dir));
    }
    Ok(zones)
}

fn read_zone(node_path: &Path, id: u32) -> Result<Zone, DiscoveryError> {
    let distances = match read_to_string(&node_path.join("distance")) {
        Ok(text) => parse_distance(&text),
        Err(_) => Vec::new(),
    };

    let memory = match read_to_string(&node_path.join("meminfo")) {
        Ok(text) => parse_mem_total_bytes(&text).map(|total| {
            let huge_page_totals = zone_huge_page_totals(node_path).unwrap_or_default();
            let supported_page_sizes: Vec<u64> = huge_page_totals.keys().copied().collect();
            MemoryArea {
                total_physical_bytes: total,
                total_usable_bytes: total,
                default_huge_page_size: supported_page_sizes.first().copied(),
                supported_page_sizes,
                huge_page_totals,
            }
        }),
        Err(_) => None,
    };

    Ok(Zone { id, distances, memory })
}
