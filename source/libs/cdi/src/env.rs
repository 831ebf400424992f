//! Encodes and decodes one `(ClaimUid, numa_node_set)` tuple and one
//! `(ClaimUid, Allocation)` tuple as CDI container-edit environment
//! variables. Kept as free functions: the codec is a pure function pair.

use std::collections::BTreeSet;

use resource_model::units::{format_binary_si, parse_binary_si};
use resource_model::{Allocation, ResourceIdent, ResourceKind, Span};
use thiserror::Error;

/// The fixed identifier every environment variable this driver injects is
/// prefixed with.
pub const ENV_PREFIX: &str = "MEMDRA";
const NUMA_NODES_TAIL: &str = "NUMANodes";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CdiEnvError {
    #[error("malformed key {0:?}: expected <prefix>_<uid>_<tail>")]
    MalformedKey(String),
    #[error("malformed NUMA node set {0:?}")]
    MalformedNumaSet(String),
    #[error("malformed allocation value {0:?}")]
    MalformedAllocation(String),
}

/// One decoded `MEMDRA_*` environment variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodedEnv {
    NumaNodes { uid: String, nodes: BTreeSet<u32> },
    Allocation { uid: String, alloc: Allocation },
}

/// Encodes the NUMA node set line: `MEMDRA_<uid>_NUMANodes=<cpuset-list>`.
/// `nodes` must not be empty.
pub fn encode_numa_nodes(uid: &str, nodes: &BTreeSet<u32>) -> String {
    format!("{ENV_PREFIX}_{uid}_{NUMA_NODES_TAIL}={}", format_cpuset_list(nodes))
}

/// Encodes one allocation line:
/// `MEMDRA_<uid>_<resource_with_underscores>=numanode:<n>,size:<binarySI>`.
pub fn encode_allocation(uid: &str, alloc: &Allocation) -> String {
    let key = alloc.ident().name().replace('-', "_");
    format!(
        "{ENV_PREFIX}_{uid}_{key}=numanode:{},size:{}",
        alloc.numa_zone(),
        format_binary_si(alloc.amount_bytes())
    )
}

/// Decodes one `KEY=VALUE` environment assignment.
///
/// Returns `Ok(None)` when the key does not carry [`ENV_PREFIX`], or when it
/// names a resource this driver does not recognise (`known_resource_names`
/// is the tracker's current [`tracker::Tracker::all_resource_names`]-style
/// set) — both are treated as unrelated environment variables, not errors.
/// Once a key is recognised as ours, a malformed value is an error.
pub fn decode_env_var(
    key: &str,
    value: &str,
    known_resource_names: &std::collections::HashSet<String>,
    default_page_size: u64,
) -> Result<Option<DecodedEnv>, CdiEnvError> {
    let Some(rest) = key.strip_prefix(&format!("{ENV_PREFIX}_")) else { return Ok(None) };
    let mut parts = rest.splitn(2, '_');
    let uid = parts.next().ok_or_else(|| CdiEnvError::MalformedKey(key.to_string()))?;
    let tail = parts.next().ok_or_else(|| CdiEnvError::MalformedKey(key.to_string()))?;

    if tail == NUMA_NODES_TAIL {
        let nodes = parse_cpuset_list(value).map_err(|_| CdiEnvError::MalformedNumaSet(value.to_string()))?;
        return Ok(Some(DecodedEnv::NumaNodes { uid: uid.to_string(), nodes }));
    }

    let resource_name = tail.replace('_', "-");
    if !known_resource_names.contains(&resource_name) {
        return Ok(None);
    }

    let ident = ident_from_canonical_name(&resource_name, default_page_size)
        .ok_or_else(|| CdiEnvError::MalformedAllocation(value.to_string()))?;
    let (numa_zone, amount_bytes) = parse_allocation_value(value)
        .ok_or_else(|| CdiEnvError::MalformedAllocation(value.to_string()))?;
    let span = Span::new(ident, amount_bytes, numa_zone)
        .map_err(|_| CdiEnvError::MalformedAllocation(value.to_string()))?;
    let alloc = span
        .make_allocation(amount_bytes)
        .map_err(|_| CdiEnvError::MalformedAllocation(value.to_string()))?;
    Ok(Some(DecodedEnv::Allocation { uid: uid.to_string(), alloc }))
}

/// Reverses [`ResourceIdent::name`]. Lossless for HugeTLB (the page size is
/// spelled out in the name); ordinary memory has no page size in its name,
/// so the caller's `default_page_size` fills it in.
fn ident_from_canonical_name(name: &str, default_page_size: u64) -> Option<ResourceIdent> {
    if name == "memory" {
        return ResourceIdent::new(ResourceKind::Memory, default_page_size).ok();
    }
    let size_text = name.strip_prefix("hugepages-")?;
    let bytes = parse_binary_si(size_text).ok()?;
    ResourceIdent::new(ResourceKind::Hugepages, bytes).ok()
}

fn parse_allocation_value(value: &str) -> Option<(u32, u64)> {
    let mut numa_zone = None;
    let mut amount = None;
    for part in value.split(',') {
        let (key, val) = part.split_once(':')?;
        match key {
            "numanode" => numa_zone = val.parse().ok(),
            "size" => amount = parse_binary_si(val).ok(),
            _ => return None,
        }
    }
    Some((numa_zone?, amount?))
}

fn format_cpuset_list(nodes: &BTreeSet<u32>) -> String {
    let mut parts = Vec::new();
    let mut iter = nodes.iter().copied().peekable();
    while let Some(start) = iter.next() {
        let mut end = start;
        while iter.peek() == Some(&(end + 1)) {
            end = iter.next().unwrap();
        }
        if start == end {
            parts.push(start.to_string());
        } else {
            parts.push(format!("{start}-{end}"));
        }
    }
    parts.join(",")
}

fn parse_cpuset_list(s: &str) -> Result<BTreeSet<u32>, ()> {
    let mut nodes = BTreeSet::new();
    for part in s.split(',') {
        if let Some((start, end)) = part.split_once('-') {
            let start: u32 = start.parse().map_err(|_| ())?;
            let end: u32 = end.parse().map_err(|_| ())?;
            if start > end {
                return Err(());
            }
            nodes.extend(start..=end);
        } else {
            nodes.insert(part.parse().map_err(|_| ())?);
        }
    }
    if nodes.is_empty() {
        return Err(());
    }
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use resource_model::{ResourceIdent, ResourceKind, Span};

    fn known_names() -> std::collections::HashSet<String> {
        ["memory".to_string(), "hugepages-2Mi".to_string()].into()
    }

    #[test]
    fn cpuset_list_round_trips() {
        for raw in [vec![0u32], vec![0, 1, 2, 3], vec![0, 2, 4]] {
            let set: BTreeSet<u32> = raw.into_iter().collect();
            let text = format_cpuset_list(&set);
            assert_eq!(parse_cpuset_list(&text).unwrap(), set);
        }
    }

    #[test]
    fn numa_nodes_line_matches_wire_format() {
        let set: BTreeSet<u32> = [0, 1, 2, 3].into_iter().collect();
        assert_eq!(encode_numa_nodes("FOOBAR", &set), "MEMDRA_FOOBAR_NUMANodes=0-3");
    }

    // Scenario B (spec §8): 2M HugeTLB allocation round trip.
    #[test]
    fn scenario_b_allocation_round_trip() {
        let ident = ResourceIdent::new(ResourceKind::Hugepages, 2 * 1024 * 1024).unwrap();
        let span = Span::new(ident, 2 * 1024 * 1024 * 2048, 0).unwrap();
        let alloc = span.make_allocation(32 * 2 * 1024 * 1024).unwrap();

        let line = encode_allocation("FOOBAR", &alloc);
        assert_eq!(line, "MEMDRA_FOOBAR_hugepages_2Mi=numanode:0,size:64Mi");

        let (key, value) = line.split_once('=').unwrap();
        let decoded = decode_env_var(key, value, &known_names(), 4096).unwrap().unwrap();
        match decoded {
            DecodedEnv::Allocation { uid, alloc: decoded_alloc } => {
                assert_eq!(uid, "FOOBAR");
                assert_eq!(decoded_alloc, alloc);
            }
            _ => panic!("expected an allocation"),
        }
    }

    #[test]
    fn unrecognised_prefix_is_silently_skipped() {
        assert_eq!(decode_env_var("PATH", "/usr/bin", &known_names(), 4096).unwrap(), None);
    }

    #[test]
    fn unrelated_resource_name_is_silently_skipped() {
        let empty = std::collections::HashSet::new();
        assert_eq!(
            decode_env_var("MEMDRA_FOOBAR_hugepages_2Mi", "numanode:0,size:64Mi", &empty, 4096).unwrap(),
            None
        );
    }

    #[test]
    fn malformed_value_for_a_claimed_key_is_an_error() {
        let err = decode_env_var("MEMDRA_FOOBAR_NUMANodes", "not-a-set", &known_names(), 4096).unwrap_err();
        assert_eq!(err, CdiEnvError::MalformedNumaSet("not-a-set".to_string()));
    }
}
