//! Hardware discovery: reads NUMA zone and HugeTLB topology from sysfs and
//! materialises it as [`resource_model::Span`]s and publishable device
//! slices.

#![forbid(unsafe_code)]

mod device;
mod discoverer;
mod sysfs;

pub use device::{
    Device, DeviceAttributes, DeviceCapacity, DeviceName, DeviceNameGenerator,
    RandomSuffixNameGenerator, RequestPolicy, Slice, ATTR_HUGE_TLB, ATTR_NUMA_NODE,
    ATTR_NUMA_NODE_COMPAT, ATTR_PAGE_SIZE,
};
pub use discoverer::{
    huge_tlb_attribute_key, numa_attribute_keys, page_size_attribute_key, Discoverer, DiscoveryError,
    NotFound,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    struct FixedNameGenerator;

    impl DeviceNameGenerator for FixedNameGenerator {
        fn generate(&self, canonical_resource_name: &str) -> DeviceName {
            DeviceName::from(format!("{canonical_resource_name}-test"))
        }
    }

    fn write_node(root: &std::path::Path, id: u32, mem_total_kb: u64, huge: &[(u64, u64)]) {
        let node = root.join(format!("devices/system/node/node{id}"));
        fs::create_dir_all(&node).unwrap();
        fs::write(node.join("distance"), "10").unwrap();
        fs::write(node.join("meminfo"), format!("Node {id} MemTotal:       {mem_total_kb} kB\n"))
            .unwrap();
        for &(page_size, nr) in huge {
            let kb = page_size / 1024;
            let dir = node.join(format!("hugepages/hugepages-{kb}kB"));
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("nr_hugepages"), nr.to_string()).unwrap();
        }
    }

    fn write_global_hugepage_sizes(root: &std::path::Path, sizes: &[u64]) {
        for &size in sizes {
            let kb = size / 1024;
            fs::create_dir_all(root.join(format!("kernel/mm/hugepages/hugepages-{kb}kB"))).unwrap();
        }
    }

    // Scenario A (spec §8): single-NUMA node, ordinary memory only.
    #[test]
    fn scenario_a_single_memory_slice() {
        let dir = TempDir::new().unwrap();
        write_node(dir.path(), 0, 33_332_322_304 / 1024, &[]);

        let discoverer =
            Discoverer::with_name_generator(dir.path(), Box::new(FixedNameGenerator));
        discoverer.refresh().unwrap();

        let slices = discoverer.resource_slices();
        assert_eq!(slices.len(), 1);
        let slice = &slices[0];
        assert_eq!(slice.devices.len(), 1);
        let device = &slice.devices[0];
        assert_eq!(device.attributes.numa_zone, 0);
        assert!(!device.attributes.huge_tlb);
        assert_eq!(device.capacity.size_bytes, 33_332_322_304);
        assert_eq!(device.capacity.policy.default_bytes, 1024 * 1024);
        assert_eq!(device.capacity.policy.max_bytes, 33_332_322_304);

        assert_eq!(discoverer.all_resource_names(), ["memory".to_string()].into());
    }

    #[test]
    fn hugetlb_slice_amount_is_pages_times_page_size() {
        let dir = TempDir::new().unwrap();
        write_global_hugepage_sizes(dir.path(), &[2 * 1024 * 1024]);
        write_node(dir.path(), 0, 1024, &[(2 * 1024 * 1024, 2048)]);

        let discoverer =
            Discoverer::with_name_generator(dir.path(), Box::new(FixedNameGenerator));
        discoverer.refresh().unwrap();

        let names = discoverer.all_resource_names();
        assert!(names.contains("hugepages-2Mi"));

        let slice = discoverer
            .resource_slices()
            .into_iter()
            .find(|s| s.resource_name == "hugepages-2Mi")
            .unwrap();
        assert_eq!(slice.devices[0].capacity.size_bytes, 2048 * 2 * 1024 * 1024);
        assert!(slice.devices[0].attributes.huge_tlb);
    }

    #[test]
    fn zero_capacity_entries_are_skipped_not_fatal() {
        let dir = TempDir::new().unwrap();
        write_global_hugepage_sizes(dir.path(), &[2 * 1024 * 1024]);
        write_node(dir.path(), 0, 0, &[(2 * 1024 * 1024, 0)]);

        let discoverer =
            Discoverer::with_name_generator(dir.path(), Box::new(FixedNameGenerator));
        discoverer.refresh().unwrap();
        assert!(discoverer.resource_slices().is_empty());
    }

    #[test]
    fn refresh_preserves_previous_state_on_failure() {
        let dir = TempDir::new().unwrap();
        write_node(dir.path(), 0, 1024, &[]);
        let discoverer = Discoverer::with_name_generator(dir.path(), Box::new(FixedNameGenerator));
        discoverer.refresh().unwrap();
        assert_eq!(discoverer.resource_slices().len(), 1);

        // Break the same sysfs root out from under this instance: the next
        // refresh on it must fail without clobbering the cached slice.
        fs::remove_dir_all(dir.path().join("devices/system/node/node0")).unwrap();
        assert!(discoverer.refresh().is_err());
        assert_eq!(discoverer.resource_slices().len(), 1);
    }

    #[test]
    fn span_for_device_round_trips() {
        let dir = TempDir::new().unwrap();
        write_node(dir.path(), 0, 1024, &[]);
        let discoverer = Discoverer::with_name_generator(dir.path(), Box::new(FixedNameGenerator));
        discoverer.refresh().unwrap();

        let slice = &discoverer.resource_slices()[0];
        let device_name = &slice.devices[0].name;
        let span = discoverer.span_for_device(device_name).unwrap();
        assert_eq!(span.numa_zone(), 0);

        assert!(discoverer.span_for_device(&DeviceName::from("nope".to_string())).is_err());
    }
}
