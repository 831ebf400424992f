//! The HugeTLB limit lattice and cgroup v2 enforcement: turns a claim's
//! allocations into `hugetlb.<size>.max` / `hugetlb.<size>.rsvd.max` writes.

#![forbid(unsafe_code)]

mod cgroupfs;
mod limit;

pub use cgroupfs::{
    limits_from_system_path, limits_from_system_pid, resolve_pid_cgroup_path, set_system_limits, CgroupError,
    CgroupIo, StdCgroupIo,
};
pub use limit::{limits_from_allocations, sum_limits, Limit, LimitValue};
