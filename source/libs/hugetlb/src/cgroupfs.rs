//! Reads and writes cgroup v2 `hugetlb.<size>.max` / `hugetlb.<size>.rsvd.max`
//! control files, and resolves a PID's unified-hierarchy cgroup path.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use resource_model::MachineData;
use thiserror::Error;

use crate::limit::{Limit, LimitValue};

#[derive(Debug, Error)]
pub enum CgroupError {
    #[error("I/O error at {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("cgroup entry for pid {pid} not found in {path:?}")]
    PidNotInCgroup { pid: i32, path: PathBuf },
    #[error("malformed control file content at {path:?}: {content:?}")]
    MalformedContent { path: PathBuf, content: String },
}

const MAX_SUFFIX: &str = "max";
const RSVD_SUFFIX: &str = "rsvd.max";

/// Abstraction over the cgroup v2 filesystem, injected so tests can run
/// against a `tempfile::TempDir` tree instead of the real `/sys/fs/cgroup`.
/// The default implementation reads and writes ordinary files; no actual
/// Linux-specific file-descriptor trickery is required since cgroupfs
/// control files are plain text files under a well-known directory.
pub trait CgroupIo: Send + Sync {
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
    fn write_string(&self, path: &Path, content: &str) -> io::Result<()>;
}

/// The default [`CgroupIo`]: thin wrapper over `std::fs`.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdCgroupIo;

impl CgroupIo for StdCgroupIo {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn write_string(&self, path: &Path, content: &str) -> io::Result<()> {
        fs::write(path, content)
    }
}

fn control_file_stem(page_size_text: &str) -> String {
    format!("hugetlb.{page_size_text}")
}

/// Reads one page size's `hugetlb.<size>.max` limit under `cg_path`.
/// `ENOENT` and the literal content `"max"` both decode as [`LimitValue::Unset`].
/// Any other unparseable content is logged and the row is omitted entirely by
/// the caller ([`limits_from_system_path`]) rather than surfaced as an error.
fn read_one_limit(io: &dyn CgroupIo, cg_path: &Path, page_size_text: &str) -> Option<LimitValue> {
    let path = cg_path.join(format!("{}.{MAX_SUFFIX}", control_file_stem(page_size_text)));
    let content = match io.read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Some(LimitValue::Unset),
        Err(err) => {
            log::warn!("hugetlb: failed to read {path:?}: {err}");
            return None;
        }
    };
    let trimmed = content.trim();
    if trimmed == MAX_SUFFIX {
        return Some(LimitValue::Unset);
    }
    match trimmed.parse::<u64>() {
        Ok(n) => Some(LimitValue::Set(n)),
        Err(_) => {
            log::warn!("hugetlb: malformed control file content at {path:?}: {trimmed:?}");
            None
        }
    }
}

/// Reads every HugeTLB page size `machine` supports from the cgroup at
/// `cg_path`. A row whose control file cannot be parsed is skipped entirely
/// rather than defaulted, distinct from [`crate::limits_from_allocations`]'s
/// `Set(0)` default.
pub fn limits_from_system_path(io: &dyn CgroupIo, machine: &MachineData, cg_path: &Path) -> Vec<Limit> {
    machine
        .huge_page_sizes
        .iter()
        .filter_map(|&size| {
            let label = resource_model::units::kernel_hugepage_label(size);
            read_one_limit(io, cg_path, &label).map(|value| Limit { page_size_text: label, value })
        })
        .collect()
}

/// Resolves `pid`'s unified-hierarchy cgroup path from its `/proc/<pid>/cgroup`
/// file's `0::<path>` line, joined under `cgroup_mount`.
pub fn resolve_pid_cgroup_path(
    io: &dyn CgroupIo,
    proc_root: &Path,
    cgroup_mount: &Path,
    pid: i32,
) -> Result<PathBuf, CgroupError> {
    let proc_path = proc_root.join(pid.to_string()).join("cgroup");
    let content = io
        .read_to_string(&proc_path)
        .map_err(|source| CgroupError::Io { path: proc_path.clone(), source })?;

    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("0::") {
            let relative = rest.trim_start_matches('/');
            return Ok(cgroup_mount.join(relative));
        }
    }
    Err(CgroupError::PidNotInCgroup { pid, path: proc_path })
}

/// Convenience wrapper: resolves `pid`'s cgroup path, then reads its limits.
pub fn limits_from_system_pid(
    io: &dyn CgroupIo,
    machine: &MachineData,
    proc_root: &Path,
    cgroup_mount: &Path,
    pid: i32,
) -> Result<Vec<Limit>, CgroupError> {
    let cg_path = resolve_pid_cgroup_path(io, proc_root, cgroup_mount, pid)?;
    Ok(limits_from_system_path(io, machine, &cg_path))
}

fn encode(value: LimitValue) -> String {
    match value {
        LimitValue::Unset => MAX_SUFFIX.to_string(),
        LimitValue::Set(n) => n.to_string(),
    }
}

/// Writes both `hugetlb.<size>.max` and `hugetlb.<size>.rsvd.max` for every
/// row in `limits`, under `cg_path`.
pub fn set_system_limits(io: &dyn CgroupIo, cg_path: &Path, limits: &[Limit]) -> Result<(), CgroupError> {
    for limit in limits {
        let stem = control_file_stem(&limit.page_size_text);
        let body = encode(limit.value);
        for suffix in [MAX_SUFFIX, RSVD_SUFFIX] {
            let path = cg_path.join(format!("{stem}.{suffix}"));
            io.write_string(&path, &body).map_err(|source| CgroupError::Io { path, source })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use resource_model::MachineData;
    use tempfile::TempDir;

    fn machine() -> MachineData {
        MachineData { default_page_size: 4096, huge_page_sizes: vec![2 * 1024 * 1024, 1024 * 1024 * 1024], zones: vec![] }
    }

    #[test]
    fn missing_control_file_reads_as_unset() {
        let dir = TempDir::new().unwrap();
        let limits = limits_from_system_path(&StdCgroupIo, &machine(), dir.path());
        assert!(limits.iter().all(|l| l.value == LimitValue::Unset));
        assert_eq!(limits.len(), 2);
    }

    #[test]
    fn literal_max_content_reads_as_unset() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("hugetlb.2MB.max"), "max\n").unwrap();
        let limits = limits_from_system_path(&StdCgroupIo, &machine(), dir.path());
        let row = limits.iter().find(|l| l.page_size_text == "2MB").unwrap();
        assert_eq!(row.value, LimitValue::Unset);
    }

    #[test]
    fn numeric_content_reads_as_set() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("hugetlb.2MB.max"), "67108864\n").unwrap();
        let limits = limits_from_system_path(&StdCgroupIo, &machine(), dir.path());
        let row = limits.iter().find(|l| l.page_size_text == "2MB").unwrap();
        assert_eq!(row.value, LimitValue::Set(67108864));
    }

    #[test]
    fn garbage_content_is_skipped_not_errored() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("hugetlb.2MB.max"), "not-a-number\n").unwrap();
        let limits = limits_from_system_path(&StdCgroupIo, &machine(), dir.path());
        assert!(limits.iter().all(|l| l.page_size_text != "2MB"));
        assert_eq!(limits.len(), 1);
    }

    #[test]
    fn set_system_limits_writes_both_max_and_rsvd_max() {
        let dir = TempDir::new().unwrap();
        let limits = vec![
            Limit { page_size_text: "2MB".to_string(), value: LimitValue::Set(4096) },
            Limit { page_size_text: "1GB".to_string(), value: LimitValue::Unset },
        ];
        set_system_limits(&StdCgroupIo, dir.path(), &limits).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("hugetlb.2MB.max")).unwrap(), "4096");
        assert_eq!(fs::read_to_string(dir.path().join("hugetlb.2MB.rsvd.max")).unwrap(), "4096");
        assert_eq!(fs::read_to_string(dir.path().join("hugetlb.1GB.max")).unwrap(), "max");
        assert_eq!(fs::read_to_string(dir.path().join("hugetlb.1GB.rsvd.max")).unwrap(), "max");
    }

    #[test]
    fn resolve_pid_cgroup_path_parses_unified_hierarchy_line() {
        let proc_root = TempDir::new().unwrap();
        let pid_dir = proc_root.path().join("4242");
        fs::create_dir_all(&pid_dir).unwrap();
        fs::write(pid_dir.join("cgroup"), "0::/kubepods/pod-abc/container-def\n").unwrap();

        let cgroup_mount = PathBuf::from("/sys/fs/cgroup");
        let path = resolve_pid_cgroup_path(&StdCgroupIo, proc_root.path(), &cgroup_mount, 4242).unwrap();
        assert_eq!(path, cgroup_mount.join("kubepods/pod-abc/container-def"));
    }

    #[test]
    fn resolve_pid_cgroup_path_errors_when_no_unified_line_present() {
        let proc_root = TempDir::new().unwrap();
        let pid_dir = proc_root.path().join("1");
        fs::create_dir_all(&pid_dir).unwrap();
        fs::write(pid_dir.join("cgroup"), "1:name=systemd:/\n").unwrap();

        let err = resolve_pid_cgroup_path(&StdCgroupIo, proc_root.path(), Path::new("/sys/fs/cgroup"), 1);
        assert!(matches!(err, Err(CgroupError::PidNotInCgroup { .. })));
    }
}
