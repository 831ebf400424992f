//! §4.8 startup step (1): refuses to start on a kernel whose `cgroup2`
//! mount carries `memory_hugetlb_accounting`, which reshapes HugeTLB
//! accounting in a way incompatible with this driver's reservation
//! discipline (§9 rationale).

use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;

const INCOMPATIBLE_OPTION: &str = "memory_hugetlb_accounting";

#[derive(Debug, Error)]
pub enum PreflightError {
    #[error("I/O error reading {path:?}: {source}")]
    Io { path: std::path::PathBuf, source: io::Error },
    #[error(
        "kernel cgroup2 mount carries the '{INCOMPATIBLE_OPTION}' option, which is incompatible \
         with this driver's HugeTLB reservation discipline"
    )]
    MemoryHugeTlbAccounting,
}

/// Reads `<proc_root>/self/mountinfo` and aborts if any `cgroup2` mount's
/// option list carries [`INCOMPATIBLE_OPTION`].
pub fn check_mountinfo(proc_root: &Path) -> Result<(), PreflightError> {
    let path = proc_root.join("self/mountinfo");
    let content = fs::read_to_string(&path).map_err(|source| PreflightError::Io { path, source })?;
    for line in content.lines() {
        if is_incompatible_cgroup2_line(line) {
            return Err(PreflightError::MemoryHugeTlbAccounting);
        }
    }
    Ok(())
}

/// A `mountinfo` line has a `-` separator between the VFS-specific fields
/// and the filesystem-specific ones; the filesystem type and
/// superblock-wide options come right after it.
fn is_incompatible_cgroup2_line(line: &str) -> bool {
    let Some((_, after_separator)) = line.split_once(" - ") else { return false };
    let mut fields = after_separator.split_whitespace();
    let Some(fs_type) = fields.next() else { return false };
    if fs_type != "cgroup2" {
        return false;
    }
    let Some(_source) = fields.next() else { return false };
    let Some(options) = fields.next() else { return false };
    options.split(',').any(|opt| opt == INCOMPATIBLE_OPTION)
}
