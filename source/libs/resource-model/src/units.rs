//! Byte-count conversions between the textual unit dialects this driver has
//! to speak: binary-SI quantity strings (the DRA attribute/CDI env wire
//! format, e.g. `"2Mi"`) and the kernel's own HugeTLB naming (sysfs
//! directory names, cgroup `hugetlb.<size>.max` file names).

use thiserror::Error;

/// Error converting between a byte count and one of the textual unit
/// dialects this driver has to speak.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnitError {
    #[error("empty quantity string")]
    Empty,
    #[error("malformed quantity string: {0:?}")]
    Malformed(String),
    #[error("malformed kernel hugepage directory name: {0:?}")]
    MalformedHugepageDir(String),
}

const BINARY_SUFFIXES: &[(&str, u64)] =
    &[("Ti", 1u64 << 40), ("Gi", 1u64 << 30), ("Mi", 1u64 << 20), ("Ki", 1u64 << 10)];

/// Formats a byte count as a binary-SI quantity string, e.g. `2097152` as
/// `"2Mi"`. Falls back to a bare decimal byte count when no unit divides the
/// value evenly (including zero).
pub fn format_binary_si(bytes: u64) -> String {
    for (suffix, unit) in BINARY_SUFFIXES {
        if bytes > 0 && bytes % unit == 0 {
            return format!("{}{suffix}", bytes / unit);
        }
    }
    bytes.to_string()
}

/// Parses a binary-SI quantity string (`"2Mi"`, `"64Mi"`, `"1Gi"`) or a bare
/// decimal byte count back into a byte count.
pub fn parse_binary_si(s: &str) -> Result<u64, UnitError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(UnitError::Empty);
    }
    for (suffix, unit) in BINARY_SUFFIXES {
        if let Some(prefix) = s.strip_suffix(suffix) {
            let n: u64 =
                prefix.parse().map_err(|_| UnitError::Malformed(s.to_string()))?;
            return n.checked_mul(*unit).ok_or_else(|| UnitError::Malformed(s.to_string()));
        }
    }
    s.parse().map_err(|_| UnitError::Malformed(s.to_string()))
}

/// Parses a `/sys/kernel/mm/hugepages/hugepages-<N>kB` directory name into
/// its page size in bytes.
pub fn kernel_hugepage_dir_to_bytes(dirname: &str) -> Result<u64, UnitError> {
    let inner = dirname
        .strip_prefix("hugepages-")
        .and_then(|s| s.strip_suffix("kB"))
        .ok_or_else(|| UnitError::MalformedHugepageDir(dirname.to_string()))?;
    let kb: u64 =
        inner.parse().map_err(|_| UnitError::MalformedHugepageDir(dirname.to_string()))?;
    kb.checked_mul(1024).ok_or_else(|| UnitError::MalformedHugepageDir(dirname.to_string()))
}

/// Normalises a HugeTLB page size (in bytes) into the kernel's own cgroup
/// control-file naming: `2MB`, `1GB`, or `<N>KB` for anything else.
pub fn kernel_hugepage_label(page_size_bytes: u64) -> String {
    let kb = page_size_bytes / 1024;
    match kb {
        2048 => "2MB".to_string(),
        1_048_576 => "1GB".to_string(),
        other => format!("{other}KB"),
    }
}
