//! Writes `nr_hugepages` for one NUMA node's HugeTLB pool at boot time.
//! Interface-level only: no retry/backoff policy and no CDI/DRA/NRI
//! awareness — see the `hugetlb` and `discovery` libraries for those.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(name = "hugepages-provision", about = "Writes nr_hugepages for one NUMA node's HugeTLB pool")]
struct Args {
    /// Root of the sysfs mount.
    #[arg(long, default_value = "/sys")]
    sysfs_root: PathBuf,

    /// NUMA node id to provision.
    #[arg(long)]
    numa_node: u32,

    /// HugeTLB page size in kibibytes, e.g. 2048 for 2Mi pages.
    #[arg(long)]
    page_size_kb: u64,

    /// Number of pages to request.
    #[arg(long)]
    count: u64,
}

#[derive(Debug, Error)]
enum ProvisionError {
    #[error("I/O error at {path:?}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}

fn nr_hugepages_path(sysfs_root: &std::path::Path, numa_node: u32, page_size_kb: u64) -> PathBuf {
    sysfs_root
        .join("devices/system/node")
        .join(format!("node{numa_node}"))
        .join(format!("hugepages/hugepages-{page_size_kb}kB"))
        .join("nr_hugepages")
}

fn provision(args: &Args) -> Result<(), ProvisionError> {
    let path = nr_hugepages_path(&args.sysfs_root, args.numa_node, args.page_size_kb);
    fs::write(&path, args.count.to_string()).map_err(|source| ProvisionError::Io { path: path.clone(), source })?;

    match fs::read_to_string(&path) {
        Ok(actual) => log::info!(
            "hugepages-provision: node{} hugepages-{}kB now reports {} page(s) (requested {})",
            args.numa_node,
            args.page_size_kb,
            actual.trim(),
            args.count
        ),
        Err(err) => log::debug!("hugepages-provision: could not re-read {path:?} for confirmation: {err}"),
    }

    Ok(())
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(err) = provision(&args) {
        eprintln!("hugepages-provision: {err}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seed(root: &std::path::Path, numa_node: u32, page_size_kb: u64) {
        let dir = root
            .join("devices/system/node")
            .join(format!("node{numa_node}"))
            .join(format!("hugepages/hugepages-{page_size_kb}kB"));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("nr_hugepages"), "0").unwrap();
    }

    #[test]
    fn writes_requested_count() {
        let root = TempDir::new().unwrap();
        seed(root.path(), 0, 2048);
        let args = Args { sysfs_root: root.path().to_path_buf(), numa_node: 0, page_size_kb: 2048, count: 64 };
        provision(&args).unwrap();
        let written = fs::read_to_string(nr_hugepages_path(root.path(), 0, 2048)).unwrap();
        assert_eq!(written, "64");
    }

    #[test]
    fn missing_node_directory_is_reported_as_an_error() {
        let root = TempDir::new().unwrap();
        let args = Args { sysfs_root: root.path().to_path_buf(), numa_node: 3, page_size_kb: 2048, count: 10 };
        assert!(matches!(provision(&args), Err(ProvisionError::Io { .. })));
    }
}
