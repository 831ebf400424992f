//! Driver configuration, loaded from environment variables by `main.rs`
//! (§6: the daemon itself consumes no env vars in the upstream spec, but
//! the flags an out-of-core multiplexer would parse still need a typed,
//! testable home — this is it).

use std::path::PathBuf;

use thiserror::Error;

const ENV_NODE_NAME: &str = "NODE_NAME";
const ENV_SYSFS_ROOT: &str = "MEMDRAD_SYSFS_ROOT";
const ENV_PROCFS_ROOT: &str = "MEMDRAD_PROCFS_ROOT";
const ENV_CGROUP_MOUNT: &str = "MEMDRAD_CGROUP_MOUNT";
const ENV_CDI_SPEC_DIR: &str = "MEMDRAD_CDI_SPEC_DIR";
const ENV_NRI_SOCKET_PATH: &str = "MEMDRAD_NRI_SOCKET_PATH";

const DEFAULT_SYSFS_ROOT: &str = "/sys";
const DEFAULT_PROCFS_ROOT: &str = "/proc";
const DEFAULT_CGROUP_MOUNT: &str = "/sys/fs/cgroup";
const DEFAULT_CDI_SPEC_DIR: &str = "/var/run/cdi";
const DEFAULT_NRI_SOCKET_PATH: &str = "/var/run/nri/nri.sock";

pub const DRIVER_NAME: &str = "memdra.memory.node.kubernetes.io";
pub const VENDOR_CLASS: &str = "memory.node.kubernetes.io/hugetlb";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine a node name: set {ENV_NODE_NAME} or ensure the host has a resolvable hostname")]
    NoNodeName,
}

/// Everything §4.8's orchestration needs to start the driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriverConfig {
    pub node_name: String,
    pub driver_name: String,
    pub vendor_class: String,
    pub sysfs_root: PathBuf,
    pub procfs_root: PathBuf,
    pub cgroup_mount: PathBuf,
    pub cdi_spec_dir: PathBuf,
    pub nri_socket_path: PathBuf,
}

impl DriverConfig {
    /// Loads configuration from the environment, falling back to the
    /// documented defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let node_name = match std::env::var(ENV_NODE_NAME) {
            Ok(name) if !name.is_empty() => name,
            _ => hostname_fallback()?,
        };

        Ok(Self {
            node_name,
            driver_name: DRIVER_NAME.to_string(),
            vendor_class: VENDOR_CLASS.to_string(),
            sysfs_root: env_path_or(ENV_SYSFS_ROOT, DEFAULT_SYSFS_ROOT),
            procfs_root: env_path_or(ENV_PROCFS_ROOT, DEFAULT_PROCFS_ROOT),
            cgroup_mount: env_path_or(ENV_CGROUP_MOUNT, DEFAULT_CGROUP_MOUNT),
            cdi_spec_dir: env_path_or(ENV_CDI_SPEC_DIR, DEFAULT_CDI_SPEC_DIR),
            nri_socket_path: env_path_or(ENV_NRI_SOCKET_PATH, DEFAULT_NRI_SOCKET_PATH),
        })
    }
}

fn env_path_or(key: &str, default: &str) -> PathBuf {
    std::env::var(key).map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(default))
}

fn hostname_fallback() -> Result<String, ConfigError> {
    nix::unistd::gethostname()
        .map_err(|_| ConfigError::NoNodeName)?
        .into_string()
        .map_err(|_| ConfigError::NoNodeName)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_env_unset() {
        std::env::remove_var(ENV_SYSFS_ROOT);
        std::env::remove_var(ENV_CGROUP_MOUNT);
        std::env::set_var(ENV_NODE_NAME, "test-node");
        let config = DriverConfig::from_env().unwrap();
        assert_eq!(config.sysfs_root, PathBuf::from(DEFAULT_SYSFS_ROOT));
        assert_eq!(config.cgroup_mount, PathBuf::from(DEFAULT_CGROUP_MOUNT));
        assert_eq!(config.node_name, "test-node");
        std::env::remove_var(ENV_NODE_NAME);
    }

    #[test]
    fn explicit_env_overrides_defaults() {
        std::env::set_var(ENV_NODE_NAME, "test-node-2");
        std::env::set_var(ENV_SYSFS_ROOT, "/tmp/fake-sys");
        let config = DriverConfig::from_env().unwrap();
        assert_eq!(config.sysfs_root, PathBuf::from("/tmp/fake-sys"));
        std::env::remove_var(ENV_NODE_NAME);
        std::env::remove_var(ENV_SYSFS_ROOT);
    }
}
