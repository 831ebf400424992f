//! The on-disk CDI spec document and the manager that rewrites it atomically.

use std::fs::{self, File};
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// CDI spec version this driver emits.
pub const CDI_VERSION: &str = "0.8.0";

#[derive(Debug, Error)]
pub enum CdiError {
    #[error("I/O error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("malformed CDI spec at {path}: {source}")]
    Decode { path: PathBuf, source: serde_json::Error },
    #[error("failed to serialise CDI spec: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One device's container edits, as CDI `"KEY=value"` assignments.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerEdits {
    pub env: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CdiDevice {
    pub name: String,
    #[serde(rename = "containerEdits")]
    pub container_edits: ContainerEdits,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CdiSpec {
    #[serde(rename = "cdiVersion")]
    pub cdi_version: String,
    pub kind: String,
    pub devices: Vec<CdiDevice>,
}

/// Owns one JSON spec file at `<spec_dir>/<driver_name>.json`, rewritten
/// atomically (marshal -> temp file in the same directory -> fsync ->
/// rename) on every mutation. Guarded by an internal mutex: only one daemon
/// instance per node is supported, so no cross-process locking is needed.
pub struct CdiManager {
    spec_dir: PathBuf,
    driver_name: String,
    kind: String,
    write_lock: Mutex<()>,
}

impl CdiManager {
    /// `kind` is the CDI `vendor/class` string devices in this spec are
    /// declared under, e.g. `"memory.node.kubernetes.io/hugetlb"`.
    pub fn new(spec_dir: impl Into<PathBuf>, driver_name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            spec_dir: spec_dir.into(),
            driver_name: driver_name.into(),
            kind: kind.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn path(&self) -> PathBuf {
        self.spec_dir.join(format!("{}.json", self.driver_name))
    }

    /// The canonical empty spec: version, kind, no devices.
    pub fn empty_spec(&self) -> CdiSpec {
        CdiSpec { cdi_version: CDI_VERSION.to_string(), kind: self.kind.clone(), devices: Vec::new() }
    }

    /// Returns the current parsed spec. A missing or empty file yields the
    /// empty spec, not an error.
    pub fn get_spec(&self) -> Result<CdiSpec, CdiError> {
        let path = self.path();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(self.empty_spec()),
            Err(source) => return Err(CdiError::Io { path, source }),
        };
        if text.trim().is_empty() {
            return Ok(self.empty_spec());
        }
        serde_json::from_str(&text).map_err(|source| CdiError::Decode { path, source })
    }

    /// Removes any existing device with `name`, appends a new device with
    /// `envs`, then rewrites the spec file. Idempotent: a repeat call with
    /// the same name replaces rather than duplicates.
    pub fn add_device(&self, name: &str, envs: Vec<String>) -> Result<(), CdiError> {
        let _guard = self.write_lock.lock();
        let mut spec = self.get_spec()?;
        spec.devices.retain(|d| d.name != name);
        spec.devices.push(CdiDevice {
            name: name.to_string(),
            container_edits: ContainerEdits { env: envs },
        });
        self.write_spec(&spec)
    }

    /// Removes any device named `name`. Succeeds if the file is missing.
    /// Only rewrites the file if a removal actually occurred.
    pub fn remove_device(&self, name: &str) -> Result<(), CdiError> {
        let _guard = self.write_lock.lock();
        let path = self.path();
        if !path.exists() {
            return Ok(());
        }
        let mut spec = self.get_spec()?;
        let before = spec.devices.len();
        spec.devices.retain(|d| d.name != name);
        if spec.devices.len() == before {
            return Ok(());
        }
        self.write_spec(&spec)
    }

    fn write_spec(&self, spec: &CdiSpec) -> Result<(), CdiError> {
        fs::create_dir_all(&self.spec_dir)
            .map_err(|source| CdiError::Io { path: self.spec_dir.clone(), source })?;
        let mut perms = fs::metadata(&self.spec_dir)
            .map_err(|source| CdiError::Io { path: self.spec_dir.clone(), source })?
            .permissions();
        perms.set_mode(0o755);
        let _ = fs::set_permissions(&self.spec_dir, perms);

        let final_path = self.path();
        let tmp_path = self.spec_dir.join(format!(".{}.json.tmp", self.driver_name));
        let body = serde_json::to_string_pretty(spec)?;

        let file = File::create(&tmp_path)
            .map_err(|source| CdiError::Io { path: tmp_path.clone(), source })?;
        {
            use std::io::Write;
            let mut writer = io::BufWriter::new(&file);
            writer
                .write_all(body.as_bytes())
                .map_err(|source| CdiError::Io { path: tmp_path.clone(), source })?;
            writer.flush().map_err(|source| CdiError::Io { path: tmp_path.clone(), source })?;
        }
        file.sync_all().map_err(|source| CdiError::Io { path: tmp_path.clone(), source })?;
        fs::rename(&tmp_path, &final_path)
            .map_err(|source| CdiError::Io { path: final_path, source })?;
        log::debug!("cdi: wrote spec with {} device(s)", spec.devices.len());
        Ok(())
    }
}
