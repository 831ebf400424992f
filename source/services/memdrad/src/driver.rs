//! The orchestration object: owns every long-lived component and implements
//! the startup/shutdown sequence — preflight, component construction, DRA
//! registration, the supervised NRI connection, and resource publication.

use std::time::Duration;

use cdi::CdiManager;
use discovery::{Discoverer, DiscoveryError};
use dra_plugin::{DraPlugin, ResourcePublisher};
use hugetlb::{CgroupIo, Limit};
use nri_plugin::NriPlugin;
use thiserror::Error;
use tracker::{Binder, Tracker};

use crate::config::DriverConfig;
use crate::preflight::{self, PreflightError};
use crate::supervisor::{self, CancellationToken, SupervisorError};

const DRA_REGISTRATION_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DRA_REGISTRATION_TIMEOUT: Duration = Duration::from_secs(30);
const NRI_MAX_RESTART_ATTEMPTS: u32 = 5;
const NRI_RESTART_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Preflight(#[from] PreflightError),
    #[error("could not read host NUMA/HugeTLB topology: {0}")]
    Discovery(#[from] DiscoveryError),
    #[error("DRA plugin registration did not complete: {0}")]
    DraRegistration(SupervisorError),
    #[error("NRI connection failed: {0}")]
    Nri(SupervisorError),
}

#[derive(Debug, Error)]
#[error("NRI connection dropped: {0}")]
pub struct NriConnectionError(pub String);

/// Registers this driver with the kubelet plugin registry. The registration
/// wire transport (a gRPC call over a well-known unix socket) is out of
/// scope; a deployment wires in a real implementation here.
pub trait DraRegistrar {
    fn try_register(&self, node_name: &str, driver_name: &str) -> bool;
}

/// Runs the NRI event loop against the container runtime's socket, calling
/// into `plugin` for each lifecycle event, until `token` is cancelled or the
/// connection drops. The NRI wire transport is out of scope; a deployment
/// wires in a real implementation here.
pub trait NriConnector: Send + Sync {
    fn run(&self, plugin: &NriPlugin<'_>, token: &CancellationToken) -> Result<(), NriConnectionError>;
}

/// Owns the Discoverer, Tracker, Binder and CDI spec manager, and drives
/// them through the DRA and NRI plugin surfaces.
pub struct Driver {
    config: DriverConfig,
    discoverer: Discoverer,
    tracker: Tracker,
    binder: Binder,
    cdi: CdiManager,
    cgroup_io: Box<dyn CgroupIo>,
    root_limits: Vec<Limit>,
    dra_registrar: Box<dyn DraRegistrar>,
    nri_connector: Box<dyn NriConnector>,
    resource_publisher: Box<dyn ResourcePublisher>,
    token: CancellationToken,
}

impl Driver {
    pub fn new(
        config: DriverConfig,
        cgroup_io: Box<dyn CgroupIo>,
        dra_registrar: Box<dyn DraRegistrar>,
        nri_connector: Box<dyn NriConnector>,
        resource_publisher: Box<dyn ResourcePublisher>,
    ) -> Self {
        let discoverer = Discoverer::new(&config.sysfs_root);
        let cdi = CdiManager::new(&config.cdi_spec_dir, &config.driver_name, &config.vendor_class);
        Self {
            config,
            discoverer,
            tracker: Tracker::new(),
            binder: Binder::new(),
            cdi,
            cgroup_io,
            root_limits: Vec::new(),
            dra_registrar,
            nri_connector,
            resource_publisher,
            token: CancellationToken::new(),
        }
    }

    /// A handle callers can use to request shutdown from elsewhere (e.g. a
    /// signal handler running alongside [`Driver::run`]).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn request_shutdown(&self) {
        self.token.cancel();
    }

    /// Runs startup to completion. The supervised NRI connector is started
    /// before resources are published, so a scheduled container-create can
    /// never race ahead of a listening connector; `run` then blocks until
    /// that connector is cancelled or exhausts its restart attempts.
    pub async fn run(&mut self) -> Result<(), StartupError> {
        preflight::check_mountinfo(&self.config.procfs_root)?;

        self.discoverer.refresh()?;
        self.refresh_root_limits();

        self.register_with_kubelet().await?;

        let nri_plugin = NriPlugin::new(
            &self.tracker,
            &self.binder,
            &self.discoverer,
            self.cgroup_io.as_ref(),
            self.config.cgroup_mount.clone(),
            self.root_limits.clone(),
        );
        let connector = self.nri_connector.as_ref();
        let token = &self.token;
        let node_name = &self.config.node_name;

        log::info!("memdrad: starting supervised NRI connector (node={node_name})");

        tokio::task::block_in_place(|| {
            std::thread::scope(|scope| {
                let nri_handle = scope.spawn(|| {
                    supervisor::run_supervised_blocking(NRI_MAX_RESTART_ATTEMPTS, NRI_RESTART_BACKOFF, token, || {
                        connector.run(&nri_plugin, token).map_err(|err| err.0)
                    })
                });

                self.publish_resources();
                log::info!("memdrad: ready (node={node_name})");

                nri_handle.join().expect("NRI connector thread panicked")
            })
        })
        .map_err(StartupError::Nri)
    }

    async fn register_with_kubelet(&self) -> Result<(), StartupError> {
        log::info!("memdrad: polling for DRA plugin registration (node={})", self.config.node_name);
        let registrar = self.dra_registrar.as_ref();
        let node_name = &self.config.node_name;
        let driver_name = &self.config.driver_name;
        supervisor::poll_until_ready(
            || registrar.try_register(node_name, driver_name),
            DRA_REGISTRATION_POLL_INTERVAL,
            DRA_REGISTRATION_TIMEOUT,
            &self.token,
        )
        .await
        .map_err(StartupError::DraRegistration)?;
        log::info!("memdrad: DRA plugin registered");
        Ok(())
    }

    fn publish_resources(&self) {
        let plugin = DraPlugin::new(
            &self.discoverer,
            &self.tracker,
            &self.cdi,
            self.config.driver_name.clone(),
            self.config.vendor_class.clone(),
        );
        plugin.publish_resources(&self.config.node_name, self.resource_publisher.as_ref());
    }

    fn refresh_root_limits(&mut self) {
        let machine = self.discoverer.machine_data();
        self.root_limits =
            hugetlb::limits_from_system_path(self.cgroup_io.as_ref(), &machine, &self.config.cgroup_mount);
    }
}
