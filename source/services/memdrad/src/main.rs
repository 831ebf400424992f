//! Daemon entry point: initialises logging, loads configuration from the
//! environment, and runs the driver until a shutdown signal arrives.

use discovery::Slice;
use dra_plugin::{PublishError, ResourcePublisher};
use hugetlb::StdCgroupIo;
use memdrad::{CancellationToken, Driver, DraRegistrar, DriverConfig, NriConnectionError, NriConnector};
use nri_plugin::NriPlugin;

/// The kubelet plugin registration handshake is a gRPC call over a
/// well-known unix socket; that wire transport is out of scope here, so
/// this stands in for it until a deployment wires in a real one.
struct UnconfiguredRegistrar;

impl DraRegistrar for UnconfiguredRegistrar {
    fn try_register(&self, node_name: &str, driver_name: &str) -> bool {
        log::error!(
            "memdrad: no DRA plugin registration transport configured (node={node_name:?}, driver={driver_name:?})"
        );
        false
    }
}

/// As [`UnconfiguredRegistrar`], for the NRI socket transport.
struct UnconfiguredNriConnector;

impl NriConnector for UnconfiguredNriConnector {
    fn run(&self, _plugin: &NriPlugin<'_>, _token: &CancellationToken) -> Result<(), NriConnectionError> {
        Err(NriConnectionError("no NRI socket transport configured".to_string()))
    }
}

struct LoggingPublisher;

impl ResourcePublisher for LoggingPublisher {
    fn publish(&self, pool_name: &str, slices: &[Slice]) -> Result<(), PublishError> {
        log::info!("memdrad: {} resource slice(s) ready for pool {pool_name:?}", slices.len());
        Ok(())
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    env_logger::init();

    let config = match DriverConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("memdrad: configuration error: {err}");
            std::process::exit(1);
        }
    };

    let mut driver = Driver::new(
        config,
        Box::new(StdCgroupIo),
        Box::new(UnconfiguredRegistrar),
        Box::new(UnconfiguredNriConnector),
        Box::new(LoggingPublisher),
    );

    let shutdown_token = driver.cancellation_token();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        log::info!("memdrad: shutdown signal received");
        shutdown_token.cancel();
    });

    if let Err(err) = driver.run().await {
        log::error!("memdrad: fatal startup error: {err}");
        std::process::exit(1);
    }
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {},
            _ = sigterm.recv() => {},
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
