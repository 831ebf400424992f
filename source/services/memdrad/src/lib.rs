//! Node-local driver wiring: configuration, a preflight compatibility
//! check, a small task supervisor, and the orchestration object that owns
//! the Discoverer/Tracker/Binder/CDI components and drives them through the
//! DRA and NRI plugin surfaces.

#![forbid(unsafe_code)]

pub mod config;
pub mod driver;
pub mod preflight;
pub mod supervisor;

pub use config::{ConfigError, DriverConfig};
pub use driver::{Driver, DraRegistrar, NriConnectionError, NriConnector, StartupError};
pub use preflight::PreflightError;
pub use supervisor::{CancellationToken, SupervisorError};
