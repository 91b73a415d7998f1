//! Python runtime version management: catalog resolution, cached
//! downloads, safe archive extraction, and a durable registry of
//! installed versions with one active default.
//!
//! The surrounding CLI/service layer drives everything through
//! [`InstallationManager`]; all public operations return result carriers
//! instead of raising errors across the boundary.

pub mod catalog;
pub mod config;
pub mod detect;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod manager;
pub mod models;
pub mod platform;
pub mod registry;
pub mod version;

pub use catalog::Catalog;
pub use config::Config;
pub use error::{PyvmError, Result};
pub use fetch::Fetcher;
pub use manager::InstallationManager;
pub use models::{
    DownloadProgress, DownloadResult, InstallResult, InstallSource, InstallStatus, Installation,
    ProgressFn, RemoveResult,
};
pub use platform::{CpuArch, DownloadSource, HostPlatform, OsFamily};
pub use registry::{FileStore, Registry, RegistryFile, StateStore};
pub use version::VersionId;
