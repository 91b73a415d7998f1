use crate::catalog::Catalog;
use crate::config::Config;
use crate::detect;
use crate::error::{PyvmError, Result};
use crate::extract::extract_archive;
use crate::fetch::{runtime_executable, Fetcher};
use crate::models::{
    InstallResult, InstallSource, Installation, ProgressFn, RemoveResult,
};
use crate::platform::{DownloadSource, HostPlatform};
use crate::registry::Registry;
use crate::version::VersionId;
use std::path::PathBuf;
use tracing::{info, warn};

/// Orchestrates catalog resolution, download, safe extraction,
/// verification and registry bookkeeping.
///
/// Stages run strictly in order; nothing is registered until the
/// extracted tree has been verified.
pub struct InstallationManager {
    config: Config,
    catalog: Catalog,
    registry: Registry,
    fetcher: Fetcher,
}

impl InstallationManager {
    pub fn new(config: Config, registry: Registry) -> Self {
        Self::with_catalog(config, registry, Catalog::bundled())
    }

    pub fn with_catalog(config: Config, registry: Registry, catalog: Catalog) -> Self {
        let fetcher = Fetcher::new(
            config.cache_dir.clone(),
            config.download_timeout_secs,
            config.mirror_url.clone(),
        );
        Self {
            config,
            catalog,
            registry,
            fetcher,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Resolve a spec and install that version.
    ///
    /// Installing an already-installed version is a no-op success that
    /// never touches the network. The very first installation into an
    /// empty registry is promoted to active.
    pub async fn install(
        &mut self,
        spec: &str,
        on_progress: Option<&mut ProgressFn<'_>>,
    ) -> InstallResult {
        let version = match self.catalog.find_best_match(spec) {
            Some(version) => version,
            None => {
                return InstallResult::fail(format!("No installable version matches '{}'", spec))
            }
        };
        let version_text = version.to_string();

        if let Some(existing) = self.registry.get_installation(&version_text) {
            return InstallResult::ok(
                format!("Python {} is already installed", version_text),
                existing,
            );
        }

        let platform = match HostPlatform::current() {
            Ok(platform) => platform,
            Err(e) => return InstallResult::fail(e.to_string()),
        };

        let source = match DownloadSource::by_name(&self.config.default_source) {
            Some(source) => source,
            None => {
                return InstallResult::fail(format!(
                    "Unknown download source '{}'",
                    self.config.default_source
                ))
            }
        };

        let download = self
            .fetcher
            .fetch(&version, source, platform, on_progress)
            .await;
        if !download.success {
            return InstallResult::fail(download.message);
        }
        let archive = match download.archive_path {
            Some(archive) => archive,
            None => return InstallResult::fail("Download produced no archive".to_string()),
        };

        let dest_dir = self.config.version_dir(&version_text);
        if let Err(e) = extract_archive(&archive, &dest_dir) {
            let _ = std::fs::remove_dir_all(&dest_dir);
            // An archive that fails to extract is poisoned; evict it so a
            // retry downloads a fresh copy instead of replaying the failure.
            let _ = std::fs::remove_file(&archive);
            return InstallResult::fail(format!("Extraction failed: {}", e));
        }
        self.discard_uncached(&archive);

        if self.config.verify_installs && !Fetcher::verify_installation(&dest_dir).await {
            let _ = std::fs::remove_dir_all(&dest_dir);
            return InstallResult::fail(
                PyvmError::VerificationFailed(format!(
                    "{} does not behave like a Python runtime",
                    dest_dir.display()
                ))
                .to_string(),
            );
        }

        let first_install = self.registry.is_empty();
        let installation = Installation::new(version, dest_dir, InstallSource::PrebuiltArchive);
        if let Err(e) = self.registry.register_installation(installation.clone()) {
            return InstallResult::fail(format!("Failed to record installation: {}", e));
        }

        if first_install {
            match self.registry.set_active(&version_text) {
                Ok(_) => info!(version = %version_text, "first installation promoted to active"),
                Err(e) => warn!(error = %e, "failed to promote first installation"),
            }
        }

        let installation = self
            .registry
            .get_installation(&version_text)
            .unwrap_or(installation);
        InstallResult::ok(format!("Installed Python {}", version_text), installation)
    }

    /// Remove an installed version.
    ///
    /// Removing the active version requires `force`; the active pointer
    /// is then cleared, never reassigned.
    pub fn remove(&mut self, spec: &str, force: bool) -> RemoveResult {
        let installation = match self.registry.get_installation(spec) {
            Some(installation) => installation,
            None => {
                return RemoveResult::fail(format!("No installed version matches '{}'", spec))
            }
        };
        let version_text = installation.version.to_string();

        let is_active = self
            .registry
            .get_active()
            .map(|active| active.version == installation.version)
            .unwrap_or(false);
        if is_active && !force {
            return RemoveResult::fail(
                PyvmError::ActiveVersionConflict(version_text.clone()).to_string(),
            );
        }

        // Only delete trees this tool created. System-detected entries
        // point at directories we do not own.
        if installation.source == InstallSource::PrebuiltArchive && installation.path.exists() {
            if let Err(e) = std::fs::remove_dir_all(&installation.path) {
                return RemoveResult::fail(format!(
                    "Failed to delete {}: {}",
                    installation.path.display(),
                    e
                ));
            }
        }

        match self.registry.unregister_installation(&version_text) {
            Ok(_) => RemoveResult::ok(format!("Removed Python {}", version_text)),
            Err(e) => RemoveResult::fail(format!("Failed to update registry: {}", e)),
        }
    }

    /// Make an already-installed version the active one
    pub fn use_version(&mut self, spec: &str) -> bool {
        let installation = match self.registry.get_installation(spec) {
            Some(installation) => installation,
            None => return false,
        };
        self.registry
            .set_active(&installation.version.to_string())
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to persist active version");
                false
            })
    }

    /// Executable path of the active installation
    pub fn which(&self) -> Option<PathBuf> {
        let active = self.registry.get_active()?;
        runtime_executable(&active.path)
    }

    /// Executable path for a spec, installing it first when necessary
    pub async fn ensure_version(
        &mut self,
        spec: &str,
        on_progress: Option<&mut ProgressFn<'_>>,
    ) -> Option<PathBuf> {
        if let Some(existing) = self.registry.get_installation(spec) {
            return runtime_executable(&existing.path);
        }

        let result = self.install(spec, on_progress).await;
        if !result.success {
            warn!(spec, message = %result.message, "ensure_version install failed");
            return None;
        }
        result
            .installation
            .and_then(|installation| runtime_executable(&installation.path))
    }

    pub fn list_installed(&self) -> Vec<Installation> {
        self.registry.get_installed_versions()
    }

    pub fn list_available(&self, include_prerelease: bool) -> Vec<VersionId> {
        self.catalog.list_available(include_prerelease)
    }

    pub fn get_active(&self) -> Option<Installation> {
        self.registry.get_active()
    }

    /// Best-effort scan for interpreters installed outside this tool
    pub fn detect_system_installations(&self) -> Vec<Installation> {
        detect::detect_system_pythons()
    }

    /// Drop cached archives older than the configured retention
    pub fn cleanup_cache(&self) -> Result<usize> {
        self.fetcher.cleanup_cache(self.config.cache_retention_days)
    }

    fn discard_uncached(&self, archive: &std::path::Path) {
        if !self.config.cache_downloads {
            let _ = std::fs::remove_file(archive);
        }
    }
}
