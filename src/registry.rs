use crate::error::{PyvmError, Result};
use crate::models::{InstallStatus, Installation};
use crate::version::VersionId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use tracing::warn;

pub const REGISTRY_SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    REGISTRY_SCHEMA_VERSION
}

/// On-disk shape of the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryFile {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub active: Option<String>,
    #[serde(default)]
    pub installations: HashMap<String, Installation>,
}

impl Default for RegistryFile {
    fn default() -> Self {
        Self {
            schema_version: REGISTRY_SCHEMA_VERSION,
            active: None,
            installations: HashMap::new(),
        }
    }
}

/// Durable backing store for registry state.
///
/// The seam where a future port can add file locking or a
/// compare-and-swap write without changing registry call sites.
pub trait StateStore: Send + Sync {
    fn load(&self) -> Result<Option<RegistryFile>>;
    fn persist(&self, state: &RegistryFile) -> Result<()>;
}

/// JSON file store with write-to-temp-then-rename persistence
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl StateStore for FileStore {
    fn load(&self) -> Result<Option<RegistryFile>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(None);
        }
        let state: RegistryFile = serde_json::from_str(&contents)?;
        Ok(Some(state))
    }

    fn persist(&self, state: &RegistryFile) -> Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| PyvmError::RegistryError("registry path has no parent".to_string()))?;
        std::fs::create_dir_all(parent)?;

        // A crash mid-write must leave the previous file intact.
        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        let contents = serde_json::to_string_pretty(state)?;
        temp.write_all(contents.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| PyvmError::IoError(e.error))?;
        Ok(())
    }
}

/// Durable record of installed versions and the active one
pub struct Registry {
    store: Box<dyn StateStore>,
    active: Option<VersionId>,
    installations: HashMap<String, Installation>,
}

impl Registry {
    /// Load registry state from the store. Unreadable state is logged
    /// and replaced with an empty registry rather than refusing to run.
    pub fn open(store: Box<dyn StateStore>) -> Self {
        let state = match store.load() {
            Ok(Some(state)) => state,
            Ok(None) => RegistryFile::default(),
            Err(e) => {
                warn!(error = %e, "registry state unreadable, starting from an empty registry");
                RegistryFile::default()
            }
        };

        let installations = state.installations;
        let active = state.active.and_then(|text| match text.parse::<VersionId>() {
            Ok(version) if installations.contains_key(&text) => Some(version),
            Ok(_) => {
                warn!(version = %text, "active version is not installed, clearing pointer");
                None
            }
            Err(_) => {
                warn!(version = %text, "active version text is malformed, clearing pointer");
                None
            }
        });

        Self {
            store,
            active,
            installations,
        }
    }

    /// Registry backed by a JSON file
    pub fn open_file(path: PathBuf) -> Self {
        Self::open(Box::new(FileStore::new(path)))
    }

    pub fn is_empty(&self) -> bool {
        self.installations.is_empty()
    }

    /// Snapshot of all installations, newest version first
    pub fn get_installed_versions(&self) -> Vec<Installation> {
        let mut installed: Vec<Installation> = self.installations.values().cloned().collect();
        installed.sort_by(|a, b| b.version.cmp(&a.version));
        installed
    }

    /// Exact canonical-text lookup first, then a starts-with prefix match
    /// over installed keys in descending version order.
    pub fn get_installation(&self, spec: &str) -> Option<Installation> {
        if let Some(installation) = self.installations.get(spec) {
            return Some(installation.clone());
        }

        self.get_installed_versions()
            .into_iter()
            .find(|installation| installation.version.to_string().starts_with(spec))
    }

    pub fn get_active(&self) -> Option<Installation> {
        let active = self.active.as_ref()?;
        self.installations.get(&active.to_string()).cloned()
    }

    pub fn register_installation(&mut self, installation: Installation) -> Result<()> {
        let key = installation.version.to_string();
        self.installations.insert(key, installation);
        self.persist()
    }

    pub fn unregister_installation(&mut self, version_text: &str) -> Result<bool> {
        if self.installations.remove(version_text).is_none() {
            return Ok(false);
        }

        if self.active.as_ref().map(|v| v.to_string()).as_deref() == Some(version_text) {
            self.active = None;
        }

        self.persist()?;
        Ok(true)
    }

    /// Mark an installed version as active. Returns false when the
    /// version is not installed.
    pub fn set_active(&mut self, version_text: &str) -> Result<bool> {
        let new_version = match self.installations.get(version_text) {
            Some(installation) => installation.version.clone(),
            None => return Ok(false),
        };

        if let Some(previous) = self.active.take() {
            if let Some(entry) = self.installations.get_mut(&previous.to_string()) {
                entry.status = InstallStatus::Installed;
            }
        }

        if let Some(entry) = self.installations.get_mut(version_text) {
            entry.status = InstallStatus::Active;
        }
        self.active = Some(new_version);

        self.persist()?;
        Ok(true)
    }

    /// Drop the active pointer without selecting a replacement
    pub fn clear_active(&mut self) -> Result<()> {
        if let Some(previous) = self.active.take() {
            if let Some(entry) = self.installations.get_mut(&previous.to_string()) {
                entry.status = InstallStatus::Installed;
            }
            self.persist()?;
        }
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        let state = RegistryFile {
            schema_version: REGISTRY_SCHEMA_VERSION,
            active: self.active.as_ref().map(|v| v.to_string()),
            installations: self.installations.clone(),
        };
        self.store.persist(&state)
    }
}
