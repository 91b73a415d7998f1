use crate::error::{PyvmError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip)]
    pub pyvm_dir: PathBuf,

    #[serde(skip)]
    pub versions_dir: PathBuf,

    #[serde(skip)]
    pub cache_dir: PathBuf,

    #[serde(skip)]
    pub registry_file: PathBuf,

    #[serde(skip)]
    pub config_file: PathBuf,

    /// Default upstream source ("standalone" or "python-org")
    pub default_source: String,

    /// Keep downloaded archives in the cache directory
    pub cache_downloads: bool,

    /// Auto-cleanup old cache files (days)
    pub cache_retention_days: u32,

    /// Run the extracted interpreter before registering an install
    pub verify_installs: bool,

    /// Read timeout for download streams, in seconds
    pub download_timeout_secs: u64,

    /// Optional mirror host that replaces the upstream release host
    pub mirror_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let pyvm_dir = Self::default_pyvm_dir();

        Self {
            versions_dir: pyvm_dir.join("versions"),
            cache_dir: pyvm_dir.join("cache"),
            registry_file: pyvm_dir.join("registry.json"),
            config_file: pyvm_dir.join("config.toml"),
            pyvm_dir,
            default_source: "standalone".to_string(),
            cache_downloads: true,
            cache_retention_days: 30,
            verify_installs: true,
            download_timeout_secs: 30,
            mirror_url: None,
        }
    }
}

impl Config {
    fn default_pyvm_dir() -> PathBuf {
        // First check PYVM_DIR environment variable
        if let Ok(dir) = std::env::var("PYVM_DIR") {
            return PathBuf::from(shellexpand::tilde(&dir).to_string());
        }

        // Then use platform-specific directory
        if let Some(proj_dirs) = ProjectDirs::from("", "", "pyvm") {
            return proj_dirs.data_dir().to_path_buf();
        }

        // Fallback to ~/.pyvm
        PathBuf::from(shellexpand::tilde("~/.pyvm").to_string())
    }

    /// Config rooted at an explicit directory, directories created eagerly
    pub fn with_root(root: PathBuf) -> Result<Self> {
        let mut config = Self::default();
        config.versions_dir = root.join("versions");
        config.cache_dir = root.join("cache");
        config.registry_file = root.join("registry.json");
        config.config_file = root.join("config.toml");
        config.pyvm_dir = root;
        config.ensure_dirs()?;
        Ok(config)
    }

    pub fn load() -> Result<Self> {
        let mut config = Self::default();
        config.ensure_dirs()?;

        // Load config file if it exists
        if config.config_file.exists() {
            let contents = std::fs::read_to_string(&config.config_file)?;
            let file_config: Config = toml::from_str(&contents)?;

            config.default_source = file_config.default_source;
            config.cache_downloads = file_config.cache_downloads;
            config.cache_retention_days = file_config.cache_retention_days;
            config.verify_installs = file_config.verify_installs;
            config.download_timeout_secs = file_config.download_timeout_secs;
            config.mirror_url = file_config.mirror_url;
        } else {
            // Create default config file
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| PyvmError::ConfigError(e.to_string()))?;

        std::fs::write(&self.config_file, contents)?;
        Ok(())
    }

    fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.pyvm_dir)?;
        std::fs::create_dir_all(&self.versions_dir)?;
        std::fs::create_dir_all(&self.cache_dir)?;
        Ok(())
    }

    pub fn version_dir(&self, version_text: &str) -> PathBuf {
        self.versions_dir.join(version_text)
    }
}
