use thiserror::Error;

#[derive(Error, Debug)]
pub enum PyvmError {
    #[error("Invalid version format: {0}")]
    InvalidVersion(String),

    #[error("Unsupported platform: {os} {arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Failed to download from {url}: {source}")]
    DownloadFailed {
        url: String,
        source: reqwest::Error,
    },

    #[error("Failed to extract archive: {0}")]
    ExtractionFailed(String),

    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    #[error("Registry error: {0}")]
    RegistryError(String),

    #[error("Version {0} is the active version; pass force to remove it")]
    ActiveVersionConflict(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    RequestError(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, PyvmError>;
