use crate::version::VersionId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where an installation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallSource {
    /// Downloaded and unpacked by this tool
    PrebuiltArchive,
    /// Found on the host, not managed by this tool
    SystemDetected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStatus {
    Installed,
    Active,
}

/// A runtime installation tracked by the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Installation {
    pub version: VersionId,
    pub path: PathBuf,
    pub status: InstallStatus,
    pub installed_at: chrono::DateTime<chrono::Utc>,
    pub source: InstallSource,
}

impl Installation {
    pub fn new(version: VersionId, path: PathBuf, source: InstallSource) -> Self {
        Self {
            version,
            path,
            status: InstallStatus::Installed,
            installed_at: chrono::Utc::now(),
            source,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == InstallStatus::Active
    }
}

/// Transient download progress, reported after every chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub total_bytes: u64,
    pub downloaded_bytes: u64,
}

impl DownloadProgress {
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.downloaded_bytes as f64 / self.total_bytes as f64) * 100.0
    }

    pub fn is_complete(&self) -> bool {
        self.total_bytes > 0 && self.downloaded_bytes >= self.total_bytes
    }
}

/// Progress callback invoked synchronously on the downloading thread
pub type ProgressFn<'a> = dyn FnMut(DownloadProgress) + 'a;

/// Outcome of an install operation
#[derive(Debug, Clone)]
pub struct InstallResult {
    pub success: bool,
    pub message: String,
    pub installation: Option<Installation>,
}

impl InstallResult {
    pub fn ok<M: Into<String>>(message: M, installation: Installation) -> Self {
        Self {
            success: true,
            message: message.into(),
            installation: Some(installation),
        }
    }

    pub fn fail<M: Into<String>>(message: M) -> Self {
        Self {
            success: false,
            message: message.into(),
            installation: None,
        }
    }
}

/// Outcome of a remove operation
#[derive(Debug, Clone)]
pub struct RemoveResult {
    pub success: bool,
    pub message: String,
}

impl RemoveResult {
    pub fn ok<M: Into<String>>(message: M) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn fail<M: Into<String>>(message: M) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Outcome of an archive fetch
#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub success: bool,
    pub message: String,
    pub archive_path: Option<PathBuf>,
}

impl DownloadResult {
    pub fn ok<M: Into<String>>(message: M, archive_path: PathBuf) -> Self {
        Self {
            success: true,
            message: message.into(),
            archive_path: Some(archive_path),
        }
    }

    pub fn fail<M: Into<String>>(message: M) -> Self {
        Self {
            success: false,
            message: message.into(),
            archive_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percent() {
        let progress = DownloadProgress {
            total_bytes: 200,
            downloaded_bytes: 50,
        };
        assert_eq!(progress.percent(), 25.0);
        assert!(!progress.is_complete());

        let done = DownloadProgress {
            total_bytes: 200,
            downloaded_bytes: 200,
        };
        assert!(done.is_complete());
    }

    #[test]
    fn test_progress_unknown_total() {
        let progress = DownloadProgress {
            total_bytes: 0,
            downloaded_bytes: 1024,
        };
        assert_eq!(progress.percent(), 0.0);
        assert!(!progress.is_complete());
    }
}
