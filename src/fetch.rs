use crate::error::{PyvmError, Result};
use crate::models::{DownloadProgress, DownloadResult, ProgressFn};
use crate::platform::{DownloadSource, HostPlatform};
use crate::version::VersionId;
use futures_util::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Resolves download URLs, streams archives to a local cache, and probes
/// extracted trees for a working interpreter.
pub struct Fetcher {
    client: Client,
    cache_dir: PathBuf,
    mirror_url: Option<String>,
}

impl Fetcher {
    pub fn new(cache_dir: PathBuf, timeout_secs: u64, mirror_url: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .user_agent(concat!(
                    env!("CARGO_PKG_NAME"),
                    "/",
                    env!("CARGO_PKG_VERSION")
                ))
                .connect_timeout(Duration::from_secs(timeout_secs))
                .read_timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap(),
            cache_dir,
            mirror_url,
        }
    }

    /// Stable 16-hex-char fingerprint of a resolved URL
    pub fn cache_fingerprint(url: &str) -> String {
        let digest = Sha256::digest(url.as_bytes());
        digest[..8].iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Cache file location for a resolved URL
    pub fn cache_path(&self, url: &str) -> PathBuf {
        let file_name = url.rsplit('/').next().unwrap_or("runtime-archive");
        self.cache_dir
            .join(format!("{}_{}", Self::cache_fingerprint(url), file_name))
    }

    /// Resolve the archive URL for a version and download it into the
    /// cache, reporting progress after every chunk. A cache hit skips the
    /// network entirely.
    pub async fn fetch(
        &self,
        version: &VersionId,
        source: DownloadSource,
        platform: HostPlatform,
        on_progress: Option<&mut ProgressFn<'_>>,
    ) -> DownloadResult {
        let url = match source.archive_url(version, platform) {
            Some(url) => self.apply_mirror(&url),
            None => {
                return DownloadResult::fail(format!(
                    "Source {} publishes no archive for Python {} on {}",
                    source, version, platform
                ))
            }
        };

        let cache_path = self.cache_path(&url);
        if cache_path.exists() {
            debug!(archive = %cache_path.display(), "archive cache hit");
            return DownloadResult::ok("Using cached archive", cache_path);
        }

        match self.download_to_cache(&url, &cache_path, on_progress).await {
            Ok(()) => DownloadResult::ok(format!("Downloaded {}", url), cache_path),
            Err(PyvmError::DownloadFailed { url, source }) => {
                let reason = if let Some(status) = source.status() {
                    format!(
                        "HTTP {} {}",
                        status.as_u16(),
                        status.canonical_reason().unwrap_or("error")
                    )
                } else if source.is_timeout() {
                    "network timeout".to_string()
                } else if source.is_connect() {
                    "connection failed".to_string()
                } else {
                    source.to_string()
                };
                DownloadResult::fail(format!("Download of {} failed: {}", url, reason))
            }
            Err(e) => DownloadResult::fail(format!("Download of {} failed: {}", url, e)),
        }
    }

    /// Rewrite a canonical URL to point at a configured mirror
    fn apply_mirror(&self, url: &str) -> String {
        match &self.mirror_url {
            Some(mirror) => {
                let file_name = url.rsplit('/').next().unwrap_or("runtime-archive");
                format!("{}/{}", mirror.trim_end_matches('/'), file_name)
            }
            None => url.to_string(),
        }
    }

    async fn download_to_cache(
        &self,
        url: &str,
        cache_path: &Path,
        mut on_progress: Option<&mut ProgressFn<'_>>,
    ) -> Result<()> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PyvmError::DownloadFailed {
                url: url.to_string(),
                source: e,
            })?;

        let response = response
            .error_for_status()
            .map_err(|e| PyvmError::DownloadFailed {
                url: url.to_string(),
                source: e,
            })?;

        let total_bytes = response.content_length().unwrap_or(0);

        std::fs::create_dir_all(&self.cache_dir)?;
        // Private temp file in the cache directory; the final rename keeps
        // concurrent readers from ever observing a partial archive.
        let mut temp = tempfile::NamedTempFile::new_in(&self.cache_dir)?;

        let mut downloaded_bytes: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| PyvmError::DownloadFailed {
                url: url.to_string(),
                source: e,
            })?;
            temp.write_all(&chunk)?;
            downloaded_bytes += chunk.len() as u64;
            if let Some(callback) = on_progress.as_mut() {
                callback(DownloadProgress {
                    total_bytes,
                    downloaded_bytes,
                });
            }
        }

        temp.as_file().sync_all()?;
        temp.persist(cache_path)
            .map_err(|e| PyvmError::IoError(e.error))?;

        info!(url, bytes = downloaded_bytes, "archive downloaded");
        Ok(())
    }

    /// Probe an extracted tree for a working interpreter by running a
    /// trivial version query under a short timeout.
    pub async fn verify_installation(install_dir: &Path) -> bool {
        let executable = match runtime_executable(install_dir) {
            Some(executable) => executable,
            None => return false,
        };

        let probe = tokio::time::timeout(
            Duration::from_secs(5),
            tokio::process::Command::new(&executable)
                .arg("--version")
                .output(),
        )
        .await;

        matches!(probe, Ok(Ok(output)) if output.status.success())
    }

    /// Delete cached archives older than the threshold
    pub fn cleanup_cache(&self, max_age_days: u32) -> Result<usize> {
        if !self.cache_dir.exists() {
            return Ok(0);
        }

        let max_age = Duration::from_secs(u64::from(max_age_days) * 24 * 60 * 60);
        let cutoff = std::time::SystemTime::now() - max_age;
        let mut removed = 0;

        for entry in std::fs::read_dir(&self.cache_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(_) => continue,
            };

            if modified < cutoff {
                match std::fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(file = %path.display(), error = %e, "failed to remove cached archive"),
                }
            }
        }

        Ok(removed)
    }
}

/// Locate the interpreter executable inside an install tree.
///
/// Handles both flat layouts (`bin/python3`) and archives that unpack
/// into a single top-level directory (`python/bin/python3`), with a
/// shallow walk as a last resort.
pub fn runtime_executable(install_dir: &Path) -> Option<PathBuf> {
    let names: &[&str] = if cfg!(windows) {
        &["python.exe", "python3.exe"]
    } else {
        &["python3", "python"]
    };

    let roots = [install_dir.to_path_buf(), install_dir.join("python")];
    for root in &roots {
        for name in names {
            for candidate in [root.join("bin").join(name), root.join(name)] {
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
    }

    walkdir::WalkDir::new(install_dir)
        .max_depth(3)
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| {
            e.file_type().is_file()
                && e.file_name()
                    .to_str()
                    .map(|n| names.contains(&n))
                    .unwrap_or(false)
        })
        .map(|e| e.into_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cache_fingerprint_is_stable() {
        let a = Fetcher::cache_fingerprint("https://example.com/python.tar.gz");
        let b = Fetcher::cache_fingerprint("https://example.com/python.tar.gz");
        let c = Fetcher::cache_fingerprint("https://example.com/other.tar.gz");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn test_cache_path_keeps_original_file_name() {
        let temp = TempDir::new().unwrap();
        let fetcher = Fetcher::new(temp.path().to_path_buf(), 30, None);

        let path = fetcher.cache_path("https://example.com/downloads/cpython-3.12.7.tar.gz");
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.ends_with("_cpython-3.12.7.tar.gz"));
        assert_eq!(name.split('_').next().unwrap().len(), 16);
    }

    #[test]
    fn test_mirror_rewrite() {
        let temp = TempDir::new().unwrap();
        let fetcher = Fetcher::new(
            temp.path().to_path_buf(),
            30,
            Some("http://mirror.internal/pyvm/".to_string()),
        );

        let url = fetcher.apply_mirror("https://github.com/x/y/releases/download/t/archive.tar.gz");
        assert_eq!(url, "http://mirror.internal/pyvm/archive.tar.gz");
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let temp = TempDir::new().unwrap();
        let fetcher = Fetcher::new(temp.path().to_path_buf(), 30, None);

        let version = VersionId::new(3, 12, 7);
        let platform = HostPlatform::from_raw("linux", "x86_64").unwrap();
        let url = DownloadSource::Standalone
            .archive_url(&version, platform)
            .unwrap();

        // Seed the cache; the fetch must succeed without any network.
        std::fs::write(fetcher.cache_path(&url), b"archive bytes").unwrap();

        let result = fetcher
            .fetch(&version, DownloadSource::Standalone, platform, None)
            .await;
        assert!(result.success, "{}", result.message);
        assert_eq!(result.archive_path.unwrap(), fetcher.cache_path(&url));
    }

    #[tokio::test]
    async fn test_download_streams_with_progress() {
        let mut server = mockito::Server::new_async().await;
        let body = vec![0xabu8; 64 * 1024];
        let mock = server
            .mock("GET", mockito::Matcher::Regex(r"^/.+\.tar\.gz$".to_string()))
            .with_body(body.clone())
            .expect(1)
            .create_async()
            .await;

        let temp = TempDir::new().unwrap();
        let fetcher = Fetcher::new(temp.path().to_path_buf(), 30, Some(server.url()));

        let version = VersionId::new(3, 12, 7);
        let platform = HostPlatform::from_raw("linux", "x86_64").unwrap();

        let mut seen = Vec::new();
        let mut on_progress = |p: DownloadProgress| seen.push(p);
        let result = fetcher
            .fetch(
                &version,
                DownloadSource::Standalone,
                platform,
                Some(&mut on_progress),
            )
            .await;

        assert!(result.success, "{}", result.message);
        mock.assert_async().await;

        let archive = result.archive_path.unwrap();
        assert_eq!(std::fs::read(&archive).unwrap(), body);

        assert!(!seen.is_empty());
        let last = seen.last().unwrap();
        assert_eq!(last.downloaded_bytes, body.len() as u64);
        assert!(last.is_complete());
    }

    #[tokio::test]
    async fn test_http_error_is_a_failed_result() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let temp = TempDir::new().unwrap();
        let fetcher = Fetcher::new(temp.path().to_path_buf(), 30, Some(server.url()));

        let result = fetcher
            .fetch(
                &VersionId::new(3, 12, 7),
                DownloadSource::Standalone,
                HostPlatform::from_raw("linux", "x86_64").unwrap(),
                None,
            )
            .await;

        assert!(!result.success);
        assert!(result.message.contains("404"), "{}", result.message);
        assert!(result.archive_path.is_none());
    }

    #[tokio::test]
    async fn test_unsupported_platform_is_a_failed_result() {
        let temp = TempDir::new().unwrap();
        let fetcher = Fetcher::new(temp.path().to_path_buf(), 30, None);

        let windows_arm = HostPlatform {
            os: crate::platform::OsFamily::Windows,
            arch: crate::platform::CpuArch::Aarch64,
        };
        let result = fetcher
            .fetch(
                &VersionId::new(3, 12, 7),
                DownloadSource::Standalone,
                windows_arm,
                None,
            )
            .await;

        assert!(!result.success);
        assert!(result.message.contains("no archive"), "{}", result.message);
    }

    #[test]
    fn test_cleanup_cache_removes_old_files() {
        let temp = TempDir::new().unwrap();
        let fetcher = Fetcher::new(temp.path().to_path_buf(), 30, None);

        std::fs::write(temp.path().join("aaaa_old.tar.gz"), b"x").unwrap();
        std::fs::write(temp.path().join("bbbb_old2.tar.gz"), b"y").unwrap();

        // Zero-day retention treats every existing file as expired.
        let removed = fetcher.cleanup_cache(0).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);

        // Fresh files survive a generous threshold.
        std::fs::write(temp.path().join("cccc_new.tar.gz"), b"z").unwrap();
        let removed = fetcher.cleanup_cache(30).unwrap();
        assert_eq!(removed, 0);
    }

    #[tokio::test]
    async fn test_verify_installation_requires_an_executable() {
        let temp = TempDir::new().unwrap();
        assert!(!Fetcher::verify_installation(temp.path()).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_verify_installation_runs_the_interpreter() {
        use std::os::unix::fs::PermissionsExt;

        fn write_runtime(root: &Path, script: &str) {
            let bin = root.join("bin");
            std::fs::create_dir_all(&bin).unwrap();
            let exe = bin.join("python3");
            std::fs::write(&exe, script).unwrap();
            std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let working = TempDir::new().unwrap();
        write_runtime(working.path(), "#!/bin/sh\necho Python 3.12.7\n");
        assert!(Fetcher::verify_installation(working.path()).await);

        let broken = TempDir::new().unwrap();
        write_runtime(broken.path(), "#!/bin/sh\nexit 7\n");
        assert!(!Fetcher::verify_installation(broken.path()).await);
    }

    #[test]
    fn test_runtime_executable_layouts() {
        let temp = TempDir::new().unwrap();

        // Flat layout.
        let flat = temp.path().join("flat");
        std::fs::create_dir_all(flat.join("bin")).unwrap();
        std::fs::write(flat.join("bin").join("python3"), b"").unwrap();
        assert_eq!(
            runtime_executable(&flat).unwrap(),
            flat.join("bin").join("python3")
        );

        // Single top-level directory layout.
        let nested = temp.path().join("nested");
        std::fs::create_dir_all(nested.join("python").join("bin")).unwrap();
        std::fs::write(nested.join("python").join("bin").join("python3"), b"").unwrap();
        assert_eq!(
            runtime_executable(&nested).unwrap(),
            nested.join("python").join("bin").join("python3")
        );

        assert!(runtime_executable(&temp.path().join("missing")).is_none());
    }
}
