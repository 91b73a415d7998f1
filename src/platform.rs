use crate::error::{PyvmError, Result};
use crate::version::VersionId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported operating system families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Linux,
    MacOs,
    Windows,
}

impl OsFamily {
    pub fn as_str(&self) -> &str {
        match self {
            OsFamily::Linux => "linux",
            OsFamily::MacOs => "macos",
            OsFamily::Windows => "windows",
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Supported CPU architectures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuArch {
    X86_64,
    Aarch64,
}

impl CpuArch {
    pub fn as_str(&self) -> &str {
        match self {
            CpuArch::X86_64 => "x86_64",
            CpuArch::Aarch64 => "aarch64",
        }
    }
}

impl fmt::Display for CpuArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalized host OS/architecture pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostPlatform {
    pub os: OsFamily,
    pub arch: CpuArch,
}

impl HostPlatform {
    pub fn current() -> Result<Self> {
        Self::from_raw(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Normalize raw OS/CPU strings into the closed vocabulary
    pub fn from_raw(os: &str, arch: &str) -> Result<Self> {
        let os_family = match os {
            "linux" => OsFamily::Linux,
            "macos" | "darwin" => OsFamily::MacOs,
            "windows" => OsFamily::Windows,
            _ => {
                return Err(PyvmError::UnsupportedPlatform {
                    os: os.to_string(),
                    arch: arch.to_string(),
                })
            }
        };

        let cpu_arch = match arch {
            "x86_64" | "amd64" | "x64" => CpuArch::X86_64,
            "aarch64" | "arm64" => CpuArch::Aarch64,
            _ => {
                return Err(PyvmError::UnsupportedPlatform {
                    os: os.to_string(),
                    arch: arch.to_string(),
                })
            }
        };

        Ok(Self {
            os: os_family,
            arch: cpu_arch,
        })
    }
}

impl fmt::Display for HostPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

/// Release tag of the python-build-standalone builds in the bundled catalog
const STANDALONE_RELEASE_TAG: &str = "20250818";

/// Upstream sources of prebuilt runtime archives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadSource {
    /// astral-sh/python-build-standalone GitHub releases (tar.gz)
    Standalone,
    /// python.org embeddable distributions (zip, Windows only)
    PythonOrg,
}

impl DownloadSource {
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "standalone" => Some(DownloadSource::Standalone),
            "python-org" => Some(DownloadSource::PythonOrg),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DownloadSource::Standalone => "standalone",
            DownloadSource::PythonOrg => "python-org",
        }
    }

    /// Download URL for a version on a platform, or None when this source
    /// publishes no archive for that OS/arch combination.
    pub fn archive_url(&self, version: &VersionId, platform: HostPlatform) -> Option<String> {
        match self {
            DownloadSource::Standalone => {
                let triple = match (platform.os, platform.arch) {
                    (OsFamily::Linux, CpuArch::X86_64) => "x86_64-unknown-linux-gnu",
                    (OsFamily::Linux, CpuArch::Aarch64) => "aarch64-unknown-linux-gnu",
                    (OsFamily::MacOs, CpuArch::X86_64) => "x86_64-apple-darwin",
                    (OsFamily::MacOs, CpuArch::Aarch64) => "aarch64-apple-darwin",
                    (OsFamily::Windows, CpuArch::X86_64) => "x86_64-pc-windows-msvc",
                    (OsFamily::Windows, CpuArch::Aarch64) => return None,
                };
                Some(format!(
                    "https://github.com/astral-sh/python-build-standalone/releases/download/{tag}/cpython-{version}+{tag}-{triple}-install_only.tar.gz",
                    tag = STANDALONE_RELEASE_TAG,
                    version = version,
                    triple = triple,
                ))
            }
            DownloadSource::PythonOrg => match (platform.os, platform.arch) {
                (OsFamily::Windows, CpuArch::X86_64) => Some(format!(
                    "https://www.python.org/ftp/python/{version}/python-{version}-embed-amd64.zip",
                    version = version,
                )),
                _ => None,
            },
        }
    }
}

impl fmt::Display for DownloadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arch_normalization() {
        let p = HostPlatform::from_raw("linux", "amd64").unwrap();
        assert_eq!(p.arch, CpuArch::X86_64);

        let p = HostPlatform::from_raw("darwin", "arm64").unwrap();
        assert_eq!(p.os, OsFamily::MacOs);
        assert_eq!(p.arch, CpuArch::Aarch64);

        assert!(HostPlatform::from_raw("freebsd", "x86_64").is_err());
        assert!(HostPlatform::from_raw("linux", "riscv64").is_err());
    }

    #[test]
    fn test_standalone_urls() {
        let version = VersionId::new(3, 12, 7);
        let platform = HostPlatform::from_raw("linux", "x86_64").unwrap();

        let url = DownloadSource::Standalone
            .archive_url(&version, platform)
            .unwrap();
        assert!(url.contains("cpython-3.12.7+"));
        assert!(url.contains("x86_64-unknown-linux-gnu"));
        assert!(url.ends_with(".tar.gz"));
    }

    #[test]
    fn test_unsupported_combination_is_none() {
        let version = VersionId::new(3, 12, 7);
        let windows_arm = HostPlatform {
            os: OsFamily::Windows,
            arch: CpuArch::Aarch64,
        };
        assert!(DownloadSource::Standalone
            .archive_url(&version, windows_arm)
            .is_none());

        let linux = HostPlatform::from_raw("linux", "x86_64").unwrap();
        assert!(DownloadSource::PythonOrg
            .archive_url(&version, linux)
            .is_none());
    }

    #[test]
    fn test_source_names() {
        assert_eq!(
            DownloadSource::by_name("standalone"),
            Some(DownloadSource::Standalone)
        );
        assert_eq!(
            DownloadSource::by_name("python-org"),
            Some(DownloadSource::PythonOrg)
        );
        assert!(DownloadSource::by_name("conda").is_none());
    }
}
