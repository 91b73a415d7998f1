use crate::models::{InstallSource, Installation};
use crate::version::VersionId;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Scan conventional OS locations for Python interpreters not managed by
/// this tool. Individual probe failures are skipped; the scan itself
/// never fails.
pub fn detect_system_pythons() -> Vec<Installation> {
    let mut seen = HashSet::new();
    let mut detected = Vec::new();

    for dir in candidate_dirs() {
        if !dir.is_dir() {
            continue;
        }

        for executable in candidate_executables(&dir) {
            // Resolve symlinks so python3 -> python3.12 counts once.
            let resolved = std::fs::canonicalize(&executable).unwrap_or(executable);
            if !seen.insert(resolved.clone()) {
                continue;
            }

            let version = match probe_interpreter(&resolved) {
                Some(version) => version,
                None => continue,
            };

            debug!(path = %resolved.display(), %version, "detected system interpreter");
            let home = resolved
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| resolved.clone());
            detected.push(Installation::new(version, home, InstallSource::SystemDetected));
        }
    }

    detected.sort_by(|a, b| b.version.cmp(&a.version));
    detected
}

/// Conventional interpreter locations per OS
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = if cfg!(target_os = "macos") {
        let mut dirs = vec![
            PathBuf::from("/usr/bin"),
            PathBuf::from("/usr/local/bin"),
            PathBuf::from("/opt/homebrew/bin"),
        ];
        let frameworks = PathBuf::from("/Library/Frameworks/Python.framework/Versions");
        if let Ok(entries) = std::fs::read_dir(&frameworks) {
            for entry in entries.flatten() {
                dirs.push(entry.path().join("bin"));
            }
        }
        dirs
    } else if cfg!(target_os = "windows") {
        let mut dirs = vec![
            PathBuf::from(r"C:\Program Files\Python313"),
            PathBuf::from(r"C:\Program Files\Python312"),
            PathBuf::from(r"C:\Program Files\Python311"),
        ];
        if let Ok(local) = std::env::var("LOCALAPPDATA") {
            let programs = PathBuf::from(local).join("Programs").join("Python");
            if let Ok(entries) = std::fs::read_dir(&programs) {
                for entry in entries.flatten() {
                    dirs.push(entry.path());
                }
            }
        }
        dirs
    } else {
        vec![
            PathBuf::from("/usr/bin"),
            PathBuf::from("/usr/local/bin"),
            PathBuf::from("/opt/python/bin"),
        ]
    };

    if let Some(home) = dirs::home_dir() {
        dirs.push(home.join(".local").join("bin"));
    }

    dirs
}

/// Interpreter executables inside one directory: the plain names plus any
/// versioned python3.X binaries.
fn candidate_executables(dir: &Path) -> Vec<PathBuf> {
    let plain: &[&str] = if cfg!(windows) {
        &["python.exe", "python3.exe"]
    } else {
        &["python3", "python"]
    };

    let mut executables: Vec<PathBuf> = plain
        .iter()
        .map(|name| dir.join(name))
        .filter(|p| p.is_file() || p.is_symlink())
        .collect();

    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            if let Some(name) = entry.file_name().to_str() {
                if is_versioned_interpreter_name(name) {
                    executables.push(entry.path());
                }
            }
        }
    }

    executables
}

/// Matches "python3.12" style names, excluding things like python3.12-config
fn is_versioned_interpreter_name(name: &str) -> bool {
    match name.strip_prefix("python3.") {
        Some(rest) => !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

/// Run a trivial version query against one candidate executable
fn probe_interpreter(executable: &Path) -> Option<VersionId> {
    let output = Command::new(executable).arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }

    // CPython 3.x prints to stdout; very old interpreters used stderr.
    let text = if output.stdout.is_empty() {
        String::from_utf8_lossy(&output.stderr).to_string()
    } else {
        String::from_utf8_lossy(&output.stdout).to_string()
    };

    parse_version_output(&text)
}

/// Parse "Python 3.12.7" style output
fn parse_version_output(output: &str) -> Option<VersionId> {
    let line = output.lines().next()?.trim();
    let rest = line.strip_prefix("Python ")?;
    let number: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    number.parse().ok()
}
