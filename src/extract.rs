use crate::error::{PyvmError, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use tracing::warn;

/// Unpack an archive into `dest_dir`, refusing any member whose final
/// path would land outside it. Rejected members are skipped, never
/// written, and never abort the extraction.
pub fn extract_archive(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dest_dir)?;

    let file_name = archive_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if file_name.ends_with(".tar.gz") || file_name.ends_with(".tgz") {
        extract_tar_gz(archive_path, dest_dir)
    } else if file_name.ends_with(".zip") {
        extract_zip(archive_path, dest_dir)
    } else {
        Err(PyvmError::ExtractionFailed(
            "Unsupported archive format".to_string(),
        ))
    }
}

/// Resolve a member path under the destination, or None when the member
/// is absolute, contains a parent-directory segment, or otherwise
/// escapes the destination.
fn safe_target(dest_dir: &Path, member_path: &Path) -> Option<PathBuf> {
    if member_path.is_absolute() {
        return None;
    }

    for component in member_path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    let target = dest_dir.join(member_path);
    // Belt and suspenders for platform path-separator edge cases.
    if !target.starts_with(dest_dir) {
        return None;
    }

    Some(target)
}

/// Confirm that the deepest existing ancestor of `target` resolves to a
/// directory under the resolved destination. A lexically-inside path can
/// still escape when a parent component is a symlink pointing outside;
/// resolving the ancestor catches that. Components created after this
/// check are real directories, so the write cannot be redirected.
fn resolves_within(dest_dir: &Path, target: &Path) -> bool {
    let dest_resolved = match dest_dir.canonicalize() {
        Ok(resolved) => resolved,
        Err(_) => return false,
    };

    let mut ancestor = target.parent();
    while let Some(dir) = ancestor {
        if dir.symlink_metadata().is_ok() {
            return dir
                .canonicalize()
                .map(|resolved| resolved.starts_with(&dest_resolved))
                .unwrap_or(false);
        }
        ancestor = dir.parent();
    }

    false
}

/// Lexically resolve a link member's target against the member's parent
/// directory; false when the target is absolute or climbs out of the
/// destination.
fn link_target_within(member_path: &Path, link_target: &Path) -> bool {
    if link_target.is_absolute() {
        return false;
    }

    let base = member_path.parent().unwrap_or_else(|| Path::new(""));
    let mut depth = 0usize;
    for component in base.components().chain(link_target.components()) {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }

    true
}

fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let tar_gz = File::open(archive_path)?;
    let tar = GzDecoder::new(tar_gz);
    let mut archive = Archive::new(tar);
    archive.set_preserve_permissions(true);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let member_path = entry.path()?.into_owned();

        let target = match safe_target(dest_dir, &member_path) {
            Some(target) => target,
            None => {
                warn!(
                    member = %member_path.display(),
                    "skipping archive member that escapes the destination"
                );
                continue;
            }
        };

        let entry_type = entry.header().entry_type();
        if entry_type.is_symlink() || entry_type.is_hard_link() {
            let target_ok = entry
                .link_name()
                .ok()
                .flatten()
                .map(|link| link_target_within(&member_path, &link))
                .unwrap_or(false);
            if !target_ok {
                warn!(
                    member = %member_path.display(),
                    "skipping link member whose target escapes the destination"
                );
                continue;
            }
        }

        if !resolves_within(dest_dir, &target) {
            warn!(
                member = %member_path.display(),
                "skipping archive member whose resolved path escapes the destination"
            );
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        entry.unpack(&target)?;
    }

    Ok(())
}

fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let file = File::open(archive_path)?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| PyvmError::ExtractionFailed(e.to_string()))?;

    for i in 0..archive.len() {
        let mut member = archive
            .by_index(i)
            .map_err(|e| PyvmError::ExtractionFailed(e.to_string()))?;

        let member_name = member.name().to_string();
        let target = match safe_target(dest_dir, Path::new(&member_name)) {
            Some(target) => target,
            None => {
                warn!(
                    member = %member_name,
                    "skipping archive member that escapes the destination"
                );
                continue;
            }
        };

        if !resolves_within(dest_dir, &target) {
            warn!(
                member = %member_name,
                "skipping archive member whose resolved path escapes the destination"
            );
            continue;
        }

        if member_name.ends_with('/') {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut outfile = File::create(&target)?;
            std::io::copy(&mut member, &mut outfile)?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = member.unix_mode() {
                std::fs::set_permissions(&target, std::fs::Permissions::from_mode(mode))?;
            }
        }
    }

    Ok(())
}
