//! Archive extraction.
//!
//! Supports `.zip`, `.tar.gz` and `.tgz`, detected by extension
//! (case-insensitive). Member names pass through an optional rename
//! transformer first; names that transform to nothing are skipped. Every
//! resolved path must stay inside the destination; anything using parent
//! components, roots or drive prefixes fails the whole extraction.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::debug;

use crate::error::UpdateError;

/// Progress callback: `(files_done, files_total)`.
pub type ExtractProgressFn = dyn Fn(usize, usize) + Send + Sync;

/// Member rename transformer. `None` (or empty) skips the member.
pub type RenameFn = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Drop the first path component: `root/dir/file` → `dir/file`.
///
/// Members without a separator vanish, which is what callers stripping a
/// wrapper directory want.
pub fn strip_root_dir(name: &str) -> Option<String> {
    name.split_once('/').map(|(_, rest)| rest.to_string())
}

/// Extract `archive` into `dest`, removing `dest` first.
pub fn extract(
    archive: &Path,
    dest: &Path,
    progress: Option<&ExtractProgressFn>,
    rename: Option<&RenameFn>,
) -> Result<(), UpdateError> {
    debug!(archive = %archive.display(), dest = %dest.display(), "extracting archive");
    std::fs::remove_dir_all(dest).or_else(ignore_missing)?;
    extract_inner(archive, dest, progress, rename)
}

/// Extract `archive` into `dest`, keeping whatever already exists there.
///
/// Used when upgrading the launcher over its own live install so logs and
/// scratch files survive.
pub fn extract_without_cleanup(
    archive: &Path,
    dest: &Path,
    progress: Option<&ExtractProgressFn>,
    rename: Option<&RenameFn>,
) -> Result<(), UpdateError> {
    debug!(archive = %archive.display(), dest = %dest.display(), "extracting archive (no cleanup)");
    extract_inner(archive, dest, progress, rename)
}

fn extract_inner(
    archive: &Path,
    dest: &Path,
    progress: Option<&ExtractProgressFn>,
    rename: Option<&RenameFn>,
) -> Result<(), UpdateError> {
    std::fs::create_dir_all(dest)?;

    let name = archive
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if name.ends_with(".zip") {
        extract_zip(archive, dest, progress, rename)
    } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        extract_tar_gz(archive, dest, progress, rename)
    } else {
        Err(UpdateError::UnsupportedArchive(name))
    }
}

/// Resolve a member name inside `dest`, rejecting escapes.
fn safe_path(dest: &Path, name: &str) -> Result<PathBuf, UpdateError> {
    let mut out = dest.to_path_buf();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(UpdateError::PathEscape(name.to_string()))
            }
        }
    }
    Ok(out)
}

fn transformed_name(rename: Option<&RenameFn>, raw: &str) -> Option<String> {
    let name = match rename {
        Some(rename) => rename(raw)?,
        None => raw.to_string(),
    };
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

fn extract_zip(
    archive: &Path,
    dest: &Path,
    progress: Option<&ExtractProgressFn>,
    rename: Option<&RenameFn>,
) -> Result<(), UpdateError> {
    let file = File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)?;
    let total = zip.len();

    for index in 0..total {
        let mut member = zip.by_index(index)?;
        let raw = member.name().to_string();

        let Some(name) = transformed_name(rename, &raw) else {
            continue;
        };
        let path = safe_path(dest, &name)?;

        if member.is_dir() {
            std::fs::create_dir_all(&path)?;
        } else {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&path)?;
            std::io::copy(&mut member, &mut out)?;

            #[cfg(unix)]
            if let Some(mode) = member.unix_mode() {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode))?;
            }
        }

        if let Some(progress) = progress {
            progress(index + 1, total);
        }
    }

    Ok(())
}

/// Count regular-file entries. Only run when progress was requested.
fn count_tar_gz_files(file: &mut File) -> Result<usize, UpdateError> {
    let mut archive = tar::Archive::new(GzDecoder::new(&mut *file));
    let mut count = 0;
    for entry in archive.entries()? {
        if entry?.header().entry_type().is_file() {
            count += 1;
        }
    }
    Ok(count)
}

fn extract_tar_gz(
    archive: &Path,
    dest: &Path,
    progress: Option<&ExtractProgressFn>,
    rename: Option<&RenameFn>,
) -> Result<(), UpdateError> {
    let mut file = File::open(archive)?;

    let total = if progress.is_some() {
        let total = count_tar_gz_files(&mut file)?;
        file.seek(SeekFrom::Start(0))?;
        total
    } else {
        0
    };

    let mut tar = tar::Archive::new(GzDecoder::new(file));
    let mut done = 0;

    for entry in tar.entries()? {
        let mut entry = entry?;
        let raw = entry.path()?.to_string_lossy().into_owned();

        let Some(name) = transformed_name(rename, &raw) else {
            continue;
        };
        let path = safe_path(dest, &name)?;

        let kind = entry.header().entry_type();
        if kind.is_dir() {
            std::fs::create_dir_all(&path)?;
        } else if kind.is_file() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&path)?;
            copy_entry(&mut entry, &mut out)?;

            #[cfg(unix)]
            if let Ok(mode) = entry.header().mode() {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode))?;
            }

            done += 1;
            if let Some(progress) = progress {
                progress(done, total);
            }
        }
        // Links and other member kinds are dropped: install trees contain
        // only files and directories, and symlinks would bypass safe_path.
    }

    Ok(())
}

fn copy_entry<R: Read>(entry: &mut R, out: &mut File) -> Result<(), UpdateError> {
    std::io::copy(entry, out)?;
    Ok(())
}

fn ignore_missing(err: std::io::Error) -> Result<(), std::io::Error> {
    if err.kind() == std::io::ErrorKind::NotFound {
        Ok(())
    } else {
        Err(err)
    }
}
