//! Install verification and repair.
//!
//! Walks a signature's path → digest mapping against an install tree and
//! classifies each entry as OK, missing or corrupted. Individual files can
//! be re-downloaded and swapped into place; files on disk that the
//! signature does not know about can be swept away.

use std::collections::BTreeMap;
use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use launcher_net::download::file_sha256;
use launcher_net::Fetcher;

use crate::error::UpdateError;

/// Verification progress callback: `(current, total, path)`.
pub type VerifyProgressFn = dyn Fn(usize, usize, &str) + Send + Sync;

/// Aggregate result of a verification pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Entries checked.
    pub total_files: usize,
    /// Entries that passed.
    pub ok_files: usize,
    /// Paths absent from the tree.
    pub missing: Vec<String>,
    /// Paths with digest mismatches.
    pub corrupted: Vec<String>,
    /// Paths that could not be checked at all.
    pub errors: Vec<String>,
}

impl VerifyReport {
    /// Whether every entry passed.
    pub fn is_healthy(&self) -> bool {
        self.missing.is_empty() && self.corrupted.is_empty() && self.errors.is_empty()
    }

    /// Whether a repair pass could help.
    pub fn needs_repair(&self) -> bool {
        !self.missing.is_empty() || !self.corrupted.is_empty()
    }
}

/// Verify `dir` against `checksums` (relative path → SHA-256).
///
/// Directories named in the mapping are OK when present. Entries are
/// visited in mapping order with `progress` called per entry.
pub fn verify_tree(
    dir: &Path,
    checksums: &BTreeMap<String, String>,
    progress: Option<&VerifyProgressFn>,
) -> VerifyReport {
    let mut report = VerifyReport {
        total_files: checksums.len(),
        ..VerifyReport::default()
    };

    for (index, (rel_path, expected)) in checksums.iter().enumerate() {
        if let Some(progress) = progress {
            progress(index + 1, report.total_files, rel_path);
        }

        let full = dir.join(rel_path);
        match std::fs::metadata(&full) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                report.missing.push(rel_path.clone());
            }
            Err(e) => {
                warn!(path = rel_path, error = %e, "could not stat file during verify");
                report.errors.push(rel_path.clone());
            }
            Ok(meta) if meta.is_dir() => {
                report.ok_files += 1;
            }
            Ok(_) => match file_sha256(&full) {
                Ok(actual) if actual.eq_ignore_ascii_case(expected) => {
                    report.ok_files += 1;
                }
                Ok(_) => {
                    report.corrupted.push(rel_path.clone());
                }
                Err(e) => {
                    warn!(path = rel_path, error = %e, "could not hash file during verify");
                    report.errors.push(rel_path.clone());
                }
            },
        }
    }

    debug!(
        dir = %dir.display(),
        ok = report.ok_files,
        missing = report.missing.len(),
        corrupted = report.corrupted.len(),
        "verification pass complete"
    );
    report
}

/// Re-download one file and swap it into place.
///
/// The payload spools into a sibling temp file, is hash-verified by the
/// download itself, and replaces the target with a rename.
pub async fn repair_file(
    fetcher: &Fetcher,
    cancel: &CancellationToken,
    install_dir: &Path,
    rel_path: &str,
    url: &str,
    expected_sha256: &str,
) -> Result<(), UpdateError> {
    info!(path = rel_path, url, "repairing file");

    let full = install_dir.join(rel_path);
    let parent = full
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| install_dir.to_path_buf());
    std::fs::create_dir_all(&parent)?;

    let temp = fetcher
        .download_temp(cancel, &parent, url, Some(expected_sha256), None)
        .await?;

    std::fs::rename(&temp, &full)?;
    info!(path = rel_path, "file repaired");
    Ok(())
}

/// Delete regular files under `dir` that `expected` does not name.
///
/// Failures on individual files are logged and skipped; the returned list
/// holds the relative paths actually removed.
pub fn cleanup_orphans(dir: &Path, expected: &BTreeMap<String, String>) -> Vec<String> {
    let mut removed = Vec::new();
    let mut stack = vec![dir.to_path_buf()];

    while let Some(current) = stack.pop() {
        let entries = match std::fs::read_dir(&current) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %current.display(), error = %e, "could not scan directory for orphans");
                continue;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }

            let Ok(rel) = path.strip_prefix(dir) else {
                continue;
            };
            let rel = rel.to_string_lossy().replace('\\', "/");

            if !expected.contains_key(&rel) {
                debug!(path = rel, "removing orphaned file");
                match std::fs::remove_file(&path) {
                    Ok(()) => removed.push(rel),
                    Err(e) => warn!(path = rel, error = %e, "failed to remove orphaned file"),
                }
            }
        }
    }

    removed
}
