//! Binary patch application.
//!
//! A patch carries a game tree from build N to N+1. The container is a
//! magic header, a JSON manifest (source and target builds, per-file
//! operations, the embedded target signature) and the concatenated payload
//! blobs of the add/replace operations, in operation order.
//!
//! Application is staged: the source tree is copied to `<target>.staging`,
//! operations are applied there, the staged tree is verified against the
//! target signature, and only then is it swapped into place. The old tree
//! is renamed aside during the swap; a crash between the two renames is
//! repaired on the next start by [`restore_interrupted_swap`]. Failures
//! before the swap remove the staging directory and leave the source
//! untouched.

use std::io::Read;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::UpdateError;
use crate::repair;
use crate::sig::{sha256_hex, Signature};

/// First eight bytes of every patch container.
pub const PATCH_MAGIC: &[u8; 8] = b"HYPATCH1";

/// Patch progress callback over a monotone fraction in `[0, 1]`.
pub type PatchProgressFn = dyn Fn(f64) + Send + Sync;

/// One file operation in a patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PatchOp {
    /// Create a new file from the payload.
    Add {
        /// Relative path inside the install.
        path: String,
        /// Payload blob length in bytes.
        size: u64,
        /// Payload blob digest.
        sha256: String,
    },
    /// Overwrite an existing file with the payload.
    Replace {
        /// Relative path inside the install.
        path: String,
        /// Payload blob length in bytes.
        size: u64,
        /// Payload blob digest.
        sha256: String,
    },
    /// Delete a file carried over from the source tree.
    Remove {
        /// Relative path inside the install.
        path: String,
    },
}

/// The decoded patch header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchManifest {
    /// Package the patch applies to.
    pub package: String,
    /// Build the patch upgrades from.
    pub from_build: u64,
    /// Build the patch produces.
    pub to_build: u64,
    /// Version string of the target build.
    pub version: String,
    /// File operations, payload blobs in this order.
    pub ops: Vec<PatchOp>,
    /// Signature of the complete target tree.
    pub signature: Signature,
}

/// Read and validate the header of a patch container.
///
/// Returns the manifest and the byte offset where payload blobs begin.
pub fn read_manifest(patch: &Path) -> Result<(PatchManifest, u64), UpdateError> {
    let data = std::fs::read(patch)?;

    if data.len() < PATCH_MAGIC.len() + 4 || &data[..PATCH_MAGIC.len()] != PATCH_MAGIC {
        return Err(UpdateError::invalid_patch(patch, "bad magic"));
    }

    let len_start = PATCH_MAGIC.len();
    let manifest_len =
        u32::from_le_bytes([data[len_start], data[len_start + 1], data[len_start + 2], data[len_start + 3]])
            as usize;
    let manifest_start = len_start + 4;

    if data.len() < manifest_start + manifest_len {
        return Err(UpdateError::invalid_patch(patch, "truncated manifest"));
    }

    let manifest: PatchManifest =
        serde_json::from_slice(&data[manifest_start..manifest_start + manifest_len])
            .map_err(|e| UpdateError::invalid_patch(patch, format!("undecodable manifest: {e}")))?;

    Ok((manifest, (manifest_start + manifest_len) as u64))
}

/// Apply `patch` producing `target_dir`, writing the new signature to
/// `sig_path`.
///
/// `source_dir` is the tree the patch upgrades from; `None` stages from an
/// empty tree (first install delivered as a patch). On success the target
/// directory holds the complete new build and the signature is saved
/// beside it. On failure before the swap the filesystem is as it was,
/// minus the removed staging directory.
///
/// Cancellation is observed between operations while staging; the swap
/// itself is never interrupted.
pub fn apply_patch(
    patch: &Path,
    source_dir: Option<&Path>,
    target_dir: &Path,
    sig_path: &Path,
    cancel: &CancellationToken,
    progress: Option<&PatchProgressFn>,
) -> Result<PatchManifest, UpdateError> {
    let report = |value: f64| {
        if let Some(progress) = progress {
            progress(value);
        }
    };

    let (manifest, payload_offset) = read_manifest(patch)?;
    report(0.1);

    let staging = sibling_dir(target_dir, ".staging");
    std::fs::remove_dir_all(&staging).or_else(ignore_missing)?;

    let staged = stage(
        patch,
        payload_offset,
        &manifest,
        source_dir,
        &staging,
        cancel,
        &report,
    );

    if let Err(err) = staged {
        warn!(error = %err, staging = %staging.display(), "patch staging failed, rolling back");
        std::fs::remove_dir_all(&staging).or_else(ignore_missing)?;
        return Err(err);
    }

    // Verify the staged tree against the target signature before touching
    // the live install.
    let verified = repair::verify_tree(&staging, &manifest.signature.files, None);
    if !verified.is_healthy() {
        std::fs::remove_dir_all(&staging).or_else(ignore_missing)?;
        return Err(UpdateError::VerifyFailed {
            dir: staging,
            missing: verified.missing.len(),
            corrupted: verified.corrupted.len(),
        });
    }
    report(0.9);

    swap_in(&staging, target_dir)?;
    manifest.signature.write_file(sig_path)?;
    report(1.0);

    info!(
        target = %target_dir.display(),
        build = manifest.to_build,
        "patch applied"
    );
    Ok(manifest)
}

/// Repair an interrupted swap for `target_dir`.
///
/// A crash between the two swap renames leaves the primary missing and the
/// aside copy present; restore the aside copy. Leftover staging
/// directories are removed in every case.
pub fn restore_interrupted_swap(target_dir: &Path) -> Result<(), UpdateError> {
    let old = sibling_dir(target_dir, ".old");
    let staging = sibling_dir(target_dir, ".staging");

    if !target_dir.exists() && old.exists() {
        warn!(target = %target_dir.display(), "restoring install left aside by an interrupted swap");
        std::fs::rename(&old, target_dir)?;
    } else if old.exists() {
        // Swap completed but the aside copy was never removed.
        std::fs::remove_dir_all(&old)?;
    }

    std::fs::remove_dir_all(&staging).or_else(ignore_missing)?;
    Ok(())
}

fn stage(
    patch: &Path,
    payload_offset: u64,
    manifest: &PatchManifest,
    source_dir: Option<&Path>,
    staging: &Path,
    cancel: &CancellationToken,
    report: &dyn Fn(f64),
) -> Result<(), UpdateError> {
    match source_dir {
        Some(source) if source.is_dir() => copy_tree(source, staging)?,
        _ => std::fs::create_dir_all(staging)?,
    }
    report(0.2);

    let mut payload = std::fs::File::open(patch)?;
    use std::io::Seek;
    payload.seek(std::io::SeekFrom::Start(payload_offset))?;

    let total_ops = manifest.ops.len().max(1);
    for (index, op) in manifest.ops.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(UpdateError::Cancelled);
        }

        match op {
            PatchOp::Add { path, size, sha256 } | PatchOp::Replace { path, size, sha256 } => {
                let dest = member_path(staging, path, patch)?;
                if let Some(parent) = dest.parent() {
                    std::fs::create_dir_all(parent)?;
                }

                let mut blob = vec![0u8; *size as usize];
                payload.read_exact(&mut blob).map_err(|_| {
                    UpdateError::invalid_patch(patch, format!("truncated payload for {path}"))
                })?;

                let actual = sha256_hex(&blob);
                if !actual.eq_ignore_ascii_case(sha256) {
                    return Err(UpdateError::invalid_patch(
                        patch,
                        format!("payload digest mismatch for {path}"),
                    ));
                }

                std::fs::write(&dest, blob)?;
            }
            PatchOp::Remove { path } => {
                let dest = member_path(staging, path, patch)?;
                std::fs::remove_file(&dest).or_else(ignore_missing)?;
            }
        }

        report(0.2 + 0.6 * (index + 1) as f64 / total_ops as f64);
    }

    Ok(())
}

/// Two renames: current aside, staging in, then drop the aside copy.
fn swap_in(staging: &Path, target: &Path) -> Result<(), UpdateError> {
    let old = sibling_dir(target, ".old");
    std::fs::remove_dir_all(&old).or_else(ignore_missing)?;

    let had_previous = target.exists();
    if had_previous {
        std::fs::rename(target, &old)?;
    }

    if let Err(err) = std::fs::rename(staging, target) {
        // Put the old tree back so the install stays launchable.
        if had_previous {
            let _ = std::fs::rename(&old, target);
        }
        return Err(err.into());
    }

    if had_previous {
        std::fs::remove_dir_all(&old).or_else(ignore_missing)?;
    }
    Ok(())
}

fn member_path(root: &Path, name: &str, patch: &Path) -> Result<PathBuf, UpdateError> {
    let mut out = root.to_path_buf();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => {
                return Err(UpdateError::invalid_patch(
                    patch,
                    format!("illegal member path: {name}"),
                ))
            }
        }
    }
    Ok(out)
}

fn sibling_dir(dir: &Path, suffix: &str) -> PathBuf {
    let mut os = dir.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}

fn copy_tree(src: &Path, dst: &Path) -> Result<(), UpdateError> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&from, &to)?;
        } else {
            std::fs::copy(&from, &to)?;
        }
    }
    Ok(())
}

fn ignore_missing(err: std::io::Error) -> Result<(), std::io::Error> {
    if err.kind() == std::io::ErrorKind::NotFound {
        Ok(())
    } else {
        Err(err)
    }
}
