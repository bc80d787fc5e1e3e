//! Self-update cleanup.
//!
//! When a self-update completes, a cleanup note is written into the data
//! dir just before the new binary restarts. On every process start,
//! before any other launcher logic, the note is read-and-deleted and the
//! previous launcher install it names is removed.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use launcher_store::{BlobStore, Paths, StoreError};
use launcher_types::{Channel, PackageId};

use crate::error::UpdateError;

/// Keyring secret name for the cleanup note.
const NOTE_KEY_NAME: &str = "9D11C6A5-0E9D-43AE-9A1B-2F40C7C2B14D";

/// The transient note naming the previous launcher install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupNote {
    /// Channel the old launcher was installed under.
    pub channel: Channel,
    /// Version of the old launcher.
    pub version: String,
}

/// Write the cleanup note.
pub fn write_note(store: &BlobStore, paths: &Paths, note: &CleanupNote) -> Result<(), UpdateError> {
    let file = store.dat_file(&paths.cleanup_note_base());
    let data = serde_json::to_vec(note)
        .map_err(|e| UpdateError::Store(StoreError::integrity(&file, e.to_string())))?;
    store.write(&file, NOTE_KEY_NAME, &data)?;
    Ok(())
}

/// Read and delete the cleanup note.
///
/// The note file is removed whether or not it decodes: a note that can be
/// read once must never be acted on twice.
pub fn consume_note(store: &BlobStore, paths: &Paths) -> Result<Option<CleanupNote>, UpdateError> {
    let file = store.dat_file(&paths.cleanup_note_base());

    let read = store.read(&file, NOTE_KEY_NAME);
    if let Err(remove_err) = std::fs::remove_file(&file) {
        if remove_err.kind() != std::io::ErrorKind::NotFound {
            warn!(file = %file.display(), error = %remove_err, "failed to remove cleanup note");
        }
    }

    let data = match read {
        Ok(data) => data,
        Err(err) if err.is_not_found() => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    let note: CleanupNote = serde_json::from_slice(&data)
        .map_err(|e| UpdateError::Store(StoreError::integrity(&file, e.to_string())))?;
    Ok(Some(note))
}

/// Remove the previous launcher install if a cleanup is pending.
///
/// Failure to read the note is returned (startup treats it as fatal);
/// failure to remove the directory is logged and reported but tolerated.
pub fn cleanup_old_launcher(store: &BlobStore, paths: &Paths) -> Result<(), UpdateError> {
    let Some(note) = consume_note(store, paths)? else {
        return Ok(());
    };

    let dir = paths.package_dir(PackageId::Launcher, note.channel, &note.version);
    debug!(dir = %dir.display(), "cleaning up old launcher install");

    if let Err(err) = std::fs::remove_dir_all(&dir) {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!(dir = %dir.display(), error = %err, "failed to remove old launcher install");
        }
    }

    Ok(())
}
