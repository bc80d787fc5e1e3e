//! Install signatures.
//!
//! A signature is the verification manifest of a completed install: the
//! target version plus a map of relative paths to SHA-256 digests. Patches
//! embed the target signature; the applier writes it beside the install as
//! `<version>.sig` so later repair passes can validate the tree.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::UpdateError;

/// Lowercase hex SHA-256 of a byte slice.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Verification manifest for one install tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Version the signature describes.
    pub version: String,
    /// Relative path → SHA-256, lowercase hex.
    pub files: BTreeMap<String, String>,
}

impl Signature {
    /// An empty signature for `version`.
    pub fn new(version: impl Into<String>) -> Signature {
        Signature {
            version: version.into(),
            files: BTreeMap::new(),
        }
    }

    /// Read a signature document.
    pub fn read_file(path: &Path) -> Result<Signature, UpdateError> {
        let data = std::fs::read(path)?;
        serde_json::from_slice(&data)
            .map_err(|e| UpdateError::invalid_patch(path, format!("undecodable signature: {e}")))
    }

    /// Write the signature document, creating parent directories.
    pub fn write_file(&self, path: &Path) -> Result<(), UpdateError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(self)
            .map_err(|e| UpdateError::invalid_patch(path, format!("unserializable signature: {e}")))?;
        std::fs::write(path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("42.sig");

        let mut signature = Signature::new("42");
        signature
            .files
            .insert("Client/hytale".to_string(), sha256_hex(b"game"));
        signature.write_file(&path).unwrap();

        let loaded = Signature::read_file(&path).unwrap();
        assert_eq!(loaded, signature);
    }

    #[test]
    fn test_corrupt_signature_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("42.sig");
        std::fs::write(&path, b"not json").unwrap();
        assert!(matches!(
            Signature::read_file(&path),
            Err(UpdateError::InvalidPatch { .. })
        ));
    }
}
