//! Encrypted blob files.
//!
//! Framing: one `'E'` marker byte, a 12-byte GCM nonce, then AES-256-GCM
//! ciphertext with the tag appended. Files without the marker are treated
//! as plaintext and returned verbatim, which covers both legacy files and
//! installs running with the keyring disabled.
//!
//! Dev builds write plaintext unconditionally so state files stay
//! hand-editable, and only dev builds honor a hand-dropped `.json`
//! alternative next to the `.dat` file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};

use crate::error::StoreError;
use crate::keyring::Keyring;

/// First byte of every encrypted file.
pub const ENCRYPTED_MARKER: u8 = b'E';

/// GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// Encrypt `data` under `key`. Dev builds pass plaintext through.
pub fn encrypt(data: &[u8], key: &[u8; 32], dev: bool) -> Result<Vec<u8>, StoreError> {
    if dev {
        return Ok(data.to_vec());
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, data)
        .map_err(|_| StoreError::integrity("<memory>", "encryption failed"))?;

    let mut out = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
    out.push(ENCRYPTED_MARKER);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a framed blob. Unmarked data is returned verbatim.
pub fn decrypt(data: &[u8], key: &[u8; 32], path: &Path) -> Result<Vec<u8>, StoreError> {
    if data.first() != Some(&ENCRYPTED_MARKER) {
        return Ok(data.to_vec());
    }

    let body = &data[1..];
    if body.len() < NONCE_LEN {
        return Err(StoreError::integrity(path, "ciphertext too short"));
    }

    let (nonce, ciphertext) = body.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| StoreError::integrity(path, "bad gcm tag"))
}

/// Reads and writes encrypted files keyed by keyring secret names.
pub struct BlobStore {
    keyring: Arc<Keyring>,
    dev: bool,
}

impl BlobStore {
    /// A store over `keyring`. `dev` selects the plaintext write mode and
    /// the `.json` debugging fallback.
    pub fn new(keyring: Arc<Keyring>, dev: bool) -> BlobStore {
        BlobStore { keyring, dev }
    }

    /// Read and decrypt the file at `path`.
    pub fn read(&self, path: &Path, key_name: &str) -> Result<Vec<u8>, StoreError> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };

        match self.keyring.get_or_generate(key_name)? {
            Some(key) => decrypt(&data, &key, path),
            // Keyring disabled: only plaintext files are readable.
            None if data.first() == Some(&ENCRYPTED_MARKER) => Err(StoreError::integrity(
                path,
                "file is encrypted but the keyring is disabled",
            )),
            None => Ok(data),
        }
    }

    /// Encrypt and write `data` to `path`, creating parent directories.
    pub fn write(&self, path: &Path, key_name: &str, data: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let payload = match self.keyring.get_or_generate(key_name)? {
            Some(key) => encrypt(data, &key, self.dev)?,
            None => data.to_vec(),
        };

        std::fs::write(path, payload)?;
        Ok(())
    }

    /// Resolve a state-file base path to its concrete file.
    ///
    /// Dev builds prefer `<base>.json` when it exists as a regular file so
    /// a hand-edited document can stand in for the encrypted one; all other
    /// builds always use `<base>.dat`.
    pub fn dat_file(&self, base: &Path) -> PathBuf {
        if self.dev {
            let json = with_suffix(base, ".json");
            if json.is_file() {
                return json;
            }
        }
        with_suffix(base, ".dat")
    }
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut os = base.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}
