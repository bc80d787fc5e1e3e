//! Platform secret store.
//!
//! The blob store encrypts with a 32-byte key held by the OS keyring.
//! Access goes through the [`SecretStore`] trait so tests (and the
//! keyring-less Linux default) never touch the real platform service.
//!
//! On Linux the system keyring is opt-in via `HYTALE_LAUNCHER_ENABLE_KEYRING`;
//! without it the store yields no key and encrypted files degrade to
//! plaintext, matching the shipped launcher's behavior on desktops without
//! a secret service.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use parking_lot::Mutex;
use rand::RngCore;
use tracing::debug;

use crate::error::StoreError;

/// Keyring service identifier.
pub const SERVICE_NAME: &str = "com.hypixel.hytale-launcher";

/// Environment variable opting in to the system keyring on Linux.
pub const ENABLE_KEYRING_ENV: &str = "HYTALE_LAUNCHER_ENABLE_KEYRING";

/// A named secret store.
pub trait SecretStore: Send + Sync {
    /// Fetch a secret, `None` when absent.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store a secret.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
}

/// The operating system keyring, values base64-encoded.
pub struct SystemSecretStore;

impl SecretStore for SystemSecretStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let entry = keyring::Entry::new(SERVICE_NAME, key).map_err(|e| StoreError::Keyring {
            name: key.to_string(),
            reason: e.to_string(),
        })?;

        match entry.get_password() {
            Ok(encoded) => {
                let decoded = BASE64.decode(encoded).map_err(|e| StoreError::Keyring {
                    name: key.to_string(),
                    reason: format!("stored secret is not base64: {e}"),
                })?;
                Ok(Some(decoded))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::Keyring {
                name: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let entry = keyring::Entry::new(SERVICE_NAME, key).map_err(|e| StoreError::Keyring {
            name: key.to_string(),
            reason: e.to_string(),
        })?;

        entry
            .set_password(&BASE64.encode(value))
            .map_err(|e| StoreError::Keyring {
                name: key.to_string(),
                reason: e.to_string(),
            })
    }
}

/// An in-memory secret store for tests.
#[derive(Default)]
pub struct MemorySecretStore {
    secrets: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemorySecretStore {
    /// An empty store.
    pub fn new() -> MemorySecretStore {
        MemorySecretStore::default()
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.secrets.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.secrets.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// Encryption-key access for the blob store.
///
/// When disabled, [`Keyring::get_or_generate`] yields `None` and callers
/// fall back to plaintext. The keyring service may serialize access across
/// processes, so calls are kept short and keys cached per name.
pub struct Keyring {
    store: Box<dyn SecretStore>,
    enabled: bool,
    cache: Mutex<HashMap<String, [u8; 32]>>,
}

impl Keyring {
    /// A keyring over the platform secret service.
    ///
    /// Enabled everywhere except Linux, where `HYTALE_LAUNCHER_ENABLE_KEYRING`
    /// must be present.
    pub fn system() -> Keyring {
        let enabled = if cfg!(target_os = "linux") {
            std::env::var_os(ENABLE_KEYRING_ENV).is_some()
        } else {
            true
        };
        Keyring {
            store: Box::new(SystemSecretStore),
            enabled,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// A keyring over an arbitrary secret store (tests).
    pub fn with_store(store: Box<dyn SecretStore>, enabled: bool) -> Keyring {
        Keyring {
            store,
            enabled,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Whether a real key will be produced.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Fetch the key for `name`, generating and persisting a fresh 32-byte
    /// key on first use. Yields `None` when the keyring is disabled.
    pub fn get_or_generate(&self, name: &str) -> Result<Option<[u8; 32]>, StoreError> {
        if !self.enabled {
            return Ok(None);
        }

        if let Some(cached) = self.cache.lock().get(name) {
            return Ok(Some(*cached));
        }

        let key = match self.store.get(name)? {
            Some(raw) => {
                let mut key = [0u8; 32];
                if raw.len() != 32 {
                    return Err(StoreError::Keyring {
                        name: name.to_string(),
                        reason: format!("stored key has {} bytes, expected 32", raw.len()),
                    });
                }
                key.copy_from_slice(&raw);
                key
            }
            None => {
                debug!(key = name, "generating new encryption key");
                let mut key = [0u8; 32];
                rand::thread_rng().fill_bytes(&mut key);
                self.store.set(name, &key)?;
                key
            }
        };

        self.cache.lock().insert(name.to_string(), key);
        Ok(Some(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_keyring(enabled: bool) -> Keyring {
        Keyring::with_store(Box::new(MemorySecretStore::new()), enabled)
    }

    #[test]
    fn test_disabled_keyring_yields_no_key() {
        let keyring = memory_keyring(false);
        assert!(!keyring.is_enabled());
        assert_eq!(keyring.get_or_generate("state").unwrap(), None);
    }

    #[test]
    fn test_generated_key_is_stable() {
        let keyring = memory_keyring(true);
        let first = keyring.get_or_generate("state").unwrap().unwrap();
        let second = keyring.get_or_generate("state").unwrap().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_distinct_names_get_distinct_keys() {
        let keyring = memory_keyring(true);
        let a = keyring.get_or_generate("state").unwrap().unwrap();
        let b = keyring.get_or_generate("account").unwrap().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_length_secret_rejected() {
        let store = MemorySecretStore::new();
        store.set("state", b"short").unwrap();
        let keyring = Keyring::with_store(Box::new(store), true);
        let err = keyring.get_or_generate("state").unwrap_err();
        assert!(err.to_string().contains("expected 32"));
    }
}
