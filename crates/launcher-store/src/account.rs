//! Account document.
//!
//! The encrypted `account.{json|dat}` file: profiles with their OAuth
//! tokens, the selected channel, EULA acceptance and the per-channel
//! patchline info last fetched from the server.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use launcher_types::Channel;

use crate::blob::BlobStore;
use crate::error::StoreError;
use crate::paths::Paths;

/// Keyring secret name for account-file encryption.
const ACCOUNT_KEY_NAME: &str = "2C7A40DE-2EA1-4375-8E3B-F7D5EDA0F9A1";

/// Entitlement prefix granting access to a patchline.
pub const PATCHLINE_ENTITLEMENT_PREFIX: &str = "patchline:";

/// An OAuth token triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Bearer token presented to the account service.
    pub access_token: String,
    /// Token used to mint fresh access tokens.
    pub refresh_token: String,
    /// Access token expiry.
    pub expiry: DateTime<Utc>,
}

impl Token {
    /// Whether the access token has expired (with a safety margin).
    pub fn is_expired(&self, margin: chrono::Duration) -> bool {
        Utc::now() + margin >= self.expiry
    }
}

/// One signed-in player profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Stable profile identifier.
    pub uuid: Uuid,
    /// Display name.
    pub username: String,
    /// Current token triple.
    pub token: Token,
    /// Entitlement strings; flags or `patchline:<name>`.
    #[serde(default)]
    pub entitlements: Vec<String>,
}

impl Profile {
    /// The patchlines this profile is entitled to.
    pub fn patchlines(&self) -> impl Iterator<Item = &str> {
        self.entitlements
            .iter()
            .filter_map(|e| e.strip_prefix(PATCHLINE_ENTITLEMENT_PREFIX))
    }

    /// Whether the profile may install from `channel`'s patchline.
    pub fn has_patchline(&self, channel: Channel) -> bool {
        self.patchlines().any(|p| p == channel.as_str())
    }
}

/// Server-provided info about one patchline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchlineInfo {
    /// Newest build number published on this patchline.
    pub newest_build: u64,
    /// Entitlement flags attached to the patchline.
    #[serde(default)]
    pub flags: Vec<String>,
}

/// The persisted account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Signed-in profiles; non-empty while logged in.
    #[serde(default)]
    pub profiles: Vec<Profile>,
    /// UUID of the active profile. Always present in `profiles`.
    #[serde(default)]
    pub current_profile: Option<Uuid>,
    /// Channel selected in the UI.
    #[serde(default)]
    pub selected_channel: Option<Channel>,
    /// When the EULA was accepted, if ever.
    #[serde(default)]
    pub eula_accepted_at: Option<DateTime<Utc>>,
    /// Per-channel patchline info from the last `launcher-data` fetch.
    #[serde(default)]
    pub patchlines: HashMap<String, PatchlineInfo>,
}

impl Account {
    /// The active profile.
    pub fn current_profile(&self) -> Option<&Profile> {
        let uuid = self.current_profile?;
        self.profiles.iter().find(|p| p.uuid == uuid)
    }

    /// Mutable access to the active profile.
    pub fn current_profile_mut(&mut self) -> Option<&mut Profile> {
        let uuid = self.current_profile?;
        self.profiles.iter_mut().find(|p| p.uuid == uuid)
    }

    /// Select the active profile. Rejects UUIDs not present in `profiles`,
    /// keeping the reference from dangling.
    pub fn select_profile(&mut self, uuid: Uuid) -> bool {
        if self.profiles.iter().any(|p| p.uuid == uuid) {
            self.current_profile = Some(uuid);
            true
        } else {
            false
        }
    }

    /// Read and decrypt the account file.
    pub fn read_file(store: &BlobStore, paths: &Paths) -> Result<Account, StoreError> {
        let file = store.dat_file(&paths.account_file_base());
        let data = store.read(&file, ACCOUNT_KEY_NAME)?;
        serde_json::from_slice(&data)
            .map_err(|e| StoreError::integrity(&file, format!("undecodable account: {e}")))
    }

    /// Encrypt and write the account file.
    pub fn write_file(&self, store: &BlobStore, paths: &Paths) -> Result<(), StoreError> {
        let file = store.dat_file(&paths.account_file_base());
        let data = serde_json::to_vec(self)
            .map_err(|e| StoreError::integrity(&file, format!("unserializable account: {e}")))?;
        store.write(&file, ACCOUNT_KEY_NAME, &data)
    }

    /// Delete the account file, ignoring absence.
    pub fn remove_file(store: &BlobStore, paths: &Paths) -> Result<(), StoreError> {
        let file = store.dat_file(&paths.account_file_base());
        match std::fs::remove_file(&file) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyring::{Keyring, MemorySecretStore};
    use std::sync::Arc;

    fn fixture() -> (tempfile::TempDir, BlobStore, Paths) {
        let dir = tempfile::tempdir().unwrap();
        let keyring = Keyring::with_store(Box::new(MemorySecretStore::new()), true);
        let store = BlobStore::new(Arc::new(keyring), false);
        let paths = Paths::with_root(dir.path());
        (dir, store, paths)
    }

    fn profile(name: &str, entitlements: &[&str]) -> Profile {
        Profile {
            uuid: Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()),
            username: name.to_string(),
            token: Token {
                access_token: "at".to_string(),
                refresh_token: "rt".to_string(),
                expiry: Utc::now() + chrono::Duration::hours(1),
            },
            entitlements: entitlements.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_patchline_entitlements() {
        let p = profile("kweebec", &["patchline:release", "patchline:beta", "early_bird"]);
        let lines: Vec<&str> = p.patchlines().collect();
        assert_eq!(lines, vec!["release", "beta"]);
        assert!(p.has_patchline(Channel::Release));
        assert!(!p.has_patchline(Channel::Alpha));
    }

    #[test]
    fn test_select_profile_rejects_unknown() {
        let mut account = Account {
            profiles: vec![profile("a", &[])],
            ..Account::default()
        };
        let known = account.profiles[0].uuid;
        assert!(account.select_profile(known));
        assert_eq!(account.current_profile().unwrap().username, "a");
        assert!(!account.select_profile(Uuid::new_v4()));
        assert_eq!(account.current_profile, Some(known));
    }

    #[test]
    fn test_file_round_trip() {
        let (_dir, store, paths) = fixture();
        let mut account = Account {
            profiles: vec![profile("kweebec", &["patchline:release"])],
            ..Account::default()
        };
        let uuid = account.profiles[0].uuid;
        account.select_profile(uuid);
        account.patchlines.insert(
            "release".to_string(),
            PatchlineInfo {
                newest_build: 42,
                flags: vec![],
            },
        );
        account.write_file(&store, &paths).unwrap();

        let loaded = Account::read_file(&store, &paths).unwrap();
        assert_eq!(loaded, account);
    }

    #[test]
    fn test_missing_account_is_not_found() {
        let (_dir, store, paths) = fixture();
        assert!(Account::read_file(&store, &paths).unwrap_err().is_not_found());
    }

    #[test]
    fn test_token_expiry_margin() {
        let token = Token {
            access_token: "at".to_string(),
            refresh_token: "rt".to_string(),
            expiry: Utc::now() + chrono::Duration::seconds(30),
        };
        assert!(!token.is_expired(chrono::Duration::zero()));
        assert!(token.is_expired(chrono::Duration::minutes(5)));
    }
}
