//! Offline player profiles.
//!
//! A deterministic name → UUID map for offline launches. UUIDs are v5 over
//! the DNS namespace, so the same name resolves to the same identifier on
//! every install. The file is plaintext JSON on purpose: external tools
//! inspect it.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::paths::Paths;

/// One offline profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    /// Player name as entered.
    pub name: String,
    /// UUIDv5 of the name over the DNS namespace.
    pub uuid: Uuid,
    /// When this profile was first created.
    pub created_at: DateTime<Utc>,
}

/// The offline profile map plus the last-used name.
pub struct PlayerProfiles {
    profiles: BTreeMap<String, PlayerProfile>,
    profiles_file: PathBuf,
    name_file: PathBuf,
}

impl PlayerProfiles {
    /// Load `player_profiles.json`, tolerating absence.
    pub fn load(paths: &Paths) -> Result<PlayerProfiles, StoreError> {
        let profiles_file = paths.player_profiles_file();
        let profiles = match std::fs::read(&profiles_file) {
            Ok(data) => serde_json::from_slice(&data).map_err(|e| {
                StoreError::integrity(&profiles_file, format!("undecodable profiles: {e}"))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(PlayerProfiles {
            profiles,
            profiles_file,
            name_file: paths.player_name_file(),
        })
    }

    /// The deterministic UUID for `name`.
    pub fn uuid_for(name: &str) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_DNS, name.as_bytes())
    }

    /// Fetch the profile for `name`, creating and persisting it on first use.
    pub fn get_or_create(&mut self, name: &str) -> Result<PlayerProfile, StoreError> {
        if let Some(existing) = self.profiles.get(name) {
            return Ok(existing.clone());
        }

        let profile = PlayerProfile {
            name: name.to_string(),
            uuid: Self::uuid_for(name),
            created_at: Utc::now(),
        };
        self.profiles.insert(name.to_string(), profile.clone());
        self.save()?;
        Ok(profile)
    }

    /// The stored profile for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&PlayerProfile> {
        self.profiles.get(name)
    }

    /// All stored profiles.
    pub fn list(&self) -> impl Iterator<Item = &PlayerProfile> {
        self.profiles.values()
    }

    /// Remove the profile for `name` and persist the map.
    pub fn delete(&mut self, name: &str) -> Result<(), StoreError> {
        self.profiles.remove(name);
        self.save()
    }

    /// The last offline player name, from `player.txt`.
    pub fn last_player_name(&self) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(&self.name_file) {
            Ok(raw) => {
                let name = raw.trim().to_string();
                Ok(if name.is_empty() { None } else { Some(name) })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remember `name` as the last offline player.
    pub fn set_last_player_name(&self, name: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.name_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.name_file, format!("{name}\n"))?;
        Ok(())
    }

    fn save(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.profiles_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(&self.profiles).map_err(|e| {
            StoreError::integrity(&self.profiles_file, format!("unserializable profiles: {e}"))
        })?;
        std::fs::write(&self.profiles_file, data)?;
        Ok(())
    }
}
