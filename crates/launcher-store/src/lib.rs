//! # Launcher Store
//!
//! Everything the launcher keeps on disk, and the machinery to keep it
//! there safely:
//!
//! - [`paths`]: the storage root and the per-channel / per-package
//!   directory scheme under it.
//! - [`keyring`]: the platform secret store behind a small trait,
//!   yielding the 32-byte key the blob store encrypts with.
//! - [`blob`]: length-prefixed encrypted files (`'E'` marker, GCM nonce,
//!   AEAD ciphertext) with a plaintext passthrough for legacy files and
//!   dev builds.
//! - [`state`]: the per-channel [`AppState`](state::AppState) record of
//!   installed dependencies.
//! - [`account`]: the authenticated account document with profiles,
//!   tokens and entitlements.
//! - [`player`]: the offline name → UUIDv5 map (plaintext by design, so
//!   external tools can inspect it).

#![warn(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod account;
pub mod blob;
pub mod error;
pub mod keyring;
pub mod paths;
pub mod player;
pub mod state;

pub use account::{Account, PatchlineInfo, Profile, Token};
pub use blob::BlobStore;
pub use error::StoreError;
pub use keyring::{Keyring, MemorySecretStore, SecretStore};
pub use paths::Paths;
pub use player::PlayerProfiles;
pub use state::{AppState, Dependency, LKG_DEP};
