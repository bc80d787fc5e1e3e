//! # Launcher Net
//!
//! Outbound HTTP for the launcher:
//!
//! - [`mode`]: the online/offline switch and the startup connectivity
//!   probe.
//! - [`endpoints`]: URL construction for the publisher services.
//! - [`fetch`]: the identified HTTP client (user-agent + launcher
//!   headers) and typed JSON GET.
//! - [`download`]: streaming downloads into the cache directory with
//!   speed estimation, hash verification and cancellation.
//! - [`auth`]: the auth controller: account lifecycle plus the
//!   refresh-on-use token source.
//! - [`news`]: the time-bounded news feed cache.

#![warn(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod auth;
pub mod download;
pub mod endpoints;
pub mod error;
pub mod fetch;
pub mod mode;
pub mod news;

pub use auth::AuthController;
pub use download::{DownloadProgress, ProgressFn};
pub use endpoints::Endpoints;
pub use error::FetchError;
pub use fetch::Fetcher;
pub use mode::{NetMode, NetworkMode};
pub use news::{Article, NewsCache};
