//! # Launcher Launch
//!
//! Process spawning for the two launch shapes the launcher supports:
//!
//! - [`client`]: compose argv and environment for the game client and
//!   spawn it detached.
//! - [`server`]: run a local server under supervision: captured output,
//!   a readiness watchdog and lifecycle events.
//! - [`session`]: the short-lived game session tokens consulted at
//!   launch time.

#![warn(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod client;
pub mod error;
pub mod server;
pub mod session;

pub use client::{ClientLaunch, LaunchAuth};
pub use error::LaunchError;
pub use server::{ServerLaunch, ServerSupervisor};
pub use session::GameSession;
