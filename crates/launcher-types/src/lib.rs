//! # Launcher Types
//!
//! Shared entities used across the launcher subsystems: release channels,
//! the install platform, build identity, and the update item/event/
//! notification payloads exchanged with the UI bridge.
//!
//! This crate is dependency-light on purpose; every other workspace member
//! sits on top of it.

#![warn(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod build;
pub mod channel;
pub mod platform;
pub mod update;

pub use build::BuildInfo;
pub use channel::{Channel, ChannelParseError};
pub use platform::Platform;
pub use update::{PackageId, UpdateEvent, UpdateItem, UpdateNotification};
