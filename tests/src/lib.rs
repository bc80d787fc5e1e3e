//! # Hytale Launcher Test Suite
//!
//! Cross-subsystem integration tests:
//! - **integration/update_flows**: full plan/apply runs against a local
//!   fixture publisher: fresh install, no-patch, cancellation, rollback.
//! - **integration/state_flows**: state lifecycle across platform
//!   mismatches and resets.
//! - **integration/launch_flows**: launch guards, offline identity and
//!   server supervision.

#![allow(dead_code)]

pub mod integration;
pub mod support;
