//! # Launcher Update
//!
//! The update and state orchestration engine:
//!
//! - [`extract`]: safe zip / tar.gz extraction with rename transforms and
//!   path-escape rejection.
//! - [`sig`]: the signature document (relative path → SHA-256) validating
//!   a completed install.
//! - [`wharf`]: the binary patch applier: staged apply, verify, atomic
//!   swap, rollback, crash restore.
//! - [`repair`]: classify a tree against a signature, repair single
//!   files, remove orphans.
//! - [`manifest`]: component manifests and patchline info, cached until
//!   explicitly invalidated.
//! - [`planner`]: per-package update checks producing an ordered plan.
//! - [`executor`]: runs the plan with progress, cancellation, LKG
//!   demotion and verify-after-apply.
//! - [`selfupdate`]: the cleanup note removing the previous launcher
//!   install on the next start.
//! - [`scan`]: installed-build discovery, uninstall and user-data
//!   deletion with progress.

#![warn(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod executor;
pub mod extract;
pub mod manifest;
pub mod planner;
pub mod repair;
pub mod scan;
pub mod selfupdate;
pub mod sig;
pub mod testing;
pub mod wharf;

pub use error::UpdateError;
pub use executor::UpdateExecutor;
pub use manifest::{ComponentManifest, JavaManifest, LauncherData, ManifestCache};
pub use planner::UpdatePlan;
pub use repair::VerifyReport;
pub use sig::Signature;
