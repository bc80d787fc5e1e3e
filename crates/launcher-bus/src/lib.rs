//! # Launcher Bus
//!
//! In-process fan-out of named events and progress notifications to the
//! single external consumer (the embedded web view bridge), plus the two
//! small stateful helpers the update pipeline shares:
//!
//! - [`EventBus`]: `emit`/`notify` delivered synchronously to exactly one
//!   subscriber. Fire-and-forget: the subscriber must not block the caller
//!   beyond a short bounded time.
//! - [`ProgressGate`]: hysteresis filter suppressing sub-1% progress
//!   deltas away from the boundaries.
//! - [`CachedState`]: a thread-safe value slot with update timestamp and
//!   error tracking, used by the manifest and news caches.

#![warn(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod bus;
pub mod cached;
pub mod gate;
pub mod testing;

pub use bus::{EventBus, EventSink};
pub use cached::CachedState;
pub use gate::ProgressGate;
