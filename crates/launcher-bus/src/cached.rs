//! Cached value slot.

use std::time::{Duration, Instant};

use parking_lot::RwLock;

struct Slot<T> {
    value: Option<T>,
    updated_at: Option<Instant>,
    error: Option<String>,
}

/// A thread-safe cache slot for the result of an expensive fetch.
///
/// Stores the value, the time of the last update and the error from the
/// last failed attempt. Consumers decide staleness with [`is_fresh`]
/// (time-bounded caches such as the news feed) or reset the slot outright
/// with [`invalidate`] (the version manifests, refreshed on demand).
///
/// [`is_fresh`]: CachedState::is_fresh
/// [`invalidate`]: CachedState::invalidate
pub struct CachedState<T> {
    slot: RwLock<Slot<T>>,
}

impl<T: Clone> CachedState<T> {
    /// An empty slot.
    pub fn new() -> CachedState<T> {
        CachedState {
            slot: RwLock::new(Slot {
                value: None,
                updated_at: None,
                error: None,
            }),
        }
    }

    /// The cached value, if a successful update has happened.
    pub fn get(&self) -> Option<T> {
        self.slot.read().value.clone()
    }

    /// Store a fresh value and clear any previous error.
    pub fn set(&self, value: T) {
        let mut slot = self.slot.write();
        slot.value = Some(value);
        slot.updated_at = Some(Instant::now());
        slot.error = None;
    }

    /// Record a failed update. The previous value is preserved.
    pub fn set_error(&self, error: impl ToString) {
        let mut slot = self.slot.write();
        slot.updated_at = Some(Instant::now());
        slot.error = Some(error.to_string());
    }

    /// The error from the last attempt, if it failed.
    pub fn error(&self) -> Option<String> {
        self.slot.read().error.clone()
    }

    /// Whether a value is present and was updated within `ttl`.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        let slot = self.slot.read();
        match (&slot.value, slot.updated_at) {
            (Some(_), Some(at)) => at.elapsed() < ttl,
            _ => false,
        }
    }

    /// Drop the value, timestamp and error, forcing the next access to fetch.
    pub fn invalidate(&self) {
        let mut slot = self.slot.write();
        slot.value = None;
        slot.updated_at = None;
        slot.error = None;
    }
}

impl<T: Clone> Default for CachedState<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_slot() {
        let cache: CachedState<u32> = CachedState::new();
        assert_eq!(cache.get(), None);
        assert!(!cache.is_fresh(Duration::from_secs(60)));
        assert_eq!(cache.error(), None);
    }

    #[test]
    fn test_set_then_get() {
        let cache = CachedState::new();
        cache.set(vec!["a".to_string()]);
        assert_eq!(cache.get(), Some(vec!["a".to_string()]));
        assert!(cache.is_fresh(Duration::from_secs(60)));
    }

    #[test]
    fn test_error_preserves_value() {
        let cache = CachedState::new();
        cache.set(7u32);
        cache.set_error("fetch failed");
        assert_eq!(cache.get(), Some(7));
        assert_eq!(cache.error().as_deref(), Some("fetch failed"));
    }

    #[test]
    fn test_set_clears_error() {
        let cache = CachedState::new();
        cache.set_error("boom");
        cache.set(1u32);
        assert_eq!(cache.error(), None);
    }

    #[test]
    fn test_invalidate_empties_slot() {
        let cache = CachedState::new();
        cache.set(1u32);
        cache.invalidate();
        assert_eq!(cache.get(), None);
        assert!(!cache.is_fresh(Duration::from_secs(60)));
    }

    #[test]
    fn test_zero_ttl_is_never_fresh() {
        let cache = CachedState::new();
        cache.set(1u32);
        assert!(!cache.is_fresh(Duration::ZERO));
    }
}
