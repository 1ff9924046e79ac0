//! TTL-expiring flags shared by the router and the reconciler.
//!
//! Two flags exist: [`PRIMARY_DOWN`] is the open-circuit marker and
//! [`SYNC_IN_PROGRESS`] is the reconciliation lock. Both auto-expire so
//! a crashed holder can never wedge the system — the original design's
//! cache-TTL semantics, kept as the sole release path besides an
//! explicit clear.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::domain::Clock;

/// Circuit-breaker flag: while set, every operation routes to the mirror.
pub const PRIMARY_DOWN: &str = "primary_down";

/// Reconciliation lock: while set, no new sync run may start.
pub const SYNC_IN_PROGRESS: &str = "sync_in_progress";

/// Store of named flags with per-flag expiry deadlines.
///
/// Cheap to clone; all clones share the same state. Reads purge expired
/// entries lazily, so an expired flag behaves exactly like an absent one.
#[derive(Debug, Clone)]
pub struct FlagStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    clock: Arc<dyn Clock>,
    deadlines: Mutex<HashMap<&'static str, Instant>>,
}

impl FlagStore {
    /// Creates an empty store measuring expiry against `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                clock,
                deadlines: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Sets (or refreshes) a flag for `ttl` from now.
    pub fn set(&self, key: &'static str, ttl: Duration) {
        let deadline = self.inner.clock.now() + ttl;
        self.lock().insert(key, deadline);
    }

    /// Returns whether the flag is set and unexpired.
    pub fn is_set(&self, key: &'static str) -> bool {
        let now = self.inner.clock.now();
        let mut deadlines = self.lock();
        match deadlines.get(key) {
            Some(deadline) if *deadline > now => true,
            Some(_) => {
                deadlines.remove(key);
                false
            }
            None => false,
        }
    }

    /// Removes the flag if present.
    pub fn clear(&self, key: &'static str) {
        self.lock().remove(key);
    }

    /// Sets the flag only if it is absent or expired.
    ///
    /// Returns `true` when this caller acquired it. This is the
    /// at-most-one-run guard for reconciliation.
    pub fn try_acquire(&self, key: &'static str, ttl: Duration) -> bool {
        let now = self.inner.clock.now();
        let mut deadlines = self.lock();
        if let Some(deadline) = deadlines.get(key)
            && *deadline > now
        {
            return false;
        }
        deadlines.insert(key, now + ttl);
        true
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<&'static str, Instant>> {
        self.inner
            .deadlines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::ManualClock;

    fn store_with_clock() -> (FlagStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let store = FlagStore::new(Arc::clone(&clock) as Arc<dyn Clock>);
        (store, clock)
    }

    #[test]
    fn flag_expires_after_ttl() {
        let (store, clock) = store_with_clock();
        store.set(PRIMARY_DOWN, Duration::from_secs(120));

        assert!(store.is_set(PRIMARY_DOWN));
        clock.advance(Duration::from_secs(119));
        assert!(store.is_set(PRIMARY_DOWN));
        clock.advance(Duration::from_secs(2));
        assert!(!store.is_set(PRIMARY_DOWN));
    }

    #[test]
    fn clear_removes_immediately() {
        let (store, _clock) = store_with_clock();
        store.set(PRIMARY_DOWN, Duration::from_secs(120));
        store.clear(PRIMARY_DOWN);
        assert!(!store.is_set(PRIMARY_DOWN));
    }

    #[test]
    fn try_acquire_is_exclusive_until_expiry() {
        let (store, clock) = store_with_clock();

        assert!(store.try_acquire(SYNC_IN_PROGRESS, Duration::from_secs(600)));
        assert!(!store.try_acquire(SYNC_IN_PROGRESS, Duration::from_secs(600)));

        clock.advance(Duration::from_secs(601));
        assert!(store.try_acquire(SYNC_IN_PROGRESS, Duration::from_secs(600)));
    }

    #[test]
    fn clones_share_state() {
        let (store, _clock) = store_with_clock();
        let other = store.clone();
        store.set(PRIMARY_DOWN, Duration::from_secs(60));
        assert!(other.is_set(PRIMARY_DOWN));
    }
}
