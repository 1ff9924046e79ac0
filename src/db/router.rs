//! Circuit-breaker routing between the primary and mirror databases.
//!
//! Every data-layer operation asks [`FailoverRouter::select_database`]
//! which replica to use. The decision is cheap-path optimized: an open
//! circuit short-circuits to the mirror, a sub-second memo absorbs
//! request bursts, and only the cold path actually dials the primary.
//! Selection is infallible — a probe failure opens the circuit, it never
//! propagates.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use super::flags::{self, FlagStore};
use super::handle::{DbHandle, OperationKind};
use super::probe::ConnectionProbe;
use crate::domain::Clock;

/// Tunables for the router, all sourced from configuration.
#[derive(Debug, Clone, Copy)]
pub struct RouterSettings {
    /// How long the circuit stays open after a failed probe.
    pub circuit_ttl: Duration,
    /// How long a successful decision is memoized before re-probing.
    pub memo_ttl: Duration,
}

/// Last routing decision, memoized per process.
#[derive(Debug, Default, Clone, Copy)]
struct Memo {
    handle: Option<DbHandle>,
    decided_at: Option<Instant>,
}

/// Chooses the database handle for every read and write.
///
/// State is explicit: the cross-request circuit lives in the shared
/// [`FlagStore`], the intra-request memo in a private mutex, and time
/// comes from an injected [`Clock`].
#[derive(Debug)]
pub struct FailoverRouter {
    settings: RouterSettings,
    flags: FlagStore,
    probe: Arc<dyn ConnectionProbe>,
    clock: Arc<dyn Clock>,
    memo: Mutex<Memo>,
    recovery_tx: Option<mpsc::UnboundedSender<()>>,
}

impl FailoverRouter {
    /// Creates a router.
    ///
    /// `recovery_tx`, when present, receives one message per recovery
    /// edge (primary reachable again after a mirror period); the sync
    /// supervisor listens on the other end.
    #[must_use]
    pub fn new(
        settings: RouterSettings,
        flags: FlagStore,
        probe: Arc<dyn ConnectionProbe>,
        clock: Arc<dyn Clock>,
        recovery_tx: Option<mpsc::UnboundedSender<()>>,
    ) -> Self {
        Self {
            settings,
            flags,
            probe,
            clock,
            memo: Mutex::new(Memo::default()),
            recovery_tx,
        }
    }

    /// Returns whether the circuit is currently open.
    #[must_use]
    pub fn circuit_open(&self) -> bool {
        self.flags.is_set(flags::PRIMARY_DOWN)
    }

    /// Picks the database handle for one operation.
    ///
    /// Never fails: every probe error is absorbed into the circuit state
    /// and answered with [`DbHandle::Mirror`].
    pub async fn select_database(&self, _kind: OperationKind) -> DbHandle {
        // Open circuit: mirror, no probing, no waiting.
        if self.flags.is_set(flags::PRIMARY_DOWN) {
            let previous = self.replace_handle(DbHandle::Mirror);
            if previous != Some(DbHandle::Mirror) {
                tracing::warn!(handle = %DbHandle::Mirror, "circuit open, routing to mirror");
            }
            return DbHandle::Mirror;
        }

        // Fresh memo: reuse the last decision within the burst window.
        let now = self.clock.now();
        if let Some(handle) = self.fresh_memo(now) {
            return handle;
        }

        match self.probe.check().await {
            Ok(()) => {
                let previous = self.remember(DbHandle::Primary, now);
                if previous == Some(DbHandle::Mirror) {
                    tracing::info!(handle = %DbHandle::Primary, "primary connection re-established");
                    self.trigger_reconciliation();
                }
                DbHandle::Primary
            }
            Err(err) => {
                tracing::error!(
                    kind = err.kind_str(),
                    error = %err,
                    retry_after_secs = self.settings.circuit_ttl.as_secs(),
                    "primary unreachable, opening circuit"
                );
                self.flags.set(flags::PRIMARY_DOWN, self.settings.circuit_ttl);
                self.remember(DbHandle::Mirror, now);
                DbHandle::Mirror
            }
        }
    }

    /// Returns the memoized handle if it is younger than the memo TTL.
    fn fresh_memo(&self, now: Instant) -> Option<DbHandle> {
        let memo = self.lock_memo();
        let handle = memo.handle?;
        let decided_at = memo.decided_at?;
        (now.duration_since(decided_at) < self.settings.memo_ttl).then_some(handle)
    }

    /// Records a probed decision; returns the previous handle.
    fn remember(&self, handle: DbHandle, now: Instant) -> Option<DbHandle> {
        let mut memo = self.lock_memo();
        let previous = memo.handle;
        memo.handle = Some(handle);
        memo.decided_at = Some(now);
        previous
    }

    /// Updates only the handle, leaving the memo stale so the next call
    /// after circuit expiry re-probes (the open-circuit path).
    fn replace_handle(&self, handle: DbHandle) -> Option<DbHandle> {
        let mut memo = self.lock_memo();
        memo.handle.replace(handle)
    }

    fn trigger_reconciliation(&self) {
        if let Some(tx) = &self.recovery_tx {
            if tx.send(()).is_err() {
                tracing::warn!("recovery signal dropped, sync supervisor is gone");
            }
        }
    }

    fn lock_memo(&self) -> std::sync::MutexGuard<'_, Memo> {
        self.memo.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::db::probe::ProbeError;
    use crate::domain::ManualClock;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Scripted probe: fails while `down` is set, counts every call.
    #[derive(Debug, Default)]
    struct ScriptedProbe {
        down: AtomicBool,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ConnectionProbe for ScriptedProbe {
        async fn check(&self) -> Result<(), ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.down.load(Ordering::SeqCst) {
                Err(ProbeError::ConnectionRefused("scripted".to_string()))
            } else {
                Ok(())
            }
        }
    }

    struct Fixture {
        router: FailoverRouter,
        probe: Arc<ScriptedProbe>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new());
        let probe = Arc::new(ScriptedProbe::default());
        let flags = FlagStore::new(Arc::clone(&clock) as Arc<dyn Clock>);
        let router = FailoverRouter::new(
            RouterSettings {
                circuit_ttl: Duration::from_secs(120),
                memo_ttl: Duration::from_secs(1),
            },
            flags,
            Arc::clone(&probe) as Arc<dyn ConnectionProbe>,
            Arc::clone(&clock) as Arc<dyn Clock>,
            None,
        );
        Fixture {
            router,
            probe,
            clock,
        }
    }

    #[tokio::test]
    async fn healthy_primary_is_selected() {
        let f = fixture();
        let handle = f.router.select_database(OperationKind::Read).await;
        assert_eq!(handle, DbHandle::Primary);
    }

    #[tokio::test]
    async fn memo_absorbs_bursts_within_a_second() {
        let f = fixture();
        for _ in 0..50 {
            let _ = f.router.select_database(OperationKind::Read).await;
        }
        // One probe for the whole burst; the memo served the rest.
        assert_eq!(f.probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn memo_expires_after_a_second() {
        let f = fixture();
        let _ = f.router.select_database(OperationKind::Read).await;
        f.clock.advance(Duration::from_millis(1100));
        let _ = f.router.select_database(OperationKind::Read).await;
        assert_eq!(f.probe.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn open_circuit_sticks_to_mirror_for_its_ttl() {
        let f = fixture();
        f.probe.down.store(true, Ordering::SeqCst);

        assert_eq!(
            f.router.select_database(OperationKind::Write).await,
            DbHandle::Mirror
        );
        let probes_after_open = f.probe.calls.load(Ordering::SeqCst);

        // Every call inside the 120 s window goes to the mirror without
        // a single new probe, however the calls interleave.
        for i in 0..12 {
            f.clock.advance(Duration::from_secs(9));
            let kind = if i % 2 == 0 {
                OperationKind::Read
            } else {
                OperationKind::Write
            };
            assert_eq!(f.router.select_database(kind).await, DbHandle::Mirror);
        }
        assert_eq!(f.probe.calls.load(Ordering::SeqCst), probes_after_open);
    }

    #[tokio::test]
    async fn circuit_expiry_reprobes_exactly_once() {
        let f = fixture();
        f.probe.down.store(true, Ordering::SeqCst);
        let _ = f.router.select_database(OperationKind::Read).await;

        // Primary comes back while the circuit is still open.
        f.probe.down.store(false, Ordering::SeqCst);
        f.clock.advance(Duration::from_secs(121));

        let before = f.probe.calls.load(Ordering::SeqCst);
        assert_eq!(
            f.router.select_database(OperationKind::Read).await,
            DbHandle::Primary
        );
        assert_eq!(f.probe.calls.load(Ordering::SeqCst), before + 1);

        // Immediately after, the memo answers without re-probing.
        let _ = f.router.select_database(OperationKind::Read).await;
        assert_eq!(f.probe.calls.load(Ordering::SeqCst), before + 1);
    }

    #[tokio::test]
    async fn recovery_edge_sends_exactly_one_signal() {
        let clock = Arc::new(ManualClock::new());
        let probe = Arc::new(ScriptedProbe::default());
        let flags = FlagStore::new(Arc::clone(&clock) as Arc<dyn Clock>);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let router = FailoverRouter::new(
            RouterSettings {
                circuit_ttl: Duration::from_secs(120),
                memo_ttl: Duration::from_secs(1),
            },
            flags,
            Arc::clone(&probe) as Arc<dyn ConnectionProbe>,
            Arc::clone(&clock) as Arc<dyn Clock>,
            Some(tx),
        );

        probe.down.store(true, Ordering::SeqCst);
        let _ = router.select_database(OperationKind::Read).await;

        probe.down.store(false, Ordering::SeqCst);
        clock.advance(Duration::from_secs(121));
        assert_eq!(
            router.select_database(OperationKind::Read).await,
            DbHandle::Primary
        );

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());

        // A healthy re-probe without a preceding mirror period does not
        // signal again.
        clock.advance(Duration::from_secs(2));
        let _ = router.select_database(OperationKind::Read).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_probe_never_propagates() {
        let f = fixture();
        f.probe.down.store(true, Ordering::SeqCst);
        // The call must complete with a handle, not an error.
        let handle = f.router.select_database(OperationKind::Write).await;
        assert_eq!(handle, DbHandle::Mirror);
        assert!(f.router.circuit_open());
    }
}
