// ── Reconnection guard ──
//
// An explicit Idle/Reconnecting state machine held in a `watch` channel.
// Acquisition is a single atomic check-and-set, so two callers can never
// both enter a recovery cycle regardless of where they await. The permit
// releases on drop, but only if it still owns the current generation: an
// emergency `force_release` followed by a new acquisition is not undone
// by a stale permit finishing late.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use strum::Display;
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ReconnectPhase {
    Idle,
    Reconnecting { generation: u64 },
}

impl ReconnectPhase {
    pub fn is_reconnecting(self) -> bool {
        matches!(self, Self::Reconnecting { .. })
    }
}

#[derive(Debug)]
pub(crate) struct ReconnectGuard {
    phase: Arc<watch::Sender<ReconnectPhase>>,
    next_generation: AtomicU64,
}

impl ReconnectGuard {
    pub(crate) fn new() -> Self {
        let (phase, _) = watch::channel(ReconnectPhase::Idle);
        Self {
            phase: Arc::new(phase),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Enter the reconnecting phase. `None` if a cycle is already running.
    pub(crate) fn try_acquire(&self) -> Option<ReconnectPermit> {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let acquired = self.phase.send_if_modified(|phase| {
            if phase.is_reconnecting() {
                return false;
            }
            *phase = ReconnectPhase::Reconnecting { generation };
            true
        });

        acquired.then(|| ReconnectPermit {
            phase: Arc::clone(&self.phase),
            generation,
        })
    }

    /// Return to idle regardless of who holds the permit.
    pub(crate) fn force_release(&self) {
        let previous = self.phase.send_replace(ReconnectPhase::Idle);
        if previous.is_reconnecting() {
            debug!(?previous, "reconnect guard forcibly released");
        }
    }

    pub(crate) fn current(&self) -> ReconnectPhase {
        *self.phase.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ReconnectPhase> {
        self.phase.subscribe()
    }
}

/// Proof of holding the reconnect guard. Releases it on drop.
#[derive(Debug)]
pub(crate) struct ReconnectPermit {
    phase: Arc<watch::Sender<ReconnectPhase>>,
    generation: u64,
}

impl Drop for ReconnectPermit {
    fn drop(&mut self) {
        let generation = self.generation;
        self.phase.send_if_modified(|phase| {
            if *phase == (ReconnectPhase::Reconnecting { generation }) {
                *phase = ReconnectPhase::Idle;
                true
            } else {
                false
            }
        });
    }
}
