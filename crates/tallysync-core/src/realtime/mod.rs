// ── Subscription manager ──
//
// Owns at most one open change-feed channel per watched table. Each
// notification invalidates the table's cache kinds and only then
// announces the change on the bus, so any refresh triggered by the
// announcement reads a cleared cache. Recovery (teardown, full cache
// resync, cool-down, re-subscribe, global refresh) is serialized by
// `ReconnectGuard`.

mod reconnect;

pub use reconnect::ReconnectPhase;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tokio::sync::{Mutex, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::bus::{BusEvent, DomainEvent, EventBus, Severity};
use crate::config::RealtimeConfig;
use crate::feed::{ChangeFeed, ChangeHandler, ChannelHandle};
use crate::model::ChangeEvent;
use crate::routing::{RoutingTable, TableRoute};
use crate::store::CacheStore;

use self::reconnect::{ReconnectGuard, ReconnectPermit};

const EMERGENCY_MESSAGE: &str =
    "Live updates were stopped after repeated connection failures. Reload to resume.";

// ── Outcomes ─────────────────────────────────────────────────────────

/// Result of a reconnect request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectOutcome {
    /// A full cycle ran; `channels` are open afterwards.
    Completed { channels: usize },
    /// Another cycle holds the guard; this request did nothing.
    AlreadyReconnecting,
    /// Realtime is disabled; nothing was attempted.
    Disabled,
}

impl ReconnectOutcome {
    pub fn is_completed(self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Result of [`SubscriptionManager::check_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCheck {
    /// Sampled too recently; nothing was inspected.
    Debounced,
    Disabled,
    Healthy { channels: usize },
    /// Some but not all channels failed. No reconnect is attempted; the
    /// failed tables stay stale until a full outage or staleness check.
    Degraded { failed: usize, total: usize },
    Reconnected(ReconnectOutcome),
}

// ── SubscriptionManager ──────────────────────────────────────────────

/// Cheaply cloneable handle; clones share the same channels and guard.
#[derive(Clone)]
pub struct SubscriptionManager {
    inner: Arc<RealtimeInner>,
}

struct RealtimeInner {
    feed: Arc<dyn ChangeFeed>,
    cache: CacheStore,
    bus: EventBus,
    routing: Arc<RoutingTable>,
    config: RealtimeConfig,
    /// Open channels keyed by table name.
    subscriptions: Mutex<BTreeMap<String, ChannelHandle>>,
    guard: ReconnectGuard,
    disabled: AtomicBool,
    last_status_check: watch::Sender<Option<Instant>>,
}

impl SubscriptionManager {
    pub fn new(
        feed: Arc<dyn ChangeFeed>,
        cache: CacheStore,
        bus: EventBus,
        routing: Arc<RoutingTable>,
        config: RealtimeConfig,
    ) -> Self {
        let (last_status_check, _) = watch::channel(None);
        Self {
            inner: Arc::new(RealtimeInner {
                feed,
                cache,
                bus,
                routing,
                config,
                subscriptions: Mutex::new(BTreeMap::new()),
                guard: ReconnectGuard::new(),
                disabled: AtomicBool::new(false),
                last_status_check,
            }),
        }
    }

    // ── Channel lifecycle ────────────────────────────────────────────

    /// Open one channel per watched table.
    ///
    /// No-op when realtime is disabled or any channel is already open.
    /// Returns the number of channels opened by this call; tables whose
    /// channel fails to open are logged and left to the status check.
    pub async fn setup_subscriptions(&self) -> usize {
        if self.is_disabled() {
            debug!("realtime disabled, not subscribing");
            return 0;
        }

        let mut subscriptions = self.inner.subscriptions.lock().await;
        if !subscriptions.is_empty() {
            debug!(open = subscriptions.len(), "subscriptions already open");
            return 0;
        }
        if self.is_disabled() {
            return 0;
        }

        for (table, route) in self.inner.routing.tables() {
            let handler = self.change_handler(table, route.clone());
            match self.inner.feed.subscribe(table, handler).await {
                Ok(handle) => {
                    debug!(table, channel = %handle.id(), "channel opened");
                    subscriptions.insert(table.to_owned(), handle);
                }
                Err(e) => warn!(table, error = %e, "failed to open channel"),
            }
        }

        info!(open = subscriptions.len(), "realtime subscriptions opened");
        subscriptions.len()
    }

    /// Close every open channel. Safe with nothing open. Returns the
    /// number of channels closed.
    pub async fn teardown(&self) -> usize {
        let mut subscriptions = self.inner.subscriptions.lock().await;
        let handles = std::mem::take(&mut *subscriptions);
        let count = handles.len();

        for (table, handle) in handles {
            if let Err(e) = self.inner.feed.unsubscribe(handle).await {
                warn!(table = %table, error = %e, "unsubscribe failed");
            }
        }

        if count > 0 {
            info!(closed = count, "realtime subscriptions closed");
        }
        count
    }

    fn change_handler(&self, table: &str, route: TableRoute) -> ChangeHandler {
        let cache = self.inner.cache.clone();
        let bus = self.inner.bus.clone();
        let table = table.to_owned();

        Arc::new(move |change: ChangeEvent| {
            debug!(table = %table, change = %change.change_type, "change notification");

            // Invalidate before announcing.
            for kind in &route.kinds {
                cache.invalidate(*kind);
            }

            let change = Arc::new(change);
            let at = Utc::now();
            for kind in &route.kinds {
                bus.publish(BusEvent::DataUpdated {
                    kind: *kind,
                    change: Arc::clone(&change),
                    at,
                });
            }
            bus.publish(BusEvent::Domain(DomainEvent::from_change(
                route.event.clone(),
                change,
            )));
        })
    }

    // ── Recovery ─────────────────────────────────────────────────────

    /// Tear down, resync the whole cache, cool down, and re-subscribe.
    /// A completed cycle ends with a global refresh request on the bus.
    ///
    /// A no-op while another cycle is running.
    pub async fn resubscribe(&self) -> ReconnectOutcome {
        if self.is_disabled() {
            return ReconnectOutcome::Disabled;
        }
        let Some(permit) = self.inner.guard.try_acquire() else {
            debug!("reconnect already in progress, ignoring resubscribe");
            return ReconnectOutcome::AlreadyReconnecting;
        };
        self.run_cycle(permit).await
    }

    /// Public recovery entry point. Takes the guard, waits a short
    /// pre-delay so bursts of triggers collapse, then runs one cycle.
    pub async fn force_reconnect(&self) -> ReconnectOutcome {
        if self.is_disabled() {
            debug!("realtime disabled, ignoring forced reconnect");
            return ReconnectOutcome::Disabled;
        }
        let Some(permit) = self.inner.guard.try_acquire() else {
            debug!("reconnect already in progress, ignoring forced reconnect");
            return ReconnectOutcome::AlreadyReconnecting;
        };

        info!("forcing realtime reconnect");
        tokio::time::sleep(self.inner.config.force_reconnect_delay).await;
        self.run_cycle(permit).await
    }

    async fn run_cycle(&self, permit: ReconnectPermit) -> ReconnectOutcome {
        info!(cool_down = ?self.inner.config.cool_down, "reconnect cycle started");

        let closed = self.teardown().await;
        // Invalidations missed while disconnected are unrecoverable.
        self.inner.cache.clear();

        tokio::time::sleep(self.inner.config.cool_down).await;

        if self.is_disabled() {
            info!("realtime disabled during cool-down, not re-subscribing");
            drop(permit);
            return ReconnectOutcome::Disabled;
        }

        self.setup_subscriptions().await;
        let channels = self.subscription_count().await;
        drop(permit);

        // The cache is empty, so every view refetches on this.
        self.inner.bus.publish(BusEvent::GlobalRefreshRequested);

        info!(closed, channels, "reconnect cycle finished");
        ReconnectOutcome::Completed { channels }
    }

    /// Operator override: stop realtime and close every channel.
    pub async fn disable(&self) -> usize {
        self.inner.disabled.store(true, Ordering::SeqCst);
        info!("realtime disabled");
        self.teardown().await
    }

    /// Lift the override and re-open channels.
    pub async fn enable(&self) -> usize {
        self.inner.disabled.store(false, Ordering::SeqCst);
        info!("realtime enabled");
        self.setup_subscriptions().await
    }

    /// Terminal recovery path. Releases the guard, disables realtime,
    /// closes every channel, drops the transport, and clears the cache.
    /// Nothing re-enables realtime automatically.
    pub async fn emergency_cleanup(&self) {
        warn!("realtime emergency cleanup");
        self.inner.guard.force_release();
        self.inner.disabled.store(true, Ordering::SeqCst);

        self.teardown().await;
        if let Err(e) = self.inner.feed.disconnect().await {
            warn!(error = %e, "transport disconnect failed during emergency cleanup");
        }
        self.inner.cache.clear();

        self.inner.bus.publish(BusEvent::Toast {
            message: EMERGENCY_MESSAGE.to_owned(),
            severity: Severity::Warning,
        });
    }

    // ── Status sampling ──────────────────────────────────────────────

    /// Sample channel health, at most once per `status_check_interval`.
    ///
    /// Forces a reconnect when every open channel has failed, or when
    /// nothing is open and the transport reports disconnected.
    pub async fn check_status(&self) -> StatusCheck {
        if self.is_disabled() {
            return StatusCheck::Disabled;
        }

        let now = Instant::now();
        let interval = self.inner.config.status_check_interval;
        let due = self.inner.last_status_check.send_if_modified(|last| match last {
            Some(previous) if now.duration_since(*previous) < interval => false,
            _ => {
                *last = Some(now);
                true
            }
        });
        if !due {
            return StatusCheck::Debounced;
        }

        let (total, failed) = {
            let subscriptions = self.inner.subscriptions.lock().await;
            let failed = subscriptions
                .values()
                .filter(|handle| handle.status().is_failed())
                .count();
            (subscriptions.len(), failed)
        };

        if total == 0 {
            if self.inner.feed.is_connected() {
                return StatusCheck::Healthy { channels: 0 };
            }
            warn!("no channels open and transport disconnected");
            return StatusCheck::Reconnected(self.force_reconnect().await);
        }

        if failed == total {
            warn!(failed, "every channel failed");
            return StatusCheck::Reconnected(self.force_reconnect().await);
        }

        if failed > 0 {
            warn!(failed, total, "some channels failed, tolerating");
            return StatusCheck::Degraded { failed, total };
        }

        debug!(channels = total, "channels healthy");
        StatusCheck::Healthy { channels: total }
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// Observe the reconnect phase.
    pub fn phase(&self) -> watch::Receiver<ReconnectPhase> {
        self.inner.guard.subscribe()
    }

    pub fn is_reconnecting(&self) -> bool {
        self.inner.guard.current().is_reconnecting()
    }

    pub fn is_disabled(&self) -> bool {
        self.inner.disabled.load(Ordering::SeqCst)
    }

    /// Tables with an open channel, in name order.
    pub async fn open_tables(&self) -> Vec<String> {
        self.inner.subscriptions.lock().await.keys().cloned().collect()
    }

    pub async fn subscription_count(&self) -> usize {
        self.inner.subscriptions.lock().await.len()
    }
}
