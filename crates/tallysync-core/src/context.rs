// ── Application context ──
//
// Explicitly constructed owner of the cache, subscription manager,
// health monitor, refresh registry and event bus. Several contexts may
// coexist (one per session, one per test); nothing here is global.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bus::{BusEvent, DomainEvent, EventBus};
use crate::config::SyncConfig;
use crate::feed::ChangeFeed;
use crate::gateway::Gateway;
use crate::health::{HealthMonitor, HealthReport};
use crate::model::DataKind;
use crate::probe::HealthProbe;
use crate::realtime::{ReconnectPhase, SubscriptionManager};
use crate::refresh::{RefreshRegistry, RefreshView, spawn_dispatcher};
use crate::routing::{RoutingTable, ViewId};
use crate::store::{CacheStore, Collection, GroupMap, IdMap};

/// The synchronization layer as seen by UI code.
///
/// Cheaply cloneable; clones share every service.
#[derive(Clone)]
pub struct SyncContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    bus: EventBus,
    routing: Arc<RoutingTable>,
    cache: CacheStore,
    realtime: SubscriptionManager,
    health: HealthMonitor,
    registry: RefreshRegistry,
    dispatcher: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl SyncContext {
    pub fn new(
        config: SyncConfig,
        gateway: Arc<dyn Gateway>,
        feed: Arc<dyn ChangeFeed>,
        probe: Arc<dyn HealthProbe>,
    ) -> Self {
        let bus = EventBus::new(config.bus_capacity);
        let routing = Arc::new(config.routing);
        let cache = CacheStore::new(gateway);
        let realtime = SubscriptionManager::new(
            feed,
            cache.clone(),
            bus.clone(),
            Arc::clone(&routing),
            config.realtime,
        );
        let health = HealthMonitor::new(realtime.clone(), probe, bus.clone(), config.health);
        let registry = RefreshRegistry::new(Arc::clone(&routing));

        Self {
            inner: Arc::new(ContextInner {
                bus,
                routing,
                cache,
                realtime,
                health,
                registry,
                dispatcher: Mutex::new(None),
            }),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start dispatching bus events to views, open the change channels,
    /// and start health monitoring. Idempotent.
    pub async fn start(&self) {
        {
            let mut dispatcher = self.inner.dispatcher.lock().await;
            if dispatcher.is_none() {
                let cancel = CancellationToken::new();
                let handle =
                    spawn_dispatcher(self.inner.registry.clone(), &self.inner.bus, cancel.clone());
                *dispatcher = Some((cancel, handle));
            }
        }

        let opened = self.inner.realtime.setup_subscriptions().await;
        self.inner.health.start_monitoring().await;
        info!(opened, "sync context started");
    }

    /// Stop monitoring, close every channel, and stop the dispatcher.
    pub async fn shutdown(&self) {
        self.inner.health.stop_monitoring().await;
        self.inner.realtime.teardown().await;

        let dispatcher = self.inner.dispatcher.lock().await.take();
        if let Some((cancel, handle)) = dispatcher {
            cancel.cancel();
            if let Err(e) = handle.await {
                warn!(error = %e, "refresh dispatcher ended abnormally");
            }
        }
        info!("sync context shut down");
    }

    // ── Cache ────────────────────────────────────────────────────────

    pub async fn get(&self, kind: DataKind) -> Collection {
        self.inner.cache.get(kind).await
    }

    pub async fn get_map(&self, kind: DataKind) -> IdMap {
        self.inner.cache.get_map(kind).await
    }

    pub async fn get_grouped(&self, kind: DataKind, field: &str) -> GroupMap {
        self.inner.cache.get_grouped(kind, field).await
    }

    pub fn invalidate(&self, kind: DataKind) {
        self.inner.cache.invalidate(kind);
    }

    // ── Views ────────────────────────────────────────────────────────

    pub fn register(&self, id: impl Into<ViewId>, view: Arc<dyn RefreshView>) -> bool {
        self.inner.registry.register(id, view)
    }

    pub fn unregister(&self, id: &str) -> bool {
        self.inner.registry.unregister(id)
    }

    /// Announce a UI-originated business event such as
    /// `transaction_validated`. Routed like feed-derived events.
    pub fn publish_business_event(&self, name: impl Into<String>) {
        let event = DomainEvent::business(name);
        // Mirror the feed path: the kinds go stale before views hear of it.
        for kind in self.inner.routing.kinds_for_event(&event.name) {
            self.inner.cache.invalidate(*kind);
        }
        self.inner.bus.publish(BusEvent::Domain(event));
    }

    pub fn request_global_refresh(&self) {
        self.inner.bus.publish(BusEvent::GlobalRefreshRequested);
    }

    // ── Health and realtime ──────────────────────────────────────────

    pub fn mark_data_update(&self) {
        self.inner.health.mark_data_update();
    }

    pub async fn force_health_check(&self) -> HealthReport {
        self.inner.health.force_health_check().await
    }

    pub async fn disable_realtime(&self) -> usize {
        self.inner.realtime.disable().await
    }

    pub async fn enable_realtime(&self) -> usize {
        self.inner.realtime.enable().await
    }

    pub async fn emergency_cleanup(&self) {
        self.inner.realtime.emergency_cleanup().await;
    }

    pub fn reconnect_phase(&self) -> tokio::sync::watch::Receiver<ReconnectPhase> {
        self.inner.realtime.phase()
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.inner.routing
    }

    pub fn cache(&self) -> &CacheStore {
        &self.inner.cache
    }

    pub fn realtime(&self) -> &SubscriptionManager {
        &self.inner.realtime
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.inner.health
    }

    pub fn registry(&self) -> &RefreshRegistry {
        &self.inner.registry
    }
}
