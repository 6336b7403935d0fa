// Shared in-memory collaborators for the integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::{Notify, watch};

use tallysync_core::{
    CacheStore, ChangeEvent, ChangeFeed, ChangeHandler, ChangeType, ChannelHandle, ChannelStatus,
    CoreError, DataKind, EventBus, Gateway, HealthConfig, HealthMonitor, HealthProbe,
    RealtimeConfig, Record, RefreshRegistry, RefreshView, RoutingTable, SubscriptionManager,
};

// ── Gateway ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockGateway {
    rows: Mutex<HashMap<DataKind, Vec<Value>>>,
    failing: Mutex<HashSet<DataKind>>,
    calls: Mutex<HashMap<DataKind, usize>>,
    delay: Mutex<Option<Duration>>,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_rows(&self, kind: DataKind, rows: Vec<Value>) {
        self.rows.lock().unwrap().insert(kind, rows);
    }

    pub fn fail(&self, kind: DataKind) {
        self.failing.lock().unwrap().insert(kind);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self, kind: DataKind) -> usize {
        self.calls.lock().unwrap().get(&kind).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn fetch_all(&self, kind: DataKind) -> Result<Vec<Record>, CoreError> {
        *self.calls.lock().unwrap().entry(kind).or_default() += 1;

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.lock().unwrap().contains(&kind) {
            return Err(CoreError::FetchFailed {
                kind,
                message: "gateway unavailable".into(),
            });
        }

        let rows = self.rows.lock().unwrap().get(&kind).cloned().unwrap_or_default();
        Ok(rows.into_iter().filter_map(Record::from_value).collect())
    }
}

// ── Change feed ──────────────────────────────────────────────────────

struct Channel {
    handler: ChangeHandler,
    status: watch::Sender<ChannelStatus>,
}

pub struct MockFeed {
    channels: Mutex<HashMap<String, Channel>>,
    refuse: Mutex<HashSet<String>>,
    connected: AtomicBool,
    pub subscribe_calls: AtomicUsize,
    pub unsubscribe_calls: AtomicUsize,
    pub disconnect_calls: AtomicUsize,
    pub connection_checks: AtomicUsize,
}

impl MockFeed {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            channels: Mutex::new(HashMap::new()),
            refuse: Mutex::new(HashSet::new()),
            connected: AtomicBool::new(true),
            subscribe_calls: AtomicUsize::new(0),
            unsubscribe_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
            connection_checks: AtomicUsize::new(0),
        })
    }

    /// Deliver a notification on `table`'s channel, as the transport would.
    pub fn emit(&self, table: &str, change: ChangeEvent) {
        let handler = self
            .channels
            .lock()
            .unwrap()
            .get(table)
            .map(|channel| Arc::clone(&channel.handler));
        if let Some(handler) = handler {
            handler(change);
        }
    }

    pub fn set_status(&self, table: &str, status: ChannelStatus) {
        if let Some(channel) = self.channels.lock().unwrap().get(table) {
            channel.status.send_replace(status);
        }
    }

    pub fn set_all_status(&self, status: ChannelStatus) {
        for channel in self.channels.lock().unwrap().values() {
            channel.status.send_replace(status);
        }
    }

    pub fn refuse(&self, table: &str) {
        self.refuse.lock().unwrap().insert(table.to_owned());
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn open_channels(&self) -> usize {
        self.channels.lock().unwrap().len()
    }

    pub fn subscribes(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    pub fn unsubscribes(&self) -> usize {
        self.unsubscribe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChangeFeed for MockFeed {
    async fn subscribe(
        &self,
        table: &str,
        on_change: ChangeHandler,
    ) -> Result<ChannelHandle, CoreError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if self.refuse.lock().unwrap().contains(table) {
            return Err(CoreError::Subscription {
                table: table.to_owned(),
                reason: "refused".into(),
            });
        }

        let (status, rx) = watch::channel(ChannelStatus::Active);
        self.channels.lock().unwrap().insert(
            table.to_owned(),
            Channel {
                handler: on_change,
                status,
            },
        );
        Ok(ChannelHandle::new(table, rx))
    }

    async fn unsubscribe(&self, handle: ChannelHandle) -> Result<(), CoreError> {
        self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(channel) = self.channels.lock().unwrap().remove(handle.table()) {
            channel.status.send_replace(ChannelStatus::Closed);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connection_checks.fetch_add(1, Ordering::SeqCst);
        self.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) -> Result<(), CoreError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

// ── Probe ────────────────────────────────────────────────────────────

pub struct MockProbe {
    network_ok: AtomicBool,
    backend_ok: AtomicBool,
    pub network_checks: AtomicUsize,
    pub backend_checks: AtomicUsize,
}

impl MockProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            network_ok: AtomicBool::new(true),
            backend_ok: AtomicBool::new(true),
            network_checks: AtomicUsize::new(0),
            backend_checks: AtomicUsize::new(0),
        })
    }

    pub fn set_network(&self, ok: bool) {
        self.network_ok.store(ok, Ordering::SeqCst);
    }

    pub fn set_backend(&self, ok: bool) {
        self.backend_ok.store(ok, Ordering::SeqCst);
    }
}

#[async_trait]
impl HealthProbe for MockProbe {
    async fn check_network(&self) -> Result<(), CoreError> {
        self.network_checks.fetch_add(1, Ordering::SeqCst);
        if self.network_ok.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CoreError::Probe {
                probe: "network",
                reason: "offline".into(),
            })
        }
    }

    async fn check_backend(&self) -> Result<(), CoreError> {
        self.backend_checks.fetch_add(1, Ordering::SeqCst);
        if self.backend_ok.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CoreError::Probe {
                probe: "backend",
                reason: "HTTP 503".into(),
            })
        }
    }
}

// ── Views ────────────────────────────────────────────────────────────

/// Counts refreshes; optionally re-reads one cache kind like a real view.
pub struct CountingView {
    refreshes: AtomicUsize,
    source: Option<(CacheStore, DataKind)>,
    fail: bool,
}

impl CountingView {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            refreshes: AtomicUsize::new(0),
            source: None,
            fail: false,
        })
    }

    pub fn reading(cache: CacheStore, kind: DataKind) -> Arc<Self> {
        Arc::new(Self {
            refreshes: AtomicUsize::new(0),
            source: Some((cache, kind)),
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            refreshes: AtomicUsize::new(0),
            source: None,
            fail: true,
        })
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RefreshView for CountingView {
    async fn refresh(&self) -> Result<(), CoreError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        if let Some((cache, kind)) = &self.source {
            cache.get(*kind).await;
        }
        if self.fail {
            return Err(CoreError::ViewRefresh {
                view: "failing".into(),
                message: "render error".into(),
            });
        }
        Ok(())
    }
}

/// Blocks in `refresh` until released.
pub struct GatedView {
    started: AtomicUsize,
    finished: AtomicUsize,
    gate: Notify,
}

impl GatedView {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
            gate: Notify::new(),
        })
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RefreshView for GatedView {
    async fn refresh(&self) -> Result<(), CoreError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A view whose cleanup unregisters itself.
pub struct ReentrantView {
    registry: RefreshRegistry,
    id: String,
    pub cleanups: AtomicUsize,
}

impl ReentrantView {
    pub fn new(registry: RefreshRegistry, id: &str) -> Arc<Self> {
        Arc::new(Self {
            registry,
            id: id.to_owned(),
            cleanups: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl RefreshView for ReentrantView {
    async fn refresh(&self) -> Result<(), CoreError> {
        Ok(())
    }

    fn cleanup(&self) {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        self.registry.unregister(&self.id);
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────

pub fn rows(ids: &[i64]) -> Vec<Value> {
    ids.iter()
        .map(|id| json!({ "id": id, "agency_id": format!("AG-{}", id % 2) }))
        .collect()
}

pub fn change(table: &str) -> ChangeEvent {
    ChangeEvent::new(table, ChangeType::Update).with_new(json!({ "id": 1, "status": "validated" }))
}

/// Number of watched tables in the default routing.
pub fn table_count() -> usize {
    RoutingTable::platform_default().tables().count()
}

/// Services wired together without a `SyncContext`.
pub struct Harness {
    pub gateway: Arc<MockGateway>,
    pub feed: Arc<MockFeed>,
    pub probe: Arc<MockProbe>,
    pub bus: EventBus,
    pub cache: CacheStore,
    pub realtime: SubscriptionManager,
    pub health: HealthMonitor,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_health(HealthConfig::default())
    }

    pub fn with_health(health: HealthConfig) -> Self {
        let gateway = MockGateway::new();
        let feed = MockFeed::new();
        let probe = MockProbe::new();
        let bus = EventBus::new(64);
        let cache = CacheStore::new(gateway.clone());
        let realtime = SubscriptionManager::new(
            feed.clone(),
            cache.clone(),
            bus.clone(),
            Arc::new(RoutingTable::platform_default()),
            RealtimeConfig::default(),
        );
        let monitor = HealthMonitor::new(realtime.clone(), probe.clone(), bus.clone(), health);

        Self {
            gateway,
            feed,
            probe,
            bus,
            cache,
            realtime,
            health: monitor,
        }
    }
}
