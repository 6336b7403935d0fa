// ── Health monitor ──
//
// Idle until `start_monitoring`, then a background task stamps every
// data-change event seen on the bus and runs a periodic check. Channels
// that look open but stopped delivering show up as staleness; the probes
// cover the network and the backend. Probe failures are logged and
// reported, never returned as errors.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::{BusEvent, EventBus, Severity};
use crate::config::HealthConfig;
use crate::error::CoreError;
use crate::probe::HealthProbe;
use crate::realtime::{ReconnectOutcome, SubscriptionManager};

const DEGRADED_MESSAGE: &str = "The server is not answering queries. Reconnecting live updates.";

/// Outcome of one [`HealthMonitor::check_connection_health`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthReport {
    /// Time since the last observed data update, measured at check start.
    pub since_last_update: Duration,
    pub stale: bool,
    pub network_ok: bool,
    /// `None` when the backend probe was skipped after a network failure.
    pub backend_ok: Option<bool>,
    /// Set when this check requested a reconnect.
    pub reconnect: Option<ReconnectOutcome>,
}

struct MonitorTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Cheaply cloneable; clones share the same timer and stamp.
#[derive(Clone)]
pub struct HealthMonitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    realtime: SubscriptionManager,
    probe: Arc<dyn HealthProbe>,
    bus: EventBus,
    config: HealthConfig,
    last_data_update: watch::Sender<Instant>,
    task: Mutex<Option<MonitorTask>>,
}

impl HealthMonitor {
    pub fn new(
        realtime: SubscriptionManager,
        probe: Arc<dyn HealthProbe>,
        bus: EventBus,
        config: HealthConfig,
    ) -> Self {
        let (last_data_update, _) = watch::channel(Instant::now());
        Self {
            inner: Arc::new(MonitorInner {
                realtime,
                probe,
                bus,
                config,
                last_data_update,
                task: Mutex::new(None),
            }),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Idle → Monitoring. Returns `false` if already monitoring.
    pub async fn start_monitoring(&self) -> bool {
        let mut task = self.inner.task.lock().await;
        if task.is_some() {
            return false;
        }

        self.mark_data_update();
        let events = self.inner.bus.subscribe();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(monitor_task(self.clone(), events, cancel.clone()));
        *task = Some(MonitorTask { cancel, handle });

        info!(
            interval = ?self.inner.config.check_interval,
            stale_after = ?self.inner.config.stale_after,
            "health monitoring started"
        );
        true
    }

    /// Monitoring → Idle. Returns `false` if already idle.
    ///
    /// A check already running (and any reconnect it started) finishes
    /// before this returns.
    pub async fn stop_monitoring(&self) -> bool {
        let Some(task) = self.inner.task.lock().await.take() else {
            return false;
        };

        task.cancel.cancel();
        if let Err(e) = task.handle.await {
            warn!(error = %e, "health monitor task ended abnormally");
        }
        info!("health monitoring stopped");
        true
    }

    pub async fn is_monitoring(&self) -> bool {
        self.inner.task.lock().await.is_some()
    }

    // ── Checks ───────────────────────────────────────────────────────

    /// Staleness check, then network probe, then backend probe.
    pub async fn check_connection_health(&self) -> HealthReport {
        let since_last_update = self.since_last_update();
        let stale = since_last_update > self.inner.config.stale_after;
        let mut reconnect = None;

        if stale {
            warn!(
                elapsed_secs = since_last_update.as_secs(),
                "no data update within staleness window, forcing reconnect"
            );
            reconnect = Some(self.inner.realtime.force_reconnect().await);
            self.mark_data_update();
        }

        let network_ok = self
            .run_probe("network", self.inner.probe.check_network())
            .await;
        if !network_ok {
            return HealthReport {
                since_last_update,
                stale,
                network_ok,
                backend_ok: None,
                reconnect,
            };
        }

        let backend_ok = self
            .run_probe("backend", self.inner.probe.check_backend())
            .await;
        if !backend_ok && reconnect.is_none() {
            self.inner.bus.publish(BusEvent::Toast {
                message: DEGRADED_MESSAGE.to_owned(),
                severity: Severity::Warning,
            });
            reconnect = Some(self.inner.realtime.force_reconnect().await);
        }

        debug!(stale, network_ok, backend_ok, "connection health checked");
        HealthReport {
            since_last_update,
            stale,
            network_ok,
            backend_ok: Some(backend_ok),
            reconnect,
        }
    }

    async fn run_probe(
        &self,
        name: &'static str,
        probe: impl Future<Output = Result<(), CoreError>> + Send,
    ) -> bool {
        match tokio::time::timeout(self.inner.config.probe_timeout, probe).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(probe = name, error = %e, "health probe failed");
                false
            }
            Err(_) => {
                warn!(probe = name, timeout = ?self.inner.config.probe_timeout, "health probe timed out");
                false
            }
        }
    }

    /// Run a health check now, outside the periodic schedule.
    pub async fn force_health_check(&self) -> HealthReport {
        debug!("forced health check");
        self.check_connection_health().await
    }

    // ── Data-update stamp ────────────────────────────────────────────

    /// Record that fresh data was just observed.
    ///
    /// Call after a local write succeeds so the wait for its realtime
    /// echo does not read as staleness.
    pub fn mark_data_update(&self) {
        self.inner.last_data_update.send_replace(Instant::now());
    }

    pub fn last_data_update(&self) -> Instant {
        *self.inner.last_data_update.borrow()
    }

    pub fn since_last_update(&self) -> Duration {
        self.last_data_update().elapsed()
    }
}

// ── Background task ──────────────────────────────────────────────────

async fn monitor_task(
    monitor: HealthMonitor,
    mut events: broadcast::Receiver<Arc<BusEvent>>,
    cancel: CancellationToken,
) {
    let period = monitor.inner.config.check_interval;
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => match event {
                Ok(event) => {
                    if event.is_data_change() {
                        monitor.mark_data_update();
                    }
                }
                // Lost events were most likely data changes.
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "health monitor lagged behind the bus");
                    monitor.mark_data_update();
                }
                Err(RecvError::Closed) => break,
            },
            _ = interval.tick() => {
                monitor.check_connection_health().await;
                monitor.inner.realtime.check_status().await;
            }
        }
    }

    debug!("health monitor task exiting");
}
