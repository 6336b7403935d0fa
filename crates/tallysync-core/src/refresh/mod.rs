// ── View refresh registry ──
//
// Maps view ids to refresh callbacks and resolves which views must react
// to a domain event through the routing table. Fan-out is concurrent
// with all-settled semantics: one failing view never aborts its
// siblings or the caller.

mod dispatch;

pub use dispatch::spawn_dispatcher;

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use crate::bus::BusEvent;
use crate::error::CoreError;
use crate::model::DataKind;
use crate::routing::{RoutingTable, ViewId};

/// A UI view that can re-read its data on demand.
#[async_trait]
pub trait RefreshView: Send + Sync + 'static {
    async fn refresh(&self) -> Result<(), CoreError>;

    /// Release resources when the view is unregistered. Runs after the
    /// view has been removed from the registry.
    fn cleanup(&self) {}
}

/// Outcome of refreshing a single view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewRefresh {
    Refreshed,
    Failed,
    NotRegistered,
}

/// Tally of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    pub refreshed: usize,
    pub failed: usize,
    /// Routed views that are not currently registered.
    pub missing: usize,
}

impl RefreshSummary {
    fn from_outcomes(outcomes: impl IntoIterator<Item = ViewRefresh>) -> Self {
        outcomes
            .into_iter()
            .fold(Self::default(), |mut summary, outcome| {
                match outcome {
                    ViewRefresh::Refreshed => summary.refreshed += 1,
                    ViewRefresh::Failed => summary.failed += 1,
                    ViewRefresh::NotRegistered => summary.missing += 1,
                }
                summary
            })
    }
}

/// Cheaply cloneable; clones share the same registrations.
#[derive(Clone)]
pub struct RefreshRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    views: DashMap<ViewId, Arc<dyn RefreshView>>,
    routing: Arc<RoutingTable>,
}

impl RefreshRegistry {
    pub fn new(routing: Arc<RoutingTable>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                views: DashMap::new(),
                routing,
            }),
        }
    }

    // ── Registration ─────────────────────────────────────────────────

    /// Store a view under `id`. An existing entry is replaced without
    /// running its cleanup. Returns `true` if an entry was replaced.
    pub fn register(&self, id: impl Into<ViewId>, view: Arc<dyn RefreshView>) -> bool {
        let id = id.into();
        let replaced = self.inner.views.insert(id.clone(), view).is_some();
        debug!(view = %id, replaced, "view registered");
        replaced
    }

    /// Remove a view, then run its cleanup. Returns `false` if `id` was
    /// not registered.
    ///
    /// The entry is gone before cleanup runs, so a cleanup that
    /// unregisters its own view finds nothing and returns.
    pub fn unregister(&self, id: &str) -> bool {
        let Some((id, view)) = self.inner.views.remove(id) else {
            return false;
        };
        debug!(view = %id, "view unregistered");
        view.cleanup();
        true
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.inner.views.contains_key(id)
    }

    /// Registered view ids, sorted.
    pub fn registered(&self) -> Vec<ViewId> {
        let mut ids: Vec<ViewId> = self
            .inner
            .views
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.inner.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.views.is_empty()
    }

    // ── Refresh ──────────────────────────────────────────────────────

    /// Await one view's refresh. Failures are logged, not returned.
    pub async fn refresh_view(&self, id: &ViewId) -> ViewRefresh {
        // Clone out of the map so no shard lock is held across the await.
        let Some(view) = self.inner.views.get(id.as_str()).map(|v| Arc::clone(v.value())) else {
            debug!(view = %id, "refresh requested for unregistered view");
            return ViewRefresh::NotRegistered;
        };

        match view.refresh().await {
            Ok(()) => {
                debug!(view = %id, "view refreshed");
                ViewRefresh::Refreshed
            }
            Err(e) => {
                warn!(view = %id, error = %e, "view refresh failed");
                ViewRefresh::Failed
            }
        }
    }

    async fn refresh_many(&self, ids: &[ViewId]) -> RefreshSummary {
        let outcomes = join_all(ids.iter().map(|id| self.refresh_view(id))).await;
        RefreshSummary::from_outcomes(outcomes)
    }

    /// Refresh every view routed to `kind`.
    pub async fn refresh_by_data_kind(&self, kind: DataKind) -> RefreshSummary {
        let ids = self.inner.routing.views_for_kind(kind).to_vec();
        debug!(kind = %kind, views = ids.len(), "refreshing by data kind");
        self.refresh_many(&ids).await
    }

    /// Refresh every view routed to any kind `event` touches, each once.
    pub async fn refresh_by_event(&self, event: &str) -> RefreshSummary {
        let ids = self.inner.routing.views_for_event(event);
        if ids.is_empty() {
            debug!(event, "no views routed for event");
        }
        self.refresh_many(&ids).await
    }

    /// Refresh every registered view.
    pub async fn refresh_all(&self) -> RefreshSummary {
        let ids = self.registered();
        debug!(views = ids.len(), "refreshing all views");
        self.refresh_many(&ids).await
    }

    /// React to one bus event.
    ///
    /// Domain events refresh their routed views and a global refresh
    /// request refreshes everything. `DataUpdated` is informational:
    /// the domain event published with it drives the refresh, so each
    /// notification refreshes each view once.
    pub async fn dispatch(&self, event: &BusEvent) -> Option<RefreshSummary> {
        match event {
            BusEvent::Domain(domain) => Some(self.refresh_by_event(&domain.name).await),
            BusEvent::GlobalRefreshRequested => Some(self.refresh_all().await),
            BusEvent::DataUpdated { .. } | BusEvent::Toast { .. } => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        refreshes: AtomicUsize,
        cleanups: AtomicUsize,
        fail: bool,
    }

    impl Counter {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                refreshes: AtomicUsize::new(0),
                cleanups: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl RefreshView for Counter {
        async fn refresh(&self) -> Result<(), CoreError> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CoreError::ViewRefresh {
                    view: "counter".into(),
                    message: "boom".into(),
                });
            }
            Ok(())
        }

        fn cleanup(&self) {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn registry() -> RefreshRegistry {
        RefreshRegistry::new(Arc::new(
            RoutingTable::empty()
                .with_event("partners_changed", [DataKind::Partners])
                .with_views(DataKind::Partners, ["ok", "broken", "absent"]),
        ))
    }

    #[tokio::test]
    async fn failing_view_does_not_stop_siblings() {
        let registry = registry();
        let ok = Counter::new(false);
        let broken = Counter::new(true);
        registry.register("ok", ok.clone());
        registry.register("broken", broken.clone());

        let summary = registry.refresh_by_event("partners_changed").await;
        assert_eq!(
            summary,
            RefreshSummary {
                refreshed: 1,
                failed: 1,
                missing: 1,
            }
        );
        assert_eq!(ok.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(broken.refreshes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reregistering_replaces_without_cleanup() {
        let registry = registry();
        let first = Counter::new(false);
        assert!(!registry.register("ok", first.clone()));
        assert!(registry.register("ok", Counter::new(false)));
        assert_eq!(first.cleanups.load(Ordering::SeqCst), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unregister_runs_cleanup_once() {
        let registry = registry();
        let view = Counter::new(false);
        registry.register("ok", view.clone());
        assert!(registry.unregister("ok"));
        assert!(!registry.unregister("ok"));
        assert_eq!(view.cleanups.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn data_updated_is_not_dispatched() {
        let registry = registry();
        let view = Counter::new(false);
        registry.register("ok", view.clone());

        let change = Arc::new(crate::model::ChangeEvent::new(
            "partners",
            crate::model::ChangeType::Update,
        ));
        let outcome = registry
            .dispatch(&BusEvent::DataUpdated {
                kind: DataKind::Partners,
                change,
                at: chrono::Utc::now(),
            })
            .await;
        assert!(outcome.is_none());
        assert_eq!(view.refreshes.load(Ordering::SeqCst), 0);

        let all = registry.dispatch(&BusEvent::GlobalRefreshRequested).await.unwrap();
        assert_eq!(all.refreshed, 1);
    }
}
