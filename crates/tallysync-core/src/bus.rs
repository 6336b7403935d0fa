// ── Typed event bus ──
//
// Process-local publish/subscribe over a `broadcast` channel. Every
// subscriber sees every event published after it subscribed; slow
// subscribers observe `RecvError::Lagged` rather than blocking
// publishers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;
use tokio::sync::broadcast;

use crate::model::{ChangeEvent, DataKind};

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// A named domain event, either derived from a change notification
/// (`transactions_changed`) or announced by UI code
/// (`transaction_validated`).
#[derive(Debug, Clone, PartialEq)]
pub struct DomainEvent {
    pub name: String,
    /// Raw change payload, absent for UI-originated business events.
    pub change: Option<Arc<ChangeEvent>>,
    pub at: DateTime<Utc>,
}

impl DomainEvent {
    pub fn business(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            change: None,
            at: Utc::now(),
        }
    }

    pub fn from_change(name: impl Into<String>, change: Arc<ChangeEvent>) -> Self {
        Self {
            name: name.into(),
            change: Some(change),
            at: Utc::now(),
        }
    }
}

/// Everything published on the shared bus.
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    /// A cache kind was invalidated because of a change notification.
    DataUpdated {
        kind: DataKind,
        change: Arc<ChangeEvent>,
        at: DateTime<Utc>,
    },
    Domain(DomainEvent),
    Toast { message: String, severity: Severity },
    GlobalRefreshRequested,
}

impl BusEvent {
    /// Whether the event proves that backend data is still flowing.
    pub fn is_data_change(&self) -> bool {
        match self {
            Self::DataUpdated { .. } => true,
            Self::Domain(event) => event.change.is_some(),
            Self::Toast { .. } | Self::GlobalRefreshRequested => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Arc<BusEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event. Returns the number of subscribers that will see
    /// it; zero subscribers is not an error.
    pub fn publish(&self, event: BusEvent) -> usize {
        self.tx.send(Arc::new(event)).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<BusEvent>> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
