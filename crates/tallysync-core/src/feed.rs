// ── Live change feed ──
//
// The push-subscription primitive the subscription manager drives. Each
// open channel reports its state through a `watch` receiver so the
// manager can sample channel health without asking the transport.

use std::sync::Arc;

use async_trait::async_trait;
use strum::Display;
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::CoreError;
use crate::model::ChangeEvent;

/// State of one open channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ChannelStatus {
    /// Opened, waiting for the server to confirm.
    Pending,
    Active,
    Errored,
    Closed,
}

impl ChannelStatus {
    /// Errored and closed channels no longer deliver notifications.
    pub fn is_failed(self) -> bool {
        matches!(self, Self::Errored | Self::Closed)
    }
}

/// Callback invoked for every notification on a channel.
pub type ChangeHandler = Arc<dyn Fn(ChangeEvent) + Send + Sync>;

/// One open channel bound to one table.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    id: Uuid,
    table: String,
    status: watch::Receiver<ChannelStatus>,
}

impl ChannelHandle {
    pub fn new(table: impl Into<String>, status: watch::Receiver<ChannelStatus>) -> Self {
        Self {
            id: Uuid::new_v4(),
            table: table.into(),
            status,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Current channel state as last reported by the transport.
    pub fn status(&self) -> ChannelStatus {
        *self.status.borrow()
    }
}

/// Live change feed provider.
///
/// Treated as unreliable: channels may silently stop delivering or move
/// to an errored or closed state at any time.
#[async_trait]
pub trait ChangeFeed: Send + Sync + 'static {
    /// Open a channel for `table`; `on_change` runs for each notification.
    async fn subscribe(
        &self,
        table: &str,
        on_change: ChangeHandler,
    ) -> Result<ChannelHandle, CoreError>;

    /// Close a channel. Unknown or already-closed handles are ignored.
    async fn unsubscribe(&self, handle: ChannelHandle) -> Result<(), CoreError>;

    /// Whether the underlying transport connection is up.
    fn is_connected(&self) -> bool;

    /// Drop the underlying transport connection.
    async fn disconnect(&self) -> Result<(), CoreError>;
}
