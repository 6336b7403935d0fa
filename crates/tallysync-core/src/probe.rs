// ── Connectivity probes ──

use std::time::Duration;

use async_trait::async_trait;
use tallysync_api::RestClient;
use tracing::trace;

use crate::error::CoreError;

/// Cheap checks used by the health monitor.
#[async_trait]
pub trait HealthProbe: Send + Sync + 'static {
    /// Same-origin reachability; fails only on gross network loss.
    async fn check_network(&self) -> Result<(), CoreError>;

    /// A trivial backend read; fails when the backend is reachable but
    /// not answering queries.
    async fn check_backend(&self) -> Result<(), CoreError>;
}

/// Probes over the REST client: `HEAD` on the origin, and a one-row
/// read of a small table.
#[derive(Clone)]
pub struct RestProbe {
    client: RestClient,
    table: String,
    timeout: Duration,
}

impl RestProbe {
    pub fn new(client: RestClient, table: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            table: table.into(),
            timeout,
        }
    }
}

#[async_trait]
impl HealthProbe for RestProbe {
    async fn check_network(&self) -> Result<(), CoreError> {
        self.client
            .ping(self.timeout)
            .await
            .map_err(|e| CoreError::Probe {
                probe: "network",
                reason: CoreError::from(e).to_string(),
            })
    }

    async fn check_backend(&self) -> Result<(), CoreError> {
        let read = tokio::time::timeout(self.timeout, self.client.select_one_id(&self.table))
            .await
            .map_err(|_| CoreError::Probe {
                probe: "backend",
                reason: CoreError::Timeout.to_string(),
            })?;
        let row = read.map_err(|e| CoreError::Probe {
            probe: "backend",
            reason: CoreError::from(e).to_string(),
        })?;
        trace!(table = %self.table, empty = row.is_none(), "backend probe answered");
        Ok(())
    }
}
