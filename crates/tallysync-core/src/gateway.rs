// ── Remote data gateway ──
//
// The cache never talks to the network directly; every read goes through
// a `Gateway`. `RestGateway` is the production adapter over the REST
// client, tests substitute an in-memory implementation.

use async_trait::async_trait;
use tallysync_api::RestClient;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{DataKind, Record};

/// Single-shot collection reads, one call per data kind.
#[async_trait]
pub trait Gateway: Send + Sync + 'static {
    /// Fetch the complete current collection for `kind`.
    async fn fetch_all(&self, kind: DataKind) -> Result<Vec<Record>, CoreError>;
}

/// Gateway backed by the backend's REST table endpoints.
#[derive(Clone)]
pub struct RestGateway {
    client: RestClient,
}

impl RestGateway {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &RestClient {
        &self.client
    }
}

#[async_trait]
impl Gateway for RestGateway {
    async fn fetch_all(&self, kind: DataKind) -> Result<Vec<Record>, CoreError> {
        let rows = self.client.select_all(kind.table_name()).await?;

        let total = rows.len();
        let records: Vec<Record> = rows.into_iter().filter_map(Record::from_value).collect();
        if records.len() < total {
            warn!(
                kind = %kind,
                skipped = total - records.len(),
                "rows without a usable id were skipped"
            );
        }
        debug!(kind = %kind, count = records.len(), "fetched collection");
        Ok(records)
    }
}
