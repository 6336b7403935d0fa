// REST table client
//
// Wraps `reqwest::Client` with table-scoped URL construction and body
// decoding for the backend's PostgREST-style surface. Every read returns
// raw JSON rows; typing them is the core's job.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Path prefix under which the backend exposes its tables.
const REST_PREFIX: &str = "rest/v1";

/// Raw HTTP client for the backend's table endpoints.
///
/// Cheap to clone: `reqwest::Client` is reference counted internally.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
}

impl RestClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the backend origin (e.g. `https://project.example.co`).
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The backend origin.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/rest/v1/{table}`.
    pub(crate) fn table_url(&self, table: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{REST_PREFIX}/{table}"))?)
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Fetch every row of `table`. No pagination contract at this layer.
    pub async fn select_all(&self, table: &str) -> Result<Vec<Value>, Error> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut().append_pair("select", "*");
        self.get_json(url).await
    }

    /// Read at most one row's id from `table`.
    ///
    /// Used as a cheap "is the backend actually answering queries" probe.
    pub async fn select_one_id(&self, table: &str) -> Result<Option<Value>, Error> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut()
            .append_pair("select", "id")
            .append_pair("limit", "1");
        let rows: Vec<Value> = self.get_json(url).await?;
        Ok(rows.into_iter().next())
    }

    /// Lightweight same-origin reachability check.
    ///
    /// Any HTTP answer counts as reachable; only transport failures and
    /// timeouts are errors. A 5xx still means the network path is up.
    pub async fn ping(&self, timeout: Duration) -> Result<(), Error> {
        debug!("HEAD {}", self.base_url);
        let resp = self
            .http
            .head(self.base_url.clone())
            .timeout(timeout)
            .send()
            .await?;
        trace!(status = %resp.status(), "ping answered");
        Ok(())
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await?;
        let status = resp.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(1);
            return Err(Error::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        })
    }
}
