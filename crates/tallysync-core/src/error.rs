// ── Core error types ──
//
// Errors crossing the seams between the core and its collaborators
// (gateway, change feed, probes, views). None of them is fatal: the
// services log and degrade instead of handing these to views. The
// `From<tallysync_api::Error>` impl translates transport-layer errors
// into domain-appropriate variants.

use thiserror::Error;

use crate::model::DataKind;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connectivity ─────────────────────────────────────────────────
    #[error("Backend unreachable: {reason}")]
    Unreachable { reason: String },

    #[error("Backend request timed out")]
    Timeout,

    #[error("Backend error (HTTP {status}): {message}")]
    Backend { status: u16, message: String },

    // ── Data ─────────────────────────────────────────────────────────
    #[error("Fetch failed for {kind}: {message}")]
    FetchFailed { kind: DataKind, message: String },

    #[error("Could not decode backend payload: {message}")]
    Decode { message: String },

    // ── Realtime ─────────────────────────────────────────────────────
    #[error("Change channel for '{table}' failed: {reason}")]
    Subscription { table: String, reason: String },

    // ── Health ───────────────────────────────────────────────────────
    #[error("{probe} probe failed: {reason}")]
    Probe { probe: &'static str, reason: String },

    // ── Views ────────────────────────────────────────────────────────
    #[error("View '{view}' failed to refresh: {message}")]
    ViewRefresh { view: String, message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<tallysync_api::Error> for CoreError {
    fn from(err: tallysync_api::Error) -> Self {
        match err {
            tallysync_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if let Some(status) = e.status() {
                    CoreError::Backend {
                        status: status.as_u16(),
                        message: e.to_string(),
                    }
                } else {
                    CoreError::Unreachable {
                        reason: e.to_string(),
                    }
                }
            }
            tallysync_api::Error::Status { status, body } => CoreError::Backend {
                status,
                message: body,
            },
            tallysync_api::Error::RateLimited { retry_after_secs } => CoreError::Backend {
                status: 429,
                message: format!("rate limited -- retry after {retry_after_secs}s"),
            },
            tallysync_api::Error::Deserialization { message, body: _ } => {
                CoreError::Decode { message }
            }
            tallysync_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("invalid URL: {e}"),
            },
            tallysync_api::Error::Tls(msg) => CoreError::Config {
                message: format!("TLS setup failed: {msg}"),
            },
            tallysync_api::Error::InvalidHeader { name } => CoreError::Config {
                message: format!("invalid value for header {name}"),
            },
        }
    }
}
