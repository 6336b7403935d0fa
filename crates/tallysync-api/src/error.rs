use thiserror::Error;

/// Top-level error type for the `tallysync-api` crate.
///
/// Covers every failure mode of the REST surface: transport, HTTP status,
/// and payload decoding. `tallysync-core` maps these into its own
/// diagnostics and never lets them reach a view.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// A configured header value could not be encoded.
    #[error("Invalid header value for {name}")]
    InvalidHeader { name: &'static str },

    // ── Backend ─────────────────────────────────────────────────────
    /// Non-success HTTP status returned by the backend.
    #[error("Backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Too many requests; the backend asked us to slow down.
    #[error("Rate limited -- retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::RateLimited { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Status { status: 404, .. } => true,
            _ => false,
        }
    }

    /// HTTP status code, when the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::Status { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        let err = Error::Status {
            status: 503,
            body: "unavailable".into(),
        };
        assert!(err.is_transient());
        assert_eq!(err.status(), Some(503));
    }

    #[test]
    fn client_errors_are_not_transient() {
        let err = Error::Status {
            status: 404,
            body: String::new(),
        };
        assert!(!err.is_transient());
        assert!(err.is_not_found());
    }
}
