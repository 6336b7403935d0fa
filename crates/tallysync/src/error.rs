//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use tallysync_config::ConfigError;
use tallysync_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const BACKEND: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the backend")]
    #[diagnostic(
        code(tallysync::unreachable),
        help("Check the backend URL and your network connection.\n{reason}")
    )]
    Unreachable { reason: String },

    #[error("Request timed out")]
    #[diagnostic(
        code(tallysync::timeout),
        help("Increase the timeout with --timeout or check backend responsiveness.")
    )]
    Timeout,

    #[error("{probe} probe failed")]
    #[diagnostic(code(tallysync::probe_failed), help("{reason}"))]
    ProbeFailed { probe: String, reason: String },

    // ── Backend ──────────────────────────────────────────────────────

    #[error("Backend returned HTTP {status}")]
    #[diagnostic(code(tallysync::backend), help("{message}"))]
    Backend { status: u16, message: String },

    #[error("Unexpected backend payload: {message}")]
    #[diagnostic(code(tallysync::decode))]
    Decode { message: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("No backend URL configured")]
    #[diagnostic(
        code(tallysync::no_url),
        help(
            "Pass --url, set TALLYSYNC_URL, or add [backend] url to the config file.\n\
             Expected at: {path}"
        )
    )]
    NoUrl { path: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(tallysync::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(code(tallysync::config))]
    Config(Box<ConfigError>),

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not render TOML: {0}")]
    Toml(#[from] toml::ser::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Unreachable { .. } | Self::ProbeFailed { .. } => exit_code::CONNECTION,
            Self::Timeout => exit_code::TIMEOUT,
            Self::Backend { .. } | Self::Decode { .. } => exit_code::BACKEND,
            Self::NoUrl { .. } | Self::Validation { .. } | Self::Config(_) => exit_code::USAGE,
            Self::Io(_) | Self::Json(_) | Self::Toml(_) => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(Box::new(other)),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Unreachable { reason } => CliError::Unreachable { reason },
            CoreError::Timeout => CliError::Timeout,
            CoreError::Backend { status, message } => CliError::Backend { status, message },
            CoreError::Decode { message } => CliError::Decode { message },
            CoreError::Probe { probe, reason } => CliError::ProbeFailed {
                probe: probe.into(),
                reason,
            },
            CoreError::Config { message } => CliError::Validation {
                field: "backend".into(),
                reason: message,
            },
            other => CliError::Unreachable {
                reason: other.to_string(),
            },
        }
    }
}

impl From<tallysync_api::Error> for CliError {
    fn from(err: tallysync_api::Error) -> Self {
        CoreError::from(err).into()
    }
}
