//! Configuration for tallysync.
//!
//! One TOML file plus `TALLYSYNC_`-prefixed environment overrides,
//! layered over built-in defaults with figment, then translated into
//! `tallysync_core::SyncConfig` and `tallysync_api::TransportConfig`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use tallysync_api::{TlsMode, TransportConfig};
use tallysync_core::{
    DataKind, HealthConfig, RealtimeConfig, RoutingTable, SyncConfig, TableRoute,
};

const REDACTED: &str = "********";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("unknown data kind '{value}' in {context}")]
    UnknownKind { context: String, value: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendSettings,

    #[serde(default)]
    pub realtime: RealtimeSettings,

    #[serde(default)]
    pub health: HealthSettings,

    /// Capacity of the in-process event bus.
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,

    #[serde(default)]
    pub routing: RoutingSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendSettings::default(),
            realtime: RealtimeSettings::default(),
            health: HealthSettings::default(),
            bus_capacity: default_bus_capacity(),
            routing: RoutingSettings::default(),
        }
    }
}

fn default_bus_capacity() -> usize {
    256
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendSettings {
    /// Backend origin (e.g., "https://project.example.co").
    pub url: Option<String>,

    /// Project key (plaintext; prefer `api_key_env`).
    pub api_key: Option<String>,

    /// Environment variable name containing the project key.
    pub api_key_env: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub insecure: bool,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Table read by the backend health probe.
    #[serde(default = "default_probe_table")]
    pub probe_table: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            api_key_env: None,
            timeout: default_timeout(),
            insecure: false,
            ca_cert: None,
            probe_table: default_probe_table(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}
fn default_probe_table() -> String {
    "partners".into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RealtimeSettings {
    #[serde(default = "default_cool_down_ms")]
    pub cool_down_ms: u64,

    #[serde(default = "default_force_reconnect_delay_ms")]
    pub force_reconnect_delay_ms: u64,

    #[serde(default = "default_status_check_interval_secs")]
    pub status_check_interval_secs: u64,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            cool_down_ms: default_cool_down_ms(),
            force_reconnect_delay_ms: default_force_reconnect_delay_ms(),
            status_check_interval_secs: default_status_check_interval_secs(),
        }
    }
}

fn default_cool_down_ms() -> u64 {
    2_000
}
fn default_force_reconnect_delay_ms() -> u64 {
    500
}
fn default_status_check_interval_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthSettings {
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,

    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            stale_after_secs: default_stale_after_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

fn default_check_interval_secs() -> u64 {
    60
}
fn default_stale_after_secs() -> u64 {
    300
}
fn default_probe_timeout_secs() -> u64 {
    5
}

/// One watched table: the kinds it invalidates and the event it raises.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TableRouteSettings {
    pub kinds: Vec<String>,
    pub event: String,
}

/// Declarative routing, keyed by plain strings so it reads naturally in
/// TOML. Kinds are validated when converting to a `RoutingTable`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RoutingSettings {
    #[serde(default)]
    pub tables: BTreeMap<String, TableRouteSettings>,

    /// Domain event → data kinds.
    #[serde(default)]
    pub events: BTreeMap<String, Vec<String>>,

    /// Data kind → view ids.
    #[serde(default)]
    pub views: BTreeMap<String, Vec<String>>,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self::from(&RoutingTable::platform_default())
    }
}

impl From<&RoutingTable> for RoutingSettings {
    fn from(table: &RoutingTable) -> Self {
        let kind_names = |kinds: &[DataKind]| kinds.iter().map(ToString::to_string).collect();

        Self {
            tables: table
                .tables()
                .map(|(name, route)| {
                    (
                        name.to_owned(),
                        TableRouteSettings {
                            kinds: kind_names(&route.kinds),
                            event: route.event.clone(),
                        },
                    )
                })
                .collect(),
            events: table
                .event_names()
                .into_iter()
                .map(|event| (event.to_owned(), kind_names(table.kinds_for_event(event))))
                .collect(),
            views: table
                .view_routes()
                .into_iter()
                .map(|(kind, views)| {
                    (
                        kind.to_string(),
                        views.iter().map(ToString::to_string).collect(),
                    )
                })
                .collect(),
        }
    }
}

impl RoutingSettings {
    /// No tables, events or views.
    pub fn empty() -> Self {
        Self {
            tables: BTreeMap::new(),
            events: BTreeMap::new(),
            views: BTreeMap::new(),
        }
    }

    /// Validate every kind name and build the runtime table.
    pub fn to_routing_table(&self) -> Result<RoutingTable, ConfigError> {
        let mut table = RoutingTable::empty();

        for (name, route) in &self.tables {
            let kinds = parse_kinds(&route.kinds, &format!("routing.tables.{name}"))?;
            table = table.with_table(name.clone(), TableRoute::new(kinds, route.event.clone()));
        }
        for (event, kinds) in &self.events {
            let kinds = parse_kinds(kinds, &format!("routing.events.{event}"))?;
            table = table.with_event(event.clone(), kinds);
        }
        for (kind, views) in &self.views {
            let kind = parse_kind(kind, "routing.views")?;
            table = table.with_views(kind, views.iter().cloned());
        }

        Ok(table)
    }
}

fn parse_kind(value: &str, context: &str) -> Result<DataKind, ConfigError> {
    DataKind::from_str(value).map_err(|_| ConfigError::UnknownKind {
        context: context.into(),
        value: value.into(),
    })
}

fn parse_kinds(values: &[String], context: &str) -> Result<Vec<DataKind>, ConfigError> {
    values.iter().map(|v| parse_kind(v, context)).collect()
}

// ── Translation to runtime types ────────────────────────────────────

impl Config {
    /// Runtime settings for `tallysync_core::SyncContext`.
    pub fn to_sync_config(&self) -> Result<SyncConfig, ConfigError> {
        if self.bus_capacity == 0 {
            return Err(ConfigError::Validation {
                field: "bus_capacity".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.health.check_interval_secs == 0 {
            return Err(ConfigError::Validation {
                field: "health.check_interval_secs".into(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(SyncConfig {
            realtime: RealtimeConfig {
                cool_down: Duration::from_millis(self.realtime.cool_down_ms),
                force_reconnect_delay: Duration::from_millis(
                    self.realtime.force_reconnect_delay_ms,
                ),
                status_check_interval: Duration::from_secs(
                    self.realtime.status_check_interval_secs,
                ),
            },
            health: HealthConfig {
                check_interval: Duration::from_secs(self.health.check_interval_secs),
                stale_after: Duration::from_secs(self.health.stale_after_secs),
                probe_timeout: Duration::from_secs(self.health.probe_timeout_secs),
            },
            routing: self.routing.to_routing_table()?,
            bus_capacity: self.bus_capacity,
        })
    }

    /// The configured backend origin.
    pub fn backend_url(&self) -> Result<Url, ConfigError> {
        let raw = self
            .backend
            .url
            .as_deref()
            .ok_or_else(|| ConfigError::Validation {
                field: "backend.url".into(),
                reason: "not set (use --url, TALLYSYNC_BACKEND__URL, or the config file)".into(),
            })?;
        raw.parse().map_err(|_| ConfigError::Validation {
            field: "backend.url".into(),
            reason: format!("invalid URL: {raw}"),
        })
    }

    /// HTTP transport settings, with the key resolved.
    pub fn transport(&self) -> TransportConfig {
        let tls = if self.backend.insecure {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ref ca_path) = self.backend.ca_cert {
            TlsMode::CustomCa(ca_path.clone())
        } else {
            TlsMode::System
        };

        TransportConfig {
            tls,
            timeout: Duration::from_secs(self.backend.timeout),
            api_key: resolve_api_key(&self.backend),
        }
    }

    /// A copy safe to print: the plaintext key is masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.backend.api_key.is_some() {
            copy.backend.api_key = Some(REDACTED.into());
        }
        copy
    }
}

/// Resolve the project key: `api_key_env` first, then the plaintext value.
pub fn resolve_api_key(backend: &BackendSettings) -> Option<SecretString> {
    if let Some(ref env_name) = backend.api_key_env {
        if let Ok(val) = std::env::var(env_name) {
            return Some(SecretString::from(val));
        }
    }
    backend.api_key.clone().map(SecretString::from)
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "tallysync", "tallysync").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("tallysync");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` (a missing file is fine) + environment.
///
/// Environment keys nest with a double underscore:
/// `TALLYSYNC_BACKEND__URL`, `TALLYSYNC_HEALTH__STALE_AFTER_SECS`.
///
/// A `[routing]` section in the file replaces the built-in routing as a
/// whole; without one the built-in routing applies.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let mut defaults = Config::default();
    if Figment::from(Toml::file(path)).contains("routing") {
        defaults.routing = RoutingSettings::empty();
    }

    let figment = Figment::new()
        .merge(Serialized::defaults(defaults))
        .merge(Toml::file(path))
        .merge(Env::prefixed("TALLYSYNC_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Serialize config to TOML and write it to `path`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}
