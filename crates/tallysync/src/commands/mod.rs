//! Command handlers and the config plumbing they share.

pub mod config_cmd;
pub mod fetch;
pub mod probe;
pub mod routes;

use std::path::PathBuf;

use serde::Serialize;
use tallysync_api::RestClient;
use tallysync_config::{self as config, Config};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;

/// Config file location: `--config` if given, else the platform default.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(config::config_path)
}

/// Load file + environment config, then apply command-line overrides.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = config::load_config_from(&config_file(global))?;
    apply_overrides(&mut cfg, global);
    Ok(cfg)
}

/// Apply `--url`, `--api-key`, `--insecure` and `--timeout`.
pub fn apply_overrides(cfg: &mut Config, global: &GlobalOpts) {
    if let Some(ref url) = global.url {
        cfg.backend.url = Some(url.clone());
    }
    if let Some(ref key) = global.api_key {
        cfg.backend.api_key = Some(key.clone());
        cfg.backend.api_key_env = None;
    }
    if global.insecure {
        cfg.backend.insecure = true;
    }
    if let Some(timeout) = global.timeout {
        cfg.backend.timeout = timeout;
    }
}

/// Build a REST client for the configured backend.
pub fn rest_client(cfg: &Config, global: &GlobalOpts) -> Result<RestClient, CliError> {
    if cfg.backend.url.is_none() {
        return Err(CliError::NoUrl {
            path: config_file(global).display().to_string(),
        });
    }
    let url = cfg.backend_url()?;
    Ok(RestClient::new(url, &cfg.transport())?)
}

/// Render a value as JSON or TOML. Plain output is handled per command.
pub fn render<T: Serialize>(value: &T, format: OutputFormat) -> Result<String, CliError> {
    Ok(match format {
        OutputFormat::Toml => toml::to_string_pretty(value)?,
        OutputFormat::Json | OutputFormat::Plain => serde_json::to_string_pretty(value)?,
    })
}
