//! Clap derive structures for the `tallysync` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tallysync_core::DataKind;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// tallysync -- inspect and exercise the cache and live-sync layer
#[derive(Debug, Parser)]
#[command(
    name = "tallysync",
    version,
    about = "Inspect routing, read backend collections, and probe connectivity",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, short = 'C', env = "TALLYSYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Backend URL (overrides the config file)
    #[arg(long, short = 'u', env = "TALLYSYNC_URL", global = true)]
    pub url: Option<String>,

    /// Backend project key
    #[arg(long, env = "TALLYSYNC_API_KEY", global = true, hide_env = true)]
    pub api_key: Option<String>,

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k', global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides the config file)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(long, short = 'o', default_value = "plain", global = true)]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Plain,
    /// Pretty-printed JSON
    Json,
    /// TOML (same shape as the config file where applicable)
    Toml,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show how table changes and events route to data kinds and views
    Routes(RoutesArgs),

    /// Read one data kind from the backend
    Fetch(FetchArgs),

    /// Run the network and backend health probes once
    Probe,

    /// Inspect configuration
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct RoutesArgs {
    /// Only show the kinds and views reached by this event
    #[arg(long, short = 'e')]
    pub event: Option<String>,
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Data kind, e.g. transactions, user_balances
    #[arg(value_parser = parse_kind)]
    pub kind: DataKind,

    /// Print only the number of rows
    #[arg(long)]
    pub count: bool,

    /// Group rows by the value of this field
    #[arg(long, short = 'g')]
    pub group_by: Option<String>,
}

fn parse_kind(raw: &str) -> Result<DataKind, String> {
    raw.parse().map_err(|_| {
        let known: Vec<&str> = <DataKind as strum::IntoEnumIterator>::iter()
            .map(<&'static str>::from)
            .collect();
        format!("unknown data kind '{raw}' (expected one of: {})", known.join(", "))
    })
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a config file with the built-in defaults and routing
    Init(InitArgs),
    /// Print the config file location
    Path,
    /// Print the effective configuration (key masked)
    Show,
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}
