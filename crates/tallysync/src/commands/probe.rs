//! `tallysync probe`: run both health probes once.

use std::time::Duration;

use serde::Serialize;
use tallysync_config::Config;
use tallysync_core::{HealthProbe, RestProbe};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::commands::{render, rest_client};
use crate::error::CliError;

#[derive(Serialize)]
struct ProbeResult {
    probe: &'static str,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// TOML has no top-level arrays.
#[derive(Serialize)]
struct Probes<'a> {
    probes: &'a [ProbeResult],
}

pub async fn handle(cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let probe = RestProbe::new(
        rest_client(cfg, global)?,
        cfg.backend.probe_table.clone(),
        Duration::from_secs(cfg.health.probe_timeout_secs),
    );

    let network = probe.check_network().await;
    // No backend read without a network.
    let backend = if network.is_ok() {
        Some(probe.check_backend().await)
    } else {
        None
    };

    let mut results = vec![ProbeResult {
        probe: "network",
        ok: network.is_ok(),
        error: network.as_ref().err().map(ToString::to_string),
    }];
    if let Some(ref backend) = backend {
        results.push(ProbeResult {
            probe: "backend",
            ok: backend.is_ok(),
            error: backend.as_ref().err().map(ToString::to_string),
        });
    }

    match global.output {
        OutputFormat::Plain => {
            for r in &results {
                let status = if r.ok { "ok" } else { "FAILED" };
                match r.error {
                    Some(ref e) => println!("{:<8} {status}  {e}", r.probe),
                    None => println!("{:<8} {status}", r.probe),
                }
            }
        }
        OutputFormat::Json => println!("{}", render(&results, OutputFormat::Json)?),
        OutputFormat::Toml => {
            println!("{}", render(&Probes { probes: &results }, OutputFormat::Toml)?);
        }
    }

    network?;
    if let Some(backend) = backend {
        backend?;
    }
    Ok(())
}
