//! `tallysync fetch <kind>`: one collection read through the REST gateway.

use std::collections::BTreeMap;

use tallysync_config::Config;
use tallysync_core::{Gateway, RestGateway};

use crate::cli::{FetchArgs, GlobalOpts, OutputFormat};
use crate::commands::{render, rest_client};
use crate::error::CliError;

const UNGROUPED: &str = "(none)";

pub async fn handle(cfg: &Config, args: &FetchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if matches!(global.output, OutputFormat::Toml) {
        return Err(CliError::Validation {
            field: "output".into(),
            reason: "fetch supports plain or json output".into(),
        });
    }

    let gateway = RestGateway::new(rest_client(cfg, global)?);
    let records = gateway.fetch_all(args.kind).await?;
    tracing::info!(kind = %args.kind, count = records.len(), "fetched");

    if args.count {
        println!("{}", records.len());
        return Ok(());
    }

    if let Some(ref field) = args.group_by {
        let mut groups: BTreeMap<String, usize> = BTreeMap::new();
        for record in &records {
            let key = record
                .field_key(field)
                .unwrap_or_else(|| UNGROUPED.to_owned());
            *groups.entry(key).or_default() += 1;
        }
        match global.output {
            OutputFormat::Plain => {
                for (key, count) in &groups {
                    println!("{key}\t{count}");
                }
            }
            format => println!("{}", render(&groups, format)?),
        }
        return Ok(());
    }

    match global.output {
        OutputFormat::Plain => {
            for record in &records {
                println!("{}", serde_json::to_string(record)?);
            }
        }
        format => println!("{}", render(&records, format)?),
    }
    Ok(())
}
