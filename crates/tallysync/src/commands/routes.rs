//! `tallysync routes`: effective routing tables.

use serde::Serialize;
use tallysync_config::{Config, RoutingSettings};
use tallysync_core::{DataKind, ViewId};

use crate::cli::{GlobalOpts, OutputFormat, RoutesArgs};
use crate::commands::render;
use crate::error::CliError;

#[derive(Serialize)]
struct EventRoute<'a> {
    event: &'a str,
    kinds: Vec<String>,
    views: Vec<String>,
}

pub fn handle(cfg: &Config, args: &RoutesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    // Validates every kind name before anything is printed.
    let routing = cfg.to_sync_config()?.routing;

    if let Some(ref event) = args.event {
        let route = EventRoute {
            event,
            kinds: routing
                .kinds_for_event(event)
                .iter()
                .map(ToString::to_string)
                .collect(),
            views: routing
                .views_for_event(event)
                .iter()
                .map(ToString::to_string)
                .collect(),
        };
        if route.kinds.is_empty() {
            return Err(CliError::Validation {
                field: "event".into(),
                reason: format!("no route for event '{event}'"),
            });
        }

        match global.output {
            OutputFormat::Plain => {
                println!("{event}");
                println!("  kinds: {}", route.kinds.join(", "));
                println!("  views: {}", route.views.join(", "));
            }
            format => println!("{}", render(&route, format)?),
        }
        return Ok(());
    }

    match global.output {
        OutputFormat::Plain => {
            println!("tables:");
            for (table, route) in routing.tables() {
                println!(
                    "  {table:<14} -> {:<22} [{}]",
                    route.event,
                    join_kinds(&route.kinds)
                );
            }
            println!("events:");
            for event in routing.event_names() {
                println!(
                    "  {event:<22} -> [{}]",
                    join_kinds(routing.kinds_for_event(event))
                );
            }
            println!("views:");
            for (kind, views) in routing.view_routes() {
                let views: Vec<&str> = views.iter().map(ViewId::as_str).collect();
                println!("  {:<16} -> [{}]", kind.to_string(), views.join(", "));
            }
        }
        format => println!("{}", render(&RoutingSettings::from(&routing), format)?),
    }
    Ok(())
}

fn join_kinds(kinds: &[DataKind]) -> String {
    kinds
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
