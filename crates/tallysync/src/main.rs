mod cli;
mod commands;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    tracing::debug!(command = ?cli.command, "dispatching command");

    let global = &cli.global;
    match cli.command {
        // Config commands load (or only locate) the file themselves
        Command::Config(args) => commands::config_cmd::handle(&args, global),
        Command::Routes(args) => commands::routes::handle(&commands::load(global)?, &args, global),
        Command::Fetch(args) => {
            commands::fetch::handle(&commands::load(global)?, &args, global).await
        }
        Command::Probe => commands::probe::handle(&commands::load(global)?, global).await,
    }
}
