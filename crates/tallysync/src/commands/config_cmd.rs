//! Config subcommand handlers.

use tallysync_config::{self as config, Config};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::commands::{apply_overrides, config_file, load, render};
use crate::error::CliError;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match &args.command {
        ConfigCommand::Init(init) => {
            let path = config_file(global);
            if path.exists() && !init.force {
                return Err(CliError::Validation {
                    field: "config".into(),
                    reason: format!(
                        "{} already exists (pass --force to overwrite)",
                        path.display()
                    ),
                });
            }

            let mut cfg = Config::default();
            apply_overrides(&mut cfg, global);
            config::save_config(&cfg, &path)?;
            tracing::info!(path = %path.display(), "config written");
            println!("{}", path.display());
        }
        ConfigCommand::Path => {
            println!("{}", config_file(global).display());
        }
        ConfigCommand::Show => {
            let shown = load(global)?.redacted();
            let format = match global.output {
                OutputFormat::Plain => OutputFormat::Toml,
                other => other,
            };
            println!("{}", render(&shown, format)?);
        }
    }
    Ok(())
}
