use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::{Path, PathBuf};

use super::load_config;
use crate::cli::output::{Formatter, get_formatter};
use crate::models::{Config, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Write a default configuration file")]
    Init {
        #[arg(long, help = "Force overwrite existing config")]
        force: bool,
    },
    #[command(about = "Show current configuration")]
    Show,
    #[command(about = "Show configuration file path")]
    Path,
}

pub async fn handle_config(
    cmd: ConfigCommand,
    config_path: Option<&Path>,
    format: OutputFormat,
    _verbose: bool,
) -> Result<()> {
    let formatter = get_formatter(format);

    match cmd {
        ConfigCommand::Init { force } => handle_init(config_path, force, formatter.as_ref()),
        ConfigCommand::Show => handle_show(config_path, format),
        ConfigCommand::Path => handle_path(config_path, formatter.as_ref()),
    }
}

fn target_path(config_path: Option<&Path>) -> Result<PathBuf> {
    match config_path {
        Some(path) => Ok(path.to_path_buf()),
        None => Config::config_path()
            .ok_or_else(|| anyhow::anyhow!("could not determine config directory")),
    }
}

fn handle_init(config_path: Option<&Path>, force: bool, formatter: &dyn Formatter) -> Result<()> {
    let path = target_path(config_path)?;

    if path.exists() && !force {
        anyhow::bail!(
            "Config already exists at: {}\nUse --force to overwrite.",
            path.display()
        );
    }

    Config::default()
        .save_to(&path)
        .with_context(|| format!("failed to write config to {}", path.display()))?;

    print!(
        "{}",
        formatter.format_message(&format!("Created config at: {}", path.display()))
    );
    Ok(())
}

fn handle_show(config_path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let config = redact(load_config(config_path)?);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        OutputFormat::Text => {
            if let Ok(path) = target_path(config_path) {
                println!("# Config: {}", path.display());
                println!();
            }
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }
    Ok(())
}

fn handle_path(config_path: Option<&Path>, formatter: &dyn Formatter) -> Result<()> {
    let path = target_path(config_path)?;
    let state = if path.exists() { "" } else { " (not found)" };
    print!(
        "{}",
        formatter.format_message(&format!("{}{}", path.display(), state))
    );
    Ok(())
}

/// Mask secrets before printing.
fn redact(mut config: Config) -> Config {
    const MASK: &str = "********";
    for secret in [
        &mut config.store.api_key,
        &mut config.store.password,
        &mut config.embedding.api_key,
    ] {
        if secret.is_some() {
            *secret = Some(MASK.to_string());
        }
    }
    config
}
