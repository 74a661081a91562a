//! CLI module for vecput.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::models::OutputFormat;

/// Publish newline-delimited JSON documents into vector database collections.
#[derive(Debug, Parser)]
#[command(name = "vecput")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(long, short = 'f', global = true, help = "Output format: text or json")]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(
        long,
        short = 'c',
        global = true,
        env = "VECPUT_CONFIG",
        help = "Path to config file"
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Embed NDJSON batches and upsert them into a collection
    Put(commands::PutArgs),

    /// Check the configured vector store and embedding function
    Status,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_put_flags() {
        let cli = Cli::try_parse_from([
            "vecput",
            "--format",
            "json",
            "put",
            "a.jsonl",
            "b.jsonl",
            "--collection",
            "docs_${tenant}",
            "--distance",
            "ip",
            "--store-text",
            "false",
            "--attr",
            "tenant=acme",
        ])
        .unwrap();

        assert_eq!(cli.format, Some(OutputFormat::Json));
        let Commands::Put(args) = cli.command else {
            panic!("expected put");
        };
        assert_eq!(args.files.len(), 2);
        assert_eq!(args.store_text, Some(false));
        assert_eq!(args.attrs, vec![("tenant".to_string(), "acme".to_string())]);
        assert_eq!(args.batch_name, "stdin");
    }

    #[test]
    fn test_rejects_bad_attribute() {
        assert!(Cli::try_parse_from(["vecput", "put", "--attr", "novalue"]).is_err());
    }

    #[test]
    fn test_config_subcommands() {
        let cli = Cli::try_parse_from(["vecput", "config", "init", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config(commands::ConfigCommand::Init { force: true })
        ));
    }
}
