//! Put command implementation.

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::debug;

use super::load_config;
use crate::cli::output::{Formatter, get_formatter};
use crate::models::{Batch, Config, DistanceMetric, IngestConfig, OutputFormat, template};
use crate::services::{Capabilities, Pipeline, create_embedder, create_store};

/// Arguments for the put command.
#[derive(Debug, Args)]
pub struct PutArgs {
    /// NDJSON files, one batch each (none or - reads stdin)
    #[arg()]
    pub files: Vec<PathBuf>,

    /// Collection name; may reference batch attributes as ${name}
    #[arg(long)]
    pub collection: Option<String>,

    /// Distance metric for newly created collections (cosine, l2, ip)
    #[arg(long, short = 'd')]
    pub distance: Option<DistanceMetric>,

    /// Store document text alongside vectors
    #[arg(long, value_name = "BOOL", action = clap::ArgAction::Set)]
    pub store_text: Option<bool>,

    /// Metadata key holding the document id; may reference batch attributes
    #[arg(long)]
    pub id_field: Option<String>,

    /// Extra batch attribute for templates (repeatable)
    #[arg(long = "attr", value_name = "KEY=VALUE", value_parser = template::parse_attribute)]
    pub attrs: Vec<(String, String)>,

    /// Batch name used when reading stdin
    #[arg(long, default_value = "stdin")]
    pub batch_name: String,
}

impl PutArgs {
    /// Command-line flags take precedence over `[ingest]`.
    fn apply_overrides(&self, ingest: &mut IngestConfig) {
        if let Some(ref collection) = self.collection {
            ingest.collection = collection.clone();
        }
        if let Some(distance) = self.distance {
            ingest.distance = distance;
        }
        if let Some(store_text) = self.store_text {
            ingest.store_text = store_text;
        }
        if let Some(ref id_field) = self.id_field {
            ingest.id_field = Some(id_field.clone());
        }
    }

    fn reads_stdin(&self) -> bool {
        self.files.is_empty() || (self.files.len() == 1 && is_stdin(&self.files[0]))
    }
}

fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == "-"
}

pub async fn handle_put(
    args: PutArgs,
    config_path: Option<&Path>,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    args.apply_overrides(&mut config.ingest);
    config.validate().context("invalid configuration")?;

    let formatter = get_formatter(format);
    let pipeline = build_pipeline(&config).await?;

    let result = run_batches(&pipeline, &args, &config.ingest, formatter.as_ref()).await;
    let shutdown = pipeline.shutdown().await;

    let written = result?;
    shutdown.context("failed to shut down pipeline")?;

    if verbose {
        eprintln!("Wrote {} documents", written);
    }
    Ok(())
}

async fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let embedder = create_embedder(&config.embedding)
        .with_context(|| format!("failed to create {} embedder", config.embedding.provider))?;
    let store = create_store(&config.store)
        .await
        .with_context(|| format!("failed to connect to {} store", config.store.driver))?;

    debug!(embedder = %embedder.describe(), store = %store.describe(), "pipeline ready");
    Ok(Pipeline::new(Capabilities::new(embedder, store)))
}

/// Run every batch in order, stopping at the first failure.
async fn run_batches(
    pipeline: &Pipeline,
    args: &PutArgs,
    ingest: &IngestConfig,
    formatter: &dyn Formatter,
) -> Result<usize> {
    let mut written = 0;

    if args.reads_stdin() {
        let batch = read_stdin(&args.batch_name).await?;
        written += run_one(pipeline, batch, args, ingest, formatter).await?;
        return Ok(written);
    }

    for path in &args.files {
        if is_stdin(path) {
            anyhow::bail!("'-' (stdin) cannot be combined with file arguments");
        }
        let payload = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let batch = Batch::from_file(path, payload);
        written += run_one(pipeline, batch, args, ingest, formatter).await?;
    }

    Ok(written)
}

async fn run_one(
    pipeline: &Pipeline,
    batch: Batch,
    args: &PutArgs,
    ingest: &IngestConfig,
    formatter: &dyn Formatter,
) -> Result<usize> {
    let batch = args
        .attrs
        .iter()
        .fold(batch, |batch, (key, value)| batch.with_attribute(key, value));

    let settings = ingest
        .resolve(&batch.attributes)
        .with_context(|| format!("failed to resolve settings for batch '{}'", batch.name))?;

    let report = pipeline
        .run(&batch, &settings)
        .await
        .with_context(|| format!("batch '{}' failed", batch.name))?;

    print!("{}", formatter.format_batch_report(&report));
    Ok(report.documents)
}

async fn read_stdin(name: &str) -> Result<Batch> {
    let mut payload = Vec::new();
    tokio::io::stdin()
        .read_to_end(&mut payload)
        .await
        .context("failed to read stdin")?;
    Ok(Batch::new(name, payload))
}
