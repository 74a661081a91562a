use anyhow::Result;
use std::path::Path;

use super::load_config;
use crate::cli::output::{StatusInfo, get_formatter};
use crate::models::{OutputFormat, StoreDriver};
use crate::services::{create_embedder, create_store};

pub async fn handle_status(
    config_path: Option<&Path>,
    format: OutputFormat,
    _verbose: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let formatter = get_formatter(format);

    let (store_description, store_connected) = match create_store(&config.store).await {
        Ok(store) => {
            let connected = store.health_check().await.unwrap_or(false);
            (store.describe(), connected)
        }
        Err(e) => (e.to_string(), false),
    };

    let (embedding_description, embedding_healthy) = match create_embedder(&config.embedding) {
        Ok(embedder) => {
            let healthy = embedder.health_check().await.unwrap_or(false);
            (embedder.describe(), healthy)
        }
        Err(e) => (e.to_string(), false),
    };

    let status = StatusInfo {
        store_driver: config.store.driver.to_string(),
        store_description,
        store_connected,
        embedding_provider: config.embedding.provider.to_string(),
        embedding_description,
        embedding_healthy,
        collection: config.ingest.collection.clone(),
    };

    print!("{}", formatter.format_status(&status));

    if !store_connected {
        match config.store.driver {
            StoreDriver::Qdrant => {
                eprintln!("Warning: Qdrant not reachable at {}", config.store.endpoint());
            }
            StoreDriver::Chroma => {
                eprintln!(
                    "Warning: Chroma not reachable at {}. Check url and auth settings.",
                    config.store.endpoint()
                );
            }
            StoreDriver::Local => {
                eprintln!("Warning: local store directory is not accessible.");
            }
        }
    }
    if !embedding_healthy {
        eprintln!(
            "Warning: {} embedding provider is not available.",
            config.embedding.provider
        );
    }

    Ok(())
}
