//! Vector store abstraction layer.
//!
//! Backends (Qdrant, Chroma, local) sit behind [`VectorStore`] so the
//! pipeline can be pointed at any of them through configuration.

mod chroma;
mod local;
mod qdrant;

pub use chroma::ChromaStore;
pub use local::{LocalCollection, LocalStore, StoredRecord};
pub use qdrant::QdrantStore;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::error::VectorStoreError;
use crate::models::{BatchWriteRequest, Collection, DistanceMetric, StoreConfig, StoreDriver};

/// Operations every vector store backend provides.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Check if the vector store is reachable.
    async fn health_check(&self) -> Result<bool, VectorStoreError>;

    /// Look up `name`, creating it with `metric` and `dimension` if absent.
    ///
    /// An existing collection keeps its own metric; the requested one is
    /// ignored.
    async fn get_or_create_collection(
        &self,
        name: &str,
        metric: DistanceMetric,
        dimension: usize,
    ) -> Result<Collection, VectorStoreError>;

    /// Insert or overwrite every record of `request` in one call.
    async fn upsert(
        &self,
        collection: &Collection,
        request: BatchWriteRequest,
    ) -> Result<(), VectorStoreError>;

    async fn close(&self) -> Result<(), VectorStoreError> {
        Ok(())
    }

    /// Human-readable description for status output.
    fn describe(&self) -> String;
}

/// Resolve the target collection and write the whole request to it.
pub async fn upsert_batch(
    store: &dyn VectorStore,
    name: &str,
    metric: DistanceMetric,
    request: BatchWriteRequest,
) -> Result<Collection, VectorStoreError> {
    let dimension = request.dimension().unwrap_or_default();
    let collection = store
        .get_or_create_collection(name, metric, dimension)
        .await?;

    if collection.distance_metric != metric {
        debug!(
            collection = %collection.name,
            existing = %collection.distance_metric,
            requested = %metric,
            "collection exists, keeping its distance metric"
        );
    }

    let count = request.len();
    store.upsert(&collection, request).await?;
    debug!(collection = %collection.name, count, "upserted batch");

    Ok(collection)
}

/// Create a vector store backend based on configuration.
pub async fn create_store(config: &StoreConfig) -> Result<Arc<dyn VectorStore>, VectorStoreError> {
    match config.driver {
        StoreDriver::Qdrant => Ok(Arc::new(QdrantStore::new(config)?)),
        StoreDriver::Chroma => Ok(Arc::new(ChromaStore::new(config)?)),
        StoreDriver::Local => match config.directory {
            Some(ref dir) => Ok(Arc::new(LocalStore::open(dir).await?)),
            None => Ok(Arc::new(LocalStore::in_memory())),
        },
    }
}

/// Characters accepted in collection names by every backend.
pub(crate) fn validate_collection_name(name: &str) -> Result<(), VectorStoreError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(VectorStoreError::CollectionError(format!(
            "invalid collection name '{}': use letters, digits, '_', '-' or '.'",
            name
        )))
    }
}
