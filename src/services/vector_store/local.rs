//! In-process vector store with optional JSON persistence.
//!
//! Each collection is one `<name>.json` snapshot under the store directory.
//! A write is applied to a copy, persisted, and only then swapped in, so a
//! failed write leaves both memory and disk untouched.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{VectorStore, validate_collection_name};
use crate::error::VectorStoreError;
use crate::models::{
    BatchWriteRequest, Collection, DistanceMetric, DocumentId, EmbeddingVector, NormalizedMetadata,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub embedding: EmbeddingVector,
    pub metadata: NormalizedMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalCollection {
    pub name: String,
    pub distance_metric: DistanceMetric,
    pub dimension: usize,
    pub created_at: String,
    pub records: BTreeMap<DocumentId, StoredRecord>,
}

impl LocalCollection {
    fn handle(&self) -> Collection {
        Collection {
            name: self.name.clone(),
            id: self.name.clone(),
            distance_metric: self.distance_metric,
        }
    }

    fn apply(&mut self, request: BatchWriteRequest) -> Result<(), VectorStoreError> {
        if let Some(bad) = request
            .embeddings()
            .iter()
            .position(|e| e.len() != self.dimension)
        {
            return Err(VectorStoreError::UpsertError(format!(
                "vector for '{}' has dimension {}, collection '{}' expects {}",
                request.ids()[bad],
                request.embeddings()[bad].len(),
                self.name,
                self.dimension
            )));
        }

        let (ids, embeddings, metadatas, texts) = request.into_parts();
        let mut texts = texts.map(Vec::into_iter);
        for ((id, embedding), metadata) in ids.into_iter().zip(embeddings).zip(metadatas) {
            let document = texts.as_mut().and_then(Iterator::next).flatten();
            self.records.insert(
                id,
                StoredRecord {
                    embedding,
                    metadata,
                    document,
                },
            );
        }
        Ok(())
    }
}

pub struct LocalStore {
    directory: Option<PathBuf>,
    collections: Mutex<HashMap<String, LocalCollection>>,
    upserts: AtomicU64,
}

impl LocalStore {
    pub fn in_memory() -> Self {
        Self {
            directory: None,
            collections: Mutex::new(HashMap::new()),
            upserts: AtomicU64::new(0),
        }
    }

    /// Open (or initialize) a persisted store rooted at `directory`.
    pub async fn open(directory: &Path) -> Result<Self, VectorStoreError> {
        tokio::fs::create_dir_all(directory).await?;

        let mut collections = HashMap::new();
        let mut entries = tokio::fs::read_dir(directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            let collection: LocalCollection = serde_json::from_slice(&bytes)?;
            debug!(
                collection = %collection.name,
                records = collection.records.len(),
                "loaded local collection"
            );
            collections.insert(collection.name.clone(), collection);
        }

        Ok(Self {
            directory: Some(directory.to_path_buf()),
            collections: Mutex::new(collections),
            upserts: AtomicU64::new(0),
        })
    }

    /// Snapshot of one collection.
    pub async fn collection(&self, name: &str) -> Option<LocalCollection> {
        self.collections.lock().await.get(name).cloned()
    }

    /// Number of successful upsert calls since this store was opened.
    pub fn upsert_count(&self) -> u64 {
        self.upserts.load(Ordering::SeqCst)
    }

    async fn persist(&self, collection: &LocalCollection) -> Result<(), VectorStoreError> {
        let Some(ref dir) = self.directory else {
            return Ok(());
        };

        let path = dir.join(format!("{}.json", collection.name));
        let tmp = dir.join(format!(".{}.json.tmp", collection.name));
        let bytes = serde_json::to_vec(collection)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for LocalStore {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        match self.directory {
            Some(ref dir) => Ok(tokio::fs::metadata(dir).await.is_ok_and(|m| m.is_dir())),
            None => Ok(true),
        }
    }

    async fn get_or_create_collection(
        &self,
        name: &str,
        metric: DistanceMetric,
        dimension: usize,
    ) -> Result<Collection, VectorStoreError> {
        validate_collection_name(name)?;

        let mut collections = self.collections.lock().await;
        if let Some(existing) = collections.get(name) {
            return Ok(existing.handle());
        }

        let collection = LocalCollection {
            name: name.to_string(),
            distance_metric: metric,
            dimension,
            created_at: chrono::Utc::now().to_rfc3339(),
            records: BTreeMap::new(),
        };
        self.persist(&collection).await?;
        info!(collection = name, distance = %metric, dimension, "created local collection");

        let handle = collection.handle();
        collections.insert(name.to_string(), collection);
        Ok(handle)
    }

    async fn upsert(
        &self,
        collection: &Collection,
        request: BatchWriteRequest,
    ) -> Result<(), VectorStoreError> {
        let mut collections = self.collections.lock().await;
        let current = collections.get(&collection.name).ok_or_else(|| {
            VectorStoreError::CollectionError(format!(
                "collection '{}' does not exist",
                collection.name
            ))
        })?;

        let mut updated = current.clone();
        updated.apply(request)?;
        self.persist(&updated).await?;
        collections.insert(collection.name.clone(), updated);

        self.upserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        match self.directory {
            Some(ref dir) => format!("local ({})", dir.display()),
            None => "local (in memory)".to_string(),
        }
    }
}
