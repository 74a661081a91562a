//! Runs one batch through parse, normalize, embed and upsert.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::embedding::{EmbeddingFunction, embed_documents};
use super::identifier::resolve_id;
use super::normalizer::normalize_document;
use super::parser::parse_documents;
use super::vector_store::{VectorStore, upsert_batch};
use crate::error::IngestError;
use crate::models::{
    Batch, BatchSettings, BatchWriteRequest, DocumentId, NormalizedMetadata, RawDocument,
};

/// External services a pipeline writes through.
#[derive(Clone)]
pub struct Capabilities {
    pub embedder: Arc<dyn EmbeddingFunction>,
    pub store: Arc<dyn VectorStore>,
}

impl Capabilities {
    pub fn new(embedder: Arc<dyn EmbeddingFunction>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Idle,
    Parsing,
    Normalizing,
    Embedding,
    Upserting,
    Done,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::Idle => write!(f, "idle"),
            PipelineStage::Parsing => write!(f, "parsing"),
            PipelineStage::Normalizing => write!(f, "normalizing"),
            PipelineStage::Embedding => write!(f, "embedding"),
            PipelineStage::Upserting => write!(f, "upserting"),
            PipelineStage::Done => write!(f, "done"),
            PipelineStage::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch: String,
    pub collection: String,
    pub documents: usize,
    pub stage: PipelineStage,
    #[serde(serialize_with = "serialize_millis", rename = "elapsed_ms")]
    pub elapsed: Duration,
}

fn serialize_millis<S: serde::Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
}

/// Per-run stage tracker; each run gets its own.
struct Run<'a> {
    batch: &'a str,
    stage: PipelineStage,
}

impl<'a> Run<'a> {
    fn new(batch: &'a str) -> Self {
        Self {
            batch,
            stage: PipelineStage::Idle,
        }
    }

    fn enter(&mut self, stage: PipelineStage) {
        debug!(batch = self.batch, from = %self.stage, to = %stage, "pipeline stage");
        self.stage = stage;
    }

    fn fail(&mut self, error: IngestError) -> IngestError {
        warn!(batch = self.batch, stage = %self.stage, error = %error, "batch failed");
        self.stage = PipelineStage::Failed;
        error
    }
}

/// Ingestion pipeline shared across batch runs.
pub struct Pipeline {
    capabilities: Capabilities,
}

impl Pipeline {
    pub fn new(capabilities: Capabilities) -> Self {
        Self { capabilities }
    }

    /// Ingest one batch. Either every document is written or none is.
    pub async fn run(
        &self,
        batch: &Batch,
        settings: &BatchSettings,
    ) -> Result<BatchReport, IngestError> {
        let started = Instant::now();
        let mut run = Run::new(&batch.name);

        run.enter(PipelineStage::Parsing);
        let documents = parse_documents(&batch.payload).map_err(|e| run.fail(e))?;

        if documents.is_empty() {
            run.enter(PipelineStage::Done);
            info!(batch = %batch.name, "batch is empty, nothing to write");
            return Ok(BatchReport {
                batch: batch.name.clone(),
                collection: settings.collection.clone(),
                documents: 0,
                stage: run.stage,
                elapsed: started.elapsed(),
            });
        }

        run.enter(PipelineStage::Normalizing);
        let (ids, metadatas) =
            prepare_records(&documents, settings, &batch.name).map_err(|e| run.fail(e))?;

        run.enter(PipelineStage::Embedding);
        let embeddings = embed_documents(self.capabilities.embedder.as_ref(), &documents)
            .await
            .map_err(|e| run.fail(e.into()))?;

        let texts = settings
            .store_text
            .then(|| documents.into_iter().map(|doc| doc.text).collect());
        let request = BatchWriteRequest::new(ids, embeddings, metadatas, texts)
            .map_err(|e| run.fail(e.into()))?;
        let count = request.len();

        run.enter(PipelineStage::Upserting);
        let collection = upsert_batch(
            self.capabilities.store.as_ref(),
            &settings.collection,
            settings.distance,
            request,
        )
        .await
        .map_err(|e| run.fail(e.into()))?;

        run.enter(PipelineStage::Done);
        let elapsed = started.elapsed();
        info!(
            batch = %batch.name,
            collection = %collection.name,
            documents = count,
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "batch ingested"
        );

        Ok(BatchReport {
            batch: batch.name.clone(),
            collection: collection.name,
            documents: count,
            stage: run.stage,
            elapsed,
        })
    }

    /// Close both capabilities. The embedder is closed even if the store fails.
    pub async fn shutdown(self) -> Result<(), IngestError> {
        let store = self.capabilities.store.close().await;
        let embedder = self.capabilities.embedder.close().await;
        store?;
        embedder?;
        Ok(())
    }
}

/// Normalized metadata and resolved ids, index-aligned with `documents`.
fn prepare_records(
    documents: &[RawDocument],
    settings: &BatchSettings,
    batch_name: &str,
) -> Result<(Vec<DocumentId>, Vec<NormalizedMetadata>), IngestError> {
    let mut ids = Vec::with_capacity(documents.len());
    let mut metadatas = Vec::with_capacity(documents.len());

    for (position, document) in documents.iter().enumerate() {
        metadatas.push(normalize_document(document)?);
        ids.push(resolve_id(
            document.metadata.as_ref(),
            settings.id_field.as_deref(),
            batch_name,
            position,
        ));
    }

    Ok((ids, metadatas))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EmbeddingError, VectorStoreError};
    use crate::models::{DistanceMetric, EmbeddingVector, Scalar};
    use crate::services::vector_store::LocalStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingEmbedder {
        calls: AtomicUsize,
        closed: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingFunction for CountingEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }

        async fn close(&self) -> Result<(), EmbeddingError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingFunction for FailingEmbedder {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
            Err(EmbeddingError::ServerError("status 400: bad input".to_string()))
        }

        fn describe(&self) -> String {
            "failing".to_string()
        }
    }

    fn setup() -> (Pipeline, Arc<CountingEmbedder>, Arc<LocalStore>) {
        let embedder = Arc::new(CountingEmbedder::default());
        let store = Arc::new(LocalStore::in_memory());
        let pipeline = Pipeline::new(Capabilities::new(embedder.clone(), store.clone()));
        (pipeline, embedder, store)
    }

    #[tokio::test]
    async fn test_run_writes_every_document() {
        let (pipeline, embedder, store) = setup();
        let batch = Batch::new(
            "doc.json",
            "{\"text\": \"hello\", \"metadata\": {\"tags\": [\"a\", \"b\"]}}\n\
             {\"text\": \"world\", \"metadata\": {\"k\": null, \"j\": 1}}\n",
        );

        let report = pipeline
            .run(&batch, &BatchSettings::new("docs"))
            .await
            .unwrap();
        assert_eq!(report.documents, 2);
        assert_eq!(report.stage, PipelineStage::Done);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);

        let collection = store.collection("docs").await.unwrap();
        assert_eq!(collection.records["doc.json-0"].metadata["tags_2"], Scalar::from("b"));
        assert_eq!(collection.records["doc.json-1"].metadata.len(), 1);
        assert_eq!(
            collection.records["doc.json-1"].document.as_deref(),
            Some("world")
        );
    }

    #[tokio::test]
    async fn test_empty_batch_touches_nothing() {
        let (pipeline, embedder, store) = setup();
        let report = pipeline
            .run(&Batch::new("empty", "\n  \n"), &BatchSettings::new("docs"))
            .await
            .unwrap();
        assert_eq!(report.documents, 0);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert!(store.collection("docs").await.is_none());
    }

    #[tokio::test]
    async fn test_missing_metadata_fails_before_embedding() {
        let (pipeline, embedder, store) = setup();
        let batch = Batch::new("b", "{\"text\": \"no metadata\"}\n");
        let err = pipeline
            .run(&batch, &BatchSettings::new("docs"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::InvalidDocument { line: 1, .. }));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.upsert_count(), 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_writes_nothing() {
        let store = Arc::new(LocalStore::in_memory());
        let pipeline = Pipeline::new(Capabilities::new(Arc::new(FailingEmbedder), store.clone()));
        let batch = Batch::new("b", "{\"text\": \"x\", \"metadata\": {}}\n");

        let err = pipeline
            .run(&batch, &BatchSettings::new("docs"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::EmbeddingFailure(_)));
        assert!(store.collection("docs").await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_collection_is_storage_failure() {
        let (pipeline, _, _) = setup();
        let batch = Batch::new("b", "{\"text\": \"x\", \"metadata\": {}}\n");
        let err = pipeline
            .run(
                &batch,
                &BatchSettings::new("bad name").with_distance(DistanceMetric::L2),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::StorageFailure(VectorStoreError::CollectionError(_))
        ));
    }

    #[tokio::test]
    async fn test_shutdown_closes_capabilities() {
        let (pipeline, embedder, _) = setup();
        pipeline.shutdown().await.unwrap();
        assert_eq!(embedder.closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_report_serializes_millis() {
        let report = BatchReport {
            batch: "b".to_string(),
            collection: "docs".to_string(),
            documents: 3,
            stage: PipelineStage::Done,
            elapsed: Duration::from_millis(42),
        };
        let value = serde_json::to_value(report).unwrap();
        assert_eq!(value["elapsed_ms"], 42);
        assert_eq!(value["stage"], "done");
    }
}
