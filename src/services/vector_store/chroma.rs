//! Chroma vector store backend over the v1 REST API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{VectorStore, validate_collection_name};
use crate::error::VectorStoreError;
use crate::models::{
    AuthStrategy, BatchWriteRequest, Collection, DistanceMetric, DocumentId, EmbeddingVector,
    NormalizedMetadata, StoreConfig,
};

/// Collection metadata key Chroma reads the distance function from.
const SPACE_KEY: &str = "hnsw:space";

#[derive(Debug, Clone)]
enum Credentials {
    None,
    Token(String),
    Basic { username: String, password: String },
}

#[derive(Serialize)]
struct CreateCollectionRequest<'a> {
    name: &'a str,
    metadata: serde_json::Map<String, Value>,
    get_or_create: bool,
}

#[derive(Debug, Deserialize)]
struct CollectionResponse {
    id: String,
    name: String,
    #[serde(default)]
    metadata: Option<serde_json::Map<String, Value>>,
}

#[derive(Serialize)]
struct UpsertRequest {
    ids: Vec<DocumentId>,
    embeddings: Vec<EmbeddingVector>,
    /// Chroma rejects empty metadata objects, so those go out as `null`.
    metadatas: Vec<Option<NormalizedMetadata>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    documents: Option<Vec<Option<String>>>,
}

impl From<BatchWriteRequest> for UpsertRequest {
    fn from(request: BatchWriteRequest) -> Self {
        let (ids, embeddings, metadatas, documents) = request.into_parts();
        Self {
            ids,
            embeddings,
            metadatas: metadatas
                .into_iter()
                .map(|m| (!m.is_empty()).then_some(m))
                .collect(),
            documents,
        }
    }
}

pub struct ChromaStore {
    client: Client,
    base_url: String,
    credentials: Credentials,
}

impl ChromaStore {
    pub fn new(config: &StoreConfig) -> Result<Self, VectorStoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        let credentials = match config.auth {
            AuthStrategy::None => Credentials::None,
            AuthStrategy::Token => Credentials::Token(config.api_key.clone().ok_or_else(|| {
                VectorStoreError::ClientError("token authentication requires an api key".into())
            })?),
            AuthStrategy::Basic => match (&config.username, &config.password) {
                (Some(username), Some(password)) => Credentials::Basic {
                    username: username.clone(),
                    password: password.clone(),
                },
                _ => {
                    return Err(VectorStoreError::ClientError(
                        "basic authentication requires username and password".into(),
                    ));
                }
            },
        };

        Ok(Self {
            client,
            base_url: config.endpoint().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.credentials {
            Credentials::None => request,
            Credentials::Token(ref token) => request.bearer_auth(token),
            Credentials::Basic {
                ref username,
                ref password,
            } => request.basic_auth(username, Some(password)),
        }
    }

    async fn send(
        &self,
        request: RequestBuilder,
        map_err: fn(String) -> VectorStoreError,
    ) -> Result<Response, VectorStoreError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_err(format!("status {}: {}", status, body)));
        }
        Ok(response)
    }
}

/// Chroma defaults to l2 when a collection carries no `hnsw:space`.
fn metric_from_metadata(
    metadata: Option<&serde_json::Map<String, Value>>,
) -> Result<DistanceMetric, VectorStoreError> {
    match metadata.and_then(|m| m.get(SPACE_KEY)).and_then(Value::as_str) {
        Some(space) => space.parse().map_err(VectorStoreError::CollectionError),
        None => Ok(DistanceMetric::L2),
    }
}

#[async_trait]
impl VectorStore for ChromaStore {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        let url = format!("{}/api/v1/heartbeat", self.base_url);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;
        Ok(response.status().is_success())
    }

    async fn get_or_create_collection(
        &self,
        name: &str,
        metric: DistanceMetric,
        _dimension: usize,
    ) -> Result<Collection, VectorStoreError> {
        validate_collection_name(name)?;

        let mut metadata = serde_json::Map::new();
        metadata.insert(SPACE_KEY.to_string(), Value::String(metric.to_string()));
        let body = CreateCollectionRequest {
            name,
            metadata,
            get_or_create: true,
        };

        let url = format!("{}/api/v1/collections", self.base_url);
        let response = self
            .send(
                self.client.post(&url).json(&body),
                VectorStoreError::CollectionError,
            )
            .await?;

        let collection: CollectionResponse = response
            .json()
            .await
            .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;
        let distance_metric = metric_from_metadata(collection.metadata.as_ref())?;
        debug!(collection = %collection.name, id = %collection.id, distance = %distance_metric, "resolved chroma collection");

        Ok(Collection {
            name: collection.name,
            id: collection.id,
            distance_metric,
        })
    }

    async fn upsert(
        &self,
        collection: &Collection,
        request: BatchWriteRequest,
    ) -> Result<(), VectorStoreError> {
        if request.is_empty() {
            return Ok(());
        }

        let url = format!(
            "{}/api/v1/collections/{}/upsert",
            self.base_url, collection.id
        );
        let body = UpsertRequest::from(request);
        self.send(
            self.client.post(&url).json(&body),
            VectorStoreError::UpsertError,
        )
        .await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("chroma ({})", self.base_url)
    }
}
