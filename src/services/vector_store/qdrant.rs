//! Qdrant vector store backend implementation.

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, Struct, UpsertPointsBuilder, Value,
    VectorParamsBuilder, value::Kind, vectors_config,
};
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use super::{VectorStore, validate_collection_name};
use crate::error::VectorStoreError;
use crate::models::{
    BatchWriteRequest, Collection, DistanceMetric, NormalizedMetadata, Scalar, StoreConfig,
};

/// Payload key holding the caller's document id.
pub const DOCUMENT_ID_KEY: &str = "document_id";
/// Payload key holding the document text when text storage is enabled.
pub const DOCUMENT_TEXT_KEY: &str = "document";
/// Payload key holding the document's metadata as a nested object.
pub const METADATA_KEY: &str = "metadata";

pub struct QdrantStore {
    client: Qdrant,
    url: String,
}

impl QdrantStore {
    pub fn new(config: &StoreConfig) -> Result<Self, VectorStoreError> {
        let url = config.endpoint().to_string();
        let mut builder =
            Qdrant::from_url(&url).timeout(Duration::from_secs(config.timeout_secs));

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        Ok(Self { client, url })
    }

    async fn existing_metric(&self, name: &str) -> Result<DistanceMetric, VectorStoreError> {
        let info = self
            .client
            .collection_info(name)
            .await
            .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;

        let config = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config);

        match config {
            Some(vectors_config::Config::Params(params)) => {
                let distance = Distance::try_from(params.distance).map_err(|_| {
                    VectorStoreError::CollectionError(format!(
                        "collection '{}' reports unknown distance {}",
                        name, params.distance
                    ))
                })?;
                from_qdrant_distance(distance).ok_or_else(|| {
                    VectorStoreError::CollectionError(format!(
                        "collection '{}' uses unsupported distance {:?}",
                        name, distance
                    ))
                })
            }
            Some(vectors_config::Config::ParamsMap(_)) => Err(VectorStoreError::CollectionError(
                format!("collection '{}' uses named vectors, which are not supported", name),
            )),
            None => Err(VectorStoreError::CollectionError(format!(
                "collection '{}' has no vector configuration",
                name
            ))),
        }
    }
}

fn to_qdrant_distance(metric: DistanceMetric) -> Distance {
    match metric {
        DistanceMetric::Cosine => Distance::Cosine,
        DistanceMetric::L2 => Distance::Euclid,
        DistanceMetric::Ip => Distance::Dot,
    }
}

fn from_qdrant_distance(distance: Distance) -> Option<DistanceMetric> {
    match distance {
        Distance::Cosine => Some(DistanceMetric::Cosine),
        Distance::Euclid => Some(DistanceMetric::L2),
        Distance::Dot => Some(DistanceMetric::Ip),
        _ => None,
    }
}

/// Qdrant point ids must be integers or UUIDs, so string ids map to UUIDv5.
pub fn point_id(document_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, document_id.as_bytes()).to_string()
}

fn scalar_value(scalar: Scalar) -> Value {
    match scalar {
        Scalar::Bool(b) => b.into(),
        Scalar::Int(i) => i.into(),
        Scalar::Float(f) => f.into(),
        Scalar::String(s) => s.into(),
    }
}

fn metadata_value(metadata: NormalizedMetadata) -> Value {
    let fields = metadata
        .into_iter()
        .map(|(key, value)| (key, scalar_value(value)))
        .collect();
    Value {
        kind: Some(Kind::StructValue(Struct { fields })),
    }
}

/// User metadata is nested under [`METADATA_KEY`] so its keys never collide
/// with the id and text fields.
fn build_points(request: BatchWriteRequest) -> Vec<PointStruct> {
    let (ids, embeddings, metadatas, texts) = request.into_parts();
    let mut texts = texts.map(Vec::into_iter);

    ids.into_iter()
        .zip(embeddings)
        .zip(metadatas)
        .map(|((id, embedding), metadata)| {
            let mut payload: HashMap<String, Value> = HashMap::new();
            payload.insert(METADATA_KEY.to_string(), metadata_value(metadata));
            if let Some(text) = texts.as_mut().and_then(Iterator::next).flatten() {
                payload.insert(DOCUMENT_TEXT_KEY.to_string(), text.into());
            }
            let uuid = point_id(&id);
            payload.insert(DOCUMENT_ID_KEY.to_string(), id.into());

            PointStruct::new(uuid, embedding, payload)
        })
        .collect()
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        self.client
            .health_check()
            .await
            .map(|_| true)
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))
    }

    async fn get_or_create_collection(
        &self,
        name: &str,
        metric: DistanceMetric,
        dimension: usize,
    ) -> Result<Collection, VectorStoreError> {
        validate_collection_name(name)?;

        let exists = self
            .client
            .collection_exists(name)
            .await
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        let distance_metric = if exists {
            self.existing_metric(name).await?
        } else {
            let create = CreateCollectionBuilder::new(name).vectors_config(
                VectorParamsBuilder::new(dimension as u64, to_qdrant_distance(metric)),
            );
            match self.client.create_collection(create).await {
                Ok(_) => {
                    info!(collection = name, distance = %metric, dimension, "created qdrant collection");
                    metric
                }
                // Another writer created it between the check and the create.
                Err(e) if e.to_string().contains("already exists") => {
                    self.existing_metric(name).await?
                }
                Err(e) => return Err(VectorStoreError::CollectionError(e.to_string())),
            }
        };

        Ok(Collection {
            name: name.to_string(),
            id: name.to_string(),
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

        let upsert = UpsertPointsBuilder::new(&collection.id, build_points(request)).wait(true);
        self.client
            .upsert_points(upsert)
            .await
            .map_err(|e| VectorStoreError::UpsertError(e.to_string()))?;

        Ok(())
    }

    fn describe(&self) -> String {
        format!("qdrant ({})", self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string_value(value: &Value) -> Option<&str> {
        match value.kind {
            Some(Kind::StringValue(ref s)) => Some(s.as_str()),
            _ => None,
        }
    }

    fn metadata_fields(point: &PointStruct) -> &HashMap<String, Value> {
        match point.payload.get(METADATA_KEY).and_then(|v| v.kind.as_ref()) {
            Some(Kind::StructValue(s)) => &s.fields,
            other => panic!("expected metadata struct, got {:?}", other),
        }
    }

    #[test]
    fn test_point_id_is_stable_uuid() {
        let a = point_id("doc-1");
        assert_eq!(a, point_id("doc-1"));
        assert_ne!(a, point_id("doc-2"));
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_distance_mapping() {
        for metric in [DistanceMetric::Cosine, DistanceMetric::L2, DistanceMetric::Ip] {
            assert_eq!(from_qdrant_distance(to_qdrant_distance(metric)), Some(metric));
        }
        assert_eq!(from_qdrant_distance(Distance::Manhattan), None);
    }

    #[test]
    fn test_build_points_payload() {
        let mut metadata = NormalizedMetadata::new();
        metadata.insert("lang".to_string(), Scalar::from("en"));
        metadata.insert("page".to_string(), Scalar::Int(3));

        let request = BatchWriteRequest::new(
            vec!["doc-1".to_string()],
            vec![vec![0.1, 0.2]],
            vec![metadata],
            Some(vec![Some("hello".to_string())]),
        )
        .unwrap();

        let points = build_points(request);
        assert_eq!(points.len(), 1);
        let payload = &points[0].payload;
        assert_eq!(payload.get(DOCUMENT_ID_KEY).and_then(string_value), Some("doc-1"));
        assert_eq!(payload.get(DOCUMENT_TEXT_KEY).and_then(string_value), Some("hello"));
        assert_eq!(payload.len(), 3);

        let fields = metadata_fields(&points[0]);
        assert_eq!(fields.get("lang").and_then(string_value), Some("en"));
        assert!(matches!(
            fields.get("page").and_then(|v| v.kind.as_ref()),
            Some(Kind::IntegerValue(3))
        ));
    }

    #[test]
    fn test_metadata_keys_do_not_shadow_reserved_fields() {
        let mut metadata = NormalizedMetadata::new();
        metadata.insert(DOCUMENT_ID_KEY.to_string(), Scalar::from("upstream-77"));
        metadata.insert(DOCUMENT_TEXT_KEY.to_string(), Scalar::from("chapter 3"));

        let request = BatchWriteRequest::new(
            vec!["doc.json-0".to_string()],
            vec![vec![0.5]],
            vec![metadata],
            Some(vec![Some("body text".to_string())]),
        )
        .unwrap();

        let points = build_points(request);
        let payload = &points[0].payload;
        assert_eq!(payload.get(DOCUMENT_ID_KEY).and_then(string_value), Some("doc.json-0"));
        assert_eq!(payload.get(DOCUMENT_TEXT_KEY).and_then(string_value), Some("body text"));

        let fields = metadata_fields(&points[0]);
        assert_eq!(fields.get(DOCUMENT_ID_KEY).and_then(string_value), Some("upstream-77"));
        assert_eq!(fields.get(DOCUMENT_TEXT_KEY).and_then(string_value), Some("chapter 3"));
    }

    #[test]
    fn test_build_points_without_text() {
        let request = BatchWriteRequest::new(
            vec!["doc-1".to_string()],
            vec![vec![0.1]],
            vec![NormalizedMetadata::new()],
            None,
        )
        .unwrap();
        let points = build_points(request);
        assert!(!points[0].payload.contains_key(DOCUMENT_TEXT_KEY));
        assert!(metadata_fields(&points[0]).is_empty());
    }

    #[test]
    fn test_describe() {
        let store = QdrantStore::new(&StoreConfig::default()).unwrap();
        assert_eq!(store.describe(), "qdrant (http://localhost:6334)");
    }
}
