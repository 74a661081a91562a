//! HuggingFace Inference API (feature-extraction pipeline).

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{
    Chunking, EmbeddingFunction, check_status, require_api_key, require_model, send_error,
};
use crate::error::EmbeddingError;
use crate::models::{EmbeddingConfig, EmbeddingVector};

#[derive(Serialize)]
struct FeatureExtractionRequest<'a> {
    inputs: &'a [String],
    options: RequestOptions,
}

#[derive(Serialize)]
struct RequestOptions {
    /// Block until a cold model is loaded instead of failing with 503.
    wait_for_model: bool,
}

#[derive(Debug, Clone)]
pub struct HuggingFaceEmbedder {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    chunking: Chunking,
}

impl HuggingFaceEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let api_key = require_api_key(config)?;
        let model = require_model(config)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::ConnectionError(e.to_string()))?;

        let endpoint = format!(
            "{}/pipeline/feature-extraction/{}",
            config.endpoint().trim_end_matches('/'),
            model
        );

        Ok(Self {
            client,
            api_key,
            endpoint,
            model,
            chunking: Chunking::from_config(config),
        })
    }

    async fn embed_single_batch(
        &self,
        texts: &[String],
    ) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
        let request = FeatureExtractionRequest {
            inputs: texts,
            options: RequestOptions {
                wait_for_model: true,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(send_error)?;

        check_status(response)
            .await?
            .json::<Vec<EmbeddingVector>>()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl EmbeddingFunction for HuggingFaceEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        self.chunking
            .embed("huggingface feature-extraction", texts, |chunk| {
                self.embed_single_batch(chunk)
            })
            .await
    }

    fn describe(&self) -> String {
        format!("huggingface ({})", self.model)
    }
}
