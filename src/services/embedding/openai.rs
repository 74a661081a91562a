//! OpenAI-compatible embeddings client, including Azure OpenAI deployments.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{
    Chunking, EmbeddingFunction, check_status, require_api_key, require_model, send_error,
};
use crate::error::EmbeddingError;
use crate::models::{EmbeddingConfig, EmbeddingVector, OpenAiApiType};

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    /// `api-version` query parameter, sent for Azure deployments.
    api_version: Option<String>,
    model: String,
    chunking: Chunking,
}

fn auth_headers(config: &EmbeddingConfig, api_key: &str) -> Result<HeaderMap, EmbeddingError> {
    let invalid_key = |_| EmbeddingError::ConnectionError("invalid OpenAI API key".into());

    let mut headers = HeaderMap::new();
    match config.api_type {
        OpenAiApiType::OpenAi => {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(invalid_key)?,
            );
        }
        OpenAiApiType::Azure => {
            headers.insert("api-key", HeaderValue::from_str(api_key).map_err(invalid_key)?);
        }
    }
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(ref org) = config.organization {
        headers.insert(
            "OpenAI-Organization",
            HeaderValue::from_str(org).map_err(|_| {
                EmbeddingError::ConnectionError("invalid OpenAI organization id".into())
            })?,
        );
    }
    Ok(headers)
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let api_key = require_api_key(config)?;
        let model = require_model(config)?;

        let api_version = match config.api_type {
            OpenAiApiType::OpenAi => None,
            OpenAiApiType::Azure => Some(
                config
                    .api_version
                    .clone()
                    .filter(|v| !v.is_empty())
                    .ok_or_else(|| {
                        EmbeddingError::ConnectionError(
                            "Azure OpenAI requires an api_version".into(),
                        )
                    })?,
            ),
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(auth_headers(config, &api_key)?)
            .build()
            .map_err(|e| EmbeddingError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.endpoint().trim_end_matches('/')),
            api_version,
            model,
            chunking: Chunking::from_config(config),
        })
    }

    async fn embed_single_batch(
        &self,
        texts: &[String],
    ) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(ref version) = self.api_version {
            builder = builder.query(&[("api-version", version.as_str())]);
        }
        let response = builder.send().await.map_err(send_error)?;

        let parsed: EmbeddingResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        Ok(into_ordered(parsed))
    }
}

/// Entries may come back in any order; `index` is authoritative.
fn into_ordered(mut response: EmbeddingResponse) -> Vec<EmbeddingVector> {
    response.data.sort_by_key(|entry| entry.index);
    response
        .data
        .into_iter()
        .map(|entry| entry.embedding)
        .collect()
}

#[async_trait]
impl EmbeddingFunction for OpenAiEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        self.chunking
            .embed("openai embeddings", texts, |chunk| self.embed_single_batch(chunk))
            .await
    }

    fn describe(&self) -> String {
        match self.api_version {
            Some(_) => format!("azure openai ({})", self.model),
            None => format!("openai ({})", self.model),
        }
    }
}
