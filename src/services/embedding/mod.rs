//! Embedding functions and the batch embedder.

mod http;
mod huggingface;
mod openai;

pub use http::HttpEmbedder;
pub use huggingface::HuggingFaceEmbedder;
pub use openai::OpenAiEmbedder;

use async_trait::async_trait;
use reqwest::Response;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use crate::error::EmbeddingError;
use crate::models::{EmbeddingConfig, EmbeddingProvider, EmbeddingVector, RawDocument};
use crate::utils::RetryPolicy;

/// Maps texts to vectors.
///
/// Implementations must return one vector per input text, in input order.
#[async_trait]
pub trait EmbeddingFunction: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, EmbeddingError>;

    async fn health_check(&self) -> Result<bool, EmbeddingError> {
        Ok(true)
    }

    /// Release any held resources.
    async fn close(&self) -> Result<(), EmbeddingError> {
        Ok(())
    }

    /// Human-readable description for status output.
    fn describe(&self) -> String;
}

/// Embed every document of a batch in a single call.
///
/// Absent text is sent as the empty string.
pub async fn embed_documents(
    embedder: &dyn EmbeddingFunction,
    documents: &[RawDocument],
) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
    let texts: Vec<String> = documents
        .iter()
        .map(|doc| doc.text.clone().unwrap_or_default())
        .collect();

    let embeddings = embedder.embed(&texts).await?;
    if embeddings.len() != texts.len() {
        return Err(EmbeddingError::CountMismatch {
            expected: texts.len(),
            actual: embeddings.len(),
        });
    }

    debug!(
        count = embeddings.len(),
        dimension = embeddings.first().map_or(0, Vec::len),
        "computed embeddings"
    );
    Ok(embeddings)
}

/// Build the embedding function selected by configuration.
pub fn create_embedder(
    config: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingFunction>, EmbeddingError> {
    match config.provider {
        EmbeddingProvider::Http => Ok(Arc::new(HttpEmbedder::new(config)?)),
        EmbeddingProvider::OpenAi => Ok(Arc::new(OpenAiEmbedder::new(config)?)),
        EmbeddingProvider::HuggingFace => Ok(Arc::new(HuggingFaceEmbedder::new(config)?)),
    }
}

/// Splits requests into provider-sized chunks and retries each chunk.
#[derive(Debug, Clone)]
struct Chunking {
    batch_size: usize,
    retry: RetryPolicy,
}

impl Chunking {
    fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            batch_size: (config.batch_size as usize).max(1),
            retry: RetryPolicy::new(config.max_retries.saturating_add(1)),
        }
    }

    /// Every chunk must come back with exactly one vector per text.
    async fn embed<'a, F, Fut>(
        &self,
        what: &str,
        texts: &'a [String],
        embed_chunk: F,
    ) -> Result<Vec<EmbeddingVector>, EmbeddingError>
    where
        F: Fn(&'a [String]) -> Fut,
        Fut: Future<Output = Result<Vec<EmbeddingVector>, EmbeddingError>>,
    {
        let mut all_embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            let embeddings = self.retry.run(what, || embed_chunk(chunk)).await?;
            if embeddings.len() != chunk.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: chunk.len(),
                    actual: embeddings.len(),
                });
            }
            all_embeddings.extend(embeddings);
        }

        Ok(all_embeddings)
    }
}

fn send_error(e: reqwest::Error) -> EmbeddingError {
    if e.is_timeout() {
        EmbeddingError::Timeout
    } else {
        EmbeddingError::RequestError(e)
    }
}

/// Non-2xx responses become a `ServerError` carrying the body.
async fn check_status(response: Response) -> Result<Response, EmbeddingError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(EmbeddingError::ServerError(format!(
        "status {}: {}",
        status, body
    )))
}

fn require_api_key(config: &EmbeddingConfig) -> Result<String, EmbeddingError> {
    config
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            EmbeddingError::ConnectionError(format!(
                "missing API key for the {} embedding provider",
                config.provider
            ))
        })
}

fn require_model(config: &EmbeddingConfig) -> Result<String, EmbeddingError> {
    config
        .model_name()
        .map(str::to_string)
        .ok_or_else(|| {
            EmbeddingError::ConnectionError(format!(
                "missing model name for the {} embedding provider",
                config.provider
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEmbedder {
        vectors: usize,
    }

    #[async_trait]
    impl EmbeddingFunction for FixedEmbedder {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
            Ok(vec![vec![1.0, 0.0]; self.vectors])
        }

        fn describe(&self) -> String {
            "fixed".to_string()
        }
    }

    fn doc(line: usize, text: Option<&str>) -> RawDocument {
        RawDocument {
            line,
            text: text.map(str::to_string),
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_embed_documents_checks_count() {
        let docs = vec![doc(1, Some("a")), doc(2, None)];

        let ok = embed_documents(&FixedEmbedder { vectors: 2 }, &docs).await;
        assert_eq!(ok.unwrap().len(), 2);

        let err = embed_documents(&FixedEmbedder { vectors: 1 }, &docs)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::CountMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    fn chunking(batch_size: u32, max_retries: u32) -> Chunking {
        let mut chunking = Chunking::from_config(&EmbeddingConfig {
            batch_size,
            max_retries,
            ..Default::default()
        });
        chunking.retry = chunking
            .retry
            .with_initial_delay(std::time::Duration::from_millis(1));
        chunking
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("t{}", i)).collect()
    }

    #[tokio::test]
    async fn test_chunking_splits_and_preserves_order() {
        let sizes = std::sync::Mutex::new(Vec::new());
        let input = texts(5);

        let vectors = chunking(2, 0)
            .embed("test", &input, |chunk| {
                sizes.lock().unwrap().push(chunk.len());
                let out: Vec<EmbeddingVector> = chunk
                    .iter()
                    .map(|t| vec![t[1..].parse::<f32>().unwrap()])
                    .collect();
                async move { Ok::<_, EmbeddingError>(out) }
            })
            .await
            .unwrap();

        assert_eq!(*sizes.lock().unwrap(), vec![2, 2, 1]);
        assert_eq!(
            vectors,
            vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0], vec![4.0]]
        );
    }

    #[tokio::test]
    async fn test_chunking_rejects_short_chunk() {
        let input = texts(3);
        let err = chunking(2, 0)
            .embed("test", &input, |_chunk| async {
                Ok::<Vec<EmbeddingVector>, EmbeddingError>(vec![vec![1.0]])
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::CountMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[tokio::test]
    async fn test_chunking_retries_transient_failures() {
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let input = texts(1);

        let vectors = chunking(8, 2)
            .embed("test", &input, |_chunk| {
                let attempt = attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                async move {
                    let result: Result<Vec<EmbeddingVector>, EmbeddingError> = if attempt == 0 {
                        Err(EmbeddingError::Timeout)
                    } else {
                        Ok(vec![vec![0.5]])
                    };
                    result
                }
            })
            .await
            .unwrap();

        assert_eq!(vectors, vec![vec![0.5]]);
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn test_create_embedder_per_provider() {
        let http = create_embedder(&EmbeddingConfig::default()).unwrap();
        assert!(http.describe().starts_with("http"));

        let missing_key = EmbeddingConfig {
            provider: EmbeddingProvider::OpenAi,
            ..Default::default()
        };
        assert!(create_embedder(&missing_key).is_err());

        let hf = EmbeddingConfig {
            provider: EmbeddingProvider::HuggingFace,
            api_key: Some("hf_test".to_string()),
            ..Default::default()
        };
        assert!(create_embedder(&hf).unwrap().describe().contains("all-MiniLM-L6-v2"));
    }
}
