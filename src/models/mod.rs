mod collection;
mod config;
mod document;
mod format;
mod metadata;
pub mod template;

pub use collection::{Collection, DistanceMetric};
pub use config::{
    AuthStrategy, BatchSettings, Config, DEFAULT_CHROMA_URL, DEFAULT_COLLECTION,
    DEFAULT_EMBEDDING_URL, DEFAULT_HUGGINGFACE_MODEL, DEFAULT_HUGGINGFACE_URL,
    DEFAULT_OPENAI_MODEL, DEFAULT_OPENAI_URL, DEFAULT_QDRANT_URL, EMBEDDING_API_KEY_ENV,
    EmbeddingConfig, EmbeddingProvider, IngestConfig, OpenAiApiType, STORE_API_KEY_ENV,
    StoreConfig, StoreDriver,
};
pub use document::{
    Batch, BatchAttributes, BatchWriteRequest, DocumentId, EmbeddingVector, RawDocument,
};
pub use format::OutputFormat;
pub use metadata::{MetadataValue, NormalizedMetadata, RawMetadata, Scalar, raw_metadata_from_json};
