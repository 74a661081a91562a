pub mod embedding;
mod identifier;
mod normalizer;
mod parser;
mod pipeline;
pub mod vector_store;

pub use embedding::{EmbeddingFunction, create_embedder, embed_documents};
pub use identifier::{fallback_id, resolve_id};
pub use normalizer::{normalize_document, normalize_metadata};
pub use parser::parse_documents;
pub use pipeline::{BatchReport, Capabilities, Pipeline, PipelineStage};
pub use vector_store::{LocalStore, VectorStore, create_store, upsert_batch};
