use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use super::metadata::{NormalizedMetadata, RawMetadata};
use crate::error::VectorStoreError;

/// Attributes describing where a batch came from (`filename`, `path`, ...).
pub type BatchAttributes = BTreeMap<String, String>;

pub type DocumentId = String;

pub type EmbeddingVector = Vec<f32>;

/// One decoded input line.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    /// 1-based line number in the payload.
    pub line: usize,
    pub text: Option<String>,
    pub metadata: Option<RawMetadata>,
}

/// A payload submitted as one unit of work.
#[derive(Debug, Clone)]
pub struct Batch {
    pub name: String,
    pub payload: Vec<u8>,
    pub attributes: BatchAttributes,
}

impl Batch {
    pub fn new(name: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        let name = name.into();
        let mut attributes = BatchAttributes::new();
        attributes.insert("filename".to_string(), name.clone());
        Self {
            name,
            payload: payload.into(),
            attributes,
        }
    }

    /// Build a batch from a file, named after the file's base name.
    pub fn from_file(path: &Path, payload: Vec<u8>) -> Self {
        let name = path
            .file_name()
            .map_or_else(|| path.to_string_lossy(), |n| n.to_string_lossy())
            .into_owned();
        let mut batch = Self::new(name, payload);
        batch
            .attributes
            .insert("path".to_string(), path.to_string_lossy().into_owned());
        batch
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Index-aligned write covering a whole batch.
///
/// Construction through [`BatchWriteRequest::new`] guarantees every sequence
/// has the same length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchWriteRequest {
    ids: Vec<DocumentId>,
    embeddings: Vec<EmbeddingVector>,
    metadatas: Vec<NormalizedMetadata>,
    /// `None` when document text is not to be stored.
    texts: Option<Vec<Option<String>>>,
}

impl BatchWriteRequest {
    pub fn new(
        ids: Vec<DocumentId>,
        embeddings: Vec<EmbeddingVector>,
        metadatas: Vec<NormalizedMetadata>,
        texts: Option<Vec<Option<String>>>,
    ) -> Result<Self, VectorStoreError> {
        let n = ids.len();
        if embeddings.len() != n {
            return Err(VectorStoreError::Misaligned(format!(
                "{} ids but {} embeddings",
                n,
                embeddings.len()
            )));
        }
        if metadatas.len() != n {
            return Err(VectorStoreError::Misaligned(format!(
                "{} ids but {} metadatas",
                n,
                metadatas.len()
            )));
        }
        if let Some(ref texts) = texts
            && texts.len() != n
        {
            return Err(VectorStoreError::Misaligned(format!(
                "{} ids but {} texts",
                n,
                texts.len()
            )));
        }

        Ok(Self {
            ids,
            embeddings,
            metadatas,
            texts,
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[DocumentId] {
        &self.ids
    }

    pub fn embeddings(&self) -> &[EmbeddingVector] {
        &self.embeddings
    }

    pub fn metadatas(&self) -> &[NormalizedMetadata] {
        &self.metadatas
    }

    pub fn texts(&self) -> Option<&[Option<String>]> {
        self.texts.as_deref()
    }

    /// Vector length of the first embedding, if any.
    pub fn dimension(&self) -> Option<usize> {
        self.embeddings.first().map(Vec::len)
    }

    pub fn into_parts(
        self,
    ) -> (
        Vec<DocumentId>,
        Vec<EmbeddingVector>,
        Vec<NormalizedMetadata>,
        Option<Vec<Option<String>>>,
    ) {
        (self.ids, self.embeddings, self.metadatas, self.texts)
    }
}
