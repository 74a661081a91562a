//! Resolves a stable id for each document in a batch.

use crate::models::{DocumentId, RawMetadata};

/// Id for the document at `position` (0-based) in batch `batch_name`.
///
/// Uses the raw metadata value under `id_field` when it is present and
/// non-empty, otherwise `{batch_name}-{position}`.
pub fn resolve_id(
    metadata: Option<&RawMetadata>,
    id_field: Option<&str>,
    batch_name: &str,
    position: usize,
) -> DocumentId {
    id_field
        .and_then(|field| metadata?.get(field))
        .and_then(|value| value.to_id_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| fallback_id(batch_name, position))
}

pub fn fallback_id(batch_name: &str, position: usize) -> DocumentId {
    format!("{}-{}", batch_name, position)
}
