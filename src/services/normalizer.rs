//! Flattens raw metadata into the shape vector stores accept.

use crate::error::IngestError;
use crate::models::{MetadataValue, NormalizedMetadata, RawDocument, RawMetadata};

/// Normalize one metadata map.
///
/// Nulls are dropped. Lists expand into `{key}_{n}` entries numbered from 1,
/// with null elements skipped but still counted. Scalars copy through.
pub fn normalize_metadata(raw: &RawMetadata) -> NormalizedMetadata {
    let mut normalized = NormalizedMetadata::new();

    for (key, value) in raw {
        match value {
            MetadataValue::Null => {}
            MetadataValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if let Some(scalar) = item {
                        normalized.insert(format!("{}_{}", key, i + 1), scalar.clone());
                    }
                }
            }
            MetadataValue::Scalar(scalar) => {
                normalized.insert(key.clone(), scalar.clone());
            }
        }
    }

    normalized
}

/// Normalize a document's metadata, which must be present.
pub fn normalize_document(document: &RawDocument) -> Result<NormalizedMetadata, IngestError> {
    let raw = document
        .metadata
        .as_ref()
        .ok_or_else(|| IngestError::InvalidDocument {
            line: document.line,
            reason: "missing 'metadata' object".to_string(),
        })?;
    Ok(normalize_metadata(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Scalar, raw_metadata_from_json};
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawMetadata {
        match value {
            serde_json::Value::Object(map) => raw_metadata_from_json(map),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_list_flattening() {
        let normalized = normalize_metadata(&raw(json!({"tags": ["a", "b"]})));
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized["tags_1"], Scalar::from("a"));
        assert_eq!(normalized["tags_2"], Scalar::from("b"));
        assert!(!normalized.contains_key("tags"));
    }

    #[test]
    fn test_null_dropping() {
        let normalized = normalize_metadata(&raw(json!({"k": null, "j": 1})));
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized["j"], Scalar::Int(1));
    }

    #[test]
    fn test_null_list_elements_keep_positions() {
        let normalized = normalize_metadata(&raw(json!({"v": ["x", null, "z"]})));
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized["v_1"], Scalar::from("x"));
        assert_eq!(normalized["v_3"], Scalar::from("z"));
    }

    #[test]
    fn test_scalars_pass_through() {
        let normalized = normalize_metadata(&raw(json!({
            "title": "Intro",
            "page": 3,
            "score": 0.25,
            "draft": false,
            "empty": []
        })));
        assert_eq!(normalized.len(), 4);
        assert_eq!(normalized["title"], Scalar::from("Intro"));
        assert_eq!(normalized["page"], Scalar::Int(3));
        assert_eq!(normalized["score"], Scalar::Float(0.25));
        assert_eq!(normalized["draft"], Scalar::Bool(false));
    }

    #[test]
    fn test_normalization_is_deterministic() {
        let input = raw(json!({"b": [1, 2], "a": "x", "c": null}));
        assert_eq!(normalize_metadata(&input), normalize_metadata(&input));
    }

    #[test]
    fn test_missing_metadata_is_invalid() {
        let document = RawDocument {
            line: 7,
            text: Some("t".to_string()),
            metadata: None,
        };
        let err = normalize_document(&document).unwrap_err();
        assert!(matches!(err, IngestError::InvalidDocument { line: 7, .. }));
    }
}
