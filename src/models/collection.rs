use serde::{Deserialize, Serialize};
use std::fmt;

/// Similarity function a collection uses for nearest-neighbor comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    /// Squared Euclidean
    L2,
    /// Inner product
    Ip,
}

impl std::str::FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "l2" | "euclid" | "euclidean" => Ok(DistanceMetric::L2),
            "ip" | "dot" => Ok(DistanceMetric::Ip),
            _ => Err(format!(
                "unknown distance metric: {} (expected cosine, l2, or ip)",
                s
            )),
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceMetric::Cosine => write!(f, "cosine"),
            DistanceMetric::L2 => write!(f, "l2"),
            DistanceMetric::Ip => write!(f, "ip"),
        }
    }
}

/// A resolved collection handle.
///
/// `distance_metric` is whatever the collection was created with, which may
/// differ from the metric requested by a later batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collection {
    pub name: String,
    /// Backend identifier (Chroma UUID; the name for other backends).
    pub id: String,
    pub distance_metric: DistanceMetric,
}
