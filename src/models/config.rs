use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use super::collection::DistanceMetric;
use super::document::BatchAttributes;
use super::template;
use crate::error::ConfigError;

pub const DEFAULT_EMBEDDING_URL: &str = "http://localhost:11411";
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_HUGGINGFACE_URL: &str = "https://api-inference.huggingface.co";
pub const DEFAULT_HUGGINGFACE_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_CHROMA_URL: &str = "http://localhost:8000";
pub const DEFAULT_COLLECTION: &str = "vecput";

pub const STORE_API_KEY_ENV: &str = "VECPUT_STORE_API_KEY";
pub const EMBEDDING_API_KEY_ENV: &str = "VECPUT_EMBEDDING_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub ingest: IngestConfig,
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("vecput").join("config.toml"))
    }

    /// Load from the default location, falling back to defaults when no file exists.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::read(&path)?,
            _ => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from an explicit path, which must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::read(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Secrets may come from the environment instead of the file.
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(STORE_API_KEY_ENV)
            && !key.is_empty()
        {
            self.store.api_key = Some(key);
        }
        if let Ok(key) = std::env::var(EMBEDDING_API_KEY_ENV)
            && !key.is_empty()
        {
            self.embedding.api_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        self.embedding.validate()?;
        self.ingest.validate()
    }
}

/// Vector store backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreDriver {
    #[default]
    Qdrant,
    Chroma,
    /// In-process store, optionally persisted to a directory
    Local,
}

impl fmt::Display for StoreDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreDriver::Qdrant => write!(f, "qdrant"),
            StoreDriver::Chroma => write!(f, "chroma"),
            StoreDriver::Local => write!(f, "local"),
        }
    }
}

/// How to authenticate against a Chroma server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStrategy {
    #[default]
    None,
    Token,
    Basic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub driver: StoreDriver,

    /// Server URL; defaults depend on the driver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Qdrant API key or Chroma auth token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default)]
    pub auth: AuthStrategy,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Persistence directory for the local driver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl StoreConfig {
    pub fn endpoint(&self) -> &str {
        match (&self.url, self.driver) {
            (Some(url), _) => url.as_str(),
            (None, StoreDriver::Chroma) => DEFAULT_CHROMA_URL,
            (None, _) => DEFAULT_QDRANT_URL,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.driver == StoreDriver::Local {
            return Ok(());
        }
        let url = self.endpoint();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "store url must be an http(s) URL: {}",
                url
            )));
        }
        if self.driver == StoreDriver::Chroma {
            match self.auth {
                AuthStrategy::Token if self.api_key.is_none() => {
                    return Err(ConfigError::ValidationError(
                        "token authentication requires store.api_key".to_string(),
                    ));
                }
                AuthStrategy::Basic if self.username.is_none() || self.password.is_none() => {
                    return Err(ConfigError::ValidationError(
                        "basic authentication requires store.username and store.password"
                            .to_string(),
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            driver: StoreDriver::default(),
            url: None,
            api_key: None,
            auth: AuthStrategy::default(),
            username: None,
            password: None,
            directory: None,
            timeout_secs: default_timeout(),
        }
    }
}

/// Embedding function selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Text-embeddings server speaking `POST /embed`
    #[default]
    Http,
    OpenAi,
    HuggingFace,
}

impl fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbeddingProvider::Http => write!(f, "http"),
            EmbeddingProvider::OpenAi => write!(f, "openai"),
            EmbeddingProvider::HuggingFace => write!(f, "huggingface"),
        }
    }
}

/// Flavor of an OpenAI-compatible endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenAiApiType {
    #[default]
    OpenAi,
    /// Azure OpenAI deployment: `api-key` header and an `api-version` query parameter
    Azure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// OpenAI organization id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,

    #[serde(default)]
    pub api_type: OpenAiApiType,

    /// Required for Azure deployments, e.g. `2023-05-15`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_timeout() -> u64 {
    120
}

fn default_batch_size() -> u32 {
    64
}

fn default_max_retries() -> u32 {
    3
}

impl EmbeddingConfig {
    pub fn endpoint(&self) -> &str {
        match (&self.url, self.provider) {
            (Some(url), _) => url.as_str(),
            (None, EmbeddingProvider::Http) => DEFAULT_EMBEDDING_URL,
            (None, EmbeddingProvider::OpenAi) => DEFAULT_OPENAI_URL,
            (None, EmbeddingProvider::HuggingFace) => DEFAULT_HUGGINGFACE_URL,
        }
    }

    pub fn model_name(&self) -> Option<&str> {
        match (&self.model, self.provider) {
            (Some(model), _) => Some(model.as_str()),
            (None, EmbeddingProvider::Http) => None,
            (None, EmbeddingProvider::OpenAi) => Some(DEFAULT_OPENAI_MODEL),
            (None, EmbeddingProvider::HuggingFace) => Some(DEFAULT_HUGGINGFACE_MODEL),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let url = self.endpoint();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "embedding url must be an http(s) URL: {}",
                url
            )));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.batch_size must be greater than 0".to_string(),
            ));
        }
        if self.provider != EmbeddingProvider::Http && self.api_key.is_none() {
            return Err(ConfigError::ValidationError(format!(
                "the {} embedding provider requires embedding.api_key (or {})",
                self.provider, EMBEDDING_API_KEY_ENV
            )));
        }
        if self.provider == EmbeddingProvider::OpenAi && self.api_type == OpenAiApiType::Azure {
            if self.url.is_none() {
                return Err(ConfigError::ValidationError(
                    "Azure OpenAI requires embedding.url (the deployment endpoint)".to_string(),
                ));
            }
            if self.api_version.as_deref().is_none_or(str::is_empty) {
                return Err(ConfigError::ValidationError(
                    "Azure OpenAI requires embedding.api_version".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            url: None,
            model: None,
            api_key: None,
            organization: None,
            api_type: OpenAiApiType::default(),
            api_version: None,
            timeout_secs: default_timeout(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
        }
    }
}

/// Per-batch ingest settings before templates are resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Collection name template, e.g. `docs_${tenant}`.
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Used only when the collection has to be created.
    #[serde(default)]
    pub distance: DistanceMetric,

    #[serde(default = "default_store_text")]
    pub store_text: bool,

    /// Metadata key holding the document id; may be templated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_field: Option<String>,
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_store_text() -> bool {
    true
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            distance: DistanceMetric::default(),
            store_text: default_store_text(),
            id_field: None,
        }
    }
}

impl IngestConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.collection.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "ingest.collection cannot be empty".to_string(),
            ));
        }
        if let Some(ref field) = self.id_field
            && field.trim().is_empty()
        {
            return Err(ConfigError::ValidationError(
                "ingest.id_field cannot be empty when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve templates against one batch's attributes.
    pub fn resolve(&self, attributes: &BatchAttributes) -> Result<BatchSettings, ConfigError> {
        let collection = template::render(&self.collection, attributes);
        if collection.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "collection name '{}' resolved to an empty string",
                self.collection
            )));
        }

        let id_field = self
            .id_field
            .as_deref()
            .map(|field| template::render(field, attributes))
            .filter(|field| !field.is_empty());

        Ok(BatchSettings {
            collection,
            distance: self.distance,
            store_text: self.store_text,
            id_field,
        })
    }
}

/// Fully resolved settings handed to the pipeline for one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSettings {
    pub collection: String,
    pub distance: DistanceMetric,
    pub store_text: bool,
    pub id_field: Option<String>,
}

impl BatchSettings {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            distance: DistanceMetric::default(),
            store_text: true,
            id_field: None,
        }
    }

    #[must_use]
    pub fn with_distance(mut self, distance: DistanceMetric) -> Self {
        self.distance = distance;
        self
    }

    #[must_use]
    pub fn with_store_text(mut self, store_text: bool) -> Self {
        self.store_text = store_text;
        self
    }

    #[must_use]
    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = Some(field.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.store.driver, StoreDriver::Qdrant);
        assert_eq!(config.store.endpoint(), DEFAULT_QDRANT_URL);
        assert_eq!(config.embedding.endpoint(), DEFAULT_EMBEDDING_URL);
        assert_eq!(config.ingest.collection, DEFAULT_COLLECTION);
        assert!(config.ingest.store_text);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_path() {
        let path = Config::config_path();
        assert!(path.is_some());
    }

    #[test]
    fn test_provider_defaults() {
        let config = EmbeddingConfig {
            provider: EmbeddingProvider::OpenAi,
            ..Default::default()
        };
        assert_eq!(config.endpoint(), DEFAULT_OPENAI_URL);
        assert_eq!(config.model_name(), Some(DEFAULT_OPENAI_MODEL));
        assert!(config.validate().is_err());

        let store = StoreConfig {
            driver: StoreDriver::Chroma,
            ..Default::default()
        };
        assert_eq!(store.endpoint(), DEFAULT_CHROMA_URL);
    }

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(
            r#"
            [store]
            driver = "chroma"
            url = "https://chroma.internal:8000"
            auth = "basic"
            username = "ingest"
            password = "secret"

            [embedding]
            provider = "openai"
            api_key = "sk-test"

            [ingest]
            collection = "docs_${tenant}"
            distance = "ip"
            store_text = false
            id_field = "doc_id"
            "#,
        )
        .unwrap();

        assert_eq!(config.store.driver, StoreDriver::Chroma);
        assert_eq!(config.store.auth, AuthStrategy::Basic);
        assert_eq!(config.embedding.provider, EmbeddingProvider::OpenAi);
        assert_eq!(config.ingest.distance, DistanceMetric::Ip);
        assert!(!config.ingest.store_text);
        assert_eq!(config.embedding.batch_size, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_azure_openai_settings() {
        let config: Config = toml::from_str(
            r#"
            [embedding]
            provider = "openai"
            api_type = "azure"
            url = "https://res.openai.azure.com/openai/deployments/embed"
            api_key = "az-key"
            api_version = "2023-05-15"
            "#,
        )
        .unwrap();
        assert_eq!(config.embedding.api_type, OpenAiApiType::Azure);
        assert!(config.validate().is_ok());

        let no_version = EmbeddingConfig {
            api_version: None,
            ..config.embedding.clone()
        };
        assert!(no_version.validate().is_err());

        let no_url = EmbeddingConfig {
            url: None,
            ..config.embedding
        };
        assert!(no_url.validate().is_err());
    }

    #[test]
    fn test_chroma_token_requires_key() {
        let store = StoreConfig {
            driver: StoreDriver::Chroma,
            auth: AuthStrategy::Token,
            ..Default::default()
        };
        assert!(store.validate().is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.ingest.collection = "articles".to_string();
        config.store.driver = StoreDriver::Local;
        config.store.directory = Some(dir.path().join("store"));
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.ingest.collection, "articles");
        assert_eq!(loaded.store.driver, StoreDriver::Local);
    }

    #[test]
    fn test_resolve_templates() {
        let ingest = IngestConfig {
            collection: "docs_${tenant}".to_string(),
            id_field: Some("${key}".to_string()),
            ..Default::default()
        };

        let mut attributes = BatchAttributes::new();
        attributes.insert("tenant".to_string(), "acme".to_string());
        attributes.insert("key".to_string(), "doc_id".to_string());

        let settings = ingest.resolve(&attributes).unwrap();
        assert_eq!(settings.collection, "docs_acme");
        assert_eq!(settings.id_field.as_deref(), Some("doc_id"));
        assert_eq!(settings.distance, DistanceMetric::Cosine);
    }

    #[test]
    fn test_resolve_empty_values() {
        let ingest = IngestConfig {
            collection: "${missing}".to_string(),
            ..Default::default()
        };
        assert!(ingest.resolve(&BatchAttributes::new()).is_err());

        let ingest = IngestConfig {
            id_field: Some("${missing}".to_string()),
            ..Default::default()
        };
        let settings = ingest.resolve(&BatchAttributes::new()).unwrap();
        assert_eq!(settings.id_field, None);
    }
}
