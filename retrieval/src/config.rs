//! Configuration for the copilot.
//!
//! A [`CopilotConfig`] is built once (from a TOML file, the environment, or
//! both) and handed to each collaborator. Nothing reads the environment
//! after construction.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use supplymind_embeddings::{
    CachedProvider, EmbeddingCache, EmbeddingProvider, HashingProvider, InMemoryEmbeddingStore,
    OpenAIProvider,
};
use tracing::{info, warn};

use crate::error::Result;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopilotConfig {
    /// Structured store connection.
    pub store: StoreConfig,

    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,

    /// Grounded chat configuration.
    pub chat: ChatConfig,

    /// Embedding store bounds.
    pub embeddings_store: EmbeddingStoreConfig,

    /// Chat session retention.
    pub sessions: SessionConfig,
}

impl CopilotConfig {
    /// Load configuration from a TOML file. Missing sections use defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: CopilotConfig = toml::from_str(&content)?;
        info!("Loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }

    /// Configuration from the process environment.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Layer the process environment over these values.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Layer values from `lookup` over these values.
    ///
    /// Recognised keys: `SUPABASE_URL`, `SUPABASE_SERVICE_ROLE_KEY`,
    /// `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `COPILOT_EMBED_MODEL`.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("SUPABASE_URL") {
            self.store.url = Some(url);
        }
        if let Some(key) = non_empty("SUPABASE_SERVICE_ROLE_KEY") {
            self.store.service_key = Some(key);
        }
        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.embedding.api_key = Some(key);
        }
        if let Some(url) = non_empty("OPENAI_BASE_URL") {
            self.embedding.base_url = Some(url);
        }
        if let Some(model) = non_empty("COPILOT_EMBED_MODEL") {
            self.embedding.model = model;
        }
        self
    }
}

/// Connection to the PostgREST structured store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Project URL.
    pub url: Option<String>,

    /// Service role key.
    pub service_key: Option<String>,

    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            service_key: None,
            timeout_secs: 10,
        }
    }
}

/// Type of embedding provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderType {
    /// OpenAI-compatible embeddings API.
    #[serde(rename = "openai")]
    OpenAI,
    /// Deterministic offline hashing.
    Fallback,
}

/// Configuration for the embedding provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which provider to use.
    pub provider: EmbeddingProviderType,

    /// Model to use for embeddings.
    pub model: String,

    /// API key for the remote provider.
    pub api_key: Option<String>,

    /// Base URL override for the remote provider.
    pub base_url: Option<String>,

    /// Dimension of fallback vectors.
    pub fallback_dimension: usize,

    /// Whether to cache remote embeddings.
    pub cache_enabled: bool,

    /// Maximum cache size.
    pub cache_max_entries: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderType::OpenAI,
            model: supplymind_embeddings::DEFAULT_MODEL.to_string(),
            api_key: None,
            base_url: None,
            fallback_dimension: supplymind_embeddings::FALLBACK_DIMENSION,
            cache_enabled: true,
            cache_max_entries: 10_000,
        }
    }
}

impl EmbeddingConfig {
    /// Select the provider. A remote provider without an API key falls back
    /// to hashing so the process keeps working offline.
    pub fn build_provider(&self) -> Arc<dyn EmbeddingProvider> {
        match (self.provider, &self.api_key) {
            (EmbeddingProviderType::OpenAI, Some(key)) => {
                let mut provider =
                    OpenAIProvider::new(Some(key.clone())).with_model(self.model.clone());
                if let Some(url) = &self.base_url {
                    provider = provider.with_base_url(url.clone());
                }
                info!("Using OpenAI embeddings ({})", self.model);

                if self.cache_enabled {
                    Arc::new(CachedProvider::new(
                        Arc::new(provider),
                        EmbeddingCache::new(self.cache_max_entries),
                    ))
                } else {
                    Arc::new(provider)
                }
            }
            (EmbeddingProviderType::OpenAI, None) => {
                warn!("No embedding API key configured, using offline hashing embeddings");
                Arc::new(HashingProvider::new(self.fallback_dimension))
            }
            (EmbeddingProviderType::Fallback, _) => {
                info!("Using offline hashing embeddings");
                Arc::new(HashingProvider::new(self.fallback_dimension))
            }
        }
    }
}

/// Configuration for grounded chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Upper bound on vector matches per question.
    pub vector_top_k_cap: usize,

    /// Minimum similarity for vector evidence.
    pub vector_threshold: f32,

    /// Maximum snippets rendered into the answer text.
    pub snippet_limit: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            vector_top_k_cap: 10,
            vector_threshold: 0.15,
            snippet_limit: crate::grounding::DEFAULT_SNIPPET_LIMIT,
        }
    }
}

/// Where embeddings are kept.
///
/// With a structured store configured, embeddings live in `table` on that
/// store; otherwise in process memory, bounded by `max_entries`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingStoreConfig {
    /// Evict the oldest in-memory record beyond this many; unbounded when
    /// unset.
    pub max_entries: Option<usize>,

    /// Remote table holding embedding records.
    pub table: String,
}

impl Default for EmbeddingStoreConfig {
    fn default() -> Self {
        Self {
            max_entries: None,
            table: DEFAULT_EMBEDDINGS_TABLE.to_string(),
        }
    }
}

/// Default remote table for embedding records.
pub const DEFAULT_EMBEDDINGS_TABLE: &str = "supply_chain_embeddings";

impl EmbeddingStoreConfig {
    /// Build the in-memory store with these bounds.
    pub fn build_store(&self) -> InMemoryEmbeddingStore {
        match self.max_entries {
            Some(max) => InMemoryEmbeddingStore::new().with_max_entries(max),
            None => InMemoryEmbeddingStore::new(),
        }
    }
}

/// Retention of chat sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sessions kept before the least recently used one is dropped.
    pub max_sessions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

/// Default bound on retained chat sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 1_000;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_load_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[store]\nurl = \"http://localhost:54321\"\n\n[chat]\nsnippet_limit = 5\n\n[embeddings_store]\nmax_entries = 100\n\n[sessions]\nmax_sessions = 50"
        )
        .unwrap();

        let config = CopilotConfig::load(file.path()).unwrap();
        assert_eq!(config.store.url.as_deref(), Some("http://localhost:54321"));
        assert_eq!(config.store.timeout_secs, 10);
        assert_eq!(config.chat.snippet_limit, 5);
        assert_eq!(config.chat.vector_top_k_cap, 10);
        assert_eq!(config.embeddings_store.max_entries, Some(100));
        assert_eq!(config.embeddings_store.table, DEFAULT_EMBEDDINGS_TABLE);
        assert_eq!(config.sessions.max_sessions, 50);
        assert_eq!(config.embedding, EmbeddingConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("SUPABASE_URL", "https://demo.supabase.co"),
            ("SUPABASE_SERVICE_ROLE_KEY", "service"),
            ("OPENAI_API_KEY", ""),
            ("COPILOT_EMBED_MODEL", "text-embedding-3-large"),
        ]);

        let config = CopilotConfig::default()
            .with_overrides_from(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.store.url.as_deref(), Some("https://demo.supabase.co"));
        assert_eq!(config.store.service_key.as_deref(), Some("service"));
        assert_eq!(config.embedding.api_key, None);
        assert_eq!(config.embedding.model, "text-embedding-3-large");
    }

    #[test]
    fn test_provider_selection() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.build_provider().name(), "hashing");

        let config = EmbeddingConfig {
            api_key: Some("sk-test".to_string()),
            ..EmbeddingConfig::default()
        };
        assert_eq!(config.build_provider().name(), "openai");

        let config = EmbeddingConfig {
            provider: EmbeddingProviderType::Fallback,
            api_key: Some("sk-test".to_string()),
            fallback_dimension: 64,
            ..EmbeddingConfig::default()
        };
        let provider = config.build_provider();
        assert_eq!(provider.name(), "hashing");
        assert_eq!(provider.default_dimension(), 64);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[chat]\nsnippet_limit = \"many\"").unwrap();
        assert!(matches!(
            CopilotConfig::load(file.path()),
            Err(crate::error::RetrievalError::Toml(_))
        ));
    }
}
