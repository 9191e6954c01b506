//! Embedding cache for the remote provider.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::Embedding;
use crate::error::Result;
use crate::fingerprint::content_key;
use crate::provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};

#[derive(Debug, Clone)]
struct CacheEntry {
    embedding: Embedding,
    /// Model the provider reported, which may differ from the key's.
    model: String,
    sequence: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<(String, String), CacheEntry>,
    next_sequence: u64,
}

/// In-memory cache of embeddings keyed by `(content_key, model)`.
///
/// When full, the oldest entry is evicted.
pub struct EmbeddingCache {
    state: RwLock<CacheState>,
    max_entries: usize,
}

impl EmbeddingCache {
    /// Create a new in-memory cache.
    pub fn new(max_entries: usize) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            max_entries: max_entries.max(1),
        }
    }

    /// Get an embedding from the cache.
    pub async fn get(&self, text: &str, model: &str) -> Option<Embedding> {
        self.lookup(text, model).await.map(|(embedding, _)| embedding)
    }

    /// Put an embedding in the cache.
    pub async fn put(&self, text: &str, model: &str, embedding: Embedding) {
        self.store(text, model, model, embedding).await;
    }

    async fn lookup(&self, text: &str, model: &str) -> Option<(Embedding, String)> {
        let key = (content_key(text), model.to_string());
        let state = self.state.read().await;
        state
            .entries
            .get(&key)
            .map(|e| (e.embedding.clone(), e.model.clone()))
    }

    async fn store(&self, text: &str, model: &str, reported_model: &str, embedding: Embedding) {
        let key = (content_key(text), model.to_string());
        let mut state = self.state.write().await;

        if !state.entries.contains_key(&key) && state.entries.len() >= self.max_entries {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, v)| v.sequence)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                state.entries.remove(&oldest);
            }
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.entries.insert(
            key,
            CacheEntry {
                embedding,
                model: reported_model.to_string(),
                sequence,
            },
        );
        debug!("Cached embedding (model: {model})");
    }

    /// Number of cached embeddings.
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    /// Check whether the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// A provider wrapper that serves repeated texts from an [`EmbeddingCache`].
pub struct CachedProvider {
    provider: Arc<dyn EmbeddingProvider>,
    cache: EmbeddingCache,
}

impl CachedProvider {
    /// Create a new cached provider.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, cache: EmbeddingCache) -> Self {
        Self { provider, cache }
    }

    /// Get the underlying cache.
    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }
}

#[async_trait]
impl EmbeddingProvider for CachedProvider {
    fn name(&self) -> &str {
        self.provider.name()
    }

    fn default_model(&self) -> &str {
        self.provider.default_model()
    }

    fn default_dimension(&self) -> usize {
        self.provider.default_dimension()
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string());

        if let Some((embedding, reported)) = self.cache.lookup(&request.text, &model).await {
            debug!("Cache hit for embedding");
            return Ok(EmbeddingResponse {
                dimension: embedding.len(),
                embedding,
                model: reported,
                tokens_used: None,
            });
        }

        let text = request.text.clone();
        let response = self.provider.embed(request).await?;
        self.cache
            .store(&text, &model, &response.model, response.embedding.clone())
            .await;

        Ok(response)
    }

    fn is_available(&self) -> bool {
        self.provider.is_available()
    }
}
