//! Embedding ingestion.
//!
//! Text is embedded and persisted once per `(content_key, model)`. A repeat
//! request for the same text and model returns the stored record.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use supplymind_embeddings::{
    EmbeddingProvider, EmbeddingRequest, EmbeddingStore, InsertOutcome, StoredEmbedding,
};
use tracing::info;

use crate::error::Result;

/// Text to embed and store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEmbedding {
    pub text: String,
    pub model: Option<String>,
    pub source_type: String,
    pub source_id: Option<String>,
    pub metadata: Map<String, Value>,
}

impl NewEmbedding {
    /// A document with no model override, source id or metadata.
    pub fn new(text: impl Into<String>, source_type: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: None,
            source_type: source_type.into(),
            source_id: None,
            metadata: Map::new(),
        }
    }
}

/// Outcome of an ingestion.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// The stored record, new or existing.
    pub record: StoredEmbedding,

    /// Tokens reported by the provider, or the whitespace token count.
    pub token_count: u64,

    /// Whether a new record was stored.
    pub created: bool,

    /// Time spent embedding and storing.
    pub elapsed: Duration,
}

/// Creates stored embeddings.
#[derive(Clone)]
pub struct EmbeddingIngest {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn EmbeddingStore>,
}

impl EmbeddingIngest {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, store: Arc<dyn EmbeddingStore>) -> Self {
        Self { provider, store }
    }

    /// Embed and store `new`, or return the record already stored for it.
    pub async fn create(&self, new: NewEmbedding) -> Result<IngestOutcome> {
        let start = Instant::now();

        let mut request = EmbeddingRequest::new(new.text.clone());
        if let Some(model) = &new.model {
            request = request.with_model(model.clone());
        }
        let response = self.provider.embed(request).await?;
        let token_count = response
            .tokens_used
            .unwrap_or_else(|| new.text.split_whitespace().count() as u64);

        let mut record = StoredEmbedding::new(
            new.text,
            response.embedding,
            response.model,
            new.source_type,
        )
        .with_metadata(new.metadata);
        if let Some(source_id) = new.source_id {
            record = record.with_source_id(source_id);
        }

        let outcome = self.store.insert(record).await?;
        let created = matches!(outcome, InsertOutcome::Inserted(_));
        let record = outcome.into_record();

        if created {
            info!("Stored embedding {} ({})", record.id, record.model);
        } else {
            info!("Reused embedding {} ({})", record.id, record.model);
        }

        Ok(IngestOutcome {
            record,
            token_count,
            created,
            elapsed: start.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use supplymind_embeddings::{HashingProvider, InMemoryEmbeddingStore, content_key};

    fn ingest() -> (EmbeddingIngest, Arc<InMemoryEmbeddingStore>) {
        let store = Arc::new(InMemoryEmbeddingStore::new());
        let ingest = EmbeddingIngest::new(Arc::new(HashingProvider::new(64)), store.clone());
        (ingest, store)
    }

    #[tokio::test]
    async fn test_create_stores_record() {
        let (ingest, store) = ingest();
        let mut new = NewEmbedding::new("Supplier ACME missed two deliveries", "note");
        new.source_id = Some("note-7".to_string());
        new.metadata.insert("supplier".to_string(), json!("ACME"));

        let outcome = ingest.create(new).await.unwrap();
        assert!(outcome.created);
        assert_eq!(outcome.token_count, 5);
        assert_eq!(outcome.record.vector.len(), 64);
        assert_eq!(outcome.record.source_id.as_deref(), Some("note-7"));
        assert_eq!(
            outcome.record.content_key,
            content_key("Supplier ACME missed two deliveries")
        );
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_repeat_returns_existing_record() {
        let (ingest, store) = ingest();
        let first = ingest
            .create(NewEmbedding::new("Reorder point reached", "note"))
            .await
            .unwrap();
        let second = ingest
            .create(NewEmbedding::new("Reorder point reached", "document"))
            .await
            .unwrap();

        assert!(!second.created);
        assert_eq!(second.record.id, first.record.id);
        assert_eq!(second.record.source_type, "note");
        assert_eq!(store.len().await.unwrap(), 1);
    }
}
