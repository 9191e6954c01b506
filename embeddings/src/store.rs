//! Stored embedding records.
//!
//! A [`StoredEmbedding`] is created once and never mutated. The
//! [`EmbeddingStore`] trait is the seam to durable storage; the in-memory
//! store keeps records in insertion order, which is the candidate order the
//! ranking engine sees.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::Embedding;
use crate::error::Result;
use crate::fingerprint::content_key;

/// A persisted `(content, vector)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEmbedding {
    /// Unique identifier.
    pub id: Uuid,

    /// The embedded text.
    pub content: String,

    /// SHA-256 hex of `content`.
    pub content_key: String,

    /// The unit-length vector.
    pub vector: Embedding,

    /// Model that produced the vector.
    pub model: String,

    /// Kind of source the text came from (document, message, ...).
    pub source_type: String,

    /// Identifier of the source record, if any.
    pub source_id: Option<String>,

    /// Free-form metadata used by search filters.
    pub metadata: Map<String, Value>,

    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl StoredEmbedding {
    /// Build a new record with a fresh id and the content key of `content`.
    pub fn new(
        content: impl Into<String>,
        vector: Embedding,
        model: impl Into<String>,
        source_type: impl Into<String>,
    ) -> Self {
        let content = content.into();
        Self {
            id: Uuid::new_v4(),
            content_key: content_key(&content),
            content,
            vector,
            model: model.into(),
            source_type: source_type.into(),
            source_id: None,
            metadata: Map::new(),
            created_at: Utc::now(),
        }
    }

    /// Attach the id of the source record.
    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Result of an insert.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// The record was stored.
    Inserted(StoredEmbedding),
    /// A record with the same `(content_key, model)` already existed and
    /// was returned instead.
    Existing(StoredEmbedding),
}

impl InsertOutcome {
    /// The record now present in the store.
    pub fn record(&self) -> &StoredEmbedding {
        match self {
            InsertOutcome::Inserted(record) | InsertOutcome::Existing(record) => record,
        }
    }

    /// Consume the outcome and return the stored record.
    pub fn into_record(self) -> StoredEmbedding {
        match self {
            InsertOutcome::Inserted(record) | InsertOutcome::Existing(record) => record,
        }
    }
}

/// Exact-match restrictions applied to candidates before scoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateFilter {
    /// Allowed source types; `None` allows all.
    pub source_types: Option<Vec<String>>,

    /// Metadata entries every candidate must carry with equal values.
    pub metadata: Map<String, Value>,

    /// Embedding model the candidate must have been produced by.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl CandidateFilter {
    /// Restrict to the given source types.
    pub fn with_source_types(mut self, source_types: Vec<String>) -> Self {
        self.source_types = Some(source_types);
        self
    }

    /// Require a metadata key to equal `value`.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Restrict to vectors produced by `model`.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Whether the record passes every filter.
    pub fn matches(&self, record: &StoredEmbedding) -> bool {
        if let Some(model) = &self.model {
            if *model != record.model {
                return false;
            }
        }

        if let Some(types) = &self.source_types {
            if !types.iter().any(|t| *t == record.source_type) {
                return false;
            }
        }

        self.metadata
            .iter()
            .all(|(key, expected)| record.metadata.get(key) == Some(expected))
    }
}

/// Storage seam for embedding records.
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// Insert a record unless one with the same `(content_key, model)` exists.
    async fn insert(&self, record: StoredEmbedding) -> Result<InsertOutcome>;

    /// Look up a record by fingerprint and model.
    async fn find(&self, content_key: &str, model: &str) -> Result<Option<StoredEmbedding>>;

    /// Enumerate all candidates in retrieval order.
    ///
    /// Backends are free to enumerate by linear scan; ranking only relies on
    /// the order being stable between calls.
    async fn scan(&self) -> Result<Vec<StoredEmbedding>>;

    /// Number of stored records.
    async fn len(&self) -> Result<usize>;
}

/// In-memory embedding store.
pub struct InMemoryEmbeddingStore {
    records: RwLock<Vec<StoredEmbedding>>,
    max_entries: Option<usize>,
}

impl InMemoryEmbeddingStore {
    /// Create an unbounded store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            max_entries: None,
        }
    }

    /// Bound the store; the oldest record is evicted when full.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries.max(1));
        self
    }
}

impl Default for InMemoryEmbeddingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingStore for InMemoryEmbeddingStore {
    async fn insert(&self, record: StoredEmbedding) -> Result<InsertOutcome> {
        // Check and insert under one write lock.
        let mut records = self.records.write().await;

        if let Some(existing) = records
            .iter()
            .find(|r| r.content_key == record.content_key && r.model == record.model)
        {
            debug!("Embedding already stored: {}", existing.id);
            return Ok(InsertOutcome::Existing(existing.clone()));
        }

        if let Some(max) = self.max_entries {
            if records.len() >= max {
                let oldest = records
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, r)| r.created_at)
                    .map(|(i, _)| i);
                if let Some(oldest) = oldest {
                    let evicted = records.remove(oldest);
                    info!("Evicted embedding {} (store at capacity {max})", evicted.id);
                }
            }
        }

        records.push(record.clone());
        debug!("Stored embedding {}", record.id);
        Ok(InsertOutcome::Inserted(record))
    }

    async fn find(&self, content_key: &str, model: &str) -> Result<Option<StoredEmbedding>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .find(|r| r.content_key == content_key && r.model == model)
            .cloned())
    }

    async fn scan(&self) -> Result<Vec<StoredEmbedding>> {
        Ok(self.records.read().await.clone())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.records.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(content: &str, model: &str) -> StoredEmbedding {
        StoredEmbedding::new(content, vec![1.0, 0.0], model, "document")
    }

    #[tokio::test]
    async fn test_insert_is_idempotent_per_content_and_model() {
        let store = InMemoryEmbeddingStore::new();

        let first = store.insert(record("SKU-1001 low stock", "m1")).await.unwrap();
        let again = store.insert(record("SKU-1001 low stock", "m1")).await.unwrap();
        let other_model = store.insert(record("SKU-1001 low stock", "m2")).await.unwrap();

        assert!(matches!(first, InsertOutcome::Inserted(_)));
        assert!(matches!(again, InsertOutcome::Existing(_)));
        assert_eq!(first.record().id, again.record().id);
        assert!(matches!(other_model, InsertOutcome::Inserted(_)));
        assert_eq!(store.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_bounded_store_evicts_oldest() {
        let store = InMemoryEmbeddingStore::new().with_max_entries(2);
        let a = store.insert(record("a", "m")).await.unwrap().into_record();
        store.insert(record("b", "m")).await.unwrap();
        store.insert(record("c", "m")).await.unwrap();

        let remaining: Vec<String> = store
            .scan()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.content)
            .collect();
        assert_eq!(remaining, vec!["b".to_string(), "c".to_string()]);
        assert!(store.find(&a.content_key, "m").await.unwrap().is_none());
    }

    #[test]
    fn test_candidate_filter() {
        let mut meta = Map::new();
        meta.insert("warehouse".to_string(), json!("WH-1"));
        let rec = record("x", "m").with_metadata(meta);

        assert!(CandidateFilter::default().matches(&rec));
        assert!(
            CandidateFilter::default()
                .with_source_types(vec!["document".to_string()])
                .with_metadata("warehouse", json!("WH-1"))
                .matches(&rec)
        );
        assert!(
            !CandidateFilter::default()
                .with_source_types(vec!["message".to_string()])
                .matches(&rec)
        );
        assert!(
            !CandidateFilter::default()
                .with_metadata("warehouse", json!("WH-2"))
                .matches(&rec)
        );
        assert!(CandidateFilter::default().with_model("m").matches(&rec));
        assert!(!CandidateFilter::default().with_model("other").matches(&rec));
    }
}
