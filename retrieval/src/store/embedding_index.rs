//! Vector index over an [`EmbeddingStore`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use supplymind_embeddings::{CandidateFilter, EmbeddingStore, RankOptions, SearchHit, rank};

use super::VectorIndex;
use crate::error::StoreError;
use crate::evidence::Row;

/// Serves vector matches from an [`EmbeddingStore`] through the ranking
/// engine, so chat sees exactly what `embed` stored and `search` ranks.
pub struct EmbeddingStoreIndex {
    store: Arc<dyn EmbeddingStore>,
}

impl EmbeddingStoreIndex {
    /// Wrap an embedding store.
    pub fn new(store: Arc<dyn EmbeddingStore>) -> Self {
        Self { store }
    }
}

fn hit_row(hit: SearchHit) -> Row {
    let mut row = Row::new();
    row.insert("id".to_string(), json!(hit.embedding_id));
    row.insert("content".to_string(), Value::String(hit.content));
    row.insert("similarity".to_string(), json!(hit.similarity_score));
    row.insert("source_type".to_string(), Value::String(hit.source_type));
    row.insert(
        "source_id".to_string(),
        hit.source_id.map_or(Value::Null, Value::String),
    );
    row.insert("metadata".to_string(), Value::Object(hit.metadata));
    row
}

#[async_trait]
impl VectorIndex for EmbeddingStoreIndex {
    async fn match_embeddings(
        &self,
        query: &[f32],
        model: &str,
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<Row>, StoreError> {
        let candidates = self
            .store
            .scan()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;

        let options = RankOptions::new(top_k, threshold)
            .with_filter(CandidateFilter::default().with_model(model));
        let hits = rank(query, candidates, &options);
        Ok(hits.into_iter().map(hit_row).collect())
    }
}
