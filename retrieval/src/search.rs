//! Semantic search over stored embeddings.

use std::sync::Arc;
use std::time::{Duration, Instant};

use supplymind_embeddings::{
    Embedding, EmbeddingProvider, EmbeddingRequest, EmbeddingStore, RankOptions, SearchHit, rank,
};
use tracing::debug;

use crate::error::Result;

/// Result of a semantic search.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Ranked hits, best first.
    pub hits: Vec<SearchHit>,

    /// The vector the query was embedded to.
    pub query_embedding: Embedding,

    /// Time spent embedding, scanning and ranking.
    pub elapsed: Duration,
}

/// Embeds a query and ranks the stored embeddings against it.
#[derive(Clone)]
pub struct SemanticSearch {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn EmbeddingStore>,
}

impl SemanticSearch {
    /// Create a new semantic search over `store`.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, store: Arc<dyn EmbeddingStore>) -> Self {
        Self { provider, store }
    }

    /// Search for stored texts similar to `query`.
    ///
    /// Only embeddings produced by the same model as the query vector are
    /// scored, unless `options` already names a model.
    pub async fn search(&self, query: &str, options: &RankOptions) -> Result<SearchOutcome> {
        let start = Instant::now();

        let response = self.provider.embed(EmbeddingRequest::new(query)).await?;
        let candidates = self.store.scan().await?;
        let scanned = candidates.len();

        let mut options = options.clone();
        if options.filter.model.is_none() {
            options.filter.model = Some(response.model);
        }

        let hits = rank(&response.embedding, candidates, &options);
        debug!(
            "Semantic search ranked {} of {scanned} candidates above {}",
            hits.len(),
            options.threshold
        );

        Ok(SearchOutcome {
            hits,
            query_embedding: response.embedding,
            elapsed: start.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use supplymind_embeddings::{CandidateFilter, HashingProvider, InMemoryEmbeddingStore, StoredEmbedding};

    async fn seeded() -> SemanticSearch {
        let provider = Arc::new(HashingProvider::new(128));
        let store = Arc::new(InMemoryEmbeddingStore::new());
        let docs = [
            ("Typhoon closes Kaohsiung port for three days", "risk_event", "asia"),
            ("Weekly OTIF report for the northeast region", "report", "na"),
            ("Port congestion in Kaohsiung delays containers", "risk_event", "asia"),
        ];
        for (text, source_type, region) in docs {
            let mut metadata = serde_json::Map::new();
            metadata.insert("region".to_string(), json!(region));
            store
                .insert(
                    StoredEmbedding::new(
                        text,
                        provider.embed_text(text),
                        provider.default_model(),
                        source_type,
                    )
                    .with_metadata(metadata),
                )
                .await
                .unwrap();
        }
        SemanticSearch::new(provider, store)
    }

    #[tokio::test]
    async fn test_search_ranks_best_first() {
        let search = seeded().await;
        let outcome = search
            .search("Kaohsiung port", &RankOptions::new(10, 0.0))
            .await
            .unwrap();

        assert_eq!(outcome.query_embedding.len(), 128);
        assert!(!outcome.hits.is_empty());
        let scores: Vec<f32> = outcome.hits.iter().map(|h| h.similarity_score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        assert!(outcome.hits[0].content.contains("Kaohsiung"));
    }

    #[tokio::test]
    async fn test_search_honours_filters() {
        let search = seeded().await;
        let options = RankOptions::new(10, 0.0).with_filter(
            CandidateFilter::default().with_source_types(vec!["report".to_string()]),
        );
        let outcome = search.search("Kaohsiung port", &options).await.unwrap();
        assert!(outcome.hits.iter().all(|h| h.source_type == "report"));

        let options = RankOptions::new(10, 0.0)
            .with_filter(CandidateFilter::default().with_metadata("region", json!("asia")));
        let outcome = search.search("port", &options).await.unwrap();
        assert!(outcome.hits.iter().all(|h| h.metadata["region"] == json!("asia")));
    }

    #[tokio::test]
    async fn test_search_ignores_other_models() {
        let provider = Arc::new(HashingProvider::new(32));
        let store = Arc::new(InMemoryEmbeddingStore::new());
        let text = "Carrier capacity shortage";
        store
            .insert(StoredEmbedding::new(
                text,
                provider.embed_text(text),
                "legacy-model",
                "document",
            ))
            .await
            .unwrap();
        store
            .insert(StoredEmbedding::new(
                text,
                provider.embed_text(text),
                provider.default_model(),
                "document",
            ))
            .await
            .unwrap();

        let search = SemanticSearch::new(provider.clone(), store);
        let outcome = search.search(text, &RankOptions::new(5, 0.0)).await.unwrap();
        assert_eq!(outcome.hits.len(), 1);

        let options = RankOptions::new(5, 0.0)
            .with_filter(CandidateFilter::default().with_model("legacy-model"));
        let outcome = search.search(text, &options).await.unwrap();
        assert_eq!(outcome.hits.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_store_returns_no_hits() {
        let search = SemanticSearch::new(
            Arc::new(HashingProvider::new(32)),
            Arc::new(InMemoryEmbeddingStore::new()),
        );
        let outcome = search
            .search("anything", &RankOptions::new(5, 0.1))
            .await
            .unwrap();
        assert!(outcome.hits.is_empty());
    }
}
