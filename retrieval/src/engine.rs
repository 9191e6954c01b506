//! Grounded chat engine.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde_json::{Map, Value, json};
use supplymind_embeddings::EmbeddingProvider;
use tracing::{debug, info};

use crate::config::ChatConfig;
use crate::domain::DomainLabel;
use crate::evidence::Retrieval;
use crate::grounding::{Answer, Consolidator};
use crate::intent::classify;
use crate::store::{StructuredStore, VectorIndex};
use crate::structured::StructuredEvidenceSource;
use crate::vector::VectorEvidenceSource;

/// Answers questions strictly from retrieved evidence.
///
/// Per question it coordinates:
/// - intent routing to structured domains
/// - a vector match, always, as the semantic baseline
/// - the procedure escape hatch when no domain matched
/// - consolidation into a cited answer
#[derive(Clone)]
pub struct GroundedRetrieval {
    structured: StructuredEvidenceSource,
    vector: VectorEvidenceSource,
    consolidator: Consolidator,
    config: ChatConfig,
}

impl GroundedRetrieval {
    /// Create a new grounded retrieval engine builder.
    pub fn builder() -> GroundedRetrievalBuilder {
        GroundedRetrievalBuilder::new()
    }

    /// Create an engine from its evidence sources.
    pub fn new(
        structured: StructuredEvidenceSource,
        vector: VectorEvidenceSource,
        config: ChatConfig,
    ) -> Self {
        Self {
            structured,
            vector,
            consolidator: Consolidator::new(config.snippet_limit),
            config,
        }
    }

    /// Gather evidence from every applicable source.
    ///
    /// Sources are queried concurrently and joined before returning. The
    /// result order is vector first, then domains in routing order, then
    /// the procedure call if one was made.
    pub async fn collect_evidence(
        &self,
        question: &str,
        filters: &Map<String, Value>,
        top_k: usize,
    ) -> Vec<Retrieval> {
        let domains = classify(question);
        debug!("Routed question to {domains:?}");

        let domain_params: Vec<(DomainLabel, Map<String, Value>)> = domains
            .iter()
            .map(|domain| {
                let mut params = filters.clone();
                if matches!(domain, DomainLabel::Inventory | DomainLabel::Orders) {
                    params.insert("limit".to_string(), json!(top_k));
                }
                (*domain, params)
            })
            .collect();

        let procedure = if domains.is_empty() {
            StructuredEvidenceSource::procedure_request(filters)
        } else {
            None
        };

        let vector_top_k = top_k.min(self.config.vector_top_k_cap);
        let vector = self
            .vector
            .search(question, vector_top_k, self.config.vector_threshold);
        let structured = join_all(
            domain_params
                .iter()
                .map(|(domain, params)| self.structured.fetch(*domain, params)),
        );
        let escape_hatch = async {
            match &procedure {
                Some((name, args)) => Some(self.structured.call_procedure(name, args).await),
                None => None,
            }
        };

        let (vector, structured, escape_hatch) = tokio::join!(vector, structured, escape_hatch);

        let mut retrievals = Vec::with_capacity(structured.len() + 2);
        retrievals.push(vector);
        retrievals.extend(structured);
        retrievals.extend(escape_hatch);
        retrievals
    }

    /// Answer `question` from evidence only.
    pub async fn answer(
        &self,
        question: &str,
        filters: &Map<String, Value>,
        top_k: usize,
    ) -> Answer {
        let start = Instant::now();
        let retrievals = self.collect_evidence(question, filters, top_k).await;

        let mut degraded = 0usize;
        for retrieval in &retrievals {
            if let Some(fault) = retrieval.fault() {
                degraded += 1;
                debug!("{} evidence degraded: {fault}", retrieval.batch().source);
            }
        }
        let batches: Vec<_> = retrievals.into_iter().map(Retrieval::into_batch).collect();

        let mut answer = self.consolidator.build_answer(question, &batches);
        answer.retrieval_latency = start.elapsed();

        info!(
            "Answered from {} citations across {} sources ({degraded} degraded) in {:?}",
            answer.citations.len(),
            answer.sources_consulted.len(),
            answer.retrieval_latency
        );
        answer
    }
}

/// Builder for the grounded retrieval engine.
pub struct GroundedRetrievalBuilder {
    structured: Option<Arc<dyn StructuredStore>>,
    provider: Option<Arc<dyn EmbeddingProvider>>,
    index: Option<Arc<dyn VectorIndex>>,
    config: ChatConfig,
}

impl GroundedRetrievalBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            structured: None,
            provider: None,
            index: None,
            config: ChatConfig::default(),
        }
    }

    /// Set the structured store.
    pub fn with_structured_store(mut self, store: Arc<dyn StructuredStore>) -> Self {
        self.structured = Some(store);
        self
    }

    /// Set the embedding provider for query vectors.
    pub fn with_embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the vector index.
    pub fn with_vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Set the chat configuration.
    pub fn with_chat_config(mut self, config: ChatConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the engine.
    pub fn build(self) -> GroundedRetrieval {
        let structured = match self.structured {
            Some(store) => StructuredEvidenceSource::new(store),
            None => StructuredEvidenceSource::unconfigured(),
        };
        let vector = VectorEvidenceSource::with_parts(self.provider, self.index);
        GroundedRetrieval::new(structured, vector, self.config)
    }
}

impl Default for GroundedRetrievalBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EvidenceSource;
    use crate::error::{RetrievalError, StoreError};
    use crate::grounding::INSUFFICIENT_DATA_MESSAGE;
    use crate::store::{EmbeddingStoreIndex, InMemoryStore};
    use pretty_assertions::assert_eq;
    use supplymind_embeddings::{HashingProvider, InMemoryEmbeddingStore};

    fn row(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn engine_with(store: Arc<InMemoryStore>) -> GroundedRetrieval {
        GroundedRetrieval::builder()
            .with_structured_store(store)
            .with_embedding_provider(Arc::new(HashingProvider::new(64)))
            .with_vector_index(Arc::new(EmbeddingStoreIndex::new(Arc::new(
                InMemoryEmbeddingStore::new(),
            ))))
            .build()
    }

    #[tokio::test]
    async fn test_vector_first_then_routed_domains() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_rows("inventory", Vec::new()).await;
        store.insert_rows("orders", Vec::new()).await;
        let engine = engine_with(store);

        let retrievals = engine
            .collect_evidence("stock held for backorders", &Map::new(), 8)
            .await;
        let sources: Vec<EvidenceSource> =
            retrievals.iter().map(|r| r.batch().source.clone()).collect();
        assert_eq!(
            sources,
            vec![
                EvidenceSource::Vector,
                DomainLabel::Inventory.into(),
                DomainLabel::Orders.into(),
            ]
        );
    }

    #[tokio::test]
    async fn test_top_k_becomes_limit_for_inventory() {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_rows(
                "inventory",
                (0..5).map(|i| row(json!({"sku": format!("SKU-{i}"), "quantity": i}))),
            )
            .await;
        let engine = engine_with(store);

        let answer = engine
            .answer("inventory levels", &row(json!({"limit": 50})), 2)
            .await;
        assert_eq!(answer.citations.len(), 2);
    }

    #[tokio::test]
    async fn test_failing_domain_does_not_block_others() {
        let store = Arc::new(InMemoryStore::new());
        // `orders` table is missing, so that lookup fails.
        store
            .insert_rows("inventory", vec![row(json!({"sku": "SKU-1", "quantity": 3}))])
            .await;
        let engine = engine_with(store);

        let retrievals = engine
            .collect_evidence("stock and order status", &Map::new(), 8)
            .await;
        assert!(retrievals[2].is_degraded());
        assert!(matches!(
            retrievals[2].fault(),
            Some(RetrievalError::Store(StoreError::Backend { status: 404, .. }))
        ));
        assert!(retrievals[1].fault().is_none());

        let answer = engine
            .answer("stock and order status", &Map::new(), 8)
            .await;
        assert_eq!(answer.text, "Based on supply chain data: sku=SKU-1; quantity=3");
        assert_eq!(answer.citations.len(), 1);
    }

    #[tokio::test]
    async fn test_procedure_used_only_without_domains() {
        let store = Arc::new(InMemoryStore::new());
        store
            .register_procedure("supplier_scorecard", |_| {
                vec![row(json!({"metric": "on_time", "value": 0.97}))]
            })
            .await;
        let engine = engine_with(store);

        let filters = row(json!({"rpc": "supplier_scorecard"}));
        let answer = engine.answer("how is ACME doing", &filters, 8).await;
        assert_eq!(
            answer.sources_consulted,
            vec![
                EvidenceSource::Vector,
                EvidenceSource::Procedure("supplier_scorecard".to_string()),
            ]
        );
        assert_eq!(answer.text, "Based on supply chain data: metric=on_time; value=0.97");
    }

    #[tokio::test]
    async fn test_unconfigured_engine_is_insufficient() {
        let engine = GroundedRetrieval::builder().build();
        let answer = engine.answer("on hand stock", &Map::new(), 8).await;
        assert_eq!(answer.text, INSUFFICIENT_DATA_MESSAGE);
        assert!(answer.citations.is_empty());
    }
}
