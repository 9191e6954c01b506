//! Vector evidence retrieval.

use std::sync::Arc;
use std::time::Instant;

use supplymind_embeddings::{EmbeddingProvider, EmbeddingRequest};
use tracing::{debug, warn};

use crate::domain::EvidenceSource;
use crate::error::StoreError;
use crate::evidence::{EvidenceBatch, Retrieval};
use crate::store::VectorIndex;

/// Embeds the query and matches it against stored vectors.
#[derive(Clone)]
pub struct VectorEvidenceSource {
    provider: Option<Arc<dyn EmbeddingProvider>>,
    index: Option<Arc<dyn VectorIndex>>,
}

impl VectorEvidenceSource {
    /// Source using `provider` for query vectors and `index` for matching.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            provider: Some(provider),
            index: Some(index),
        }
    }

    /// Source with optional collaborators.
    pub fn with_parts(
        provider: Option<Arc<dyn EmbeddingProvider>>,
        index: Option<Arc<dyn VectorIndex>>,
    ) -> Self {
        Self { provider, index }
    }

    /// Up to `top_k` stored rows at or above `threshold` similarity.
    ///
    /// Without an available provider this is a valid empty result, not a
    /// fault. Embedding or index failures degrade to an empty batch.
    pub async fn search(&self, query: &str, top_k: usize, threshold: f32) -> Retrieval {
        let start = Instant::now();

        let Some(provider) = self.provider.as_ref().filter(|p| p.is_available()) else {
            debug!("No embedding provider available, skipping vector evidence");
            return Retrieval::Found(EvidenceBatch::new(
                EvidenceSource::Vector,
                Vec::new(),
                start.elapsed(),
            ));
        };

        let Some(index) = &self.index else {
            return Retrieval::degraded(EvidenceSource::Vector, StoreError::NotConfigured);
        };

        let response = match provider.embed(EmbeddingRequest::new(query)).await {
            Ok(response) => response,
            Err(err) => {
                warn!("Query embedding failed: {err}");
                return Retrieval::Degraded {
                    batch: EvidenceBatch::new(EvidenceSource::Vector, Vec::new(), start.elapsed()),
                    fault: err.into(),
                };
            }
        };

        match index
            .match_embeddings(&response.embedding, &response.model, top_k, threshold)
            .await
        {
            Ok(rows) => {
                debug!("Vector match returned {} rows", rows.len());
                Retrieval::Found(EvidenceBatch::new(
                    EvidenceSource::Vector,
                    rows,
                    start.elapsed(),
                ))
            }
            Err(err) => {
                warn!("Vector match failed: {err}");
                Retrieval::Degraded {
                    batch: EvidenceBatch::new(EvidenceSource::Vector, Vec::new(), start.elapsed()),
                    fault: err.into(),
                }
            }
        }
    }
}
