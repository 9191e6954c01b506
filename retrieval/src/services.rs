//! Wiring of the copilot's services from configuration.

use std::sync::Arc;

use supplymind_embeddings::{EmbeddingProvider, EmbeddingStore};
use tracing::info;

use crate::config::{ChatConfig, CopilotConfig};
use crate::engine::GroundedRetrieval;
use crate::ingest::EmbeddingIngest;
use crate::search::SemanticSearch;
use crate::store::{
    EmbeddingStoreIndex, PostgrestEmbeddingStore, PostgrestStore, StructuredStore, VectorIndex,
};
use crate::structured::StructuredEvidenceSource;
use crate::vector::VectorEvidenceSource;

/// Every operation the copilot exposes, sharing one provider and stores.
#[derive(Clone)]
pub struct CopilotServices {
    /// Grounded chat.
    pub chat: GroundedRetrieval,

    /// Semantic search over stored embeddings.
    pub search: SemanticSearch,

    /// Embedding creation.
    pub ingest: EmbeddingIngest,

    /// Direct domain lookups.
    pub lookup: StructuredEvidenceSource,
}

impl CopilotServices {
    /// Build the services described by `config`.
    ///
    /// With a structured store configured, embeddings live in its
    /// embeddings table; otherwise in process memory. Either way `embed`,
    /// `search` and chat's vector evidence read and write the same store.
    pub fn from_config(config: &CopilotConfig) -> Self {
        let provider = config.embedding.build_provider();

        let (structured, embeddings): (Option<Arc<dyn StructuredStore>>, Arc<dyn EmbeddingStore>) =
            match PostgrestStore::from_config(&config.store) {
                Some(store) => {
                    info!(
                        "Using structured store at {} (embeddings in {})",
                        store.base_url(),
                        config.embeddings_store.table
                    );
                    let embeddings: Arc<dyn EmbeddingStore> = Arc::new(
                        PostgrestEmbeddingStore::new(store.clone(), &config.embeddings_store.table),
                    );
                    let structured: Arc<dyn StructuredStore> = Arc::new(store);
                    (Some(structured), embeddings)
                }
                None => {
                    info!("No structured store configured, keeping embeddings in memory");
                    let embeddings: Arc<dyn EmbeddingStore> =
                        Arc::new(config.embeddings_store.build_store());
                    (None, embeddings)
                }
            };

        let index: Arc<dyn VectorIndex> = Arc::new(EmbeddingStoreIndex::new(embeddings.clone()));
        Self::assemble(provider, embeddings, structured, index, config.chat.clone())
    }

    /// Build the services from explicit collaborators.
    pub fn assemble(
        provider: Arc<dyn EmbeddingProvider>,
        embeddings: Arc<dyn EmbeddingStore>,
        structured: Option<Arc<dyn StructuredStore>>,
        index: Arc<dyn VectorIndex>,
        chat: ChatConfig,
    ) -> Self {
        let lookup = match structured {
            Some(store) => StructuredEvidenceSource::new(store),
            None => StructuredEvidenceSource::unconfigured(),
        };
        let vector = VectorEvidenceSource::new(provider.clone(), index);

        Self {
            chat: GroundedRetrieval::new(lookup.clone(), vector, chat),
            search: SemanticSearch::new(provider.clone(), embeddings.clone()),
            ingest: EmbeddingIngest::new(provider, embeddings),
            lookup,
        }
    }
}
