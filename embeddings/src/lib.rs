//! # Embeddings
//!
//! This crate provides embedding generation, stored-embedding records and
//! similarity ranking for the SupplyMind copilot.
//!
//! ## Features
//!
//! - **Embedding Generation**: Convert text to unit-length dense vectors
//! - **Offline Fallback**: A deterministic hashing provider when no API is configured
//! - **Caching**: Avoid repeated API calls for identical text
//! - **Semantic Ranking**: Filter, score and rank stored embeddings against a query
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► Embedding ──► EmbeddingStore             │
//! │       │                    │              │                     │
//! │       ▼                    ▼              ▼                     │
//! │  OpenAI/Hashing       similarity      rank() ──► SearchHit      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod error;
pub mod fallback;
pub mod fingerprint;
pub mod provider;
pub mod ranking;
pub mod similarity;
pub mod store;

pub use cache::{CachedProvider, EmbeddingCache};
pub use error::{EmbeddingError, Result};
pub use fallback::HashingProvider;
pub use fingerprint::content_key;
pub use provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, OpenAIProvider};
pub use ranking::{RankOptions, SearchHit, rank};
pub use similarity::{cosine_similarity, similarity};
pub use store::{
    CandidateFilter, EmbeddingStore, InMemoryEmbeddingStore, InsertOutcome, StoredEmbedding,
};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Dimension of embeddings produced by the default OpenAI model.
pub const DEFAULT_DIMENSION: usize = 1536; // OpenAI text-embedding-3-small

/// Dimension of the offline hashing embeddings.
pub const FALLBACK_DIMENSION: usize = 384;

/// Default embedding model name.
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";
