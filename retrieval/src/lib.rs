//! # Grounded Retrieval
//!
//! This crate answers supply-chain questions strictly from retrieved
//! evidence. It combines:
//!
//! - **Intent Routing**: Keyword classification of a question into domains
//! - **Structured Evidence**: Table lookups per domain, plus a named-procedure escape hatch
//! - **Vector Evidence**: Embedding match against stored documents
//! - **Consolidation**: A cited answer, or a fixed insufficiency message
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Grounded Retrieval                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │                  question ──► classify()                         │
//! │                       │            │                             │
//! │          ┌────────────┘            ▼                             │
//! │          ▼              ┌──────────────────────┐                 │
//! │  ┌──────────────┐       │ Structured Evidence  │                 │
//! │  │    Vector    │       │ inventory / orders / │                 │
//! │  │   Evidence   │       │ risk / analytics /   │                 │
//! │  └──────────────┘       │ rpc                  │                 │
//! │          │              └──────────────────────┘                 │
//! │          └────────────────┬────────┘                             │
//! │                           ▼                                      │
//! │                   ┌──────────────┐                               │
//! │                   │ Consolidator │ ──► Answer + citations        │
//! │                   └──────────────┘                               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use supplymind_retrieval::{CopilotConfig, CopilotServices};
//!
//! let services = CopilotServices::from_config(&CopilotConfig::from_env());
//! let answer = services
//!     .chat
//!     .answer("What's the on-hand stock for SKU-1001?", &filters, 8)
//!     .await;
//! ```

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod grounding;
pub mod ingest;
pub mod intent;
pub mod search;
pub mod services;
pub mod store;
pub mod structured;
pub mod vector;

pub use config::{
    ChatConfig, CopilotConfig, EmbeddingConfig, EmbeddingProviderType, EmbeddingStoreConfig,
    SessionConfig, StoreConfig,
};
pub use domain::{DomainLabel, EvidenceSource};
pub use engine::{GroundedRetrieval, GroundedRetrievalBuilder};
pub use error::{Result, RetrievalError, StoreError};
pub use evidence::{EvidenceBatch, Retrieval, Row};
pub use grounding::{ANSWER_PREFIX, Answer, Citation, Consolidator, INSUFFICIENT_DATA_MESSAGE};
pub use ingest::{EmbeddingIngest, IngestOutcome, NewEmbedding};
pub use intent::classify;
pub use search::{SearchOutcome, SemanticSearch};
pub use services::CopilotServices;
pub use store::{
    InMemoryStore, PostgrestEmbeddingStore, PostgrestStore, StructuredStore, TableQuery,
    VectorIndex,
};
pub use structured::StructuredEvidenceSource;
pub use vector::VectorEvidenceSource;
