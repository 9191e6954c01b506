//! Semantic search ranking.
//!
//! [`rank`] is a pure function over whatever candidates the store
//! enumerates: filter, score by dot product, drop scores below the
//! threshold, stable-sort descending and cap at `top_k`. The in-memory
//! store enumerates by linear scan, which bounds how far this scales; an
//! index-backed store only has to hand over candidates in a stable order.

use std::cmp::Reverse;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::Embedding;
use crate::similarity::similarity;
use crate::store::{CandidateFilter, StoredEmbedding};

/// Bounds and filters for a ranking pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankOptions {
    /// Maximum number of hits.
    pub top_k: usize,

    /// Minimum similarity score (inclusive).
    pub threshold: f32,

    /// Source type, metadata and model restrictions.
    pub filter: CandidateFilter,

    /// Whether hits carry the stored vector.
    pub include_vectors: bool,
}

impl RankOptions {
    /// Options with no filters and vectors omitted.
    pub fn new(top_k: usize, threshold: f32) -> Self {
        Self {
            top_k,
            threshold,
            filter: CandidateFilter::default(),
            include_vectors: false,
        }
    }

    /// Apply candidate filters.
    pub fn with_filter(mut self, filter: CandidateFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Include stored vectors in hits.
    pub fn with_vectors(mut self, include: bool) -> Self {
        self.include_vectors = include;
        self
    }
}

/// A ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// The stored text.
    pub content: String,

    /// Dot-product score in `[-1.0, 1.0]`.
    pub similarity_score: f32,

    /// Source type of the stored embedding.
    pub source_type: String,

    /// Source record id, if any.
    pub source_id: Option<String>,

    /// Stored metadata.
    pub metadata: Map<String, Value>,

    /// Id of the stored embedding.
    pub embedding_id: Uuid,

    /// The stored vector, present only when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_vector: Option<Embedding>,
}

/// Rank `candidates` against a unit-length `query` vector.
///
/// Equal scores keep the order in which `candidates` were given.
/// Candidates whose dimension differs from the query are skipped.
pub fn rank<I>(query: &[f32], candidates: I, options: &RankOptions) -> Vec<SearchHit>
where
    I: IntoIterator<Item = StoredEmbedding>,
{
    if options.top_k == 0 {
        return Vec::new();
    }

    let mut hits: Vec<SearchHit> = Vec::new();
    let mut skipped = 0usize;

    for candidate in candidates {
        if !options.filter.matches(&candidate) {
            continue;
        }

        let score = match similarity(query, &candidate.vector) {
            Ok(score) => score,
            Err(_) => {
                skipped += 1;
                continue;
            }
        };

        // NaN never passes.
        if !(score >= options.threshold) {
            continue;
        }

        hits.push(SearchHit {
            content: candidate.content,
            similarity_score: score,
            source_type: candidate.source_type,
            source_id: candidate.source_id,
            metadata: candidate.metadata,
            embedding_id: candidate.id,
            embedding_vector: options.include_vectors.then_some(candidate.vector),
        });
    }

    if skipped > 0 {
        debug!("Skipped {skipped} candidates with mismatched dimension");
    }

    // `sort_by_key` is stable, so ties keep retrieval order.
    hits.sort_by_key(|hit| Reverse(OrderedFloat(hit.similarity_score)));
    hits.truncate(options.top_k);
    hits
}
