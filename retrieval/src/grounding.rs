//! Evidence consolidation under the no-hallucination rule.
//!
//! The answer text is a deterministic function of the retrieved rows:
//!
//! 1. No rows anywhere: the fixed [`INSUFFICIENT_DATA_MESSAGE`], no citations.
//! 2. Otherwise each row contributes a snippet of its allow-listed fields as
//!    `key=value` pairs joined by `"; "`. The text is [`ANSWER_PREFIX`] plus
//!    the first `snippet_limit` snippets. Every row is cited in full, and
//!    citations are not capped.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::domain::EvidenceSource;
use crate::evidence::{EvidenceBatch, Row};

/// Answer returned when no source produced a row.
pub const INSUFFICIENT_DATA_MESSAGE: &str =
    "Insufficient data in supply chain database to answer. Please refine your query.";

/// Prefix of every grounded answer.
pub const ANSWER_PREFIX: &str = "Based on supply chain data: ";

/// Fields rendered into snippets, in rendering order.
pub const SNIPPET_FIELDS: &[&str] = &[
    "sku", "id", "order_no", "status", "quantity", "location", "metric", "value", "severity",
];

/// Default cap on rendered snippets.
pub const DEFAULT_SNIPPET_LIMIT: usize = 10;

/// The exact row backing part of an answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    /// Source of the row.
    pub source: EvidenceSource,
    /// The row as retrieved.
    pub row: Row,
}

/// A grounded answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    /// Answer text.
    pub text: String,

    /// One citation per retrieved row, in retrieval order.
    pub citations: Vec<Citation>,

    /// Every source consulted, including those that returned nothing.
    pub sources_consulted: Vec<EvidenceSource>,

    /// Time spent retrieving evidence.
    #[serde(skip)]
    pub retrieval_latency: Duration,
}

impl Answer {
    /// Whether the answer is the insufficiency response.
    pub fn is_insufficient(&self) -> bool {
        self.citations.is_empty()
    }
}

/// Builds answers from evidence batches.
#[derive(Debug, Clone)]
pub struct Consolidator {
    snippet_limit: usize,
}

impl Default for Consolidator {
    fn default() -> Self {
        Self::new(DEFAULT_SNIPPET_LIMIT)
    }
}

impl Consolidator {
    /// Consolidator rendering at most `snippet_limit` snippets.
    pub fn new(snippet_limit: usize) -> Self {
        Self { snippet_limit }
    }

    /// Build the answer for `query` from `batches`, in batch order.
    ///
    /// `retrieval_latency` is the sum of batch latencies; callers that
    /// dispatch concurrently overwrite it with their wall-clock time.
    pub fn build_answer(&self, query: &str, batches: &[EvidenceBatch]) -> Answer {
        let mut sources_consulted: Vec<EvidenceSource> = Vec::new();
        for batch in batches {
            if !sources_consulted.contains(&batch.source) {
                sources_consulted.push(batch.source.clone());
            }
        }
        let retrieval_latency: Duration = batches.iter().map(|b| b.latency).sum();

        let total_rows: usize = batches.iter().map(EvidenceBatch::len).sum();
        debug!("Consolidating {total_rows} rows for query of {} chars", query.len());

        if total_rows == 0 {
            return Answer {
                text: INSUFFICIENT_DATA_MESSAGE.to_string(),
                citations: Vec::new(),
                sources_consulted,
                retrieval_latency,
            };
        }

        let mut snippets: Vec<String> = Vec::new();
        let mut citations: Vec<Citation> = Vec::with_capacity(total_rows);

        for batch in batches {
            for row in &batch.rows {
                if let Some(snippet) = snippet(row) {
                    snippets.push(snippet);
                }
                citations.push(Citation {
                    source: batch.source.clone(),
                    row: row.clone(),
                });
            }
        }

        let rendered: Vec<&str> = snippets
            .iter()
            .take(self.snippet_limit)
            .map(String::as_str)
            .collect();

        Answer {
            text: format!("{ANSWER_PREFIX}{}", rendered.join("; ")),
            citations,
            sources_consulted,
            retrieval_latency,
        }
    }
}

/// Build an answer with the default snippet cap.
pub fn build_answer(query: &str, batches: &[EvidenceBatch]) -> Answer {
    Consolidator::default().build_answer(query, batches)
}

/// `key=value` pairs of the allow-listed fields present in `row`.
fn snippet(row: &Row) -> Option<String> {
    let fields: Vec<String> = SNIPPET_FIELDS
        .iter()
        .filter_map(|key| match row.get(*key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(format!("{key}={s}")),
            Some(other) => Some(format!("{key}={other}")),
        })
        .collect();

    if fields.is_empty() {
        None
    } else {
        Some(fields.join("; "))
    }
}
