//! Evidence batches and retrieval outcomes.

use std::time::Duration;

use serde_json::{Map, Value};

use crate::domain::EvidenceSource;
use crate::error::RetrievalError;

/// One retrieved record: field name to value.
pub type Row = Map<String, Value>;

/// Rows returned by a single retrieval call.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceBatch {
    /// Source that produced the rows.
    pub source: EvidenceSource,

    /// Rows in retrieval order.
    pub rows: Vec<Row>,

    /// Wall-clock time of the call.
    pub latency: Duration,
}

impl EvidenceBatch {
    /// Create a batch.
    pub fn new(source: EvidenceSource, rows: Vec<Row>, latency: Duration) -> Self {
        Self {
            source,
            rows,
            latency,
        }
    }

    /// A batch with no rows and zero latency.
    pub fn empty(source: EvidenceSource) -> Self {
        Self::new(source, Vec::new(), Duration::ZERO)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the batch has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Outcome of a retrieval call.
///
/// `Found` covers every valid result, including an empty one. `Degraded`
/// means the backend failed; it still carries an empty batch so the caller
/// can keep consolidating evidence from other sources.
#[derive(Debug)]
pub enum Retrieval {
    /// The backend answered.
    Found(EvidenceBatch),
    /// The backend failed or is not configured.
    Degraded {
        /// Empty batch standing in for the failed call.
        batch: EvidenceBatch,
        /// What went wrong.
        fault: RetrievalError,
    },
}

impl Retrieval {
    /// Wrap a failure as an empty batch for `source`.
    pub fn degraded(source: EvidenceSource, fault: impl Into<RetrievalError>) -> Self {
        Retrieval::Degraded {
            batch: EvidenceBatch::empty(source),
            fault: fault.into(),
        }
    }

    /// Whether the backend failed.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Retrieval::Degraded { .. })
    }

    /// The batch, regardless of outcome.
    pub fn batch(&self) -> &EvidenceBatch {
        match self {
            Retrieval::Found(batch) | Retrieval::Degraded { batch, .. } => batch,
        }
    }

    /// The fault, if any.
    pub fn fault(&self) -> Option<&RetrievalError> {
        match self {
            Retrieval::Found(_) => None,
            Retrieval::Degraded { fault, .. } => Some(fault),
        }
    }

    /// Consume the outcome and keep only the batch.
    pub fn into_batch(self) -> EvidenceBatch {
        match self {
            Retrieval::Found(batch) | Retrieval::Degraded { batch, .. } => batch,
        }
    }
}
