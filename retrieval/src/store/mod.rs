//! Storage seams for evidence retrieval.
//!
//! [`StructuredStore`] runs parameterized table selects and named remote
//! procedures; [`VectorIndex`] runs nearest-neighbour matches. Both are
//! external collaborators: the engine only sees rows or a [`StoreError`].
//! [`PostgrestEmbeddingStore`] keeps embedding records in a PostgREST table
//! so every operation shares them.

mod embedding_index;
mod memory;
mod postgrest;
mod postgrest_embeddings;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;
use crate::evidence::Row;

pub use embedding_index::EmbeddingStoreIndex;
pub use memory::InMemoryStore;
pub use postgrest::PostgrestStore;
pub use postgrest_embeddings::PostgrestEmbeddingStore;

/// Comparison applied by a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Column equals value.
    Eq,
    /// Column is greater than or equal to value.
    Gte,
}

impl FilterOp {
    /// PostgREST operator name.
    pub fn as_str(self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Gte => "gte",
        }
    }
}

/// A single column predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Column name.
    pub column: String,
    /// Comparison.
    pub op: FilterOp,
    /// Right-hand side.
    pub value: Value,
}

/// A parameterized select against one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableQuery {
    /// Table name.
    pub table: String,
    /// AND-combined predicates.
    pub filters: Vec<Filter>,
    /// Maximum number of rows.
    pub limit: Option<usize>,
}

impl TableQuery {
    /// Select every row of `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            limit: None,
        }
    }

    /// Require `column = value`.
    pub fn eq(mut self, column: impl Into<String>, value: Value) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            op: FilterOp::Eq,
            value,
        });
        self
    }

    /// Require `column >= value`.
    pub fn gte(mut self, column: impl Into<String>, value: Value) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            op: FilterOp::Gte,
            value,
        });
        self
    }

    /// Cap the number of rows.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Render a filter value the way it travels in a query string.
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A store of named tables and remote procedures.
#[async_trait]
pub trait StructuredStore: Send + Sync {
    /// Run a select.
    async fn select(&self, query: &TableQuery) -> Result<Vec<Row>, StoreError>;

    /// Call a named remote procedure with an argument bundle.
    async fn call(&self, procedure: &str, args: &Value) -> Result<Vec<Row>, StoreError>;
}

/// Nearest-neighbour matching over stored embeddings.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// At most `top_k` rows whose similarity to `query` is at least
    /// `threshold`, best first. Only vectors produced by `model` match.
    async fn match_embeddings(
        &self,
        query: &[f32],
        model: &str,
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<Row>, StoreError>;
}
