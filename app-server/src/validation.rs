//! Request validation.
//!
//! Each `validate_*` function either returns a typed, trimmed request or a
//! [`ApiError::Validation`] listing every offending field. Nothing invalid
//! reaches retrieval.

use std::ops::RangeInclusive;

use serde::Serialize;
use serde_json::{Map, Value};
use supplymind_embeddings::{CandidateFilter, RankOptions};
use supplymind_retrieval::NewEmbedding;
use uuid::Uuid;

use crate::error::ApiError;
use crate::protocol::{ChatRequest, DEFAULT_CHAT_TOP_K, EmbedRequest, SearchRequest};

/// Longest accepted chat question.
pub const MAX_QUESTION_CHARS: usize = 10_000;
/// Longest accepted search query.
pub const MAX_QUERY_CHARS: usize = 1_000;
/// Longest text accepted for embedding.
pub const MAX_TEXT_CHARS: usize = 50_000;
/// Longest model name override.
pub const MAX_MODEL_CHARS: usize = 50;
/// Longest source type.
pub const MAX_SOURCE_TYPE_CHARS: usize = 50;
/// Longest source record id.
pub const MAX_SOURCE_ID_CHARS: usize = 255;
/// Accepted number of search results.
pub const SEARCH_TOP_K_RANGE: RangeInclusive<i64> = 1..=50;

/// A problem with one request field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    /// Field name, with an index for list elements (`source_types[1]`).
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl FieldError {
    /// Report `message` against `field`.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Default)]
struct Violations(Vec<FieldError>);

impl Violations {
    fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    /// Trimmed `value`, recording blank or overlong input.
    fn text(&mut self, field: &str, value: &str, max_chars: usize) -> String {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.push(field, "must not be blank");
        } else if trimmed.chars().count() > max_chars {
            self.push(field, format!("must be at most {max_chars} characters"));
        }
        trimmed.to_string()
    }

    fn search_top_k(&mut self, value: i64) -> usize {
        if !SEARCH_TOP_K_RANGE.contains(&value) {
            self.push(
                "top_k",
                format!(
                    "must be between {} and {}",
                    SEARCH_TOP_K_RANGE.start(),
                    SEARCH_TOP_K_RANGE.end()
                ),
            );
        }
        usize::try_from(value).unwrap_or(0)
    }

    /// Zero asks for the default; there is no upper bound.
    fn chat_top_k(&mut self, value: i64) -> usize {
        let value = if value == 0 { DEFAULT_CHAT_TOP_K } else { value };
        usize::try_from(value).unwrap_or_else(|_| {
            self.push("top_k", "must not be negative");
            0
        })
    }

    fn uuid(&mut self, field: &str, value: &str) -> Option<Uuid> {
        match Uuid::parse_str(value.trim()) {
            Ok(id) => Some(id),
            Err(_) => {
                self.push(field, "must be a UUID");
                None
            }
        }
    }

    fn finish<T>(self, value: T) -> Result<T, ApiError> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(ApiError::Validation(self.0))
        }
    }
}

/// A validated chat request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatQuery {
    /// Trimmed question.
    pub question: String,
    /// Column filters passed to the domain queries.
    pub filters: Map<String, Value>,
    /// Row limit per domain query.
    pub top_k: usize,
    /// Session to continue; a new one is opened when unset.
    pub session_id: Option<Uuid>,
}

/// Check a chat request: the question must be non-blank and at most
/// [`MAX_QUESTION_CHARS`], `top_k` non-negative (zero means the default),
/// and a session id, if given, a UUID.
pub fn validate_chat(request: ChatRequest) -> Result<ChatQuery, ApiError> {
    let mut violations = Violations::default();
    let question = violations.text("question", &request.question, MAX_QUESTION_CHARS);
    let top_k = violations.chat_top_k(request.top_k);
    let session_id = match &request.session_id {
        Some(id) => violations.uuid("session_id", id),
        None => None,
    };

    violations.finish(ChatQuery {
        question,
        filters: request.filters,
        top_k,
        session_id,
    })
}

/// A validated semantic search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// Trimmed query text.
    pub query: String,
    /// Ranking bounds and candidate filters.
    pub options: RankOptions,
    /// Whether the response carries the query vector.
    pub include_embeddings: bool,
}

/// Check a search request and turn it into ranking options.
///
/// `top_k` must lie in [`SEARCH_TOP_K_RANGE`] and `threshold` in
/// `[0.0, 1.0]`; `filters` become exact metadata matches.
pub fn validate_search(request: SearchRequest) -> Result<SearchQuery, ApiError> {
    let mut violations = Violations::default();
    let query = violations.text("query", &request.query, MAX_QUERY_CHARS);
    let top_k = violations.search_top_k(request.top_k);

    if !(0.0..=1.0).contains(&request.threshold) {
        violations.push("threshold", "must be between 0.0 and 1.0");
    }

    let mut filter = CandidateFilter::default();
    if let Some(source_types) = request.source_types {
        let mut cleaned = Vec::with_capacity(source_types.len());
        for (i, source_type) in source_types.iter().enumerate() {
            let field = format!("source_types[{i}]");
            cleaned.push(violations.text(&field, source_type, MAX_SOURCE_TYPE_CHARS));
        }
        filter = filter.with_source_types(cleaned);
    }
    for (key, value) in request.filters {
        filter = filter.with_metadata(key, value);
    }

    let options = RankOptions::new(top_k, request.threshold as f32)
        .with_filter(filter)
        .with_vectors(request.include_embeddings);

    violations.finish(SearchQuery {
        query,
        options,
        include_embeddings: request.include_embeddings,
    })
}

/// Check an embedding request. A blank `source_id` counts as none.
pub fn validate_embed(request: EmbedRequest) -> Result<NewEmbedding, ApiError> {
    let mut violations = Violations::default();
    let text = violations.text("text", &request.text, MAX_TEXT_CHARS);
    let model = request
        .model
        .as_deref()
        .map(|model| violations.text("model", model, MAX_MODEL_CHARS));
    let source_type = violations.text("source_type", &request.source_type, MAX_SOURCE_TYPE_CHARS);

    // A blank source id means "none".
    let source_id = request
        .source_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string);
    if let Some(id) = &source_id {
        if id.chars().count() > MAX_SOURCE_ID_CHARS {
            violations.push(
                "source_id",
                format!("must be at most {MAX_SOURCE_ID_CHARS} characters"),
            );
        }
    }

    violations.finish(NewEmbedding {
        text,
        model,
        source_type,
        source_id,
        metadata: request.metadata,
    })
}

/// Parse a session id.
pub fn validate_session_id(value: &str) -> Result<Uuid, ApiError> {
    let mut violations = Violations::default();
    let id = violations.uuid("session_id", value);
    violations.finish(id.unwrap_or_default())
}
