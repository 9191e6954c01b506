//! Wire types for the copilot server.
//!
//! Every line on stdin is a [`Request`] envelope; every line on stdout is a
//! [`Response`] carrying either a `result` or an `error`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use supplymind_embeddings::SearchHit;
use supplymind_retrieval::{Citation, Row};
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::session::SessionMessage;

/// Row limit per domain for a chat request that gives none (or zero).
pub const DEFAULT_CHAT_TOP_K: i64 = 8;
/// Search results returned when the request gives no `top_k`.
pub const DEFAULT_SEARCH_TOP_K: i64 = 5;
/// Minimum similarity when the request gives no `threshold`.
pub const DEFAULT_SEARCH_THRESHOLD: f64 = 0.7;
/// Source type of embeddings created without one.
pub const DEFAULT_SOURCE_TYPE: &str = "document";

/// Request envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    /// Caller-chosen id echoed in the response.
    pub id: Option<Value>,
    /// Operation name, see [`Method`].
    pub method: String,
    /// Operation parameters.
    #[serde(default)]
    pub params: Value,
}

/// Response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    /// Id of the request this answers; null when the line did not parse.
    pub id: Option<Value>,
    /// Operation result on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    /// A successful response carrying `result`.
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// A failed response describing `error`.
    pub fn failure(id: Option<Value>, error: &ApiError) -> Self {
        Self {
            id,
            result: None,
            error: Some(error.to_body()),
        }
    }
}

/// Operations the server understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `chat`: grounded question answering.
    Chat,
    /// `search`: semantic search over stored embeddings.
    Search,
    /// `embed`: create a stored embedding.
    Embed,
    /// `domain_query`: rows from one domain table.
    DomainQuery,
    /// `session_history`: messages of a chat session.
    SessionHistory,
}

impl FromStr for Method {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(Method::Chat),
            "search" => Ok(Method::Search),
            "embed" => Ok(Method::Embed),
            "domain_query" => Ok(Method::DomainQuery),
            "session_history" => Ok(Method::SessionHistory),
            other => Err(ApiError::UnknownOperation(format!("method `{other}`"))),
        }
    }
}

fn default_chat_top_k() -> i64 {
    DEFAULT_CHAT_TOP_K
}

fn default_search_top_k() -> i64 {
    DEFAULT_SEARCH_TOP_K
}

fn default_search_threshold() -> f64 {
    DEFAULT_SEARCH_THRESHOLD
}

fn default_source_type() -> String {
    DEFAULT_SOURCE_TYPE.to_string()
}

/// Grounded chat question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The question.
    pub question: String,
    /// Column filters applied to domain queries.
    #[serde(default)]
    pub filters: Map<String, Value>,
    /// Row limit per domain; zero means [`DEFAULT_CHAT_TOP_K`].
    #[serde(default = "default_chat_top_k")]
    pub top_k: i64,
    /// Continue an existing conversation.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Grounded chat answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatResponse {
    /// Answer text built only from retrieved rows.
    pub answer: String,
    /// One entry per retrieved row.
    pub citations: Vec<Citation>,
    /// Sources consulted, in consultation order.
    pub sources: Vec<String>,
    /// Wall-clock retrieval time in milliseconds.
    pub retrieval_ms: f64,
    /// Session the exchange was recorded in.
    pub session_id: Uuid,
}

/// Semantic search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Text to search for.
    pub query: String,
    /// Maximum number of results.
    #[serde(default = "default_search_top_k")]
    pub top_k: i64,
    /// Minimum similarity score.
    #[serde(default = "default_search_threshold")]
    pub threshold: f64,
    /// Restrict to these source types.
    #[serde(default)]
    pub source_types: Option<Vec<String>>,
    /// Metadata values results must carry.
    #[serde(default)]
    pub filters: Map<String, Value>,
    /// Return the query vector and stored vectors.
    #[serde(default)]
    pub include_embeddings: bool,
}

/// Semantic search results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    /// Hits, best first.
    pub results: Vec<SearchHit>,
    /// The query vector, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_embedding: Option<Vec<f32>>,
    /// Number of hits returned.
    pub total_results: usize,
    /// Seconds.
    pub processing_time: f64,
}

/// Embedding creation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedRequest {
    /// Text to embed.
    pub text: String,
    /// Provider default when unset.
    #[serde(default)]
    pub model: Option<String>,
    /// Kind of source the text came from.
    #[serde(default = "default_source_type")]
    pub source_type: String,
    /// Id of the source record.
    #[serde(default)]
    pub source_id: Option<String>,
    /// Metadata searchable through `filters`.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Created (or reused) embedding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedResponse {
    /// Id of the stored record.
    pub embedding_id: Uuid,
    /// The stored vector.
    pub vector: Vec<f32>,
    /// Model that produced it.
    pub model: String,
    /// Tokens reported by the provider, or whitespace tokens.
    pub token_count: u64,
    /// Seconds.
    pub processing_time: f64,
    /// False when an identical text was already stored for this model.
    pub created: bool,
}

/// Direct lookup in one domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainQueryRequest {
    /// Domain label (`inventory`, `orders`, `risk`, `analytics`) or its table name.
    pub domain: String,
    /// Column filters, plus the domain's own keys such as `limit`.
    #[serde(default)]
    pub filters: Map<String, Value>,
}

/// Rows from one domain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainQueryResponse {
    /// Canonical domain label.
    pub domain: String,
    /// Rows as returned by the store; empty when it is unavailable.
    pub rows: Vec<Row>,
    /// Query time in milliseconds.
    pub query_ms: f64,
}

/// Request for a session's messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionHistoryRequest {
    /// Session UUID.
    pub session_id: String,
}

/// A session's messages, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionHistoryResponse {
    /// The session.
    pub session_id: Uuid,
    /// Its messages.
    pub messages: Vec<SessionMessage>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_request_defaults() {
        let chat: ChatRequest = serde_json::from_value(json!({"question": "stock?"})).unwrap();
        assert_eq!(chat.top_k, 8);
        assert!(chat.filters.is_empty());
        assert_eq!(chat.session_id, None);

        let search: SearchRequest = serde_json::from_value(json!({"query": "port"})).unwrap();
        assert_eq!(search.top_k, 5);
        assert_eq!(search.threshold, 0.7);
        assert!(!search.include_embeddings);

        let embed: EmbedRequest = serde_json::from_value(json!({"text": "note"})).unwrap();
        assert_eq!(embed.source_type, "document");
        assert_eq!(embed.model, None);
    }

    #[test]
    fn test_method_names() {
        assert_eq!("domain_query".parse::<Method>().unwrap(), Method::DomainQuery);
        assert!(matches!(
            "forecast".parse::<Method>(),
            Err(ApiError::UnknownOperation(_))
        ));
    }

    #[test]
    fn test_response_omits_empty_side() {
        let ok = serde_json::to_value(Response::success(Some(json!(1)), json!({"x": 1}))).unwrap();
        assert_eq!(ok, json!({"id": 1, "result": {"x": 1}}));

        let err = Response::failure(None, &ApiError::NotFound("session".to_string()));
        let err = serde_json::to_value(err).unwrap();
        assert_eq!(err["id"], Value::Null);
        assert_eq!(err["error"]["kind"], "not_found");
        assert!(err.get("result").is_none());
    }
}
