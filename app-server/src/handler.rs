//! Request handler for the copilot server.

use std::time::Instant;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use supplymind_retrieval::{CopilotConfig, CopilotServices, DomainLabel};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::protocol::{
    ChatRequest, ChatResponse, DomainQueryRequest, DomainQueryResponse, EmbedRequest,
    EmbedResponse, Method, SearchRequest, SearchResponse, SessionHistoryRequest,
    SessionHistoryResponse,
};
use crate::session::SessionStore;
use crate::validation::{
    FieldError, validate_chat, validate_embed, validate_search, validate_session_id,
};

/// Row cap for inventory and order lookups that give no `limit`.
pub const DEFAULT_DOMAIN_LIMIT: u64 = 100;

/// Handler for copilot operations.
pub struct CopilotHandler {
    services: CopilotServices,
    sessions: SessionStore,
}

impl CopilotHandler {
    /// Create a handler over already-wired services.
    pub fn new(services: CopilotServices) -> Self {
        Self {
            services,
            sessions: SessionStore::new(),
        }
    }

    /// Create a handler from configuration.
    pub fn from_config(config: &CopilotConfig) -> Self {
        Self::new(CopilotServices::from_config(config))
            .with_sessions(SessionStore::with_max_sessions(config.sessions.max_sessions))
    }

    /// Replace the session registry.
    pub fn with_sessions(mut self, sessions: SessionStore) -> Self {
        self.sessions = sessions;
        self
    }

    /// Route a raw request to its operation.
    pub async fn dispatch(&self, method: &str, params: Value) -> Result<Value, ApiError> {
        match method.parse::<Method>()? {
            Method::Chat => encode(self.chat(decode(params)?).await?),
            Method::Search => encode(self.search(decode(params)?).await?),
            Method::Embed => encode(self.embed(decode(params)?).await?),
            Method::DomainQuery => encode(self.domain_query(decode(params)?).await?),
            Method::SessionHistory => encode(self.session_history(decode(params)?).await?),
        }
    }

    /// Answer a question from evidence, within a session.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ApiError> {
        let query = validate_chat(request)?;

        let session_id = match query.session_id {
            Some(id) => {
                self.sessions.ensure(id).await?;
                id
            }
            None => self.sessions.open().await,
        };

        let answer = self
            .services
            .chat
            .answer(&query.question, &query.filters, query.top_k)
            .await;

        self.sessions
            .append_exchange(
                session_id,
                &query.question,
                &answer.text,
                answer.citations.len(),
            )
            .await?;

        Ok(ChatResponse {
            sources: answer
                .sources_consulted
                .iter()
                .map(ToString::to_string)
                .collect(),
            retrieval_ms: answer.retrieval_latency.as_secs_f64() * 1000.0,
            answer: answer.text,
            citations: answer.citations,
            session_id,
        })
    }

    /// Rank stored embeddings against a query.
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse, ApiError> {
        let query = validate_search(request)?;

        let outcome = self
            .services
            .search
            .search(&query.query, &query.options)
            .await
            .map_err(|e| {
                warn!("Semantic search failed: {e}");
                ApiError::Internal(e.to_string())
            })?;

        Ok(SearchResponse {
            total_results: outcome.hits.len(),
            results: outcome.hits,
            query_embedding: query.include_embeddings.then_some(outcome.query_embedding),
            processing_time: outcome.elapsed.as_secs_f64(),
        })
    }

    /// Embed and store a text.
    pub async fn embed(&self, request: EmbedRequest) -> Result<EmbedResponse, ApiError> {
        let new = validate_embed(request)?;

        let outcome = self.services.ingest.create(new).await.map_err(|e| {
            warn!("Embedding creation failed: {e}");
            ApiError::Internal(e.to_string())
        })?;

        Ok(EmbedResponse {
            embedding_id: outcome.record.id,
            vector: outcome.record.vector,
            model: outcome.record.model,
            token_count: outcome.token_count,
            processing_time: outcome.elapsed.as_secs_f64(),
            created: outcome.created,
        })
    }

    /// Look up rows in one domain.
    pub async fn domain_query(
        &self,
        request: DomainQueryRequest,
    ) -> Result<DomainQueryResponse, ApiError> {
        if request.domain.trim().is_empty() {
            return Err(ApiError::Validation(vec![FieldError::new(
                "domain",
                "must not be blank",
            )]));
        }
        let domain: DomainLabel = request.domain.parse()?;

        let mut filters = request.filters;
        if matches!(domain, DomainLabel::Inventory | DomainLabel::Orders)
            && !filters.contains_key("limit")
        {
            filters.insert("limit".to_string(), json!(DEFAULT_DOMAIN_LIMIT));
        }

        let start = Instant::now();
        let batch = self.services.lookup.query(domain, &filters).await;
        info!("{domain} lookup returned {} rows", batch.len());

        Ok(DomainQueryResponse {
            domain: domain.to_string(),
            rows: batch.rows,
            query_ms: start.elapsed().as_secs_f64() * 1000.0,
        })
    }

    /// Messages exchanged in a session.
    pub async fn session_history(
        &self,
        request: SessionHistoryRequest,
    ) -> Result<SessionHistoryResponse, ApiError> {
        let session_id = validate_session_id(&request.session_id)?;
        let messages = self.sessions.history(session_id).await?;
        Ok(SessionHistoryResponse {
            session_id,
            messages,
        })
    }
}

fn decode<T: DeserializeOwned>(params: Value) -> Result<T, ApiError> {
    serde_json::from_value(params)
        .map_err(|e| ApiError::Validation(vec![FieldError::new("params", e.to_string())]))
}

fn encode<T: Serialize>(response: T) -> Result<Value, ApiError> {
    serde_json::to_value(response).map_err(|e| ApiError::Internal(e.to_string()))
}
