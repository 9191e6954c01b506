//! Conversation sessions.
//!
//! Sessions live in process memory, bounded by a maximum count: opening a
//! session beyond the bound drops the least recently used one. Each chat
//! exchange appends the user's question and the grounded answer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use supplymind_retrieval::config::DEFAULT_MAX_SESSIONS;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::ApiError;

/// Author of a session message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person asking.
    User,
    /// The copilot's grounded answer.
    Assistant,
}

/// One message in a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionMessage {
    /// Who wrote the message.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// Number of citations backing an assistant message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citations: Option<usize>,
    /// When the message was recorded.
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Session {
    messages: Vec<SessionMessage>,
    last_used: u64,
}

/// In-process session registry.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
    clock: AtomicU64,
    max_sessions: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_max_sessions(DEFAULT_MAX_SESSIONS)
    }
}

impl SessionStore {
    /// Registry keeping at most the default number of sessions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry keeping at most `max_sessions` sessions (at least one).
    pub fn with_max_sessions(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            clock: AtomicU64::new(0),
            max_sessions: max_sessions.max(1),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Open a new, empty session, dropping the least recently used one
    /// when the registry is full.
    pub async fn open(&self) -> Uuid {
        let id = Uuid::new_v4();
        let mut sessions = self.sessions.write().await;

        while sessions.len() >= self.max_sessions {
            let Some(stale) = sessions
                .iter()
                .min_by_key(|(_, session)| session.last_used)
                .map(|(id, _)| *id)
            else {
                break;
            };
            sessions.remove(&stale);
            debug!("Dropped least recently used session {stale}");
        }

        sessions.insert(
            id,
            Session {
                messages: Vec::new(),
                last_used: self.tick(),
            },
        );
        debug!("Opened session {id}");
        id
    }

    /// Fail with `NotFound` unless `id` is a known session.
    pub async fn ensure(&self, id: Uuid) -> Result<(), ApiError> {
        if self.sessions.read().await.contains_key(&id) {
            Ok(())
        } else {
            Err(not_found(id))
        }
    }

    /// Record a question and its answer.
    pub async fn append_exchange(
        &self,
        id: Uuid,
        question: &str,
        answer: &str,
        citations: usize,
    ) -> Result<(), ApiError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&id).ok_or_else(|| not_found(id))?;
        session.last_used = self.tick();
        let now = Utc::now();
        session.messages.push(SessionMessage {
            role: Role::User,
            content: question.to_string(),
            citations: None,
            created_at: now,
        });
        session.messages.push(SessionMessage {
            role: Role::Assistant,
            content: answer.to_string(),
            citations: Some(citations),
            created_at: now,
        });
        Ok(())
    }

    /// Messages of session `id`, oldest first.
    pub async fn history(&self, id: Uuid) -> Result<Vec<SessionMessage>, ApiError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .map(|session| session.messages.clone())
            .ok_or_else(|| not_found(id))
    }

    /// Number of sessions currently kept.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

fn not_found(id: Uuid) -> ApiError {
    ApiError::NotFound(format!("session {id}"))
}
