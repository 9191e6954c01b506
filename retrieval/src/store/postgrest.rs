//! PostgREST (Supabase) store backend.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{StructuredStore, TableQuery, value_text};
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::evidence::Row;

/// Structured store backed by a PostgREST endpoint.
#[derive(Clone)]
pub struct PostgrestStore {
    base_url: String,
    service_key: String,
    client: reqwest::Client,
}

impl PostgrestStore {
    /// Create a store for `base_url` (the project URL, without `/rest/v1`).
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Build a store from configuration. `None` when URL or key is missing.
    pub fn from_config(config: &StoreConfig) -> Option<Self> {
        let url = config.url.as_deref()?;
        let key = config.service_key.as_deref()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .ok()?;
        Some(Self::new(url, key).with_client(client))
    }

    /// Use a preconfigured HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Project URL the store talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/rest/v1/{path}", self.base_url)
    }

    /// Insert one row into `table` and return the stored representation.
    pub async fn insert_row(&self, table: &str, row: &Value) -> Result<Vec<Row>, StoreError> {
        debug!("PostgREST insert into {table}");

        let response = self
            .client
            .post(self.endpoint(table))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await?;

        Self::rows_from(response).await
    }

    async fn rows_from(response: reqwest::Response) -> Result<Vec<Row>, StoreError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        match response.json::<Value>().await? {
            Value::Array(items) => Ok(items.into_iter().map(into_row).collect()),
            Value::Null => Ok(Vec::new()),
            other => Ok(vec![into_row(other)]),
        }
    }
}

/// Objects become rows; scalars returned by a procedure are wrapped.
fn into_row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => {
            let mut row = Row::new();
            row.insert("value".to_string(), other);
            row
        }
    }
}

#[async_trait]
impl StructuredStore for PostgrestStore {
    async fn select(&self, query: &TableQuery) -> Result<Vec<Row>, StoreError> {
        let mut params: Vec<(String, String)> = vec![("select".to_string(), "*".to_string())];
        for filter in &query.filters {
            params.push((
                filter.column.clone(),
                format!("{}.{}", filter.op.as_str(), value_text(&filter.value)),
            ));
        }
        if let Some(limit) = query.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }

        debug!("PostgREST select on {} with {} filters", query.table, query.filters.len());

        let response = self
            .client
            .get(self.endpoint(&query.table))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .query(&params)
            .send()
            .await?;

        Self::rows_from(response).await
    }

    async fn call(&self, procedure: &str, args: &Value) -> Result<Vec<Row>, StoreError> {
        debug!("PostgREST rpc {procedure}");

        let response = self
            .client
            .post(self.endpoint(&format!("rpc/{procedure}")))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .json(args)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::UnknownProcedure(procedure.to_string()));
        }

        Self::rows_from(response).await
    }
}
