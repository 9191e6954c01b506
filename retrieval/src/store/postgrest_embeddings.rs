//! Embedding records kept in a PostgREST table.

use async_trait::async_trait;
use serde_json::Value;
use supplymind_embeddings::{EmbeddingError, EmbeddingStore, InsertOutcome, StoredEmbedding};
use tracing::{debug, info};

use super::{PostgrestStore, StructuredStore, TableQuery};
use crate::error::StoreError;
use crate::evidence::Row;

/// [`EmbeddingStore`] over one table of a [`PostgrestStore`].
///
/// Rows carry the record's fields as columns. Candidates are enumerated
/// oldest first, ties broken by id, so ranking sees a stable order.
#[derive(Clone)]
pub struct PostgrestEmbeddingStore {
    store: PostgrestStore,
    table: String,
}

impl PostgrestEmbeddingStore {
    /// Keep records in `table` of `store`.
    pub fn new(store: PostgrestStore, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }

    async fn select_records(
        &self,
        query: &TableQuery,
    ) -> Result<Vec<StoredEmbedding>, EmbeddingError> {
        let rows = self.store.select(query).await.map_err(store_error)?;
        rows.into_iter().map(record_from).collect()
    }
}

fn store_error(err: StoreError) -> EmbeddingError {
    EmbeddingError::Store(err.to_string())
}

fn record_from(row: Row) -> Result<StoredEmbedding, EmbeddingError> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

#[async_trait]
impl EmbeddingStore for PostgrestEmbeddingStore {
    async fn insert(&self, record: StoredEmbedding) -> supplymind_embeddings::Result<InsertOutcome> {
        if let Some(existing) = self.find(&record.content_key, &record.model).await? {
            debug!("Embedding already stored: {}", existing.id);
            return Ok(InsertOutcome::Existing(existing));
        }

        let row = serde_json::to_value(&record)?;
        match self.store.insert_row(&self.table, &row).await {
            Ok(rows) => {
                let stored = match rows.into_iter().next() {
                    Some(row) => record_from(row)?,
                    None => record,
                };
                info!("Stored embedding {} in {}", stored.id, self.table);
                Ok(InsertOutcome::Inserted(stored))
            }
            // A concurrent writer stored the same key first.
            Err(StoreError::Backend { status: 409, .. }) => {
                match self.find(&record.content_key, &record.model).await? {
                    Some(existing) => Ok(InsertOutcome::Existing(existing)),
                    None => Err(EmbeddingError::Store(format!(
                        "conflicting insert into {} left no record",
                        self.table
                    ))),
                }
            }
            Err(err) => Err(store_error(err)),
        }
    }

    async fn find(
        &self,
        content_key: &str,
        model: &str,
    ) -> supplymind_embeddings::Result<Option<StoredEmbedding>> {
        let query = TableQuery::new(self.table.clone())
            .eq("content_key", Value::String(content_key.to_string()))
            .eq("model", Value::String(model.to_string()))
            .limit(1);
        Ok(self.select_records(&query).await?.into_iter().next())
    }

    async fn scan(&self) -> supplymind_embeddings::Result<Vec<StoredEmbedding>> {
        let mut records = self
            .select_records(&TableQuery::new(self.table.clone()))
            .await?;
        records.sort_by_key(|r| (r.created_at, r.id));
        Ok(records)
    }

    async fn len(&self) -> supplymind_embeddings::Result<usize> {
        Ok(self.scan().await?.len())
    }
}
