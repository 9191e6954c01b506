//! In-memory structured store.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use super::{Filter, FilterOp, StructuredStore, TableQuery, value_text};
use crate::error::StoreError;
use crate::evidence::Row;

type Procedure = Arc<dyn Fn(&Value) -> Vec<Row> + Send + Sync>;

/// Tables and procedures held in memory, with the same filter semantics as
/// the PostgREST backend.
///
/// The store can be switched offline to simulate an unreachable backend.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    procedures: RwLock<HashMap<String, Procedure>>,
    offline: AtomicBool,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append rows to a table, creating it if needed.
    pub async fn insert_rows(&self, table: &str, rows: impl IntoIterator<Item = Row>) {
        let mut tables = self.tables.write().await;
        tables.entry(table.to_string()).or_default().extend(rows);
    }

    /// Register a remote procedure.
    pub async fn register_procedure<F>(&self, name: &str, procedure: F)
    where
        F: Fn(&Value) -> Vec<Row> + Send + Sync + 'static,
    {
        self.procedures
            .write()
            .await
            .insert(name.to_string(), Arc::new(procedure));
    }

    /// Simulate the backend going away (or coming back).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, AtomicOrdering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::Unreachable("in-memory store is offline".to_string()));
        }
        Ok(())
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::String(b)) => a.as_f64()?.partial_cmp(&b.parse::<f64>().ok()?),
        (Value::String(a), Value::Number(b)) => a.parse::<f64>().ok()?.partial_cmp(&b.as_f64()?),
        _ => None,
    }
}

fn row_matches(row: &Row, filter: &Filter) -> bool {
    let Some(actual) = row.get(&filter.column) else {
        return false;
    };
    match filter.op {
        FilterOp::Eq => actual == &filter.value || value_text(actual) == value_text(&filter.value),
        FilterOp::Gte => matches!(
            compare(actual, &filter.value),
            Some(Ordering::Greater | Ordering::Equal)
        ),
    }
}

#[async_trait]
impl StructuredStore for InMemoryStore {
    async fn select(&self, query: &TableQuery) -> Result<Vec<Row>, StoreError> {
        self.check_online()?;

        let tables = self.tables.read().await;
        let Some(rows) = tables.get(&query.table) else {
            return Err(StoreError::Backend {
                status: 404,
                body: format!("relation \"{}\" does not exist", query.table),
            });
        };

        let limit = query.limit.unwrap_or(usize::MAX);
        let selected: Vec<Row> = rows
            .iter()
            .filter(|row| query.filters.iter().all(|f| row_matches(row, f)))
            .take(limit)
            .cloned()
            .collect();

        debug!("Selected {} rows from {}", selected.len(), query.table);
        Ok(selected)
    }

    async fn call(&self, procedure: &str, args: &Value) -> Result<Vec<Row>, StoreError> {
        self.check_online()?;

        let procedures = self.procedures.read().await;
        let procedure_fn = procedures
            .get(procedure)
            .ok_or_else(|| StoreError::UnknownProcedure(procedure.to_string()))?;
        Ok(procedure_fn(args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => Row::new(),
        }
    }

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .insert_rows(
                "risk_events",
                vec![
                    row(json!({"id": "r1", "severity": 2, "event_time": "2024-01-01T00:00:00Z"})),
                    row(json!({"id": "r2", "severity": 4, "event_time": "2024-03-01T00:00:00Z"})),
                    row(json!({"id": "r3", "severity": 5, "event_time": "2023-12-01T00:00:00Z"})),
                ],
            )
            .await;
        store
    }

    #[tokio::test]
    async fn test_gte_filters_combine() {
        let store = seeded().await;
        let query = TableQuery::new("risk_events")
            .gte("severity", json!(3))
            .gte("event_time", json!("2024-01-01"));

        let rows = store.select(&query).await.unwrap();
        let ids: Vec<&Value> = rows.iter().filter_map(|r| r.get("id")).collect();
        assert_eq!(ids, vec![&json!("r2")]);
    }

    #[tokio::test]
    async fn test_eq_matches_across_number_and_text() {
        let store = InMemoryStore::new();
        store
            .insert_rows("orders", vec![row(json!({"id": 42, "status": "open"}))])
            .await;

        let rows = store
            .select(&TableQuery::new("orders").eq("id", json!("42")))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_limit_and_offline() {
        let store = seeded().await;
        let rows = store
            .select(&TableQuery::new("risk_events").limit(2))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);

        store.set_offline(true);
        assert!(matches!(
            store.select(&TableQuery::new("risk_events")).await,
            Err(StoreError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn test_procedures() {
        let store = InMemoryStore::new();
        store
            .register_procedure("late_orders", |args| {
                vec![row(json!({"id": "o1", "days": args.get("days").cloned()}))]
            })
            .await;

        let rows = store.call("late_orders", &json!({"days": 3})).await.unwrap();
        assert_eq!(rows[0].get("days"), Some(&json!(3)));
        assert!(matches!(
            store.call("missing", &json!({})).await,
            Err(StoreError::UnknownProcedure(_))
        ));
    }
}
