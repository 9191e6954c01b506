//! Structured evidence retrieval.
//!
//! Each domain maps to one table and a small allow-list of filter keys:
//!
//! | domain    | table               | filters                                      |
//! |-----------|---------------------|----------------------------------------------|
//! | inventory | `inventory`         | `sku` (eq), `limit`                          |
//! | orders    | `orders`            | `order_id` (eq on `id`), `status` (eq), `limit` |
//! | risk      | `risk_events`       | `severity` (gte), `since` (gte on `event_time`) |
//! | analytics | `analytics_metrics` | `metric` (eq), `since` (gte on `ts`)         |
//!
//! Other keys are ignored. Store failures come back as
//! [`Retrieval::Degraded`] with an empty, zero-latency batch.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::domain::{DomainLabel, EvidenceSource};
use crate::error::StoreError;
use crate::evidence::{EvidenceBatch, Retrieval};
use crate::store::{StructuredStore, TableQuery};

/// Filter key naming a remote procedure.
pub const PROCEDURE_KEY: &str = "rpc";

/// Filter key holding the procedure's argument bundle.
pub const PROCEDURE_ARGS_KEY: &str = "args";

/// Runs domain lookups against a [`StructuredStore`].
#[derive(Clone)]
pub struct StructuredEvidenceSource {
    store: Option<Arc<dyn StructuredStore>>,
}

impl StructuredEvidenceSource {
    /// Source backed by `store`.
    pub fn new(store: Arc<dyn StructuredStore>) -> Self {
        Self { store: Some(store) }
    }

    /// Source with no store; every lookup degrades to an empty batch.
    pub fn unconfigured() -> Self {
        Self { store: None }
    }

    /// Translate a domain and caller filters into a table query.
    pub fn build_query(domain: DomainLabel, filters: &Map<String, Value>) -> TableQuery {
        let mut query = TableQuery::new(domain.table());
        let present = |key: &str| filters.get(key).filter(|v| !v.is_null()).cloned();

        match domain {
            DomainLabel::Inventory => {
                if let Some(sku) = present("sku") {
                    query = query.eq("sku", sku);
                }
            }
            DomainLabel::Orders => {
                if let Some(order_id) = present("order_id") {
                    query = query.eq("id", order_id);
                }
                if let Some(status) = present("status") {
                    query = query.eq("status", status);
                }
            }
            DomainLabel::Risk => {
                if let Some(severity) = present("severity") {
                    query = query.gte("severity", severity);
                }
                if let Some(since) = present("since") {
                    query = query.gte("event_time", since);
                }
            }
            DomainLabel::Analytics => {
                if let Some(metric) = present("metric") {
                    query = query.eq("metric", metric);
                }
                if let Some(since) = present("since") {
                    query = query.gte("ts", since);
                }
            }
        }

        if matches!(domain, DomainLabel::Inventory | DomainLabel::Orders) {
            if let Some(limit) = filters.get("limit").and_then(parse_limit) {
                query = query.limit(limit);
            }
        }

        query
    }

    /// Look up evidence for one domain.
    pub async fn fetch(&self, domain: DomainLabel, filters: &Map<String, Value>) -> Retrieval {
        let source = EvidenceSource::Domain(domain);
        let Some(store) = &self.store else {
            return Retrieval::degraded(source, StoreError::NotConfigured);
        };

        let query = Self::build_query(domain, filters);
        let start = Instant::now();
        match store.select(&query).await {
            Ok(rows) => {
                debug!("{domain}: {} rows", rows.len());
                Retrieval::Found(EvidenceBatch::new(source, rows, start.elapsed()))
            }
            Err(err) => {
                warn!("{domain} lookup failed: {err}");
                Retrieval::degraded(source, err)
            }
        }
    }

    /// Look up evidence for one domain, degrading failures to an empty batch.
    pub async fn query(&self, domain: DomainLabel, filters: &Map<String, Value>) -> EvidenceBatch {
        self.fetch(domain, filters).await.into_batch()
    }

    /// The procedure name and arguments carried in `filters`, if any.
    pub fn procedure_request(filters: &Map<String, Value>) -> Option<(String, Value)> {
        let name = filters.get(PROCEDURE_KEY)?.as_str()?.trim();
        if name.is_empty() {
            return None;
        }
        let args = filters
            .get(PROCEDURE_ARGS_KEY)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        Some((name.to_string(), args))
    }

    /// Invoke a named remote procedure.
    pub async fn call_procedure(&self, name: &str, args: &Value) -> Retrieval {
        let source = EvidenceSource::Procedure(name.to_string());
        let Some(store) = &self.store else {
            return Retrieval::degraded(source, StoreError::NotConfigured);
        };

        let start = Instant::now();
        match store.call(name, args).await {
            Ok(rows) => Retrieval::Found(EvidenceBatch::new(source, rows, start.elapsed())),
            Err(err) => {
                warn!("procedure {name} failed: {err}");
                Retrieval::degraded(source, err)
            }
        }
    }
}

fn parse_limit(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FilterOp, InMemoryStore};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn filters(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_build_query_maps_allowed_keys() {
        let query = StructuredEvidenceSource::build_query(
            DomainLabel::Orders,
            &filters(json!({"order_id": "SO-9", "status": "open", "limit": "5", "color": "red"})),
        );
        assert_eq!(query.table, "orders");
        assert_eq!(query.limit, Some(5));
        let columns: Vec<(&str, FilterOp)> = query
            .filters
            .iter()
            .map(|f| (f.column.as_str(), f.op))
            .collect();
        assert_eq!(columns, vec![("id", FilterOp::Eq), ("status", FilterOp::Eq)]);
    }

    #[test]
    fn test_build_query_risk_thresholds() {
        let query = StructuredEvidenceSource::build_query(
            DomainLabel::Risk,
            &filters(json!({"severity": 3, "since": "2024-01-01", "limit": 2})),
        );
        assert_eq!(query.table, "risk_events");
        assert_eq!(query.limit, None);
        assert!(query.filters.iter().all(|f| f.op == FilterOp::Gte));
        assert_eq!(query.filters[1].column, "event_time");
    }

    #[tokio::test]
    async fn test_fetch_found_and_degraded() {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_rows(
                "inventory",
                vec![filters(json!({"sku": "SKU-1001", "quantity": 120}))],
            )
            .await;
        let source = StructuredEvidenceSource::new(store.clone());

        let found = source
            .fetch(DomainLabel::Inventory, &filters(json!({"sku": "SKU-1001"})))
            .await;
        assert!(!found.is_degraded());
        assert_eq!(found.batch().len(), 1);

        store.set_offline(true);
        let degraded = source.fetch(DomainLabel::Inventory, &Map::new()).await;
        assert!(degraded.is_degraded());
        assert!(degraded.batch().is_empty());
        assert_eq!(degraded.batch().latency, std::time::Duration::ZERO);
    }

    #[tokio::test]
    async fn test_unconfigured_source_degrades() {
        let source = StructuredEvidenceSource::unconfigured();
        let batch = source.query(DomainLabel::Analytics, &Map::new()).await;
        assert_eq!(batch.source, EvidenceSource::Domain(DomainLabel::Analytics));
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_procedure_escape_hatch() {
        let store = Arc::new(InMemoryStore::new());
        store
            .register_procedure("supplier_scorecard", |_| vec![filters(json!({"value": 0.93}))])
            .await;
        let source = StructuredEvidenceSource::new(store);

        let request = filters(json!({"rpc": "supplier_scorecard", "args": {"supplier": "ACME"}}));
        let (name, args) = StructuredEvidenceSource::procedure_request(&request).unwrap();
        assert_eq!(args, json!({"supplier": "ACME"}));

        let found = source.call_procedure(&name, &args).await;
        assert_eq!(found.batch().len(), 1);

        let missing = source.call_procedure("nope", &json!({})).await;
        assert!(missing.is_degraded());
        assert!(missing.batch().is_empty());
    }
}
