//! Keyword intent routing.
//!
//! A query activates every domain whose keyword list has a substring match
//! in the lower-cased text. Domains are not exclusive and an unmatched
//! query activates none; the vector path runs regardless.

use std::collections::BTreeSet;

use crate::domain::DomainLabel;

const INVENTORY_KEYWORDS: &[&str] = &["stock", "inventory", "sku", "warehouse", "on hand", "reorder"];
const ORDER_KEYWORDS: &[&str] = &["order", "fulfill", "shipment", "backorder", "eta", "delivery"];
const RISK_KEYWORDS: &[&str] = &["risk", "disruption", "delay", "incident", "alert"];
const ANALYTICS_KEYWORDS: &[&str] = &[
    "kpi",
    "metric",
    "fill rate",
    "otif",
    "forecast",
    "trend",
    "analytics",
];

/// Keywords that route a query to `domain`.
pub fn keywords(domain: DomainLabel) -> &'static [&'static str] {
    match domain {
        DomainLabel::Inventory => INVENTORY_KEYWORDS,
        DomainLabel::Orders => ORDER_KEYWORDS,
        DomainLabel::Risk => RISK_KEYWORDS,
        DomainLabel::Analytics => ANALYTICS_KEYWORDS,
    }
}

/// Domains to consult for `query`, in consultation order.
pub fn classify(query: &str) -> BTreeSet<DomainLabel> {
    let lowered = query.to_lowercase();
    DomainLabel::ALL
        .into_iter()
        .filter(|domain| keywords(*domain).iter().any(|kw| lowered.contains(kw)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_inventory_query() {
        let domains = classify("What's the on-hand stock for SKU-1001?");
        assert!(domains.contains(&DomainLabel::Inventory));
    }

    #[test]
    fn test_orders_query() {
        let domains = classify("show me the order ETA");
        assert!(domains.contains(&DomainLabel::Orders));
    }

    #[test]
    fn test_multiple_domains() {
        let domains = classify("Which warehouse stock is tied up in backorder shipments?");
        assert_eq!(
            domains.into_iter().collect::<Vec<_>>(),
            vec![DomainLabel::Inventory, DomainLabel::Orders]
        );
    }

    #[test]
    fn test_risk_and_analytics() {
        let domains = classify("Any RISK alerts affecting the OTIF trend?");
        assert!(domains.contains(&DomainLabel::Risk));
        assert!(domains.contains(&DomainLabel::Analytics));
    }

    #[test]
    fn test_unmatched_query_is_empty() {
        assert!(classify("hello there").is_empty());
        assert!(classify("").is_empty());
    }
}
