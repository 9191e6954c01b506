//! Data domains and evidence source labels.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::RetrievalError;

/// A data domain a query can be routed to.
///
/// The declaration order is the order domains are consulted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DomainLabel {
    /// Stock levels per SKU and location.
    Inventory,
    /// Customer and purchase orders.
    Orders,
    /// Supply chain risk events.
    Risk,
    /// KPI time series.
    Analytics,
}

impl DomainLabel {
    /// All domains in consultation order.
    pub const ALL: [DomainLabel; 4] = [
        DomainLabel::Inventory,
        DomainLabel::Orders,
        DomainLabel::Risk,
        DomainLabel::Analytics,
    ];

    /// Stable lower-case label.
    pub fn as_str(self) -> &'static str {
        match self {
            DomainLabel::Inventory => "inventory",
            DomainLabel::Orders => "orders",
            DomainLabel::Risk => "risk",
            DomainLabel::Analytics => "analytics",
        }
    }

    /// Backing table in the structured store.
    pub fn table(self) -> &'static str {
        match self {
            DomainLabel::Inventory => "inventory",
            DomainLabel::Orders => "orders",
            DomainLabel::Risk => "risk_events",
            DomainLabel::Analytics => "analytics_metrics",
        }
    }
}

impl fmt::Display for DomainLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DomainLabel {
    type Err = RetrievalError;

    /// Accepts the label or the table name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        DomainLabel::ALL
            .into_iter()
            .find(|d| d.as_str() == lowered || d.table() == lowered)
            .ok_or_else(|| RetrievalError::UnknownDomain(s.to_string()))
    }
}

impl Serialize for DomainLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Where a batch of evidence came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EvidenceSource {
    /// Nearest-neighbour match over stored embeddings.
    Vector,
    /// A structured domain lookup.
    Domain(DomainLabel),
    /// A named remote procedure.
    Procedure(String),
}

impl fmt::Display for EvidenceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvidenceSource::Vector => f.write_str("vector"),
            EvidenceSource::Domain(domain) => f.write_str(domain.as_str()),
            EvidenceSource::Procedure(name) => write!(f, "rpc:{name}"),
        }
    }
}

impl From<DomainLabel> for EvidenceSource {
    fn from(domain: DomainLabel) -> Self {
        EvidenceSource::Domain(domain)
    }
}

impl Serialize for EvidenceSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
