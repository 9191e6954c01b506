//! Errors surfaced to callers.

use serde::Serialize;
use thiserror::Error;

use crate::validation::FieldError;

/// Rejections returned by the request handler.
///
/// Backend unavailability is never one of these: it degrades to empty
/// evidence inside retrieval.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// One or more request fields are malformed or out of range.
    #[error("invalid request: {}", summarize(.0))]
    Validation(Vec<FieldError>),

    /// The requested method or domain is not recognised.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// A referenced session does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Stable machine-readable code.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation",
            ApiError::UnknownOperation(_) => "unknown_operation",
            ApiError::NotFound(_) => "not_found",
            ApiError::Internal(_) => "internal",
        }
    }

    /// Render as the wire error object.
    pub fn to_body(&self) -> ErrorBody {
        let fields = match self {
            ApiError::Validation(fields) => fields.clone(),
            _ => Vec::new(),
        };
        ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
            fields,
        }
    }
}

impl From<supplymind_retrieval::RetrievalError> for ApiError {
    fn from(err: supplymind_retrieval::RetrievalError) -> Self {
        match err {
            supplymind_retrieval::RetrievalError::UnknownDomain(domain) => {
                ApiError::UnknownOperation(format!("domain `{domain}`"))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Error object written on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    /// Value of [`ApiError::kind`].
    pub kind: &'static str,
    /// Human-readable description.
    pub message: String,
    /// Offending fields of a validation error.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

fn summarize(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.message))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_validation_body_lists_fields() {
        let err = ApiError::Validation(vec![
            FieldError::new("question", "must not be blank"),
            FieldError::new("top_k", "must be between 1 and 50"),
        ]);
        let body = serde_json::to_value(err.to_body()).unwrap();
        assert_eq!(body["kind"], "validation");
        assert_eq!(body["fields"][1]["field"], "top_k");
        assert_eq!(
            err.to_string(),
            "invalid request: question: must not be blank, top_k: must be between 1 and 50"
        );
    }

    #[test]
    fn test_unknown_domain_maps_to_unknown_operation() {
        let err: ApiError =
            supplymind_retrieval::RetrievalError::UnknownDomain("weather".to_string()).into();
        assert_eq!(err.kind(), "unknown_operation");
        assert!(err.to_body().fields.is_empty());
    }
}
