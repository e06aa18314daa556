// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy of the collection engine.
//!
//! Catalog errors are programming errors and only surface from startup validation. Every other
//! error is scoped to one request (or one page stream) and is logged by the orchestrator instead
//! of being propagated to the consumer of a run.

/// Contradictory descriptor metadata found while validating the catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("{endpoint}: url placeholder {{{placeholder}}} is not the declared path parameter")]
    UndeclaredUrlPlaceholder {
        endpoint: &'static str,
        placeholder: String,
    },

    #[error("{endpoint}: path parameter {param} does not appear in the url template")]
    UnusedPathParam {
        endpoint: &'static str,
        param: &'static str,
    },

    #[error("{endpoint}: unterminated placeholder in url template")]
    MalformedUrlTemplate { endpoint: &'static str },

    #[error("{endpoint}: fan-out strategy needs a non-empty query key")]
    MissingFanOutKey { endpoint: &'static str },

    #[error("{endpoint}: url suffix fan-out needs a default axis")]
    MissingSuffixAxis { endpoint: &'static str },

    #[error("{endpoint}: single-object responses need an id field")]
    MissingIdField { endpoint: &'static str },

    #[error("{endpoint}: envelope responses need a selector")]
    MissingSelector { endpoint: &'static str },
}

/// A mandatory path parameter was not supplied for a descriptor that needs one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{endpoint}: missing path parameter {param}")]
pub struct TemplateResolutionError {
    pub endpoint: &'static str,
    pub param: &'static str,
}

/// Failure of one HTTP exchange. Terminates the page stream it belongs to.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("transport error for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("remote API error for {url}: status {status}: {body}")]
    RemoteApi {
        url: String,
        status: u16,
        body: String,
    },

    #[error("failed to decode response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("request to {url} cancelled")]
    Cancelled { url: String },
}

impl FetchError {
    /// HTTP status of the failed exchange, when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::RemoteApi { status, .. } => Some(*status),
            FetchError::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Page payload that does not have the shape its descriptor promises.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizationError {
    #[error("{endpoint}: expected a JSON object, got {found}")]
    NotAnObject {
        endpoint: &'static str,
        found: &'static str,
    },

    #[error("{endpoint}: response has no {selector} field")]
    MissingSelector {
        endpoint: &'static str,
        selector: &'static str,
    },

    #[error("{endpoint}: {selector} holds {found}, expected a list or an object")]
    UnexpectedSelectorValue {
        endpoint: &'static str,
        selector: &'static str,
        found: &'static str,
    },
}

/// The HTTP client of a session could not be created.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("insecure base url requires explicit opt-in: {0}")]
    InsecureUrl(String),

    #[error("invalid value for header {0}")]
    InvalidHeader(&'static str),

    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Invalid collector configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Short JSON type name used in diagnostics.
pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "a list",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_display() {
        let error = TemplateResolutionError {
            endpoint: "problem",
            param: "problemId",
        };
        assert_eq!(error.to_string(), "problem: missing path parameter problemId");

        let error = FetchError::RemoteApi {
            url: "https://t1.example.com/api/v2/problems".to_string(),
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "remote API error for https://t1.example.com/api/v2/problems: status 500: boom"
        );
        assert_eq!(error.status(), Some(500));
    }

    #[test]
    fn test_catalog_error_display() {
        let error = CatalogError::UndeclaredUrlPlaceholder {
            endpoint: "entity",
            placeholder: "id".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "entity: url placeholder {id} is not the declared path parameter"
        );
    }

    #[test]
    fn test_json_kind() {
        assert_eq!(json_kind(&json!(null)), "null");
        assert_eq!(json_kind(&json!([1])), "a list");
        assert_eq!(json_kind(&json!({"a": 1})), "an object");
        assert_eq!(json_kind(&json!("s")), "a string");
    }
}
