//! Error types for the Costanza client

use reqwest::StatusCode;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Client error types
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend answered with a non-success status that was not recovered by renewal.
    /// The body is passed through verbatim.
    #[error("Request failed with status {status}: {body}")]
    Api { status: StatusCode, body: Value },

    /// Input rejected before any request was sent
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Session expired: {0}")]
    SessionExpired(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    /// True for transport failures (no response from the backend).
    pub fn is_connectivity(&self) -> bool {
        matches!(self, ClientError::HttpRequest(_))
    }

    /// True when the session had to be torn down.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ClientError::SessionExpired(_))
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::HttpRequest(e) => e.status(),
            _ => None,
        }
    }

    /// Human-readable message from a backend error body (`detail`, then `message`).
    pub fn detail(&self) -> Option<&str> {
        let ClientError::Api { body, .. } = self else {
            return None;
        };
        ["detail", "message"]
            .iter()
            .find_map(|key| body.get(key).and_then(Value::as_str))
    }

    /// Field-specific validation messages, e.g. `{"email": ["already taken"]}`.
    pub fn field_errors(&self) -> BTreeMap<String, Vec<String>> {
        let mut fields = BTreeMap::new();
        if let ClientError::Validation { field, message } = self {
            fields.insert(field.clone(), vec![message.clone()]);
            return fields;
        }
        let ClientError::Api { body: Value::Object(map), .. } = self else {
            return fields;
        };
        for (field, value) in map {
            if field == "detail" || field == "message" {
                continue;
            }
            let messages: Vec<String> = match value {
                Value::String(s) => vec![s.clone()],
                Value::Array(items) => items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect(),
                _ => continue,
            };
            if !messages.is_empty() {
                fields.insert(field.clone(), messages);
            }
        }
        fields
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn api_error(body: Value) -> ClientError {
        ClientError::Api {
            status: StatusCode::BAD_REQUEST,
            body,
        }
    }

    #[test]
    fn test_detail_prefers_detail_over_message() {
        let err = api_error(json!({"detail": "No active account", "message": "other"}));
        assert_eq!(err.detail(), Some("No active account"));

        let err = api_error(json!({"message": "Invalid"}));
        assert_eq!(err.detail(), Some("Invalid"));

        let err = ClientError::SessionExpired("gone".into());
        assert_eq!(err.detail(), None);
    }

    #[test]
    fn test_field_errors() {
        let err = api_error(json!({
            "email": ["Enter a valid email address."],
            "password": "This field may not be blank.",
            "detail": "ignored",
            "code": 12
        }));
        let fields = err.field_errors();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["email"], vec!["Enter a valid email address."]);
        assert_eq!(fields["password"], vec!["This field may not be blank."]);

        let err = ClientError::Validation {
            field: "password".into(),
            message: "too short".into(),
        };
        assert_eq!(err.field_errors()["password"], vec!["too short"]);
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_classification() {
        let err = ClientError::SessionExpired("refresh token not found".into());
        assert!(err.is_session_expired());
        assert!(!err.is_connectivity());
        assert_eq!(api_error(Value::Null).status(), Some(StatusCode::BAD_REQUEST));
    }
}
