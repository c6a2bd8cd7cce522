//! Errors produced by the HTTP client wrapper.

use serde_json::Value;

use crate::retry::{Classify, FailureKind};

/// A failed request, tagged by where it failed.
#[derive(Debug)]
pub enum TransportError {
    /// The server answered with a non-success status.
    Http {
        status: u16,
        status_text: String,
        body: Value,
    },
    /// The request was sent but no response was received.
    Network(reqwest::Error),
    /// The request could not be built.
    Setup(String),
    /// The server answered successfully with a body of an unexpected shape.
    Decode(serde_json::Error),
}

impl TransportError {
    /// Code used in error envelopes.
    pub fn code(&self) -> String {
        match self {
            TransportError::Http { status, .. } => status.to_string(),
            TransportError::Network(_) => "NO_RESPONSE".to_string(),
            TransportError::Setup(_) => "REQUEST_ERROR".to_string(),
            TransportError::Decode(_) => "INVALID_RESPONSE".to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The `message` string of a JSON error body, if any.
    pub fn body_message(&self) -> Option<&str> {
        match self {
            TransportError::Http { body, .. } => body.get("message").and_then(Value::as_str),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Http {
                status,
                status_text,
                ..
            } => {
                write!(f, "Request failed with status code {} {}", status, status_text)
            }
            TransportError::Network(e) => write!(f, "Network error: {}", e),
            TransportError::Setup(msg) => write!(f, "Invalid request: {}", msg),
            TransportError::Decode(e) => write!(f, "Failed to parse response body: {}", e),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Network(e) => Some(e),
            TransportError::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl Classify for TransportError {
    fn failure_kind(&self) -> FailureKind {
        match self {
            TransportError::Http { status, .. } => FailureKind::Http(*status),
            TransportError::Network(_) => FailureKind::Network,
            TransportError::Setup(_) | TransportError::Decode(_) => FailureKind::Other,
        }
    }
}
