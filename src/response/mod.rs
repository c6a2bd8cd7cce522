//! Standard success/error envelopes.
//!
//! Every operation that converts failures into data returns a
//! [`StandardResponse`], so callers branch on `success` instead of matching
//! errors.

mod payload;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::ConfigError;
use crate::http::TransportError;
use crate::mode::{self, Mode};

pub use payload::Payload;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardResponse<T = Value> {
    pub success: bool,
    pub message: String,
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// What an error envelope is built from.
#[derive(Debug)]
pub enum ErrorInput {
    /// A bare description.
    Message(String),
    /// A structured error, optionally tagged with an explicit code.
    Error {
        error: anyhow::Error,
        code: Option<String>,
    },
    /// A plain JSON object; `message`/`details`, `code` and `stack` string
    /// fields are picked up.
    Object(Map<String, Value>),
}

impl ErrorInput {
    pub fn coded(code: impl Into<String>, error: impl Into<anyhow::Error>) -> Self {
        ErrorInput::Error {
            error: error.into(),
            code: Some(code.into()),
        }
    }
}

impl From<&str> for ErrorInput {
    fn from(message: &str) -> Self {
        ErrorInput::Message(message.to_string())
    }
}

impl From<String> for ErrorInput {
    fn from(message: String) -> Self {
        ErrorInput::Message(message)
    }
}

impl From<anyhow::Error> for ErrorInput {
    fn from(error: anyhow::Error) -> Self {
        ErrorInput::Error { error, code: None }
    }
}

impl From<Map<String, Value>> for ErrorInput {
    fn from(object: Map<String, Value>) -> Self {
        ErrorInput::Object(object)
    }
}

/// Code carried by errors this crate knows how to classify.
fn known_code(error: &anyhow::Error) -> Option<String> {
    if let Some(transport) = error.downcast_ref::<TransportError>() {
        return Some(transport.code());
    }
    if let Some(config) = error.downcast_ref::<ConfigError>() {
        return Some(config.code().to_string());
    }
    None
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}

fn error_detail(input: ErrorInput, include_stack: bool) -> ErrorDetail {
    match input {
        ErrorInput::Message(details) => ErrorDetail {
            details: Some(details),
            ..ErrorDetail::default()
        },
        ErrorInput::Error { error, code } => ErrorDetail {
            code: code.or_else(|| known_code(&error)),
            details: Some(error.to_string()),
            stack: include_stack.then(|| format!("{:?}", error)),
        },
        ErrorInput::Object(object) => ErrorDetail {
            code: string_field(&object, "code"),
            details: string_field(&object, "message").or_else(|| string_field(&object, "details")),
            stack: string_field(&object, "stack").filter(|_| include_stack),
        },
    }
}

/// Builds [`StandardResponse`] values.
pub struct ApiResponseBuilder;

impl ApiResponseBuilder {
    /// Success envelope. Falsy JSON data (`null`, `false`, `0`, `""`) is
    /// replaced by an empty object.
    pub fn success<T: Payload>(message: impl Into<String>, data: T) -> StandardResponse<T> {
        StandardResponse {
            success: true,
            message: message.into(),
            data: data.or_empty(),
            error: None,
        }
    }

    /// Error envelope; stack traces are included only when the process runs
    /// in development mode.
    pub fn error<T: Payload>(
        message: impl Into<String>,
        error: Option<ErrorInput>,
        data: Option<T>,
    ) -> StandardResponse<T> {
        Self::error_in(mode::current(), message, error, data)
    }

    /// [`ApiResponseBuilder::error`] for an explicit mode.
    pub fn error_in<T: Payload>(
        mode: &Mode,
        message: impl Into<String>,
        error: Option<ErrorInput>,
        data: Option<T>,
    ) -> StandardResponse<T> {
        StandardResponse {
            success: false,
            message: message.into(),
            data: data.map(Payload::or_empty).unwrap_or_else(T::empty),
            error: error.map(|input| error_detail(input, mode.is_development())),
        }
    }
}

impl<T> StandardResponse<T> {
    /// Builds an error envelope from parts already classified by the caller.
    pub fn failure(message: impl Into<String>, data: T, error: ErrorDetail) -> Self {
        Self {
            success: false,
            message: message.into(),
            data,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error.as_ref().and_then(|e| e.code.as_deref())
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StandardResponse<U> {
        StandardResponse {
            success: self.success,
            message: self.message,
            data: f(self.data),
            error: self.error,
        }
    }
}
