//! Application error taxonomy and its wire representation.
//!
//! Every failure that crosses a service boundary is an [`ApplicationError`].
//! On the wire it travels as an [`ErrorDescription`] and is rebuilt on the
//! client with the same code, category, status, details and correlation id.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Convenience alias used across the workspace.
pub type Result<T, E = ApplicationError> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad classification of an application error.
///
/// The category decides the default HTTP status and survives the round trip
/// between server and client. Unrecognized category names decode as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorCategory {
    #[default]
    Unknown,
    Internal,
    Misconfiguration,
    NoResponse,
    FailedInvocation,
    FileError,
    BadRequest,
    Unauthorized,
    Conflict,
    NotFound,
    InvalidState,
    Unsupported,
}

impl ErrorCategory {
    /// Returns the wire name of this category.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Internal => "Internal",
            Self::Misconfiguration => "Misconfiguration",
            Self::NoResponse => "NoResponse",
            Self::FailedInvocation => "FailedInvocation",
            Self::FileError => "FileError",
            Self::BadRequest => "BadRequest",
            Self::Unauthorized => "Unauthorized",
            Self::Conflict => "Conflict",
            Self::NotFound => "NotFound",
            Self::InvalidState => "InvalidState",
            Self::Unsupported => "Unsupported",
        }
    }

    /// HTTP status used when an error of this category does not set one.
    #[must_use]
    pub fn default_status(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::NotFound => 404,
            Self::Conflict => 409,
            _ => 500,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ErrorCategory {
    fn from(name: String) -> Self {
        match name.as_str() {
            "Internal" => Self::Internal,
            "Misconfiguration" => Self::Misconfiguration,
            "NoResponse" => Self::NoResponse,
            "FailedInvocation" => Self::FailedInvocation,
            "FileError" => Self::FileError,
            "BadRequest" => Self::BadRequest,
            "Unauthorized" => Self::Unauthorized,
            "Conflict" => Self::Conflict,
            "NotFound" => Self::NotFound,
            "InvalidState" => Self::InvalidState,
            "Unsupported" => Self::Unsupported,
            _ => Self::Unknown,
        }
    }
}

impl From<ErrorCategory> for String {
    fn from(category: ErrorCategory) -> Self {
        category.as_str().to_string()
    }
}

// ---------------------------------------------------------------------------
// ApplicationError
// ---------------------------------------------------------------------------

/// Structured error carried through every operation of the RPC layer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ApplicationError {
    pub category: ErrorCategory,
    /// HTTP status sent with the error response.
    pub status: u16,
    /// Stable machine-readable code, e.g. `NOT_OPENED`.
    pub code: String,
    pub message: String,
    pub correlation_id: Option<String>,
    pub details: Map<String, Value>,
    /// Text of the underlying failure, if any.
    pub cause: Option<String>,
}

impl ApplicationError {
    /// Creates an error of the given category with its default status.
    #[must_use]
    pub fn new(
        category: ErrorCategory,
        correlation_id: Option<&str>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            status: category.default_status(),
            code: code.into(),
            message: message.into(),
            correlation_id: correlation_id.map(str::to_string),
            details: Map::new(),
            cause: None,
        }
    }

    /// Bad or missing configuration, including missing references.
    #[must_use]
    pub fn configuration(
        correlation_id: Option<&str>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ErrorCategory::Misconfiguration, correlation_id, code, message)
    }

    /// Failure to reach or bind a network resource.
    #[must_use]
    pub fn connection(
        correlation_id: Option<&str>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ErrorCategory::NoResponse, correlation_id, code, message)
    }

    /// Component used in the wrong lifecycle state.
    #[must_use]
    pub fn invalid_state(
        correlation_id: Option<&str>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ErrorCategory::InvalidState, correlation_id, code, message)
    }

    /// Failure while carrying out an otherwise valid call.
    #[must_use]
    pub fn invocation(
        correlation_id: Option<&str>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ErrorCategory::FailedInvocation, correlation_id, code, message)
    }

    #[must_use]
    pub fn bad_request(
        correlation_id: Option<&str>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ErrorCategory::BadRequest, correlation_id, code, message)
    }

    #[must_use]
    pub fn unauthorized(
        correlation_id: Option<&str>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ErrorCategory::Unauthorized, correlation_id, code, message)
    }

    #[must_use]
    pub fn not_found(
        correlation_id: Option<&str>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ErrorCategory::NotFound, correlation_id, code, message)
    }

    #[must_use]
    pub fn conflict(
        correlation_id: Option<&str>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ErrorCategory::Conflict, correlation_id, code, message)
    }

    #[must_use]
    pub fn unsupported(
        correlation_id: Option<&str>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ErrorCategory::Unsupported, correlation_id, code, message)
    }

    #[must_use]
    pub fn internal(
        correlation_id: Option<&str>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ErrorCategory::Internal, correlation_id, code, message)
    }

    /// Unclassified failure. Also used for `NO_RESPONSE` and `UNKNOWN_ERROR`.
    #[must_use]
    pub fn unknown(
        correlation_id: Option<&str>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ErrorCategory::Unknown, correlation_id, code, message)
    }

    /// Adds one entry to the error details.
    #[must_use]
    pub fn with_details(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Records the text of an underlying error.
    #[must_use]
    pub fn with_cause(mut self, cause: impl fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }

    /// Overrides the HTTP status derived from the category.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Fills in the correlation id when the error does not carry one yet.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: Option<&str>) -> Self {
        if self.correlation_id.is_none() {
            self.correlation_id = correlation_id.map(str::to_string);
        }
        self
    }
}

impl From<anyhow::Error> for ApplicationError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ApplicationError>() {
            Ok(app) => app,
            Err(other) => Self::unknown(None, "UNKNOWN", other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// ErrorDescription
// ---------------------------------------------------------------------------

/// Serializable form of an [`ApplicationError`] sent in error responses.
///
/// `code` and `message` are required so that arbitrary JSON bodies are not
/// mistaken for error descriptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDescription {
    #[serde(default)]
    pub category: ErrorCategory,
    #[serde(default)]
    pub status: u16,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

impl From<&ApplicationError> for ErrorDescription {
    fn from(err: &ApplicationError) -> Self {
        Self {
            category: err.category,
            status: err.status,
            code: err.code.clone(),
            message: err.message.clone(),
            correlation_id: err.correlation_id.clone(),
            cause: err.cause.clone(),
            details: err.details.clone(),
        }
    }
}

impl From<ErrorDescription> for ApplicationError {
    fn from(desc: ErrorDescription) -> Self {
        let status = if desc.status == 0 {
            desc.category.default_status()
        } else {
            desc.status
        };
        Self {
            category: desc.category,
            status,
            code: desc.code,
            message: desc.message,
            correlation_id: desc.correlation_id,
            details: desc.details,
            cause: desc.cause,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
