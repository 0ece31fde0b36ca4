//! Request dispatch errors and their JSON responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cmdgate_engine::{CapabilityKind, FormatError};
use cmdgate_registry::LocateError;
use cmdgate_types::ParameterError;
use cmdgate_util::redact_sensitive;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error};

/// Everything that can end a request before a renderer produced output.
///
/// Errors are terminal: they are reported to the client and never retried.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("command {path} not found")]
    CommandNotFound { path: String },

    #[error("command {path} is ambiguous, could be one of: {}", .candidates.join(", "))]
    AmbiguousCommand { path: String, candidates: Vec<String> },

    #[error("could not determine output format")]
    UnsupportedOutputFormat { suffix: String },

    #[error("command {path} is not a glazed/writer command")]
    CapabilityMismatch {
        path: String,
        required: CapabilityKind,
        actual: CapabilityKind,
    },

    #[error("could not load template: {0}")]
    TemplateLoadError(String),

    #[error("could not write output: {0}")]
    TempFileError(String),

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("{0:#}")]
    Execution(anyhow::Error),
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::CommandNotFound { .. } | Self::AmbiguousCommand { .. } => StatusCode::NOT_FOUND,
            Self::InvalidParameter { .. } => StatusCode::BAD_REQUEST,
            Self::UnsupportedOutputFormat { .. }
            | Self::CapabilityMismatch { .. }
            | Self::TemplateLoadError(_)
            | Self::TempFileError(_)
            | Self::Execution(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<LocateError> for DispatchError {
    fn from(error: LocateError) -> Self {
        match error {
            LocateError::NotFound { path } => Self::CommandNotFound { path },
            LocateError::Ambiguous { path, candidates } => Self::AmbiguousCommand { path, candidates },
        }
    }
}

impl From<ParameterError> for DispatchError {
    fn from(error: ParameterError) -> Self {
        match error {
            ParameterError::Invalid { name, reason } => Self::InvalidParameter { name, reason },
        }
    }
}

impl From<FormatError> for DispatchError {
    fn from(error: FormatError) -> Self {
        Self::Execution(error.into())
    }
}

impl From<anyhow::Error> for DispatchError {
    fn from(error: anyhow::Error) -> Self {
        Self::Execution(error)
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            error!(status = status.as_u16(), "request failed: {}", redact_sensitive(&message));
        } else {
            debug!(status = status.as_u16(), "request rejected: {}", redact_sensitive(&message));
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_and_statuses() {
        let cases = [
            (
                DispatchError::CommandNotFound { path: "unknown/path".to_string() },
                StatusCode::NOT_FOUND,
                "command unknown/path not found",
            ),
            (
                DispatchError::AmbiguousCommand {
                    path: "foo/bar".to_string(),
                    candidates: vec!["foo bar".to_string(), "foo bar".to_string()],
                },
                StatusCode::NOT_FOUND,
                "command foo/bar is ambiguous, could be one of: foo bar, foo bar",
            ),
            (
                DispatchError::UnsupportedOutputFormat { suffix: "zip".to_string() },
                StatusCode::INTERNAL_SERVER_ERROR,
                "could not determine output format",
            ),
            (
                DispatchError::CapabilityMismatch {
                    path: "foo/bar".to_string(),
                    required: CapabilityKind::Structured,
                    actual: CapabilityKind::Writer,
                },
                StatusCode::INTERNAL_SERVER_ERROR,
                "command foo/bar is not a glazed/writer command",
            ),
            (
                ParameterError::invalid("limit", "'x' is not an integer").into(),
                StatusCode::BAD_REQUEST,
                "invalid parameter limit: 'x' is not an integer",
            ),
        ];
        for (error, status, message) in cases {
            assert_eq!(error.status(), status);
            assert_eq!(error.to_string(), message);
        }
    }

    #[test]
    fn execution_errors_keep_their_context() {
        let error = DispatchError::from(anyhow::anyhow!("connection refused").context("query failed"));
        assert_eq!(error.to_string(), "query failed: connection refused");
    }
}
