//! Crate-wide error type and its mapping onto JSON-RPC and HTTP error surfaces.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub type McpResult<T> = Result<T, McpError>;

/// Errors that can arise anywhere in the server.
///
/// Every variant maps to a JSON-RPC error code via [`McpError::error_code`]; the dispatcher is the
/// only place that actually constructs a JSON-RPC `error` object from one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[serde(tag = "kind")]
pub enum McpError {
    #[error("parse error: {message}")]
    ParseError { message: String },

    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("method not found: {method}")]
    MethodNotFound { method: String },

    #[error("invalid params: {message}")]
    InvalidParams { message: String },

    #[error("server not initialized")]
    NotInitialized,

    #[error("tool not found: {name}")]
    ToolNotFound { name: String },

    #[error("tool '{tool}' execution failed: {message}")]
    ToolExecution { tool: String, message: String },

    #[error("tool '{tool}' timed out after {timeout:?}")]
    Timeout { tool: String, timeout: Duration },

    #[error("tool '{tool}' was cancelled")]
    Cancelled { tool: String },

    #[error("authentication failed: {message}")]
    Authentication { message: String },

    #[error("forbidden: {message}")]
    Authorization { message: String },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("server overloaded")]
    Overloaded,

    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("serialization error: {message}")]
    Serialization { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl McpError {
    /// The JSON-RPC error code this error surfaces as when wrapped in a dispatcher response.
    pub fn error_code(&self) -> i32 {
        match self {
            McpError::ParseError { .. } => -32700,
            McpError::InvalidRequest { .. } => -32600,
            McpError::MethodNotFound { .. } => -32601,
            McpError::InvalidParams { .. } | McpError::ToolNotFound { .. } => -32602,
            McpError::NotInitialized => -32002,
            McpError::Overloaded => -32001,
            McpError::ToolExecution { .. }
            | McpError::Timeout { .. }
            | McpError::Cancelled { .. }
            | McpError::Internal { .. }
            | McpError::Transport { .. }
            | McpError::Serialization { .. } => -32603,
            McpError::Authentication { .. }
            | McpError::Authorization { .. }
            | McpError::Configuration { .. } => -32603,
        }
    }

    /// A short string describing the wrapped cause, suitable for `error.data.details`.
    pub fn details(&self) -> String {
        self.to_string()
    }

    /// HTTP status to use when this error is surfaced outside a JSON-RPC envelope (transport-level
    /// rejections: auth failures, oversized bodies, overload).
    pub fn status_code(&self) -> StatusCode {
        match self {
            McpError::Authentication { .. } => StatusCode::UNAUTHORIZED,
            McpError::Authorization { .. } => StatusCode::FORBIDDEN,
            McpError::Overloaded => StatusCode::SERVICE_UNAVAILABLE,
            McpError::InvalidRequest { .. } | McpError::ParseError { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Plain JSON body used for transport-level HTTP failures that predate JSON-RPC parsing.
#[derive(Debug, Serialize)]
pub struct TransportErrorBody {
    pub error: String,
    pub message: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl IntoResponse for McpError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = TransportErrorBody {
            error: match &self {
                McpError::Authentication { .. } => "Unauthorized".to_string(),
                McpError::Authorization { .. } => "Forbidden".to_string(),
                McpError::Overloaded => "Overloaded".to_string(),
                _ => "Bad Request".to_string(),
            },
            message: self.to_string(),
            timestamp: chrono::Utc::now(),
        };
        (status, axum::Json(body)).into_response()
    }
}

impl From<std::io::Error> for McpError {
    fn from(e: std::io::Error) -> Self {
        McpError::Transport { message: e.to_string() }
    }
}

impl From<serde_json::Error> for McpError {
    fn from(e: serde_json::Error) -> Self {
        McpError::ParseError { message: e.to_string() }
    }
}

impl From<tokio::time::error::Elapsed> for McpError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        McpError::Timeout { tool: String::new(), timeout: Duration::default() }
    }
}

impl From<anyhow::Error> for McpError {
    fn from(e: anyhow::Error) -> Self {
        McpError::Internal { message: e.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_match_json_rpc_table() {
        assert_eq!(McpError::ParseError { message: String::new() }.error_code(), -32700);
        assert_eq!(McpError::InvalidRequest { message: String::new() }.error_code(), -32600);
        assert_eq!(McpError::MethodNotFound { method: String::new() }.error_code(), -32601);
        assert_eq!(McpError::InvalidParams { message: String::new() }.error_code(), -32602);
        assert_eq!(McpError::ToolNotFound { name: String::new() }.error_code(), -32602);
        assert_eq!(McpError::NotInitialized.error_code(), -32002);
        assert_eq!(
            McpError::ToolExecution { tool: String::new(), message: String::new() }.error_code(),
            -32603
        );
        assert_eq!(
            McpError::Timeout { tool: String::new(), timeout: Duration::default() }.error_code(),
            -32603
        );
        assert_eq!(McpError::Cancelled { tool: String::new() }.error_code(), -32603);
    }

    #[test]
    fn auth_errors_map_to_http_status() {
        assert_eq!(
            McpError::Authentication { message: "no token".into() }.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            McpError::Authorization { message: "denied".into() }.status_code(),
            StatusCode::FORBIDDEN
        );
    }
}
