//! JSON-RPC 2.0 envelope types shared by every transport.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// JSON-RPC 2.0 version string.
pub const JSONRPC_VERSION: &str = "2.0";

/// A JSON-RPC 2.0 request (or notification, when `id` is `None`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Option<Value>, id: Option<Value>) -> Self {
        Self { jsonrpc: JSONRPC_VERSION.to_string(), method: method.into(), params, id }
    }

    pub fn with_id(method: impl Into<String>, params: Option<Value>, id: impl Into<String>) -> Self {
        Self::new(method, params, Some(Value::String(id.into())))
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self::new(method, params, None)
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    pub fn id_as_string(&self) -> Option<String> {
        match &self.id {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(value) => Some(value.to_string()),
            None => None,
        }
    }
}

/// A JSON-RPC 2.0 response: exactly one of `result` / `error` is set, and `id` always matches the
/// request it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Option<Value>,
}

impl JsonRpcResponse {
    /// Build a successful response for `id`.
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self { jsonrpc: JSONRPC_VERSION.to_string(), result: Some(result), error: None, id }
    }

    /// Build an error response for `id`.
    pub fn error(id: Option<Value>, error: JsonRpcError) -> Self {
        Self { jsonrpc: JSONRPC_VERSION.to_string(), result: None, error: Some(error), id }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_success(&self) -> bool {
        self.result.is_some()
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>, data: Option<Value>) -> Self {
        Self { code, message: message.into(), data }
    }

    pub fn parse_error(data: Option<Value>) -> Self {
        Self::new(JsonRpcErrorCode::ParseError as i32, "Parse error", data)
    }

    pub fn invalid_request(data: Option<Value>) -> Self {
        Self::new(JsonRpcErrorCode::InvalidRequest as i32, "Invalid Request", data)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            JsonRpcErrorCode::MethodNotFound as i32,
            "Method not found",
            Some(Value::String(format!("Method '{}' not found", method))),
        )
    }

    pub fn invalid_params(details: impl Into<String>) -> Self {
        Self::new(
            JsonRpcErrorCode::InvalidParams as i32,
            "Invalid params",
            Some(Value::String(details.into())),
        )
    }

    pub fn not_initialized() -> Self {
        Self::new(JsonRpcErrorCode::ServerNotInitialized as i32, "Server not initialized", None)
    }

    pub fn internal_error(details: impl Into<String>) -> Self {
        Self::new(
            JsonRpcErrorCode::InternalError as i32,
            "Internal error",
            Some(serde_json::json!({ "details": details.into() })),
        )
    }

    pub fn overloaded() -> Self {
        Self::new(JsonRpcErrorCode::Overloaded as i32, "Server overloaded", None)
    }

    pub fn server_error(code: i32, message: impl Into<String>, data: Option<Value>) -> Self {
        Self::new(code, message, data)
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JSON-RPC Error {}: {}", self.code, self.message)?;
        if let Some(data) = &self.data {
            write!(f, " (data: {})", data)?;
        }
        Ok(())
    }
}

impl std::error::Error for JsonRpcError {}

/// Standard JSON-RPC 2.0 error codes, plus the `-32002`/`-32001` application extensions this
/// server uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum JsonRpcErrorCode {
    ParseError = -32700,
    InvalidRequest = -32600,
    MethodNotFound = -32601,
    InvalidParams = -32602,
    InternalError = -32603,
    ServerNotInitialized = -32002,
    Overloaded = -32001,
}

impl JsonRpcErrorCode {
    pub fn is_reserved_error(code: i32) -> bool {
        (-32768..=-32000).contains(&code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_round_trips_through_json() {
        let request = JsonRpcRequest::with_id("test_method", Some(json!({"param": "value"})), "123");
        let serialized = serde_json::to_string(&request).unwrap();
        let deserialized: JsonRpcRequest = serde_json::from_str(&serialized).unwrap();

        assert_eq!(request, deserialized);
        assert_eq!(request.id_as_string(), Some("123".to_string()));
        assert!(!request.is_notification());
    }

    #[test]
    fn notification_has_no_id() {
        let notification = JsonRpcRequest::notification("notify_method", Some(json!({"data": "test"})));
        assert!(notification.is_notification());
        assert_eq!(notification.id_as_string(), None);
    }

    #[test]
    fn success_response_carries_matching_id() {
        let id = Some(json!("123"));
        let response = JsonRpcResponse::success(id.clone(), json!({"result": "ok"}));
        assert!(response.is_success());
        assert!(!response.is_error());
        assert_eq!(response.id, id);
    }

    #[test]
    fn error_response_uses_standard_code() {
        let id = Some(json!("123"));
        let response = JsonRpcResponse::error(id.clone(), JsonRpcError::method_not_found("bogus"));
        assert!(response.is_error());
        assert_eq!(response.error.unwrap().code, JsonRpcErrorCode::MethodNotFound as i32);
        assert_eq!(response.id, id);
    }

    #[test]
    fn reserved_error_range_is_recognized() {
        assert!(JsonRpcErrorCode::is_reserved_error(-32700));
        assert!(JsonRpcErrorCode::is_reserved_error(-32002));
        assert!(!JsonRpcErrorCode::is_reserved_error(-31999));
    }
}
