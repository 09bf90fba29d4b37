//! C6: the dispatcher. Parses the JSON-RPC envelope, enforces the "initialize first" invariant,
//! routes by method, and invokes the registry for `tools/call`. Every transport shares this one
//! pipeline rather than duplicating routing logic.

use crate::config::McpConfig;
use crate::protocol::{
    get_protocol_version_for_client, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, PromptsListResult, ResourcesListResult, ServerCapabilities,
    ServerInfo, StandardMethod, ToolsCallParams, ToolsCallResult, ToolsListResult,
};
use crate::registry::{ToolContext, ToolRegistry};
use crate::session::Session;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Requests beyond `max_concurrent_requests` wait for a free execution slot instead of being
/// rejected outright; this bounds how many may wait at once, as a multiple of that cap, before
/// the server gives up and reports overload.
const QUEUE_CAPACITY_MULTIPLIER: usize = 2;

/// Shared state the dispatcher needs regardless of which transport invoked it.
pub struct Dispatcher {
    pub registry: Arc<ToolRegistry>,
    pub config: Arc<McpConfig>,
    /// Execution slots: at most `max_concurrent_requests` tool calls run at once.
    concurrency: Arc<Semaphore>,
    /// Admission slots: bounds calls that are executing *or* waiting in line for `concurrency`.
    admission: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>, config: Arc<McpConfig>) -> Self {
        let cap = config.max_concurrent_requests;
        let concurrency = Arc::new(Semaphore::new(cap));
        let admission = Arc::new(Semaphore::new(cap + cap * QUEUE_CAPACITY_MULTIPLIER));
        Self { registry, config, concurrency, admission }
    }

    /// Parse raw bytes as a JSON-RPC request. A parse failure maps to `-32700` with `id: null`.
    pub fn parse(&self, raw: &str) -> Result<JsonRpcRequest, JsonRpcResponse> {
        serde_json::from_str::<JsonRpcRequest>(raw)
            .map_err(|e| JsonRpcResponse::error(None, JsonRpcError::parse_error(Some(Value::String(e.to_string())))))
    }

    /// Dispatch one already-parsed request against `session`. Returns `None` for notifications
    /// (no `id`), which produce no response.
    pub async fn handle(&self, session: &Session, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.method.is_empty() {
            return Some(JsonRpcResponse::error(
                request.id.clone(),
                JsonRpcError::invalid_request(Some(Value::String("missing method".into()))),
            ));
        }

        let Some(method) = StandardMethod::parse(&request.method) else {
            if request.is_notification() {
                return None;
            }
            return Some(JsonRpcResponse::error(request.id.clone(), JsonRpcError::method_not_found(&request.method)));
        };

        if method != StandardMethod::Initialize && !session.is_initialized().await {
            if request.is_notification() {
                return None;
            }
            return Some(JsonRpcResponse::error(request.id.clone(), JsonRpcError::not_initialized()));
        }

        let result = match method {
            StandardMethod::Initialize => self.handle_initialize(session, &request).await,
            StandardMethod::ToolsList => Ok(serde_json::to_value(ToolsListResult { tools: self.registry.list() }).unwrap()),
            StandardMethod::ToolsCall => self.handle_tools_call(&request).await,
            StandardMethod::ResourcesList => Ok(serde_json::to_value(ResourcesListResult::default()).unwrap()),
            StandardMethod::PromptsList => Ok(serde_json::to_value(PromptsListResult::default()).unwrap()),
        };

        if request.is_notification() {
            return None;
        }

        Some(match result {
            Ok(value) => JsonRpcResponse::success(request.id.clone(), value),
            Err(e) => JsonRpcResponse::error(request.id.clone(), e.into()),
        })
    }

    async fn handle_initialize(&self, session: &Session, request: &JsonRpcRequest) -> Result<Value, crate::error::McpError> {
        let params: InitializeParams = serde_json::from_value(request.params.clone().unwrap_or(Value::Null))
            .map_err(|e| crate::error::McpError::InvalidRequest { message: e.to_string() })?;

        let negotiated = get_protocol_version_for_client(&params.protocol_version)
            .ok_or_else(|| crate::error::McpError::InvalidRequest {
                message: format!("unsupported protocolVersion '{}'", params.protocol_version),
            })?;

        session
            .initialize(params.capabilities.clone(), negotiated.to_string())
            .await
            .map_err(|_| crate::error::McpError::InvalidRequest {
                message: "session is already initialized".to_string(),
            })?;

        let result = InitializeResult {
            protocol_version: negotiated.to_string(),
            capabilities: ServerCapabilities::default(),
            server_info: ServerInfo {
                name: self.config.server_name.clone(),
                version: self.config.server_version.clone(),
                metadata: Default::default(),
            },
        };

        Ok(serde_json::to_value(result).unwrap())
    }

    async fn handle_tools_call(&self, request: &JsonRpcRequest) -> Result<Value, crate::error::McpError> {
        let params: ToolsCallParams = serde_json::from_value(request.params.clone().unwrap_or(Value::Null))
            .map_err(|e| crate::error::McpError::InvalidParams { message: e.to_string() })?;

        // Admission is bounded up front: once the cap and its waiting queue are both full, reject
        // immediately. Otherwise this call waits in line for an execution slot along with
        // whatever else is already queued.
        let _admission = self
            .admission
            .clone()
            .try_acquire_owned()
            .map_err(|_| crate::error::McpError::Overloaded)?;
        let _permit = self
            .concurrency
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| crate::error::McpError::Overloaded)?;

        let ctx = ToolContext {
            cancellation: CancellationToken::new(),
            request_id: request.id_as_string().unwrap_or_default(),
        };

        let timeout = self.config.tool_execution_timeout;
        let invocation = self.registry.invoke(&ctx, &params.name, params.arguments);

        match tokio::time::timeout(timeout, invocation).await {
            Ok(Ok(text)) => Ok(serde_json::to_value(ToolsCallResult::text(text)).unwrap()),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(crate::error::McpError::Timeout { tool: params.name.clone(), timeout }),
        }
    }
}

impl From<crate::error::McpError> for JsonRpcError {
    fn from(e: crate::error::McpError) -> Self {
        use crate::error::McpError;
        match &e {
            McpError::NotInitialized => JsonRpcError::not_initialized(),
            McpError::MethodNotFound { method } => JsonRpcError::method_not_found(method),
            McpError::InvalidParams { .. } | McpError::ToolNotFound { .. } => {
                JsonRpcError::invalid_params(e.details())
            }
            McpError::InvalidRequest { .. } => JsonRpcError::invalid_request(Some(Value::String(e.details()))),
            McpError::Overloaded => JsonRpcError::overloaded(),
            _ => JsonRpcError::internal_error(e.details()),
        }
    }
}
