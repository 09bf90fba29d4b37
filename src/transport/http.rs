//! C8: the HTTP/SSE transport. One axum [`Router`] exposes `/mcp` for JSON-RPC traffic, a set
//! of management endpoints under two naming conventions, and a root status page.

use crate::auth::auth_middleware;
use crate::config::McpConfig;
use crate::dispatch::Dispatcher;
use crate::protocol::JsonRpcErrorCode;
use crate::session::Session;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::{self, Stream};
use serde_json::json;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

const SESSION_HEADER: &str = "Mcp-Session-Id";
const PROTOCOL_HEADER: &str = "MCP-Protocol-Version";

struct SessionEntry {
    session: Arc<Session>,
    last_seen: Instant,
}

/// Shared HTTP-transport state: the dispatcher plus a bounded, reaped table of live sessions
/// keyed by the `Mcp-Session-Id` header minted on a successful `initialize`.
pub struct HttpState {
    dispatcher: Arc<Dispatcher>,
    config: Arc<McpConfig>,
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl HttpState {
    fn new(dispatcher: Arc<Dispatcher>, config: Arc<McpConfig>) -> Self {
        Self { dispatcher, config, sessions: RwLock::new(HashMap::new()) }
    }

    async fn session_for(&self, header_value: Option<&str>) -> (String, Arc<Session>) {
        if let Some(id) = header_value {
            let mut sessions = self.sessions.write().await;
            if let Some(entry) = sessions.get_mut(id) {
                entry.last_seen = Instant::now();
                return (id.to_string(), entry.session.clone());
            }
        }

        let id = Uuid::new_v4().to_string();
        let session = Arc::new(Session::new(id.clone()));
        self.sessions
            .write()
            .await
            .insert(id.clone(), SessionEntry { session: session.clone(), last_seen: Instant::now() });
        (id, session)
    }

    async fn reap_idle(&self, idle_timeout: Duration) {
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, entry| entry.last_seen.elapsed() < idle_timeout);
    }
}

/// Build the router this transport serves. `dispatcher` and `config` are shared with every
/// other transport; this function wires no transport-specific business logic beyond routing,
/// CORS, and session-id bookkeeping.
pub fn build_router(dispatcher: Arc<Dispatcher>, config: Arc<McpConfig>) -> Router {
    let auth_config = Arc::new(config.auth.clone());
    let state = Arc::new(HttpState::new(dispatcher, config.clone()));

    // Every endpoint except the root status page is gated on the IP allow-list and credential
    // check; disabled auth (the default) leaves every route reachable exactly as before. Gating
    // `/mcp` itself means an unauthenticated JSON-RPC call never reaches dispatch: it gets the
    // plain `McpError::Authentication` body, not a JSON-RPC envelope.
    let gated = Router::new()
        .route("/mcp", post(post_mcp).get(get_mcp).options(options_mcp))
        .route("/health", get(health_compat))
        .route("/status", get(status_compat))
        .route("/mcp/manage", get(status_management))
        .route("/mcp/manage/health", get(health_management))
        .route("/mcp/manage/status", get(status_management))
        .route("/mcp/manage/info", get(info))
        .route("/mcp/manage/tools", get(manage_tools))
        .route_layer(middleware::from_fn_with_state(auth_config, auth_middleware));

    Router::new()
        .route("/", get(root_page))
        .merge(gated)
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_headers(headers: &mut HeaderMap) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("POST, OPTIONS"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, MCP-Protocol-Version"),
    );
}

async fn options_mcp() -> Response {
    let mut response = StatusCode::NO_CONTENT.into_response();
    cors_headers(response.headers_mut());
    response
}

fn wants_sse(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/event-stream"))
        .unwrap_or(false)
}

async fn post_mcp(State(state): State<Arc<HttpState>>, headers: HeaderMap, body: Bytes) -> Response {
    if body.is_empty() {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let raw = match std::str::from_utf8(&body) {
        Ok(raw) => raw,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };

    let session_header = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok());
    let (session_id, session) = state.session_for(session_header).await;

    let response = match state.dispatcher.parse(raw) {
        Ok(request) => state.dispatcher.handle(&session, request).await,
        Err(parse_error) => Some(parse_error),
    };

    let Some(response) = response else {
        return StatusCode::ACCEPTED.into_response();
    };

    let protocol_version = state.config.protocol_version.clone();

    // Every other JSON-RPC error rides inside a 200 OK, per the spec; overload is the one
    // exception, surfaced as a transport-level 503 with the request's `id` still in the body.
    let status = if response.error.as_ref().map(|e| e.code) == Some(JsonRpcErrorCode::Overloaded as i32) {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    if wants_sse(&headers) {
        let event = Event::default().data(serde_json::to_string(&response).unwrap_or_default());
        let body_stream: std::pin::Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>> =
            Box::pin(stream::once(async move { Ok(event) }));
        let mut resp = Sse::new(body_stream).keep_alive(KeepAlive::default()).into_response();
        *resp.status_mut() = status;
        resp.headers_mut().insert(SESSION_HEADER, HeaderValue::from_str(&session_id).unwrap());
        resp.headers_mut().insert(PROTOCOL_HEADER, HeaderValue::from_str(&protocol_version).unwrap());
        return resp;
    }

    let mut resp = (status, Json(response)).into_response();
    resp.headers_mut().insert(SESSION_HEADER, HeaderValue::from_str(&session_id).unwrap());
    resp.headers_mut().insert(PROTOCOL_HEADER, HeaderValue::from_str(&protocol_version).unwrap());
    resp
}

/// Server-to-client stream; this core never emits unsolicited messages, so the stream stays
/// open until the client disconnects.
async fn get_mcp() -> Response {
    let empty: std::pin::Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>> = Box::pin(stream::pending());
    Sse::new(empty).keep_alive(KeepAlive::default()).into_response()
}

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn health_body(state: &HttpState, service: &str) -> serde_json::Value {
    json!({
        "status": "healthy",
        "service": service,
        "transport": format!("{:?}", state.config.transport).to_lowercase(),
        "note": "no persisted state",
        "timestamp": timestamp(),
    })
}

fn status_body(state: &HttpState, service: &str) -> serde_json::Value {
    json!({
        "service": service,
        "server_name": state.config.server_name,
        "server_version": state.config.server_version,
        "transport": format!("{:?}", state.config.transport).to_lowercase(),
        "endpoints": [
            "/mcp", "/health", "/status", "/mcp/manage", "/mcp/manage/health",
            "/mcp/manage/status", "/mcp/manage/info", "/mcp/manage/tools",
        ],
        "timestamp": timestamp(),
    })
}

async fn health_compat(State(state): State<Arc<HttpState>>) -> Json<serde_json::Value> {
    Json(health_body(&state, "cloudops-mcp"))
}

async fn health_management(State(state): State<Arc<HttpState>>) -> Json<serde_json::Value> {
    Json(health_body(&state, "cloudops-mcp-management"))
}

async fn status_compat(State(state): State<Arc<HttpState>>) -> Json<serde_json::Value> {
    Json(status_body(&state, "cloudops-mcp"))
}

async fn status_management(State(state): State<Arc<HttpState>>) -> Json<serde_json::Value> {
    Json(status_body(&state, "cloudops-mcp-management"))
}

async fn info(State(state): State<Arc<HttpState>>) -> Json<serde_json::Value> {
    let tools: Vec<_> = state.dispatcher.registry.list().into_iter().map(|t| t.name).collect();
    Json(json!({
        "service": "cloudops-mcp-management",
        "protocol": state.config.protocol_version,
        "version": state.config.server_version,
        "capabilities": { "tools": tools, "resources": [], "prompts": [] },
        "timestamp": timestamp(),
    }))
}

async fn manage_tools(State(state): State<Arc<HttpState>>) -> Json<serde_json::Value> {
    let tools: Vec<_> = state
        .dispatcher
        .registry
        .list()
        .into_iter()
        .map(|t| json!({ "name": t.name, "description": t.description, "endpoint": "/mcp" }))
        .collect();
    Json(json!({ "total_tools": tools.len(), "tools": tools, "timestamp": timestamp() }))
}

async fn root_page(State(state): State<Arc<HttpState>>) -> Html<String> {
    Html(format!(
        "<html><head><title>{name}</title></head><body><h1>{name}</h1><p>version {version}</p><p>see /status</p></body></html>",
        name = state.config.server_name,
        version = state.config.server_version,
    ))
}

/// Periodically reap HTTP sessions idle past the configured timeout. Spawned once at startup.
pub async fn run_session_reaper(state: Arc<HttpState>, idle_timeout: Duration) {
    let mut interval = tokio::time::interval(idle_timeout.max(Duration::from_secs(1)));
    loop {
        interval.tick().await;
        state.reap_idle(idle_timeout).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::selftest;
    use crate::registry::ToolRegistry;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_router() -> Router {
        let mut registry = ToolRegistry::new();
        selftest::register_all(&mut registry).unwrap();
        let config = Arc::new(McpConfig::default());
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(registry), config.clone()));
        build_router(dispatcher, config)
    }

    #[tokio::test]
    async fn empty_body_post_is_bad_request() {
        let response = test_router()
            .oneshot(Request::builder().method("POST").uri("/mcp").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn options_returns_no_content_with_cors() {
        let response = test_router()
            .oneshot(Request::builder().method("OPTIONS").uri("/mcp").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn health_endpoint_reports_service_name() {
        let response = test_router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn post_mcp_without_credential_is_unauthorized_with_plain_body() {
        let mut registry = ToolRegistry::new();
        selftest::register_all(&mut registry).unwrap();
        let mut config = McpConfig::default();
        config.auth.enabled = true;
        config.auth.auth_type = crate::config::AuthType::Bearer;
        config.auth.bearer_token = "s3cret".into();
        let config = Arc::new(config);
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(registry), config.clone()));
        let router = build_router(dispatcher, config);

        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {"protocolVersion": "2024-11-05", "capabilities": {}, "clientInfo": {"name": "t", "version": "1"}}
        });
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/mcp")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["error"], "Unauthorized");
        assert!(parsed.get("jsonrpc").is_none());
    }

    #[tokio::test]
    async fn initialize_mints_a_session_header() {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {"protocolVersion": "2024-11-05", "capabilities": {}, "clientInfo": {"name": "t", "version": "1"}}
        });
        let response = test_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/mcp")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(SESSION_HEADER));
    }
}
