//! C5: HTTP/SSE auth middleware, bearer/api-key/basic credential checking plus an IP allow-list,
//! gating requests before they ever reach JSON-RPC dispatch. Inactive on the stdio transport and
//! inactive entirely when auth is disabled.

use crate::config::{AuthConfig, AuthType};
use crate::error::McpError;
use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use base64::Engine;
use ipnet::{Contains, IpNet};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// A single allow-list entry: either one address, or a CIDR block.
#[derive(Debug, Clone)]
pub enum IpAllowEntry {
    Single(IpAddr),
    Cidr(IpNet),
}

impl IpAllowEntry {
    pub fn parse(entry: &str) -> Option<Self> {
        let entry = entry.trim();
        if entry.contains('/') {
            entry.parse::<IpNet>().ok().map(Self::Cidr)
        } else {
            entry.parse().ok().map(Self::Single)
        }
    }

    fn matches(&self, peer: IpAddr) -> bool {
        match self {
            IpAllowEntry::Single(addr) => *addr == peer,
            IpAllowEntry::Cidr(net) => net.contains(&peer),
        }
    }
}

/// Returns true iff `peer` matches any entry in `allow_list`. An empty list permits all traffic;
/// enabling auth without populating the allow-list should not lock an operator out.
pub fn ip_allowed(allow_list: &[IpAllowEntry], peer: IpAddr) -> bool {
    allow_list.is_empty() || allow_list.iter().any(|entry| entry.matches(peer))
}

/// Constant-time byte comparison, to avoid leaking credential length/prefix via timing.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

fn extract_bearer(headers: &http::HeaderMap) -> Option<String> {
    headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn extract_api_key(headers: &http::HeaderMap, header_name: &str) -> Option<String> {
    headers.get(header_name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

fn extract_basic(headers: &http::HeaderMap) -> Option<(String, String)> {
    let value = headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))?;
    let decoded = base64::engine::general_purpose::STANDARD.decode(value).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// Check the presented request against the configured credential type. Returns `Ok(())` when the
/// request is authenticated (or auth is disabled), `Err` otherwise.
pub fn check_credential(auth: &AuthConfig, headers: &http::HeaderMap) -> Result<(), McpError> {
    if !auth.enabled {
        return Ok(());
    }

    let ok = match auth.auth_type {
        AuthType::Bearer => extract_bearer(headers)
            .map(|presented| constant_time_eq(presented.as_bytes(), auth.bearer_token.as_bytes()))
            .unwrap_or(false),
        AuthType::ApiKey => extract_api_key(headers, "X-API-Key")
            .map(|presented| constant_time_eq(presented.as_bytes(), auth.api_key.as_bytes()))
            .unwrap_or(false),
        AuthType::Basic => extract_basic(headers)
            .map(|(user, pass)| {
                constant_time_eq(user.as_bytes(), auth.username.as_bytes())
                    && constant_time_eq(pass.as_bytes(), auth.password.as_bytes())
            })
            .unwrap_or(false),
    };

    if ok {
        Ok(())
    } else {
        Err(McpError::Authentication { message: "missing or invalid credential".into() })
    }
}

/// Axum middleware gating a request on, in order, the IP allow-list and then the credential
/// check. `state` carries the effective [`AuthConfig`].
///
/// The peer address is optional so this middleware still runs under test harnesses or other
/// connect-info-less services; a missing peer address only matters when an allow-list is
/// actually configured, in which case it is treated as a non-match.
pub async fn auth_middleware(
    State(auth): State<Arc<AuthConfig>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if !auth.enabled {
        return next.run(request).await;
    }

    use axum::response::IntoResponse;

    let allow_list = auth.parsed_allow_list();
    let ip_ok = match peer {
        Some(ConnectInfo(addr)) => ip_allowed(&allow_list, addr.ip()),
        None => allow_list.is_empty(),
    };
    if !ip_ok {
        return McpError::Authorization { message: "peer address not in allow-list".into() }.into_response();
    }

    if let Err(e) = check_credential(&auth, request.headers()) {
        return e.into_response();
    }

    next.run(request).await
}
