//! MCP wire-format types: the JSON-RPC envelope plus the method-specific params/results this
//! server understands.

pub mod jsonrpc;
pub mod messages;

pub use jsonrpc::{JsonRpcError, JsonRpcErrorCode, JsonRpcRequest, JsonRpcResponse, JSONRPC_VERSION};
pub use messages::*;

/// The protocol version this server advertises by default.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Every protocol version this server accepts from a client during `initialize`.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2024-11-05", "2025-03-26", "2025-06-18"];

/// The five JSON-RPC methods this server understands; everything else is `MethodNotFound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardMethod {
    Initialize,
    ToolsList,
    ToolsCall,
    ResourcesList,
    PromptsList,
}

impl StandardMethod {
    pub fn parse(method: &str) -> Option<Self> {
        match method {
            "initialize" => Some(Self::Initialize),
            "tools/list" => Some(Self::ToolsList),
            "tools/call" => Some(Self::ToolsCall),
            "resources/list" => Some(Self::ResourcesList),
            "prompts/list" => Some(Self::PromptsList),
            _ => None,
        }
    }
}

/// Negotiate the protocol version to report back to the client.
///
/// If the client's requested version is one this server supports, the server always echoes its
/// own default rather than the client's literal string, matching the behavior described for
/// the handshake in this lineage's other MCP servers.
pub fn get_protocol_version_for_client(requested: &str) -> Option<&'static str> {
    if requested.is_empty() {
        return None;
    }
    if SUPPORTED_PROTOCOL_VERSIONS.contains(&requested) {
        Some(MCP_PROTOCOL_VERSION)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_every_supported_version() {
        for v in SUPPORTED_PROTOCOL_VERSIONS {
            assert_eq!(get_protocol_version_for_client(v), Some(MCP_PROTOCOL_VERSION));
        }
    }

    #[test]
    fn rejects_unknown_or_empty_version() {
        assert_eq!(get_protocol_version_for_client("1999-01-01"), None);
        assert_eq!(get_protocol_version_for_client(""), None);
    }

    #[test]
    fn parses_the_five_standard_methods() {
        assert_eq!(StandardMethod::parse("initialize"), Some(StandardMethod::Initialize));
        assert_eq!(StandardMethod::parse("tools/call"), Some(StandardMethod::ToolsCall));
        assert_eq!(StandardMethod::parse("bogus"), None);
    }
}
