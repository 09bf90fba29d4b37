//! Self-test tools: `ping`, `echo`, `system_info`. No external collaborators, registered
//! unconditionally at startup.

use crate::error::McpResult;
use crate::registry::{ToolContext, ToolDescriptor, ToolHandler};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

struct Ping;

#[async_trait]
impl ToolHandler for Ping {
    async fn invoke(&self, _ctx: &ToolContext, args: Value) -> McpResult<String> {
        let message = args.get("message").and_then(Value::as_str).unwrap_or("pong");
        Ok(format!("pong: {}", message))
    }
}

struct Echo;

#[async_trait]
impl ToolHandler for Echo {
    async fn invoke(&self, _ctx: &ToolContext, args: Value) -> McpResult<String> {
        let text = args.get("text").and_then(Value::as_str).unwrap_or("").to_string();
        let uppercase = args.get("uppercase").and_then(Value::as_bool).unwrap_or(false);
        let prefix = args.get("prefix").and_then(Value::as_str).unwrap_or("");
        let repeat = args.get("repeat").and_then(Value::as_u64).unwrap_or(1).max(1) as usize;

        let mut transformations = Vec::new();
        let mut transformed = text;
        if uppercase {
            transformed = transformed.to_uppercase();
            transformations.push("uppercase");
        }
        if !prefix.is_empty() {
            transformed = format!("{}{}", prefix, transformed);
            transformations.push("prefix");
        }
        if repeat > 1 {
            transformations.push("repeat");
        }

        let repeated = std::iter::repeat(transformed).take(repeat).collect::<Vec<_>>().join(" ");

        if transformations.is_empty() {
            Ok(repeated)
        } else {
            Ok(format!("{} (transformations applied: {})", repeated, transformations.join(", ")))
        }
    }
}

struct SystemInfo;

#[async_trait]
impl ToolHandler for SystemInfo {
    async fn invoke(&self, _ctx: &ToolContext, args: Value) -> McpResult<String> {
        let format = args.get("format").and_then(Value::as_str).unwrap_or("table");
        let info = json!({
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "server_version": env!("CARGO_PKG_VERSION"),
        });
        if format == "json" {
            Ok(crate::handlers::render::render_json(&info))
        } else {
            Ok(crate::handlers::render::render_table(&[info]))
        }
    }
}

/// Register `ping`, `echo`, and `system_info` into `registry`.
pub fn register_all(registry: &mut crate::registry::ToolRegistry) -> McpResult<()> {
    registry.register(ToolDescriptor::new(
        "ping",
        "Check the server is responsive; echoes back an optional message.",
        json!({
            "type": "object",
            "properties": {
                "message": {"type": "string", "description": "Optional message to echo back"}
            }
        }),
        Arc::new(Ping) as Arc<dyn ToolHandler>,
    ))?;

    registry.register(ToolDescriptor::new(
        "echo",
        "Echo text back, optionally uppercased, prefixed, and/or repeated.",
        json!({
            "type": "object",
            "properties": {
                "text": {"type": "string"},
                "uppercase": {"type": "boolean", "default": false},
                "prefix": {"type": "string", "default": ""},
                "repeat": {"type": "integer", "default": 1}
            },
            "required": ["text"]
        }),
        Arc::new(Echo) as Arc<dyn ToolHandler>,
    ))?;

    registry.register(ToolDescriptor::new(
        "system_info",
        "Report basic information about the server process.",
        json!({
            "type": "object",
            "properties": {
                "format": {"type": "string", "enum": ["json", "table"], "default": "table"}
            }
        }),
        Arc::new(SystemInfo) as Arc<dyn ToolHandler>,
    ))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    fn ctx() -> ToolContext {
        ToolContext { cancellation: CancellationToken::new(), request_id: "t".into() }
    }

    #[tokio::test]
    async fn ping_echoes_the_message_substring() {
        let out = Ping.invoke(&ctx(), json!({"message": "hello"})).await.unwrap();
        assert!(out.contains("hello"));
    }

    #[tokio::test]
    async fn echo_applies_uppercase_prefix_and_repeat() {
        let out = Echo
            .invoke(&ctx(), json!({"text": "abc", "uppercase": true, "prefix": ">> ", "repeat": 3}))
            .await
            .unwrap();
        assert!(out.starts_with(">> ABC >> ABC >> ABC"));
        assert!(out.contains("transformations applied"));
    }

    #[tokio::test]
    async fn system_info_reports_os_and_arch() {
        let out = SystemInfo.invoke(&ctx(), json!({"format": "json"})).await.unwrap();
        assert!(out.contains(std::env::consts::OS));
    }

    #[test]
    fn register_all_adds_three_tools_with_unique_names() {
        let mut registry = crate::registry::ToolRegistry::new();
        register_all(&mut registry).unwrap();
        assert_eq!(registry.len(), 3);
    }
}
