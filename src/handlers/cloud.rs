//! Generic cloud-query tool family.
//!
//! Concrete provider SDKs are out of scope; what matters here is the interface contract every
//! cloud handler depends on, expressed as [`CloudClient`], plus a couple of illustrative tools
//! backed by an in-process mock so the registry, argument binding, and rendering machinery have
//! something real to exercise end to end.

use crate::error::{McpError, McpResult};
use crate::registry::{ToolContext, ToolDescriptor, ToolHandler};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// The collaborator interface every cloud-query handler is built against. A real deployment
/// supplies its own implementation backed by a provider SDK; tests and the self-contained tools
/// here use [`MockCloudClient`].
#[async_trait]
pub trait CloudClient: Send + Sync {
    async fn list_clusters(&self, region: &str) -> anyhow::Result<Vec<Value>>;
    async fn describe_instance(&self, region: &str, instance_id: &str) -> anyhow::Result<Value>;
}

/// An in-memory stand-in for a real provider SDK.
pub struct MockCloudClient;

#[async_trait]
impl CloudClient for MockCloudClient {
    async fn list_clusters(&self, region: &str) -> anyhow::Result<Vec<Value>> {
        Ok(vec![
            json!({"name": "prod-a", "region": region, "nodes": 5, "status": "healthy"}),
            json!({"name": "prod-b", "region": region, "nodes": 3, "status": "healthy"}),
        ])
    }

    async fn describe_instance(&self, region: &str, instance_id: &str) -> anyhow::Result<Value> {
        if instance_id.is_empty() {
            anyhow::bail!("instance_id must not be empty");
        }
        Ok(json!({
            "id": instance_id,
            "region": region,
            "type": "m5.large",
            "state": "running",
        }))
    }
}

fn format_arg(args: &Value) -> &str {
    args.get("format").and_then(Value::as_str).unwrap_or("table")
}

fn region_arg(args: &Value) -> McpResult<String> {
    args.get("region")
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| McpError::InvalidParams { message: "'region' is required".into() })
}

struct ListClusters {
    client: Arc<dyn CloudClient>,
}

#[async_trait]
impl ToolHandler for ListClusters {
    async fn invoke(&self, ctx: &ToolContext, args: Value) -> McpResult<String> {
        let region = region_arg(&args)?;
        if ctx.cancellation.is_cancelled() {
            return Err(McpError::Cancelled { tool: "list_clusters".into() });
        }
        let rows = self.client.list_clusters(&region).await.map_err(|e| McpError::ToolExecution {
            tool: "list_clusters".into(),
            message: format!("query list_clusters failed: {}", e),
        })?;
        Ok(crate::handlers::render::render(&rows, format_arg(&args)))
    }
}

struct DescribeInstance {
    client: Arc<dyn CloudClient>,
}

#[async_trait]
impl ToolHandler for DescribeInstance {
    async fn invoke(&self, ctx: &ToolContext, args: Value) -> McpResult<String> {
        let region = region_arg(&args)?;
        let instance_id = args
            .get("instance_id")
            .and_then(Value::as_str)
            .ok_or_else(|| McpError::InvalidParams { message: "'instance_id' is required".into() })?
            .to_string();
        if ctx.cancellation.is_cancelled() {
            return Err(McpError::Cancelled { tool: "describe_instance".into() });
        }
        let row = self.client.describe_instance(&region, &instance_id).await.map_err(|e| {
            McpError::ToolExecution {
                tool: "describe_instance".into(),
                message: format!("query describe_instance failed: {}", e),
            }
        })?;
        Ok(crate::handlers::render::render(&[row], format_arg(&args)))
    }
}

/// Register the cloud-query tools against `client`.
///
/// If `client` is `None` (the provider SDK failed to initialize) these
/// tools are omitted from the registry entirely rather than registered in a permanently-erroring
/// state.
pub fn register_all(
    registry: &mut crate::registry::ToolRegistry,
    client: Option<Arc<dyn CloudClient>>,
) -> McpResult<()> {
    let Some(client) = client else {
        tracing::warn!("cloud client unavailable; omitting cloud-query tools from the registry");
        return Ok(());
    };

    let common_props = json!({
        "region": {"type": "string", "description": "Cloud region"},
        "format": {"type": "string", "enum": ["json", "table"], "default": "table"}
    });

    registry.register(ToolDescriptor::new(
        "list_clusters",
        "List clusters in a region.",
        json!({
            "type": "object",
            "properties": common_props,
            "required": ["region"]
        }),
        Arc::new(ListClusters { client: client.clone() }),
    ))?;

    let mut instance_props = common_props.as_object().unwrap().clone();
    instance_props.insert("instance_id".into(), json!({"type": "string"}));

    registry.register(ToolDescriptor::new(
        "describe_instance",
        "Describe a single compute instance.",
        json!({
            "type": "object",
            "properties": instance_props,
            "required": ["region", "instance_id"]
        }),
        Arc::new(DescribeInstance { client }),
    ))?;

    Ok(())
}
