//! C3: the tool registry, the single source of truth for which tools exist, their schemas, and
//! how to invoke them. One registry serves every transport; `tools/list` is generated directly
//! from it, so every transport sees the same tool list without duplicating schemas.

use crate::error::{McpError, McpResult};
use crate::protocol::Tool;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Per-invocation context handed to every handler.
#[derive(Clone)]
pub struct ToolContext {
    pub cancellation: CancellationToken,
    pub request_id: String,
}

/// A tool handler: a pure async function of `(ctx, bound args) -> (text, error)`.
///
/// Implementors must honor `ctx.cancellation` at every suspension point and must not mutate
/// process-wide state other than through their own declared collaborators.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn invoke(&self, ctx: &ToolContext, args: Value) -> McpResult<String>;
}

#[async_trait]
impl<F, Fut> ToolHandler for F
where
    F: Fn(ToolContext, Value) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = McpResult<String>> + Send,
{
    async fn invoke(&self, ctx: &ToolContext, args: Value) -> McpResult<String> {
        (self)(ctx.clone(), args).await
    }
}

/// An immutable, registered tool: schema plus handler.
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub handler: Arc<dyn ToolHandler>,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self { name: name.into(), description: description.into(), input_schema, handler }
    }
}

/// Check that a JSON value's runtime type matches a schema `"type"` string.
fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

/// Bind a raw, untyped argument map against a tool's declared schema:
/// 1. every `required` property must be present,
/// 2. present properties must match their declared `type`,
/// 3. present properties must be one of their declared `enum` values, if any,
/// 4. absent optional properties receive their schema `default`, if any,
/// 5. properties not named in the schema are left untouched (forward-compatible).
pub fn bind_arguments(schema: &Value, args: &Value) -> McpResult<Value> {
    let args_obj = match args {
        Value::Null => serde_json::Map::new(),
        Value::Object(map) => map.clone(),
        _ => {
            return Err(McpError::InvalidParams { message: "arguments must be a JSON object".into() })
        }
    };

    let empty_props = serde_json::Map::new();
    let properties = schema.get("properties").and_then(Value::as_object).unwrap_or(&empty_props);
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut bound = args_obj.clone();

    for name in &required {
        if !bound.contains_key(*name) {
            return Err(McpError::InvalidParams {
                message: format!("missing required argument '{}'", name),
            });
        }
    }

    for (name, prop_schema) in properties {
        match bound.get(name) {
            Some(value) => {
                if let Some(expected_type) = prop_schema.get("type").and_then(Value::as_str) {
                    if !type_matches(expected_type, value) {
                        return Err(McpError::InvalidParams {
                            message: format!(
                                "argument '{}' must be of type '{}'",
                                name, expected_type
                            ),
                        });
                    }
                }
                if let Some(allowed) = prop_schema.get("enum").and_then(Value::as_array) {
                    if !allowed.contains(value) {
                        return Err(McpError::InvalidParams {
                            message: format!("argument '{}' is not one of the allowed values", name),
                        });
                    }
                }
            }
            None => {
                if let Some(default) = prop_schema.get("default") {
                    bound.insert(name.clone(), default.clone());
                }
            }
        }
    }

    Ok(Value::Object(bound))
}

fn schema_is_self_consistent(schema: &Value) -> bool {
    let properties = schema.get("properties").and_then(Value::as_object);
    let required = schema.get("required").and_then(Value::as_array);
    match (properties, required) {
        (Some(props), Some(req)) => req
            .iter()
            .filter_map(Value::as_str)
            .all(|name| props.contains_key(name)),
        (None, Some(req)) => req.is_empty(),
        _ => true,
    }
}

/// The process-wide tool registry. Built once at startup; read-mostly thereafter.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<ToolDescriptor>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Fails if the name is already taken or the schema is self-inconsistent.
    pub fn register(&mut self, descriptor: ToolDescriptor) -> McpResult<()> {
        if self.tools.contains_key(&descriptor.name) {
            return Err(McpError::Configuration {
                message: format!("duplicate tool registration: '{}'", descriptor.name),
            });
        }
        if !schema_is_self_consistent(&descriptor.input_schema) {
            return Err(McpError::Configuration {
                message: format!(
                    "tool '{}' has a required property missing from its schema's properties",
                    descriptor.name
                ),
            });
        }
        self.order.push(descriptor.name.clone());
        self.tools.insert(descriptor.name.clone(), Arc::new(descriptor));
        Ok(())
    }

    /// Stable-order snapshot of every registered tool, for `tools/list`.
    pub fn list(&self) -> Vec<Tool> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|d| Tool {
                name: d.name.clone(),
                description: d.description.clone(),
                input_schema: d.input_schema.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Bind arguments against the named tool's schema and run its handler.
    pub async fn invoke(&self, ctx: &ToolContext, name: &str, args: Value) -> McpResult<String> {
        let descriptor = self
            .tools
            .get(name)
            .ok_or_else(|| McpError::ToolNotFound { name: name.to_string() })?
            .clone();

        let bound = bind_arguments(&descriptor.input_schema, &args)?;

        if ctx.cancellation.is_cancelled() {
            return Err(McpError::Cancelled { tool: name.to_string() });
        }

        descriptor.handler.invoke(ctx, bound).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_handler() -> Arc<dyn ToolHandler> {
        Arc::new(|_ctx: ToolContext, args: Value| async move {
            Ok(args.get("message").and_then(Value::as_str).unwrap_or_default().to_string())
        })
    }

    fn ctx() -> ToolContext {
        ToolContext { cancellation: CancellationToken::new(), request_id: "t".into() }
    }

    #[test]
    fn rejects_duplicate_registration() {
        let mut reg = ToolRegistry::new();
        let schema = json!({"type": "object", "properties": {}});
        reg.register(ToolDescriptor::new("dup", "d", schema.clone(), echo_handler())).unwrap();
        let err = reg.register(ToolDescriptor::new("dup", "d", schema, echo_handler())).unwrap_err();
        assert!(matches!(err, McpError::Configuration { .. }));
    }

    #[test]
    fn rejects_schema_with_required_not_in_properties() {
        let mut reg = ToolRegistry::new();
        let schema = json!({"type": "object", "properties": {}, "required": ["missing"]});
        let err = reg.register(ToolDescriptor::new("bad", "d", schema, echo_handler())).unwrap_err();
        assert!(matches!(err, McpError::Configuration { .. }));
    }

    #[test]
    fn list_is_stable_order() {
        let mut reg = ToolRegistry::new();
        let schema = json!({"type": "object", "properties": {}});
        reg.register(ToolDescriptor::new("a", "d", schema.clone(), echo_handler())).unwrap();
        reg.register(ToolDescriptor::new("b", "d", schema, echo_handler())).unwrap();
        let names: Vec<_> = reg.list().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(reg.list().into_iter().map(|t| t.name).collect::<Vec<_>>(), names);
    }

    #[tokio::test]
    async fn unknown_tool_is_tool_not_found() {
        let reg = ToolRegistry::new();
        let err = reg.invoke(&ctx(), "nope", json!({})).await.unwrap_err();
        assert!(matches!(err, McpError::ToolNotFound { .. }));
    }

    #[tokio::test]
    async fn missing_required_argument_is_invalid_params() {
        let mut reg = ToolRegistry::new();
        let schema = json!({
            "type": "object",
            "properties": {"message": {"type": "string"}},
            "required": ["message"]
        });
        reg.register(ToolDescriptor::new("echo", "d", schema, echo_handler())).unwrap();
        let err = reg.invoke(&ctx(), "echo", json!({})).await.unwrap_err();
        assert!(matches!(err, McpError::InvalidParams { .. }));
    }

    #[tokio::test]
    async fn wrong_type_argument_is_invalid_params() {
        let mut reg = ToolRegistry::new();
        let schema = json!({
            "type": "object",
            "properties": {"message": {"type": "string"}},
            "required": ["message"]
        });
        reg.register(ToolDescriptor::new("echo", "d", schema, echo_handler())).unwrap();
        let err = reg.invoke(&ctx(), "echo", json!({"message": 5})).await.unwrap_err();
        assert!(matches!(err, McpError::InvalidParams { .. }));
    }

    #[tokio::test]
    async fn unknown_extra_properties_are_ignored() {
        let mut reg = ToolRegistry::new();
        let schema = json!({
            "type": "object",
            "properties": {"message": {"type": "string"}},
            "required": ["message"]
        });
        reg.register(ToolDescriptor::new("echo", "d", schema, echo_handler())).unwrap();
        let out = reg.invoke(&ctx(), "echo", json!({"message": "hi", "extra": true})).await.unwrap();
        assert_eq!(out, "hi");
    }

    #[test]
    fn defaults_applied_for_absent_optional_properties() {
        let schema = json!({
            "type": "object",
            "properties": {"format": {"type": "string", "default": "table"}}
        });
        let bound = bind_arguments(&schema, &json!({})).unwrap();
        assert_eq!(bound.get("format").unwrap(), "table");
    }

    #[test]
    fn enum_violation_is_rejected() {
        let schema = json!({
            "type": "object",
            "properties": {"format": {"type": "string", "enum": ["json", "table"]}}
        });
        let err = bind_arguments(&schema, &json!({"format": "xml"})).unwrap_err();
        assert!(matches!(err, McpError::InvalidParams { .. }));
    }
}
