//! A Model Context Protocol server exposing cloud-operations tools over stdio or HTTP/SSE.
//!
//! The wire format, tool registry, and session/dispatch logic are transport-independent; each
//! transport in [`transport`] is a thin adapter that feeds frames into the same [`dispatch`]
//! pipeline.

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod logging;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod transport;

pub use error::{McpError, McpResult};

pub mod prelude {
    //! Commonly used types for building or testing tool handlers.

    pub use crate::error::{McpError, McpResult};
    pub use crate::protocol::{JsonRpcRequest, JsonRpcResponse, Tool, ToolsCallResult};
    pub use crate::registry::{ToolContext, ToolDescriptor, ToolHandler, ToolRegistry};

    pub use async_trait::async_trait;
    pub use serde_json::{json, Value};
}
