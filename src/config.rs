//! C1: effective configuration, assembled from three overlays (defaults → file → environment)
//! and validated before any transport starts.

use crate::auth::IpAllowEntry;
use crate::error::{McpError, McpResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Stdio,
    Http,
    Sse,
}

impl TransportMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "stdio" => Some(Self::Stdio),
            "http" => Some(Self::Http),
            "sse" => Some(Self::Sse),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    Bearer,
    ApiKey,
    Basic,
}

impl Default for AuthType {
    fn default() -> Self {
        AuthType::Bearer
    }
}

impl AuthType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bearer" => Some(Self::Bearer),
            "api_key" => Some(Self::ApiKey),
            "basic" => Some(Self::Basic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    pub enabled: bool,
    #[serde(rename = "type")]
    pub auth_type: AuthType,
    pub bearer_token: String,
    pub api_key: String,
    pub username: String,
    pub password: String,
    pub allowed_ips: Vec<String>,
    #[serde(with = "humantime_serde")]
    pub token_expiry: Option<Duration>,
}

impl AuthConfig {
    pub fn parsed_allow_list(&self) -> Vec<IpAllowEntry> {
        self.allowed_ips.iter().filter_map(|s| IpAllowEntry::parse(s)).collect()
    }

    fn credential_present(&self) -> bool {
        match self.auth_type {
            AuthType::Bearer => !self.bearer_token.is_empty(),
            AuthType::ApiKey => !self.api_key.is_empty(),
            AuthType::Basic => !self.username.is_empty() && !self.password.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        LogFormat::Text
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Text, file: None }
    }
}

/// The fully assembled, validated configuration tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct McpConfig {
    pub server_name: String,
    pub server_version: String,
    pub host: String,
    pub port: u16,
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
    pub transport: TransportMode,
    pub protocol_version: String,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub tool_execution_timeout: Duration,
    pub max_concurrent_requests: usize,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
    pub enable_tools: Option<Vec<String>>,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            server_name: "cloudops-mcp".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            host: "127.0.0.1".to_string(),
            port: 8080,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(10),
            transport: TransportMode::Stdio,
            protocol_version: crate::protocol::MCP_PROTOCOL_VERSION.to_string(),
            request_timeout: Duration::from_secs(60),
            tool_execution_timeout: Duration::from_secs(30),
            max_concurrent_requests: 32,
            logging: LoggingConfig::default(),
            auth: AuthConfig::default(),
            enable_tools: None,
        }
    }
}

impl McpConfig {
    /// Overlay 1→2: merge a config file's contents on top of the defaults.
    pub fn load_file(path: &Path) -> McpResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| McpError::Configuration { message: format!("reading {}: {}", path.display(), e) })?;
        serde_json::from_str(&contents)
            .map_err(|e| McpError::Configuration { message: format!("parsing {}: {}", path.display(), e) })
    }

    /// Overlay 2→3: apply recognized environment variables on top of `self`.
    pub fn apply_env(&mut self) {
        use std::env;

        macro_rules! env_str {
            ($var:literal, $field:expr) => {
                if let Ok(v) = env::var($var) {
                    $field = v;
                }
            };
        }
        macro_rules! env_bool {
            ($var:literal, $field:expr) => {
                if let Ok(v) = env::var($var) {
                    $field = matches!(v.as_str(), "true" | "1");
                }
            };
        }
        macro_rules! env_parse {
            ($var:literal, $field:expr) => {
                if let Ok(v) = env::var($var) {
                    if let Ok(parsed) = v.parse() {
                        $field = parsed;
                    }
                }
            };
        }
        macro_rules! env_secs {
            ($var:literal, $field:expr) => {
                if let Ok(v) = env::var($var) {
                    if let Ok(parsed) = v.parse::<u64>() {
                        $field = Duration::from_secs(parsed);
                    }
                }
            };
        }

        env_str!("MCP_SERVER_NAME", self.server_name);
        env_str!("MCP_SERVER_VERSION", self.server_version);
        env_str!("MCP_HOST", self.host);
        env_parse!("MCP_PORT", self.port);
        if let Ok(v) = env::var("MCP_TRANSPORT") {
            if let Some(mode) = TransportMode::parse(&v) {
                self.transport = mode;
            }
        }
        env_str!("MCP_PROTOCOL_VERSION", self.protocol_version);
        env_secs!("MCP_REQUEST_TIMEOUT", self.request_timeout);
        env_parse!("MCP_MAX_CONCURRENT_REQUESTS", self.max_concurrent_requests);
        env_bool!("MCP_AUTH_ENABLED", self.auth.enabled);
        if let Ok(v) = env::var("MCP_AUTH_TYPE") {
            if let Some(t) = AuthType::parse(&v) {
                self.auth.auth_type = t;
            }
        }
        env_str!("MCP_AUTH_BEARER_TOKEN", self.auth.bearer_token);
        env_str!("MCP_AUTH_API_KEY", self.auth.api_key);
        env_str!("MCP_AUTH_USERNAME", self.auth.username);
        env_str!("MCP_AUTH_PASSWORD", self.auth.password);
        if let Ok(v) = env::var("MCP_AUTH_ALLOWED_IPS") {
            self.auth.allowed_ips = v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }
        env_secs!("MCP_AUTH_TOKEN_EXPIRY", self.auth.token_expiry.get_or_insert(Duration::default()));
        env_str!("MCP_LOG_LEVEL", self.logging.level);
        if let Ok(v) = env::var("MCP_LOG_FORMAT") {
            self.logging.format = if v == "json" { LogFormat::Json } else { LogFormat::Text };
        }
        if let Ok(v) = env::var("MCP_LOG_FILE") {
            self.logging.file = Some(v);
        }
        env_secs!("MCP_TOOL_EXECUTION_TIMEOUT", self.tool_execution_timeout);
        if let Ok(v) = env::var("MCP_ENABLE_TOOLS") {
            self.enable_tools = Some(v.split(',').map(|s| s.trim().to_string()).collect());
        }
    }

    /// Validate cross-field invariants not expressible in the type alone. All transports must pass this before
    /// starting.
    pub fn validate(&self) -> McpResult<()> {
        if self.transport != TransportMode::Stdio {
            if !(1..=65535).contains(&self.port) {
                return Err(McpError::Configuration {
                    message: format!("port {} out of range 1..65535", self.port),
                });
            }
            if self.auth.enabled && !self.auth.credential_present() {
                return Err(McpError::Configuration {
                    message: "auth enabled but no credential material configured for the selected type"
                        .to_string(),
                });
            }
        }

        if "trace warn info debug error".split(' ').all(|l| l != self.logging.level.to_lowercase()) {
            return Err(McpError::Configuration {
                message: format!("unrecognized log level '{}'", self.logging.level),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        McpConfig::default().validate().unwrap();
    }

    #[test]
    fn stdio_ignores_port_and_auth_validation() {
        let mut cfg = McpConfig::default();
        cfg.port = 0;
        cfg.auth.enabled = true;
        cfg.transport = TransportMode::Stdio;
        cfg.validate().unwrap();
    }

    #[test]
    fn http_with_auth_requires_credential() {
        let mut cfg = McpConfig::default();
        cfg.transport = TransportMode::Http;
        cfg.auth.enabled = true;
        cfg.auth.auth_type = AuthType::Bearer;
        assert!(cfg.validate().is_err());
        cfg.auth.bearer_token = "s3cret".into();
        cfg.validate().unwrap();
    }

    #[test]
    fn invalid_port_rejected_for_http() {
        let mut cfg = McpConfig::default();
        cfg.transport = TransportMode::Http;
        cfg.port = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unrecognized_log_level_rejected() {
        let mut cfg = McpConfig::default();
        cfg.logging.level = "verbose".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn env_overlay_applies_recognized_vars() {
        std::env::set_var("MCP_SERVER_NAME", "test-server");
        std::env::set_var("MCP_PORT", "9999");
        std::env::set_var("MCP_AUTH_ENABLED", "true");
        let mut cfg = McpConfig::default();
        cfg.apply_env();
        assert_eq!(cfg.server_name, "test-server");
        assert_eq!(cfg.port, 9999);
        assert!(cfg.auth.enabled);
        std::env::remove_var("MCP_SERVER_NAME");
        std::env::remove_var("MCP_PORT");
        std::env::remove_var("MCP_AUTH_ENABLED");
    }
}
