use clap::{Parser, ValueEnum};
use cloudops_mcp::config::{AuthType, McpConfig, TransportMode};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cloudops-mcp")]
#[command(about = "Model Context Protocol server exposing cloud-operations tools")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(long)]
    config: Option<PathBuf>,

    /// Transport to serve on
    #[arg(long)]
    transport: Option<TransportChoice>,

    /// Bind port (http/sse transports only)
    #[arg(long)]
    port: Option<u16>,

    /// Bearer token; also enables auth with type=bearer
    #[arg(long)]
    auth_token: Option<String>,

    /// Enable auth using the configured credential type
    #[arg(long)]
    enable_auth: bool,

    /// Log level (trace/debug/info/warn/error)
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum TransportChoice {
    Stdio,
    Http,
    Sse,
}

impl From<TransportChoice> for TransportMode {
    fn from(choice: TransportChoice) -> Self {
        match choice {
            TransportChoice::Stdio => TransportMode::Stdio,
            TransportChoice::Http => TransportMode::Http,
            TransportChoice::Sse => TransportMode::Sse,
        }
    }
}

fn build_config(cli: &Cli) -> anyhow::Result<McpConfig> {
    let mut config = match &cli.config {
        Some(path) => McpConfig::load_file(path)?,
        None => McpConfig::default(),
    };

    config.apply_env();

    if let Some(transport) = cli.transport {
        config.transport = transport.into();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.enable_auth {
        config.auth.enabled = true;
    }
    if let Some(token) = &cli.auth_token {
        config.auth.enabled = true;
        config.auth.auth_type = AuthType::Bearer;
        config.auth.bearer_token = token.clone();
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    let _log_guard = match cloudops_mcp::logging::init(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("logging init error: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    tracing::info!(server_name = %config.server_name, transport = ?config.transport, "starting");

    match cloudops_mcp::lifecycle::run(config).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "fatal error");
            std::process::ExitCode::FAILURE
        }
    }
}
