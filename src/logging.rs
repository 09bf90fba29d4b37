//! C2: process-wide structured logging, built on `tracing`. Text or JSON output, stderr-only or
//! tee'd to a file (parent directory created if missing).

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{McpError, McpResult};
use tracing_subscriber::EnvFilter;

/// Initializes the global `tracing` subscriber per `config`. Returns the file-appender guard,
/// which must be held for the process lifetime so buffered writes actually reach disk.
pub fn init(config: &LoggingConfig) -> McpResult<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_new(&config.level)
        .map_err(|e| McpError::Configuration { message: format!("invalid log level '{}': {}", config.level, e) })?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    match &config.file {
        Some(path) => {
            let path = std::path::Path::new(path);
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| McpError::Configuration {
                        message: format!("creating log directory {}: {}", parent.display(), e),
                    })?;
                }
            }
            let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("server.log").to_string();
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
            let file_appender = tracing_appender::rolling::never(dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            match config.format {
                LogFormat::Json => builder.json().with_writer(non_blocking).init(),
                LogFormat::Text => builder.with_writer(non_blocking).init(),
            }
            Ok(Some(guard))
        }
        None => {
            match config.format {
                LogFormat::Json => builder.json().with_writer(std::io::stderr).init(),
                LogFormat::Text => builder.with_writer(std::io::stderr).init(),
            }
            Ok(None)
        }
    }
}
