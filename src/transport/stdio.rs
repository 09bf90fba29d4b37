//! C7: the stdio transport. Reads line-delimited JSON-RPC requests from this process's own
//! stdin and writes responses to its own stdout. No subprocess, one session for the life of
//! the process. EOF on stdin ends the session.

use crate::dispatch::Dispatcher;
use crate::protocol::JsonRpcResponse;
use crate::session::Session;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::mpsc;

/// Run the stdio transport to completion. Each incoming line is dispatched concurrently; a
/// single writer task serializes responses back onto stdout so concurrent completions never
/// interleave mid-line.
pub async fn run_stdio(dispatcher: Arc<Dispatcher>) {
    let session = Arc::new(Session::new("stdio"));
    let (tx, mut rx) = mpsc::unbounded_channel::<JsonRpcResponse>();

    let writer = tokio::spawn(async move {
        let mut stdout = BufWriter::new(tokio::io::stdout());
        while let Some(response) = rx.recv().await {
            let Ok(line) = serde_json::to_string(&response) else { continue };
            if stdout.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if stdout.write_all(b"\n").await.is_err() {
                break;
            }
            if stdout.flush().await.is_err() {
                break;
            }
        }
    });

    let mut reader = BufReader::new(tokio::io::stdin()).lines();
    let mut in_flight = Vec::new();

    loop {
        let line = match reader.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("stdio read error: {}", e);
                break;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let dispatcher = dispatcher.clone();
        let session = session.clone();
        let tx = tx.clone();
        let raw = trimmed.to_string();

        in_flight.push(tokio::spawn(async move {
            let response = match dispatcher.parse(&raw) {
                Ok(request) => dispatcher.handle(&session, request).await,
                Err(response) => Some(response),
            };
            if let Some(response) = response {
                let _ = tx.send(response);
            }
        }));
    }

    drop(tx);
    for task in in_flight {
        let _ = task.await;
    }
    let _ = writer.await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::McpConfig;
    use crate::handlers::selftest;
    use crate::registry::ToolRegistry;

    fn test_dispatcher() -> Arc<Dispatcher> {
        let mut registry = ToolRegistry::new();
        selftest::register_all(&mut registry).unwrap();
        Arc::new(Dispatcher::new(Arc::new(registry), Arc::new(McpConfig::default())))
    }

    #[tokio::test]
    async fn parse_rejects_malformed_json_with_null_id() {
        let dispatcher = test_dispatcher();
        let response = dispatcher.parse("not json").unwrap_err();
        assert_eq!(response.error.unwrap().code, -32700);
        assert_eq!(response.id, None);
    }
}
