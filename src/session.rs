//! C6 data model: one [`Session`] per live client, carrying the `initialized` flag the dispatcher
//! enforces before servicing anything but `initialize`.

use serde_json::Value;
use tokio::sync::RwLock;

/// A session's mutable state: whether the handshake completed, and what was negotiated. Guarded
/// by an `RwLock` so concurrent `tools/call` reads of `initialized` don't contend with each other.
#[derive(Debug, Default)]
pub struct SessionState {
    pub initialized: bool,
    pub client_capabilities: Value,
    pub protocol_version: String,
}

pub struct Session {
    pub id: String,
    state: RwLock<SessionState>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), state: RwLock::new(SessionState::default()) }
    }

    pub async fn is_initialized(&self) -> bool {
        self.state.read().await.initialized
    }

    /// Mark the session initialized. Returns an error if it already was: a second `initialize`
    /// on the same session is rejected rather than silently renegotiated.
    pub async fn initialize(&self, capabilities: Value, protocol_version: String) -> Result<(), ()> {
        let mut state = self.state.write().await;
        if state.initialized {
            return Err(());
        }
        state.initialized = true;
        state.client_capabilities = capabilities;
        state.protocol_version = protocol_version;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn starts_uninitialized() {
        let session = Session::new("s1");
        assert!(!session.is_initialized().await);
    }

    #[tokio::test]
    async fn initialize_succeeds_once() {
        let session = Session::new("s1");
        session.initialize(json!({}), "2024-11-05".into()).await.unwrap();
        assert!(session.is_initialized().await);
    }

    #[tokio::test]
    async fn second_initialize_is_rejected() {
        let session = Session::new("s1");
        session.initialize(json!({}), "2024-11-05".into()).await.unwrap();
        assert!(session.initialize(json!({}), "2024-11-05".into()).await.is_err());
    }
}
