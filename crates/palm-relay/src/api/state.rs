//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::config::BackendConfig;

/// Relay state: where the backend lives and a pooled client to reach it.
///
/// Handlers never consult the process environment; everything they need is
/// injected here at construction.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Full URL of the backend chat endpoint.
    chat_url: Arc<str>,
    /// HTTP client for backend calls.
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn new(backend: &BackendConfig) -> Result<Self, reqwest::Error> {
        // No overall request timeout: the reply is a stream of unknown length.
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(backend.connect_timeout_secs))
            .build()?;

        Ok(Self {
            chat_url: chat_url(&backend.url).into(),
            http_client,
        })
    }

    /// URL the relay POSTs each turn to.
    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }
}

fn chat_url(base_url: &str) -> String {
    format!("{}/chat", base_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_url_joins_base() {
        assert_eq!(chat_url("http://localhost:4096"), "http://localhost:4096/chat");
        assert_eq!(chat_url("http://agent:4096/"), "http://agent:4096/chat");
        assert_eq!(
            chat_url("https://agents.internal/palm"),
            "https://agents.internal/palm/chat"
        );
    }

    #[test]
    fn test_state_uses_configured_backend() {
        let backend = BackendConfig {
            url: "http://127.0.0.1:9999".to_string(),
            ..BackendConfig::default()
        };
        let state = AppState::new(&backend).unwrap();
        assert_eq!(state.chat_url(), "http://127.0.0.1:9999/chat");
    }
}
