//! HTTP client that drives a [`SessionState`] through one turn.

use futures::StreamExt;
use palm_protocol::ChatRequest;
use tracing::{debug, warn};

use crate::state::{SessionError, SessionState};

/// Talks to a Palm relay's `/api/chat` endpoint.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    chat_url: String,
}

impl ChatClient {
    pub fn new(relay_url: &str) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            chat_url: format!("{}/api/chat", relay_url.trim_end_matches('/')),
        })
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    /// Submit `text` and stream the reply into `state`.
    ///
    /// Transport and relay failures are not returned: they move `state` to
    /// [`Status::Error`](crate::Status::Error) with the reason in
    /// [`SessionState::last_error`]. `Err` means the turn could not start.
    pub async fn send(&self, state: &mut SessionState, text: &str) -> Result<(), SessionError> {
        state.submit(text)?;
        self.stream_reply(state).await
    }

    /// Like [`send`](Self::send), using the session's pending input.
    pub async fn send_pending(&self, state: &mut SessionState) -> Result<(), SessionError> {
        state.submit_pending()?;
        self.stream_reply(state).await
    }

    async fn stream_reply(&self, state: &mut SessionState) -> Result<(), SessionError> {
        let request = ChatRequest {
            messages: Some(state.messages().to_vec()),
        };

        let response = match self.http.post(&self.chat_url).json(&request).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, url = %self.chat_url, "relay request failed");
                return state.fail(format!("relay unreachable: {e}"));
            }
        };

        let status = response.status();
        debug!(%status, "relay responded");
        if !status.is_success() {
            let reason = match response.text().await {
                Ok(body) if !body.trim().is_empty() => body,
                Ok(_) => format!("relay returned {status}"),
                Err(e) => format!("relay returned {status} (body unreadable: {e})"),
            };
            return state.fail(reason);
        }

        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => state.receive_chunk(&bytes)?,
                Err(e) => return state.fail(format!("stream interrupted: {e}")),
            }
        }
        state.end_of_stream()
    }
}
