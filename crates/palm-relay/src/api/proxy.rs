//! Chat relay: forwards one user utterance to the agent backend and pipes the
//! reply stream back to the caller.

use axum::{
    Json,
    body::Body,
    extract::{State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::Response,
};
use futures::TryStreamExt;
use log::{debug, info, warn};

use palm_protocol::{BackendChatRequest, ChatRequest, Message};

use super::error::{ApiError, ApiResult};
use super::state::AppState;

/// Relay one chat turn.
///
/// Only the last message of the history is forwarded. The backend body is
/// passed through chunk by chunk: each chunk is written to the caller before
/// the next one is read, and dropping the caller's response drops the
/// backend connection with it.
pub async fn relay_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload.map_err(|e| ApiError::validation(e.body_text()))?;
    let messages = request.messages.unwrap_or_default();
    let text = extract_user_text(&messages)?;

    info!(
        "Relaying {} chars to {} ({} messages in history)",
        text.chars().count(),
        state.chat_url(),
        messages.len()
    );

    let response = state
        .http_client
        .post(state.chat_url())
        .json(&BackendChatRequest { message: text })
        .send()
        .await?;

    let status = response.status();
    debug!("Backend responded with {}", status);

    if !status.is_success() {
        return Err(ApiError::upstream(format!("backend returned {status}")));
    }

    if response.content_length() == Some(0) {
        return Err(ApiError::upstream("no response body"));
    }

    let stream = response
        .bytes_stream()
        .inspect_err(|e| warn!("Backend stream failed mid-flight: {:?}", e));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header("X-Accel-Buffering", "no") // Disable nginx buffering if present
        .header("x-vercel-ai-ui-message-stream", "v1")
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::internal(format!("failed to build stream response: {e}")))
}

/// Text of the last message: its text parts, or its flat `content` when the
/// parts carry no text.
pub fn extract_user_text(messages: &[Message]) -> ApiResult<String> {
    let last = messages
        .last()
        .ok_or_else(|| ApiError::validation("no messages provided"))?;

    let mut text = last.text();
    if text.is_empty() {
        text = last.content.clone().unwrap_or_default();
    }

    if text.is_empty() {
        return Err(ApiError::validation("no message provided"));
    }
    Ok(text)
}
