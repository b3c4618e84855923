//! Test utilities for relay integration tests.

#![allow(dead_code)]

use std::convert::Infallible;

use axum::{Router, body::Bytes};
use futures::Stream;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use palm_relay::api::{self, AppState};
use palm_relay::config::BackendConfig;

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn_backend(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Relay router pointed at `backend_url`.
pub fn relay_app(backend_url: &str) -> Router {
    let backend = BackendConfig {
        url: backend_url.to_string(),
        connect_timeout_secs: 2,
    };
    api::create_router(AppState::new(&backend).unwrap())
}

/// A base URL nothing is listening on.
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// Body stream fed from a channel, ending when the sender is dropped.
pub fn channel_body(
    rx: mpsc::Receiver<Bytes>,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (Ok(chunk), rx))
    })
}

/// One UI-stream SSE frame.
pub fn sse(event: serde_json::Value) -> Bytes {
    Bytes::from(format!("data: {event}\n\n"))
}
