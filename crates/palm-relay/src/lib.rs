//! Palm relay library.
//!
//! Accepts one chat turn from the UI, forwards the latest user utterance to
//! the agent backend and streams the backend's reply back unchanged.

pub mod api;
pub mod config;
