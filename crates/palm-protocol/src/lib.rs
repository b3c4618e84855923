//! Protocol types for Palm agent conversations.
//!
//! This crate defines the message model and the stream format used across
//! the Palm communication boundaries:
//!
//! ```text
//! palm-chat <--[POST /api/chat, UI message stream]--> palm-relay <--[POST /chat]--> agent backend
//! ```
//!
//! The relay treats the stream as opaque bytes. Clients decode it with
//! [`SseDecoder`], fold the events into message parts and run [`classify`]
//! to decide what to show.
//!
//! ## Design Principles
//!
//! 1. **Parts are the atomic content unit.** A message is an ordered list of
//!    parts; order is meaningful.
//! 2. **Decoding never fails on content.** Unrecognized part or event shapes
//!    become `Unknown` variants instead of errors.
//! 3. **One text fold.** [`display_text`] is the only place text parts are
//!    concatenated.

pub mod classify;
pub mod events;
pub mod messages;

pub use classify::{Classification, classify};
pub use events::{DONE_FRAME, SseDecoder, SseFrame, StreamEvent};
pub use messages::{
    BackendChatRequest, ChatRequest, Message, Part, Role, TextPart, ToolCallPart, ToolState,
    derive_tool_name, display_text,
};
