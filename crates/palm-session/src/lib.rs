//! Client side of a Palm conversation.
//!
//! [`SessionState`] owns the message list and the turn status;
//! [`ChatClient`] moves it through a turn against a relay;
//! [`MessageAssembler`] turns stream events into assistant message parts.

pub mod assembler;
pub mod client;
pub mod render;
pub mod state;

pub use assembler::MessageAssembler;
pub use client::ChatClient;
pub use render::render_message;
pub use state::{Rendered, SessionError, SessionEvent, SessionState, Status};
