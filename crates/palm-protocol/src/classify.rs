//! Render decisions for a message.
//!
//! [`classify`] folds a message's parts into the text to display, the tool
//! calls to attach and whether the message belongs in the transcript at all.
//! Tool-only assistant messages are suppressed: their activity is shown as an
//! attachment to the visible message that carries the answer text.

use crate::messages::{Message, Part, Role, ToolCallPart, display_text};

/// Output of [`classify`].
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub display_text: String,
    /// Tool calls in part order, with `tool_name` always set.
    pub tool_calls: Vec<ToolCallPart>,
    pub visible: bool,
}

/// Classify a message. Depends only on the role and the parts, in order.
pub fn classify(message: &Message) -> Classification {
    let display_text = display_text(&message.parts);
    let tool_calls: Vec<ToolCallPart> = message
        .parts
        .iter()
        .filter_map(|part| match part {
            Part::ToolCall(call) => Some(call.normalized()),
            _ => None,
        })
        .collect();

    let visible = match message.role {
        Role::Assistant => assistant_visible(&message.parts, &display_text, &tool_calls),
        Role::User | Role::System => !display_text.is_empty(),
    };

    Classification {
        display_text,
        tool_calls,
        visible,
    }
}

fn assistant_visible(parts: &[Part], text: &str, tool_calls: &[ToolCallPart]) -> bool {
    if !text.is_empty() {
        return true;
    }
    if !tool_calls.is_empty() {
        return false;
    }
    // `all` is vacuously true for an empty list, which is suppressed as well.
    !parts.iter().all(|part| matches!(part, Part::StepMarker))
}
