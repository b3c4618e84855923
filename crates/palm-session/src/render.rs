//! Plain-text transcript formatting.

use std::fmt::Write;

use palm_protocol::{Role, ToolCallPart, ToolState};

use crate::state::Rendered;

/// Format one visible message, followed by its tool activity and each
/// tool's input and output as compact JSON.
pub fn render_message(rendered: &Rendered<'_>) -> String {
    let label = match rendered.message.role {
        Role::User => "you",
        Role::Assistant => "palm",
        Role::System => "system",
    };

    let mut out = format!("{label}> {}", rendered.classification.display_text);
    for call in &rendered.classification.tool_calls {
        out.push('\n');
        out.push_str(&tool_line(call));
    }
    out
}

fn tool_line(call: &ToolCallPart) -> String {
    let mut line = format!("  [{}: {}]", call.name(), call.state);
    if let (ToolState::Error, Some(error)) = (call.state, &call.error_text) {
        let _ = write!(line, " {error}");
    }
    if let Some(input) = &call.input {
        let _ = write!(line, "\n    Input: {input}");
    }
    if let Some(output) = &call.output {
        let _ = write!(line, "\n    Output: {output}");
    }
    line
}
