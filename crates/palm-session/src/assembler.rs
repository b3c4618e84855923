//! Folds stream events into the parts of one assistant message.

use std::collections::HashMap;

use palm_protocol::messages::DYNAMIC_TOOL_TYPE;
use palm_protocol::{Message, Part, StreamEvent, ToolCallPart, ToolState};
use tracing::trace;

/// Incremental builder for the assistant message of a single turn.
///
/// Text blocks and tool calls are addressed by the ids the stream assigns
/// them; the assembler remembers which part each id landed in.
#[derive(Debug, Default)]
pub struct MessageAssembler {
    open_text: HashMap<String, usize>,
    tool_calls: HashMap<String, usize>,
    error: Option<String>,
}

impl MessageAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event to `message`.
    pub fn apply(&mut self, message: &mut Message, event: StreamEvent) {
        match event {
            StreamEvent::Start { message_id } => {
                if let Some(id) = message_id {
                    message.id = id;
                }
            }
            StreamEvent::StartStep => message.parts.push(Part::StepMarker),
            StreamEvent::TextStart { id } => {
                message.parts.push(Part::text(""));
                self.open_text.insert(id, message.parts.len() - 1);
            }
            StreamEvent::TextDelta { id, delta } => {
                let index = *self.open_text.entry(id).or_insert_with(|| {
                    message.parts.push(Part::text(""));
                    message.parts.len() - 1
                });
                if let Some(Part::Text(part)) = message.parts.get_mut(index) {
                    part.text.push_str(&delta);
                }
            }
            StreamEvent::TextEnd { id } => {
                self.open_text.remove(&id);
            }
            StreamEvent::ToolInputStart {
                tool_call_id,
                tool_name,
            } => {
                self.tool_call(message, tool_call_id, Some(&tool_name));
            }
            StreamEvent::ToolInputDelta { tool_call_id, .. } => {
                self.tool_call(message, tool_call_id, None);
            }
            StreamEvent::ToolInputAvailable {
                tool_call_id,
                tool_name,
                input,
            } => {
                if let Some(call) = self.tool_call(message, tool_call_id, Some(&tool_name)) {
                    call.input = Some(input).filter(|v| !v.is_null());
                    call.state = ToolState::Running;
                }
            }
            StreamEvent::ToolOutputAvailable {
                tool_call_id,
                output,
            } => {
                if let Some(call) = self.tool_call(message, tool_call_id, None) {
                    call.output = Some(output).filter(|v| !v.is_null());
                    call.state = ToolState::Done;
                }
            }
            StreamEvent::ToolOutputError {
                tool_call_id,
                error_text,
            } => {
                if let Some(call) = self.tool_call(message, tool_call_id, None) {
                    call.error_text = Some(error_text);
                    call.state = ToolState::Error;
                }
            }
            StreamEvent::Error { error_text } => {
                self.error = Some(error_text);
            }
            StreamEvent::FinishStep | StreamEvent::Finish | StreamEvent::Unknown => {
                trace!("ignoring lifecycle event");
            }
        }
    }

    /// In-band failure reported by the backend, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The tool call part for `tool_call_id`, appended as pending when unseen.
    fn tool_call<'m>(
        &mut self,
        message: &'m mut Message,
        tool_call_id: String,
        tool_name: Option<&str>,
    ) -> Option<&'m mut ToolCallPart> {
        let index = match self.tool_calls.get(&tool_call_id) {
            Some(&index) => index,
            None => {
                let call = match tool_name {
                    Some(name) => ToolCallPart::pending(name, Some(tool_call_id.clone())),
                    None => ToolCallPart {
                        kind: DYNAMIC_TOOL_TYPE.to_string(),
                        ..ToolCallPart::pending("", Some(tool_call_id.clone()))
                    },
                };
                message.parts.push(Part::ToolCall(call));
                let index = message.parts.len() - 1;
                self.tool_calls.insert(tool_call_id, index);
                index
            }
        };

        let Some(Part::ToolCall(call)) = message.parts.get_mut(index) else {
            return None;
        };
        // A call first seen without a name learns it from a later event.
        if call.kind == DYNAMIC_TOOL_TYPE && call.tool_name.is_none() {
            call.tool_name = tool_name.map(str::to_owned);
        }
        Some(call)
    }
}
