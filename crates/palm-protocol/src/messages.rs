//! Conversation message types.
//!
//! A message contains an ordered list of typed parts. On the wire a part is a
//! loosely shaped JSON object distinguished by its `type` field; here it is a
//! closed enum with an `Unknown` arm so that decoding stays total.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Wire discriminator for text parts.
pub const TEXT_TYPE: &str = "text";
/// Wire discriminator for step boundaries.
pub const STEP_START_TYPE: &str = "step-start";
/// Wire discriminator for tool calls whose name is carried in `toolName`.
pub const DYNAMIC_TOOL_TYPE: &str = "dynamic-tool";
/// Prefix of static tool call discriminators (`tool-<name>`).
pub const TOOL_TYPE_PREFIX: &str = "tool-";

/// Name shown for a tool call whose discriminator carries no name.
const UNKNOWN_TOOL_NAME: &str = "unknown";

/// A conversation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique within the session. Callers of the relay may omit it.
    #[serde(default)]
    pub id: String,

    /// Message role.
    pub role: Role,

    /// Ordered content blocks.
    #[serde(default)]
    pub parts: Vec<Part>,

    /// Flat text content, accepted from clients that do not send parts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Message {
    /// A user message holding a single text part.
    pub fn user(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            parts: vec![Part::text(text)],
            content: None,
        }
    }

    /// An empty assistant message, ready to receive streamed parts.
    pub fn assistant(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            parts: Vec::new(),
            content: None,
        }
    }

    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        display_text(&self.parts)
    }
}

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::System => write!(f, "system"),
        }
    }
}

/// One fragment of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Part {
    Text(TextPart),
    ToolCall(ToolCallPart),
    /// Structural boundary between agent steps. Carries no content.
    StepMarker,
    /// Any part shape this crate does not model, kept verbatim.
    Unknown(Value),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(TextPart { text: text.into() })
    }

    /// Wire discriminator of this part, if it has one.
    pub fn kind(&self) -> Option<&str> {
        match self {
            Self::Text(_) => Some(TEXT_TYPE),
            Self::ToolCall(call) => Some(&call.kind),
            Self::StepMarker => Some(STEP_START_TYPE),
            Self::Unknown(value) => value.get("type").and_then(Value::as_str),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPart {
    pub text: String,
}

/// A tool invocation with its evolving state.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallPart {
    /// Wire discriminator: `dynamic-tool` or `tool-<name>`.
    pub kind: String,
    pub tool_call_id: Option<String>,
    pub tool_name: Option<String>,
    pub state: ToolState,
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub error_text: Option<String>,
}

impl ToolCallPart {
    /// A pending call for a static tool, named only through its discriminator.
    pub fn pending(tool_name: &str, tool_call_id: Option<String>) -> Self {
        Self {
            kind: format!("{TOOL_TYPE_PREFIX}{tool_name}"),
            tool_call_id,
            tool_name: None,
            state: ToolState::Pending,
            input: None,
            output: None,
            error_text: None,
        }
    }

    /// Tool name, derived from the discriminator when not set explicitly.
    pub fn name(&self) -> &str {
        match &self.tool_name {
            Some(name) => name,
            None => derive_tool_name(&self.kind),
        }
    }

    /// Copy of this call with `tool_name` filled in.
    pub fn normalized(&self) -> Self {
        Self {
            tool_name: Some(self.name().to_string()),
            ..self.clone()
        }
    }

    fn from_wire(kind: String, value: &Value) -> Self {
        let str_field =
            |key: &str| value.get(key).and_then(Value::as_str).map(str::to_owned);
        let json_field = |key: &str| value.get(key).filter(|v| !v.is_null()).cloned();

        Self {
            kind,
            tool_call_id: str_field("toolCallId"),
            tool_name: str_field("toolName"),
            state: value
                .get("state")
                .and_then(Value::as_str)
                .map(ToolState::from_wire)
                .unwrap_or_default(),
            input: json_field("input"),
            output: json_field("output"),
            error_text: str_field("errorText"),
        }
    }

    fn into_wire(self) -> Value {
        let mut obj = Map::new();
        obj.insert("type".to_string(), Value::String(self.kind));
        if let Some(id) = self.tool_call_id {
            obj.insert("toolCallId".to_string(), Value::String(id));
        }
        if let Some(name) = self.tool_name {
            obj.insert("toolName".to_string(), Value::String(name));
        }
        obj.insert(
            "state".to_string(),
            Value::String(self.state.as_str().to_string()),
        );
        if let Some(input) = self.input {
            obj.insert("input".to_string(), input);
        }
        if let Some(output) = self.output {
            obj.insert("output".to_string(), output);
        }
        if let Some(error_text) = self.error_text {
            obj.insert("errorText".to_string(), Value::String(error_text));
        }
        Value::Object(obj)
    }
}

/// Lifecycle of a tool call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolState {
    #[default]
    Pending,
    Running,
    Done,
    Error,
}

impl ToolState {
    /// Parse a wire state. Accepts both the short names and the UI stream
    /// names; anything unrecognized is treated as pending.
    pub fn from_wire(state: &str) -> Self {
        match state {
            "running" | "input-available" => Self::Running,
            "done" | "output-available" => Self::Done,
            "error" | "output-error" => Self::Error,
            _ => Self::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ToolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Value> for Part {
    fn from(value: Value) -> Self {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_default();

        match kind.as_str() {
            TEXT_TYPE => Self::text(
                value
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default(),
            ),
            STEP_START_TYPE => Self::StepMarker,
            k if k == DYNAMIC_TOOL_TYPE || k.starts_with(TOOL_TYPE_PREFIX) => {
                Self::ToolCall(ToolCallPart::from_wire(kind.clone(), &value))
            }
            _ => Self::Unknown(value),
        }
    }
}

impl From<Part> for Value {
    fn from(part: Part) -> Self {
        match part {
            Part::Text(TextPart { text }) => serde_json::json!({ "type": TEXT_TYPE, "text": text }),
            Part::ToolCall(call) => call.into_wire(),
            Part::StepMarker => serde_json::json!({ "type": STEP_START_TYPE }),
            Part::Unknown(value) => value,
        }
    }
}

/// Concatenate every text part in order, with no separator.
pub fn display_text(parts: &[Part]) -> String {
    parts.iter().fold(String::new(), |mut text, part| {
        if let Part::Text(TextPart { text: chunk }) = part {
            text.push_str(chunk);
        }
        text
    })
}

/// Tool name encoded in a wire discriminator.
///
/// `tool-search` yields `search`. Discriminators without the prefix (such as
/// `dynamic-tool`) carry no name and yield `unknown`.
pub fn derive_tool_name(kind: &str) -> &str {
    kind.strip_prefix(TOOL_TYPE_PREFIX)
        .unwrap_or(UNKNOWN_TOOL_NAME)
}

/// Body accepted by the relay's chat endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Full conversation so far; only the last message is forwarded.
    #[serde(default)]
    pub messages: Option<Vec<Message>>,
}

/// Body the relay sends to the agent backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendChatRequest {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parts_decode_by_type() {
        let parts: Vec<Part> = serde_json::from_value(json!([
            { "type": "step-start" },
            { "type": "text", "text": "Hello" },
            { "type": "tool-get_weather", "toolCallId": "call_1", "state": "output-available",
              "input": { "location": "Paris" }, "output": { "result": "sunny" } },
            { "type": "dynamic-tool", "toolName": "search", "state": "input-streaming" },
            { "type": "reasoning", "text": "hmm" }
        ]))
        .unwrap();

        assert_eq!(parts[0], Part::StepMarker);
        assert_eq!(parts[1], Part::text("Hello"));

        let Part::ToolCall(weather) = &parts[2] else {
            panic!("expected tool call, got {:?}", parts[2]);
        };
        assert_eq!(weather.kind, "tool-get_weather");
        assert_eq!(weather.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(weather.tool_name, None);
        assert_eq!(weather.state, ToolState::Done);
        assert_eq!(weather.input, Some(json!({ "location": "Paris" })));

        let Part::ToolCall(search) = &parts[3] else {
            panic!("expected tool call, got {:?}", parts[3]);
        };
        assert_eq!(search.name(), "search");
        assert_eq!(search.state, ToolState::Pending);

        assert!(matches!(&parts[4], Part::Unknown(v) if v["type"] == "reasoning"));
    }

    #[test]
    fn test_malformed_parts_decode_as_unknown() {
        let parts: Vec<Part> =
            serde_json::from_value(json!([42, "text", { "text": "no type" }, null])).unwrap();
        assert_eq!(parts.len(), 4);
        assert!(parts.iter().all(|p| matches!(p, Part::Unknown(_))));
    }

    #[test]
    fn test_text_part_without_text_is_empty() {
        let part: Part = serde_json::from_value(json!({ "type": "text" })).unwrap();
        assert_eq!(part, Part::text(""));
    }

    #[test]
    fn test_tool_state_wire_names() {
        assert_eq!(ToolState::from_wire("input-streaming"), ToolState::Pending);
        assert_eq!(ToolState::from_wire("input-available"), ToolState::Running);
        assert_eq!(ToolState::from_wire("output-available"), ToolState::Done);
        assert_eq!(ToolState::from_wire("output-error"), ToolState::Error);
        assert_eq!(ToolState::from_wire("running"), ToolState::Running);
        assert_eq!(ToolState::from_wire("approval-requested"), ToolState::Pending);
    }

    #[test]
    fn test_tool_call_serializes_to_wire_shape() {
        let call = ToolCallPart {
            error_text: Some("boom".to_string()),
            state: ToolState::Error,
            ..ToolCallPart::pending("search", Some("call_9".to_string()))
        };

        let value = serde_json::to_value(Part::ToolCall(call)).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "tool-search",
                "toolCallId": "call_9",
                "state": "error",
                "errorText": "boom"
            })
        );
    }

    #[test]
    fn test_message_accepts_flat_content() {
        let msg: Message =
            serde_json::from_value(json!({ "role": "user", "content": "hi there" })).unwrap();
        assert_eq!(msg.id, "");
        assert!(msg.parts.is_empty());
        assert_eq!(msg.content.as_deref(), Some("hi there"));
    }

    #[test]
    fn test_message_requires_role() {
        let result = serde_json::from_value::<Message>(json!({ "parts": [] }));
        assert!(result.is_err());
    }

    #[test]
    fn test_display_text_ignores_non_text_parts() {
        let parts = vec![
            Part::StepMarker,
            Part::text("Hel"),
            Part::ToolCall(ToolCallPart::pending("search", None)),
            Part::text("lo"),
            Part::Unknown(json!({ "type": "text", "note": "not reached" })),
        ];
        assert_eq!(display_text(&parts), "Hello");
    }

    #[test]
    fn test_derive_tool_name() {
        assert_eq!(derive_tool_name("tool-search"), "search");
        assert_eq!(derive_tool_name("tool-tool-x"), "tool-x");
        assert_eq!(derive_tool_name("dynamic-tool"), "unknown");
    }

    #[test]
    fn test_chat_request_tolerates_null_messages() {
        let req: ChatRequest = serde_json::from_value(json!({ "messages": null })).unwrap();
        assert!(req.messages.is_none());

        let req: ChatRequest = serde_json::from_value(json!({})).unwrap();
        assert!(req.messages.is_none());
    }
}
