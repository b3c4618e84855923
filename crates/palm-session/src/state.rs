//! Turn submission state machine.
//!
//! ```text
//! Idle --submit--> Submitted --chunk--> Streaming --end--> Idle
//!                      |                    |
//!                      +------fail----------+--> Error --acknowledge--> Idle
//! ```
//!
//! Every operation either performs one of the transitions above or is
//! rejected with a [`SessionError`], leaving the state untouched.

use std::fmt;

use palm_protocol::{Classification, Message, SseDecoder, SseFrame, classify};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::assembler::MessageAssembler;

const EMPTY_STREAM_ERROR: &str = "empty response stream";

/// Where the session is in the current turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Status {
    #[default]
    Idle,
    /// Request sent, no bytes received yet.
    Submitted,
    /// Reply bytes arriving.
    Streaming,
    /// Last turn failed; waiting for acknowledgement.
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Submitted => "submitted",
            Self::Streaming => "streaming",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Inputs to the state machine, named in rejection errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Submit,
    Chunk,
    EndOfStream,
    Fail,
    Acknowledge,
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Submit => "submit",
            Self::Chunk => "receive a chunk",
            Self::EndOfStream => "end the stream",
            Self::Fail => "fail",
            Self::Acknowledge => "acknowledge",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("nothing to send")]
    EmptyInput,

    #[error("cannot submit while {0}")]
    Busy(Status),

    #[error("cannot {event} while {from}")]
    InvalidTransition { from: Status, event: SessionEvent },
}

/// A visible message with its render decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered<'a> {
    /// Position in [`SessionState::messages`].
    pub index: usize,
    pub message: &'a Message,
    pub classification: Classification,
}

#[derive(Debug)]
struct ActiveStream {
    decoder: SseDecoder,
    assembler: MessageAssembler,
    /// Index of the assistant message being assembled.
    index: usize,
}

/// Client-side conversation: the message list plus the turn status.
#[derive(Debug, Default)]
pub struct SessionState {
    messages: Vec<Message>,
    status: Status,
    input: String,
    last_error: Option<String>,
    stream: Option<ActiveStream>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn pending_input(&self) -> &str {
        &self.input
    }

    /// Whether the submit affordance is enabled.
    pub fn can_submit(&self) -> bool {
        self.status == Status::Idle && !self.input.trim().is_empty()
    }

    /// Start a turn with `text`, trimmed.
    pub fn submit(&mut self, text: &str) -> Result<(), SessionError> {
        if self.status != Status::Idle {
            return Err(SessionError::Busy(self.status));
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyInput);
        }

        self.messages.push(Message::user(new_id(), text));
        self.status = Status::Submitted;
        debug!(chars = text.chars().count(), "turn submitted");
        Ok(())
    }

    /// Submit the pending input and clear it.
    pub fn submit_pending(&mut self) -> Result<(), SessionError> {
        let input = std::mem::take(&mut self.input);
        match self.submit(&input) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.input = input;
                Err(e)
            }
        }
    }

    /// Feed one chunk of the reply body.
    pub fn receive_chunk(&mut self, chunk: &[u8]) -> Result<(), SessionError> {
        match self.status {
            Status::Submitted => {
                if chunk.is_empty() {
                    return Ok(());
                }
                self.messages.push(Message::assistant(new_id()));
                self.stream = Some(ActiveStream {
                    decoder: SseDecoder::new(),
                    assembler: MessageAssembler::new(),
                    index: self.messages.len() - 1,
                });
                self.status = Status::Streaming;
                debug!("first reply chunk received");
            }
            Status::Streaming => {}
            from => {
                return Err(SessionError::InvalidTransition {
                    from,
                    event: SessionEvent::Chunk,
                });
            }
        }

        self.apply(|decoder| decoder.push(chunk));
        Ok(())
    }

    /// The reply body ended.
    pub fn end_of_stream(&mut self) -> Result<(), SessionError> {
        match self.status {
            Status::Streaming => {
                self.apply(SseDecoder::finish);
                let in_band_error = self
                    .stream
                    .take()
                    .and_then(|stream| stream.assembler.error().map(str::to_owned));

                match in_band_error {
                    Some(error) => {
                        warn!(%error, "reply ended with a backend error");
                        self.last_error = Some(error);
                        self.status = Status::Error;
                    }
                    None => {
                        info!(messages = self.messages.len(), "turn complete");
                        self.status = Status::Idle;
                    }
                }
                Ok(())
            }
            Status::Submitted => {
                warn!("reply stream ended before any bytes arrived");
                self.last_error = Some(EMPTY_STREAM_ERROR.to_string());
                self.status = Status::Error;
                Ok(())
            }
            from => Err(SessionError::InvalidTransition {
                from,
                event: SessionEvent::EndOfStream,
            }),
        }
    }

    /// The request or the stream failed. Partial reply text is kept.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), SessionError> {
        match self.status {
            Status::Submitted | Status::Streaming => {
                let reason = reason.into();
                warn!(%reason, status = %self.status, "turn failed");
                self.stream = None;
                self.last_error = Some(reason);
                self.status = Status::Error;
                Ok(())
            }
            from => Err(SessionError::InvalidTransition {
                from,
                event: SessionEvent::Fail,
            }),
        }
    }

    /// Dismiss the last error so a new turn can start.
    pub fn acknowledge_error(&mut self) -> Result<(), SessionError> {
        match self.status {
            Status::Error => {
                self.last_error = None;
                self.status = Status::Idle;
                Ok(())
            }
            from => Err(SessionError::InvalidTransition {
                from,
                event: SessionEvent::Acknowledge,
            }),
        }
    }

    /// Visible messages in order, classified from their current parts.
    pub fn render(&self) -> Vec<Rendered<'_>> {
        self.messages
            .iter()
            .enumerate()
            .filter_map(|(index, message)| {
                let classification = classify(message);
                classification.visible.then_some(Rendered {
                    index,
                    message,
                    classification,
                })
            })
            .collect()
    }

    fn apply(&mut self, decode: impl FnOnce(&mut SseDecoder) -> Vec<SseFrame>) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        let Some(message) = self.messages.get_mut(stream.index) else {
            return;
        };

        for frame in decode(&mut stream.decoder) {
            match frame {
                SseFrame::Event(event) => stream.assembler.apply(message, event),
                SseFrame::Done => debug!("stream done marker"),
            }
        }
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use palm_protocol::{Role, StreamEvent};

    fn frame(event: StreamEvent) -> Vec<u8> {
        event.to_sse().unwrap().into_bytes()
    }

    fn delta(text: &str) -> Vec<u8> {
        frame(StreamEvent::TextDelta {
            id: "t1".to_string(),
            delta: text.to_string(),
        })
    }

    fn streaming_session() -> SessionState {
        let mut state = SessionState::new();
        state.submit("Hi").unwrap();
        state.receive_chunk(&delta("Hel")).unwrap();
        state
    }

    #[test]
    fn test_whitespace_input_never_enables_submit() {
        let mut state = SessionState::new();
        assert!(!state.can_submit());

        state.set_input("   ");
        assert!(!state.can_submit());
        assert_eq!(state.submit_pending(), Err(SessionError::EmptyInput));
        assert_eq!(state.status(), Status::Idle);
        assert!(state.messages().is_empty());
        assert_eq!(state.pending_input(), "   ");
    }

    #[test]
    fn test_submit_trims_input() {
        let mut state = SessionState::new();
        state.set_input("  Hello  ");
        assert!(state.can_submit());

        state.submit_pending().unwrap();
        assert_eq!(state.status(), Status::Submitted);
        assert_eq!(state.pending_input(), "");
        assert_eq!(state.messages().len(), 1);
        assert_eq!(state.messages()[0].role, Role::User);
        assert_eq!(state.messages()[0].text(), "Hello");
    }

    #[test]
    fn test_submit_rejected_while_in_flight() {
        let mut state = SessionState::new();
        state.submit("first").unwrap();

        assert_eq!(
            state.submit("second"),
            Err(SessionError::Busy(Status::Submitted))
        );
        assert_eq!(state.messages().len(), 1);
        assert_eq!(state.status(), Status::Submitted);

        state.receive_chunk(&delta("ok")).unwrap();
        assert_eq!(
            state.submit("third"),
            Err(SessionError::Busy(Status::Streaming))
        );
        assert_eq!(state.messages().len(), 2);
        assert_eq!(state.status(), Status::Streaming);

        state.set_input("queued");
        assert!(!state.can_submit());
    }

    #[test]
    fn test_submit_rejected_until_error_acknowledged() {
        let mut state = SessionState::new();
        state.submit("hi").unwrap();
        state.fail("relay returned 500").unwrap();

        assert_eq!(state.submit("again"), Err(SessionError::Busy(Status::Error)));
        state.acknowledge_error().unwrap();
        assert_eq!(state.status(), Status::Idle);
        assert_eq!(state.last_error(), None);
        state.submit("again").unwrap();
    }

    #[test]
    fn test_first_chunk_creates_assistant_message() {
        let mut state = SessionState::new();
        state.submit("Hi").unwrap();

        state.receive_chunk(b"").unwrap();
        assert_eq!(state.status(), Status::Submitted);

        state.receive_chunk(b"data: {\"type\":\"st").unwrap();
        assert_eq!(state.status(), Status::Streaming);
        assert_eq!(state.messages().len(), 2);
        assert_eq!(state.messages()[1].role, Role::Assistant);
        assert!(state.messages()[1].parts.is_empty());
    }

    #[test]
    fn test_stream_completes_to_idle() {
        let mut state = streaming_session();
        state.receive_chunk(&delta("lo")).unwrap();
        state.receive_chunk(&frame(StreamEvent::Finish)).unwrap();
        state.receive_chunk(palm_protocol::DONE_FRAME.as_bytes()).unwrap();
        state.end_of_stream().unwrap();

        assert_eq!(state.status(), Status::Idle);
        assert_eq!(state.messages()[1].text(), "Hello");

        let rendered = state.render();
        assert_eq!(rendered.len(), 2);
        assert_eq!(rendered[1].classification.display_text, "Hello");
    }

    #[test]
    fn test_unterminated_trailing_frame_is_discarded() {
        let mut state = streaming_session();
        state
            .receive_chunk(b"data: {\"type\":\"text-delta\",\"id\":\"t1\",\"delta\":\"lo\"}")
            .unwrap();
        state.end_of_stream().unwrap();
        assert_eq!(state.status(), Status::Idle);
        assert_eq!(state.messages()[1].text(), "Hel");
    }

    #[test]
    fn test_bare_cr_frames_are_applied() {
        let mut state = streaming_session();
        state
            .receive_chunk(b"data: {\"type\":\"text-delta\",\"id\":\"t1\",\"delta\":\"lo\"}\r\r")
            .unwrap();
        state.receive_chunk(b"data: [DONE]\n\n").unwrap();
        state.end_of_stream().unwrap();
        assert_eq!(state.messages()[1].text(), "Hello");
    }

    #[test]
    fn test_empty_stream_is_an_error() {
        let mut state = SessionState::new();
        state.submit("Hi").unwrap();
        state.end_of_stream().unwrap();

        assert_eq!(state.status(), Status::Error);
        assert_eq!(state.last_error(), Some("empty response stream"));
        assert_eq!(state.messages().len(), 1);
    }

    #[test]
    fn test_failure_keeps_partial_text() {
        let mut state = streaming_session();
        state.fail("connection reset").unwrap();

        assert_eq!(state.status(), Status::Error);
        assert_eq!(state.last_error(), Some("connection reset"));
        assert_eq!(state.messages()[1].text(), "Hel");

        // Sealed: a late chunk is rejected and does not touch the message.
        assert_eq!(
            state.receive_chunk(&delta("lo")),
            Err(SessionError::InvalidTransition {
                from: Status::Error,
                event: SessionEvent::Chunk
            })
        );
        assert_eq!(state.messages()[1].text(), "Hel");
    }

    #[test]
    fn test_in_band_error_ends_in_error_state() {
        let mut state = streaming_session();
        state
            .receive_chunk(&frame(StreamEvent::Error {
                error_text: "model overloaded".to_string(),
            }))
            .unwrap();
        state.end_of_stream().unwrap();

        assert_eq!(state.status(), Status::Error);
        assert_eq!(state.last_error(), Some("model overloaded"));
        assert_eq!(state.messages()[1].text(), "Hel");
    }

    #[test]
    fn test_invalid_transitions_leave_state_unchanged() {
        let mut state = SessionState::new();

        for (result, event) in [
            (state.receive_chunk(b"data: x\n\n"), SessionEvent::Chunk),
            (state.end_of_stream(), SessionEvent::EndOfStream),
            (state.fail("boom"), SessionEvent::Fail),
            (state.acknowledge_error(), SessionEvent::Acknowledge),
        ] {
            assert_eq!(
                result,
                Err(SessionError::InvalidTransition {
                    from: Status::Idle,
                    event
                })
            );
        }
        assert_eq!(state.status(), Status::Idle);
        assert!(state.messages().is_empty());
    }

    #[test]
    fn test_render_hides_tool_only_reply_until_text_arrives() {
        let mut state = SessionState::new();
        state.submit("weather?").unwrap();
        state
            .receive_chunk(&frame(StreamEvent::ToolInputStart {
                tool_call_id: "c1".to_string(),
                tool_name: "get_weather".to_string(),
            }))
            .unwrap();

        let rendered = state.render();
        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered[0].index, 0);

        state.receive_chunk(&delta("Sunny")).unwrap();
        let rendered = state.render();
        assert_eq!(rendered.len(), 2);
        assert_eq!(rendered[1].index, 1);
        assert_eq!(rendered[1].classification.tool_calls.len(), 1);
        assert_eq!(
            rendered[1].classification.tool_calls[0].tool_name.as_deref(),
            Some("get_weather")
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            SessionError::Busy(Status::Streaming).to_string(),
            "cannot submit while streaming"
        );
        assert_eq!(
            SessionError::InvalidTransition {
                from: Status::Idle,
                event: SessionEvent::Acknowledge
            }
            .to_string(),
            "cannot acknowledge while idle"
        );
    }
}
