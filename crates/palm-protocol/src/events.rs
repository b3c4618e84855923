//! UI message stream events.
//!
//! The agent backend answers a chat turn with a server-sent event stream.
//! Every frame is a `data: <json>` line followed by a blank line; the stream
//! ends with `data: [DONE]`. Events are ephemeral: clients fold them into the
//! parts of the assistant message being streamed.

use std::convert::Infallible;
use std::fmt;

use eventsource_stream::{EventStream, Eventsource};
use futures::channel::mpsc;
use futures::{FutureExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Final frame of a stream.
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

const DONE_MARKER: &str = "[DONE]";

/// All stream event types, tagged by the `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum StreamEvent {
    /// Assistant message started.
    Start {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },

    /// Agent step started.
    StartStep,

    /// Agent step finished.
    FinishStep,

    /// Text block opened.
    TextStart { id: String },

    /// Text content delta for the block opened under `id`.
    TextDelta { id: String, delta: String },

    /// Text block closed.
    TextEnd { id: String },

    /// Tool call being assembled by the model.
    ToolInputStart {
        tool_call_id: String,
        tool_name: String,
    },

    /// Tool call argument delta.
    ToolInputDelta {
        tool_call_id: String,
        input_text_delta: String,
    },

    /// Tool arguments complete; the tool is executing.
    ToolInputAvailable {
        tool_call_id: String,
        tool_name: String,
        #[serde(default)]
        input: Value,
    },

    /// Tool completed.
    ToolOutputAvailable {
        tool_call_id: String,
        #[serde(default)]
        output: Value,
    },

    /// Tool failed.
    ToolOutputError {
        tool_call_id: String,
        error_text: String,
    },

    /// Assistant message complete.
    Finish,

    /// The backend failed while producing the reply.
    Error {
        #[serde(default, alias = "error")]
        error_text: String,
    },

    /// Any event type not modelled here.
    #[serde(other)]
    Unknown,
}

impl StreamEvent {
    /// Render this event as one SSE frame.
    pub fn to_sse(&self) -> Result<String, serde_json::Error> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}

/// One decoded frame of the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SseFrame {
    Event(StreamEvent),
    Done,
}

type ChunkSender = mpsc::UnboundedSender<Result<Vec<u8>, Infallible>>;
type ChunkStream = EventStream<mpsc::UnboundedReceiver<Result<Vec<u8>, Infallible>>>;

/// Incremental SSE decoder.
///
/// Wraps an [`EventStream`] fed chunk by chunk, so callers that receive
/// bytes one at a time can decode without owning the body stream. Chunks
/// may split frames, lines or UTF-8 sequences anywhere.
pub struct SseDecoder {
    chunks: Option<ChunkSender>,
    events: ChunkStream,
}

impl SseDecoder {
    pub fn new() -> Self {
        let (chunks, rx) = mpsc::unbounded();
        Self {
            chunks: Some(chunks),
            events: rx.eventsource(),
        }
    }

    /// Feed one chunk and return every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let rejected = self
            .chunks
            .as_ref()
            .is_some_and(|chunks| chunks.unbounded_send(Ok(chunk.to_vec())).is_err());
        if rejected {
            debug!("decoder input closed; dropping chunk");
        }
        self.drain()
    }

    /// Close the input and return the frames still pending.
    ///
    /// A trailing frame without its terminating blank line is incomplete
    /// and is discarded.
    pub fn finish(&mut self) -> Vec<SseFrame> {
        self.chunks = None;
        self.drain()
    }

    fn drain(&mut self) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        // Every chunk is already queued, so the stream never waits on I/O.
        while let Some(Some(item)) = self.events.next().now_or_never() {
            match item {
                Ok(event) => frames.extend(parse_data(&event.data)),
                Err(e) => debug!(error = %e, "skipping malformed stream frame"),
            }
        }
        frames
    }
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SseDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SseDecoder")
            .field("open", &self.chunks.is_some())
            .finish_non_exhaustive()
    }
}

fn parse_data(data: &str) -> Option<SseFrame> {
    if data.is_empty() {
        return None;
    }
    if data.trim() == DONE_MARKER {
        return Some(SseFrame::Done);
    }

    match serde_json::from_str::<StreamEvent>(data) {
        Ok(event) => Some(SseFrame::Event(event)),
        Err(e) => {
            debug!(error = %e, "skipping undecodable stream frame");
            None
        }
    }
}
