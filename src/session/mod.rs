// src/session/mod.rs — Research session model and state machine

pub mod accumulator;
pub mod controller;
pub mod event;
pub mod research;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::stream::ReadyState;
pub use accumulator::OutputAccumulator;
pub use controller::SessionController;
pub use event::{EventKind, EventPayload, ReceivedEvent};
pub use research::ResearchOutput;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Connecting,
    Streaming,
    Completed,
    Failed,
}

impl SessionStatus {
    /// Connecting or Streaming: a channel is (or should be) live.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Streaming)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The channel never opened.
    ConnectFailed,
    /// The channel was open and then dropped.
    ConnectionClosed,
    Unknown,
}

/// Why a session ended in `Failed`. Built from the connection state code alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl SessionFailure {
    pub fn from_transport(state: ReadyState, was_open: bool) -> Self {
        let kind = match (state, was_open) {
            (ReadyState::Closed, false) => FailureKind::ConnectFailed,
            (ReadyState::Closed, true) => FailureKind::ConnectionClosed,
            _ => FailureKind::Unknown,
        };
        let message = match kind {
            FailureKind::ConnectFailed => {
                "Failed to connect to the research stream. Is the server running?".to_string()
            }
            FailureKind::ConnectionClosed => {
                "The research stream connection was closed before the workflow finished."
                    .to_string()
            }
            FailureKind::Unknown => format!(
                "The research stream reported an unknown error (connection state: {}).",
                state
            ),
        };
        Self { kind, message }
    }
}

impl std::fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Known kind whose body failed to decode.
    Malformed,
    /// Kind outside the closed set.
    Unhandled,
}

/// A dropped event, kept for observability. Never affects session status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub event: String,
    pub detail: String,
}

/// One research request and everything streamed for it so far.
#[derive(Debug, Serialize)]
pub struct Session {
    pub id: String,
    pub query: String,
    pub started_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    #[serde(rename = "events", serialize_with = "serialize_events")]
    pub output: OutputAccumulator,
    pub error: Option<SessionFailure>,
    pub diagnostics: Vec<Diagnostic>,
}

fn serialize_events<S: serde::Serializer>(
    output: &OutputAccumulator,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(output.events())
}

impl Session {
    pub fn idle() -> Self {
        Self {
            id: String::new(),
            query: String::new(),
            started_at: None,
            status: SessionStatus::Idle,
            output: OutputAccumulator::new(),
            error: None,
            diagnostics: Vec::new(),
        }
    }

    pub fn events(&self) -> &[ReceivedEvent] {
        self.output.events()
    }

    /// Reuse this slot for a new request. Events, error and diagnostics are cleared.
    pub(crate) fn restart(&mut self, query: &str) {
        self.id = uuid::Uuid::new_v4().to_string();
        self.query = query.to_string();
        self.started_at = Some(Utc::now());
        self.status = SessionStatus::Idle;
        self.output.reset();
        self.error = None;
        self.diagnostics.clear();
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::idle()
    }
}
