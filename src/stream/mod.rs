// src/stream/mod.rs — Push-stream channel abstraction
//
// A `Transport` turns a URL into a stream of `ChannelSignal`s. `ChannelHandle`
// owns that stream for exactly one connection and is the only thing that may
// release it.

pub mod sse;

use futures::{Stream, StreamExt};
use serde::Serialize;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use url::Url;

use crate::infra::errors::ResearchError;

/// Connection state code reported alongside a transport error.
///
/// This is all a push transport guarantees; no structured error body exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadyState {
    Connecting,
    Open,
    Closed,
}

impl std::fmt::Display for ReadyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Everything a channel can deliver to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelSignal {
    /// The server accepted the request and the stream is live.
    Opened,
    /// One pushed unit: the `event:` label and the raw `data:` body.
    Message { event: String, data: String },
    /// The transport failed. `detail` is for logs only.
    Error {
        state: ReadyState,
        detail: Option<String>,
    },
    /// The server ended the stream.
    Closed,
}

impl ChannelSignal {
    pub fn message(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self::Message {
            event: event.into(),
            data: data.into(),
        }
    }

    pub fn error(state: ReadyState) -> Self {
        Self::Error {
            state,
            detail: None,
        }
    }
}

pub type SignalStream = Pin<Box<dyn Stream<Item = ChannelSignal> + Send>>;

/// Opens push connections.
///
/// `connect` must return without waiting on the network: the handshake runs
/// when the returned stream is first polled, and failures arrive as
/// `ChannelSignal::Error`. Dropping the stream must release the connection.
pub trait Transport: Send + Sync {
    fn connect(&self, url: &Url) -> SignalStream;
}

/// Build the endpoint URL for one research query.
pub fn research_url(endpoint: &str, param: &str, query: &str) -> Result<Url, ResearchError> {
    let mut url = Url::parse(endpoint)?;
    if url.cannot_be_a_base() {
        return Err(ResearchError::UnsupportedEndpoint {
            endpoint: endpoint.to_string(),
        });
    }
    url.query_pairs_mut().append_pair(param, query);
    Ok(url)
}

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Exclusive owner of one live connection.
pub struct ChannelHandle {
    id: u64,
    url: Url,
    state: ReadyState,
    stream: Option<SignalStream>,
}

impl ChannelHandle {
    /// Parse `url` and start connecting. Only a malformed URL fails here.
    pub fn open(transport: &dyn Transport, url: &str) -> Result<Self, ResearchError> {
        let url = Url::parse(url)?;
        Ok(Self::open_url(transport, url))
    }

    pub fn open_url(transport: &dyn Transport, url: Url) -> Self {
        let id = NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(channel = id, %url, "opening channel");
        let stream = transport.connect(&url);
        Self {
            id,
            url,
            state: ReadyState::Connecting,
            stream: Some(stream),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn state(&self) -> ReadyState {
        self.state
    }

    pub fn is_live(&self) -> bool {
        self.stream.is_some()
    }

    /// Wait for the next signal. Returns `None` once the channel is closed.
    ///
    /// A transport stream that simply ends is reported as one `Closed` signal.
    pub async fn next_signal(&mut self) -> Option<ChannelSignal> {
        let stream = self.stream.as_mut()?;
        let signal = match stream.next().await {
            Some(signal) => signal,
            None => {
                self.close();
                return Some(ChannelSignal::Closed);
            }
        };
        match &signal {
            ChannelSignal::Opened => self.state = ReadyState::Open,
            ChannelSignal::Error { .. } | ChannelSignal::Closed => self.state = ReadyState::Closed,
            ChannelSignal::Message { .. } => {}
        }
        Some(signal)
    }

    /// Release the connection. Idempotent; nothing is delivered afterwards.
    ///
    /// Returns `true` only for the call that actually released it.
    pub fn close(&mut self) -> bool {
        self.state = ReadyState::Closed;
        match self.stream.take() {
            Some(stream) => {
                drop(stream);
                tracing::debug!(channel = self.id, "channel closed");
                true
            }
            None => false,
        }
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("id", &self.id)
            .field("url", &self.url.as_str())
            .field("state", &self.state)
            .field("live", &self.is_live())
            .finish()
    }
}
