// src/stream/sse.rs — Server-sent events transport over reqwest

use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest_eventsource::{retry, Event, EventSource};
use url::Url;

use super::{ChannelSignal, ReadyState, SignalStream, Transport};
use crate::infra::config::StreamConfig;
use crate::infra::errors::ResearchError;

/// GET-based `text/event-stream` transport.
///
/// Reconnection is disabled: the first transport error is final for the
/// channel, and the session decides what happens next.
#[derive(Clone)]
pub struct SseTransport {
    client: reqwest::Client,
}

impl SseTransport {
    pub fn new(config: &StreamConfig) -> Result<Self, ResearchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| ResearchError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for SseTransport {
    fn connect(&self, url: &Url) -> SignalStream {
        let request = self
            .client
            .get(url.clone())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");

        let mut es = match EventSource::new(request) {
            Ok(es) => es,
            Err(e) => {
                let detail = format!("Cannot build stream request: {:?}", e);
                return Box::pin(futures::stream::once(async move {
                    ChannelSignal::Error {
                        state: ReadyState::Closed,
                        detail: Some(detail),
                    }
                }));
            }
        };
        es.set_retry_policy(Box::new(retry::Never));

        let stream = async_stream::stream! {
            while let Some(event) = es.next().await {
                match event {
                    Ok(Event::Open) => yield ChannelSignal::Opened,
                    Ok(Event::Message(msg)) => {
                        yield ChannelSignal::Message {
                            event: msg.event,
                            data: msg.data,
                        };
                    }
                    Err(reqwest_eventsource::Error::StreamEnded) => {
                        yield ChannelSignal::Closed;
                        break;
                    }
                    Err(e) => {
                        es.close();
                        yield ChannelSignal::Error {
                            state: ReadyState::Closed,
                            detail: Some(format!("SSE stream error: {}", e)),
                        };
                        break;
                    }
                }
            }
            es.close();
        };

        Box::pin(stream)
    }
}
