// src/session/controller.rs — Drives one research session over a push channel
//
// The controller is the only owner of the live `ChannelHandle` and the only
// writer of the session's output. Every signal goes through `apply`, which is
// the single place status changes happen.

use std::collections::HashMap;
use std::sync::Arc;

use super::event::{EventKind, EventPayload, ReceivedEvent};
use super::{Diagnostic, DiagnosticKind, Session, SessionFailure, SessionStatus};
use crate::infra::config::StreamConfig;
use crate::infra::errors::ResearchError;
use crate::stream::{research_url, ChannelHandle, ChannelSignal, ReadyState, Transport};

/// Called once per accepted event of the kind it was registered for.
pub type EventHook = Box<dyn FnMut(&ReceivedEvent) + Send>;

/// Called once when a session reaches Completed or Failed.
pub type FinishHook = Box<dyn FnMut(&Session) + Send>;

const DIAGNOSTIC_DETAIL_LIMIT: usize = 200;

pub struct SessionController {
    transport: Arc<dyn Transport>,
    config: StreamConfig,
    session: Session,
    channel: Option<ChannelHandle>,
    hooks: HashMap<EventKind, EventHook>,
    on_finish: Option<FinishHook>,
}

impl SessionController {
    pub fn new(transport: Arc<dyn Transport>, config: StreamConfig) -> Self {
        Self {
            transport,
            config,
            session: Session::idle(),
            channel: None,
            hooks: HashMap::new(),
            on_finish: None,
        }
    }

    /// Register the hook for `kind`, replacing any earlier one.
    ///
    /// Hooks outlive sessions and run inline, in arrival order. The
    /// `workflow_end` hook sees an event stamped with the next sequence
    /// number, but that event is never stored.
    pub fn on<F>(&mut self, kind: EventKind, hook: F) -> &mut Self
    where
        F: FnMut(&ReceivedEvent) + Send + 'static,
    {
        self.hooks.insert(kind, Box::new(hook));
        self
    }

    pub fn on_finish<F>(&mut self, hook: F) -> &mut Self
    where
        F: FnMut(&Session) + Send + 'static,
    {
        self.on_finish = Some(Box::new(hook));
        self
    }

    /// Start a new session for `query`.
    ///
    /// An active session is cancelled first and its channel released before
    /// the new one opens. Returns the new session id.
    pub fn submit(&mut self, query: &str) -> Result<&str, ResearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResearchError::EmptyQuery);
        }
        let url = research_url(&self.config.endpoint, &self.config.query_param, query)?;

        if self.session.status.is_active() {
            tracing::info!(
                session = %self.session.id,
                "superseding active session with a new submit"
            );
        }
        self.release_channel();

        self.session.restart(query);
        self.session.status = SessionStatus::Connecting;
        tracing::info!(session = %self.session.id, query, "research session started");
        self.channel = Some(ChannelHandle::open_url(self.transport.as_ref(), url));

        Ok(&self.session.id)
    }

    /// Wait for and apply one channel signal.
    ///
    /// Returns `false` once there is nothing left to wait for.
    pub async fn pump(&mut self) -> bool {
        let Some(channel) = self.channel.as_mut() else {
            return false;
        };
        let signal = channel
            .next_signal()
            .await
            .unwrap_or(ChannelSignal::Closed);
        self.apply(signal);
        self.session.status.is_active()
    }

    /// Pump until the session reaches a terminal state or is torn down.
    pub async fn run_to_completion(&mut self) -> &Session {
        while self.pump().await {}
        &self.session
    }

    /// Release any live channel. An unfinished session returns to Idle and
    /// keeps the events it had received.
    pub fn dispose(&mut self) {
        let released = self.release_channel();
        if self.session.status.is_active() {
            tracing::info!(session = %self.session.id, "session disposed before completion");
            self.session.status = SessionStatus::Idle;
        } else if released {
            tracing::debug!(session = %self.session.id, "released channel on dispose");
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status
    }

    pub fn events(&self) -> &[ReceivedEvent] {
        self.session.events()
    }

    pub fn error(&self) -> Option<&SessionFailure> {
        self.session.error.as_ref()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.session.diagnostics
    }

    /// Id of the live channel, if any.
    pub fn channel_id(&self) -> Option<u64> {
        self.channel.as_ref().map(ChannelHandle::id)
    }

    fn apply(&mut self, signal: ChannelSignal) {
        if !self.session.status.is_active() {
            // First terminal signal wins; anything racing behind it is dropped.
            tracing::debug!(status = %self.session.status, ?signal, "ignoring late signal");
            return;
        }

        match signal {
            ChannelSignal::Opened => {
                if self.session.status == SessionStatus::Connecting {
                    self.session.status = SessionStatus::Streaming;
                    tracing::debug!(session = %self.session.id, "stream opened");
                }
            }
            ChannelSignal::Message { event, data } => self.on_message(&event, &data),
            ChannelSignal::Error { state, detail } => self.fail(state, detail.as_deref()),
            ChannelSignal::Closed => self.fail(
                ReadyState::Closed,
                Some("server ended the stream without workflow_end"),
            ),
        }
    }

    fn on_message(&mut self, label: &str, data: &str) {
        let Some(kind) = EventKind::from_wire(label) else {
            self.unhandled(label, data);
            return;
        };

        let payload = match EventPayload::decode(kind, data) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(event = label, "dropping malformed event: {}", e);
                self.session.diagnostics.push(Diagnostic {
                    kind: DiagnosticKind::Malformed,
                    event: label.to_string(),
                    detail: e.to_string(),
                });
                return;
            }
        };

        if kind.is_terminal() {
            self.complete(payload);
            return;
        }

        let event = self.session.output.append(payload);
        tracing::debug!(sequence = event.sequence, kind = %kind, "event accepted");
        if let Some(hook) = self.hooks.get_mut(&kind) {
            hook(event);
        }
    }

    fn unhandled(&mut self, label: &str, data: &str) {
        let detail = if label == "error" {
            // The producer reports its own failures this way, ahead of workflow_end.
            let message = serde_json::from_str::<serde_json::Value>(data)
                .ok()
                .and_then(|v| v["message"].as_str().map(str::to_string))
                .unwrap_or_else(|| data.to_string());
            tracing::warn!("research server reported an error: {}", message);
            message
        } else {
            tracing::debug!(event = label, "unhandled event kind");
            data.to_string()
        };
        self.session.diagnostics.push(Diagnostic {
            kind: DiagnosticKind::Unhandled,
            event: label.to_string(),
            detail: truncate(&detail, DIAGNOSTIC_DETAIL_LIMIT),
        });
    }

    fn complete(&mut self, payload: EventPayload) {
        self.release_channel();
        self.session.status = SessionStatus::Completed;
        tracing::info!(
            session = %self.session.id,
            events = self.session.output.len(),
            "research session completed"
        );

        if let Some(hook) = self.hooks.get_mut(&EventKind::WorkflowEnd) {
            let marker = ReceivedEvent {
                sequence: self.session.output.next_sequence(),
                kind: EventKind::WorkflowEnd,
                payload,
                received_at: chrono::Utc::now(),
            };
            hook(&marker);
        }
        self.finish();
    }

    fn fail(&mut self, state: ReadyState, detail: Option<&str>) {
        let was_open = self.session.status == SessionStatus::Streaming;
        self.release_channel();
        let failure = SessionFailure::from_transport(state, was_open);
        tracing::warn!(
            session = %self.session.id,
            state = %state,
            detail = detail.unwrap_or("-"),
            "research session failed: {}",
            failure
        );
        self.session.status = SessionStatus::Failed;
        self.session.error = Some(failure);
        self.finish();
    }

    fn finish(&mut self) {
        if let Some(hook) = self.on_finish.as_mut() {
            hook(&self.session);
        }
    }

    fn release_channel(&mut self) -> bool {
        match self.channel.take() {
            Some(mut channel) => channel.close(),
            None => false,
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.release_channel();
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::FailureKind;
    use crate::stream::SignalStream;
    use std::sync::Mutex;
    use url::Url;

    /// Each connect replays the next scripted list of signals.
    struct ReplayTransport {
        scripts: Mutex<Vec<Vec<ChannelSignal>>>,
    }

    impl ReplayTransport {
        fn new(scripts: Vec<Vec<ChannelSignal>>) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(scripts.into_iter().rev().collect()),
            })
        }
    }

    impl Transport for ReplayTransport {
        fn connect(&self, _url: &Url) -> SignalStream {
            let signals = self.scripts.lock().unwrap().pop().unwrap_or_default();
            Box::pin(futures::stream::iter(signals))
        }
    }

    fn controller(scripts: Vec<Vec<ChannelSignal>>) -> SessionController {
        SessionController::new(ReplayTransport::new(scripts), StreamConfig::default())
    }

    #[test]
    fn test_submit_rejects_blank_query() {
        let mut c = controller(vec![]);
        assert!(matches!(c.submit("   "), Err(ResearchError::EmptyQuery)));
        assert_eq!(c.status(), SessionStatus::Idle);
        assert!(c.channel_id().is_none());
    }

    #[test]
    fn test_submit_trims_and_connects() {
        let mut c = controller(vec![vec![]]);
        c.submit("  climate change ").unwrap();
        assert_eq!(c.session().query, "climate change");
        assert_eq!(c.status(), SessionStatus::Connecting);
        assert!(c.channel_id().is_some());
    }

    #[test]
    fn test_bad_endpoint_leaves_state_untouched() {
        let mut c = SessionController::new(
            ReplayTransport::new(vec![]),
            StreamConfig {
                endpoint: "nope".into(),
                ..StreamConfig::default()
            },
        );
        assert!(matches!(c.submit("x"), Err(ResearchError::InvalidUrl(_))));
        assert_eq!(c.status(), SessionStatus::Idle);
    }

    #[tokio::test]
    async fn test_event_before_open_is_accepted() {
        let mut c = controller(vec![vec![
            ChannelSignal::message("agent_reasoning_start", "{}"),
            ChannelSignal::Opened,
            ChannelSignal::message("workflow_end", ""),
        ]]);
        c.submit("q").unwrap();
        assert!(c.pump().await);
        assert_eq!(c.status(), SessionStatus::Connecting);
        assert_eq!(c.events().len(), 1);
        assert!(c.pump().await);
        assert_eq!(c.status(), SessionStatus::Streaming);
        assert!(!c.pump().await);
        assert_eq!(c.status(), SessionStatus::Completed);
    }

    #[tokio::test]
    async fn test_stream_end_without_workflow_end_fails() {
        let mut c = controller(vec![vec![
            ChannelSignal::Opened,
            ChannelSignal::message("tool_end", r#"{"output":"x"}"#),
        ]]);
        c.submit("q").unwrap();
        let session = c.run_to_completion().await;
        assert_eq!(session.status, SessionStatus::Failed);
        assert_eq!(
            session.error.as_ref().unwrap().kind,
            FailureKind::ConnectionClosed
        );
        assert_eq!(session.events().len(), 1);
    }

    #[tokio::test]
    async fn test_server_error_event_is_diagnostic_only() {
        let mut c = controller(vec![vec![
            ChannelSignal::Opened,
            ChannelSignal::message("error", r#"{"message":"agent crashed"}"#),
            ChannelSignal::message("workflow_end", "{}"),
        ]]);
        c.submit("q").unwrap();
        c.run_to_completion().await;
        assert_eq!(c.status(), SessionStatus::Completed);
        assert!(c.events().is_empty());
        assert_eq!(c.diagnostics().len(), 1);
        assert_eq!(c.diagnostics()[0].kind, DiagnosticKind::Unhandled);
        assert_eq!(c.diagnostics()[0].detail, "agent crashed");
    }

    #[tokio::test]
    async fn test_hooks_fire_per_kind_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut c = controller(vec![vec![
            ChannelSignal::Opened,
            ChannelSignal::message("tool_start", r#"{"tool_name":"web_search","input":"a"}"#),
            ChannelSignal::message("tool_end", r#"{"output":"b"}"#),
            ChannelSignal::message("tool_start", r#"{"tool_name":"pdf_reader","input":"c"}"#),
            ChannelSignal::message("workflow_end", ""),
        ]]);
        let log = seen.clone();
        c.on(EventKind::ToolStart, move |e| {
            log.lock().unwrap().push(format!("start:{}", e.sequence));
        });
        let log = seen.clone();
        c.on(EventKind::WorkflowEnd, move |e| {
            log.lock().unwrap().push(format!("end:{}", e.sequence));
        });

        c.submit("q").unwrap();
        c.run_to_completion().await;
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["start:0", "start:2", "end:3"]
        );
    }

    #[tokio::test]
    async fn test_reregistering_hook_replaces_it() {
        let count = Arc::new(Mutex::new((0, 0)));
        let mut c = controller(vec![vec![
            ChannelSignal::message("tool_end", "{}"),
            ChannelSignal::message("workflow_end", ""),
        ]]);
        let n = count.clone();
        c.on(EventKind::ToolEnd, move |_| n.lock().unwrap().0 += 1);
        let n = count.clone();
        c.on(EventKind::ToolEnd, move |_| n.lock().unwrap().1 += 1);

        c.submit("q").unwrap();
        c.run_to_completion().await;
        assert_eq!(*count.lock().unwrap(), (0, 1));
    }

    #[tokio::test]
    async fn test_finish_hook_fires_once() {
        let finished = Arc::new(Mutex::new(Vec::new()));
        let mut c = controller(vec![vec![
            ChannelSignal::Opened,
            ChannelSignal::message("workflow_end", ""),
            ChannelSignal::error(ReadyState::Closed),
        ]]);
        let log = finished.clone();
        c.on_finish(move |s| log.lock().unwrap().push(s.status));
        c.submit("q").unwrap();
        c.run_to_completion().await;
        assert_eq!(*finished.lock().unwrap(), vec![SessionStatus::Completed]);
    }

    #[tokio::test]
    async fn test_late_signals_are_ignored() {
        let mut c = controller(vec![vec![ChannelSignal::Opened]]);
        c.submit("q").unwrap();
        c.pump().await;
        c.apply(ChannelSignal::message("workflow_end", ""));
        assert_eq!(c.status(), SessionStatus::Completed);

        c.apply(ChannelSignal::error(ReadyState::Closed));
        c.apply(ChannelSignal::message("tool_end", "{}"));
        assert_eq!(c.status(), SessionStatus::Completed);
        assert!(c.error().is_none());
        assert!(c.events().is_empty());
    }

    #[tokio::test]
    async fn test_dispose_releases_and_idles() {
        let mut c = controller(vec![vec![
            ChannelSignal::Opened,
            ChannelSignal::message("agent_reasoning_start", "{}"),
        ]]);
        c.submit("q").unwrap();
        c.pump().await;
        c.pump().await;
        c.dispose();
        assert!(c.channel_id().is_none());
        assert_eq!(c.status(), SessionStatus::Idle);
        assert_eq!(c.events().len(), 1);
        assert!(!c.pump().await);
        c.dispose();
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }
}
