// src/session/accumulator.rs — Append-only log of accepted events

use chrono::Utc;

use super::event::{EventPayload, ReceivedEvent};
use super::research::ResearchOutput;

/// Ordered record of every accepted event in the current session.
///
/// Entries are never edited or reordered. The only other mutation is the
/// reset that happens when a new session starts, which is crate-private.
#[derive(Debug, Default)]
pub struct OutputAccumulator {
    events: Vec<ReceivedEvent>,
}

impl OutputAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a decoded payload and return the stamped entry.
    pub fn append(&mut self, payload: EventPayload) -> &ReceivedEvent {
        let sequence = self.next_sequence();
        self.events.push(ReceivedEvent {
            sequence,
            kind: payload.kind(),
            payload,
            received_at: Utc::now(),
        });
        &self.events[self.events.len() - 1]
    }

    /// The arrival index the next appended event will carry.
    pub fn next_sequence(&self) -> u64 {
        self.events.len() as u64
    }

    pub fn events(&self) -> &[ReceivedEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events appended after `sequence`, for renderers that poll incrementally.
    pub fn since(&self, sequence: u64) -> &[ReceivedEvent] {
        let start = (sequence.saturating_add(1) as usize).min(self.events.len());
        &self.events[start..]
    }

    /// The most recent `final_research_output`, parsed into its typed form.
    pub fn research_output(&self) -> Option<ResearchOutput> {
        self.events
            .iter()
            .rev()
            .find_map(ReceivedEvent::research_output)
    }

    pub(crate) fn reset(&mut self) {
        self.events.clear();
    }
}
