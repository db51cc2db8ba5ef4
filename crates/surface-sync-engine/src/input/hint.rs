use std::time::{Duration, Instant};

use log::trace;

use crate::input::intent::InputType;
use crate::model::{ContentRange, NodeId};

/// Where the host said an edit would land, captured before it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputHint {
    pub input_type: InputType,
    pub content_range: ContentRange,
    pub text: Option<String>,
    pub timestamp: Instant,
}

impl InputHint {
    /// True when both ends of the hinted range lie in `start`/`end`.
    pub fn covers(&self, start: &NodeId, end: &NodeId) -> bool {
        self.content_range.spans_nodes(start, end)
    }
}

/// Holds at most one pending hint with a time-to-live.
#[derive(Debug, Clone)]
pub struct HintTracker {
    pending: Option<InputHint>,
    ttl: Duration,
}

impl HintTracker {
    pub fn new(ttl: Duration) -> Self {
        Self { pending: None, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Replaces the pending hint. Non-hintable intents only clear it.
    pub fn capture(
        &mut self,
        input_type: InputType,
        content_range: ContentRange,
        text: Option<String>,
    ) -> bool {
        self.capture_at(Instant::now(), input_type, content_range, text)
    }

    pub fn capture_at(
        &mut self,
        now: Instant,
        input_type: InputType,
        content_range: ContentRange,
        text: Option<String>,
    ) -> bool {
        if !input_type.is_hintable() {
            self.clear();
            return false;
        }
        trace!("captured {input_type} hint");
        self.pending = Some(InputHint {
            input_type,
            content_range,
            text,
            timestamp: now,
        });
        true
    }

    /// The pending hint, unless composition is active or it has expired.
    pub fn validate(&self, is_composing: bool) -> Option<&InputHint> {
        self.validate_at(Instant::now(), is_composing)
    }

    pub fn validate_at(&self, now: Instant, is_composing: bool) -> Option<&InputHint> {
        if is_composing {
            return None;
        }
        self.pending
            .as_ref()
            .filter(|hint| now.saturating_duration_since(hint.timestamp) <= self.ttl)
    }

    /// The pending hint regardless of age.
    pub fn peek(&self) -> Option<&InputHint> {
        self.pending.as_ref()
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }
}

impl Default for HintTracker {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}
