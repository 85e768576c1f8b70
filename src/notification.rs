//! Timed status-line messages for the reader.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// How long the bookmark confirmation stays visible.
pub const BOOKMARK_NOTICE_DURATION: Duration = Duration::from_secs(2);

const MESSAGE_LIFETIME: Duration = Duration::from_secs(5);
const MAX_MESSAGES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A piece of text that disappears from the status line at a deadline.
#[derive(Debug, Clone)]
pub struct Notice {
    pub text: String,
    pub severity: Severity,
    shown_until: Instant,
}

impl Notice {
    pub fn new(text: impl Into<String>, severity: Severity, lifetime: Duration) -> Self {
        Self {
            text: text.into(),
            severity,
            shown_until: Instant::now() + lifetime,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.shown_until
    }
}

/// Warnings and errors raised by reader actions. Only the newest live entry
/// is displayed; older ones stay queued until they expire.
#[derive(Debug)]
pub struct MessageLog {
    entries: VecDeque<Notice>,
    lifetime: Duration,
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::with_lifetime(MESSAGE_LIFETIME)
    }
}

impl MessageLog {
    pub fn with_lifetime(lifetime: Duration) -> Self {
        Self {
            entries: VecDeque::new(),
            lifetime,
        }
    }

    pub fn push(&mut self, severity: Severity, text: impl Into<String>) {
        if self.entries.len() == MAX_MESSAGES {
            self.entries.pop_front();
        }
        self.entries
            .push_back(Notice::new(text, severity, self.lifetime));
    }

    pub fn latest(&self) -> Option<&Notice> {
        self.entries.iter().rev().find(|n| !n.is_expired())
    }

    pub fn prune(&mut self) {
        self.entries.retain(|n| !n.is_expired());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
