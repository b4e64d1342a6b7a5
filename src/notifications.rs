//! Notification queue
//!
//! Dismissible user-facing messages raised by the engine. Notifications
//! auto-dismiss after a configurable duration and can be dismissed manually
//! by ID. The queue is bounded; the oldest entries are dropped first.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Maximum number of notifications kept in the queue
pub const MAX_QUEUED_NOTIFICATIONS: usize = 50;

/// Default auto-dismiss duration in seconds
pub const DEFAULT_DISMISS_SECONDS: u64 = 5;

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Operation confirmed
    Success,
    /// Operation failed and was rolled back (or partially failed)
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Error => "error",
        }
    }

    /// Prefix used in human-readable output
    pub fn icon(&self) -> &'static str {
        match self {
            Severity::Success => "✓",
            Severity::Error => "✗",
        }
    }
}

/// A single notification
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    /// Unique ID within the owning manager
    pub id: u64,
    pub severity: Severity,
    pub message: String,
    /// Wall-clock creation time
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    raised: Instant,
    /// How long before auto-dismiss (None = manual dismiss only)
    #[serde(skip)]
    duration: Option<Duration>,
}

impl Notification {
    fn new(id: u64, severity: Severity, message: String, duration: Option<Duration>) -> Self {
        Self {
            id,
            severity,
            message,
            created_at: Utc::now(),
            raised: Instant::now(),
            duration,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.duration
            .is_some_and(|duration| self.raised.elapsed() >= duration)
    }
}

impl PartialEq for Notification {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.severity == other.severity && self.message == other.message
    }
}

/// Notification manager - owns the queue
#[derive(Debug)]
pub struct NotificationManager {
    /// Queued notifications (oldest first)
    queue: VecDeque<Notification>,
    next_id: u64,
    duration: Option<Duration>,
}

impl Default for NotificationManager {
    fn default() -> Self {
        Self::new(Some(Duration::from_secs(DEFAULT_DISMISS_SECONDS)))
    }
}

impl NotificationManager {
    /// Create a manager. `duration` of `None` disables auto-dismiss.
    pub fn new(duration: Option<Duration>) -> Self {
        Self {
            queue: VecDeque::new(),
            next_id: 1,
            duration,
        }
    }

    /// Add a notification and return its ID
    pub fn notify(&mut self, severity: Severity, message: impl Into<String>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.queue
            .push_back(Notification::new(id, severity, message.into(), self.duration));
        while self.queue.len() > MAX_QUEUED_NOTIFICATIONS {
            self.queue.pop_front();
        }
        id
    }

    pub fn success(&mut self, message: impl Into<String>) -> u64 {
        self.notify(Severity::Success, message)
    }

    pub fn error(&mut self, message: impl Into<String>) -> u64 {
        self.notify(Severity::Error, message)
    }

    /// Dismiss one notification. Returns false if it was already gone.
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.queue.len();
        self.queue.retain(|n| n.id != id);
        self.queue.len() != before
    }

    pub fn dismiss_all(&mut self) {
        self.queue.clear();
    }

    /// Drop expired notifications
    pub fn cleanup(&mut self) {
        self.queue.retain(|n| !n.is_expired());
    }

    /// Notifications that have not expired, oldest first
    pub fn visible(&self) -> Vec<Notification> {
        self.queue.iter().filter(|n| !n.is_expired()).cloned().collect()
    }

    pub fn has_notifications(&self) -> bool {
        self.queue.iter().any(|n| !n.is_expired())
    }

    /// Most recent notification, expired or not
    pub fn latest(&self) -> Option<&Notification> {
        self.queue.back()
    }
}
