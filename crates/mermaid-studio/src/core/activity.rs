//! Activity log: the user-facing record of pipeline and correction events
//!
//! Components emit [`Activity`] values through an [`ActivitySink`]. The host
//! owns the log itself; [`ActivityLog`] is an in-memory, append-only
//! implementation that stamps entries with an id and a UTC timestamp.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Severity of an activity entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Success => "SUCCESS",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// An event emitted by the core, before the host records it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    pub level: LogLevel,
    pub message: String,
    pub details: Option<String>,
}

impl Activity {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            details: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    /// Attach details to the entry
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Mirror the activity as a tracing event
    pub fn trace(&self) {
        let details = self.details.as_deref().unwrap_or_default();
        match self.level {
            LogLevel::Info | LogLevel::Success => {
                tracing::info!(kind = %self.level, details, "{}", self.message)
            }
            LogLevel::Warning => tracing::warn!(details, "{}", self.message),
            LogLevel::Error => tracing::error!(details, "{}", self.message),
        }
    }
}

/// A recorded entry in the activity log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<String>,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {:<7} {}",
            self.timestamp.format("%H:%M:%S"),
            self.level,
            self.message
        )?;
        if let Some(details) = &self.details {
            write!(f, "\n        {}", details)?;
        }
        Ok(())
    }
}

/// Receiver of activity emitted by the studio
pub trait ActivitySink {
    fn record(&self, activity: Activity);
}

impl<F> ActivitySink for F
where
    F: Fn(Activity),
{
    fn record(&self, activity: Activity) {
        self(activity)
    }
}

/// Sink that only forwards activity to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ActivitySink for TracingSink {
    fn record(&self, activity: Activity) {
        activity.trace();
    }
}

#[derive(Debug, Default)]
struct LogState {
    next_id: u64,
    entries: Vec<LogEntry>,
}

/// Shared, append-only in-memory activity log
///
/// Clones share the same entries, so the host can keep a handle for display
/// while the studio owns another for recording.
#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    state: Arc<Mutex<LogState>>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an activity, returning the recorded entry
    pub fn push(&self, activity: Activity) -> LogEntry {
        activity.trace();

        let mut state = self.state.lock();
        state.next_id += 1;
        let entry = LogEntry {
            id: state.next_id,
            timestamp: Utc::now(),
            level: activity.level,
            message: activity.message,
            details: activity.details,
        };
        state.entries.push(entry.clone());
        entry
    }

    /// Snapshot of all entries in insertion order
    pub fn entries(&self) -> Vec<LogEntry> {
        self.state.lock().entries.clone()
    }

    /// Entries recorded after the given id
    pub fn entries_since(&self, id: u64) -> Vec<LogEntry> {
        self.state
            .lock()
            .entries
            .iter()
            .filter(|entry| entry.id > id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The most recent entry, if any
    pub fn last(&self) -> Option<LogEntry> {
        self.state.lock().entries.last().cloned()
    }
}

impl ActivitySink for ActivityLog {
    fn record(&self, activity: Activity) {
        self.push(activity);
    }
}
