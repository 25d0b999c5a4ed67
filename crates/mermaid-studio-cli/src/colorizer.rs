//! Terminal output for activity entries
//!
//! Applies ANSI colors to activity lines using crossterm.

use crossterm::style::{Color, Stylize};
use mermaid_studio::{Activity, ActivityLog, ActivitySink, LogEntry, LogLevel};

/// Color of each activity level
///
/// - Info: Cyan
/// - Success: Green
/// - Warning: Yellow
/// - Error: Red
pub fn level_color(level: LogLevel) -> Color {
    match level {
        LogLevel::Info => Color::Cyan,
        LogLevel::Success => Color::Green,
        LogLevel::Warning => Color::Yellow,
        LogLevel::Error => Color::Red,
    }
}

/// Format an entry with ANSI escape codes
pub fn colorize_entry(entry: &LogEntry) -> String {
    let mut line = format!(
        "{} {} {}",
        format!("[{}]", entry.timestamp.format("%H:%M:%S")).with(Color::DarkGrey),
        format!("{:<7}", entry.level.as_str())
            .with(level_color(entry.level))
            .bold(),
        entry.message
    );
    if let Some(details) = &entry.details {
        for detail in details.lines() {
            line.push_str(&format!("\n        {}", detail.with(Color::DarkGrey)));
        }
    }
    line
}

/// Activity sink that keeps a log and echoes each entry to stderr
#[derive(Debug, Clone)]
pub struct ConsoleSink {
    log: ActivityLog,
    color: bool,
}

impl ConsoleSink {
    pub fn new(color: bool) -> Self {
        Self {
            log: ActivityLog::new(),
            color,
        }
    }

    /// Get the recorded entries (for testing)
    #[cfg(test)]
    pub fn log(&self) -> &ActivityLog {
        &self.log
    }

    fn format(&self, entry: &LogEntry) -> String {
        if self.color {
            colorize_entry(entry)
        } else {
            entry.to_string()
        }
    }
}

impl ActivitySink for ConsoleSink {
    fn record(&self, activity: Activity) {
        let entry = self.log.push(activity);
        eprintln!("{}", self.format(&entry));
    }
}
