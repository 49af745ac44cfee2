//! Capped sync log
//!
//! A ring buffer of recent engine activity surfaced through the public API.
//! Oldest entries are evicted past the fixed capacity.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LOG_CAPACITY: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

pub struct SyncLog {
    entries: Mutex<VecDeque<SyncLogEntry>>,
    capacity: usize,
}

impl Default for SyncLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl SyncLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest past capacity. Returns the
    /// entry so callers can forward it to event subscribers.
    pub fn record(&self, level: LogLevel, message: impl Into<String>) -> SyncLogEntry {
        let entry = SyncLogEntry {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        };

        let mut entries = self.entries.lock().expect("log buffer poisoned");
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry.clone());
        entry
    }

    /// The most recent `limit` entries in chronological order; all of them
    /// when no limit is given.
    pub fn recent(&self, limit: Option<usize>) -> Vec<SyncLogEntry> {
        let entries = self.entries.lock().expect("log buffer poisoned");
        let take = limit.unwrap_or(entries.len()).min(entries.len());
        entries.iter().skip(entries.len() - take).cloned().collect()
    }

    pub fn clear(&self) {
        self.entries.lock().expect("log buffer poisoned").clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("log buffer poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oldest_entries_evicted_past_capacity() {
        let log = SyncLog::with_capacity(3);
        for i in 0..5 {
            log.record(LogLevel::Info, format!("entry {}", i));
        }

        let entries = log.recent(None);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].message, "entry 2");
        assert_eq!(entries[2].message, "entry 4");
    }

    #[test]
    fn limit_returns_most_recent_in_order() {
        let log = SyncLog::with_capacity(10);
        for i in 0..5 {
            log.record(LogLevel::Info, format!("entry {}", i));
        }

        let entries = log.recent(Some(2));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "entry 3");
        assert_eq!(entries[1].message, "entry 4");
    }

    #[test]
    fn clear_empties_the_buffer() {
        let log = SyncLog::default();
        log.record(LogLevel::Error, "boom");
        log.clear();
        assert!(log.is_empty());
    }
}
