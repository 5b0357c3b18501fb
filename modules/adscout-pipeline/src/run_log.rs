//! In-memory rolling log buffer per keyword.
//!
//! Feeds the `/logs/{keyword}` endpoint. Deleted together with the run and
//! its persisted rows when a keyword is wiped.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Most recent entries kept per keyword.
const MAX_ENTRIES_PER_KEYWORD: usize = 1000;

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub message: String,
    pub keyword: String,
}

#[derive(Default)]
pub struct RunLogStore {
    entries: Mutex<HashMap<String, VecDeque<LogEntry>>>,
}

impl RunLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, keyword: &str, level: &str, message: impl Into<String>) {
        let entry = LogEntry {
            timestamp: Utc::now(),
            level: level.to_string(),
            message: message.into(),
            keyword: keyword.to_string(),
        };

        let mut entries = self.entries.lock().expect("log store lock poisoned");
        let buffer = entries.entry(keyword.to_string()).or_default();
        buffer.push_back(entry);
        while buffer.len() > MAX_ENTRIES_PER_KEYWORD {
            buffer.pop_front();
        }
    }

    /// The most recent `limit` entries for a keyword, oldest first.
    /// `None` when the keyword has no buffer at all.
    pub fn recent(&self, keyword: &str, limit: usize) -> Option<Vec<LogEntry>> {
        let entries = self.entries.lock().expect("log store lock poisoned");
        let buffer = entries.get(keyword)?;
        let skip = buffer.len().saturating_sub(limit);
        Some(buffer.iter().skip(skip).cloned().collect())
    }

    pub fn clear(&self, keyword: &str) {
        self.entries
            .lock()
            .expect("log store lock poisoned")
            .remove(keyword);
    }
}
