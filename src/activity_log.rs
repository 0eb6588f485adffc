use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// One line in the activity panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// Bounded activity log; the oldest entry is evicted once full
#[derive(Debug, Clone)]
pub struct ActivityLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl ActivityLog {
    pub const DEFAULT_CAPACITY: usize = 10;

    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn push(&mut self, message: impl Into<String>) -> &LogEntry {
        self.entries.push_back(LogEntry {
            at: Utc::now(),
            message: message.into(),
        });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        &self.entries[self.entries.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn messages(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.message.as_str()).collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|e| e.message.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eleventh_entry_evicts_the_oldest() {
        let mut log = ActivityLog::default();
        for i in 1..=11 {
            log.push(format!("entry {}", i));
        }

        assert_eq!(log.len(), 10);
        let expected: Vec<String> = (2..=11).map(|i| format!("entry {}", i)).collect();
        assert_eq!(log.messages(), expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn entries_are_timestamped_in_order() {
        let mut log = ActivityLog::new(3);
        log.push("first");
        log.push("second");

        let stamps: Vec<_> = log.entries().map(|e| e.at).collect();
        assert!(stamps[0] <= stamps[1]);
    }

    #[test]
    fn zero_capacity_keeps_latest_entry() {
        let mut log = ActivityLog::new(0);
        log.push("a");
        log.push("b");
        assert_eq!(log.messages(), vec!["b"]);
    }
}
