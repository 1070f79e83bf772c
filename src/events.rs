use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// In-process record of everything the daemon had to recover from.
///
/// Entries are never pruned during a run; the status publisher ships the
/// whole list to monitoring clients on every tick.
#[derive(Debug, Default)]
pub struct EventLog {
    entries: Mutex<Vec<LogEntry>>,
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a recovered failure and mirrors it to the process log.
    pub fn record(&self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}", message);
        self.entries.lock().unwrap().push(LogEntry {
            timestamp: Utc::now(),
            message,
        });
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }

    /// Entries as `(unix seconds, message)` pairs for the status snapshot.
    pub fn entries_epoch(&self) -> Vec<(i64, String)> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| (e.timestamp.timestamp(), e.message.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_accumulate_in_order() {
        let log = EventLog::new();
        log.record("first");
        log.record("second");
        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "first");
        assert_eq!(entries[1].message, "second");
    }
}
