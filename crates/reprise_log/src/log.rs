//! The capture log.

use crate::encoding::LOG_FORMAT_VERSION;
use crate::entry::Entry;
use crate::storage::StorageLog;
use crate::xhr::XhrLog;
use reprise_core::Timestamp;
use serde::{Deserialize, Serialize};

fn current_version() -> u32 {
    LOG_FORMAT_VERSION
}

/// Complete recorded trace of one capture session
///
/// Every sequence grows append-only in chronological order during capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Log {
    /// Format version
    #[serde(default = "current_version")]
    pub version: u32,
    /// Ambient time reads
    #[serde(default)]
    pub dates: Vec<Timestamp>,
    /// Random draws in `[0, 1)`
    #[serde(default)]
    pub random: Vec<f64>,
    /// Fired callbacks, ordered by capture time
    #[serde(default)]
    pub events: Vec<Entry>,
    /// Request outcomes
    #[serde(default)]
    pub xhr: XhrLog,
    /// Storage snapshot taken at capture start
    #[serde(default)]
    pub storage: StorageLog,
}

impl Log {
    /// Create an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event
    pub fn push_event(&mut self, entry: Entry) {
        self.events.push(entry);
    }

    /// Whether nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
            && self.random.is_empty()
            && self.events.is_empty()
            && self.xhr.instances.is_empty()
            && self.storage.state.is_empty()
    }
}

impl Default for Log {
    fn default() -> Self {
        Self {
            version: LOG_FORMAT_VERSION,
            dates: Vec::new(),
            random: Vec::new(),
            events: Vec::new(),
            xhr: XhrLog::default(),
            storage: StorageLog::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::kind;
    use serde_json::json;

    #[test]
    fn test_new_log_is_empty() {
        let log = Log::new();
        assert!(log.is_empty());
        assert_eq!(log.version, LOG_FORMAT_VERSION);
    }

    #[test]
    fn test_push_event() {
        let mut log = Log::new();
        log.push_event(Entry::new(kind::DOM, Timestamp::from_millis(5), json!({})));
        assert_eq!(log.events.len(), 1);
        assert!(!log.is_empty());
    }

    #[test]
    fn test_sparse_document_decodes() {
        let log: Log = serde_json::from_str(r#"{"random":[0.5]}"#).unwrap();
        assert_eq!(log.random, vec![0.5]);
        assert!(log.events.is_empty());
        assert_eq!(log.version, LOG_FORMAT_VERSION);
    }
}
