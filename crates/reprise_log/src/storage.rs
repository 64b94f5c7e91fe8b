//! Persistent storage snapshot.

use serde::{Deserialize, Serialize};

/// One key/value pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageItem {
    /// Storage key
    pub key: String,
    /// Stored string
    pub value: String,
}

impl StorageItem {
    /// Create an item
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Storage section of the log
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLog {
    /// Contents at capture start, in enumeration order
    #[serde(default)]
    pub state: Vec<StorageItem>,
}
