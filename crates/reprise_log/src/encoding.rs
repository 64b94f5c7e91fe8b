//! JSON encoding of the log.
//!
//! The persisted form is a plain JSON document. Decoding rejects documents
//! written by a newer format version.

use crate::log::Log;
use reprise_core::{EngineError, EngineResult};
use tracing::debug;

/// Version written into every new log
pub const LOG_FORMAT_VERSION: u32 = 1;

impl Log {
    /// Encode as a JSON document
    ///
    /// # Errors
    ///
    /// Returns error if a recorded value cannot be represented in JSON
    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a JSON document
    ///
    /// # Errors
    ///
    /// Returns error if the document is malformed or has a newer version
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let log: Log = serde_json::from_str(json)?;
        if log.version > LOG_FORMAT_VERSION {
            return Err(EngineError::Encoding {
                message: format!(
                    "log format version {} is newer than supported version {}",
                    log.version, LOG_FORMAT_VERSION
                ),
            });
        }
        debug!(
            version = log.version,
            events = log.events.len(),
            "decoded log"
        );
        Ok(log)
    }
}
