//! Entries of the ordered event sequence.
//!
//! An entry is a fired callback that replay must reproduce: `type` names the
//! plugin that replays it, `time` is the capture timestamp and `details`
//! holds whatever that plugin needs.

use reprise_core::{EngineResult, RequestId, TimerId, Timestamp};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Source tags logged by the built-in plugins
pub mod kind {
    /// A fired `setTimeout` callback
    pub const SET_TIMEOUT: &str = "setTimeout";
    /// A fired `setInterval` callback
    pub const SET_INTERVAL: &str = "setInterval";
    /// A user-originated DOM event
    pub const DOM: &str = "dom";
    /// A request state-change notification
    pub const XHR: &str = "xhr";
    /// The page-load signal
    pub const DOM_CONTENT_LOADED: &str = "dom-content-loaded";
}

/// One recorded event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Source tag
    #[serde(rename = "type")]
    pub kind: String,
    /// Capture timestamp
    pub time: Timestamp,
    /// Source-specific payload
    #[serde(default)]
    pub details: Value,
}

impl Entry {
    /// Create an entry from a raw payload
    pub fn new(kind: impl Into<String>, time: Timestamp, details: Value) -> Self {
        Self {
            kind: kind.into(),
            time,
            details,
        }
    }

    /// Create an entry from a typed payload
    ///
    /// # Errors
    ///
    /// Returns error if the payload does not serialize
    pub fn with_details<T: Serialize>(
        kind: impl Into<String>,
        time: Timestamp,
        details: &T,
    ) -> EngineResult<Self> {
        Ok(Self::new(kind, time, serde_json::to_value(details)?))
    }

    /// Decode the payload
    ///
    /// # Errors
    ///
    /// Returns error if the payload does not have the expected shape
    pub fn details_as<T: DeserializeOwned>(&self) -> EngineResult<T> {
        Ok(T::deserialize(&self.details)?)
    }
}

/// Payload of timer entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerDetails {
    /// Allocation-order id of the timer
    pub id: TimerId,
}

/// Payload of DOM event entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomDetails {
    /// Event interface name, e.g. `MouseEvent`
    pub interface: String,
    /// Serialized event attributes
    pub attrs: Map<String, Value>,
    /// Form value of the target when the event was captured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Payload of request state-change entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XhrDetails {
    /// Request the notification belongs to
    pub id: RequestId,
    /// Serialized event attributes
    pub attrs: Map<String, Value>,
}

/// Payload of the page-load entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageLoadDetails {
    /// Serialized event attributes
    pub attrs: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_json_shape() {
        let entry = Entry::with_details(
            kind::SET_TIMEOUT,
            Timestamp::from_millis(42),
            &TimerDetails {
                id: TimerId::from_raw(2),
            },
        )
        .unwrap();

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value, json!({"type": "setTimeout", "time": 42, "details": {"id": 2}}));
    }

    #[test]
    fn test_details_as() {
        let entry = Entry::new(
            kind::DOM,
            Timestamp::zero(),
            json!({"interface": "MouseEvent", "attrs": {"type": "click"}}),
        );
        let details: DomDetails = entry.details_as().unwrap();
        assert_eq!(details.interface, "MouseEvent");
        assert_eq!(details.attrs["type"], "click");
        assert!(details.value.is_none());
    }

    #[test]
    fn test_details_wrong_shape() {
        let entry = Entry::new(kind::SET_TIMEOUT, Timestamp::zero(), json!({"id": "x"}));
        assert!(entry.details_as::<TimerDetails>().is_err());
    }
}
