//! Recorded outcomes of asynchronous requests.

use crate::cursor::Cursor;
use indexmap::IndexMap;
use reprise_core::{DomException, RequestId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Members of the request interface observed on the capturing platform
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceDescriptor {
    /// Readable properties
    pub properties: Vec<String>,
    /// Callable methods
    pub methods: Vec<String>,
}

impl InterfaceDescriptor {
    /// Create a descriptor
    #[must_use]
    pub fn new(properties: Vec<String>, methods: Vec<String>) -> Self {
        Self {
            properties,
            methods,
        }
    }

    /// Whether `name` is a readable property
    #[must_use]
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.iter().any(|p| p == name)
    }

    /// Whether `name` is a callable method
    #[must_use]
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.iter().any(|m| m == name)
    }
}

/// Result of one member access
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "value", rename_all = "lowercase")]
pub enum Outcome {
    /// The access returned a value
    Result(Value),
    /// The access threw
    Error(DomException),
}

impl Outcome {
    /// Convert back into what the access produced
    pub fn into_result(self) -> Result<Value, DomException> {
        match self {
            Self::Result(value) => Ok(value),
            Self::Error(exception) => Err(exception),
        }
    }
}

/// Every observable member access of one request instance, in call order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XhrRecord {
    /// Allocation-order id
    pub id: RequestId,
    /// Outcomes per member name
    #[serde(rename = "perMemberOutcomes", default)]
    pub members: IndexMap<String, Vec<Outcome>>,
}

impl XhrRecord {
    /// Create an empty record
    #[must_use]
    pub fn new(id: RequestId) -> Self {
        Self {
            id,
            members: IndexMap::new(),
        }
    }

    /// Append an outcome to a member's sequence
    pub fn record(&mut self, member: &str, outcome: Outcome) {
        self.members
            .entry(member.to_string())
            .or_default()
            .push(outcome);
    }

    /// Outcomes recorded for one member
    #[must_use]
    pub fn outcomes(&self, member: &str) -> &[Outcome] {
        self.members.get(member).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Per-member replay cursors
    #[must_use]
    pub fn into_cursors(self) -> IndexMap<String, Cursor<Outcome>> {
        self.members
            .into_iter()
            .map(|(member, outcomes)| (member, Cursor::from_chronological(outcomes)))
            .collect()
    }
}

/// Request section of the log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct XhrLog {
    /// Interface of the capturing platform
    #[serde(rename = "interfaceDescriptor", default)]
    pub interface: InterfaceDescriptor,
    /// One record per constructed request, in allocation order
    #[serde(default)]
    pub instances: Vec<XhrRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_keeps_call_order() {
        let mut record = XhrRecord::new(RequestId::from_raw(0));
        record.record(
            "status",
            Outcome::Error(DomException::invalid_state_error("not opened")),
        );
        record.record("open", Outcome::Result(Value::Null));
        record.record("status", Outcome::Result(json!(0)));

        let status = record.outcomes("status");
        assert_eq!(status.len(), 2);
        assert!(matches!(status[0], Outcome::Error(_)));
        assert_eq!(status[1], Outcome::Result(json!(0)));
        assert!(record.outcomes("send").is_empty());
    }

    #[test]
    fn test_outcome_json_shape() {
        let value = serde_json::to_value(Outcome::Result(json!(200))).unwrap();
        assert_eq!(value, json!({"outcome": "result", "value": 200}));

        let value = serde_json::to_value(Outcome::Error(DomException::invalid_state_error(
            "not opened",
        )))
        .unwrap();
        assert_eq!(value["outcome"], "error");
        assert_eq!(value["value"]["name"], "InvalidStateError");
        assert_eq!(value["value"]["code"], 11);
    }

    #[test]
    fn test_into_cursors() {
        let mut record = XhrRecord::new(RequestId::from_raw(3));
        record.record("readyState", Outcome::Result(json!(0)));
        record.record("readyState", Outcome::Result(json!(1)));

        let mut cursors = record.into_cursors();
        let ready = cursors.get_mut("readyState").unwrap();
        assert_eq!(ready.pop(), Some(Outcome::Result(json!(0))));
        assert_eq!(ready.pop(), Some(Outcome::Result(json!(1))));
        assert_eq!(ready.pop(), None);
    }

    #[test]
    fn test_section_json_keys() {
        let section = XhrLog {
            interface: InterfaceDescriptor::new(vec!["status".to_string()], Vec::new()),
            instances: vec![XhrRecord::new(RequestId::from_raw(0))],
        };
        let value = serde_json::to_value(&section).unwrap();
        assert!(value.get("interface").is_none());
        assert_eq!(value["interfaceDescriptor"], serde_json::to_value(&section.interface).unwrap());
        assert_eq!(value["instances"][0]["perMemberOutcomes"], json!({}));

        let decoded: XhrLog = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, section);
    }

    #[test]
    fn test_descriptor_lookup() {
        let iface = InterfaceDescriptor::new(
            vec!["status".to_string()],
            vec!["open".to_string()],
        );
        assert!(iface.has_property("status"));
        assert!(iface.has_method("open"));
        assert!(!iface.has_method("status"));
    }
}
