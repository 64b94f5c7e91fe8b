//! Platform exceptions as plain data.
//!
//! Only `message`, `code` and `name` survive a round trip through the log,
//! which is exactly what replay needs to raise an indistinguishable error.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An exception thrown by a platform primitive
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomException {
    /// Human readable message
    pub message: String,
    /// Legacy numeric code, absent for plain errors
    #[serde(default)]
    pub code: Option<u16>,
    /// Exception name, e.g. `InvalidStateError`
    pub name: String,
}

impl DomException {
    /// Legacy code of `HierarchyRequestError`
    pub const HIERARCHY_REQUEST_ERR: u16 = 3;
    /// Legacy code of `NotFoundError`
    pub const NOT_FOUND_ERR: u16 = 8;
    /// Legacy code of `NotSupportedError`
    pub const NOT_SUPPORTED_ERR: u16 = 9;
    /// Legacy code of `InvalidStateError`
    pub const INVALID_STATE_ERR: u16 = 11;
    /// Legacy code of `SyntaxError`
    pub const SYNTAX_ERR: u16 = 12;
    /// Legacy code of `NetworkError`
    pub const NETWORK_ERR: u16 = 19;

    /// Create an exception
    pub fn new(name: impl Into<String>, message: impl Into<String>, code: Option<u16>) -> Self {
        Self {
            message: message.into(),
            code,
            name: name.into(),
        }
    }

    /// `HierarchyRequestError`
    pub fn hierarchy_request_error(message: impl Into<String>) -> Self {
        Self::new(
            "HierarchyRequestError",
            message,
            Some(Self::HIERARCHY_REQUEST_ERR),
        )
    }

    /// `NotFoundError`
    pub fn not_found_error(message: impl Into<String>) -> Self {
        Self::new("NotFoundError", message, Some(Self::NOT_FOUND_ERR))
    }

    /// `InvalidStateError`
    pub fn invalid_state_error(message: impl Into<String>) -> Self {
        Self::new("InvalidStateError", message, Some(Self::INVALID_STATE_ERR))
    }

    /// `NotSupportedError`
    pub fn not_supported_error(message: impl Into<String>) -> Self {
        Self::new("NotSupportedError", message, Some(Self::NOT_SUPPORTED_ERR))
    }

    /// `SyntaxError`
    pub fn syntax_error(message: impl Into<String>) -> Self {
        Self::new("SyntaxError", message, Some(Self::SYNTAX_ERR))
    }

    /// `NetworkError`
    pub fn network_error(message: impl Into<String>) -> Self {
        Self::new("NetworkError", message, Some(Self::NETWORK_ERR))
    }

    /// `TypeError`, which carries no code
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new("TypeError", message, None)
    }
}

impl fmt::Display for DomException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for DomException {}
