//! Error taxonomy for capture and replay.
//!
//! Engine-internal failures are never recovered locally. They indicate a
//! structurally invalid session and propagate to whoever drove the
//! triggering call: a public engine method, a dispatch, or an event loop
//! step.

use crate::exception::DomException;

/// Result type used across the workspace
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Operation not valid in the current session state, or an event type
    /// with no plugin able to replay it
    #[error("Invalid state: {reason}")]
    InvalidState {
        /// What was attempted and why it is not allowed
        reason: String,
    },

    /// A structural path segment could not be resolved against the document
    #[error("Cannot resolve segment {segment}: {reason}")]
    Resolution {
        /// The offending segment as written in the log
        segment: String,
        /// Why it did not resolve
        reason: String,
    },

    /// No synthetic event creator for this interface
    #[error("No event creator for DOM event of type \"{name}\"")]
    UnsupportedInterface {
        /// Interface name found in the log
        name: String,
    },

    /// A recorded sequence ran out during replay
    #[error("Recorded {stream} exhausted during replay")]
    Exhausted {
        /// Which sequence ran out
        stream: String,
    },

    /// Platform exception visible to application code. During replay this
    /// is the recorded exception re-raised verbatim.
    #[error("{0}")]
    Exception(DomException),

    /// Log or configuration could not be encoded or decoded
    #[error("Encoding error: {message}")]
    Encoding {
        /// Decoder message
        message: String,
    },
}

impl EngineError {
    /// Build an [`EngineError::InvalidState`]
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState {
            reason: reason.into(),
        }
    }

    /// Build an [`EngineError::Resolution`]
    pub fn resolution(segment: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolution {
            segment: segment.into(),
            reason: reason.into(),
        }
    }

    /// Build an [`EngineError::Exhausted`]
    pub fn exhausted(stream: impl Into<String>) -> Self {
        Self::Exhausted {
            stream: stream.into(),
        }
    }

    /// The platform exception carried by this error, if any
    #[must_use]
    pub fn as_exception(&self) -> Option<&DomException> {
        match self {
            Self::Exception(exception) => Some(exception),
            _ => None,
        }
    }
}

impl From<DomException> for EngineError {
    fn from(exception: DomException) -> Self {
        Self::Exception(exception)
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encoding {
            message: err.to_string(),
        }
    }
}
