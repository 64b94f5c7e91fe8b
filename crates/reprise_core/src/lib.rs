//! REPRISE Core Types
//!
//! Pure types shared by every crate in the workspace: the error taxonomy,
//! recorded platform exceptions, timestamps, identifiers and session
//! configuration. No I/O and no platform access.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod exception;
pub mod id;
pub mod time;

// Re-exports
pub use config::{CaptureConfig, Delay, ReplayConfig};
pub use error::{EngineError, EngineResult};
pub use exception::DomException;
pub use id::{IdAllocator, RequestId, TimerId};
pub use time::Timestamp;
