//! REPRISE Capture Log
//!
//! The recorded trace of one capture session: ambient time reads, random
//! draws, fired callbacks, asynchronous request outcomes and the storage
//! snapshot. The log is plain data and round-trips through JSON.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cursor;
pub mod encoding;
pub mod entry;
pub mod log;
pub mod storage;
pub mod xhr;

pub use cursor::{Cursor, ReplayLog};
pub use encoding::LOG_FORMAT_VERSION;
pub use entry::{DomDetails, Entry, PageLoadDetails, TimerDetails, XhrDetails, kind};
pub use log::Log;
pub use storage::{StorageItem, StorageLog};
pub use xhr::{InterfaceDescriptor, Outcome, XhrLog, XhrRecord};
