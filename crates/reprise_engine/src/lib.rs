//! REPRISE Engine
//!
//! Captures a page's non-deterministic inputs into a log and substitutes
//! them on a later run. Each source is owned by one plugin:
//! - `date`, `random`: clock reads and random draws
//! - `setTimeout`, `setInterval`: timer firings
//! - `dom`, `window`, `document-create-event`: user events
//! - `dom-content-loaded`: the page-load signal
//! - `xhr`: request outcomes and state changes
//! - `local-storage`: storage contents

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod plugin;
pub mod plugins;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod util;

pub use context::{
    ActiveLog, CaptureContext, NativeRefs, ReplayContext, ReplayCursors, SessionLog,
};
pub use plugin::{Completion, Hook, Plugin, require_natives};
pub use registry::{PluginRegistry, SharedPlugin};
pub use scheduler::{Continuation, Scheduler};
pub use session::{Engine, SessionState};

pub use reprise_core::{CaptureConfig, Delay, EngineError, EngineResult, ReplayConfig};
pub use reprise_log::Log;
