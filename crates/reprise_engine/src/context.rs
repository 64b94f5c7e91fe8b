//! Per-session handles passed to plugin hooks.
//!
//! Handles are cheap clones over shared state. Wrappers installed into the
//! window keep the log and cursor handles but never a strong window handle.
//! A log is closed when its session is cleaned up; wrappers that outlive the
//! session check it and pass through without recording.

use reprise_core::{CaptureConfig, EngineError, EngineResult, ReplayConfig, Timestamp};
use reprise_dom::{EventFactory, InterfaceRegistry};
use reprise_host::{
    DateApi, EventBinding, ListenerApi, MathApi, StorageApi, TimerApi, Window, XhrApi,
};
use reprise_log::{Entry, Log, ReplayLog, XhrRecord};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// The window's capabilities as they were before any interception
#[derive(Clone)]
pub struct NativeRefs {
    /// The page
    pub window: Window,
    /// `Date`
    pub date: Rc<dyn DateApi>,
    /// `Math.random`
    pub math: Rc<dyn MathApi>,
    /// Timers
    pub timers: Rc<dyn TimerApi>,
    /// `XMLHttpRequest`
    pub xhr: Rc<dyn XhrApi>,
    /// Listener entry point
    pub listeners: Rc<dyn ListenerApi>,
    /// Binding library
    pub binding: Rc<dyn EventBinding>,
    /// `document.createEvent`
    pub event_factory: Rc<dyn EventFactory>,
    /// `localStorage`
    pub storage: Rc<dyn StorageApi>,
    /// Interfaces `event_factory` allocates natively
    pub interfaces: Rc<InterfaceRegistry>,
}

impl NativeRefs {
    /// Snapshot the current slot values of `window`
    #[must_use]
    pub fn snapshot(window: &Window) -> Self {
        let event_factory = window.event_factory();
        let interfaces = Rc::new(InterfaceRegistry::detect(&*event_factory));
        Self {
            window: window.clone(),
            date: window.date(),
            math: window.math(),
            timers: window.timers(),
            xhr: window.xhr(),
            listeners: window.listener_api(),
            binding: window.binding(),
            event_factory,
            storage: window.storage(),
            interfaces,
        }
    }
}

impl std::fmt::Debug for NativeRefs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeRefs")
            .field("interfaces", &self.interfaces)
            .finish_non_exhaustive()
    }
}

/// Shared handle to the session's log
#[derive(Clone, Debug)]
pub struct SessionLog {
    log: Rc<RefCell<Log>>,
    live: Rc<Cell<bool>>,
}

impl SessionLog {
    /// Wrap a log for a new session
    #[must_use]
    pub fn new(log: Log) -> Self {
        Self {
            log: Rc::new(RefCell::new(log)),
            live: Rc::new(Cell::new(true)),
        }
    }

    /// Whether the session that owns this log is still running
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.get()
    }

    /// End the session. The log stays readable.
    pub fn close(&self) {
        self.live.set(false);
    }

    /// Mutate the log
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` on re-entrant access
    pub fn record<R>(&self, f: impl FnOnce(&mut Log) -> R) -> EngineResult<R> {
        let mut log = self
            .log
            .try_borrow_mut()
            .map_err(|_| EngineError::invalid_state("the log is already in use"))?;
        Ok(f(&mut log))
    }

    /// Read the log
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` while the log is being mutated
    pub fn read<R>(&self, f: impl FnOnce(&Log) -> R) -> EngineResult<R> {
        let log = self
            .log
            .try_borrow()
            .map_err(|_| EngineError::invalid_state("the log is being written"))?;
        Ok(f(&log))
    }

    /// Append an event entry
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` on re-entrant access
    pub fn push_event(&self, entry: Entry) -> EngineResult<()> {
        self.record(|log| log.push_event(entry))
    }

    /// Independent deep copy
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` while the log is being mutated
    pub fn snapshot(&self) -> EngineResult<Log> {
        self.read(Log::clone)
    }
}

/// The log of whichever capture is running
///
/// Held by wrappers that survive across sessions, such as handlers bound
/// through the binding library, so they record into the current capture
/// and stay silent between sessions.
#[derive(Clone, Debug, Default)]
pub struct ActiveLog {
    current: Rc<RefCell<Option<SessionLog>>>,
}

impl ActiveLog {
    /// Handle with no capture attached
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Route recording to `log`
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` on re-entrant access
    pub fn attach(&self, log: SessionLog) -> EngineResult<()> {
        *self.slot()? = Some(log);
        Ok(())
    }

    /// Stop recording
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` on re-entrant access
    pub fn detach(&self) -> EngineResult<()> {
        *self.slot()? = None;
        Ok(())
    }

    /// The attached log, if its session is still running
    #[must_use]
    pub fn get(&self) -> Option<SessionLog> {
        self.current
            .try_borrow()
            .ok()?
            .as_ref()
            .filter(|log| log.is_live())
            .cloned()
    }

    fn slot(&self) -> EngineResult<std::cell::RefMut<'_, Option<SessionLog>>> {
        self.current
            .try_borrow_mut()
            .map_err(|_| EngineError::invalid_state("the active log is in use"))
    }
}

/// Shared handle to the reversed working copies of a replay
#[derive(Clone, Debug)]
pub struct ReplayCursors {
    cursors: Rc<RefCell<ReplayLog>>,
}

impl ReplayCursors {
    /// Working copies of `log`
    #[must_use]
    pub fn new(log: &Log) -> Self {
        Self {
            cursors: Rc::new(RefCell::new(ReplayLog::from_log(log))),
        }
    }

    /// Access the cursors
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` on re-entrant access
    pub fn with<R>(&self, f: impl FnOnce(&mut ReplayLog) -> R) -> EngineResult<R> {
        let mut cursors = self
            .cursors
            .try_borrow_mut()
            .map_err(|_| EngineError::invalid_state("replay cursors are already in use"))?;
        Ok(f(&mut cursors))
    }

    /// Next recorded clock read
    ///
    /// # Errors
    ///
    /// Returns `Exhausted` when no reads remain
    pub fn next_date(&self) -> EngineResult<Timestamp> {
        self.with(|c| c.dates.pop_or_exhausted("dates"))?
    }

    /// Next recorded random draw
    ///
    /// # Errors
    ///
    /// Returns `Exhausted` when no draws remain
    pub fn next_random(&self) -> EngineResult<f64> {
        self.with(|c| c.random.pop_or_exhausted("random"))?
    }

    /// Next recorded request
    ///
    /// # Errors
    ///
    /// Returns `Exhausted` when no requests remain
    pub fn next_xhr(&self) -> EngineResult<XhrRecord> {
        self.with(|c| c.xhr.pop_or_exhausted("xhr instances"))?
    }
}

/// Handed to [`Plugin::capture`](crate::Plugin::capture)
#[derive(Clone, Debug)]
pub struct CaptureContext {
    /// The page
    pub window: Window,
    /// Log being recorded
    pub log: SessionLog,
    /// Capture settings
    pub config: CaptureConfig,
}

/// Handed to [`Plugin::before_replay`](crate::Plugin::before_replay)
#[derive(Clone, Debug)]
pub struct ReplayContext {
    /// The page
    pub window: Window,
    /// The installed log
    pub log: SessionLog,
    /// Working copies consumed by the replay
    pub cursors: ReplayCursors,
    /// Replay settings
    pub config: ReplayConfig,
}
