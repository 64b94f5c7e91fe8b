//! Session controller.
//!
//! An [`Engine`] owns the plugins for one window and moves them through
//! capture and replay sessions. The log survives `clean_up` so it can still
//! be flushed afterwards.

use crate::context::{CaptureContext, NativeRefs, ReplayContext, ReplayCursors, SessionLog};
use crate::plugin::Plugin;
use crate::plugins::{
    CreateEventPlugin, DatePlugin, DomPlugin, PageLoadPlugin, RandomPlugin, StoragePlugin,
    TimerPlugin, WindowPlugin, XhrPlugin,
};
use crate::registry::{PluginRegistry, SharedPlugin};
use crate::scheduler::Scheduler;
use reprise_core::config::DEFAULT_BOOKKEEPING_PREFIX;
use reprise_core::{CaptureConfig, EngineError, EngineResult, ReplayConfig};
use reprise_host::Window;
use reprise_log::{LOG_FORMAT_VERSION, Log, kind};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Where the engine is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No interception installed
    #[default]
    Idle,
    /// Recording
    Capturing,
    /// Substituting a recorded log
    Replaying,
}

/// Capture/replay controller for one window
pub struct Engine {
    window: Window,
    natives: NativeRefs,
    registry: Rc<RefCell<PluginRegistry>>,
    state: SessionState,
    log: Option<SessionLog>,
    capture_cx: Option<CaptureContext>,
    replay_cx: Option<ReplayContext>,
    scheduler: Option<Scheduler>,
    bookkeeping_prefix: String,
}

impl Engine {
    /// Engine with the built-in plugins
    ///
    /// # Errors
    ///
    /// Returns error if a built-in plugin rejects the window
    pub fn new(window: &Window) -> EngineResult<Self> {
        let mut engine = Self::bare(window);
        engine.plug("date", DatePlugin::new())?;
        engine.plug("random", RandomPlugin::new())?;
        engine.plug(kind::SET_TIMEOUT, TimerPlugin::timeout())?;
        engine.plug(kind::SET_INTERVAL, TimerPlugin::interval())?;
        engine.plug("document-create-event", CreateEventPlugin::new())?;
        engine.plug(kind::DOM_CONTENT_LOADED, PageLoadPlugin::new())?;
        engine.plug("window", WindowPlugin::new())?;
        engine.plug(kind::DOM, DomPlugin::new())?;
        engine.plug(kind::XHR, XhrPlugin::new())?;
        engine.plug("local-storage", StoragePlugin::new())?;
        Ok(engine)
    }

    /// Engine with no plugins
    ///
    /// The window's current slot values are taken as the natives.
    #[must_use]
    pub fn bare(window: &Window) -> Self {
        Self {
            window: window.clone(),
            natives: NativeRefs::snapshot(window),
            registry: Rc::new(RefCell::new(PluginRegistry::new())),
            state: SessionState::Idle,
            log: None,
            capture_cx: None,
            replay_cx: None,
            scheduler: None,
            bookkeeping_prefix: DEFAULT_BOOKKEEPING_PREFIX.to_string(),
        }
    }

    /// The page
    #[must_use]
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Registered plugin types in registration order
    #[must_use]
    pub fn plugin_kinds(&self) -> Vec<String> {
        self.registry
            .try_borrow()
            .map(|r| r.kinds())
            .unwrap_or_default()
    }

    /// Whether every recorded entry has been replayed
    #[must_use]
    pub fn is_replay_finished(&self) -> bool {
        self.scheduler.as_ref().is_none_or(Scheduler::is_finished)
    }

    /// Register `plugin` under `kind`
    ///
    /// The plugin joins a running session immediately.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if `kind` is taken, and any error from the
    /// plugin's hooks
    pub fn plug<P: Plugin + 'static>(&mut self, kind: &str, mut plugin: P) -> EngineResult<()> {
        if self.registry()?.contains(kind) {
            return Err(EngineError::invalid_state(format!(
                "a plugin is already registered for \"{}\"",
                kind
            )));
        }
        plugin.init(&self.natives)?;
        let shared: SharedPlugin = Rc::new(RefCell::new(plugin));
        self.registry
            .try_borrow_mut()
            .map_err(|_| EngineError::invalid_state("plugin registry is busy"))?
            .register(kind, Rc::clone(&shared))?;
        debug!(kind, "plugged");

        match self.state {
            SessionState::Idle => Ok(()),
            SessionState::Capturing => match &self.capture_cx {
                Some(cx) => borrow_plugin(kind, &shared)?.capture(cx),
                None => Ok(()),
            },
            SessionState::Replaying => match &self.replay_cx {
                Some(cx) => borrow_plugin(kind, &shared)?.before_replay(cx),
                None => Ok(()),
            },
        }
    }

    /// Start recording into a fresh log
    ///
    /// A capture already in progress is cleaned up first.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` while replaying, and any error a plugin raises
    /// while installing
    pub fn capture(&mut self, config: CaptureConfig) -> EngineResult<()> {
        match self.state {
            SessionState::Replaying => {
                return Err(EngineError::invalid_state("Cannot capture while replaying"));
            }
            SessionState::Capturing => self.clean_up()?,
            SessionState::Idle => {}
        }

        let log = SessionLog::new(Log::new());
        let cx = CaptureContext {
            window: self.window.clone(),
            log: log.clone(),
            config,
        };
        self.bookkeeping_prefix = cx.config.bookkeeping_prefix.clone();
        self.log = Some(log);
        self.capture_cx = Some(cx.clone());
        self.state = SessionState::Capturing;

        let plugins = self.registry()?.plugins();
        for (kind, plugin) in plugins {
            borrow_plugin(&kind, &plugin)?.capture(&cx)?;
        }
        info!(plugins = self.plugin_kinds().len(), "capture started");
        Ok(())
    }

    /// Substitute `log` for the page's inputs
    ///
    /// A replay already in progress is cleaned up first.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` while capturing, `Encoding` for a log written
    /// by a newer format, and any error a plugin raises while installing
    pub fn replay(&mut self, log: Log, config: ReplayConfig) -> EngineResult<()> {
        match self.state {
            SessionState::Capturing => {
                return Err(EngineError::invalid_state("Cannot replay while capturing"));
            }
            SessionState::Replaying => self.clean_up()?,
            SessionState::Idle => {}
        }
        if log.version > LOG_FORMAT_VERSION {
            return Err(EngineError::Encoding {
                message: format!(
                    "log format version {} is newer than supported version {}",
                    log.version, LOG_FORMAT_VERSION
                ),
            });
        }

        let has_events = !log.events.is_empty();
        let cursors = ReplayCursors::new(&log);
        let session_log = SessionLog::new(log);
        let cx = ReplayContext {
            window: self.window.clone(),
            log: session_log.clone(),
            cursors: cursors.clone(),
            config,
        };
        self.bookkeeping_prefix = cx.config.bookkeeping_prefix().to_string();
        self.log = Some(session_log);
        self.replay_cx = Some(cx.clone());
        self.state = SessionState::Replaying;

        let plugins = self.registry()?.plugins();
        for (kind, plugin) in plugins {
            borrow_plugin(&kind, &plugin)?.before_replay(&cx)?;
        }
        if has_events {
            self.scheduler = Some(Scheduler::start(
                Rc::clone(&self.natives.timers),
                Rc::clone(&self.natives.date),
                Rc::downgrade(&self.registry),
                cursors,
                cx.config.delay,
            )?);
        }
        info!(delay = ?cx.config.delay, scheduled = has_events, "replay started");
        Ok(())
    }

    /// Independent copy of the current log
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if no session has produced a log
    pub fn flush(&self) -> EngineResult<Log> {
        self.log
            .as_ref()
            .ok_or_else(|| EngineError::invalid_state("Must call capture before calling flush"))?
            .snapshot()
    }

    /// Uninstall every plugin and stop the replay
    ///
    /// Plugins unwind in reverse registration order. Every plugin is given
    /// the chance to clean up; the first failure is returned. The log is
    /// kept but closed, so wrappers the application still holds stop
    /// recording into it.
    ///
    /// # Errors
    ///
    /// Returns the first error a plugin raised
    pub fn clean_up(&mut self) -> EngineResult<()> {
        if let Some(log) = &self.log {
            log.close();
        }
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.deactivate();
        }
        let mut first_error = None;
        let plugins = self.registry()?.plugins();
        for (kind, plugin) in plugins.into_iter().rev() {
            let result = borrow_plugin(&kind, &plugin).and_then(|mut p| p.clean_up());
            if let Err(err) = result {
                warn!(kind = %kind, error = %err, "plugin clean-up failed");
                first_error.get_or_insert(err);
            }
        }
        let previous = std::mem::take(&mut self.state);
        self.capture_cx = None;
        self.replay_cx = None;
        if previous != SessionState::Idle {
            info!(?previous, "session cleaned up");
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Persist the current log under the bookkeeping key
    ///
    /// # Errors
    ///
    /// Returns error if there is no log or storage rejects the write
    pub fn store_log(&self) -> EngineResult<()> {
        let json = self.flush()?.to_json()?;
        self.natives.storage.set_item(&self.log_key(), &json)?;
        debug!(bytes = json.len(), "stored log");
        Ok(())
    }

    /// Log previously written by [`Engine::store_log`]
    ///
    /// # Errors
    ///
    /// Returns error if the stored document cannot be decoded
    pub fn load_stored_log(&self) -> EngineResult<Option<Log>> {
        self.natives
            .storage
            .get_item(&self.log_key())?
            .map(|json| Log::from_json(&json))
            .transpose()
    }

    fn log_key(&self) -> String {
        format!("{}log", self.bookkeeping_prefix)
    }

    fn registry(&self) -> EngineResult<std::cell::Ref<'_, PluginRegistry>> {
        self.registry
            .try_borrow()
            .map_err(|_| EngineError::invalid_state("plugin registry is busy"))
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.state)
            .field("plugins", &self.plugin_kinds())
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

fn borrow_plugin<'a>(
    kind: &str,
    plugin: &'a SharedPlugin,
) -> EngineResult<std::cell::RefMut<'a, dyn Plugin + 'static>> {
    plugin
        .try_borrow_mut()
        .map_err(|_| EngineError::invalid_state(format!("plugin \"{}\" is busy", kind)))
}
