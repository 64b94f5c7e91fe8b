//! `setTimeout` / `setInterval` interception.
//!
//! Each primitive has its own id space, allocated from 0 in call order.
//! Capture logs a timer when the platform fires it, so cleared timers
//! never reach the log. Replay holds callbacks by id and only runs them
//! when the scheduler reaches their entries.

use crate::context::{CaptureContext, NativeRefs, ReplayContext, SessionLog};
use crate::plugin::{Completion, Hook, Plugin, require_natives};
use crate::scheduler::Continuation;
use indexmap::IndexMap;
use reprise_core::{EngineError, EngineResult, IdAllocator, TimerId};
use reprise_host::{DateApi, TimerApi, TimerCallback};
use reprise_log::{Entry, TimerDetails, kind};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::trace;

/// Which timer primitive a plugin owns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// `setTimeout`
    Timeout,
    /// `setInterval`
    Interval,
}

impl TimerKind {
    /// Entry type logged for this primitive
    #[must_use]
    pub const fn entry_kind(&self) -> &'static str {
        match self {
            Self::Timeout => kind::SET_TIMEOUT,
            Self::Interval => kind::SET_INTERVAL,
        }
    }
}

type Callbacks = Rc<RefCell<IndexMap<TimerId, TimerCallback>>>;

/// Records and replays one timer primitive
pub struct TimerPlugin {
    kind: TimerKind,
    natives: Option<NativeRefs>,
    hook: Hook<dyn TimerApi>,
    callbacks: Callbacks,
}

impl TimerPlugin {
    /// Plugin for `kind`
    #[must_use]
    pub fn new(kind: TimerKind) -> Self {
        Self {
            kind,
            natives: None,
            hook: Hook::new(kind.entry_kind()),
            callbacks: Rc::new(RefCell::new(IndexMap::new())),
        }
    }

    /// `setTimeout` plugin
    #[must_use]
    pub fn timeout() -> Self {
        Self::new(TimerKind::Timeout)
    }

    /// `setInterval` plugin
    #[must_use]
    pub fn interval() -> Self {
        Self::new(TimerKind::Interval)
    }
}

impl Plugin for TimerPlugin {
    fn init(&mut self, natives: &NativeRefs) -> EngineResult<()> {
        self.natives = Some(natives.clone());
        Ok(())
    }

    fn capture(&mut self, cx: &CaptureContext) -> EngineResult<()> {
        let natives = require_natives(&self.natives)?;
        let slot = &cx.window.globals().timers;
        let wrapper = Rc::new(CapturingTimers {
            kind: self.kind,
            inner: slot.get(),
            clock: Rc::clone(&natives.date),
            log: cx.log.clone(),
            ids: IdAllocator::new(),
        });
        self.hook.install(slot, wrapper);
        Ok(())
    }

    fn before_replay(&mut self, cx: &ReplayContext) -> EngineResult<()> {
        self.callbacks = Rc::new(RefCell::new(IndexMap::new()));
        let slot = &cx.window.globals().timers;
        let wrapper = Rc::new(ReplayingTimers {
            kind: self.kind,
            inner: slot.get(),
            callbacks: Rc::clone(&self.callbacks),
            ids: IdAllocator::new(),
        });
        self.hook.install(slot, wrapper);
        Ok(())
    }

    fn replay(&mut self, entry: &Entry, _step: Continuation) -> EngineResult<Completion> {
        let natives = require_natives(&self.natives)?;
        let TimerDetails { id } = entry.details_as()?;
        let callback = {
            let mut callbacks = self
                .callbacks
                .try_borrow_mut()
                .map_err(|_| EngineError::invalid_state("timer callbacks are busy"))?;
            match self.kind {
                TimerKind::Timeout => callbacks.shift_remove(&id),
                TimerKind::Interval => callbacks.get(&id).map(Rc::clone),
            }
        }
        .ok_or_else(|| {
            EngineError::invalid_state(format!(
                "no {} callback registered for {}",
                self.kind.entry_kind(),
                id
            ))
        })?;

        natives.timers.set_timeout(callback, 0)?;
        Ok(Completion::Done)
    }

    fn clean_up(&mut self) -> EngineResult<()> {
        let natives = require_natives(&self.natives)?;
        self.hook.uninstall(&natives.window.globals().timers);
        self.callbacks
            .try_borrow_mut()
            .map_err(|_| EngineError::invalid_state("timer callbacks are busy"))?
            .clear();
        Ok(())
    }
}

struct CapturingTimers {
    kind: TimerKind,
    inner: Rc<dyn TimerApi>,
    clock: Rc<dyn DateApi>,
    log: SessionLog,
    ids: IdAllocator,
}

impl CapturingTimers {
    fn wrap(&self, callback: TimerCallback) -> TimerCallback {
        let id = TimerId::from_raw(self.ids.allocate());
        let entry_kind = self.kind.entry_kind();
        let clock = Rc::clone(&self.clock);
        let log = self.log.clone();
        trace!(%id, kind = entry_kind, "wrapped timer");
        Rc::new(move || {
            if log.is_live() {
                let entry = Entry::with_details(entry_kind, clock.now()?, &TimerDetails { id })?;
                log.push_event(entry)?;
            }
            callback()
        })
    }
}

impl TimerApi for CapturingTimers {
    fn set_timeout(&self, callback: TimerCallback, delay: u64) -> EngineResult<TimerId> {
        match self.kind {
            TimerKind::Timeout => self.inner.set_timeout(self.wrap(callback), delay),
            TimerKind::Interval => self.inner.set_timeout(callback, delay),
        }
    }

    fn set_interval(&self, callback: TimerCallback, delay: u64) -> EngineResult<TimerId> {
        match self.kind {
            TimerKind::Interval => self.inner.set_interval(self.wrap(callback), delay),
            TimerKind::Timeout => self.inner.set_interval(callback, delay),
        }
    }

    fn clear_timeout(&self, id: TimerId) -> EngineResult<()> {
        self.inner.clear_timeout(id)
    }

    fn clear_interval(&self, id: TimerId) -> EngineResult<()> {
        self.inner.clear_interval(id)
    }
}

struct ReplayingTimers {
    kind: TimerKind,
    inner: Rc<dyn TimerApi>,
    callbacks: Callbacks,
    ids: IdAllocator,
}

impl ReplayingTimers {
    fn hold(&self, callback: TimerCallback) -> EngineResult<TimerId> {
        let id = TimerId::from_raw(self.ids.allocate());
        self.callbacks
            .try_borrow_mut()
            .map_err(|_| EngineError::invalid_state("timer callbacks are busy"))?
            .insert(id, callback);
        Ok(id)
    }
}

impl TimerApi for ReplayingTimers {
    fn set_timeout(&self, callback: TimerCallback, delay: u64) -> EngineResult<TimerId> {
        match self.kind {
            TimerKind::Timeout => self.hold(callback),
            TimerKind::Interval => self.inner.set_timeout(callback, delay),
        }
    }

    fn set_interval(&self, callback: TimerCallback, delay: u64) -> EngineResult<TimerId> {
        match self.kind {
            TimerKind::Interval => self.hold(callback),
            TimerKind::Timeout => self.inner.set_interval(callback, delay),
        }
    }

    fn clear_timeout(&self, id: TimerId) -> EngineResult<()> {
        match self.kind {
            TimerKind::Timeout => Ok(()),
            TimerKind::Interval => self.inner.clear_timeout(id),
        }
    }

    fn clear_interval(&self, id: TimerId) -> EngineResult<()> {
        match self.kind {
            TimerKind::Interval => Ok(()),
            TimerKind::Timeout => self.inner.clear_interval(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Engine;
    use reprise_core::{CaptureConfig, ReplayConfig};
    use reprise_host::Window;

    fn plugged(window: &Window) -> Engine {
        let mut engine = Engine::bare(window);
        engine.plug(kind::SET_TIMEOUT, TimerPlugin::timeout()).unwrap();
        engine.plug(kind::SET_INTERVAL, TimerPlugin::interval()).unwrap();
        engine
    }

    fn schedule(window: &Window, fired: &Rc<RefCell<Vec<u32>>>, delays: &[(u32, u64)]) -> Vec<TimerId> {
        delays
            .iter()
            .map(|(label, delay)| {
                let fired = Rc::clone(fired);
                let label = *label;
                window
                    .timers()
                    .set_timeout(
                        Rc::new(move || {
                            fired.borrow_mut().push(label);
                            Ok(())
                        }),
                        *delay,
                    )
                    .unwrap()
            })
            .collect()
    }

    fn logged_ids(log: &reprise_log::Log) -> Vec<u64> {
        log.events
            .iter()
            .map(|e| e.details_as::<TimerDetails>().unwrap().id.as_u64())
            .collect()
    }

    #[test]
    fn test_timers_replay_in_fired_order() {
        let window = Window::default();
        let mut engine = plugged(&window);
        let fired = Rc::new(RefCell::new(Vec::new()));

        engine.capture(CaptureConfig::default()).unwrap();
        schedule(&window, &fired, &[(0, 10), (1, 30), (2, 20)]);
        window.run_until_idle().unwrap();
        engine.clean_up().unwrap();
        let log = engine.flush().unwrap();
        assert_eq!(*fired.borrow(), vec![0, 2, 1]);
        assert_eq!(logged_ids(&log), vec![0, 2, 1]);

        let replay_window = Window::default();
        let mut replayer = plugged(&replay_window);
        let replayed = Rc::new(RefCell::new(Vec::new()));
        replayer.replay(log, ReplayConfig::default()).unwrap();
        schedule(&replay_window, &replayed, &[(0, 10), (1, 30), (2, 20)]);
        replay_window.run_until_idle().unwrap();
        assert_eq!(*replayed.borrow(), vec![0, 2, 1]);
        assert!(replayer.is_replay_finished());
    }

    #[test]
    fn test_cleared_timer_is_never_logged() {
        let window = Window::default();
        let mut engine = plugged(&window);
        let fired = Rc::new(RefCell::new(Vec::new()));

        engine.capture(CaptureConfig::default()).unwrap();
        let ids = schedule(&window, &fired, &[(0, 10), (1, 20)]);
        window.timers().clear_timeout(ids[0]).unwrap();
        window.run_until_idle().unwrap();

        let log = engine.flush().unwrap();
        assert_eq!(*fired.borrow(), vec![1]);
        assert_eq!(logged_ids(&log), vec![1]);
    }

    #[test]
    fn test_timer_firing_after_clean_up_not_logged() {
        let window = Window::default();
        let mut engine = plugged(&window);
        let fired = Rc::new(RefCell::new(Vec::new()));

        engine.capture(CaptureConfig::default()).unwrap();
        schedule(&window, &fired, &[(0, 10), (1, 50)]);
        window.run_for(20).unwrap();
        engine.clean_up().unwrap();
        window.run_until_idle().unwrap();

        assert_eq!(*fired.borrow(), vec![0, 1]);
        assert_eq!(logged_ids(&engine.flush().unwrap()), vec![0]);
    }

    #[test]
    fn test_interval_entries_reuse_callback() {
        let window = Window::default();
        let mut engine = plugged(&window);
        let ticks = Rc::new(RefCell::new(0u32));

        engine.capture(CaptureConfig::default()).unwrap();
        let t = Rc::clone(&ticks);
        let id = window
            .timers()
            .set_interval(
                Rc::new(move || {
                    *t.borrow_mut() += 1;
                    Ok(())
                }),
                10,
            )
            .unwrap();
        window.run_for(35).unwrap();
        window.timers().clear_interval(id).unwrap();
        engine.clean_up().unwrap();
        let log = engine.flush().unwrap();
        assert_eq!(log.events.len(), 3);
        assert!(log.events.iter().all(|e| e.kind == kind::SET_INTERVAL));

        let replay_window = Window::default();
        let mut replayer = plugged(&replay_window);
        let replayed = Rc::new(RefCell::new(0u32));
        replayer.replay(log, ReplayConfig::default()).unwrap();
        let r = Rc::clone(&replayed);
        replay_window
            .timers()
            .set_interval(
                Rc::new(move || {
                    *r.borrow_mut() += 1;
                    Ok(())
                }),
                10,
            )
            .unwrap();
        replay_window.run_until_idle().unwrap();
        assert_eq!(*replayed.borrow(), 3);
    }

    #[test]
    fn test_replay_clear_is_noop() {
        let window = Window::default();
        let mut engine = plugged(&window);
        let mut log = reprise_log::Log::new();
        log.push_event(
            Entry::with_details(
                kind::SET_TIMEOUT,
                reprise_core::Timestamp::zero(),
                &TimerDetails {
                    id: TimerId::from_raw(0),
                },
            )
            .unwrap(),
        );
        engine.replay(log, ReplayConfig::default()).unwrap();

        let fired = Rc::new(RefCell::new(Vec::new()));
        let ids = schedule(&window, &fired, &[(7, 50)]);
        window.timers().clear_timeout(ids[0]).unwrap();
        window.run_until_idle().unwrap();
        assert_eq!(*fired.borrow(), vec![7]);
    }
}
