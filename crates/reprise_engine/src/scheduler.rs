//! Replay scheduler.
//!
//! Pops recorded entries one at a time and hands each to the plugin that
//! logged it. The next tick is queued on the native timers only after the
//! current handler completes, so no entry starts before the previous one
//! has finished.

use crate::context::ReplayCursors;
use crate::plugin::{Completion, cannot_replay};
use crate::registry::PluginRegistry;
use reprise_core::{Delay, EngineError, EngineResult, Timestamp};
use reprise_host::{DateApi, TimerApi};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::{debug, info, warn};

struct SchedulerInner {
    active: Cell<bool>,
    finished: Cell<bool>,
    delay: Delay,
    timers: Rc<dyn TimerApi>,
    date: Rc<dyn DateApi>,
    registry: Weak<RefCell<PluginRegistry>>,
    cursors: ReplayCursors,
    /// Native time at which the previous tick was queued
    last_tick: Cell<Option<Timestamp>>,
    /// Delay requested for the previous tick
    expected: Cell<i64>,
    steps: Cell<u64>,
}

/// Drives one replay
///
/// Pending ticks only hold a weak handle; dropping the last `Scheduler`
/// stops the replay.
#[derive(Clone)]
#[must_use = "the replay stops once the scheduler is dropped"]
pub struct Scheduler {
    inner: Rc<SchedulerInner>,
}

impl Scheduler {
    /// Queue the first tick at zero delay
    ///
    /// # Errors
    ///
    /// Returns error if the native timers reject the tick
    #[must_use = "the replay stops once the scheduler is dropped"]
    pub fn start(
        timers: Rc<dyn TimerApi>,
        date: Rc<dyn DateApi>,
        registry: Weak<RefCell<PluginRegistry>>,
        cursors: ReplayCursors,
        delay: Delay,
    ) -> EngineResult<Self> {
        let inner = Rc::new(SchedulerInner {
            active: Cell::new(true),
            finished: Cell::new(false),
            delay,
            timers,
            date,
            registry,
            cursors,
            last_tick: Cell::new(None),
            expected: Cell::new(0),
            steps: Cell::new(0),
        });
        schedule(&inner, 0)?;
        debug!(?delay, "replay scheduler started");
        Ok(Self { inner })
    }

    /// Turn every pending tick into a no-op
    pub fn deactivate(&self) {
        self.inner.active.set(false);
    }

    /// Whether ticks still run
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Whether every entry has been replayed
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.inner.finished.get()
    }

    /// Entries replayed so far
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.inner.steps.get()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("active", &self.is_active())
            .field("finished", &self.is_finished())
            .field("delay", &self.inner.delay)
            .field("steps", &self.steps())
            .finish()
    }
}

/// Handle an asynchronous replay handler resumes when its work completes
///
/// Resuming advances the scheduler to the next entry. It may happen at most
/// once per entry.
pub struct Continuation {
    scheduler: Weak<SchedulerInner>,
    time: Timestamp,
    settled: Rc<Cell<bool>>,
}

impl Continuation {
    /// Capture time of the entry being replayed
    #[must_use]
    pub fn time(&self) -> Timestamp {
        self.time
    }

    /// Advance to the next entry
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if the entry already completed, and any error
    /// queuing the next tick
    pub fn resume(self) -> EngineResult<()> {
        if self.settled.replace(true) {
            return Err(EngineError::invalid_state(
                "replay step already completed",
            ));
        }
        match self.scheduler.upgrade() {
            Some(inner) if inner.active.get() => advance(&inner, self.time),
            _ => Ok(()),
        }
    }

    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self {
            scheduler: Weak::new(),
            time: Timestamp::zero(),
            settled: Rc::new(Cell::new(false)),
        }
    }
}

impl std::fmt::Debug for Continuation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Continuation")
            .field("time", &self.time)
            .field("settled", &self.settled.get())
            .finish()
    }
}

fn schedule(inner: &Rc<SchedulerInner>, delay: u64) -> EngineResult<()> {
    let weak = Rc::downgrade(inner);
    inner.timers.set_timeout(
        Rc::new(move || match weak.upgrade() {
            Some(inner) => tick(&inner),
            None => Ok(()),
        }),
        delay,
    )?;
    Ok(())
}

fn tick(inner: &Rc<SchedulerInner>) -> EngineResult<()> {
    if !inner.active.get() {
        warn!("dropping replay tick after clean-up");
        return Ok(());
    }
    let Some(entry) = inner.cursors.with(|c| c.events.pop())? else {
        finish(inner);
        return Ok(());
    };

    let registry = inner
        .registry
        .upgrade()
        .ok_or_else(|| EngineError::invalid_state("the engine has been dropped"))?;
    let plugin = registry
        .try_borrow()
        .map_err(|_| EngineError::invalid_state("plugin registry is busy"))?
        .get(&entry.kind)
        .ok_or_else(|| cannot_replay(&entry.kind))?;

    debug!(kind = %entry.kind, time = %entry.time, "replaying entry");
    let settled = Rc::new(Cell::new(false));
    let step = Continuation {
        scheduler: Rc::downgrade(inner),
        time: entry.time,
        settled: Rc::clone(&settled),
    };
    let completion = plugin
        .try_borrow_mut()
        .map_err(|_| EngineError::invalid_state(format!("plugin \"{}\" is busy", entry.kind)))?
        .replay(&entry, step)?;
    inner.steps.set(inner.steps.get() + 1);

    if completion == Completion::Done && !settled.replace(true) && inner.active.get() {
        advance(inner, entry.time)?;
    }
    Ok(())
}

fn advance(inner: &Rc<SchedulerInner>, current: Timestamp) -> EngineResult<()> {
    let Some(next) = inner.cursors.with(|c| c.events.peek().map(|e| e.time))? else {
        finish(inner);
        return Ok(());
    };

    let delay = match inner.delay {
        Delay::Immediate => 0,
        Delay::Fixed(ms) => ms,
        Delay::Realtime => {
            let now = inner.date.now()?;
            let mut delay = next.millis_since(current);
            if let Some(last) = inner.last_tick.get() {
                delay -= now.millis_since(last) - inner.expected.get();
            }
            inner.last_tick.set(Some(now));
            inner.expected.set(delay);
            u64::try_from(delay).unwrap_or(0)
        }
    };
    schedule(inner, delay)
}

fn finish(inner: &SchedulerInner) {
    inner.finished.set(true);
    inner.active.set(false);
    info!(steps = inner.steps.get(), "replay finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CaptureContext, NativeRefs};
    use crate::plugin::Plugin;
    use reprise_host::Window;
    use reprise_log::{Entry, Log};
    use serde_json::Value;

    struct Recorder {
        seen: Rc<RefCell<Vec<(String, Timestamp)>>>,
        window: Window,
        deferred: Rc<RefCell<Option<Continuation>>>,
    }

    impl Plugin for Recorder {
        fn init(&mut self, _natives: &NativeRefs) -> EngineResult<()> {
            Ok(())
        }

        fn capture(&mut self, _cx: &CaptureContext) -> EngineResult<()> {
            Ok(())
        }

        fn replay(&mut self, entry: &Entry, step: Continuation) -> EngineResult<Completion> {
            self.seen
                .borrow_mut()
                .push((entry.kind.clone(), self.window.now()));
            if entry.details == Value::from("wait") {
                *self.deferred.borrow_mut() = Some(step);
                return Ok(Completion::Deferred);
            }
            Ok(Completion::Done)
        }

        fn clean_up(&mut self) -> EngineResult<()> {
            Ok(())
        }
    }

    struct Fixture {
        window: Window,
        registry: Rc<RefCell<PluginRegistry>>,
        seen: Rc<RefCell<Vec<(String, Timestamp)>>>,
        deferred: Rc<RefCell<Option<Continuation>>>,
    }

    fn fixture() -> Fixture {
        let window = Window::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let deferred = Rc::new(RefCell::new(None));
        let registry = Rc::new(RefCell::new(PluginRegistry::new()));
        registry
            .borrow_mut()
            .register(
                "tick",
                Rc::new(RefCell::new(Recorder {
                    seen: Rc::clone(&seen),
                    window: window.clone(),
                    deferred: Rc::clone(&deferred),
                })),
            )
            .unwrap();
        Fixture {
            window,
            registry,
            seen,
            deferred,
        }
    }

    fn log_at(times: &[(i64, &str)]) -> Log {
        let mut log = Log::new();
        for (time, details) in times {
            log.push_event(Entry::new(
                "tick",
                Timestamp::from_millis(*time),
                Value::from(*details),
            ));
        }
        log
    }

    fn start(f: &Fixture, log: &Log, delay: Delay) -> Scheduler {
        Scheduler::start(
            f.window.timers(),
            f.window.date(),
            Rc::downgrade(&f.registry),
            ReplayCursors::new(log),
            delay,
        )
        .unwrap()
    }

    fn offsets(f: &Fixture, start: Timestamp) -> Vec<i64> {
        f.seen
            .borrow()
            .iter()
            .map(|(_, at)| at.millis_since(start))
            .collect()
    }

    #[test]
    fn test_fixed_delay_paces_entries() {
        let f = fixture();
        let begin = f.window.now();
        let scheduler = start(&f, &log_at(&[(0, ""), (5, ""), (9, "")]), Delay::Fixed(20));

        f.window.run_until_idle().unwrap();
        assert_eq!(offsets(&f, begin), vec![0, 20, 40]);
        assert!(scheduler.is_finished());
        assert_eq!(scheduler.steps(), 3);
    }

    #[test]
    fn test_realtime_reproduces_gaps() {
        let f = fixture();
        let begin = f.window.now();
        let scheduler = start(&f, &log_at(&[(100, ""), (130, ""), (180, "")]), Delay::Realtime);

        f.window.run_until_idle().unwrap();
        assert_eq!(offsets(&f, begin), vec![0, 30, 80]);
        assert!(scheduler.is_finished());
    }

    #[test]
    fn test_deferred_step_waits_for_resume() {
        let f = fixture();
        let scheduler = start(&f, &log_at(&[(0, "wait"), (1, "")]), Delay::Immediate);

        f.window.run_until_idle().unwrap();
        assert_eq!(f.seen.borrow().len(), 1);
        assert!(!scheduler.is_finished());

        let step = f.deferred.borrow_mut().take().unwrap();
        step.resume().unwrap();
        f.window.run_until_idle().unwrap();
        assert_eq!(f.seen.borrow().len(), 2);
        assert!(scheduler.is_finished());
    }

    #[test]
    fn test_deactivated_ticks_are_dropped() {
        let f = fixture();
        let scheduler = start(&f, &log_at(&[(0, ""), (1, "")]), Delay::Immediate);
        scheduler.deactivate();

        f.window.run_until_idle().unwrap();
        assert!(f.seen.borrow().is_empty());
    }

    #[test]
    fn test_unknown_kind_fails() {
        let f = fixture();
        let mut log = Log::new();
        log.push_event(Entry::new("mystery", Timestamp::zero(), Value::Null));
        let _scheduler = start(&f, &log, Delay::Immediate);

        let err = f.window.run_until_idle().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid state: Cannot replay event of type \"mystery\""
        );
    }

    #[test]
    fn test_continuation_resumes_once() {
        let step = Continuation::detached();
        let settled = Rc::clone(&step.settled);
        step.resume().unwrap();
        assert!(settled.get());
    }
}
