//! `Date` interception.
//!
//! Ambient time reads are the static `now`, zero-argument construction and
//! the function-call form. Construction from explicit arguments is not a
//! read of the environment and passes through untouched.

use crate::context::{CaptureContext, NativeRefs, ReplayContext, ReplayCursors, SessionLog};
use crate::plugin::{Hook, Plugin, require_natives};
use reprise_core::{EngineResult, Timestamp};
use reprise_host::{Date, DateApi, DateArgs};
use std::rc::Rc;
use tracing::trace;

/// Records and replays ambient clock reads
pub struct DatePlugin {
    natives: Option<NativeRefs>,
    hook: Hook<dyn DateApi>,
}

impl DatePlugin {
    /// Create the plugin
    #[must_use]
    pub fn new() -> Self {
        Self {
            natives: None,
            hook: Hook::new("Date"),
        }
    }
}

impl Default for DatePlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for DatePlugin {
    fn init(&mut self, natives: &NativeRefs) -> EngineResult<()> {
        self.natives = Some(natives.clone());
        Ok(())
    }

    fn capture(&mut self, cx: &CaptureContext) -> EngineResult<()> {
        let slot = &cx.window.globals().date;
        let wrapper = Rc::new(CapturingDate {
            inner: slot.get(),
            log: cx.log.clone(),
        });
        self.hook.install(slot, wrapper);
        Ok(())
    }

    fn before_replay(&mut self, cx: &ReplayContext) -> EngineResult<()> {
        let slot = &cx.window.globals().date;
        let wrapper = Rc::new(ReplayingDate {
            inner: slot.get(),
            cursors: cx.cursors.clone(),
        });
        self.hook.install(slot, wrapper);
        Ok(())
    }

    fn clean_up(&mut self) -> EngineResult<()> {
        let natives = require_natives(&self.natives)?;
        self.hook.uninstall(&natives.window.globals().date);
        Ok(())
    }
}

struct CapturingDate {
    inner: Rc<dyn DateApi>,
    log: SessionLog,
}

impl CapturingDate {
    fn push(&self, time: Timestamp) -> EngineResult<()> {
        if !self.log.is_live() {
            return Ok(());
        }
        trace!(%time, "captured clock read");
        self.log.record(|log| log.dates.push(time))
    }
}

impl DateApi for CapturingDate {
    fn now(&self) -> EngineResult<Timestamp> {
        let time = self.inner.now()?;
        self.push(time)?;
        Ok(time)
    }

    fn construct(&self, args: DateArgs) -> EngineResult<Date> {
        let ambient = matches!(args, DateArgs::Now);
        let date = self.inner.construct(args)?;
        if ambient {
            if let Some(time) = date.time() {
                self.push(time)?;
            }
        }
        Ok(date)
    }

    fn call(&self) -> EngineResult<String> {
        Ok(self.construct(DateArgs::Now)?.to_string())
    }
}

struct ReplayingDate {
    inner: Rc<dyn DateApi>,
    cursors: ReplayCursors,
}

impl DateApi for ReplayingDate {
    fn now(&self) -> EngineResult<Timestamp> {
        self.cursors.next_date()
    }

    fn construct(&self, args: DateArgs) -> EngineResult<Date> {
        match args {
            DateArgs::Now => Ok(Date::from_timestamp(self.cursors.next_date()?)),
            explicit => self.inner.construct(explicit),
        }
    }

    fn call(&self) -> EngineResult<String> {
        Ok(self.construct(DateArgs::Now)?.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Engine;
    use reprise_core::{CaptureConfig, EngineError, ReplayConfig};
    use reprise_host::{DateComponents, PlatformConfig, Window};
    use reprise_log::kind;

    fn plugged(window: &Window) -> Engine {
        let mut engine = Engine::bare(window);
        engine.plug("date", DatePlugin::new()).unwrap();
        engine
    }

    #[test]
    fn test_only_ambient_reads_are_logged() {
        let window = Window::new(PlatformConfig::default().with_epoch(Timestamp::from_millis(1_000)));
        let mut engine = plugged(&window);
        engine.capture(CaptureConfig::default()).unwrap();

        let date = window.date();
        assert_eq!(date.now().unwrap(), Timestamp::from_millis(1_000));
        let explicit = date.construct(DateArgs::Millis(5)).unwrap();
        assert_eq!(explicit.time(), Some(Timestamp::from_millis(5)));
        date.construct(DateArgs::Components(DateComponents {
            year: 2013,
            ..DateComponents::default()
        }))
        .unwrap();
        window.run_for(10).unwrap();
        date.construct(DateArgs::Now).unwrap();
        date.call().unwrap();

        let log = engine.flush().unwrap();
        assert_eq!(
            log.dates,
            vec![
                Timestamp::from_millis(1_000),
                Timestamp::from_millis(1_010),
                Timestamp::from_millis(1_010),
            ]
        );
        assert!(log.events.iter().all(|e| e.kind != kind::DOM));
    }

    #[test]
    fn test_replay_returns_recorded_reads() {
        let window = Window::default();
        let mut engine = plugged(&window);
        let mut log = reprise_log::Log::new();
        log.dates = vec![Timestamp::from_millis(42), Timestamp::from_millis(1_357_000_000_000)];
        engine.replay(log, ReplayConfig::default()).unwrap();

        let date = window.date();
        assert_eq!(date.now().unwrap(), Timestamp::from_millis(42));
        assert_eq!(
            date.construct(DateArgs::Millis(7)).unwrap().time(),
            Some(Timestamp::from_millis(7))
        );
        assert_eq!(
            date.call().unwrap(),
            "Tue Jan 01 2013 00:26:40 GMT+0000 (Coordinated Universal Time)"
        );
        assert!(matches!(date.now(), Err(EngineError::Exhausted { .. })));
    }

    #[test]
    fn test_clean_up_restores_native() {
        let window = Window::default();
        let native = window.date();
        let mut engine = plugged(&window);
        engine.capture(CaptureConfig::default()).unwrap();
        assert!(!window.globals().date.holds(&native));

        engine.clean_up().unwrap();
        assert!(window.globals().date.holds(&native));
    }

    #[test]
    fn test_held_wrapper_stops_recording_after_clean_up() {
        let window = Window::default();
        let mut engine = plugged(&window);
        engine.capture(CaptureConfig::default()).unwrap();
        let held = window.date();
        held.now().unwrap();
        engine.clean_up().unwrap();

        held.now().unwrap();
        held.construct(DateArgs::Now).unwrap();
        assert_eq!(engine.flush().unwrap().dates.len(), 1);
    }
}
