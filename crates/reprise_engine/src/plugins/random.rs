//! `Math.random` interception.

use crate::context::{CaptureContext, NativeRefs, ReplayContext, ReplayCursors, SessionLog};
use crate::plugin::{Hook, Plugin, require_natives};
use reprise_core::EngineResult;
use reprise_host::MathApi;
use std::rc::Rc;
use tracing::trace;

/// Records and replays random draws
pub struct RandomPlugin {
    natives: Option<NativeRefs>,
    hook: Hook<dyn MathApi>,
}

impl RandomPlugin {
    /// Create the plugin
    #[must_use]
    pub fn new() -> Self {
        Self {
            natives: None,
            hook: Hook::new("Math.random"),
        }
    }
}

impl Default for RandomPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for RandomPlugin {
    fn init(&mut self, natives: &NativeRefs) -> EngineResult<()> {
        self.natives = Some(natives.clone());
        Ok(())
    }

    fn capture(&mut self, cx: &CaptureContext) -> EngineResult<()> {
        let slot = &cx.window.globals().math;
        let wrapper = Rc::new(CapturingMath {
            inner: slot.get(),
            log: cx.log.clone(),
        });
        self.hook.install(slot, wrapper);
        Ok(())
    }

    fn before_replay(&mut self, cx: &ReplayContext) -> EngineResult<()> {
        let wrapper = Rc::new(ReplayingMath {
            cursors: cx.cursors.clone(),
        });
        self.hook.install(&cx.window.globals().math, wrapper);
        Ok(())
    }

    fn clean_up(&mut self) -> EngineResult<()> {
        let natives = require_natives(&self.natives)?;
        self.hook.uninstall(&natives.window.globals().math);
        Ok(())
    }
}

struct CapturingMath {
    inner: Rc<dyn MathApi>,
    log: SessionLog,
}

impl MathApi for CapturingMath {
    fn random(&self) -> EngineResult<f64> {
        let value = self.inner.random()?;
        if self.log.is_live() {
            trace!(value, "captured random draw");
            self.log.record(|log| log.random.push(value))?;
        }
        Ok(value)
    }
}

struct ReplayingMath {
    cursors: ReplayCursors,
}

impl MathApi for ReplayingMath {
    fn random(&self) -> EngineResult<f64> {
        self.cursors.next_random()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Engine;
    use proptest::prelude::*;
    use reprise_core::{CaptureConfig, EngineError, ReplayConfig};
    use reprise_host::{PlatformConfig, Window};

    fn plugged(window: &Window) -> Engine {
        let mut engine = Engine::bare(window);
        engine.plug("random", RandomPlugin::new()).unwrap();
        engine
    }

    #[test]
    fn test_capture_then_replay_same_sequence() {
        let window = Window::new(PlatformConfig::default().with_seed(11));
        let mut engine = plugged(&window);
        engine.capture(CaptureConfig::default()).unwrap();
        let captured: Vec<f64> = (0..3).map(|_| window.math().random().unwrap()).collect();
        engine.clean_up().unwrap();
        let log = engine.flush().unwrap();
        assert_eq!(log.random, captured);

        let replay_window = Window::new(PlatformConfig::default().with_seed(99));
        let mut replayer = plugged(&replay_window);
        replayer.replay(log, ReplayConfig::default()).unwrap();
        let replayed: Vec<f64> = (0..3)
            .map(|_| replay_window.math().random().unwrap())
            .collect();
        assert_eq!(replayed, captured);
    }

    #[test]
    fn test_exhausted_sequence_fails() {
        let window = Window::default();
        let mut engine = plugged(&window);
        let mut log = reprise_log::Log::new();
        log.random = vec![0.5];
        engine.replay(log, ReplayConfig::default()).unwrap();

        assert_eq!(window.math().random().unwrap(), 0.5);
        let err = window.math().random().unwrap_err();
        assert!(matches!(err, EngineError::Exhausted { .. }));
        assert_eq!(err.to_string(), "Recorded random exhausted during replay");
    }

    proptest! {
        #[test]
        fn test_random_round_trip(seed in any::<u64>(), draws in 0usize..40) {
            let window = Window::new(PlatformConfig::default().with_seed(seed));
            let mut engine = plugged(&window);
            engine.capture(CaptureConfig::default()).unwrap();
            let captured: Vec<f64> = (0..draws).map(|_| window.math().random().unwrap()).collect();
            engine.clean_up().unwrap();
            let json = engine.flush().unwrap().to_json().unwrap();

            let log = reprise_log::Log::from_json(&json).unwrap();
            engine.replay(log, ReplayConfig::default()).unwrap();
            let replayed: Vec<f64> = (0..draws).map(|_| window.math().random().unwrap()).collect();
            prop_assert_eq!(replayed, captured);
        }
    }
}
