//! Window-level events.
//!
//! Navigation events such as `hashchange` and `popstate` reach the window
//! through plain listeners, never through the binding library. Capture puts
//! one capture-phase logger on the window per event type the application
//! listens for, plus the navigation types up front. Logged events are
//! ordinary `dom` entries targeting `"window"`, replayed by the DOM plugin.

use crate::context::{CaptureContext, NativeRefs, SessionLog};
use crate::plugin::{Hook, Plugin, require_natives};
use crate::plugins::dom::log_dom_event;
use indexmap::IndexMap;
use reprise_core::{EngineError, EngineResult};
use reprise_dom::{EventTarget, Listener, listener};
use reprise_host::{DateApi, ListenerApi, WeakWindow};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::trace;

/// Event types logged on the window even before anyone listens
pub const WHITELIST: &[&str] = &["hashchange", "popstate"];

type Loggers = Rc<RefCell<IndexMap<String, Listener>>>;

/// Records events targeted at the window itself
pub struct WindowPlugin {
    natives: Option<NativeRefs>,
    hook: Hook<dyn ListenerApi>,
    loggers: Loggers,
    registrar: Option<Rc<dyn ListenerApi>>,
}

impl WindowPlugin {
    /// Create the plugin
    #[must_use]
    pub fn new() -> Self {
        Self {
            natives: None,
            hook: Hook::new("addEventListener"),
            loggers: Rc::new(RefCell::new(IndexMap::new())),
            registrar: None,
        }
    }
}

impl Default for WindowPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for WindowPlugin {
    fn init(&mut self, natives: &NativeRefs) -> EngineResult<()> {
        self.natives = Some(natives.clone());
        Ok(())
    }

    fn capture(&mut self, cx: &CaptureContext) -> EngineResult<()> {
        let natives = require_natives(&self.natives)?;
        let slot = &cx.window.globals().listeners;
        let inner = slot.get();
        self.loggers = Rc::new(RefCell::new(IndexMap::new()));
        let wrapper = Rc::new(CapturingListeners {
            inner: Rc::clone(&inner),
            loggers: Rc::clone(&self.loggers),
            window: cx.window.downgrade(),
            clock: Rc::clone(&natives.date),
            log: cx.log.clone(),
        });
        for event_type in WHITELIST {
            wrapper.watch(event_type)?;
        }
        self.hook.install(slot, wrapper);
        self.registrar = Some(inner);
        Ok(())
    }

    fn clean_up(&mut self) -> EngineResult<()> {
        let natives = require_natives(&self.natives)?;
        self.hook.uninstall(&natives.window.globals().listeners);
        if let Some(registrar) = self.registrar.take() {
            let loggers = std::mem::take(
                &mut *self
                    .loggers
                    .try_borrow_mut()
                    .map_err(|_| EngineError::invalid_state("window loggers are busy"))?,
            );
            for (event_type, logger) in loggers {
                registrar.remove_event_listener(EventTarget::Window, &event_type, &logger, true)?;
            }
        }
        Ok(())
    }
}

struct CapturingListeners {
    inner: Rc<dyn ListenerApi>,
    loggers: Loggers,
    window: WeakWindow,
    clock: Rc<dyn DateApi>,
    log: SessionLog,
}

impl CapturingListeners {
    fn watch(&self, event_type: &str) -> EngineResult<()> {
        let logger = {
            let mut loggers = self
                .loggers
                .try_borrow_mut()
                .map_err(|_| EngineError::invalid_state("window loggers are busy"))?;
            if loggers.contains_key(event_type) {
                return Ok(());
            }
            let window = self.window.clone();
            let clock = Rc::clone(&self.clock);
            let log = self.log.clone();
            let logger = listener(move |event| {
                if !log.is_live()
                    || event.target != Some(EventTarget::Window)
                    || event.marker.captured
                    || event.marker.synthetic
                {
                    return Ok(());
                }
                event.marker.captured = true;
                log_dom_event(&window.upgrade()?, &*clock, &log, event)
            });
            loggers.insert(event_type.to_string(), Rc::clone(&logger));
            logger
        };
        trace!(event_type, "watching window events");
        self.inner
            .add_event_listener(EventTarget::Window, event_type, logger, true)
    }
}

impl ListenerApi for CapturingListeners {
    fn add_event_listener(
        &self,
        target: EventTarget,
        event_type: &str,
        listener: Listener,
        capture: bool,
    ) -> EngineResult<()> {
        if target == EventTarget::Window {
            self.watch(event_type)?;
        }
        self.inner
            .add_event_listener(target, event_type, listener, capture)
    }

    fn remove_event_listener(
        &self,
        target: EventTarget,
        event_type: &str,
        listener: &Listener,
        capture: bool,
    ) -> EngineResult<bool> {
        self.inner
            .remove_event_listener(target, event_type, listener, capture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::DomPlugin;
    use crate::session::Engine;
    use reprise_core::{CaptureConfig, ReplayConfig};
    use reprise_host::{PlatformConfig, Window};
    use reprise_log::{DomDetails, kind};
    use serde_json::Value;

    fn plugged(window: &Window) -> Engine {
        let mut engine = Engine::bare(window);
        engine.plug("window", WindowPlugin::new()).unwrap();
        engine.plug(kind::DOM, DomPlugin::new()).unwrap();
        engine
    }

    fn new_urls(seen: &Rc<RefCell<Vec<Value>>>) -> Listener {
        let seen = Rc::clone(seen);
        listener(move |event| {
            seen.borrow_mut()
                .push(event.data("newURL").cloned().unwrap_or(Value::Null));
            Ok(())
        })
    }

    #[test]
    fn test_hashchange_round_trip() {
        let window = Window::new(PlatformConfig::default().with_url("http://app/"));
        let mut engine = plugged(&window);
        engine.capture(CaptureConfig::default()).unwrap();
        window.set_location_hash("step2").unwrap();
        engine.clean_up().unwrap();
        let log = engine.flush().unwrap();

        assert_eq!(log.events.len(), 1);
        let details: DomDetails = log.events[0].details_as().unwrap();
        assert_eq!(details.interface, "HashChangeEvent");
        assert_eq!(details.attrs["target"], "window");
        assert_eq!(window.listener_count(EventTarget::Window, "hashchange"), 0);

        let replay_window = Window::new(PlatformConfig::default().with_url("http://app/"));
        let mut replayer = plugged(&replay_window);
        replayer.replay(log, ReplayConfig::default()).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        replay_window
            .add_event_listener(EventTarget::Window, "hashchange", new_urls(&seen), false)
            .unwrap();
        replay_window.run_until_idle().unwrap();
        assert_eq!(*seen.borrow(), vec![Value::from("http://app/#step2")]);
    }

    #[test]
    fn test_listened_types_are_watched() {
        let window = Window::default();
        let mut engine = plugged(&window);
        engine.capture(CaptureConfig::default()).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        window
            .add_event_listener(EventTarget::Window, "resize", new_urls(&seen), false)
            .unwrap();

        let event = reprise_dom::DomEvent::trusted(
            reprise_dom::EventInterface::UIEvent,
            &reprise_dom::EventInit::new("resize", false, false),
            window.now(),
        );
        window.fire_user_event(EventTarget::Window, event).unwrap();
        window.pop_state(Value::Null).unwrap();

        let log = engine.flush().unwrap();
        let types: Vec<Value> = log
            .events
            .iter()
            .map(|e| e.details_as::<DomDetails>().unwrap().attrs["type"].clone())
            .collect();
        assert_eq!(types, vec![Value::from("resize"), Value::from("popstate")]);
        assert_eq!(seen.borrow().len(), 1);
    }
}
