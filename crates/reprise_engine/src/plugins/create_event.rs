//! `document.createEvent` interception.
//!
//! Events the application builds itself are dispatched through the same
//! listeners as user input. Marking them `synthetic` keeps them out of the
//! log.

use crate::context::{CaptureContext, NativeRefs};
use crate::plugin::{Hook, Plugin, require_natives};
use reprise_core::{DomException, EngineResult};
use reprise_dom::{DomEvent, EventFactory};
use std::rc::Rc;

/// Marks application-built events during capture
pub struct CreateEventPlugin {
    natives: Option<NativeRefs>,
    hook: Hook<dyn EventFactory>,
}

impl CreateEventPlugin {
    /// Create the plugin
    #[must_use]
    pub fn new() -> Self {
        Self {
            natives: None,
            hook: Hook::new("document.createEvent"),
        }
    }
}

impl Default for CreateEventPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for CreateEventPlugin {
    fn init(&mut self, natives: &NativeRefs) -> EngineResult<()> {
        self.natives = Some(natives.clone());
        Ok(())
    }

    fn capture(&mut self, cx: &CaptureContext) -> EngineResult<()> {
        let slot = &cx.window.globals().event_factory;
        let wrapper = Rc::new(MarkingFactory { inner: slot.get() });
        self.hook.install(slot, wrapper);
        Ok(())
    }

    fn clean_up(&mut self) -> EngineResult<()> {
        let natives = require_natives(&self.natives)?;
        self.hook.uninstall(&natives.window.globals().event_factory);
        Ok(())
    }
}

struct MarkingFactory {
    inner: Rc<dyn EventFactory>,
}

impl EventFactory for MarkingFactory {
    fn create_event(&self, interface: &str) -> Result<DomEvent, DomException> {
        let mut event = self.inner.create_event(interface)?;
        event.marker.synthetic = true;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Engine;
    use reprise_core::CaptureConfig;
    use reprise_host::Window;

    #[test]
    fn test_created_events_are_synthetic_only_while_capturing() {
        let window = Window::default();
        let mut engine = Engine::bare(&window);
        engine
            .plug("document-create-event", CreateEventPlugin::new())
            .unwrap();

        engine.capture(CaptureConfig::default()).unwrap();
        let event = window.event_factory().create_event("UIEvent").unwrap();
        assert!(event.marker.synthetic);
        assert!(window.event_factory().create_event("TouchEvent").is_err());

        engine.clean_up().unwrap();
        let event = window.event_factory().create_event("UIEvent").unwrap();
        assert!(!event.marker.synthetic);
    }
}
