//! The `document.createEvent` global.

use crate::clock::Clock;
use reprise_core::DomException;
use reprise_dom::{DomEvent, EventFactory, EventInterface};
use std::rc::Rc;

/// Allocates uninitialized events of the configured interfaces
pub struct NativeEventFactory {
    clock: Rc<dyn Clock>,
    supported: Vec<EventInterface>,
}

impl NativeEventFactory {
    /// Factory stamping events with `clock`
    pub fn new(clock: Rc<dyn Clock>, supported: Vec<EventInterface>) -> Self {
        Self { clock, supported }
    }
}

impl EventFactory for NativeEventFactory {
    fn create_event(&self, interface: &str) -> Result<DomEvent, DomException> {
        let iface = EventInterface::from_name(interface)
            .or_else(|| legacy_alias(interface))
            .filter(|i| self.supported.contains(i))
            .ok_or_else(|| {
                DomException::not_supported_error(format!(
                    "The provided event type (\"{}\") is invalid.",
                    interface
                ))
            })?;
        Ok(DomEvent::new(iface, self.clock.now()))
    }
}

fn legacy_alias(name: &str) -> Option<EventInterface> {
    match name {
        "Events" | "HTMLEvents" => Some(EventInterface::Event),
        "UIEvents" => Some(EventInterface::UIEvent),
        "MouseEvents" => Some(EventInterface::MouseEvent),
        "KeyEvents" => Some(EventInterface::KeyboardEvent),
        _ => None,
    }
}
