//! `addEventListener` / `removeEventListener` on the window and document.

use reprise_core::EngineResult;
use reprise_dom::{EventTarget, Listener, ListenerStore};
use std::rc::Rc;

/// The listener registration entry point
pub trait ListenerApi {
    /// Register `listener` on `target`
    ///
    /// # Errors
    ///
    /// Returns error if the listener store is busy
    fn add_event_listener(
        &self,
        target: EventTarget,
        event_type: &str,
        listener: Listener,
        capture: bool,
    ) -> EngineResult<()>;

    /// Unregister `listener` from `target`, returning whether it was present
    ///
    /// # Errors
    ///
    /// Returns error if the listener store is busy
    fn remove_event_listener(
        &self,
        target: EventTarget,
        event_type: &str,
        listener: &Listener,
        capture: bool,
    ) -> EngineResult<bool>;
}

/// Registration straight into the window's store
pub struct NativeListeners {
    store: Rc<ListenerStore>,
}

impl NativeListeners {
    /// Entry point writing to `store`
    pub fn new(store: Rc<ListenerStore>) -> Self {
        Self { store }
    }
}

impl ListenerApi for NativeListeners {
    fn add_event_listener(
        &self,
        target: EventTarget,
        event_type: &str,
        listener: Listener,
        capture: bool,
    ) -> EngineResult<()> {
        self.store.add(target, event_type, listener, capture)
    }

    fn remove_event_listener(
        &self,
        target: EventTarget,
        event_type: &str,
        listener: &Listener,
        capture: bool,
    ) -> EngineResult<bool> {
        self.store.remove(target, event_type, listener, capture)
    }
}
