//! The per-page window context.
//!
//! A [`Window`] owns the simulated platform (event loop, document, listener
//! store, network) and a [`Globals`] table of swappable capabilities.
//! Application code reaches every non-deterministic capability through the
//! current value of a slot.

use crate::binder::{Binder, EventBinding};
use crate::clock::{Clock, DateApi, NativeDate};
use crate::config::PlatformConfig;
use crate::event_loop::EventLoop;
use crate::factory::NativeEventFactory;
use crate::global::Global;
use crate::listeners::{ListenerApi, NativeListeners};
use crate::network::Network;
use crate::random::{MathApi, NativeMath};
use crate::storage::{MemoryStorage, StorageApi};
use crate::timers::{NativeTimers, TimerApi};
use crate::xhr::{NativeXhrApi, XhrApi};
use reprise_core::{EngineError, EngineResult, Timestamp};
use reprise_dom::{
    Document, DomEvent, EventFactory, EventInit, EventInterface, EventTarget, KeyboardEventInit,
    Listener, ListenerStore, MouseEventInit, NodeId, dispatch, propagation_path,
};
use serde_json::Value;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};
use tracing::debug;

/// Swappable capability slots
pub struct Globals {
    /// `Date`
    pub date: Global<dyn DateApi>,
    /// `Math.random`
    pub math: Global<dyn MathApi>,
    /// `setTimeout` / `setInterval`
    pub timers: Global<dyn TimerApi>,
    /// `XMLHttpRequest`
    pub xhr: Global<dyn XhrApi>,
    /// `addEventListener` / `removeEventListener`
    pub listeners: Global<dyn ListenerApi>,
    /// The event-binding library
    pub binding: Global<dyn EventBinding>,
    /// `document.createEvent`
    pub event_factory: Global<dyn EventFactory>,
    /// `localStorage`
    pub storage: Global<dyn StorageApi>,
}

struct WindowInner {
    config: PlatformConfig,
    event_loop: Rc<EventLoop>,
    document: RefCell<Document>,
    listeners: Rc<ListenerStore>,
    network: Rc<Network>,
    location: RefCell<String>,
    loaded: Cell<bool>,
    globals: Globals,
}

/// Handle to one simulated page
#[derive(Clone)]
pub struct Window {
    inner: Rc<WindowInner>,
}

/// Non-owning handle, for values stored inside the window itself
#[derive(Clone)]
pub struct WeakWindow {
    inner: Weak<WindowInner>,
}

impl WeakWindow {
    /// The window, if it is still alive
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` once the window has been dropped
    pub fn upgrade(&self) -> EngineResult<Window> {
        self.inner
            .upgrade()
            .map(|inner| Window { inner })
            .ok_or_else(|| EngineError::invalid_state("the window has been dropped"))
    }
}

impl std::fmt::Debug for WeakWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakWindow").finish_non_exhaustive()
    }
}

impl Window {
    /// Create a page with an empty document
    #[must_use]
    pub fn new(config: PlatformConfig) -> Self {
        let event_loop = Rc::new(EventLoop::new(config.epoch, config.max_steps));
        let clock: Rc<dyn Clock> = event_loop.clone();
        let listeners = Rc::new(ListenerStore::new());
        let network = Rc::new(Network::new());

        let date: Rc<dyn DateApi> = Rc::new(NativeDate::new(Rc::clone(&clock)));
        let math: Rc<dyn MathApi> = Rc::new(NativeMath::new(config.seed));
        let timers: Rc<dyn TimerApi> = Rc::new(NativeTimers::new(Rc::clone(&event_loop)));
        let xhr: Rc<dyn XhrApi> =
            Rc::new(NativeXhrApi::new(Rc::clone(&event_loop), Rc::clone(&network)));
        let listener_api: Rc<dyn ListenerApi> =
            Rc::new(NativeListeners::new(Rc::clone(&listeners)));
        let event_factory: Rc<dyn EventFactory> = Rc::new(NativeEventFactory::new(
            clock,
            config.supported_interfaces(),
        ));
        let storage: Rc<dyn StorageApi> = Rc::new(MemoryStorage::new());

        let inner = Rc::new_cyclic(|weak| {
            let binding: Rc<dyn EventBinding> = Rc::new(Binder::new(WeakWindow {
                inner: weak.clone(),
            }));
            WindowInner {
                location: RefCell::new(config.url.clone()),
                config,
                event_loop,
                document: RefCell::new(Document::new()),
                listeners,
                network,
                loaded: Cell::new(false),
                globals: Globals {
                    date: Global::new(date),
                    math: Global::new(math),
                    timers: Global::new(timers),
                    xhr: Global::new(xhr),
                    listeners: Global::new(listener_api),
                    binding: Global::new(binding),
                    event_factory: Global::new(event_factory),
                    storage: Global::new(storage),
                },
            }
        });
        debug!(url = %inner.config.url, seed = inner.config.seed, "window created");
        Self { inner }
    }

    /// Non-owning handle
    #[must_use]
    pub fn downgrade(&self) -> WeakWindow {
        WeakWindow {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Whether two handles name the same window
    #[must_use]
    pub fn ptr_eq(&self, other: &Window) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Platform configuration
    #[must_use]
    pub fn config(&self) -> &PlatformConfig {
        &self.inner.config
    }

    /// The capability slots
    #[must_use]
    pub fn globals(&self) -> &Globals {
        &self.inner.globals
    }

    /// Current `Date`
    #[must_use]
    pub fn date(&self) -> Rc<dyn DateApi> {
        self.inner.globals.date.get()
    }

    /// Current `Math`
    #[must_use]
    pub fn math(&self) -> Rc<dyn MathApi> {
        self.inner.globals.math.get()
    }

    /// Current timers
    #[must_use]
    pub fn timers(&self) -> Rc<dyn TimerApi> {
        self.inner.globals.timers.get()
    }

    /// Current `XMLHttpRequest`
    #[must_use]
    pub fn xhr(&self) -> Rc<dyn XhrApi> {
        self.inner.globals.xhr.get()
    }

    /// Current listener entry point
    #[must_use]
    pub fn listener_api(&self) -> Rc<dyn ListenerApi> {
        self.inner.globals.listeners.get()
    }

    /// Current binding library
    #[must_use]
    pub fn binding(&self) -> Rc<dyn EventBinding> {
        self.inner.globals.binding.get()
    }

    /// Current `document.createEvent`
    #[must_use]
    pub fn event_factory(&self) -> Rc<dyn EventFactory> {
        self.inner.globals.event_factory.get()
    }

    /// Current `localStorage`
    #[must_use]
    pub fn storage(&self) -> Rc<dyn StorageApi> {
        self.inner.globals.storage.get()
    }

    /// The event loop
    #[must_use]
    pub fn event_loop(&self) -> &Rc<EventLoop> {
        &self.inner.event_loop
    }

    /// The scripted network
    #[must_use]
    pub fn network(&self) -> &Rc<Network> {
        &self.inner.network
    }

    /// Virtual time
    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.inner.event_loop.now()
    }

    /// Run queued tasks until none remain
    ///
    /// # Errors
    ///
    /// Returns the first task error
    pub fn run_until_idle(&self) -> EngineResult<u64> {
        self.inner.event_loop.run_until_idle()
    }

    /// Run tasks due in the next `millis` milliseconds
    ///
    /// # Errors
    ///
    /// Returns the first task error
    pub fn run_for(&self, millis: u64) -> EngineResult<u64> {
        self.inner.event_loop.run_for(millis)
    }

    /// The document
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` while the document is mutably borrowed
    pub fn document(&self) -> EngineResult<Ref<'_, Document>> {
        self.inner
            .document
            .try_borrow()
            .map_err(|_| EngineError::invalid_state("the document is being modified"))
    }

    /// The document, mutably
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` while the document is borrowed
    pub fn document_mut(&self) -> EngineResult<RefMut<'_, Document>> {
        self.inner
            .document
            .try_borrow_mut()
            .map_err(|_| EngineError::invalid_state("the document is in use"))
    }

    /// `addEventListener` through the current entry point
    ///
    /// # Errors
    ///
    /// Returns error if the listener store is busy
    pub fn add_event_listener(
        &self,
        target: EventTarget,
        event_type: &str,
        listener: Listener,
        capture: bool,
    ) -> EngineResult<()> {
        self.listener_api()
            .add_event_listener(target, event_type, listener, capture)
    }

    /// `removeEventListener` through the current entry point
    ///
    /// # Errors
    ///
    /// Returns error if the listener store is busy
    pub fn remove_event_listener(
        &self,
        target: EventTarget,
        event_type: &str,
        listener: &Listener,
        capture: bool,
    ) -> EngineResult<bool> {
        self.listener_api()
            .remove_event_listener(target, event_type, listener, capture)
    }

    /// Listeners registered on `target` for `event_type`
    #[must_use]
    pub fn listener_count(&self, target: EventTarget, event_type: &str) -> usize {
        self.inner.listeners.count(target, event_type)
    }

    /// `dispatchEvent`
    ///
    /// Returns `false` if a listener prevented the default action.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateError` for uninitialized events and the first
    /// listener error
    pub fn dispatch_event(&self, target: EventTarget, event: &mut DomEvent) -> EngineResult<bool> {
        let path = propagation_path(&*self.document()?, target);
        dispatch(&self.inner.listeners, &path, target, event)
    }

    /// Dispatch an event as if it came from the user
    ///
    /// # Errors
    ///
    /// Returns the first listener error
    pub fn fire_user_event(&self, target: EventTarget, mut event: DomEvent) -> EngineResult<bool> {
        event.is_trusted = true;
        event.time_stamp = self.now();
        self.dispatch_event(target, &mut event)
    }

    /// A primary-button click on `target`
    ///
    /// # Errors
    ///
    /// Returns the first listener error
    pub fn click(&self, target: EventTarget) -> EngineResult<bool> {
        let init = EventInit::new("click", true, true);
        let mut event = DomEvent::trusted(EventInterface::MouseEvent, &init, self.now());
        event.init_mouse_event(
            &init,
            &MouseEventInit {
                view: Some(EventTarget::Window),
                detail: 1,
                ..MouseEventInit::default()
            },
        )?;
        self.fire_user_event(target, event)
    }

    /// A key event carrying platform-assigned key codes
    ///
    /// # Errors
    ///
    /// Returns the first listener error
    pub fn key(
        &self,
        target: EventTarget,
        event_type: &str,
        key_code: u32,
        char_code: u32,
    ) -> EngineResult<bool> {
        let init = EventInit::new(event_type, true, true);
        let mut event = DomEvent::trusted(EventInterface::KeyboardEvent, &init, self.now());
        event.init_keyboard_event(
            &init,
            &KeyboardEventInit {
                view: Some(EventTarget::Window),
                ..KeyboardEventInit::default()
            },
        )?;
        event.set_data("keyCode", Value::from(key_code));
        event.set_data("charCode", Value::from(char_code));
        event.set_data("which", Value::from(if char_code != 0 { char_code } else { key_code }));
        self.fire_user_event(target, event)
    }

    /// Type `value` into a form control and fire `input`
    ///
    /// # Errors
    ///
    /// Returns error if the node is not an element or a listener fails
    pub fn input(&self, node: NodeId, value: &str) -> EngineResult<bool> {
        self.document_mut()?.set_value(node, Some(value.to_string()))?;
        let event = DomEvent::trusted(
            EventInterface::Event,
            &EventInit::new("input", true, false),
            self.now(),
        );
        self.fire_user_event(EventTarget::Element(node), event)
    }

    /// Whether `DOMContentLoaded` has fired
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.inner.loaded.get()
    }

    /// Finish parsing: fire `DOMContentLoaded` on the document once
    ///
    /// # Errors
    ///
    /// Returns the first listener error
    pub fn finish_loading(&self) -> EngineResult<()> {
        if self.inner.loaded.replace(true) {
            return Ok(());
        }
        debug!("DOMContentLoaded");
        let event = DomEvent::trusted(
            EventInterface::Event,
            &EventInit::new("DOMContentLoaded", true, false),
            self.now(),
        );
        self.fire_user_event(EventTarget::Document, event).map(|_| ())
    }

    /// Current URL
    #[must_use]
    pub fn location(&self) -> String {
        self.inner
            .location
            .try_borrow()
            .map(|l| l.clone())
            .unwrap_or_default()
    }

    /// Navigate to a fragment, firing `hashchange` if it changed
    ///
    /// # Errors
    ///
    /// Returns the first listener error
    pub fn set_location_hash(&self, hash: &str) -> EngineResult<bool> {
        let old_url = self.location();
        let base = old_url.split('#').next().unwrap_or_default();
        let new_url = format!("{}#{}", base, hash.trim_start_matches('#'));
        if new_url == old_url {
            return Ok(false);
        }
        *self
            .inner
            .location
            .try_borrow_mut()
            .map_err(|_| EngineError::invalid_state("location is busy"))? = new_url.clone();

        let init = EventInit::new("hashchange", false, false);
        let mut event = DomEvent::trusted(EventInterface::HashChangeEvent, &init, self.now());
        event.init_hash_change_event(&init, &old_url, &new_url)?;
        self.fire_user_event(EventTarget::Window, event)?;
        Ok(true)
    }

    /// History traversal: fire `popstate` with `state`
    ///
    /// # Errors
    ///
    /// Returns the first listener error
    pub fn pop_state(&self, state: Value) -> EngineResult<bool> {
        let init = EventInit::new("popstate", false, false);
        let mut event = DomEvent::trusted(EventInterface::PopStateEvent, &init, self.now());
        event.init_pop_state_event(&init, state)?;
        self.fire_user_event(EventTarget::Window, event)
    }
}

impl Default for Window {
    fn default() -> Self {
        Self::new(PlatformConfig::default())
    }
}

impl std::fmt::Debug for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Window")
            .field("url", &self.location())
            .field("now", &self.now())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reprise_dom::listener;

    fn recorder(seen: &Rc<RefCell<Vec<String>>>) -> Listener {
        let seen = Rc::clone(seen);
        listener(move |event| {
            seen.borrow_mut().push(event.event_type.clone());
            Ok(())
        })
    }

    #[test]
    fn test_slots_redirect_reads() {
        struct Fixed;
        impl MathApi for Fixed {
            fn random(&self) -> EngineResult<f64> {
                Ok(0.5)
            }
        }

        let window = Window::default();
        let native = window.globals().math.replace(Rc::new(Fixed));
        assert_eq!(window.math().random().unwrap(), 0.5);
        window.globals().math.set(native);
        assert_ne!(window.math().random().unwrap(), 0.5);
    }

    #[test]
    fn test_date_follows_virtual_time() {
        let window = Window::new(PlatformConfig::default().with_epoch(Timestamp::from_millis(1_000)));
        assert_eq!(window.date().now().unwrap(), Timestamp::from_millis(1_000));
        window.run_for(250).unwrap();
        assert_eq!(window.date().now().unwrap(), Timestamp::from_millis(1_250));
    }

    #[test]
    fn test_finish_loading_fires_once() {
        let window = Window::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        window
            .add_event_listener(EventTarget::Document, "DOMContentLoaded", recorder(&seen), false)
            .unwrap();

        window.finish_loading().unwrap();
        window.finish_loading().unwrap();
        assert!(window.is_loaded());
        assert_eq!(*seen.borrow(), vec!["DOMContentLoaded"]);
    }

    #[test]
    fn test_hashchange() {
        let window = Window::new(PlatformConfig::default().with_url("http://app/"));
        let urls = Rc::new(RefCell::new(Vec::new()));
        let u = Rc::clone(&urls);
        window
            .add_event_listener(
                EventTarget::Window,
                "hashchange",
                listener(move |event| {
                    u.borrow_mut().push(event.data("newURL").cloned());
                    Ok(())
                }),
                false,
            )
            .unwrap();

        assert!(window.set_location_hash("#page2").unwrap());
        assert!(!window.set_location_hash("page2").unwrap());
        assert_eq!(window.location(), "http://app/#page2");
        assert_eq!(*urls.borrow(), vec![Some(Value::from("http://app/#page2"))]);
    }

    #[test]
    fn test_input_sets_value_and_bubbles() {
        let window = Window::default();
        let field = {
            let mut doc = window.document_mut().unwrap();
            let field = doc.create_element("input");
            let body = doc.body();
            doc.append_child(body, field).unwrap();
            field
        };
        let seen = Rc::new(RefCell::new(Vec::new()));
        window
            .add_event_listener(EventTarget::Document, "input", recorder(&seen), false)
            .unwrap();

        window.input(field, "hello").unwrap();
        assert_eq!(window.document().unwrap().value(field), Some("hello"));
        assert_eq!(*seen.borrow(), vec!["input"]);
    }

    #[test]
    fn test_dispatch_uninitialized_event_fails() {
        let window = Window::default();
        let mut event = window.event_factory().create_event("Event").unwrap();
        assert!(window.dispatch_event(EventTarget::Window, &mut event).is_err());
    }

    #[test]
    fn test_weak_window_upgrade() {
        let window = Window::default();
        let weak = window.downgrade();
        assert!(weak.upgrade().unwrap().ptr_eq(&window));
        drop(window);
        assert!(weak.upgrade().is_err());
    }
}
