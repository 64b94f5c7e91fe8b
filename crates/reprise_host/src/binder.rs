//! The event-binding library.
//!
//! Shaped like the jQuery-style libraries applications bind through:
//! - Handlers bound with `on` receive a normalized [`BoundEvent`]
//! - One platform listener per target and type fans out to them
//! - `trigger` runs bound handlers along the propagation path without any
//!   platform event behind them

use crate::window::WeakWindow;
use indexmap::IndexMap;
use reprise_core::{EngineError, EngineResult, IdAllocator, Timestamp};
use reprise_dom::{DomEvent, EventInterface, EventTarget, Listener, listener, propagation_path};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tracing::trace;

/// A bound handler
pub type BoundHandler = Rc<dyn Fn(&mut BoundEvent<'_>) -> EngineResult<()>>;

/// Wrap a closure as a [`BoundHandler`]
pub fn bound_handler<F>(f: F) -> BoundHandler
where
    F: Fn(&mut BoundEvent<'_>) -> EngineResult<()> + 'static,
{
    Rc::new(f)
}

/// Handle returned by [`EventBinding::on`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandlerId(u64);

impl HandlerId {
    /// Handle from its raw value
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }
}

/// The library's binding entry point
pub trait EventBinding {
    /// Bind `handler` to `event_type` on `target`
    ///
    /// # Errors
    ///
    /// Returns error if the platform listener cannot be registered
    fn on(&self, target: EventTarget, event_type: &str, handler: BoundHandler) -> EngineResult<HandlerId>;

    /// Unbind a handler, returning whether it was bound
    ///
    /// # Errors
    ///
    /// Returns error if the platform listener cannot be removed
    fn off(&self, target: EventTarget, event_type: &str, id: HandlerId) -> EngineResult<bool>;

    /// Run bound handlers for `event_type` from `target` outwards
    ///
    /// # Errors
    ///
    /// Returns the first handler error
    fn trigger(&self, target: EventTarget, event_type: &str) -> EngineResult<()>;
}

/// The library's normalized view of an event
pub struct BoundEvent<'a> {
    /// Event type
    pub event_type: String,
    /// Event time
    pub time_stamp: Timestamp,
    /// Dispatch target
    pub target: Option<EventTarget>,
    /// Target whose handlers are running
    pub current_target: Option<EventTarget>,
    /// `relatedTarget`, if the event has one
    pub related_target: Option<EventTarget>,
    /// Data attributes copied off the platform event
    pub fields: Map<String, Value>,
    original: Option<&'a mut DomEvent>,
    default_prevented: bool,
    propagation_stopped: bool,
    immediate_stopped: bool,
}

impl<'a> BoundEvent<'a> {
    /// Normalize a platform event
    pub fn from_event(event: &'a mut DomEvent) -> Self {
        let mut fields = Map::new();
        for name in event.attrs.keys() {
            if let Some(value) = event.data(name) {
                fields.insert(name.clone(), value.clone());
            }
        }
        normalize_which(event.interface, &mut fields);

        Self {
            event_type: event.event_type.clone(),
            time_stamp: event.time_stamp,
            target: event.target,
            current_target: event.current_target,
            related_target: event.target_attr("relatedTarget"),
            fields,
            default_prevented: event.default_prevented,
            original: Some(event),
            propagation_stopped: false,
            immediate_stopped: false,
        }
    }

    /// An event raised by `trigger`, with no platform event behind it
    #[must_use]
    pub fn triggered(event_type: &str, target: EventTarget, time_stamp: Timestamp) -> Self {
        Self {
            event_type: event_type.to_string(),
            time_stamp,
            target: Some(target),
            current_target: Some(target),
            related_target: None,
            fields: Map::new(),
            original: None,
            default_prevented: false,
            propagation_stopped: false,
            immediate_stopped: false,
        }
    }

    /// The originating platform event
    #[must_use]
    pub fn original(&self) -> Option<&DomEvent> {
        self.original.as_deref()
    }

    /// The originating platform event, mutably
    pub fn original_mut(&mut self) -> Option<&mut DomEvent> {
        self.original.as_deref_mut()
    }

    /// A normalized field
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Overwrite a normalized field
    pub fn set_field(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }

    /// `preventDefault`, forwarded to the platform event
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
        if let Some(original) = self.original.as_deref_mut() {
            original.prevent_default();
        }
    }

    /// Whether the default action was prevented
    #[must_use]
    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// `stopPropagation`, forwarded to the platform event
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
        if let Some(original) = self.original.as_deref_mut() {
            original.stop_propagation();
        }
    }

    /// `stopImmediatePropagation`, forwarded to the platform event
    pub fn stop_immediate_propagation(&mut self) {
        self.propagation_stopped = true;
        self.immediate_stopped = true;
        if let Some(original) = self.original.as_deref_mut() {
            original.stop_immediate_propagation();
        }
    }

    /// Whether propagation was stopped
    #[must_use]
    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

impl std::fmt::Debug for BoundEvent<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundEvent")
            .field("event_type", &self.event_type)
            .field("time_stamp", &self.time_stamp)
            .field("target", &self.target)
            .field("has_original", &self.original.is_some())
            .finish_non_exhaustive()
    }
}

// `which` unifies key and button codes
fn normalize_which(interface: EventInterface, fields: &mut Map<String, Value>) {
    let code = |name: &str| fields.get(name).and_then(Value::as_u64).unwrap_or(0);
    if code("which") != 0 {
        return;
    }
    let which = match interface {
        EventInterface::KeyboardEvent => {
            let char_code = code("charCode");
            if char_code != 0 { char_code } else { code("keyCode") }
        }
        EventInterface::MouseEvent => match code("button") {
            0 => 1,
            1 => 2,
            2 => 3,
            _ => 0,
        },
        _ => return,
    };
    fields.insert("which".to_string(), Value::from(which));
}

type HandlerKey = (EventTarget, String);
type HandlerTable = RefCell<IndexMap<HandlerKey, Vec<(HandlerId, BoundHandler)>>>;

fn snapshot(table: &HandlerTable, key: &HandlerKey) -> EngineResult<Vec<BoundHandler>> {
    let table = table
        .try_borrow()
        .map_err(|_| EngineError::invalid_state("binding table is busy"))?;
    Ok(table
        .get(key)
        .map(|handlers| handlers.iter().map(|(_, h)| Rc::clone(h)).collect())
        .unwrap_or_default())
}

fn run_handlers(handlers: &[BoundHandler], event: &mut BoundEvent<'_>) -> EngineResult<()> {
    for handler in handlers {
        handler(event)?;
        if event.immediate_stopped {
            break;
        }
    }
    Ok(())
}

/// The platform's binding library
pub struct Binder {
    window: WeakWindow,
    table: Rc<HandlerTable>,
    platform: RefCell<IndexMap<HandlerKey, Listener>>,
    ids: IdAllocator,
}

impl Binder {
    /// Library registering its listeners on `window`
    pub fn new(window: WeakWindow) -> Self {
        Self {
            window,
            table: Rc::new(RefCell::new(IndexMap::new())),
            platform: RefCell::new(IndexMap::new()),
            ids: IdAllocator::new(),
        }
    }

    fn platform_listener(table: Weak<HandlerTable>, key: HandlerKey) -> Listener {
        listener(move |event| {
            let Some(table) = table.upgrade() else {
                return Ok(());
            };
            let handlers = snapshot(&table, &key)?;
            let mut bound = BoundEvent::from_event(event);
            run_handlers(&handlers, &mut bound)
        })
    }

    fn busy() -> EngineError {
        EngineError::invalid_state("binding table is busy")
    }
}

impl EventBinding for Binder {
    fn on(&self, target: EventTarget, event_type: &str, handler: BoundHandler) -> EngineResult<HandlerId> {
        let key = (target, event_type.to_string());
        let id = HandlerId(self.ids.allocate());
        let first = {
            let mut table = self.table.try_borrow_mut().map_err(|_| Self::busy())?;
            let handlers = table.entry(key.clone()).or_default();
            handlers.push((id, handler));
            handlers.len() == 1
        };

        if first {
            let platform = Self::platform_listener(Rc::downgrade(&self.table), key.clone());
            self.window
                .upgrade()?
                .add_event_listener(target, event_type, Rc::clone(&platform), false)?;
            self.platform
                .try_borrow_mut()
                .map_err(|_| Self::busy())?
                .insert(key, platform);
        }
        trace!(%target, event_type, "bound handler");
        Ok(id)
    }

    fn off(&self, target: EventTarget, event_type: &str, id: HandlerId) -> EngineResult<bool> {
        let key = (target, event_type.to_string());
        let (removed, empty) = {
            let mut table = self.table.try_borrow_mut().map_err(|_| Self::busy())?;
            let Some(handlers) = table.get_mut(&key) else {
                return Ok(false);
            };
            let before = handlers.len();
            handlers.retain(|(h, _)| *h != id);
            let removed = handlers.len() != before;
            let empty = handlers.is_empty();
            if empty {
                table.shift_remove(&key);
            }
            (removed, empty)
        };

        if empty {
            let platform = self
                .platform
                .try_borrow_mut()
                .map_err(|_| Self::busy())?
                .shift_remove(&key);
            if let Some(platform) = platform {
                self.window
                    .upgrade()?
                    .remove_event_listener(target, event_type, &platform, false)?;
            }
        }
        Ok(removed)
    }

    fn trigger(&self, target: EventTarget, event_type: &str) -> EngineResult<()> {
        let window = self.window.upgrade()?;
        let path = propagation_path(&*window.document()?, target);
        let mut event = BoundEvent::triggered(event_type, target, window.now());

        for current in std::iter::once(target).chain(path) {
            let handlers = snapshot(&self.table, &(current, event_type.to_string()))?;
            event.current_target = Some(current);
            run_handlers(&handlers, &mut event)?;
            if event.is_propagation_stopped() {
                break;
            }
        }
        Ok(())
    }
}
