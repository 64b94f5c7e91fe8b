//! Event objects.
//!
//! A [`DomEvent`] carries the attributes common to every event plus an
//! ordered attribute map for the interface-specific ones. Node-valued
//! attributes are kept as [`EventTarget`]s so they can be serialized as
//! structural paths.

use crate::document::NodeId;
use indexmap::IndexMap;
use reprise_core::{DomException, EngineError, RequestId, Timestamp};
use serde_json::{Map, Value};

/// Anything events can be dispatched to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventTarget {
    /// The global window
    Window,
    /// The document node
    Document,
    /// An element or text node
    Element(NodeId),
    /// An asynchronous request object
    Request(RequestId),
}

impl std::fmt::Display for EventTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Window => write!(f, "window"),
            Self::Document => write!(f, "document"),
            Self::Element(id) => write!(f, "{}", id),
            Self::Request(id) => write!(f, "{}", id),
        }
    }
}

/// Dispatch phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EventPhase {
    /// Not being dispatched
    #[default]
    None,
    /// Travelling from the window towards the target
    Capturing,
    /// At the target
    AtTarget,
    /// Travelling from the target back to the window
    Bubbling,
}

impl EventPhase {
    /// Numeric `eventPhase` value
    #[must_use]
    pub const fn as_u8(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Capturing => 1,
            Self::AtTarget => 2,
            Self::Bubbling => 3,
        }
    }
}

/// Event interfaces the engine knows how to rebuild
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventInterface {
    /// Plain `Event`
    Event,
    /// `UIEvent`
    UIEvent,
    /// `FocusEvent`
    FocusEvent,
    /// `MouseEvent`
    MouseEvent,
    /// `KeyboardEvent`
    KeyboardEvent,
    /// `HashChangeEvent`
    HashChangeEvent,
    /// `PopStateEvent`
    PopStateEvent,
}

impl EventInterface {
    /// Every interface, most derived last
    pub const ALL: [EventInterface; 7] = [
        Self::Event,
        Self::UIEvent,
        Self::FocusEvent,
        Self::MouseEvent,
        Self::KeyboardEvent,
        Self::HashChangeEvent,
        Self::PopStateEvent,
    ];

    /// Interface name as exposed to scripts
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Event => "Event",
            Self::UIEvent => "UIEvent",
            Self::FocusEvent => "FocusEvent",
            Self::MouseEvent => "MouseEvent",
            Self::KeyboardEvent => "KeyboardEvent",
            Self::HashChangeEvent => "HashChangeEvent",
            Self::PopStateEvent => "PopStateEvent",
        }
    }

    /// Look up an interface by name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.name() == name)
    }

    /// Whether this interface is `other` or derives from it
    #[must_use]
    pub const fn is_a(&self, other: EventInterface) -> bool {
        match other {
            Self::Event => true,
            Self::UIEvent => matches!(
                self,
                Self::UIEvent | Self::FocusEvent | Self::MouseEvent | Self::KeyboardEvent
            ),
            _ => self.const_eq(other),
        }
    }

    const fn const_eq(&self, other: EventInterface) -> bool {
        *self as u8 == other as u8
    }

    /// Interface-specific attributes with their initial values
    #[must_use]
    pub fn default_attrs(&self) -> Vec<(&'static str, AttrValue)> {
        let ui = || {
            vec![
                ("view", AttrValue::Target(None)),
                ("detail", AttrValue::Data(Value::from(0))),
            ]
        };
        let modifiers = || {
            vec![
                ("ctrlKey", AttrValue::Data(Value::Bool(false))),
                ("altKey", AttrValue::Data(Value::Bool(false))),
                ("shiftKey", AttrValue::Data(Value::Bool(false))),
                ("metaKey", AttrValue::Data(Value::Bool(false))),
            ]
        };

        match self {
            Self::Event => Vec::new(),
            Self::UIEvent => ui(),
            Self::FocusEvent => {
                let mut attrs = ui();
                attrs.push(("relatedTarget", AttrValue::Target(None)));
                attrs
            }
            Self::MouseEvent => {
                let mut attrs = ui();
                for name in ["screenX", "screenY", "clientX", "clientY"] {
                    attrs.push((name, AttrValue::Data(Value::from(0))));
                }
                attrs.extend(modifiers());
                attrs.push(("button", AttrValue::Data(Value::from(0))));
                attrs.push(("relatedTarget", AttrValue::Target(None)));
                attrs
            }
            Self::KeyboardEvent => {
                let mut attrs = ui();
                attrs.push(("keyIdentifier", AttrValue::Data(Value::from(""))));
                attrs.push(("keyLocation", AttrValue::Data(Value::from(0))));
                attrs.extend(modifiers());
                attrs.push(("repeat", AttrValue::Data(Value::Bool(false))));
                for name in ["keyCode", "charCode", "which"] {
                    attrs.push((name, AttrValue::Data(Value::from(0))));
                }
                attrs
            }
            Self::HashChangeEvent => vec![
                ("oldURL", AttrValue::Data(Value::from(""))),
                ("newURL", AttrValue::Data(Value::from(""))),
            ],
            Self::PopStateEvent => vec![("state", AttrValue::Data(Value::Null))],
        }
    }
}

impl std::fmt::Display for EventInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Value of an interface-specific attribute
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// Plain data
    Data(Value),
    /// A node, the window, or nothing
    Target(Option<EventTarget>),
}

/// Engine bookkeeping attached to a live event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventMarker {
    /// Already logged by some interceptor
    pub captured: bool,
    /// Created by application code through the event factory
    pub synthetic: bool,
    /// Fields the platform overwrites that replay must restore
    pub fix_up: Vec<String>,
    /// Serialized attributes this event was rebuilt from
    pub recorded: Option<Map<String, Value>>,
}

/// Arguments shared by every initializer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventInit {
    /// Event type, e.g. `click`
    pub event_type: String,
    /// Whether the event bubbles
    pub bubbles: bool,
    /// Whether the default action can be prevented
    pub cancelable: bool,
}

impl EventInit {
    /// Create init arguments
    pub fn new(event_type: impl Into<String>, bubbles: bool, cancelable: bool) -> Self {
        Self {
            event_type: event_type.into(),
            bubbles,
            cancelable,
        }
    }
}

/// Modifier key state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Control
    pub ctrl: bool,
    /// Alt
    pub alt: bool,
    /// Shift
    pub shift: bool,
    /// Meta
    pub meta: bool,
}

/// Arguments of `initMouseEvent`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MouseEventInit {
    /// View
    pub view: Option<EventTarget>,
    /// Click count
    pub detail: i64,
    /// Screen x
    pub screen_x: i64,
    /// Screen y
    pub screen_y: i64,
    /// Client x
    pub client_x: i64,
    /// Client y
    pub client_y: i64,
    /// Modifier keys
    pub modifiers: Modifiers,
    /// Button number
    pub button: i64,
    /// Secondary target
    pub related_target: Option<EventTarget>,
}

/// Arguments of `initKeyboardEvent`
///
/// The initializer has no way to set `keyCode` or `charCode`; both stay zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyboardEventInit {
    /// View
    pub view: Option<EventTarget>,
    /// Key identifier, e.g. `U+0041`
    pub key_identifier: String,
    /// Key location
    pub key_location: i64,
    /// Modifier keys
    pub modifiers: Modifiers,
    /// Auto-repeat
    pub repeat: bool,
}

/// Initializer misuse
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InitError {
    /// The event is being dispatched
    #[error("cannot initialize an event that is being dispatched")]
    Dispatching,

    /// The initializer belongs to another interface
    #[error("{method} is not a function of {interface}")]
    WrongInterface {
        /// Initializer name
        method: &'static str,
        /// Interface of the event
        interface: EventInterface,
    },
}

impl From<InitError> for EngineError {
    fn from(err: InitError) -> Self {
        let exception = match &err {
            InitError::Dispatching => DomException::invalid_state_error(err.to_string()),
            InitError::WrongInterface { .. } => DomException::type_error(err.to_string()),
        };
        EngineError::Exception(exception)
    }
}

/// A live event
#[derive(Debug, Clone, PartialEq)]
pub struct DomEvent {
    /// Interface the event was created with
    pub interface: EventInterface,
    /// Event type
    pub event_type: String,
    /// Whether the event bubbles
    pub bubbles: bool,
    /// Whether the default action can be prevented
    pub cancelable: bool,
    /// Creation time, set by the platform
    pub time_stamp: Timestamp,
    /// Dispatch target
    pub target: Option<EventTarget>,
    /// Target whose listeners are running
    pub current_target: Option<EventTarget>,
    /// Dispatch phase
    pub phase: EventPhase,
    /// Whether a listener prevented the default action
    pub default_prevented: bool,
    /// Whether the platform generated the event
    pub is_trusted: bool,
    /// Interface-specific attributes
    pub attrs: IndexMap<String, AttrValue>,
    /// Engine bookkeeping
    pub marker: EventMarker,
    initialized: bool,
    dispatching: bool,
    stop_propagation: bool,
    stop_immediate: bool,
}

impl DomEvent {
    /// Create an uninitialized event, as the event factory does
    #[must_use]
    pub fn new(interface: EventInterface, time_stamp: Timestamp) -> Self {
        Self {
            interface,
            event_type: String::new(),
            bubbles: false,
            cancelable: false,
            time_stamp,
            target: None,
            current_target: None,
            phase: EventPhase::None,
            default_prevented: false,
            is_trusted: false,
            attrs: interface
                .default_attrs()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            marker: EventMarker::default(),
            initialized: false,
            dispatching: false,
            stop_propagation: false,
            stop_immediate: false,
        }
    }

    /// Create an initialized platform event
    #[must_use]
    pub fn trusted(interface: EventInterface, init: &EventInit, time_stamp: Timestamp) -> Self {
        let mut event = Self::new(interface, time_stamp);
        event.apply_init(init);
        event.is_trusted = true;
        event
    }

    fn apply_init(&mut self, init: &EventInit) {
        self.event_type = init.event_type.clone();
        self.bubbles = init.bubbles;
        self.cancelable = init.cancelable;
        self.initialized = true;
        self.stop_propagation = false;
        self.stop_immediate = false;
        self.default_prevented = false;
    }

    fn check_init(&self, method: &'static str, required: EventInterface) -> Result<(), InitError> {
        if self.dispatching {
            return Err(InitError::Dispatching);
        }
        if !self.interface.is_a(required) {
            return Err(InitError::WrongInterface {
                method,
                interface: self.interface,
            });
        }
        Ok(())
    }

    /// `initEvent`
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateError` during dispatch
    pub fn init_event(&mut self, init: &EventInit) -> Result<(), InitError> {
        self.check_init("initEvent", EventInterface::Event)?;
        self.apply_init(init);
        Ok(())
    }

    /// `initUIEvent`
    ///
    /// # Errors
    ///
    /// Returns error during dispatch or on a non-UI event
    pub fn init_ui_event(
        &mut self,
        init: &EventInit,
        view: Option<EventTarget>,
        detail: i64,
    ) -> Result<(), InitError> {
        self.check_init("initUIEvent", EventInterface::UIEvent)?;
        self.apply_init(init);
        self.set_target_attr("view", view);
        self.set_data("detail", Value::from(detail));
        Ok(())
    }

    /// `initFocusEvent`
    ///
    /// # Errors
    ///
    /// Returns error during dispatch or on a non-focus event
    pub fn init_focus_event(
        &mut self,
        init: &EventInit,
        view: Option<EventTarget>,
        detail: i64,
        related_target: Option<EventTarget>,
    ) -> Result<(), InitError> {
        self.check_init("initFocusEvent", EventInterface::FocusEvent)?;
        self.apply_init(init);
        self.set_target_attr("view", view);
        self.set_data("detail", Value::from(detail));
        self.set_target_attr("relatedTarget", related_target);
        Ok(())
    }

    /// `initMouseEvent`
    ///
    /// # Errors
    ///
    /// Returns error during dispatch or on a non-mouse event
    pub fn init_mouse_event(
        &mut self,
        init: &EventInit,
        mouse: &MouseEventInit,
    ) -> Result<(), InitError> {
        self.check_init("initMouseEvent", EventInterface::MouseEvent)?;
        self.apply_init(init);
        self.set_target_attr("view", mouse.view);
        self.set_data("detail", Value::from(mouse.detail));
        self.set_data("screenX", Value::from(mouse.screen_x));
        self.set_data("screenY", Value::from(mouse.screen_y));
        self.set_data("clientX", Value::from(mouse.client_x));
        self.set_data("clientY", Value::from(mouse.client_y));
        self.set_modifiers(mouse.modifiers);
        self.set_data("button", Value::from(mouse.button));
        self.set_target_attr("relatedTarget", mouse.related_target);
        Ok(())
    }

    /// `initKeyboardEvent`
    ///
    /// # Errors
    ///
    /// Returns error during dispatch or on a non-keyboard event
    pub fn init_keyboard_event(
        &mut self,
        init: &EventInit,
        key: &KeyboardEventInit,
    ) -> Result<(), InitError> {
        self.check_init("initKeyboardEvent", EventInterface::KeyboardEvent)?;
        self.apply_init(init);
        self.set_target_attr("view", key.view);
        self.set_data("keyIdentifier", Value::from(key.key_identifier.clone()));
        self.set_data("keyLocation", Value::from(key.key_location));
        self.set_modifiers(key.modifiers);
        self.set_data("repeat", Value::Bool(key.repeat));
        Ok(())
    }

    /// `initHashChangeEvent`
    ///
    /// # Errors
    ///
    /// Returns error during dispatch or on another interface
    pub fn init_hash_change_event(
        &mut self,
        init: &EventInit,
        old_url: &str,
        new_url: &str,
    ) -> Result<(), InitError> {
        self.check_init("initHashChangeEvent", EventInterface::HashChangeEvent)?;
        self.apply_init(init);
        self.set_data("oldURL", Value::from(old_url));
        self.set_data("newURL", Value::from(new_url));
        Ok(())
    }

    /// `initPopStateEvent`
    ///
    /// # Errors
    ///
    /// Returns error during dispatch or on another interface
    pub fn init_pop_state_event(
        &mut self,
        init: &EventInit,
        state: Value,
    ) -> Result<(), InitError> {
        self.check_init("initPopStateEvent", EventInterface::PopStateEvent)?;
        self.apply_init(init);
        self.set_data("state", state);
        Ok(())
    }

    fn set_modifiers(&mut self, modifiers: Modifiers) {
        self.set_data("ctrlKey", Value::Bool(modifiers.ctrl));
        self.set_data("altKey", Value::Bool(modifiers.alt));
        self.set_data("shiftKey", Value::Bool(modifiers.shift));
        self.set_data("metaKey", Value::Bool(modifiers.meta));
    }

    /// Interface-specific attribute
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    /// Data-valued attribute
    #[must_use]
    pub fn data(&self, name: &str) -> Option<&Value> {
        match self.attrs.get(name)? {
            AttrValue::Data(value) => Some(value),
            AttrValue::Target(_) => None,
        }
    }

    /// Node-valued attribute
    #[must_use]
    pub fn target_attr(&self, name: &str) -> Option<EventTarget> {
        match self.attrs.get(name)? {
            AttrValue::Target(target) => *target,
            AttrValue::Data(_) => None,
        }
    }

    /// Set a data-valued attribute
    pub fn set_data(&mut self, name: &str, value: Value) {
        self.attrs.insert(name.to_string(), AttrValue::Data(value));
    }

    /// Set a node-valued attribute
    pub fn set_target_attr(&mut self, name: &str, target: Option<EventTarget>) {
        self.attrs
            .insert(name.to_string(), AttrValue::Target(target));
    }

    /// Whether an initializer has run
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Whether the event is being dispatched
    #[must_use]
    pub const fn is_dispatching(&self) -> bool {
        self.dispatching
    }

    /// `preventDefault`
    pub fn prevent_default(&mut self) {
        if self.cancelable {
            self.default_prevented = true;
        }
    }

    /// `stopPropagation`
    pub fn stop_propagation(&mut self) {
        self.stop_propagation = true;
    }

    /// `stopImmediatePropagation`
    pub fn stop_immediate_propagation(&mut self) {
        self.stop_propagation = true;
        self.stop_immediate = true;
    }

    /// Whether propagation to further targets was stopped
    #[must_use]
    pub const fn propagation_stopped(&self) -> bool {
        self.stop_propagation
    }

    /// Whether remaining listeners on the current target are skipped
    #[must_use]
    pub const fn immediate_propagation_stopped(&self) -> bool {
        self.stop_immediate
    }

    /// Copy of this event ready for an independent dispatch
    ///
    /// Keeps type, flags, timestamp, attributes and marker.
    #[must_use]
    pub fn forwardable_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.target = None;
        copy.current_target = None;
        copy.phase = EventPhase::None;
        copy.dispatching = false;
        copy.stop_propagation = false;
        copy.stop_immediate = false;
        copy
    }

    pub(crate) fn begin_dispatch(&mut self, target: EventTarget) {
        self.dispatching = true;
        self.target = Some(target);
        self.stop_propagation = false;
        self.stop_immediate = false;
    }

    pub(crate) fn end_dispatch(&mut self) {
        self.dispatching = false;
        self.phase = EventPhase::None;
        self.current_target = None;
    }

    pub(crate) fn clear_immediate(&mut self) {
        self.stop_immediate = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_names() {
        for iface in EventInterface::ALL {
            assert_eq!(EventInterface::from_name(iface.name()), Some(iface));
        }
        assert_eq!(EventInterface::from_name("TouchEvent"), None);
    }

    #[test]
    fn test_interface_hierarchy() {
        assert!(EventInterface::MouseEvent.is_a(EventInterface::UIEvent));
        assert!(EventInterface::KeyboardEvent.is_a(EventInterface::Event));
        assert!(!EventInterface::HashChangeEvent.is_a(EventInterface::UIEvent));
        assert!(!EventInterface::Event.is_a(EventInterface::MouseEvent));
    }

    #[test]
    fn test_new_event_is_uninitialized() {
        let event = DomEvent::new(EventInterface::MouseEvent, Timestamp::from_millis(7));
        assert!(!event.is_initialized());
        assert!(!event.is_trusted);
        assert_eq!(event.data("button"), Some(&Value::from(0)));
        assert_eq!(event.target_attr("relatedTarget"), None);
    }

    #[test]
    fn test_init_mouse_event() {
        let mut event = DomEvent::new(EventInterface::MouseEvent, Timestamp::zero());
        let mouse = MouseEventInit {
            view: Some(EventTarget::Window),
            client_x: 10,
            client_y: 20,
            modifiers: Modifiers {
                shift: true,
                ..Modifiers::default()
            },
            ..MouseEventInit::default()
        };
        event
            .init_mouse_event(&EventInit::new("click", true, true), &mouse)
            .unwrap();

        assert!(event.is_initialized());
        assert_eq!(event.event_type, "click");
        assert_eq!(event.data("clientX"), Some(&Value::from(10)));
        assert_eq!(event.data("shiftKey"), Some(&Value::Bool(true)));
        assert_eq!(event.target_attr("view"), Some(EventTarget::Window));
    }

    #[test]
    fn test_keyboard_init_leaves_key_code() {
        let mut event = DomEvent::new(EventInterface::KeyboardEvent, Timestamp::zero());
        let key = KeyboardEventInit {
            key_identifier: "U+0041".to_string(),
            ..KeyboardEventInit::default()
        };
        event
            .init_keyboard_event(&EventInit::new("keydown", true, true), &key)
            .unwrap();
        assert_eq!(event.data("keyCode"), Some(&Value::from(0)));
        assert_eq!(event.data("keyIdentifier"), Some(&Value::from("U+0041")));
    }

    #[test]
    fn test_wrong_initializer() {
        let mut event = DomEvent::new(EventInterface::Event, Timestamp::zero());
        let err = event
            .init_mouse_event(&EventInit::new("click", true, true), &MouseEventInit::default())
            .unwrap_err();
        assert!(matches!(err, InitError::WrongInterface { .. }));

        let engine: EngineError = err.into();
        assert_eq!(engine.as_exception().map(|e| e.name.as_str()), Some("TypeError"));
    }

    #[test]
    fn test_prevent_default_needs_cancelable() {
        let mut event = DomEvent::trusted(
            EventInterface::Event,
            &EventInit::new("load", false, false),
            Timestamp::zero(),
        );
        event.prevent_default();
        assert!(!event.default_prevented);
        assert!(event.is_trusted);
    }
}
