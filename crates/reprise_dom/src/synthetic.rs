//! Synthetic event reconstruction.
//!
//! Rebuilds a live event from its serialized attributes. Which interfaces
//! the platform can allocate with their own initializer is detected once when
//! the registry is built; interfaces it cannot allocate fall back to a plain
//! `Event` with the attributes assigned by hand.

use crate::event::{
    AttrValue, DomEvent, EventInit, EventInterface, EventTarget, KeyboardEventInit, Modifiers,
    MouseEventInit,
};
use indexmap::IndexMap;
use reprise_core::{DomException, EngineError, EngineResult};
use serde_json::{Map, Value};
use tracing::debug;

/// The platform's `document.createEvent`
pub trait EventFactory {
    /// Allocate an uninitialized event of the named interface
    ///
    /// # Errors
    ///
    /// Returns `NotSupportedError` if the platform lacks the interface
    fn create_event(&self, interface: &str) -> Result<DomEvent, DomException>;
}

const KEYBOARD_FIX_UP: &[&str] = &[
    "which",
    "altGraphKey",
    "metaKey",
    "altKey",
    "shiftKey",
    "ctrlKey",
    "keyLocation",
    "keyIdentifier",
    "pageY",
    "pageX",
    "layerY",
    "layerX",
    "charCode",
    "keyCode",
    "detail",
    "view",
    "clipboardData",
    "timeStamp",
];

const DEFAULT_FIX_UP: &[&str] = &["timeStamp"];

/// Fields a rebuilt event of `interface` cannot carry faithfully
///
/// Replay re-applies the recorded values of these fields onto the
/// normalized event handlers see.
#[must_use]
pub fn fix_up_fields(interface: EventInterface) -> &'static [&'static str] {
    match interface {
        EventInterface::KeyboardEvent => KEYBOARD_FIX_UP,
        _ => DEFAULT_FIX_UP,
    }
}

/// Interfaces the platform allocates natively
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceRegistry {
    native: IndexMap<EventInterface, bool>,
}

impl InterfaceRegistry {
    /// Ask `factory` once per interface whether it can allocate it
    pub fn detect(factory: &dyn EventFactory) -> Self {
        let native = EventInterface::ALL
            .into_iter()
            .map(|iface| {
                let supported = factory
                    .create_event(iface.name())
                    .map(|event| event.interface == iface)
                    .unwrap_or(false);
                (iface, supported)
            })
            .collect::<IndexMap<_, _>>();
        debug!(
            native = native.values().filter(|v| **v).count(),
            "detected event interfaces"
        );
        Self { native }
    }

    /// Registry that treats every interface as native
    #[must_use]
    pub fn all_native() -> Self {
        Self {
            native: EventInterface::ALL.into_iter().map(|i| (i, true)).collect(),
        }
    }

    /// Whether the platform allocates `interface` itself
    #[must_use]
    pub fn is_native(&self, interface: EventInterface) -> bool {
        self.native.get(&interface).copied().unwrap_or(false)
    }

    /// Rebuild an event of interface `name` from serialized attributes
    ///
    /// `related_target` is the already resolved `relatedTarget`. The event is
    /// tagged with its fix-up list and the attributes it was built from.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedInterface` for unknown names, and any error the
    /// factory or the initializer raises
    pub fn create(
        &self,
        factory: &dyn EventFactory,
        name: &str,
        attrs: &Map<String, Value>,
        related_target: Option<EventTarget>,
    ) -> EngineResult<DomEvent> {
        let iface = EventInterface::from_name(name).ok_or_else(|| {
            EngineError::UnsupportedInterface {
                name: name.to_string(),
            }
        })?;
        let init = EventInit::new(
            str_attr(attrs, "type"),
            bool_attr(attrs, "bubbles"),
            bool_attr(attrs, "cancelable"),
        );

        let mut event = if self.is_native(iface) {
            let mut event = factory.create_event(iface.name())?;
            init_native(&mut event, iface, &init, attrs, related_target)?;
            event
        } else {
            let mut event = factory.create_event(EventInterface::Event.name())?;
            event.init_event(&init)?;
            for (field, default) in iface.default_attrs() {
                match default {
                    AttrValue::Target(_) if field == "relatedTarget" => {
                        event.set_target_attr(field, related_target);
                    }
                    AttrValue::Target(_) => event.set_target_attr(field, view(attrs)),
                    AttrValue::Data(fallback) => {
                        event.set_data(field, attrs.get(field).cloned().unwrap_or(fallback));
                    }
                }
            }
            event
        };

        event.marker.fix_up = fix_up_fields(iface)
            .iter()
            .map(|f| (*f).to_string())
            .collect();
        event.marker.recorded = Some(attrs.clone());
        Ok(event)
    }
}

fn init_native(
    event: &mut DomEvent,
    iface: EventInterface,
    init: &EventInit,
    attrs: &Map<String, Value>,
    related_target: Option<EventTarget>,
) -> EngineResult<()> {
    match iface {
        EventInterface::Event => event.init_event(init)?,
        EventInterface::UIEvent => {
            event.init_ui_event(init, view(attrs), int_attr(attrs, "detail"))?;
        }
        EventInterface::FocusEvent => event.init_focus_event(
            init,
            view(attrs),
            int_attr(attrs, "detail"),
            related_target,
        )?,
        EventInterface::MouseEvent => event.init_mouse_event(
            init,
            &MouseEventInit {
                view: Some(EventTarget::Window),
                detail: int_attr(attrs, "detail"),
                screen_x: int_attr(attrs, "screenX"),
                screen_y: int_attr(attrs, "screenY"),
                client_x: int_attr(attrs, "clientX"),
                client_y: int_attr(attrs, "clientY"),
                modifiers: modifiers(attrs),
                button: int_attr(attrs, "button"),
                related_target,
            },
        )?,
        EventInterface::KeyboardEvent => event.init_keyboard_event(
            init,
            &KeyboardEventInit {
                view: Some(EventTarget::Window),
                key_identifier: str_attr(attrs, "keyIdentifier"),
                key_location: int_attr(attrs, "keyLocation"),
                modifiers: modifiers(attrs),
                repeat: bool_attr(attrs, "repeat"),
            },
        )?,
        EventInterface::HashChangeEvent => event.init_hash_change_event(
            init,
            &str_attr(attrs, "oldURL"),
            &str_attr(attrs, "newURL"),
        )?,
        EventInterface::PopStateEvent => event.init_pop_state_event(
            init,
            attrs.get("state").cloned().unwrap_or(Value::Null),
        )?,
    }
    Ok(())
}

fn str_attr(attrs: &Map<String, Value>, name: &str) -> String {
    attrs
        .get(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn bool_attr(attrs: &Map<String, Value>, name: &str) -> bool {
    attrs.get(name).and_then(Value::as_bool).unwrap_or(false)
}

fn int_attr(attrs: &Map<String, Value>, name: &str) -> i64 {
    attrs
        .get(name)
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .unwrap_or(0)
}

fn modifiers(attrs: &Map<String, Value>) -> Modifiers {
    Modifiers {
        ctrl: bool_attr(attrs, "ctrlKey"),
        alt: bool_attr(attrs, "altKey"),
        shift: bool_attr(attrs, "shiftKey"),
        meta: bool_attr(attrs, "metaKey"),
    }
}

fn view(attrs: &Map<String, Value>) -> Option<EventTarget> {
    match attrs.get("view").and_then(Value::as_str) {
        Some("window") => Some(EventTarget::Window),
        _ => None,
    }
}
