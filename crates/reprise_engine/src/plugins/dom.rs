//! User-originated DOM events, intercepted at the binding library.
//!
//! Capture wraps every handler bound through the library. The first wrapped
//! handler to see a platform event logs it and stamps it `captured`, so an
//! event with many handlers is logged once. Wrapped handlers outlive the
//! session that bound them and record into whichever capture is running. Events raised by `trigger` have
//! no platform event and events built by the application are `synthetic`;
//! neither is logged.
//!
//! Replay rebuilds each event, restores the target's form value and
//! dispatches it. Handlers see the recorded values of fields the rebuilt
//! event could not carry.

use crate::context::{ActiveLog, CaptureContext, NativeRefs, ReplayContext, SessionLog};
use crate::plugin::{Completion, Hook, Plugin, require_natives};
use crate::scheduler::Continuation;
use reprise_core::{EngineError, EngineResult, Timestamp};
use reprise_dom::{DomEvent, EventTarget, serialize};
use reprise_host::{
    BoundEvent, BoundHandler, DateApi, EventBinding, HandlerId, WeakWindow, Window, bound_handler,
};
use reprise_log::{DomDetails, Entry, kind};
use serde_json::Value;
use std::rc::Rc;
use tracing::trace;

/// Log a platform event as a `dom` entry
pub(crate) fn log_dom_event(
    window: &Window,
    clock: &dyn DateApi,
    log: &SessionLog,
    event: &DomEvent,
) -> EngineResult<()> {
    let (attrs, value) = {
        let doc = window.document()?;
        let value = match event.target {
            Some(EventTarget::Element(node)) => doc.value(node).map(str::to_string),
            _ => None,
        };
        (serialize(&doc, event), value)
    };
    trace!(event_type = %event.event_type, "captured DOM event");
    let entry = Entry::with_details(
        kind::DOM,
        clock.now()?,
        &DomDetails {
            interface: event.interface.name().to_string(),
            attrs,
            value,
        },
    )?;
    log.push_event(entry)
}

/// Records and replays events delivered through the binding library
pub struct DomPlugin {
    natives: Option<NativeRefs>,
    hook: Hook<dyn EventBinding>,
    active: ActiveLog,
}

impl DomPlugin {
    /// Create the plugin
    #[must_use]
    pub fn new() -> Self {
        Self {
            natives: None,
            hook: Hook::new("binding"),
            active: ActiveLog::new(),
        }
    }
}

impl Default for DomPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for DomPlugin {
    fn init(&mut self, natives: &NativeRefs) -> EngineResult<()> {
        self.natives = Some(natives.clone());
        Ok(())
    }

    fn capture(&mut self, cx: &CaptureContext) -> EngineResult<()> {
        let natives = require_natives(&self.natives)?;
        self.active.attach(cx.log.clone())?;
        let slot = &cx.window.globals().binding;
        let wrapper = Rc::new(CapturingBinding {
            inner: slot.get(),
            window: cx.window.downgrade(),
            clock: Rc::clone(&natives.date),
            active: self.active.clone(),
        });
        self.hook.install(slot, wrapper);
        Ok(())
    }

    fn before_replay(&mut self, cx: &ReplayContext) -> EngineResult<()> {
        let slot = &cx.window.globals().binding;
        let wrapper = Rc::new(ReplayingBinding { inner: slot.get() });
        self.hook.install(slot, wrapper);
        Ok(())
    }

    fn replay(&mut self, entry: &Entry, _step: Continuation) -> EngineResult<Completion> {
        let natives = require_natives(&self.natives)?;
        let details: DomDetails = entry.details_as()?;
        let window = &natives.window;

        let (target, related) = {
            let doc = window.document()?;
            let related = match details.attrs.get("relatedTarget") {
                Some(path) => doc.traverse_value(path)?,
                None => None,
            };
            let target = doc
                .traverse_value(details.attrs.get("target").unwrap_or(&Value::Null))?
                .ok_or_else(|| EngineError::resolution("null", "replayed event has no target"))?;
            (target, related)
        };

        let mut event = natives.interfaces.create(
            &*natives.event_factory,
            &details.interface,
            &details.attrs,
            related,
        )?;
        if let (Some(value), EventTarget::Element(node)) = (details.value, target) {
            window.document_mut()?.set_value(node, Some(value))?;
        }
        window.dispatch_event(target, &mut event)?;
        Ok(Completion::Done)
    }

    fn clean_up(&mut self) -> EngineResult<()> {
        let natives = require_natives(&self.natives)?;
        self.hook.uninstall(&natives.window.globals().binding);
        self.active.detach()
    }
}

struct CapturingBinding {
    inner: Rc<dyn EventBinding>,
    window: WeakWindow,
    clock: Rc<dyn DateApi>,
    active: ActiveLog,
}

impl EventBinding for CapturingBinding {
    fn on(&self, target: EventTarget, event_type: &str, handler: BoundHandler) -> EngineResult<HandlerId> {
        let window = self.window.clone();
        let clock = Rc::clone(&self.clock);
        let active = self.active.clone();
        let wrapped = bound_handler(move |event| {
            if let (Some(log), Some(original)) = (active.get(), event.original_mut()) {
                if !original.marker.captured && !original.marker.synthetic {
                    original.marker.captured = true;
                    log_dom_event(&window.upgrade()?, &*clock, &log, original)?;
                }
            }
            handler(event)
        });
        self.inner.on(target, event_type, wrapped)
    }

    fn off(&self, target: EventTarget, event_type: &str, id: HandlerId) -> EngineResult<bool> {
        self.inner.off(target, event_type, id)
    }

    fn trigger(&self, target: EventTarget, event_type: &str) -> EngineResult<()> {
        self.inner.trigger(target, event_type)
    }
}

struct ReplayingBinding {
    inner: Rc<dyn EventBinding>,
}

// Recorded values win over whatever the rebuilt event carries
fn apply_fix_up(event: &mut BoundEvent<'_>) {
    let Some((fields, recorded)) = event.original().and_then(|original| {
        original
            .marker
            .recorded
            .clone()
            .map(|recorded| (original.marker.fix_up.clone(), recorded))
    }) else {
        return;
    };

    for field in fields {
        let Some(value) = recorded.get(&field) else {
            continue;
        };
        if field == "timeStamp" {
            if let Some(millis) = value.as_i64() {
                event.time_stamp = Timestamp::from_millis(millis);
            }
        } else {
            event.set_field(&field, value.clone());
        }
    }
}

impl EventBinding for ReplayingBinding {
    fn on(&self, target: EventTarget, event_type: &str, handler: BoundHandler) -> EngineResult<HandlerId> {
        let wrapped = bound_handler(move |event| {
            apply_fix_up(event);
            handler(event)
        });
        self.inner.on(target, event_type, wrapped)
    }

    fn off(&self, target: EventTarget, event_type: &str, id: HandlerId) -> EngineResult<bool> {
        self.inner.off(target, event_type, id)
    }

    fn trigger(&self, target: EventTarget, event_type: &str) -> EngineResult<()> {
        self.inner.trigger(target, event_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::CreateEventPlugin;
    use crate::session::Engine;
    use reprise_core::{CaptureConfig, ReplayConfig};
    use reprise_dom::{EventInit, MouseEventInit, NodeId};
    use reprise_log::Log;
    use serde_json::json;
    use std::cell::RefCell;

    fn plugged(window: &Window) -> Engine {
        let mut engine = Engine::bare(window);
        engine.plug("document-create-event", CreateEventPlugin::new()).unwrap();
        engine.plug(kind::DOM, DomPlugin::new()).unwrap();
        engine
    }

    fn page(window: &Window) -> (NodeId, NodeId) {
        let mut doc = window.document_mut().unwrap();
        let form = doc.create_element("form");
        let field = doc.create_element("input");
        let body = doc.body();
        doc.append_child(body, form).unwrap();
        doc.append_child(form, field).unwrap();
        (form, field)
    }

    fn dom_entries(log: &Log) -> Vec<DomDetails> {
        log.events
            .iter()
            .filter(|e| e.kind == kind::DOM)
            .map(|e| e.details_as().unwrap())
            .collect()
    }

    #[test]
    fn test_event_with_many_handlers_logged_once() {
        let window = Window::default();
        let (form, field) = page(&window);
        let mut engine = plugged(&window);
        engine.capture(CaptureConfig::default()).unwrap();

        let calls = Rc::new(RefCell::new(0));
        for target in [field, field, form] {
            let c = Rc::clone(&calls);
            window
                .binding()
                .on(
                    EventTarget::Element(target),
                    "click",
                    bound_handler(move |_| {
                        *c.borrow_mut() += 1;
                        Ok(())
                    }),
                )
                .unwrap();
        }
        window.click(EventTarget::Element(field)).unwrap();

        assert_eq!(*calls.borrow(), 3);
        let entries = dom_entries(&engine.flush().unwrap());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].interface, "MouseEvent");
        assert_eq!(entries[0].attrs["target"], json!([0, 0, "body"]));
        assert_eq!(entries[0].attrs["type"], "click");
    }

    #[test]
    fn test_trigger_and_synthetic_events_not_logged() {
        let window = Window::default();
        let (_, field) = page(&window);
        let target = EventTarget::Element(field);
        let mut engine = plugged(&window);
        engine.capture(CaptureConfig::default()).unwrap();

        let calls = Rc::new(RefCell::new(0));
        let c = Rc::clone(&calls);
        window
            .binding()
            .on(
                target,
                "click",
                bound_handler(move |_| {
                    *c.borrow_mut() += 1;
                    Ok(())
                }),
            )
            .unwrap();

        window.binding().trigger(target, "click").unwrap();
        let mut synthetic = window.event_factory().create_event("MouseEvent").unwrap();
        synthetic
            .init_mouse_event(
                &EventInit::new("click", true, true),
                &MouseEventInit::default(),
            )
            .unwrap();
        window.dispatch_event(target, &mut synthetic).unwrap();

        assert_eq!(*calls.borrow(), 2);
        assert!(dom_entries(&engine.flush().unwrap()).is_empty());
    }

    #[test]
    fn test_replay_restores_value_and_fix_up() {
        let window = Window::default();
        let (_, field) = page(&window);
        let target = EventTarget::Element(field);
        let mut engine = plugged(&window);
        engine.capture(CaptureConfig::default()).unwrap();
        window
            .binding()
            .on(target, "keydown", bound_handler(|_| Ok(())))
            .unwrap();
        window.document_mut().unwrap().set_value(field, Some("ab".to_string())).unwrap();
        window.run_for(25).unwrap();
        window.key(target, "keydown", 65, 0).unwrap();
        engine.clean_up().unwrap();
        let log = engine.flush().unwrap();
        let recorded_at = dom_entries(&log)[0].attrs["timeStamp"].clone();

        let replay_window = Window::default();
        let (_, replay_field) = page(&replay_window);
        let mut replayer = plugged(&replay_window);
        replayer.replay(log, ReplayConfig::default()).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        replay_window
            .binding()
            .on(
                EventTarget::Element(replay_field),
                "keydown",
                bound_handler(move |event| {
                    s.borrow_mut().push((
                        event.field("keyCode").cloned(),
                        event.field("which").cloned(),
                        event.time_stamp.as_millis(),
                    ));
                    Ok(())
                }),
            )
            .unwrap();
        replay_window.run_until_idle().unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![(Some(json!(65)), Some(json!(65)), recorded_at.as_i64().unwrap())]
        );
        assert_eq!(
            replay_window.document().unwrap().value(replay_field),
            Some("ab")
        );
    }

    #[test]
    fn test_handler_from_earlier_session_records_into_current_capture() {
        let window = Window::default();
        let (_, field) = page(&window);
        let target = EventTarget::Element(field);
        let mut engine = plugged(&window);
        engine.capture(CaptureConfig::default()).unwrap();

        let calls = Rc::new(RefCell::new(0));
        let c = Rc::clone(&calls);
        window
            .binding()
            .on(
                target,
                "click",
                bound_handler(move |_| {
                    *c.borrow_mut() += 1;
                    Ok(())
                }),
            )
            .unwrap();
        window.click(target).unwrap();
        engine.clean_up().unwrap();

        window.click(target).unwrap();
        assert_eq!(dom_entries(&engine.flush().unwrap()).len(), 1);

        engine.capture(CaptureConfig::default()).unwrap();
        window.click(target).unwrap();

        assert_eq!(*calls.borrow(), 3);
        let entries = dom_entries(&engine.flush().unwrap());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].attrs["type"], "click");
    }

    #[test]
    fn test_replay_fix_up_reaches_every_handler() {
        let window = Window::default();
        let (form, field) = page(&window);
        let target = EventTarget::Element(field);
        let mut engine = plugged(&window);
        engine.capture(CaptureConfig::default()).unwrap();
        for bound in [field, field, form] {
            window
                .binding()
                .on(EventTarget::Element(bound), "keydown", bound_handler(|_| Ok(())))
                .unwrap();
        }
        window.run_for(40).unwrap();
        window.key(target, "keydown", 13, 0).unwrap();
        engine.clean_up().unwrap();
        let log = engine.flush().unwrap();
        let entries = dom_entries(&log);
        assert_eq!(entries.len(), 1);
        let recorded_at = entries[0].attrs["timeStamp"].as_i64().unwrap();

        let replay_window = Window::default();
        let (replay_form, replay_field) = page(&replay_window);
        let mut replayer = plugged(&replay_window);
        replayer.replay(log, ReplayConfig::default()).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        for (index, bound) in [replay_field, replay_field, replay_form].into_iter().enumerate() {
            let s = Rc::clone(&seen);
            replay_window
                .binding()
                .on(
                    EventTarget::Element(bound),
                    "keydown",
                    bound_handler(move |event| {
                        s.borrow_mut().push((
                            index,
                            event.field("keyCode").cloned(),
                            event.field("which").cloned(),
                            event.time_stamp.as_millis(),
                        ));
                        Ok(())
                    }),
                )
                .unwrap();
        }
        replay_window.run_until_idle().unwrap();

        let expected: Vec<_> = (0..3)
            .map(|index| (index, Some(json!(13)), Some(json!(13)), recorded_at))
            .collect();
        assert_eq!(*seen.borrow(), expected);
    }

    #[test]
    fn test_unresolvable_target_fails() {
        let window = Window::default();
        let mut engine = plugged(&window);
        let mut log = Log::new();
        log.push_event(
            Entry::with_details(
                kind::DOM,
                Timestamp::zero(),
                &DomDetails {
                    interface: "MouseEvent".to_string(),
                    attrs: json!({"type": "click", "target": [3, "body"]})
                        .as_object()
                        .cloned()
                        .unwrap(),
                    value: None,
                },
            )
            .unwrap(),
        );
        engine.replay(log, ReplayConfig::default()).unwrap();

        let err = window.run_until_idle().unwrap_err();
        assert!(matches!(err, EngineError::Resolution { .. }));
    }
}
