//! Event serialization.
//!
//! Produces a plain JSON object with every enumerable attribute of an event.
//! Node-valued attributes become structural paths and the window becomes
//! `"window"`.

use crate::document::Document;
use crate::event::{AttrValue, DomEvent};
use serde_json::{Map, Value};

/// Serialize `event` against the document it was dispatched in
#[must_use]
pub fn serialize(doc: &Document, event: &DomEvent) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert("type".to_string(), Value::from(event.event_type.clone()));
    out.insert("bubbles".to_string(), Value::Bool(event.bubbles));
    out.insert("cancelable".to_string(), Value::Bool(event.cancelable));
    out.insert(
        "timeStamp".to_string(),
        Value::from(event.time_stamp.as_millis()),
    );
    out.insert("eventPhase".to_string(), Value::from(event.phase.as_u8()));
    out.insert(
        "defaultPrevented".to_string(),
        Value::Bool(event.default_prevented),
    );
    out.insert("isTrusted".to_string(), Value::Bool(event.is_trusted));
    out.insert("target".to_string(), doc.path_of(event.target).into());
    out.insert(
        "currentTarget".to_string(),
        doc.path_of(event.current_target).into(),
    );

    for (name, value) in &event.attrs {
        let json = match value {
            AttrValue::Data(data) => data.clone(),
            AttrValue::Target(target) => doc.path_of(*target).into(),
        };
        out.insert(name.clone(), json);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventInit, EventInterface, EventTarget, MouseEventInit};
    use reprise_core::Timestamp;
    use serde_json::json;

    #[test]
    fn test_serialize_mouse_event() {
        let mut doc = Document::new();
        let button = doc.create_element("button");
        doc.append_child(doc.body(), button).unwrap();

        let mut event = DomEvent::new(EventInterface::MouseEvent, Timestamp::from_millis(99));
        event
            .init_mouse_event(
                &EventInit::new("click", true, true),
                &MouseEventInit {
                    view: Some(EventTarget::Window),
                    client_x: 3,
                    related_target: Some(EventTarget::Document),
                    ..MouseEventInit::default()
                },
            )
            .unwrap();
        event.target = Some(EventTarget::Element(button));
        event.current_target = Some(EventTarget::Element(doc.body()));

        let attrs = serialize(&doc, &event);
        assert_eq!(attrs["type"], "click");
        assert_eq!(attrs["timeStamp"], 99);
        assert_eq!(attrs["target"], json!([0, "body"]));
        assert_eq!(attrs["currentTarget"], json!(["body"]));
        assert_eq!(attrs["view"], "window");
        assert_eq!(attrs["relatedTarget"], json!([]));
        assert_eq!(attrs["clientX"], 3);
    }

    #[test]
    fn test_serialize_window_event() {
        let doc = Document::new();
        let mut event = DomEvent::trusted(
            EventInterface::HashChangeEvent,
            &EventInit::new("hashchange", false, false),
            Timestamp::zero(),
        );
        event.target = Some(EventTarget::Window);

        let attrs = serialize(&doc, &event);
        assert_eq!(attrs["target"], "window");
        assert_eq!(attrs["currentTarget"], Value::Null);
        assert_eq!(attrs["oldURL"], "");
        assert_eq!(attrs["isTrusted"], true);
    }
}
