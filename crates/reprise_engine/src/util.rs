//! Helpers for applications that drive the engine directly.

/// Event serialization and reconstruction
pub mod event {
    use reprise_core::EngineResult;
    use reprise_dom::{DomEvent, EventFactory, InterfaceRegistry};
    use serde_json::{Map, Value};

    pub use reprise_dom::serialize;

    /// Rebuild an event of interface `name` from serialized attributes
    ///
    /// `relatedTarget` is left unset; resolving it needs the document.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedInterface` for unknown names, and any error the
    /// factory raises
    pub fn create(
        registry: &InterfaceRegistry,
        factory: &dyn EventFactory,
        name: &str,
        attrs: &Map<String, Value>,
    ) -> EngineResult<DomEvent> {
        registry.create(factory, name, attrs, None)
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use reprise_dom::{Document, EventTarget};
        use reprise_host::Window;
        use serde_json::json;

        #[test]
        fn test_serialize_then_create() {
            let window = Window::default();
            let factory = window.event_factory();
            let registry = InterfaceRegistry::detect(&*factory);

            let recorded = match json!({"type": "click", "bubbles": true, "clientX": 7}) {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            let mut event = create(&registry, &*factory, "MouseEvent", &recorded).unwrap();
            assert_eq!(event.event_type, "click");

            let doc = Document::new();
            event.target = Some(EventTarget::Element(doc.body()));
            let attrs = serialize(&doc, &event);
            assert_eq!(attrs["clientX"], 7);
            assert_eq!(attrs["target"], json!(["body"]));
        }
    }
}
