//! Plugins by the entry type they replay.

use crate::plugin::Plugin;
use indexmap::IndexMap;
use reprise_core::{EngineError, EngineResult};
use std::cell::RefCell;
use std::rc::Rc;

/// A registered plugin
pub type SharedPlugin = Rc<RefCell<dyn Plugin>>;

/// Registered plugins in registration order
#[derive(Default)]
pub struct PluginRegistry {
    plugins: IndexMap<String, SharedPlugin>,
}

impl PluginRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `plugin` under `kind`
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if `kind` is taken
    pub fn register(&mut self, kind: &str, plugin: SharedPlugin) -> EngineResult<()> {
        if self.plugins.contains_key(kind) {
            return Err(EngineError::invalid_state(format!(
                "a plugin is already registered for \"{}\"",
                kind
            )));
        }
        self.plugins.insert(kind.to_string(), plugin);
        Ok(())
    }

    /// Plugin registered under `kind`
    #[must_use]
    pub fn get(&self, kind: &str) -> Option<SharedPlugin> {
        self.plugins.get(kind).map(Rc::clone)
    }

    /// Whether `kind` is registered
    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.plugins.contains_key(kind)
    }

    /// Registered kinds in registration order
    #[must_use]
    pub fn kinds(&self) -> Vec<String> {
        self.plugins.keys().cloned().collect()
    }

    /// Snapshot of every plugin in registration order
    #[must_use]
    pub fn plugins(&self) -> Vec<(String, SharedPlugin)> {
        self.plugins
            .iter()
            .map(|(kind, plugin)| (kind.clone(), Rc::clone(plugin)))
            .collect()
    }

    /// Number of plugins
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CaptureContext, NativeRefs};

    struct Noop;

    impl Plugin for Noop {
        fn init(&mut self, _natives: &NativeRefs) -> EngineResult<()> {
            Ok(())
        }

        fn capture(&mut self, _cx: &CaptureContext) -> EngineResult<()> {
            Ok(())
        }

        fn clean_up(&mut self) -> EngineResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_register_once() {
        let mut registry = PluginRegistry::new();
        registry.register("a", Rc::new(RefCell::new(Noop))).unwrap();
        registry.register("b", Rc::new(RefCell::new(Noop))).unwrap();
        assert!(registry.register("a", Rc::new(RefCell::new(Noop))).is_err());

        assert_eq!(registry.kinds(), vec!["a", "b"]);
        assert!(registry.contains("b"));
        assert!(registry.get("c").is_none());
        assert_eq!(registry.len(), 2);
    }
}
