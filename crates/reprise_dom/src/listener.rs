//! Listener registrations per target.
//!
//! Listeners are identified by `Rc` pointer identity, like functions in a
//! scripting host: registering the same listener twice for the same type
//! and phase is a no-op, and removal needs the registered handle.

use crate::event::{DomEvent, EventTarget};
use indexmap::IndexMap;
use reprise_core::{EngineError, EngineResult};
use std::cell::RefCell;
use std::rc::Rc;

/// An event listener
pub type Listener = Rc<dyn Fn(&mut DomEvent) -> EngineResult<()>>;

/// Wrap a closure as a [`Listener`]
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&mut DomEvent) -> EngineResult<()> + 'static,
{
    Rc::new(f)
}

#[derive(Clone)]
struct Registration {
    event_type: String,
    capture: bool,
    listener: Listener,
}

/// Listener registrations of every target in one window
#[derive(Default)]
pub struct ListenerStore {
    entries: RefCell<IndexMap<EventTarget, Vec<Registration>>>,
}

impl ListenerStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener
    ///
    /// # Errors
    ///
    /// Returns error if called while the store is borrowed
    pub fn add(
        &self,
        target: EventTarget,
        event_type: &str,
        listener: Listener,
        capture: bool,
    ) -> EngineResult<()> {
        let mut entries = self
            .entries
            .try_borrow_mut()
            .map_err(|_| EngineError::invalid_state("listener store is busy"))?;
        let registrations = entries.entry(target).or_default();

        let duplicate = registrations.iter().any(|r| {
            r.event_type == event_type && r.capture == capture && Rc::ptr_eq(&r.listener, &listener)
        });
        if !duplicate {
            registrations.push(Registration {
                event_type: event_type.to_string(),
                capture,
                listener,
            });
        }
        Ok(())
    }

    /// Unregister a listener, returning whether it was registered
    ///
    /// # Errors
    ///
    /// Returns error if called while the store is borrowed
    pub fn remove(
        &self,
        target: EventTarget,
        event_type: &str,
        listener: &Listener,
        capture: bool,
    ) -> EngineResult<bool> {
        let mut entries = self
            .entries
            .try_borrow_mut()
            .map_err(|_| EngineError::invalid_state("listener store is busy"))?;
        let Some(registrations) = entries.get_mut(&target) else {
            return Ok(false);
        };

        let before = registrations.len();
        registrations.retain(|r| {
            !(r.event_type == event_type && r.capture == capture && Rc::ptr_eq(&r.listener, listener))
        });
        Ok(registrations.len() != before)
    }

    /// Snapshot of the listeners for one target, type and phase
    ///
    /// The snapshot is taken before any listener runs so listeners may add
    /// or remove registrations freely.
    ///
    /// # Errors
    ///
    /// Returns error if called while the store is borrowed
    pub fn snapshot(
        &self,
        target: EventTarget,
        event_type: &str,
        capture: bool,
    ) -> EngineResult<Vec<Listener>> {
        let entries = self
            .entries
            .try_borrow()
            .map_err(|_| EngineError::invalid_state("listener store is busy"))?;
        Ok(entries
            .get(&target)
            .map(|registrations| {
                registrations
                    .iter()
                    .filter(|r| r.event_type == event_type && r.capture == capture)
                    .map(|r| Rc::clone(&r.listener))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Number of listeners for one target and type, in either phase
    #[must_use]
    pub fn count(&self, target: EventTarget, event_type: &str) -> usize {
        self.entries
            .try_borrow()
            .map(|entries| {
                entries
                    .get(&target)
                    .map(|r| r.iter().filter(|r| r.event_type == event_type).count())
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    /// Drop every registration of a target
    ///
    /// # Errors
    ///
    /// Returns error if called while the store is borrowed
    pub fn clear_target(&self, target: EventTarget) -> EngineResult<()> {
        self.entries
            .try_borrow_mut()
            .map_err(|_| EngineError::invalid_state("listener store is busy"))?
            .shift_remove(&target);
        Ok(())
    }
}

impl std::fmt::Debug for ListenerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let targets = self.entries.try_borrow().map(|e| e.len()).unwrap_or(0);
        f.debug_struct("ListenerStore")
            .field("targets", &targets)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Listener {
        listener(|_| Ok(()))
    }

    #[test]
    fn test_add_is_idempotent() {
        let store = ListenerStore::new();
        let l = noop();
        store.add(EventTarget::Window, "load", Rc::clone(&l), false).unwrap();
        store.add(EventTarget::Window, "load", Rc::clone(&l), false).unwrap();
        store.add(EventTarget::Window, "load", Rc::clone(&l), true).unwrap();

        assert_eq!(store.count(EventTarget::Window, "load"), 2);
        assert_eq!(store.snapshot(EventTarget::Window, "load", false).unwrap().len(), 1);
    }

    #[test]
    fn test_remove_by_identity() {
        let store = ListenerStore::new();
        let a = noop();
        let b = noop();
        store.add(EventTarget::Document, "click", Rc::clone(&a), false).unwrap();
        store.add(EventTarget::Document, "click", Rc::clone(&b), false).unwrap();

        assert!(store.remove(EventTarget::Document, "click", &a, false).unwrap());
        assert!(!store.remove(EventTarget::Document, "click", &a, false).unwrap());
        assert!(!store.remove(EventTarget::Document, "click", &b, true).unwrap());
        assert_eq!(store.count(EventTarget::Document, "click"), 1);
    }

    #[test]
    fn test_clear_target() {
        let store = ListenerStore::new();
        store.add(EventTarget::Window, "load", noop(), false).unwrap();
        store.clear_target(EventTarget::Window).unwrap();
        assert_eq!(store.count(EventTarget::Window, "load"), 0);
    }
}
