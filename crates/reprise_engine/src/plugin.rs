//! The plugin contract.
//!
//! A plugin owns one source of non-determinism. It installs wrappers into
//! the window's capability slots when a session starts and restores the
//! previous slot values on clean-up.

use crate::context::{CaptureContext, NativeRefs, ReplayContext};
use crate::scheduler::Continuation;
use reprise_core::{EngineError, EngineResult};
use reprise_host::Global;
use reprise_log::Entry;
use std::rc::Rc;
use tracing::debug;

/// How a replay handler finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The entry is fully replayed
    Done,
    /// The plugin resumes the continuation once pending work completes
    Deferred,
}

/// One interceptor
pub trait Plugin {
    /// Receive the native capabilities, once, when plugged
    ///
    /// # Errors
    ///
    /// Returns error if the plugin cannot work with these natives
    fn init(&mut self, natives: &NativeRefs) -> EngineResult<()>;

    /// Start recording
    ///
    /// # Errors
    ///
    /// Returns error if the wrappers cannot be installed
    fn capture(&mut self, cx: &CaptureContext) -> EngineResult<()>;

    /// Prepare for replaying `cx.log`
    ///
    /// # Errors
    ///
    /// Returns error if the wrappers cannot be installed
    fn before_replay(&mut self, _cx: &ReplayContext) -> EngineResult<()> {
        Ok(())
    }

    /// Reproduce one recorded entry
    ///
    /// Plugins that log no entries keep the default, which rejects the entry.
    ///
    /// # Errors
    ///
    /// Returns error if the entry cannot be reproduced
    fn replay(&mut self, entry: &Entry, _step: Continuation) -> EngineResult<Completion> {
        Err(cannot_replay(&entry.kind))
    }

    /// Restore every slot this plugin replaced
    ///
    /// # Errors
    ///
    /// Returns error if restoring the page fails
    fn clean_up(&mut self) -> EngineResult<()>;
}

pub(crate) fn cannot_replay(kind: &str) -> EngineError {
    EngineError::invalid_state(format!("Cannot replay event of type \"{}\"", kind))
}

/// The natives handed to `init`
///
/// # Errors
///
/// Returns `InvalidState` if the plugin was never plugged
pub fn require_natives(natives: &Option<NativeRefs>) -> EngineResult<&NativeRefs> {
    natives
        .as_ref()
        .ok_or_else(|| EngineError::invalid_state("plugin used before init"))
}

/// A wrapper installed into a capability slot
///
/// Remembers the value it displaced so clean-up puts it back.
pub struct Hook<T: ?Sized> {
    name: &'static str,
    previous: Option<Rc<T>>,
}

impl<T: ?Sized> Hook<T> {
    /// Hook for the slot called `name`
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            previous: None,
        }
    }

    /// Put `wrapper` into `slot`, returning the value it displaced
    ///
    /// A hook that is already installed is uninstalled first.
    pub fn install(&mut self, slot: &Global<T>, wrapper: Rc<T>) -> Rc<T> {
        self.uninstall(slot);
        let previous = slot.replace(wrapper);
        self.previous = Some(Rc::clone(&previous));
        debug!(slot = self.name, "installed wrapper");
        previous
    }

    /// Restore the displaced value
    pub fn uninstall(&mut self, slot: &Global<T>) {
        if let Some(previous) = self.previous.take() {
            slot.set(previous);
            debug!(slot = self.name, "restored native");
        }
    }

    /// Whether a wrapper is installed
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.previous.is_some()
    }
}

impl<T: ?Sized> std::fmt::Debug for Hook<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hook")
            .field("name", &self.name)
            .field("installed", &self.is_installed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reprise_host::{MathApi, Window};

    struct Fixed(f64);

    impl MathApi for Fixed {
        fn random(&self) -> EngineResult<f64> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_hook_restores_previous() {
        let window = Window::default();
        let slot = &window.globals().math;
        let native = slot.get();
        let mut hook = Hook::new("Math.random");

        hook.install(slot, Rc::new(Fixed(0.1)));
        hook.install(slot, Rc::new(Fixed(0.2)));
        assert_eq!(window.math().random().unwrap(), 0.2);

        hook.uninstall(slot);
        assert!(slot.holds(&native));
        assert!(!hook.is_installed());
    }

    #[test]
    fn test_require_natives() {
        assert!(require_natives(&None).is_err());
    }
}
