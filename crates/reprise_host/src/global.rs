//! Swappable global slots.
//!
//! Application code reads a slot each time it uses a capability, so
//! replacing the value redirects every later use. Borrows of the slot never
//! outlive a single `get` or `replace`.

use std::cell::RefCell;
use std::rc::Rc;

/// A replaceable capability
pub struct Global<T: ?Sized> {
    value: RefCell<Rc<T>>,
}

impl<T: ?Sized> Global<T> {
    /// Create a slot holding `value`
    pub fn new(value: Rc<T>) -> Self {
        Self {
            value: RefCell::new(value),
        }
    }

    /// Current value
    #[must_use]
    pub fn get(&self) -> Rc<T> {
        Rc::clone(&self.value.borrow())
    }

    /// Install `value`, returning the previous one
    pub fn replace(&self, value: Rc<T>) -> Rc<T> {
        self.value.replace(value)
    }

    /// Install `value`
    pub fn set(&self, value: Rc<T>) {
        self.value.replace(value);
    }

    /// Whether the slot currently holds `value`
    #[must_use]
    pub fn holds(&self, value: &Rc<T>) -> bool {
        Rc::ptr_eq(&self.value.borrow(), value)
    }
}

impl<T: ?Sized> std::fmt::Debug for Global<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Global").finish_non_exhaustive()
    }
}
