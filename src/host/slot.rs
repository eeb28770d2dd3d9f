//! Rebindable host API bindings.

use std::cell::RefCell;
use std::rc::Rc;

/// A mutable binding holding the current implementation of one host API.
///
/// Callers always go through [`ApiSlot::get`], so rebinding the slot changes
/// what every subsequent call reaches. Mocks rebind a slot before a capability
/// wraps it; the capability then forwards to whatever it found.
pub struct ApiSlot<F: ?Sized> {
    current: RefCell<Rc<F>>,
}

impl<F: ?Sized> ApiSlot<F> {
    pub fn new(implementation: Rc<F>) -> Rc<Self> {
        Rc::new(Self {
            current: RefCell::new(implementation),
        })
    }

    pub fn get(&self) -> Rc<F> {
        self.current.borrow().clone()
    }

    /// Bind `implementation`, returning the previous one.
    pub fn replace(&self, implementation: Rc<F>) -> Rc<F> {
        std::mem::replace(&mut *self.current.borrow_mut(), implementation)
    }

    /// Bind `make(previous)` and return a handle that puts `previous` back.
    pub fn wrap(self: &Rc<Self>, make: impl FnOnce(Rc<F>) -> Rc<F>) -> Restore<F> {
        let original = self.get();
        self.replace(make(original.clone()));
        Restore {
            slot: self.clone(),
            original,
        }
    }

    pub fn is_bound_to(&self, implementation: &Rc<F>) -> bool {
        Rc::ptr_eq(&*self.current.borrow(), implementation)
    }
}

/// Undo handle returned by [`ApiSlot::wrap`].
pub struct Restore<F: ?Sized> {
    slot: Rc<ApiSlot<F>>,
    original: Rc<F>,
}

impl<F: ?Sized> Restore<F> {
    pub fn original(&self) -> Rc<F> {
        self.original.clone()
    }

    pub fn restore(self) {
        self.slot.replace(self.original);
    }
}
