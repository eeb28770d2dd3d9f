//! `eventListener`: per-target listeners keyed by listener type.
//!
//! The host only ever sees the contained wrapper, so a later removal naming
//! the user's callback is rewritten to name the wrapper it was registered as.

use crate::capability::names;
use crate::capability::CallbackApi;
use crate::host::{
    AddCall, AddFn, ApiSlot, Callback, Host, RemoveCall, RemoveFn, Target, WeakCallback,
};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::trace;

/// Both callbacks are held weakly: the host owns the wrapper for as long as
/// the listener is live, and the wrapper owns the user's callback.
struct Registration {
    target: Target,
    listener_type: String,
    user: WeakCallback,
    wrapped: WeakCallback,
}

impl Registration {
    fn live(&self) -> bool {
        self.user.upgrade().is_some() && self.wrapped.upgrade().is_some()
    }

    fn matches(&self, target: &Target, listener_type: &str, user: &Callback) -> bool {
        self.target == *target
            && self.listener_type == listener_type
            && self.user.upgrade().is_some_and(|entry| entry.same_as(user))
    }
}

pub struct ListenerApi {
    add: Rc<ApiSlot<AddFn>>,
    remove: Rc<ApiSlot<RemoveFn>>,
    registrations: RefCell<Vec<Registration>>,
}

impl ListenerApi {
    pub fn new(host: &Host) -> Self {
        Self {
            add: host.add_event_listener.clone(),
            remove: host.remove_event_listener.clone(),
            registrations: RefCell::new(Vec::new()),
        }
    }

    /// Wrapped registrations still awaiting removal.
    pub fn tracked(&self) -> usize {
        let mut registrations = self.registrations.borrow_mut();
        registrations.retain(Registration::live);
        registrations.len()
    }

    fn wrapper_for(
        &self,
        target: &Target,
        listener_type: &str,
        user: &Callback,
    ) -> Option<Callback> {
        self.registrations
            .borrow()
            .iter()
            .find(|entry| entry.matches(target, listener_type, user))
            .and_then(|entry| entry.wrapped.upgrade())
    }
}

impl CallbackApi for ListenerApi {
    fn name(&self) -> &'static str {
        names::EVENT_LISTENER
    }

    fn add_slot(&self) -> &Rc<ApiSlot<AddFn>> {
        &self.add
    }

    fn remove_slot(&self) -> Option<&Rc<ApiSlot<RemoveFn>>> {
        Some(&self.remove)
    }

    fn existing_wrapper(&self, call: &AddCall, user: &Callback) -> Option<Callback> {
        let (Some(target), Some(listener_type)) = (&call.target, call.listener_type()) else {
            return None;
        };
        // Handing the host the same wrapper lets it drop the repeat.
        self.wrapper_for(target, listener_type, user)
    }

    fn registered(&self, call: &AddCall, user: &Callback, wrapped: &Callback) {
        let (Some(target), Some(listener_type)) = (&call.target, call.listener_type()) else {
            return;
        };
        let mut registrations = self.registrations.borrow_mut();
        registrations.retain(Registration::live);
        if registrations
            .iter()
            .any(|entry| entry.matches(target, listener_type, user))
        {
            return;
        }
        registrations.push(Registration {
            target: target.clone(),
            listener_type: listener_type.to_string(),
            user: user.downgrade(),
            wrapped: wrapped.downgrade(),
        });
    }

    fn translate_removal(&self, mut call: RemoveCall) -> RemoveCall {
        let (Some(target), Some(listener_type), Some(user)) =
            (&call.target, call.listener_type(), &call.callback)
        else {
            return call;
        };
        let mut registrations = self.registrations.borrow_mut();
        let Some(index) = registrations
            .iter()
            .position(|entry| entry.matches(target, listener_type, user))
        else {
            return call;
        };
        let entry = registrations.remove(index);
        drop(registrations);
        let Some(wrapped) = entry.wrapped.upgrade() else {
            return call;
        };
        trace!(
            target_label = entry.target.label(),
            listener_type = %entry.listener_type,
            "removal rewritten to the contained listener"
        );
        call.callback = Some(wrapped);
        call
    }

    fn released(&self) {
        self.registrations.borrow_mut().clear();
    }
}
