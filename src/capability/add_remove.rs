//! Generic interception of a "register a callback" / "unregister a callback"
//! host API pair.
//!
//! When the current context has a sub-handler, registration fires `add`
//! before reaching the host (subscribers may rewrite the call), and the
//! callback is wrapped so replay runs under the captured context with errors
//! turned into `error` events. Removal fires `remove` and is always
//! forwarded. Without a sub-handler both calls pass through untouched.

use crate::capability::contain::{contain, deliver};
use crate::capability::{Capability, SubHandlers};
use crate::events::{Event, EventData};
use crate::host::{AddCall, AddFn, ApiSlot, Callback, RemoveCall, RemoveFn, Restore};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// Configuration record for one add/remove API pair.
pub trait CallbackApi: 'static {
    fn name(&self) -> &'static str;

    fn add_slot(&self) -> &Rc<ApiSlot<AddFn>>;

    fn remove_slot(&self) -> Option<&Rc<ApiSlot<RemoveFn>>> {
        None
    }

    /// A wrapper already handed to the host for the same registration, if
    /// `call` repeats one made with the caller's callback `user`.
    fn existing_wrapper(&self, _call: &AddCall, _user: &Callback) -> Option<Callback> {
        None
    }

    /// Called once `user` has been wrapped as `wrapped` for `call`. `user`
    /// is the caller's callback, even when an `add` subscriber substituted it.
    fn registered(&self, _call: &AddCall, _user: &Callback, _wrapped: &Callback) {}

    /// Rewrite a removal before the host sees it.
    fn translate_removal(&self, call: RemoveCall) -> RemoveCall {
        call
    }

    /// Drop any per-registration bookkeeping once the host APIs are restored.
    fn released(&self) {}
}

struct Installed {
    add: Restore<AddFn>,
    remove: Option<Restore<RemoveFn>>,
}

/// A [`Capability`] built from a [`CallbackApi`].
pub struct AddRemoveHandler<A: CallbackApi> {
    api: Rc<A>,
    handlers: SubHandlers,
    installed: RefCell<Option<Installed>>,
}

impl<A: CallbackApi> AddRemoveHandler<A> {
    pub fn new(api: A) -> Self {
        Self {
            api: Rc::new(api),
            handlers: SubHandlers::new(),
            installed: RefCell::new(None),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }
}

impl<A: CallbackApi> Capability for AddRemoveHandler<A> {
    fn name(&self) -> &'static str {
        self.api.name()
    }

    fn install(&self) {
        if self.handlers.installed() {
            return;
        }
        let add = self
            .api
            .add_slot()
            .wrap(|original| intercept_add(self.api.clone(), self.handlers.clone(), original));
        let remove = self.api.remove_slot().map(|slot| {
            slot.wrap(|original| intercept_remove(self.api.clone(), self.handlers.clone(), original))
        });
        *self.installed.borrow_mut() = Some(Installed { add, remove });
        self.handlers.set_installed(true);
        debug!(capability = self.api.name(), "capability installed");
    }

    fn cleanup(&self) {
        if let Some(installed) = self.installed.borrow_mut().take() {
            installed.add.restore();
            if let Some(remove) = installed.remove {
                remove.restore();
            }
        }
        self.api.released();
        self.handlers.set_installed(false);
        debug!(capability = self.api.name(), "capability cleaned up");
    }

    fn sub_handlers(&self) -> &SubHandlers {
        &self.handlers
    }
}

fn intercept_add<A: CallbackApi>(
    api: Rc<A>,
    handlers: SubHandlers,
    original: Rc<AddFn>,
) -> Rc<AddFn> {
    Rc::new(move |call: AddCall| {
        let Some((ctx, handler)) = handlers.for_current() else {
            trace!(capability = api.name(), "unattributed add forwarded");
            return original(call);
        };

        let fallback = call.clone();
        let user = fallback.callback.clone();
        let mut event = Event::add(ctx.clone(), call);
        deliver(&handler, &mut event);
        let mut call = match event.data {
            EventData::Add(call) => call,
            _ => {
                warn!(
                    capability = api.name(),
                    context = %ctx.id(),
                    "add subscriber replaced the call; using the original arguments"
                );
                fallback
            }
        };

        if let Some(existing) = api.existing_wrapper(&call, &user) {
            trace!(capability = api.name(), "repeated registration reuses its wrapper");
            call.callback = existing;
            return original(call);
        }
        let wrapped = contain(ctx, handler, call.callback.clone());
        api.registered(&call, &user, &wrapped);
        call.callback = wrapped;
        original(call)
    })
}

fn intercept_remove<A: CallbackApi>(
    api: Rc<A>,
    handlers: SubHandlers,
    original: Rc<RemoveFn>,
) -> Rc<RemoveFn> {
    Rc::new(move |call: RemoveCall| {
        if let Some((ctx, handler)) = handlers.for_current() {
            let mut event = Event::remove(ctx, call.clone());
            deliver(&handler, &mut event);
        }
        original(api.translate_removal(call))
    })
}
