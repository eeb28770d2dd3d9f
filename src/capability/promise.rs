//! `promise`: context attribution for promise chains and reporting of
//! rejections nobody observed.
//!
//! Every promise constructed under a context is tagged with that context and
//! a `has_catcher` flag. Attaching any continuation sets the flag on the
//! receiver, runs the continuation under the tagged context and tags the
//! derived promise the same way. A rejection reaction attached at
//! construction fires one `error` event if the flag is still clear when the
//! rejection is observed.

use crate::capability::contain::deliver;
use crate::capability::{names, Capability, SubHandlers};
use crate::context::Context;
use crate::error::CallbackError;
use crate::events::{Event, EventAware};
use crate::host::Restore;
use crate::promise::{
    ConstructFn, Executor, Instrumentation, OnFulfilled, OnRejected, Promise, PromiseRuntime,
    Settlement, ThenFn,
};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, trace};

struct Installed {
    construct: Restore<ConstructFn>,
    then: Restore<ThenFn>,
}

pub struct PromiseHandler {
    runtime: PromiseRuntime,
    handlers: SubHandlers,
    installed: RefCell<Option<Installed>>,
}

impl PromiseHandler {
    pub fn new(runtime: &PromiseRuntime) -> Self {
        Self {
            runtime: runtime.clone(),
            handlers: SubHandlers::new(),
            installed: RefCell::new(None),
        }
    }
}

impl Capability for PromiseHandler {
    fn name(&self) -> &'static str {
        names::PROMISE
    }

    fn install(&self) {
        if self.handlers.installed() {
            return;
        }
        let construct = self
            .runtime
            .construct_slot()
            .wrap(|original| intercept_construct(self.handlers.clone(), original));
        let then = self
            .runtime
            .then_slot()
            .wrap(|original| intercept_then(self.handlers.clone(), original));
        *self.installed.borrow_mut() = Some(Installed { construct, then });
        self.handlers.set_installed(true);
        debug!(capability = names::PROMISE, "capability installed");
    }

    fn cleanup(&self) {
        if let Some(installed) = self.installed.borrow_mut().take() {
            installed.construct.restore();
            installed.then.restore();
        }
        self.handlers.set_installed(false);
        debug!(capability = names::PROMISE, "capability cleaned up");
    }

    fn sub_handlers(&self) -> &SubHandlers {
        &self.handlers
    }
}

fn intercept_construct(handlers: SubHandlers, original: Rc<ConstructFn>) -> Rc<ConstructFn> {
    Rc::new(move |executor: Executor| {
        let promise = original(executor);
        if let Some((ctx, handler)) = handlers.for_current() {
            instrument(&promise, ctx, handler);
        }
        promise
    })
}

fn intercept_then(handlers: SubHandlers, original: Rc<ThenFn>) -> Rc<ThenFn> {
    Rc::new(
        move |parent: &Promise, on_fulfilled: Option<OnFulfilled>, on_rejected: Option<OnRejected>| {
            let attributed = match parent.instrumentation() {
                Some(tag) => {
                    tag.mark_caught();
                    let ctx = tag.ctx.clone();
                    handlers.get(ctx.id()).map(|handler| (ctx, handler))
                }
                None => handlers.for_current(),
            };
            let Some((ctx, handler)) = attributed else {
                trace!(promise = %parent.id(), "unattributed continuation forwarded");
                return original(parent, on_fulfilled, on_rejected);
            };

            let on_fulfilled = on_fulfilled.map(|f| {
                let ctx = ctx.clone();
                Rc::new(move |value: Value| ctx.run(|| f(value))) as OnFulfilled
            });
            let on_rejected = on_rejected.map(|r| {
                let ctx = ctx.clone();
                Rc::new(move |error: CallbackError| ctx.run(|| r(error))) as OnRejected
            });
            let derived = original(parent, on_fulfilled, on_rejected);
            if !derived.is_instrumented() {
                instrument(&derived, ctx, handler);
            }
            derived
        },
    )
}

/// Tag `promise` first, then attach the rejection reaction, so the reaction
/// always sees a fully tagged promise.
fn instrument(promise: &Promise, ctx: Context, handler: Rc<EventAware>) {
    let tag = Rc::new(Instrumentation::new(ctx.clone()));
    promise.instrument(tag.clone());
    let id = promise.id();
    promise.observe(Box::new(move |settlement: Settlement| {
        let Err(error) = settlement else {
            return;
        };
        if tag.has_catcher() {
            return;
        }
        debug!(promise = %id, context = %ctx.id(), "unobserved rejection");
        let mut event = Event::rejection(ctx.clone(), error, id);
        deliver(&handler, &mut event);
    }));
}
