//! Error containment for callbacks replayed under a captured context.

use crate::context::Context;
use crate::error::CallbackError;
use crate::events::{Event, EventAware};
use crate::host::Callback;
use std::rc::Rc;
use tracing::warn;

/// Run `f` under `ctx`. An `Err` becomes an `error` event on `handler`
/// instead of reaching the caller.
pub fn run_safely<F>(ctx: &Context, handler: &EventAware, f: F)
where
    F: FnOnce() -> anyhow::Result<()>,
{
    if let Err(error) = ctx.run(f) {
        report(ctx, handler, CallbackError::from(error));
    }
}

/// Wrap `callback` so every invocation runs through [`run_safely`]. The
/// wrapper forwards the host's arguments untouched and always returns `Ok`.
pub fn contain(ctx: Context, handler: Rc<EventAware>, callback: Callback) -> Callback {
    Callback::new(move |args| {
        run_safely(&ctx, &handler, || callback.call(args));
        Ok(())
    })
}

pub(crate) fn report(ctx: &Context, handler: &EventAware, error: CallbackError) {
    let mut event = Event::error(ctx.clone(), error);
    deliver(handler, &mut event);
}

/// Fire `event`, logging instead of failing when it cannot be delivered.
pub(crate) fn deliver(handler: &EventAware, event: &mut Event) {
    if let Err(err) = handler.fire(event) {
        warn!(
            context = ?event.ctx.as_ref().map(Context::id),
            error = %err,
            "dropping undeliverable event"
        );
    }
}
