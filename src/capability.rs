//! Capability handlers: install-once interception of a host API family plus
//! one private event channel per context that uses it.

mod add_remove;
mod contain;
mod fetch;
mod frames;
mod listeners;
mod promise;
mod properties;
mod registry;
mod timers;

pub use add_remove::{AddRemoveHandler, CallbackApi};
pub use contain::{contain, run_safely};
pub use fetch::FetchHandler;
pub use frames::FrameApi;
pub use listeners::ListenerApi;
pub use promise::PromiseHandler;
pub use properties::PropertyHandler;
pub use registry::{Registry, BUILTINS};
pub use timers::TimerApi;

use crate::context::{self, Context, ContextId};
use crate::events::EventAware;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Names the built-in capabilities register under.
pub mod names {
    pub const INTERVAL: &str = "interval";
    pub const TIMEOUT: &str = "timeout";
    pub const EVENT_LISTENER: &str = "eventListener";
    pub const ANIMATION_FRAME: &str = "requestAnimationFrame";
    pub const DOM_EVENT: &str = "domEvent";
    pub const PROMISE: &str = "promise";
    pub const FETCH: &str = "fetch";
}

/// The contract every interceptable host API family satisfies.
pub trait Capability {
    fn name(&self) -> &'static str;

    /// Wrap the host API. Calling this again while installed does nothing.
    fn install(&self);

    /// Put the original host API back. A later `install` wraps it afresh.
    fn cleanup(&self);

    fn sub_handlers(&self) -> &SubHandlers;

    fn installed(&self) -> bool {
        self.sub_handlers().installed()
    }

    /// Give `ctx` a fresh private sub-handler.
    fn register_ctx(&self, ctx: &Context) {
        self.sub_handlers().register(ctx.id());
    }

    /// The sub-handler for `ctx`; `None` means "run without attribution".
    fn specific_handler(&self, ctx: Option<&Context>) -> Option<Rc<EventAware>> {
        ctx.and_then(|ctx| self.sub_handlers().get(ctx.id()))
    }

    /// Capabilities this one needs alongside it.
    fn uses(&self) -> &'static [&'static str] {
        &[]
    }
}

/// Install flag and per-context sub-handlers shared by a capability and the
/// wrappers it installs. Clones share state.
#[derive(Clone, Default)]
pub struct SubHandlers {
    installed: Rc<Cell<bool>>,
    handlers: Rc<RefCell<HashMap<ContextId, Rc<EventAware>>>>,
}

impl SubHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn installed(&self) -> bool {
        self.installed.get()
    }

    pub fn set_installed(&self, installed: bool) {
        self.installed.set(installed);
    }

    pub fn register(&self, id: ContextId) -> Rc<EventAware> {
        let handler = Rc::new(EventAware::new());
        self.handlers.borrow_mut().insert(id, handler.clone());
        handler
    }

    pub fn get(&self, id: ContextId) -> Option<Rc<EventAware>> {
        self.handlers.borrow().get(&id).cloned()
    }

    /// The current context together with its sub-handler, when both exist.
    pub fn for_current(&self) -> Option<(Context, Rc<EventAware>)> {
        let ctx = context::current()?;
        let handler = self.get(ctx.id())?;
        Some((ctx, handler))
    }

    pub fn len(&self) -> usize {
        self.handlers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.borrow().is_empty()
    }
}
