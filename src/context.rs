//! Execution contexts and the context stack.
//!
//! Entering a context pushes it onto a thread-local stack and leaving pops it;
//! the current context is the top of the stack. Deferred callbacks captured by
//! a capability re-enter their context through [`Context::run`], so the body
//! never observes whichever context happened to be current when the host
//! invoked it.

use crate::capability::Registry;
use crate::error::ContextError;
use crate::events::EventAware;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static CONTEXT_COUNTER: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Context>> = const { RefCell::new(Vec::new()) };
}

/// Process-unique context identity. Assigned in creation order, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        ContextId(CONTEXT_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

struct ContextInner {
    id: ContextId,
    capabilities: RefCell<Vec<String>>,
    registry: Registry,
}

/// A scoped identity under which deferred callbacks are tracked and attributed.
///
/// Cloning yields another handle to the same context.
#[derive(Clone)]
pub struct Context {
    inner: Rc<ContextInner>,
}

impl Context {
    /// Create an unwired context. Capabilities are attached by
    /// [`Registry::create_ctx`].
    pub(crate) fn new(registry: Registry) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                id: ContextId::next(),
                capabilities: RefCell::new(Vec::new()),
                registry,
            }),
        }
    }

    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    /// Capability names this context joined, in processing order.
    pub fn capabilities(&self) -> Vec<String> {
        self.inner.capabilities.borrow().clone()
    }

    pub fn uses(&self, capability: &str) -> bool {
        self.inner
            .capabilities
            .borrow()
            .iter()
            .any(|name| name == capability)
    }

    pub(crate) fn record_capability(&self, name: &str) {
        self.inner.capabilities.borrow_mut().push(name.to_string());
    }

    /// Run `f` with this context current. The stack is popped on every exit
    /// path, unwinding included, before `f`'s result is handed back.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = enter(self.clone());
        f()
    }

    /// This context's private sub-handler for `capability`.
    pub fn handler(&self, capability: &str) -> Result<Rc<EventAware>, ContextError> {
        let handler = self
            .inner
            .registry
            .get(capability)
            .ok_or_else(|| ContextError::UnknownCapability(capability.to_string()))?;
        handler
            .specific_handler(Some(self))
            .ok_or_else(|| ContextError::NotRegistered {
                context: self.id(),
                capability: capability.to_string(),
            })
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn same_as(&self, other: &Context) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.inner.id)
            .field("capabilities", &self.inner.capabilities.borrow())
            .finish()
    }
}

/// Pops the context stack on drop.
struct StackGuard;

impl Drop for StackGuard {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

fn enter(ctx: Context) -> StackGuard {
    CONTEXT_STACK.with(|stack| stack.borrow_mut().push(ctx));
    StackGuard
}

/// The context on top of the stack, or `None` outside any [`Context::run`].
pub fn current() -> Option<Context> {
    CONTEXT_STACK.with(|stack| stack.borrow().last().cloned())
}

/// Number of contexts currently entered on this thread.
pub fn depth() -> usize {
    CONTEXT_STACK.with(|stack| stack.borrow().len())
}
