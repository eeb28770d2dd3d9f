//! Single-threaded promises whose reactions run on a microtask queue.
//!
//! Construction and `then` go through rebindable slots on the
//! [`PromiseRuntime`], which is where the `promise` capability hooks in.
//! `catch` and `finally` are expressed through `then`, so one hook observes
//! every continuation attached to a promise.

use crate::context::Context;
use crate::error::CallbackError;
use crate::host::{ApiSlot, TaskQueue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static PROMISE_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PromiseId(u64);

impl fmt::Display for PromiseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "promise-{}", self.0)
    }
}

/// Outcome a promise settles with.
pub type Settlement = Result<Value, CallbackError>;

pub type OnFulfilled = Rc<dyn Fn(Value) -> Settlement>;
pub type OnRejected = Rc<dyn Fn(CallbackError) -> Settlement>;
pub type Executor = Box<dyn FnOnce(&Resolver) -> anyhow::Result<()>>;

/// Promise constructor signature.
pub type ConstructFn = dyn Fn(Executor) -> Promise;
/// `then` signature: receiver, fulfilment handler, rejection handler.
pub type ThenFn = dyn Fn(&Promise, Option<OnFulfilled>, Option<OnRejected>) -> Promise;

type Reaction = Box<dyn FnOnce(Settlement)>;

#[derive(Debug, Clone)]
pub enum PromiseState {
    Pending,
    Fulfilled(Value),
    Rejected(CallbackError),
}

enum State {
    Pending(Vec<Reaction>),
    Settled(Settlement),
}

/// Bookkeeping the `promise` capability attaches to instances it constructs.
pub(crate) struct Instrumentation {
    pub(crate) ctx: Context,
    has_catcher: Cell<bool>,
}

impl Instrumentation {
    pub(crate) fn new(ctx: Context) -> Self {
        Self {
            ctx,
            has_catcher: Cell::new(false),
        }
    }

    pub(crate) fn mark_caught(&self) {
        self.has_catcher.set(true);
    }

    pub(crate) fn has_catcher(&self) -> bool {
        self.has_catcher.get()
    }
}

/// What every promise needs from its runtime.
#[derive(Clone)]
struct Links {
    queue: TaskQueue,
    then: Rc<ApiSlot<ThenFn>>,
}

struct PromiseInner {
    id: PromiseId,
    state: RefCell<State>,
    links: Links,
    instrumentation: RefCell<Option<Rc<Instrumentation>>>,
}

#[derive(Clone)]
pub struct Promise {
    inner: Rc<PromiseInner>,
}

impl Promise {
    fn pending(links: Links) -> Self {
        Self {
            inner: Rc::new(PromiseInner {
                id: PromiseId(PROMISE_COUNTER.fetch_add(1, Ordering::Relaxed)),
                state: RefCell::new(State::Pending(Vec::new())),
                links,
                instrumentation: RefCell::new(None),
            }),
        }
    }

    pub fn id(&self) -> PromiseId {
        self.inner.id
    }

    pub fn state(&self) -> PromiseState {
        match &*self.inner.state.borrow() {
            State::Pending(_) => PromiseState::Pending,
            State::Settled(Ok(value)) => PromiseState::Fulfilled(value.clone()),
            State::Settled(Err(error)) => PromiseState::Rejected(error.clone()),
        }
    }

    /// Attach a fulfilment handler. Rejections pass through to the result.
    pub fn then<F>(&self, on_fulfilled: F) -> Promise
    where
        F: Fn(Value) -> anyhow::Result<Value> + 'static,
    {
        self.then_raw(Some(fulfilled(on_fulfilled)), None)
    }

    pub fn then_or_else<F, R>(&self, on_fulfilled: F, on_rejected: R) -> Promise
    where
        F: Fn(Value) -> anyhow::Result<Value> + 'static,
        R: Fn(CallbackError) -> anyhow::Result<Value> + 'static,
    {
        self.then_raw(Some(fulfilled(on_fulfilled)), Some(rejected(on_rejected)))
    }

    pub fn catch<R>(&self, on_rejected: R) -> Promise
    where
        R: Fn(CallbackError) -> anyhow::Result<Value> + 'static,
    {
        self.then_raw(None, Some(rejected(on_rejected)))
    }

    /// Run `f` once settled, keeping the original outcome unless `f` fails.
    pub fn finally<F>(&self, f: F) -> Promise
    where
        F: Fn() -> anyhow::Result<()> + 'static,
    {
        let f = Rc::new(f);
        let on_settled = f.clone();
        let on_fulfilled: OnFulfilled = Rc::new(move |value: Value| {
            on_settled().map_err(CallbackError::from)?;
            Ok(value)
        });
        let on_rejected: OnRejected = Rc::new(move |error: CallbackError| {
            f().map_err(CallbackError::from)?;
            Err(error)
        });
        self.then_raw(Some(on_fulfilled), Some(on_rejected))
    }

    /// Dispatch through the runtime's current `then` binding.
    pub fn then_raw(
        &self,
        on_fulfilled: Option<OnFulfilled>,
        on_rejected: Option<OnRejected>,
    ) -> Promise {
        let then = self.inner.links.then.get();
        then(self, on_fulfilled, on_rejected)
    }

    /// Queue `reaction` for when this promise settles, without deriving a
    /// new promise and without going through `then`.
    pub(crate) fn observe(&self, reaction: Reaction) {
        let mut state = self.inner.state.borrow_mut();
        match &mut *state {
            State::Pending(reactions) => reactions.push(reaction),
            State::Settled(settlement) => {
                let settlement = settlement.clone();
                self.inner
                    .links
                    .queue
                    .enqueue(Box::new(move || reaction(settlement)));
            }
        }
    }

    fn settle(&self, settlement: Settlement) {
        let reactions = {
            let mut state = self.inner.state.borrow_mut();
            match &mut *state {
                State::Pending(reactions) => {
                    let reactions = std::mem::take(reactions);
                    *state = State::Settled(settlement.clone());
                    reactions
                }
                // Settling twice is a no-op.
                State::Settled(_) => return,
            }
        };
        for reaction in reactions {
            let settlement = settlement.clone();
            self.inner
                .links
                .queue
                .enqueue(Box::new(move || reaction(settlement)));
        }
    }

    pub(crate) fn instrumentation(&self) -> Option<Rc<Instrumentation>> {
        self.inner.instrumentation.borrow().clone()
    }

    pub(crate) fn instrument(&self, instrumentation: Rc<Instrumentation>) {
        *self.inner.instrumentation.borrow_mut() = Some(instrumentation);
    }

    pub fn is_instrumented(&self) -> bool {
        self.inner.instrumentation.borrow().is_some()
    }

    /// Whether any continuation was attached, for instrumented promises.
    pub fn has_catcher(&self) -> Option<bool> {
        self.instrumentation().map(|tag| tag.has_catcher())
    }

    pub fn same_as(&self, other: &Promise) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish()
    }
}

fn fulfilled<F>(f: F) -> OnFulfilled
where
    F: Fn(Value) -> anyhow::Result<Value> + 'static,
{
    Rc::new(move |value: Value| f(value).map_err(CallbackError::from))
}

fn rejected<R>(r: R) -> OnRejected
where
    R: Fn(CallbackError) -> anyhow::Result<Value> + 'static,
{
    Rc::new(move |error: CallbackError| r(error).map_err(CallbackError::from))
}

/// Settles the promise handed to an executor. Only the first call counts.
#[derive(Clone)]
pub struct Resolver {
    promise: Promise,
}

impl Resolver {
    pub fn resolve(&self, value: Value) {
        self.promise.settle(Ok(value));
    }

    pub fn reject(&self, error: CallbackError) {
        self.promise.settle(Err(error));
    }

    pub fn settle(&self, settlement: Settlement) {
        self.promise.settle(settlement);
    }
}

/// The host's promise implementation: constructor and `then` bindings plus
/// the microtask queue reactions are deferred to.
#[derive(Clone)]
pub struct PromiseRuntime {
    links: Links,
    construct: Rc<ApiSlot<ConstructFn>>,
}

impl PromiseRuntime {
    pub fn new(queue: TaskQueue) -> Self {
        let then_impl: Rc<ThenFn> = Rc::new(base_then);
        let links = Links {
            queue,
            then: ApiSlot::new(then_impl),
        };
        let construct_links = links.clone();
        let construct_impl: Rc<ConstructFn> = Rc::new(move |executor: Executor| {
            base_construct(construct_links.clone(), executor)
        });
        Self {
            links,
            construct: ApiSlot::new(construct_impl),
        }
    }

    /// Construct a promise through the current constructor binding. The
    /// executor runs synchronously; an `Err` from it rejects the promise.
    pub fn promise<F>(&self, executor: F) -> Promise
    where
        F: FnOnce(&Resolver) -> anyhow::Result<()> + 'static,
    {
        let construct = self.construct.get();
        construct(Box::new(executor))
    }

    pub fn resolved(&self, value: Value) -> Promise {
        self.promise(move |resolver| {
            resolver.resolve(value);
            Ok(())
        })
    }

    pub fn rejected(&self, error: CallbackError) -> Promise {
        self.promise(move |resolver| {
            resolver.reject(error);
            Ok(())
        })
    }

    pub fn construct_slot(&self) -> &Rc<ApiSlot<ConstructFn>> {
        &self.construct
    }

    pub fn then_slot(&self) -> &Rc<ApiSlot<ThenFn>> {
        &self.links.then
    }

    pub fn microtasks(&self) -> &TaskQueue {
        &self.links.queue
    }
}

fn base_construct(links: Links, executor: Executor) -> Promise {
    let promise = Promise::pending(links);
    let resolver = Resolver {
        promise: promise.clone(),
    };
    if let Err(error) = executor(&resolver) {
        resolver.reject(CallbackError::from(error));
    }
    promise
}

fn base_then(
    parent: &Promise,
    on_fulfilled: Option<OnFulfilled>,
    on_rejected: Option<OnRejected>,
) -> Promise {
    let derived = Promise::pending(parent.inner.links.clone());
    let resolver = Resolver {
        promise: derived.clone(),
    };
    parent.observe(Box::new(move |settlement: Settlement| {
        let next = match settlement {
            Ok(value) => match &on_fulfilled {
                Some(handler) => handler(value),
                None => Ok(value),
            },
            Err(error) => match &on_rejected {
                Some(handler) => handler(error),
                None => Err(error),
            },
        };
        resolver.settle(next);
    }));
    derived
}
