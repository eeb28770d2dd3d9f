//! Host API bindings the built-in capabilities intercept.
//!
//! Each host API lives in an [`ApiSlot`]. An embedder binds real
//! implementations (an event loop's timers, a UI toolkit's listeners),
//! tests bind recording mocks, and capabilities wrap whatever is bound when
//! they install.

mod call;
mod slot;
mod tasks;

pub use call::{AddCall, Callback, RemoveCall, Target, WeakCallback};
pub use slot::{ApiSlot, Restore};
pub use tasks::{Task, TaskQueue};

use crate::promise::{Promise, PromiseRuntime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::Cell;
use std::rc::Rc;

/// Registers a callback; returns whatever the host hands back (usually an id).
pub type AddFn = dyn Fn(AddCall) -> Value;
/// Deregisters a callback.
pub type RemoveFn = dyn Fn(RemoveCall);
/// Assigns (or clears) a handler property such as `onclick`.
pub type PropertyFn = dyn Fn(&Target, &str, Option<Callback>);
/// Issues a network request whose outcome arrives as a promise.
pub type FetchFn = dyn Fn(FetchRequest) -> Promise;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    #[serde(default)]
    pub init: Value,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            init: Value::Null,
        }
    }
}

/// The bundle of host API slots.
#[derive(Clone)]
pub struct Host {
    pub set_interval: Rc<ApiSlot<AddFn>>,
    pub clear_interval: Rc<ApiSlot<RemoveFn>>,
    pub set_timeout: Rc<ApiSlot<AddFn>>,
    pub clear_timeout: Rc<ApiSlot<RemoveFn>>,
    pub add_event_listener: Rc<ApiSlot<AddFn>>,
    pub remove_event_listener: Rc<ApiSlot<RemoveFn>>,
    pub request_animation_frame: Rc<ApiSlot<AddFn>>,
    pub handler_property: Rc<ApiSlot<PropertyFn>>,
    pub fetch: Rc<ApiSlot<FetchFn>>,
    pub promises: PromiseRuntime,
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}

impl Host {
    /// A host whose APIs accept registrations but never fire them.
    pub fn new() -> Self {
        Self::with_microtasks(TaskQueue::new())
    }

    pub fn with_microtasks(queue: TaskQueue) -> Self {
        let ids = Rc::new(Cell::new(0u64));
        let promises = PromiseRuntime::new(queue);
        let pending = promises.clone();
        let fetch: Rc<FetchFn> = Rc::new(move |_request: FetchRequest| {
            pending.promise(|_resolver| Ok(()))
        });
        let property: Rc<PropertyFn> = Rc::new(|_: &Target, _: &str, _: Option<Callback>| {});
        Self {
            set_interval: ApiSlot::new(inert_add(ids.clone())),
            clear_interval: ApiSlot::new(inert_remove()),
            set_timeout: ApiSlot::new(inert_add(ids.clone())),
            clear_timeout: ApiSlot::new(inert_remove()),
            add_event_listener: ApiSlot::new(inert_add(ids.clone())),
            remove_event_listener: ApiSlot::new(inert_remove()),
            request_animation_frame: ApiSlot::new(inert_add(ids)),
            handler_property: ApiSlot::new(property),
            fetch: ApiSlot::new(fetch),
            promises,
        }
    }

    pub fn microtasks(&self) -> &TaskQueue {
        self.promises.microtasks()
    }

    pub fn set_interval(&self, callback: Callback, period: u64, trailing: Vec<Value>) -> Value {
        (self.set_interval.get())(AddCall::global(callback, timer_args(period, trailing)))
    }

    pub fn clear_interval(&self, id: Value) {
        (self.clear_interval.get())(RemoveCall::by_id(id))
    }

    pub fn set_timeout(&self, callback: Callback, delay: u64, trailing: Vec<Value>) -> Value {
        (self.set_timeout.get())(AddCall::global(callback, timer_args(delay, trailing)))
    }

    pub fn clear_timeout(&self, id: Value) {
        (self.clear_timeout.get())(RemoveCall::by_id(id))
    }

    pub fn add_event_listener(
        &self,
        target: &Target,
        listener_type: &str,
        callback: Callback,
        options: Vec<Value>,
    ) {
        let mut args = vec![Value::from(listener_type)];
        args.extend(options);
        (self.add_event_listener.get())(AddCall::on(target.clone(), callback, args));
    }

    pub fn remove_event_listener(
        &self,
        target: &Target,
        listener_type: &str,
        callback: Callback,
        options: Vec<Value>,
    ) {
        let mut args = vec![Value::from(listener_type)];
        args.extend(options);
        (self.remove_event_listener.get())(RemoveCall::on(target.clone(), callback, args));
    }

    pub fn request_animation_frame(&self, callback: Callback) -> Value {
        (self.request_animation_frame.get())(AddCall::global(callback, Vec::new()))
    }

    pub fn set_handler_property(&self, target: &Target, property: &str, callback: Option<Callback>) {
        (self.handler_property.get())(target, property, callback)
    }

    pub fn fetch(&self, request: FetchRequest) -> Promise {
        (self.fetch.get())(request)
    }
}

fn timer_args(delay: u64, trailing: Vec<Value>) -> Vec<Value> {
    let mut args = Vec::with_capacity(trailing.len() + 1);
    args.push(Value::from(delay));
    args.extend(trailing);
    args
}

fn inert_add(ids: Rc<Cell<u64>>) -> Rc<AddFn> {
    Rc::new(move |_call: AddCall| {
        let id = ids.get() + 1;
        ids.set(id);
        Value::from(id)
    })
}

fn inert_remove() -> Rc<RemoveFn> {
    Rc::new(|_call: RemoveCall| {})
}
