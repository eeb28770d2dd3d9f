//! Shared test utilities for integration tests
//!
//! Recording mocks bound into every host slot before any capability wraps
//! it, so tests can inspect what reached the host and replay callbacks the
//! way an event loop would.

use ctxzone::host::{AddCall, AddFn, FetchFn, PropertyFn, RemoveCall, RemoveFn};
use ctxzone::promise::Resolver;
use ctxzone::{Callback, Event, EventAware, FetchRequest, Host, Promise, Registry, Target};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Mutex;

/// A registration that reached the host.
#[derive(Clone)]
pub struct Registered {
    pub api: &'static str,
    pub id: Value,
    pub call: AddCall,
}

/// A removal that reached the host.
#[derive(Clone)]
pub struct Removed {
    pub api: &'static str,
    pub call: RemoveCall,
}

type ListenerKey = (u64, String);

#[derive(Default)]
struct Recorder {
    next_id: Cell<u64>,
    registered: RefCell<Vec<Registered>>,
    removed: RefCell<Vec<Removed>>,
    listeners: RefCell<HashMap<ListenerKey, Vec<Callback>>>,
    properties: RefCell<HashMap<ListenerKey, Callback>>,
    fetches: RefCell<Vec<(FetchRequest, Resolver)>>,
}

/// A [`Host`] whose slots record instead of scheduling.
pub struct MockHost {
    pub host: Host,
    recorder: Rc<Recorder>,
}

impl MockHost {
    pub fn new() -> Self {
        let host = Host::new();
        let recorder = Rc::new(Recorder::default());

        host.set_interval.replace(recording_add("interval", &recorder));
        host.set_timeout.replace(recording_add("timeout", &recorder));
        host.request_animation_frame
            .replace(recording_add("requestAnimationFrame", &recorder));
        host.clear_interval.replace(recording_remove("interval", &recorder));
        host.clear_timeout.replace(recording_remove("timeout", &recorder));

        let rec = recorder.clone();
        let add_listener: Rc<AddFn> = Rc::new(move |call: AddCall| {
            if let (Some(target), Some(kind)) = (&call.target, call.listener_type()) {
                let mut listeners = rec.listeners.borrow_mut();
                let entry = listeners.entry((target.id(), kind.to_string())).or_default();
                if !entry.iter().any(|cb| cb.same_as(&call.callback)) {
                    entry.push(call.callback.clone());
                }
            }
            record_add(&rec, "eventListener", call)
        });
        host.add_event_listener.replace(add_listener);

        let rec = recorder.clone();
        let remove_listener: Rc<RemoveFn> = Rc::new(move |call: RemoveCall| {
            if let (Some(target), Some(kind), Some(callback)) =
                (&call.target, call.listener_type(), &call.callback)
            {
                if let Some(entry) = rec
                    .listeners
                    .borrow_mut()
                    .get_mut(&(target.id(), kind.to_string()))
                {
                    entry.retain(|cb| !cb.same_as(callback));
                }
            }
            rec.removed.borrow_mut().push(Removed {
                api: "eventListener",
                call,
            });
        });
        host.remove_event_listener.replace(remove_listener);

        let rec = recorder.clone();
        let property: Rc<PropertyFn> =
            Rc::new(move |target: &Target, name: &str, callback: Option<Callback>| {
                let key = (target.id(), name.to_string());
                match callback {
                    Some(callback) => {
                        rec.properties.borrow_mut().insert(key, callback);
                    }
                    None => {
                        rec.properties.borrow_mut().remove(&key);
                    }
                }
            });
        host.handler_property.replace(property);

        let rec = recorder.clone();
        let promises = host.promises.clone();
        let fetch: Rc<FetchFn> = Rc::new(move |request: FetchRequest| {
            let stash = rec.clone();
            promises.promise(move |resolver| {
                stash.fetches.borrow_mut().push((request, resolver.clone()));
                Ok(())
            })
        });
        host.fetch.replace(fetch);

        Self { host, recorder }
    }

    /// A registry with every built-in capability bound to this host.
    pub fn registry(&self) -> Registry {
        Registry::with_builtins(&self.host)
    }

    pub fn registered(&self, api: &str) -> Vec<Registered> {
        self.recorder
            .registered
            .borrow()
            .iter()
            .filter(|r| r.api == api)
            .cloned()
            .collect()
    }

    pub fn removed(&self, api: &str) -> Vec<Removed> {
        self.recorder
            .removed
            .borrow()
            .iter()
            .filter(|r| r.api == api)
            .cloned()
            .collect()
    }

    /// Invoke the `index`th callback registered through `api`, the way the
    /// host would: timers receive their trailing arguments, frames receive
    /// `args`.
    pub fn fire(&self, api: &str, index: usize, args: &[Value]) -> anyhow::Result<()> {
        let registered = self.registered(api);
        let entry = &registered[index];
        if entry.api == "interval" || entry.api == "timeout" {
            entry.call.callback.call(entry.call.trailing())
        } else {
            entry.call.callback.call(args)
        }
    }

    /// Deliver a DOM-style event to every listener of `kind` on `target`.
    pub fn dispatch(&self, target: &Target, kind: &str, args: &[Value]) -> Vec<anyhow::Result<()>> {
        let listeners = self
            .recorder
            .listeners
            .borrow()
            .get(&(target.id(), kind.to_string()))
            .cloned()
            .unwrap_or_default();
        listeners.iter().map(|cb| cb.call(args)).collect()
    }

    pub fn listener_count(&self, target: &Target, kind: &str) -> usize {
        self.recorder
            .listeners
            .borrow()
            .get(&(target.id(), kind.to_string()))
            .map_or(0, Vec::len)
    }

    /// The callback currently assigned to `property` on `target`, as the host sees it.
    pub fn property(&self, target: &Target, property: &str) -> Option<Callback> {
        self.recorder
            .properties
            .borrow()
            .get(&(target.id(), property.to_string()))
            .cloned()
    }

    pub fn fetch_count(&self) -> usize {
        self.recorder.fetches.borrow().len()
    }

    /// Settle the `index`th fetch.
    pub fn respond(&self, index: usize, response: Result<Value, ctxzone::CallbackError>) {
        let resolver = self.recorder.fetches.borrow()[index].1.clone();
        resolver.settle(response);
    }

    pub fn run_microtasks(&self) -> usize {
        self.host.microtasks().run_until_idle()
    }

    pub fn promise_rejecting(&self, message: &'static str) -> Promise {
        self.host
            .promises
            .promise(move |_| Err(anyhow::anyhow!(message)))
    }
}

fn recording_add(api: &'static str, recorder: &Rc<Recorder>) -> Rc<AddFn> {
    let rec = recorder.clone();
    Rc::new(move |call: AddCall| record_add(&rec, api, call))
}

fn record_add(recorder: &Recorder, api: &'static str, call: AddCall) -> Value {
    let id = recorder.next_id.get() + 1;
    recorder.next_id.set(id);
    recorder.registered.borrow_mut().push(Registered {
        api,
        id: Value::from(id),
        call,
    });
    Value::from(id)
}

fn recording_remove(api: &'static str, recorder: &Rc<Recorder>) -> Rc<RemoveFn> {
    let rec = recorder.clone();
    Rc::new(move |call: RemoveCall| rec.removed.borrow_mut().push(Removed { api, call }))
}

/// Collect every event fired under `name` on `handler`.
pub fn record_events(handler: &EventAware, name: &str) -> Rc<RefCell<Vec<Event>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    handler.on(name, move |event: &mut Event| sink.borrow_mut().push(event.clone()));
    events
}

/// Global mutex serializing tests that set CTXZONE_* environment variables.
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Run `f` with `vars` set, restoring the previous values afterwards.
pub fn with_env<R>(vars: &[(&str, &str)], f: impl FnOnce() -> R) -> R {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let previous: Vec<(String, Option<String>)> = vars
        .iter()
        .map(|(key, _)| (key.to_string(), std::env::var(key).ok()))
        .collect();
    for (key, value) in vars {
        std::env::set_var(key, value);
    }
    let result = f();
    for (key, value) in previous {
        match value {
            Some(value) => std::env::set_var(&key, value),
            None => std::env::remove_var(&key),
        }
    }
    result
}
