//! Named-event publish/subscribe primitive and the events capabilities emit.

use crate::context::Context;
use crate::error::{CallbackError, ContextError};
use crate::host::{AddCall, Callback, RemoveCall, Target};
use crate::promise::PromiseId;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Anything that can be fired through an [`EventAware`].
pub trait Named {
    fn name(&self) -> &str;
}

type Subscriber<E> = Rc<dyn Fn(&mut E)>;

/// Invokes subscribers registered under an event's name.
///
/// Firing is synchronous: nothing is queued, and a subscriber that panics
/// unwinds through the caller of [`EventAware::fire`].
pub struct EventAware<E = Event> {
    listeners: RefCell<HashMap<String, Vec<Subscriber<E>>>>,
}

impl<E: Named> Default for EventAware<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Named> EventAware<E> {
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(HashMap::new()),
        }
    }

    /// Register `subscriber` for events named `name`. Registering the same
    /// subscriber twice makes it run twice per fire.
    pub fn on<F>(&self, name: impl Into<String>, subscriber: F)
    where
        F: Fn(&mut E) + 'static,
    {
        self.listeners
            .borrow_mut()
            .entry(name.into())
            .or_default()
            .push(Rc::new(subscriber));
    }

    /// Deliver `event` to every subscriber of its name, in registration order.
    pub fn fire(&self, event: &mut E) -> Result<(), ContextError> {
        if event.name().is_empty() {
            return Err(ContextError::UnnamedEvent);
        }
        // Snapshot so subscribers may call `on` while being invoked.
        let subscribers = self
            .listeners
            .borrow()
            .get(event.name())
            .cloned()
            .unwrap_or_default();
        for subscriber in subscribers {
            subscriber(event);
        }
        Ok(())
    }

    pub fn subscriber_count(&self, name: &str) -> usize {
        self.listeners.borrow().get(name).map_or(0, Vec::len)
    }
}

impl<E> std::fmt::Debug for EventAware<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.borrow();
        let mut names: Vec<_> = listeners
            .iter()
            .map(|(name, subscribers)| (name.as_str(), subscribers.len()))
            .collect();
        names.sort_unstable();
        f.debug_struct("EventAware").field("subscribers", &names).finish()
    }
}

/// Old and new values of an intercepted handler-property assignment.
#[derive(Clone)]
pub struct PropertyChange {
    pub target: Target,
    pub property: String,
    pub old_value: Option<Callback>,
    pub new_value: Option<Callback>,
}

/// Payload of an [`Event`].
#[derive(Clone)]
pub enum EventData {
    /// A callback is about to be registered. Subscribers may rewrite the call.
    Add(AddCall),
    /// A registration is about to be removed.
    Remove(RemoveCall),
    /// A callback replayed under a context returned an error.
    Error(CallbackError),
    /// A promise rejected with nothing attached to observe it.
    Rejection {
        error: CallbackError,
        promise: PromiseId,
    },
    Change(PropertyChange),
    /// An installed handler property returned an error.
    PropertyError {
        error: CallbackError,
        target: Target,
        property: String,
        value: Callback,
    },
    Custom(Value),
}

/// An event fired on a context's sub-handler.
#[derive(Clone)]
pub struct Event {
    name: String,
    pub ctx: Option<Context>,
    pub data: EventData,
}

impl Named for Event {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Event {
    pub fn new(name: impl Into<String>, ctx: Option<Context>, data: EventData) -> Self {
        Self {
            name: name.into(),
            ctx,
            data,
        }
    }

    pub fn add(ctx: Context, call: AddCall) -> Self {
        Self::new("add", Some(ctx), EventData::Add(call))
    }

    pub fn remove(ctx: Context, call: RemoveCall) -> Self {
        Self::new("remove", Some(ctx), EventData::Remove(call))
    }

    pub fn error(ctx: Context, error: CallbackError) -> Self {
        Self::new("error", Some(ctx), EventData::Error(error))
    }

    pub fn rejection(ctx: Context, error: CallbackError, promise: PromiseId) -> Self {
        Self::new("error", Some(ctx), EventData::Rejection { error, promise })
    }

    pub fn property_error(
        ctx: Context,
        error: CallbackError,
        target: Target,
        property: impl Into<String>,
        value: Callback,
    ) -> Self {
        Self::new(
            "error",
            Some(ctx),
            EventData::PropertyError {
                error,
                target,
                property: property.into(),
                value,
            },
        )
    }

    pub fn change(ctx: Context, change: PropertyChange) -> Self {
        Self::new("change", Some(ctx), EventData::Change(change))
    }

    /// The error carried by an `error` event, for both callback and rejection payloads.
    pub fn error_value(&self) -> Option<&CallbackError> {
        match &self.data {
            EventData::Error(error)
            | EventData::Rejection { error, .. }
            | EventData::PropertyError { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn add_call(&self) -> Option<&AddCall> {
        match &self.data {
            EventData::Add(call) => Some(call),
            _ => None,
        }
    }

    pub fn add_call_mut(&mut self) -> Option<&mut AddCall> {
        match &mut self.data {
            EventData::Add(call) => Some(call),
            _ => None,
        }
    }

    pub fn remove_call(&self) -> Option<&RemoveCall> {
        match &self.data {
            EventData::Remove(call) => Some(call),
            _ => None,
        }
    }

    pub fn property_change(&self) -> Option<&PropertyChange> {
        match &self.data {
            EventData::Change(change) => Some(change),
            _ => None,
        }
    }
}
