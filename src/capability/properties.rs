//! `domEvent`: handler-property assignment such as `target.onclick = f`.
//!
//! Each assignment under a context with a sub-handler fires `change` carrying
//! the previous and proposed callbacks. A subscriber may swap the proposed
//! callback; whatever remains is installed contained under the context, and
//! its errors fire `error` naming the target and property.

use crate::capability::contain::deliver;
use crate::capability::{names, Capability, SubHandlers};
use crate::context::Context;
use crate::error::CallbackError;
use crate::events::{Event, EventAware, EventData, PropertyChange};
use crate::host::{ApiSlot, Callback, Host, PropertyFn, Restore, Target};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, trace};

type Assigned = Rc<RefCell<HashMap<(u64, String), Callback>>>;

pub struct PropertyHandler {
    slot: Rc<ApiSlot<PropertyFn>>,
    handlers: SubHandlers,
    assigned: Assigned,
    restore: RefCell<Option<Restore<PropertyFn>>>,
}

impl PropertyHandler {
    pub fn new(host: &Host) -> Self {
        Self {
            slot: host.handler_property.clone(),
            handlers: SubHandlers::new(),
            assigned: Rc::default(),
            restore: RefCell::new(None),
        }
    }

    /// The callback last assigned to `property` on `target`, before wrapping.
    pub fn assigned(&self, target: &Target, property: &str) -> Option<Callback> {
        self.assigned
            .borrow()
            .get(&(target.id(), property.to_string()))
            .cloned()
    }
}

impl Capability for PropertyHandler {
    fn name(&self) -> &'static str {
        names::DOM_EVENT
    }

    fn install(&self) {
        if self.handlers.installed() {
            return;
        }
        let handlers = self.handlers.clone();
        let assigned = self.assigned.clone();
        let restore = self
            .slot
            .wrap(|original| intercept_assignment(handlers, assigned, original));
        *self.restore.borrow_mut() = Some(restore);
        self.handlers.set_installed(true);
        debug!(capability = names::DOM_EVENT, "capability installed");
    }

    fn cleanup(&self) {
        if let Some(restore) = self.restore.borrow_mut().take() {
            restore.restore();
        }
        self.handlers.set_installed(false);
        debug!(capability = names::DOM_EVENT, "capability cleaned up");
    }

    fn sub_handlers(&self) -> &SubHandlers {
        &self.handlers
    }
}

fn intercept_assignment(
    handlers: SubHandlers,
    assigned: Assigned,
    original: Rc<PropertyFn>,
) -> Rc<PropertyFn> {
    Rc::new(move |target: &Target, property: &str, callback: Option<Callback>| {
        let key = (target.id(), property.to_string());
        let Some((ctx, handler)) = handlers.for_current() else {
            trace!(property, "unattributed property assignment forwarded");
            record(&assigned, key, callback.clone());
            return original(target, property, callback);
        };

        let old_value = assigned.borrow().get(&key).cloned();
        let mut event = Event::change(
            ctx.clone(),
            PropertyChange {
                target: target.clone(),
                property: property.to_string(),
                old_value,
                new_value: callback.clone(),
            },
        );
        deliver(&handler, &mut event);
        let new_value = match event.data {
            EventData::Change(change) => change.new_value,
            _ => callback,
        };

        record(&assigned, key, new_value.clone());
        let wrapped = new_value.map(|callback| {
            contain_property(ctx, handler, callback, target.clone(), property.to_string())
        });
        original(target, property, wrapped)
    })
}

fn contain_property(
    ctx: Context,
    handler: Rc<EventAware>,
    callback: Callback,
    target: Target,
    property: String,
) -> Callback {
    Callback::new(move |args| {
        if let Err(error) = ctx.run(|| callback.call(args)) {
            let mut event = Event::property_error(
                ctx.clone(),
                CallbackError::from(error),
                target.clone(),
                property.clone(),
                callback.clone(),
            );
            deliver(&handler, &mut event);
        }
        Ok(())
    })
}

fn record(assigned: &Assigned, key: (u64, String), value: Option<Callback>) {
    let mut assigned = assigned.borrow_mut();
    match value {
        Some(callback) => {
            assigned.insert(key, callback);
        }
        None => {
            assigned.remove(&key);
        }
    }
}
