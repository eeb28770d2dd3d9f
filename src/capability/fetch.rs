//! `fetch`: network requests whose responses arrive as promises.
//!
//! The response promise is attributed by the `promise` capability, which
//! every context using `fetch` joins automatically. This handler only
//! announces each request on the context's sub-handler.

use crate::capability::contain::deliver;
use crate::capability::{names, Capability, SubHandlers};
use crate::events::{Event, EventData};
use crate::host::{ApiSlot, FetchFn, FetchRequest, Host, Restore};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, trace, warn};

pub struct FetchHandler {
    slot: Rc<ApiSlot<FetchFn>>,
    handlers: SubHandlers,
    restore: RefCell<Option<Restore<FetchFn>>>,
}

impl FetchHandler {
    pub fn new(host: &Host) -> Self {
        Self {
            slot: host.fetch.clone(),
            handlers: SubHandlers::new(),
            restore: RefCell::new(None),
        }
    }
}

impl Capability for FetchHandler {
    fn name(&self) -> &'static str {
        names::FETCH
    }

    fn install(&self) {
        if self.handlers.installed() {
            return;
        }
        let handlers = self.handlers.clone();
        let restore = self.slot.wrap(|original| {
            Rc::new(move |request: FetchRequest| {
                match handlers.for_current() {
                    Some((ctx, handler)) => {
                        let payload = serde_json::to_value(&request).unwrap_or_else(|err| {
                            warn!(url = %request.url, error = %err, "request not serializable");
                            Value::Null
                        });
                        let mut event = Event::new("request", Some(ctx), EventData::Custom(payload));
                        deliver(&handler, &mut event);
                    }
                    None => trace!(url = %request.url, "unattributed fetch forwarded"),
                }
                original(request)
            })
        });
        *self.restore.borrow_mut() = Some(restore);
        self.handlers.set_installed(true);
        debug!(capability = names::FETCH, "capability installed");
    }

    fn cleanup(&self) {
        if let Some(restore) = self.restore.borrow_mut().take() {
            restore.restore();
        }
        self.handlers.set_installed(false);
        debug!(capability = names::FETCH, "capability cleaned up");
    }

    fn sub_handlers(&self) -> &SubHandlers {
        &self.handlers
    }

    fn uses(&self) -> &'static [&'static str] {
        &[names::PROMISE]
    }
}
