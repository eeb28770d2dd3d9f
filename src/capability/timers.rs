//! `interval` and `timeout`: repeating and one-shot timers, removed by id.

use crate::capability::names;
use crate::capability::CallbackApi;
use crate::host::{AddFn, ApiSlot, Host, RemoveFn};
use std::rc::Rc;

pub struct TimerApi {
    name: &'static str,
    set: Rc<ApiSlot<AddFn>>,
    clear: Rc<ApiSlot<RemoveFn>>,
}

impl TimerApi {
    pub fn interval(host: &Host) -> Self {
        Self {
            name: names::INTERVAL,
            set: host.set_interval.clone(),
            clear: host.clear_interval.clone(),
        }
    }

    pub fn timeout(host: &Host) -> Self {
        Self {
            name: names::TIMEOUT,
            set: host.set_timeout.clone(),
            clear: host.clear_timeout.clone(),
        }
    }
}

impl CallbackApi for TimerApi {
    fn name(&self) -> &'static str {
        self.name
    }

    fn add_slot(&self) -> &Rc<ApiSlot<AddFn>> {
        &self.set
    }

    fn remove_slot(&self) -> Option<&Rc<ApiSlot<RemoveFn>>> {
        Some(&self.clear)
    }
}
