//! `requestAnimationFrame`: a registration with no removal counterpart.

use crate::capability::names;
use crate::capability::CallbackApi;
use crate::host::{AddFn, ApiSlot, Host};
use std::rc::Rc;

pub struct FrameApi {
    request: Rc<ApiSlot<AddFn>>,
}

impl FrameApi {
    pub fn new(host: &Host) -> Self {
        Self {
            request: host.request_animation_frame.clone(),
        }
    }
}

impl CallbackApi for FrameApi {
    fn name(&self) -> &'static str {
        names::ANIMATION_FRAME
    }

    fn add_slot(&self) -> &Rc<ApiSlot<AddFn>> {
        &self.request
    }
}
