//! Name-to-capability registry and context creation.

use crate::capability::{
    names, AddRemoveHandler, Capability, FetchHandler, FrameApi, ListenerApi, PromiseHandler,
    PropertyHandler, TimerApi,
};
use crate::config::ContextConfig;
use crate::context::Context;
use crate::error::ContextError;
use crate::host::Host;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::rc::Rc;
use tracing::{debug, info};

/// Registered capabilities, keyed by name. Clones share the same table.
#[derive(Clone, Default)]
pub struct Registry {
    capabilities: Rc<RefCell<BTreeMap<String, Rc<dyn Capability>>>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in capability, bound to `host`.
    pub fn with_builtins(host: &Host) -> Self {
        let registry = Self::new();
        registry.register(Rc::new(AddRemoveHandler::new(TimerApi::interval(host))));
        registry.register(Rc::new(AddRemoveHandler::new(TimerApi::timeout(host))));
        registry.register(Rc::new(AddRemoveHandler::new(ListenerApi::new(host))));
        registry.register(Rc::new(AddRemoveHandler::new(FrameApi::new(host))));
        registry.register(Rc::new(PropertyHandler::new(host)));
        registry.register(Rc::new(PromiseHandler::new(&host.promises)));
        registry.register(Rc::new(FetchHandler::new(host)));
        registry
    }

    /// Register `capability` under its own name, replacing any previous entry.
    pub fn register(&self, capability: Rc<dyn Capability>) {
        let name = capability.name().to_string();
        if self
            .capabilities
            .borrow_mut()
            .insert(name.clone(), capability)
            .is_some()
        {
            debug!(capability = %name, "capability re-registered");
        }
    }

    pub fn get(&self, name: &str) -> Option<Rc<dyn Capability>> {
        self.capabilities.borrow().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.capabilities.borrow().keys().cloned().collect()
    }

    /// Build a context wired into every named capability and everything
    /// those capabilities use.
    ///
    /// Each capability is installed on first use. Names are processed once
    /// even when requested repeatedly or reached through several `uses`
    /// lists. An unknown name fails the whole call; capabilities processed
    /// before it stay installed.
    pub fn create_ctx<I, S>(&self, requested: I) -> Result<Context, ContextError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ctx = Context::new(self.clone());
        let mut queue: VecDeque<String> = requested
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .collect();
        let mut processed = HashSet::new();

        while let Some(name) = queue.pop_front() {
            if !processed.insert(name.clone()) {
                continue;
            }
            let capability = self
                .get(&name)
                .ok_or_else(|| ContextError::UnknownCapability(name.clone()))?;
            queue.extend(capability.uses().iter().map(|used| used.to_string()));
            if !capability.installed() {
                capability.install();
            }
            capability.register_ctx(&ctx);
            ctx.record_capability(&name);
        }

        debug!(
            context = %ctx.id(),
            capabilities = ?ctx.capabilities(),
            "context created"
        );
        Ok(ctx)
    }

    /// Build a context from the configured default capability list.
    pub fn create_ctx_from_config(&self, config: &ContextConfig) -> Result<Context, ContextError> {
        self.create_ctx(&config.default_capabilities)
    }

    /// Restore every installed capability's host API.
    pub fn cleanup(&self) {
        let capabilities: Vec<_> = self.capabilities.borrow().values().cloned().collect();
        let mut restored = 0;
        for capability in capabilities.into_iter().filter(|c| c.installed()) {
            capability.cleanup();
            restored += 1;
        }
        info!(restored, "capabilities cleaned up");
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("capabilities", &self.names())
            .finish()
    }
}

/// Every built-in capability name, in registration order of [`Registry::with_builtins`].
pub const BUILTINS: &[&str] = &[
    names::INTERVAL,
    names::TIMEOUT,
    names::EVENT_LISTENER,
    names::ANIMATION_FRAME,
    names::DOM_EVENT,
    names::PROMISE,
    names::FETCH,
];
