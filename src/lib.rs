//! ctxzone: execution contexts for deferred callbacks
//!
//! Independent execution contexts share one thread while each intercepts,
//! attributes and recovers from errors in the callbacks it schedules through
//! host APIs (timers, listeners, animation frames, handler properties,
//! promise chains, fetch). A callback registered under a context later runs
//! under that same context, and its errors arrive as `error` events on the
//! context's own sub-handler instead of reaching the host.

pub mod capability;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod host;
pub mod logging;
pub mod promise;

pub use capability::{Capability, Registry};
pub use config::{ConfigLoader, ContextConfig, ZoneConfig};
pub use context::{Context, ContextId};
pub use error::{CallbackError, ContextError};
pub use events::{Event, EventAware, EventData, Named};
pub use host::{AddCall, Callback, FetchRequest, Host, RemoveCall, Target};
pub use logging::{init_logging, LoggingConfig};
pub use promise::{Promise, PromiseRuntime, PromiseState};
