//! Error types for context tracking and capability interception.

use crate::context::ContextId;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Contract violations. These surface synchronously and are never swallowed.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("event must have a name")]
    UnnamedEvent,

    #[error("capability '{0}' was not registered")]
    UnknownCapability(String),

    #[error("context {context} is not registered with capability '{capability}'")]
    NotRegistered {
        context: ContextId,
        capability: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for ContextError {
    fn from(err: config::ConfigError) -> Self {
        ContextError::Config(err.to_string())
    }
}

/// An error returned by a user callback or promise handler.
///
/// Cheap to clone so one rejection can travel down a promise chain and into
/// every event that reports it.
#[derive(Clone)]
pub struct CallbackError(Rc<anyhow::Error>);

impl CallbackError {
    pub fn new(error: anyhow::Error) -> Self {
        Self(Rc::new(error))
    }

    pub fn msg(message: impl fmt::Display + fmt::Debug + Send + Sync + 'static) -> Self {
        Self::new(anyhow::Error::msg(message))
    }

    /// Attempt to view the underlying error as a concrete type.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref::<E>()
    }

    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }

    /// True when both values report the same underlying error.
    pub fn same_as(&self, other: &CallbackError) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl From<anyhow::Error> for CallbackError {
    fn from(error: anyhow::Error) -> Self {
        Self::new(error)
    }
}

impl fmt::Display for CallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl fmt::Debug for CallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}
