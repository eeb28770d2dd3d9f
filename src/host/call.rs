//! Callbacks, receivers and the argument records of callback-registering APIs.

use serde_json::Value;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

type CallbackFn = dyn Fn(&[Value]) -> anyhow::Result<()>;

/// A user callback handed to a host API.
///
/// Clones share identity; [`Callback::same_as`] is how a removal call finds
/// the registration it refers to.
#[derive(Clone)]
pub struct Callback(Rc<CallbackFn>);

impl Callback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> anyhow::Result<()> + 'static,
    {
        Self(Rc::new(f))
    }

    pub fn call(&self, args: &[Value]) -> anyhow::Result<()> {
        (self.0)(args)
    }

    pub fn same_as(&self, other: &Callback) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// A handle that does not keep the callback alive.
    pub fn downgrade(&self) -> WeakCallback {
        WeakCallback(Rc::downgrade(&self.0))
    }
}

/// Non-owning counterpart of [`Callback`].
#[derive(Clone)]
pub struct WeakCallback(Weak<CallbackFn>);

impl WeakCallback {
    pub fn upgrade(&self) -> Option<Callback> {
        self.0.upgrade().map(Callback)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:p})", Rc::as_ptr(&self.0))
    }
}

static TARGET_COUNTER: AtomicU64 = AtomicU64::new(1);

/// An object a listener API is invoked on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    id: u64,
    label: Rc<str>,
}

impl Target {
    pub fn new(label: impl AsRef<str>) -> Self {
        Self {
            id: TARGET_COUNTER.fetch_add(1, Ordering::Relaxed),
            label: Rc::from(label.as_ref()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Arguments of a callback-registering host API.
///
/// `args` holds every non-callback argument in call order:
/// `[delay, trailing...]` for timers, `[listener_type, options...]` for
/// listeners, nothing for animation frames.
#[derive(Debug, Clone)]
pub struct AddCall {
    pub target: Option<Target>,
    pub args: Vec<Value>,
    pub callback: Callback,
}

impl AddCall {
    /// A call on a free function such as a timer.
    pub fn global(callback: Callback, args: Vec<Value>) -> Self {
        Self {
            target: None,
            args,
            callback,
        }
    }

    pub fn on(target: Target, callback: Callback, args: Vec<Value>) -> Self {
        Self {
            target: Some(target),
            args,
            callback,
        }
    }

    /// Timer delay or period in milliseconds.
    pub fn delay(&self) -> Option<u64> {
        self.args.first().and_then(Value::as_u64)
    }

    /// Arguments after the first one: timer trailing arguments or listener options.
    pub fn trailing(&self) -> &[Value] {
        self.args.get(1..).unwrap_or_default()
    }

    pub fn listener_type(&self) -> Option<&str> {
        self.args.first().and_then(Value::as_str)
    }
}

/// Arguments of a deregistering host API.
#[derive(Debug, Clone)]
pub struct RemoveCall {
    pub target: Option<Target>,
    pub args: Vec<Value>,
    pub callback: Option<Callback>,
}

impl RemoveCall {
    /// Removal by id, as timers do it.
    pub fn by_id(id: Value) -> Self {
        Self {
            target: None,
            args: vec![id],
            callback: None,
        }
    }

    pub fn on(target: Target, callback: Callback, args: Vec<Value>) -> Self {
        Self {
            target: Some(target),
            args,
            callback: Some(callback),
        }
    }

    /// The identifier being removed: the timer id, or the listener type.
    pub fn id(&self) -> Option<&Value> {
        self.args.first()
    }

    pub fn listener_type(&self) -> Option<&str> {
        self.args.first().and_then(Value::as_str)
    }

    pub fn trailing(&self) -> &[Value] {
        self.args.get(1..).unwrap_or_default()
    }
}
