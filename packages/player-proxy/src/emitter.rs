//! Minimal ordered event emitter.
//!
//! The emitter maps an event key to an ordered list of handlers. It knows
//! nothing about players or commands; the proxy and the event adapter are
//! both built on top of it.
//!
//! # Guarantees
//!
//! - **Registration order**: handlers for one event fire in the order they
//!   were added with [`Emitter::on`].
//! - **No de-duplication**: adding the same [`Handler`] twice makes it fire
//!   twice per trigger.
//! - **Snapshot delivery**: a trigger delivers to the handlers registered when
//!   it started. Removing a handler from inside another handler does not
//!   cancel the delivery already in flight, but every later trigger skips it.
//! - **Re-entrant**: handlers may call `on`, `off` or `trigger` on the same
//!   emitter. No internal lock is held while a handler runs.
//!
//! # Example
//!
//! ```ignore
//! let emitter: Emitter<&'static str, u32> = Emitter::new();
//! let handler = Handler::new(|n: &u32| println!("got {n}"));
//!
//! emitter.on("tick", handler.clone());
//! emitter.trigger(&"tick", &1);
//! emitter.off(&"tick", &handler);
//! ```

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;

/// A reference-counted event handler.
///
/// Equality is identity: two `Handler`s are equal only when they are clones
/// of the same registration closure. Keep a clone around to remove it later.
pub struct Handler<P> {
    inner: Arc<dyn Fn(&P) + Send + Sync>,
}

impl<P> Handler<P> {
    /// Wrap a closure as a handler.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Invoke the handler with a payload.
    pub fn call(&self, payload: &P) {
        (self.inner)(payload)
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.inner).cast::<()>()
    }
}

impl<P> Clone for Handler<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P> PartialEq for Handler<P> {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl<P> Eq for Handler<P> {}

impl<P> fmt::Debug for Handler<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&self.addr()).finish()
    }
}

/// Ordered, removable publish/subscribe registry.
///
/// Cloning an `Emitter` shares the registry; every clone sees the same
/// handlers.
pub struct Emitter<E, P> {
    handlers: Arc<DashMap<E, Vec<Handler<P>>>>,
}

impl<E, P> Emitter<E, P>
where
    E: Eq + Hash,
{
    /// Create an empty emitter.
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(DashMap::new()),
        }
    }

    /// Append a handler to the event's handler list.
    pub fn on(&self, event: E, handler: Handler<P>) {
        self.handlers.entry(event).or_default().push(handler);
    }

    /// Remove the first registration of `handler` for `event`.
    ///
    /// Returns `true` if a registration was removed. Removing a handler that
    /// was never added (or was already removed) is a no-op.
    pub fn off(&self, event: &E, handler: &Handler<P>) -> bool {
        let Some(mut handlers) = self.handlers.get_mut(event) else {
            return false;
        };

        match handlers.iter().position(|h| h == handler) {
            Some(index) => {
                handlers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Invoke every handler currently registered for `event`, in order.
    ///
    /// Returns the number of handlers invoked. Panics raised by handlers are
    /// not caught.
    pub fn trigger(&self, event: &E, payload: &P) -> usize {
        let snapshot = self.handlers(event);

        for handler in &snapshot {
            handler.call(payload);
        }

        snapshot.len()
    }

    /// Handlers currently registered for `event`, in order.
    ///
    /// The shard lock is released before this returns, so the handlers can be
    /// run without holding it.
    pub fn handlers(&self, event: &E) -> Vec<Handler<P>> {
        self.handlers
            .get(event)
            .map(|handlers| handlers.value().clone())
            .unwrap_or_default()
    }

    /// Number of handlers currently registered for `event`.
    pub fn listener_count(&self, event: &E) -> usize {
        self.handlers.get(event).map_or(0, |handlers| handlers.len())
    }
}

impl<E, P> Default for Emitter<E, P>
where
    E: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E, P> Clone for Emitter<E, P> {
    fn clone(&self) -> Self {
        Self {
            handlers: Arc::clone(&self.handlers),
        }
    }
}

impl<E, P> fmt::Debug for Emitter<E, P>
where
    E: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("events", &self.handlers.len())
            .finish()
    }
}
