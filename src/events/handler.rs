//! # Event handlers.
//!
//! [`Handler`] is what the dispatcher calls for every event a subscription
//! matches. [`HandlerFn`] wraps a closure `F: Fn(Arc<Event>) -> Fut`, producing
//! a fresh future per event.
//!
//! ## Contract
//! - Handlers run on the dispatcher task, one after another. A slow handler
//!   delays every later event; offload heavy work with `tokio::spawn`.
//! - An `Err` or a panic is caught, logged and counted; the remaining handlers
//!   still receive the event.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use servicevisor::{Event, HandlerError, HandlerFn, HandlerRef};
//!
//! let h: HandlerRef = HandlerFn::arc("audit", |ev: Arc<Event>| async move {
//!     if ev.payload.is_null() {
//!         return Err::<(), HandlerError>("empty payload".into());
//!     }
//!     Ok(())
//! });
//! assert_eq!(h.name(), "audit");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::events::Event;

/// Error type handlers return; anything convertible with `?` or `.into()`.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Shared handle to a handler.
pub type HandlerRef = Arc<dyn Handler>;

/// Callback invoked by the dispatcher.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Handle one event.
    async fn handle(&self, event: Arc<Event>) -> Result<(), HandlerError>;

    /// Human-readable name (for logs).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Identity of a handler: the address of its shared allocation.
pub(crate) fn same_handler(a: &HandlerRef, b: &HandlerRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Function-backed handler.
#[derive(Debug)]
pub struct HandlerFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F, Fut> HandlerFn<F>
where
    F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    /// Creates a new function-backed handler.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the handler and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, event: Arc<Event>) -> Result<(), HandlerError> {
        (self.f)(event).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
