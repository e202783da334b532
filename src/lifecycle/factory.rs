//! # Lazy unit construction.
//!
//! A unit can be registered as a live instance or as a [`UnitFactory`] that
//! the orchestrator calls the first time the unit is initialized.
//! [`FactoryFn`] wraps a closure and reports the built type as its kind, so a
//! factory and an instance of the same type are interchangeable registrations.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use servicevisor::{FactoryFn, Unit, UnitContext, UnitError, UnitFactory};
//!
//! struct Cache { size: usize }
//!
//! #[async_trait]
//! impl Unit for Cache {
//!     fn name(&self) -> &str { "cache" }
//!     async fn start(&self, _ctx: &UnitContext) -> Result<(), UnitError> { Ok(()) }
//! }
//!
//! let factory = FactoryFn::arc(|_ctx: &UnitContext| Ok(Cache { size: 64 }));
//! assert!(factory.kind().ends_with("Cache"));
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::UnitError;
use crate::lifecycle::unit::{Unit, UnitContext};

/// Shared handle to a unit implementation.
pub type UnitRef = Arc<dyn Unit>;

/// Builds a unit on first use.
pub trait UnitFactory: Send + Sync + 'static {
    /// Kind of unit this factory produces.
    fn kind(&self) -> &'static str;

    /// Constructs the unit.
    fn build(&self, ctx: &UnitContext) -> Result<UnitRef, UnitError>;
}

/// Closure-backed factory.
pub struct FactoryFn<U, F> {
    f: F,
    _unit: PhantomData<fn() -> U>,
}

impl<U, F> FactoryFn<U, F>
where
    U: Unit,
    F: Fn(&UnitContext) -> Result<U, UnitError> + Send + Sync + 'static,
{
    /// Creates a factory from a constructor closure.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _unit: PhantomData,
        }
    }

    /// Creates the factory and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

impl<U, F> UnitFactory for FactoryFn<U, F>
where
    U: Unit,
    F: Fn(&UnitContext) -> Result<U, UnitError> + Send + Sync + 'static,
{
    fn kind(&self) -> &'static str {
        std::any::type_name::<U>()
    }

    fn build(&self, ctx: &UnitContext) -> Result<UnitRef, UnitError> {
        let unit = (self.f)(ctx)?;
        Ok(Arc::new(unit))
    }
}

/// How a registered unit is obtained.
#[derive(Clone)]
pub enum UnitSource {
    /// Already constructed.
    Instance(UnitRef),
    /// Constructed lazily on first initialization.
    Factory(Arc<dyn UnitFactory>),
}

impl UnitSource {
    /// Kind of unit behind this source.
    pub fn kind(&self) -> &'static str {
        match self {
            UnitSource::Instance(unit) => unit.kind(),
            UnitSource::Factory(factory) => factory.kind(),
        }
    }

    /// True for [`UnitSource::Factory`].
    pub fn is_lazy(&self) -> bool {
        matches!(self, UnitSource::Factory(_))
    }
}

impl fmt::Debug for UnitSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitSource::Instance(unit) => write!(f, "Instance({})", unit.kind()),
            UnitSource::Factory(factory) => write!(f, "Factory({})", factory.kind()),
        }
    }
}

impl From<UnitRef> for UnitSource {
    fn from(unit: UnitRef) -> Self {
        UnitSource::Instance(unit)
    }
}

impl From<Arc<dyn UnitFactory>> for UnitSource {
    fn from(factory: Arc<dyn UnitFactory>) -> Self {
        UnitSource::Factory(factory)
    }
}
