//! # NVOS Core
//!
//! The service and module runtime at the heart of NVOS.
//!
//! ## Layers
//!
//! - **Log sink** ([`logger`]): leveled messages, forwarded to `tracing` and
//!   re-emitted as subscribable [`LogEvent`]s.
//! - **Services** ([`service`]): the [`ServiceRegistry`] owns one singleton per
//!   capability type and drives its `Registered → Running → Stopped` state
//!   machine.  The [`ServiceLocator`] is a read-only global façade over it.
//! - **Modules** ([`module`]): loadable units carrying a [`ModuleManifest`].
//!   The [`ModuleManager`] activates them, tracks them by [`UnitId`], and
//!   deactivates them on unload.
//!
//! ```text
//! ┌──────────────┐  load/unload  ┌───────────────┐  register/start  ┌─────────────────┐
//! │     Host     │──────────────▶│ ModuleManager │─────────────────▶│ ServiceRegistry │
//! │  (discovery) │               │   (records)   │   via context    │    (entries)    │
//! └──────────────┘               └───────────────┘                  └─────────────────┘
//!        │                                                                   ▲
//!        └──────────────────── ServiceLocator::resolve::<T>() ───────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use nvos_core::{ServiceKey, ServiceRegistry, Service};
//!
//! struct Clock;
//! impl Service for Clock {}
//!
//! let registry = ServiceRegistry::new();
//! registry.register(Arc::new(Clock))?;
//! registry.start(ServiceKey::of::<Clock>())?;
//! let clock: Arc<Clock> = registry.resolve()?;
//! ```

pub mod error;
pub mod logger;
pub mod module;
pub mod service;

pub use error::{
    BoxError, HookPanicked, ModuleError, ModuleResult, ResolutionError, ResolutionResult,
    ServiceError, ServiceResult,
};
pub use logger::{LogEvent, LogLevel, LogObserver, LogSink, Logger, SubscriptionId};
pub use module::{
    LoadableUnit, MODULES, Module, ModuleContext, ModuleDescriptor, ModuleFactory, ModuleManager,
    ModuleManifest, UnitId, discover,
};
pub use service::{Service, ServiceKey, ServiceLocator, ServiceRegistry, ServiceState};

#[doc(hidden)]
pub mod __private {
    pub use linkme;
}

/// Prelude for module authors.
pub mod prelude {
    pub use crate::define_module;
    pub use crate::error::{BoxError, ModuleError, ServiceError};
    pub use crate::logger::{LogLevel, LogSink};
    pub use crate::module::{Module, ModuleContext, ModuleManifest};
    pub use crate::service::{Service, ServiceKey, ServiceLocator, ServiceState};
}
