//! Process-wide singleton services.
//!
//! A service is any `Send + Sync` value registered under a *capability type*:
//! either its own concrete type or a trait object such as `dyn LogSink`.
//! The [`ServiceRegistry`] owns the instance and tracks its lifecycle:
//!
//! ```text
//! register() ──► Registered ──start()──► Running ──stop()──► Stopped
//!                                           ▲                   │
//!                                           └──────start()──────┘
//! unregister() removes the entry from any state.
//! ```

pub mod locator;
pub mod registry;

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

pub use locator::ServiceLocator;
pub use registry::ServiceRegistry;

use crate::error::BoxError;

// ─── Service trait ────────────────────────────────────────────────────────────

/// Lifecycle hooks of a registered service.
///
/// Every hook defaults to a no-op, so a plain value only needs an empty
/// `impl Service for T {}`.  Hooks take `&self`; use interior mutability for
/// state that changes between start and stop.
///
/// A capability trait is made registrable by making [`Service`] a supertrait:
///
/// ```rust,ignore
/// pub trait Clock: Service {
///     fn now(&self) -> u64;
/// }
///
/// registry.register::<dyn Clock>(Arc::new(SystemClock))?;
/// ```
pub trait Service: Send + Sync + 'static {
    /// Called by [`ServiceRegistry::start`] before the entry becomes `Running`.
    fn start(&self) -> Result<(), BoxError> {
        Ok(())
    }

    /// Called by [`ServiceRegistry::stop`] before the entry becomes `Stopped`.
    fn stop(&self) -> Result<(), BoxError> {
        Ok(())
    }

    /// Called by [`ServiceRegistry::unregister`] after the entry is removed.
    fn release(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

// ─── ServiceState ─────────────────────────────────────────────────────────────

/// Lifecycle state of a registered service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceState {
    /// Known to the system but not doing work.
    Registered,
    /// Started and actively doing work.
    Running,
    /// Stopped after running; may be started again.
    Stopped,
}

impl ServiceState {
    /// Returns the lowercase state name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── ServiceKey ───────────────────────────────────────────────────────────────

/// Identity of a capability type in the registry.
///
/// Equality and hashing use the [`TypeId`] only; the type name is carried for
/// logs and error messages.
#[derive(Clone, Copy)]
pub struct ServiceKey {
    type_id: TypeId,
    name: &'static str,
}

impl ServiceKey {
    /// Returns the key of capability type `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Returns the capability's type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the capability's [`TypeId`].
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }
}

impl PartialEq for ServiceKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ServiceKey {}

impl Hash for ServiceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ServiceKey").field(&self.name).finish()
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Capability: Service {}
    struct Impl;

    #[test]
    fn test_service_key_identity() {
        assert_eq!(ServiceKey::of::<Impl>(), ServiceKey::of::<Impl>());
        assert_ne!(ServiceKey::of::<Impl>(), ServiceKey::of::<dyn Capability>());
        assert!(ServiceKey::of::<dyn Capability>().name().contains("Capability"));
    }
}
