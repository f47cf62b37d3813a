//! Global, read-only access to the installed service registry.
//!
//! The locator is installed once at bootstrap and is only ever used to
//! *resolve*.  Registration and lifecycle control stay with whoever owns the
//! [`ServiceRegistry`].

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::registry::ServiceRegistry;
use crate::error::{ResolutionError, ResolutionResult};

static REGISTRY: RwLock<Option<Arc<ServiceRegistry>>> = parking_lot::const_rwlock(None);

/// Process-wide façade over the installed [`ServiceRegistry`].
pub struct ServiceLocator;

impl ServiceLocator {
    /// Installs `registry` as the process-wide registry.
    ///
    /// Returns the previously installed registry, if any.
    pub fn install(registry: Arc<ServiceRegistry>) -> Option<Arc<ServiceRegistry>> {
        debug!("Installing service registry into the locator");
        REGISTRY.write().replace(registry)
    }

    /// Removes the installed registry and returns it.
    pub fn uninstall() -> Option<Arc<ServiceRegistry>> {
        debug!("Uninstalling service registry from the locator");
        REGISTRY.write().take()
    }

    /// Returns the installed registry, if any.
    pub fn registry() -> Option<Arc<ServiceRegistry>> {
        REGISTRY.read().clone()
    }

    /// Returns `true` if a registry is installed.
    pub fn is_installed() -> bool {
        REGISTRY.read().is_some()
    }

    /// Resolves capability type `T` from the installed registry.
    ///
    /// # Errors
    ///
    /// - [`ResolutionError::NoRegistry`] if nothing is installed.
    /// - [`ResolutionError::NotRegistered`] if `T` has no entry.
    pub fn resolve<T: ?Sized + 'static>() -> ResolutionResult<Arc<T>> {
        // Clone out so the registry lock is not held across the global one.
        let registry = Self::registry().ok_or(ResolutionError::NoRegistry)?;
        registry.resolve::<T>()
    }
}
