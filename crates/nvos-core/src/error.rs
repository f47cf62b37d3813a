//! Error types for the NVOS core.
//!
//! The primitives in this crate (registry, locator, module manager) report
//! every failure precisely through these types and never swallow one.
//! Catching, logging and continuing is left to the orchestration layers in
//! `nvos-runtime`.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

use crate::module::UnitId;
use crate::service::{ServiceKey, ServiceState};

/// Boxed error returned by service and module hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// =============================================================================
// Service Errors
// =============================================================================

/// Errors reported by the [`ServiceRegistry`](crate::ServiceRegistry).
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A service is already registered for this capability type.
    #[error("service '{service}' is already registered")]
    DuplicateService {
        /// The duplicated capability.
        service: ServiceKey,
    },

    /// No service is registered for this capability type.
    #[error("service '{service}' is not registered")]
    NotFound {
        /// The missing capability.
        service: ServiceKey,
    },

    /// The requested transition is not valid from the current state.
    ///
    /// `state` is `None` when the service is not registered at all.
    #[error(
        "cannot {operation} service '{service}' while it is {}",
        .state.map_or("unregistered", ServiceState::as_str)
    )]
    InvalidState {
        /// The capability the transition was requested for.
        service: ServiceKey,
        /// State observed when the request was rejected.
        state: Option<ServiceState>,
        /// Name of the rejected operation (`start` or `stop`).
        operation: &'static str,
    },

    /// The service's own start hook failed. Registry state is unchanged.
    #[error("service '{service}' failed to start: {source}")]
    Startup {
        /// The capability that failed to start.
        service: ServiceKey,
        /// The hook's failure.
        source: BoxError,
    },

    /// The service's own stop hook failed. The entry stays `Running`.
    #[error("service '{service}' failed to stop: {source}")]
    Shutdown {
        /// The capability that failed to stop.
        service: ServiceKey,
        /// The hook's failure.
        source: BoxError,
    },

    /// The entry was removed but the instance's release hook failed.
    #[error("service '{service}' was unregistered but failed to release: {source}")]
    Release {
        /// The capability that was removed.
        service: ServiceKey,
        /// The hook's failure.
        source: BoxError,
    },
}

/// Errors reported when resolving a service by capability type.
#[derive(Debug, Clone, Error)]
pub enum ResolutionError {
    /// Nothing is registered for the requested capability.
    #[error("no service registered for '{service}'")]
    NotRegistered {
        /// Type name of the requested capability.
        service: &'static str,
    },

    /// The registered instance cannot be viewed as the requested type.
    #[error("service registered for '{service}' cannot be viewed as the requested type")]
    TypeMismatch {
        /// Type name of the requested capability.
        service: &'static str,
    },

    /// The global locator was used before a registry was installed.
    #[error("no service registry is installed in the service locator")]
    NoRegistry,
}

// =============================================================================
// Module Errors
// =============================================================================

/// Errors reported by the [`ModuleManager`](crate::ModuleManager).
#[derive(Debug, Error)]
pub enum ModuleError {
    /// The unit does not carry a module manifest.
    #[error("unit '{unit}' does not carry a module manifest")]
    ManifestMissing {
        /// The rejected unit.
        unit: UnitId,
    },

    /// The unit is already tracked as loaded.
    #[error("module '{unit}' is already loaded")]
    AlreadyLoaded {
        /// The rejected unit.
        unit: UnitId,
    },

    /// The unit is not tracked as loaded.
    #[error("module '{unit}' is not loaded")]
    NotLoaded {
        /// The requested unit.
        unit: UnitId,
    },

    /// The module's entry point failed during load. The unit is not tracked.
    #[error("module '{unit}' failed to activate: {source}")]
    Activation {
        /// The unit whose entry point failed.
        unit: UnitId,
        /// The hook's failure.
        source: BoxError,
    },

    /// The unit is already being unloaded further up the call stack.
    #[error("module '{unit}' is already being unloaded")]
    UnloadInProgress {
        /// The requested unit.
        unit: UnitId,
    },

    /// The module's deactivation hook failed. The unit stays tracked.
    #[error("module '{unit}' failed to deactivate: {source}")]
    Deactivation {
        /// The unit whose deactivation hook failed.
        unit: UnitId,
        /// The hook's failure.
        source: BoxError,
    },
}

impl ModuleError {
    /// Returns the unit this error refers to.
    pub fn unit(&self) -> &UnitId {
        match self {
            Self::ManifestMissing { unit }
            | Self::AlreadyLoaded { unit }
            | Self::NotLoaded { unit }
            | Self::UnloadInProgress { unit }
            | Self::Activation { unit, .. }
            | Self::Deactivation { unit, .. } => unit,
        }
    }
}

// =============================================================================
// Hook panics
// =============================================================================

/// A service or module hook panicked instead of returning an error.
#[derive(Debug, Clone, Error)]
#[error("hook panicked: {message}")]
pub struct HookPanicked {
    /// The panic payload, when it was a string.
    pub message: String,
}

impl HookPanicked {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { message }
    }
}

/// Runs a hook, converting a panic into a [`HookPanicked`] error.
pub(crate) fn guard_hook<T, F>(hook: F) -> Result<T, BoxError>
where
    F: FnOnce() -> Result<T, BoxError>,
{
    match panic::catch_unwind(AssertUnwindSafe(hook)) {
        Ok(result) => result,
        Err(payload) => Err(Box::new(HookPanicked::from_payload(payload))),
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for registry operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Result type for service resolution.
pub type ResolutionResult<T> = Result<T, ResolutionError>;

/// Result type for module manager operations.
pub type ModuleResult<T> = Result<T, ModuleError>;

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe;

    #[test]
    fn test_invalid_state_message_for_unregistered() {
        let err = ServiceError::InvalidState {
            service: ServiceKey::of::<Probe>(),
            state: None,
            operation: "start",
        };
        assert!(err.to_string().contains("while it is unregistered"));

        let err = ServiceError::InvalidState {
            service: ServiceKey::of::<Probe>(),
            state: Some(ServiceState::Running),
            operation: "start",
        };
        assert!(err.to_string().contains("while it is running"));
    }

    #[test]
    fn test_guard_hook_converts_panics() {
        let result: Result<(), BoxError> = guard_hook(|| panic!("boom"));
        let err = result.unwrap_err();
        let panicked = err.downcast_ref::<HookPanicked>().unwrap();
        assert_eq!(panicked.message, "boom");

        let result: Result<(), BoxError> = guard_hook(|| Err("plain failure".into()));
        assert_eq!(result.unwrap_err().to_string(), "plain failure");
    }
}
