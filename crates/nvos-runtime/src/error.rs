//! Runtime error types.

use nvos_core::{ModuleError, ResolutionError, ServiceError};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while bootstrapping or driving the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A well-known service could not be registered or started.
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    /// A well-known service could not be resolved.
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// A module operation requested directly through the runtime failed.
    #[error("Module error: {0}")]
    Module(#[from] ModuleError),

    /// The runtime was used after shutdown.
    #[error("Runtime has already been shut down")]
    ShutDown,

    /// Waiting for the termination signal failed.
    #[error("Failed to listen for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
