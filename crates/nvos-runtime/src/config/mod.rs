//! Configuration for the NVOS host runtime.
//!
//! Layered loading with figment (defaults, files, `NVOS_*` environment,
//! programmatic merges) into [`NvosConfig`], followed by validation.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    LogFormat, LogOutput, LogRotation, LoggingConfig, ModulesConfig, NvosConfig, SpanEventConfig,
};
pub use validation::validate_config;
