//! NVOS Runtime - host layer around the NVOS core.
//!
//! This crate provides:
//! - Layered configuration loading (`NvosConfig`, `ConfigLoader`)
//! - Tracing subscriber setup (`LoggingBuilder`)
//! - Bootstrap of the well-known services (`NvosRuntime`)
//! - The module discovery loop and the best-effort shutdown routine
//!
//! ```ignore
//! use nvos_runtime::NvosRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = NvosRuntime::builder().build()?;
//!     let report = runtime.run().await?;
//!     if !report.is_clean() {
//!         eprintln!("{} teardown steps failed", report.failures.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod shutdown;

pub use config::{ConfigError, ConfigLoader, ConfigResult, NvosConfig};
pub use discovery::{LoadFailure, LoadReport, SkipReason, load_units};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{NvosRuntime, RuntimeBuilder, wait_for_shutdown};
pub use shutdown::{ShutdownFailure, ShutdownReport, shutdown};

// Re-export tracing for use by module crates
pub use tracing;
