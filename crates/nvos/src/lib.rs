//! # NVOS
//!
//! A module and service runtime: a registry of process-wide singleton
//! services with an explicit lifecycle, and a manager for pluggable modules
//! that extend the host at runtime.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  discovery loop  ┌───────────────┐   ModuleContext   ┌─────────────────┐
//! │  NvosRuntime │─────────────────▶│ ModuleManager │──────────────────▶│ ServiceRegistry │
//! │   (host)     │                  │   (modules)   │  register/start   │   (services)    │
//! └──────────────┘                  └───────────────┘                   └─────────────────┘
//!        │ shutdown: unload modules ─▶ stop running services ─▶ unregister services
//! ```
//!
//! - **Services**: any `Send + Sync` value registered under a capability type,
//!   moving through `Registered → Running → Stopped`.
//! - **Modules**: units carrying a manifest, declared with
//!   [`define_module!`](prelude::define_module) and loaded by the runtime.
//! - **Runtime**: configuration, logging, discovery and best-effort shutdown.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use nvos::prelude::*;
//!
//! pub trait Greeter: Service {
//!     fn greet(&self, name: &str) -> String;
//! }
//!
//! #[derive(Default)]
//! pub struct GreeterModule;
//!
//! impl Module for GreeterModule {
//!     fn on_load(&mut self, ctx: &ModuleContext) -> Result<(), BoxError> {
//!         ctx.provide::<dyn Greeter>(Arc::new(English))?;
//!         Ok(())
//!     }
//! }
//!
//! define_module! {
//!     pub static GREETER: GreeterModule = {
//!         name: "Greeter",
//!         version: "1.0.0",
//!         author: "NVOS Contributors",
//!     };
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     NvosRuntime::builder().build()?.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use nvos_core as core;
pub use nvos_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use nvos::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use nvos_runtime::{LoadReport, NvosConfig, NvosRuntime, ShutdownReport};

    // Services and modules
    pub use nvos_core::prelude::*;
    pub use nvos_core::{LoadableUnit, LogEvent, ModuleManager, ServiceRegistry, UnitId};

    // Logging macros
    pub use nvos_runtime::tracing::{debug, error, info, warn};
}
