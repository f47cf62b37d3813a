//! Greeting module for NVOS.
//!
//! Provides the [`Greeter`] capability to the host's service registry.
//! Linking this crate into a host binary is enough for the runtime to
//! discover and load it.
//!
//! Configure it via `nvos.toml`:
//!
//! ```toml
//! [modules.settings.Greeter]
//! salutation = "Howdy"
//! punctuation = "!"
//! ```
//!
//! Consumers resolve the service through the locator:
//!
//! ```rust,ignore
//! let greeter = ServiceLocator::resolve::<dyn Greeter>()?;
//! println!("{}", greeter.greet("world"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use nvos::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Capability exposed by this module.
pub trait Greeter: Service {
    /// Builds a greeting addressed to `name`.
    fn greet(&self, name: &str) -> String;

    /// Number of greetings handed out since registration.
    fn greeted(&self) -> u64;
}

/// Settings read from `modules.settings.Greeter`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GreeterConfig {
    pub salutation: String,
    pub punctuation: String,
}

impl Default for GreeterConfig {
    fn default() -> Self {
        Self {
            salutation: "Hello".into(),
            punctuation: ".".into(),
        }
    }
}

/// [`Greeter`] backed by a fixed salutation.
pub struct ConfiguredGreeter {
    config: GreeterConfig,
    greeted: AtomicU64,
}

impl ConfiguredGreeter {
    pub fn new(config: GreeterConfig) -> Self {
        Self {
            config,
            greeted: AtomicU64::new(0),
        }
    }
}

impl Service for ConfiguredGreeter {
    fn start(&self) -> Result<(), BoxError> {
        debug!(salutation = %self.config.salutation, "Greeter started");
        Ok(())
    }

    fn stop(&self) -> Result<(), BoxError> {
        debug!(greeted = self.greeted(), "Greeter stopped");
        Ok(())
    }
}

impl Greeter for ConfiguredGreeter {
    fn greet(&self, name: &str) -> String {
        self.greeted.fetch_add(1, Ordering::Relaxed);
        format!(
            "{}, {}{}",
            self.config.salutation, name, self.config.punctuation
        )
    }

    fn greeted(&self) -> u64 {
        self.greeted.load(Ordering::Relaxed)
    }
}

/// Module entry point.
#[derive(Default)]
pub struct GreeterModule;

impl Module for GreeterModule {
    fn on_load(&mut self, ctx: &ModuleContext) -> Result<(), BoxError> {
        let config: GreeterConfig = ctx.get_config()?;
        if config.salutation.trim().is_empty() {
            return Err("salutation must not be empty".into());
        }
        ctx.provide::<dyn Greeter>(Arc::new(ConfiguredGreeter::new(config)))?;
        ctx.log().info("Greeter service is up");
        Ok(())
    }

    fn on_unload(&mut self, ctx: &ModuleContext) -> Result<(), BoxError> {
        if let Ok(greeter) = ctx.resolve::<dyn Greeter>() {
            ctx.log()
                .info(&format!("Greeter said hello {} times", greeter.greeted()));
        }
        Ok(())
    }
}

define_module! {
    /// The greeter module, providing `dyn Greeter`.
    pub static GREETER: GreeterModule = {
        name: "Greeter",
        version: env!("CARGO_PKG_VERSION"),
        author: "NVOS Contributors",
        description: "Hands out configurable greetings",
    };
}
