//! The host runtime.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use nvos_runtime::NvosRuntime;
//!
//! // Loads nvos.toml from the current directory, if present.
//! let runtime = NvosRuntime::builder().build()?;
//!
//! // Loads every linked module, waits for Ctrl+C, then shuts down.
//! runtime.run().await?;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use nvos_core::{
    LoadableUnit, LogSink, Logger, ModuleManager, ResolutionResult, ServiceKey, ServiceLocator,
    ServiceRegistry, discover,
};
use serde::Serialize;
use tokio::signal;
use tracing::{debug, info, warn};

use crate::config::{ConfigLoader, NvosConfig};
use crate::discovery::{self, LoadReport};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::shutdown::{self, ShutdownReport};

/// Owns the service registry, the default log sink and the module manager.
///
/// Dropping a runtime that was not shut down explicitly shuts it down.
pub struct NvosRuntime {
    config: NvosConfig,
    registry: Arc<ServiceRegistry>,
    log: Arc<dyn LogSink>,
    modules: Arc<ModuleManager>,
    shut_down: AtomicBool,
}

impl NvosRuntime {
    /// Creates a runtime builder for custom configuration.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Bootstraps a runtime and installs its registry in the
    /// [`ServiceLocator`].
    ///
    /// Initializes logging, then registers and starts the `dyn LogSink` and
    /// [`ModuleManager`] services.
    pub fn from_config(config: &NvosConfig) -> RuntimeResult<Self> {
        let runtime = Self::detached(config)?;
        if ServiceLocator::install(Arc::clone(&runtime.registry)).is_some() {
            warn!("Replaced a previously installed service registry");
        }
        Ok(runtime)
    }

    /// Bootstraps a runtime without touching the [`ServiceLocator`].
    pub fn detached(config: &NvosConfig) -> RuntimeResult<Self> {
        logging::init_from_config(&config.logging);

        let registry = Arc::new(ServiceRegistry::new());

        let log: Arc<dyn LogSink> = Arc::new(Logger::with_level(config.logging.level));
        registry.register::<dyn LogSink>(Arc::clone(&log))?;
        registry.start(ServiceKey::of::<dyn LogSink>())?;
        if cfg!(debug_assertions) {
            log.debug("Running a development build");
        }
        log.info("Core bootstrap finished");

        let modules = Arc::new(ModuleManager::with_settings(
            Arc::clone(&registry),
            config.modules.settings.clone(),
        ));
        registry.register(Arc::clone(&modules))?;
        registry.start(ServiceKey::of::<ModuleManager>())?;
        log.info("Module manager OK");

        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            "Runtime initialized from configuration"
        );

        Ok(Self {
            config: config.clone(),
            registry,
            log,
            modules,
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &NvosConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn log(&self) -> &Arc<dyn LogSink> {
        &self.log
    }

    pub fn modules(&self) -> &Arc<ModuleManager> {
        &self.modules
    }

    /// Resolves capability type `T` from this runtime's registry.
    pub fn resolve<T: ?Sized + 'static>(&self) -> ResolutionResult<Arc<T>> {
        self.registry.resolve::<T>()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Runs the discovery loop over `units`.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::ShutDown`] after [`shutdown`](Self::shutdown).  Per-unit
    /// failures are reported in the [`LoadReport`], never as an error.
    pub fn load_modules<I>(&self, units: I) -> RuntimeResult<LoadReport>
    where
        I: IntoIterator<Item = LoadableUnit>,
    {
        if self.is_shut_down() {
            return Err(RuntimeError::ShutDown);
        }
        Ok(discovery::load_units(
            &self.modules,
            self.log.as_ref(),
            units,
            &self.config.modules,
        ))
    }

    /// Runs the discovery loop over every module linked into the binary.
    pub fn load_discovered(&self) -> RuntimeResult<LoadReport> {
        let units = discover();
        debug!(count = units.len(), "Discovered linked modules");
        self.load_modules(units)
    }

    /// Unloads every module, stops and unregisters every service.
    ///
    /// Only the first call does any work; later calls return an empty report.
    pub fn shutdown(&self) -> ShutdownReport {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            debug!("Runtime already shut down, ignoring");
            return ShutdownReport::default();
        }

        let report = shutdown::shutdown(Some(&self.modules), &self.registry, self.log.as_ref());

        if ServiceLocator::registry().is_some_and(|r| Arc::ptr_eq(&r, &self.registry)) {
            ServiceLocator::uninstall();
        }

        if report.is_clean() {
            info!("Runtime stopped");
        } else {
            warn!(failures = report.failures.len(), "Runtime stopped with failures");
        }
        report
    }

    /// Loads every linked module, waits for Ctrl+C or SIGTERM, then shuts
    /// down.
    pub async fn run(&self) -> RuntimeResult<ShutdownReport> {
        self.load_discovered()?;
        info!("NVOS runtime is now running. Press Ctrl+C to stop.");
        wait_for_shutdown().await?;
        Ok(self.shutdown())
    }

    /// Like [`run`](Self::run), with a custom shutdown future.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<ShutdownReport>
    where
        F: Future<Output = ()>,
    {
        self.load_discovered()?;
        shutdown.await;
        Ok(self.shutdown())
    }
}

impl Drop for NvosRuntime {
    fn drop(&mut self) {
        if !self.is_shut_down() {
            self.shutdown();
        }
    }
}

/// Waits for Ctrl+C, or SIGTERM on Unix.
///
/// Hosts that load modules themselves await this before calling
/// [`NvosRuntime::shutdown`].
pub async fn wait_for_shutdown() -> RuntimeResult<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .map_err(RuntimeError::Signal)?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result.map_err(RuntimeError::Signal)?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.map_err(RuntimeError::Signal)?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for an [`NvosRuntime`] with custom configuration.
///
/// ```rust,ignore
/// let runtime = NvosRuntime::builder()
///     .config_file("config/nvos.toml")
///     .profile("production")
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    install_locator: bool,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            install_locator: true,
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// See [`ConfigLoader::merge`].
    pub fn merge<T: Serialize>(mut self, overrides: T) -> Self {
        self.config_loader = self.config_loader.merge(overrides);
        self
    }

    /// See [`ConfigLoader::set`].
    pub fn set<T: Serialize>(mut self, key: &str, value: T) -> Self {
        self.config_loader = self.config_loader.set(key, value);
        self
    }

    /// Leaves the [`ServiceLocator`] untouched.
    pub fn without_locator(mut self) -> Self {
        self.install_locator = false;
        self
    }

    /// Loads the configuration and bootstraps the runtime.
    pub fn build(self) -> RuntimeResult<NvosRuntime> {
        let config = self.config_loader.load()?;
        if self.install_locator {
            NvosRuntime::from_config(&config)
        } else {
            NvosRuntime::detached(&config)
        }
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
