use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use super::manifest::ModuleManifest;
use super::unit::UnitId;
use crate::error::{ResolutionResult, ServiceResult};
use crate::logger::{LogSink, Logger};
use crate::service::{Service, ServiceKey, ServiceRegistry};

/// Handle given to a module's entry point.
///
/// Gives the module access to the service registry, its own identity and
/// manifest, and its configuration section.
#[derive(Clone)]
pub struct ModuleContext {
    unit: UnitId,
    manifest: ModuleManifest,
    registry: Arc<ServiceRegistry>,
    config: Arc<Value>,
}

impl ModuleContext {
    pub(crate) fn new(
        unit: UnitId,
        manifest: ModuleManifest,
        registry: Arc<ServiceRegistry>,
        config: Value,
    ) -> Self {
        Self {
            unit,
            manifest,
            registry,
            config: Arc::new(config),
        }
    }

    /// Identity of the unit this context was created for.
    pub fn unit(&self) -> &UnitId {
        &self.unit
    }

    /// The module's manifest.
    pub fn manifest(&self) -> &ModuleManifest {
        &self.manifest
    }

    /// The host's service registry.
    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    // ─── Services ────────────────────────────────────────────────────────────

    /// Resolves capability type `T`.
    pub fn resolve<T: ?Sized + 'static>(&self) -> ResolutionResult<Arc<T>> {
        self.registry.resolve::<T>()
    }

    /// Registers `instance` as capability `T` without starting it.
    pub fn register<T: ?Sized + Service>(&self, instance: Arc<T>) -> ServiceResult<()> {
        self.registry.register::<T>(instance)
    }

    /// Starts the service registered as capability `T`.
    pub fn start<T: ?Sized + 'static>(&self) -> ServiceResult<()> {
        self.registry.start(ServiceKey::of::<T>())
    }

    /// Registers and starts `instance` as capability `T`.
    ///
    /// If the start hook fails the registration is rolled back, so a retry
    /// does not hit a duplicate.
    pub fn provide<T: ?Sized + Service>(&self, instance: Arc<T>) -> ServiceResult<()> {
        let key = ServiceKey::of::<T>();
        self.registry.register::<T>(instance)?;
        if let Err(err) = self.registry.start(key) {
            if let Err(rollback) = self.registry.unregister(key) {
                warn!(
                    unit = %self.unit,
                    service = %key,
                    error = %rollback,
                    "Failed to roll back registration"
                );
            }
            return Err(err);
        }
        Ok(())
    }

    /// Returns the registered log sink, or a detached default logger when
    /// none is registered.
    pub fn log(&self) -> Arc<dyn LogSink> {
        self.registry
            .resolve::<dyn LogSink>()
            .unwrap_or_else(|_| Arc::new(Logger::new()))
    }

    // ─── Configuration ───────────────────────────────────────────────────────

    /// Returns the raw configuration section (`Null` when absent).
    pub fn config(&self) -> &Value {
        &self.config
    }

    /// Deserializes the configuration section.
    ///
    /// An absent section deserializes like an empty table, so types with
    /// `#[serde(default)]` get their defaults.
    pub fn get_config<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match self.config.as_ref() {
            Value::Null => T::deserialize(Value::Object(serde_json::Map::new())),
            section => T::deserialize(section),
        }
    }
}

impl fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleContext")
            .field("unit", &self.unit)
            .field("manifest", &self.manifest)
            .finish_non_exhaustive()
    }
}
