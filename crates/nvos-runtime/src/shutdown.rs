//! Best-effort teardown.
//!
//! Three phases, always run in order and always run to completion:
//!
//! 1. unload every loaded module (newest first),
//! 2. stop every running service,
//! 3. unregister every service.
//!
//! Phases 2 and 3 also walk the registry newest first.  A failure is logged
//! as a warning, recorded in the [`ShutdownReport`] and skipped over.

use nvos_core::{LogSink, ModuleError, ModuleManager, ServiceError, ServiceKey, ServiceRegistry};
use nvos_core::{ServiceState, UnitId};

/// A step that failed during shutdown.
#[derive(Debug)]
pub enum ShutdownFailure {
    Unload { unit: UnitId, error: ModuleError },
    Stop { service: ServiceKey, error: ServiceError },
    Unregister { service: ServiceKey, error: ServiceError },
}

/// Outcome of a shutdown pass.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    pub unloaded: Vec<UnitId>,
    pub stopped: Vec<ServiceKey>,
    pub unregistered: Vec<ServiceKey>,
    pub failures: Vec<ShutdownFailure>,
}

impl ShutdownReport {
    /// Returns `true` if every step succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Tears down `manager`'s modules and every service in `registry`.
///
/// `log` is used for warnings; it stays usable after its own entry has been
/// unregistered because the caller holds a reference.
pub fn shutdown(
    manager: Option<&ModuleManager>,
    registry: &ServiceRegistry,
    log: &dyn LogSink,
) -> ShutdownReport {
    let mut report = ShutdownReport::default();
    log.info("Shutting down NVOS");

    if let Some(manager) = manager {
        for unit in manager.loaded_ids().into_iter().rev() {
            match manager.unload(&unit) {
                Ok(()) => report.unloaded.push(unit),
                Err(error) => {
                    log.warn(&format!("Failed to unload module {unit}: {error}"));
                    report.failures.push(ShutdownFailure::Unload { unit, error });
                }
            }
        }
    }

    let running = registry
        .snapshot()
        .into_iter()
        .rev()
        .filter(|(_, state)| *state == ServiceState::Running);
    for (service, _) in running {
        match registry.stop(service) {
            Ok(()) => report.stopped.push(service),
            Err(error) => {
                log.warn(&format!("Failed to stop service {service}: {error}"));
                report.failures.push(ShutdownFailure::Stop { service, error });
            }
        }
    }

    for service in registry.registered().into_iter().rev() {
        match registry.unregister(service) {
            Ok(()) => report.unregistered.push(service),
            Err(error) => {
                log.warn(&format!("Failed to unregister service {service}: {error}"));
                report
                    .failures
                    .push(ShutdownFailure::Unregister { service, error });
            }
        }
    }

    log.info(&format!(
        "Shutdown finished: {} modules unloaded, {} services stopped, {} unregistered, {} failures",
        report.unloaded.len(),
        report.stopped.len(),
        report.unregistered.len(),
        report.failures.len()
    ));
    report
}
