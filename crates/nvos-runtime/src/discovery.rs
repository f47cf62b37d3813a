//! The module discovery loop.
//!
//! Walks candidate units in the order the host supplies them and loads every
//! module that is not disabled or already loaded.  Each unit is handled
//! independently: a failure is logged with the unit identity and cause, and
//! the loop moves on.

use nvos_core::{LoadableUnit, LogSink, ModuleError, ModuleManager, UnitId};

use crate::config::ModulesConfig;

const SEPARATOR: &str = "------------------------------";

/// Why a unit was not loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The unit carries no module manifest.
    NotAModule,
    /// The module is listed in `modules.disabled`.
    Disabled,
    /// The unit is already tracked by the manager.
    AlreadyLoaded,
}

/// A unit whose load failed.
#[derive(Debug)]
pub struct LoadFailure {
    pub unit: UnitId,
    pub error: ModuleError,
}

/// Outcome of one discovery pass.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Loaded units, in load order.
    pub loaded: Vec<UnitId>,
    pub skipped: Vec<(UnitId, SkipReason)>,
    pub failed: Vec<LoadFailure>,
}

impl LoadReport {
    /// Returns `true` if no unit failed to load.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Loads every eligible unit from `units` through `manager`.
///
/// Never fails as a whole; per-unit failures end up in
/// [`LoadReport::failed`].
pub fn load_units<I>(
    manager: &ModuleManager,
    log: &dyn LogSink,
    units: I,
    modules: &ModulesConfig,
) -> LoadReport
where
    I: IntoIterator<Item = LoadableUnit>,
{
    let mut report = LoadReport::default();
    log.info("Loading NVOS modules");

    for unit in units {
        let id = unit.id().clone();

        let Some(manifest) = unit.manifest() else {
            log.debug(&format!("Unit {id} is not a module, skipping."));
            report.skipped.push((id, SkipReason::NotAModule));
            continue;
        };

        if modules.is_disabled(manifest.name()) {
            log.info(&format!(
                "Module {} is disabled by configuration, skipping.",
                manifest.name()
            ));
            report.skipped.push((id, SkipReason::Disabled));
            continue;
        }

        if manager.is_loaded(&id) {
            log.debug(&format!("Module {id} is already loaded, skipping."));
            report.skipped.push((id, SkipReason::AlreadyLoaded));
            continue;
        }

        log.info(SEPARATOR);
        log.info(&format!("{} {}", manifest.name(), manifest.version()));
        log.info(&format!("by {}", manifest.author()));
        log.info(&format!(
            "Description: {}",
            manifest.description().unwrap_or("None")
        ));
        log.info(&format!("Unit: {id}"));
        log.info(SEPARATOR);

        match manager.load(&unit) {
            Ok(()) => {
                log.info("Module load OK");
                report.loaded.push(id);
            }
            Err(error) => {
                log.error(&format!("Failed to load module {id}: {error}"));
                report.failed.push(LoadFailure { unit: id, error });
            }
        }
    }

    log.info(&format!(
        "Module discovery finished: {} loaded, {} skipped, {} failed",
        report.loaded.len(),
        report.skipped.len(),
        report.failed.len()
    ));
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use nvos_core::{
        BoxError, LogEvent, LogLevel, Logger, Module, ModuleContext, ModuleManifest,
        ServiceRegistry,
    };
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Probe {
        fail: bool,
    }

    impl Module for Probe {
        fn on_load(&mut self, _ctx: &ModuleContext) -> Result<(), BoxError> {
            if self.fail {
                return Err("incompatible engine version".into());
            }
            Ok(())
        }
    }

    fn module(id: &'static str, name: &'static str, fail: bool) -> LoadableUnit {
        LoadableUnit::new(
            id,
            ModuleManifest::new(name, "1.0.0", "tests", Some("probe module")),
            move || Box::new(Probe { fail }),
        )
    }

    fn recording_logger() -> (Logger, Arc<Mutex<Vec<LogEvent>>>) {
        let logger = Logger::with_level(LogLevel::Debug);
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        logger.on_log(move |event| sink.lock().push(event.clone()));
        (logger, events)
    }

    fn manager() -> ModuleManager {
        ModuleManager::new(Arc::new(ServiceRegistry::new()))
    }

    #[test]
    fn test_failed_unit_does_not_stop_the_loop() {
        let manager = manager();
        let (logger, events) = recording_logger();
        let units = vec![
            module("m1", "First", false),
            module("m2", "Second", true),
            module("m3", "Third", false),
        ];

        let report = load_units(&manager, &logger, units, &ModulesConfig::default());

        assert_eq!(report.loaded, vec![UnitId::from("m1"), UnitId::from("m3")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].unit, UnitId::from("m2"));
        assert!(matches!(report.failed[0].error, ModuleError::Activation { .. }));
        assert!(!manager.is_loaded(&UnitId::from("m2")));

        let events = events.lock();
        let failure = events
            .iter()
            .find(|e| e.level == LogLevel::Error)
            .unwrap();
        assert!(failure.message.contains("m2"));
        assert!(failure.message.contains("incompatible engine version"));
    }

    #[test]
    fn test_plain_disabled_and_loaded_units_are_skipped() {
        let manager = manager();
        let (logger, _) = recording_logger();
        manager.load(&module("audio", "Audio", false)).unwrap();

        let modules = ModulesConfig {
            disabled: vec!["Telemetry".into()],
            ..Default::default()
        };
        let units = vec![
            LoadableUnit::plain("helpers"),
            module("telemetry", "Telemetry", false),
            module("audio", "Audio", false),
        ];

        let report = load_units(&manager, &logger, units, &modules);

        assert!(report.loaded.is_empty());
        assert!(report.is_clean());
        assert_eq!(
            report.skipped,
            vec![
                (UnitId::from("helpers"), SkipReason::NotAModule),
                (UnitId::from("telemetry"), SkipReason::Disabled),
                (UnitId::from("audio"), SkipReason::AlreadyLoaded),
            ]
        );
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_module_summary_is_logged() {
        let manager = manager();
        let (logger, events) = recording_logger();

        load_units(
            &manager,
            &logger,
            vec![module("radio", "Radio", false)],
            &ModulesConfig::default(),
        );

        let messages: Vec<String> = events.lock().iter().map(|e| e.message.clone()).collect();
        let start = messages.iter().position(|m| m == SEPARATOR).unwrap();
        assert_eq!(
            &messages[start..start + 7],
            &[
                SEPARATOR.to_string(),
                "Radio 1.0.0".to_string(),
                "by tests".to_string(),
                "Description: probe module".to_string(),
                "Unit: radio".to_string(),
                SEPARATOR.to_string(),
                "Module load OK".to_string(),
            ]
        );
    }
}
