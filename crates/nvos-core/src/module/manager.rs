//! The module manager.
//!
//! Tracks loaded modules by [`UnitId`].  Entry points run without the
//! manager lock held, so a module may resolve services (including the
//! manager itself) while it loads or unloads.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::context::ModuleContext;
use super::entry::Module;
use super::manifest::ModuleManifest;
use super::unit::{LoadableUnit, UnitId};
use crate::error::{ModuleError, ModuleResult, guard_hook};
use crate::service::{Service, ServiceRegistry};

struct ModuleRecord {
    id: UnitId,
    manifest: ModuleManifest,
    context: ModuleContext,
    instance: Arc<Mutex<Box<dyn Module>>>,
}

/// Loads, tracks and unloads modules.
///
/// Registered in the service registry under its own type so hosts and
/// modules can resolve it.
pub struct ModuleManager {
    registry: Arc<ServiceRegistry>,
    /// Per-module configuration sections, keyed by manifest name.
    settings: HashMap<String, Value>,
    /// Loaded modules in load order.
    modules: RwLock<Vec<ModuleRecord>>,
}

impl ModuleManager {
    /// Creates a manager whose modules use `registry`.
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self::with_settings(registry, HashMap::new())
    }

    /// Creates a manager handing `settings[manifest.name]` to each module.
    pub fn with_settings(registry: Arc<ServiceRegistry>, settings: HashMap<String, Value>) -> Self {
        Self {
            registry,
            settings,
            modules: RwLock::new(Vec::new()),
        }
    }

    /// Returns `true` if `unit` is currently tracked.
    pub fn is_loaded(&self, unit: &UnitId) -> bool {
        self.modules.read().iter().any(|r| &r.id == unit)
    }

    /// Loads `unit`: instantiates its entry point, activates it and tracks it.
    ///
    /// # Errors
    ///
    /// - [`ModuleError::ManifestMissing`] if the unit is not a module.
    /// - [`ModuleError::AlreadyLoaded`] if the unit is already tracked.
    /// - [`ModuleError::Activation`] if the entry point fails or panics; the
    ///   unit is not tracked.
    pub fn load(&self, unit: &LoadableUnit) -> ModuleResult<()> {
        let id = unit.id().clone();
        let (Some(manifest), Some(factory)) = (unit.manifest(), unit.factory()) else {
            return Err(ModuleError::ManifestMissing { unit: id });
        };
        if self.is_loaded(&id) {
            return Err(ModuleError::AlreadyLoaded { unit: id });
        }

        let config = self.settings_for(manifest.name());
        let context = ModuleContext::new(
            id.clone(),
            manifest.clone(),
            Arc::clone(&self.registry),
            config,
        );

        debug!(unit = %id, module = %manifest, "Activating module");
        let instance = guard_hook(|| {
            let mut module = factory();
            module.on_load(&context)?;
            Ok(module)
        })
        .map_err(|source| ModuleError::Activation {
            unit: id.clone(),
            source,
        })?;

        let mut modules = self.modules.write();
        if modules.iter().any(|r| r.id == id) {
            // Loaded again from inside the entry point.
            drop(modules);
            let mut instance = instance;
            if let Err(e) = guard_hook(|| instance.on_unload(&context)) {
                warn!(unit = %id, error = %e, "Failed to deactivate duplicate module instance");
            }
            return Err(ModuleError::AlreadyLoaded { unit: id });
        }
        modules.push(ModuleRecord {
            id: id.clone(),
            manifest: manifest.clone(),
            context,
            instance: Arc::new(Mutex::new(instance)),
        });
        drop(modules);

        info!(unit = %id, module = %manifest, "Module loaded");
        Ok(())
    }

    /// Unloads `unit`: deactivates its entry point, then stops tracking it.
    ///
    /// # Errors
    ///
    /// - [`ModuleError::NotLoaded`] if the unit is not tracked.
    /// - [`ModuleError::UnloadInProgress`] if `unit` is already being
    ///   unloaded, e.g. from inside its own deactivation hook.
    /// - [`ModuleError::Deactivation`] if the hook fails or panics; the unit
    ///   stays tracked.
    pub fn unload(&self, unit: &UnitId) -> ModuleResult<()> {
        let (context, instance) = {
            let modules = self.modules.read();
            let record = modules
                .iter()
                .find(|r| &r.id == unit)
                .ok_or_else(|| ModuleError::NotLoaded { unit: unit.clone() })?;
            (record.context.clone(), Arc::clone(&record.instance))
        };

        let Some(mut module) = instance.try_lock() else {
            return Err(ModuleError::UnloadInProgress { unit: unit.clone() });
        };
        debug!(unit = %unit, "Deactivating module");
        let result = guard_hook(|| module.on_unload(&context));
        drop(module);
        result.map_err(|source| ModuleError::Deactivation {
            unit: unit.clone(),
            source,
        })?;

        self.modules
            .write()
            .retain(|r| !(&r.id == unit && Arc::ptr_eq(&r.instance, &instance)));
        info!(unit = %unit, "Module unloaded");
        Ok(())
    }

    /// Returns a snapshot of loaded units and their manifests.
    pub fn loaded_modules(&self) -> HashMap<UnitId, ModuleManifest> {
        self.modules
            .read()
            .iter()
            .map(|r| (r.id.clone(), r.manifest.clone()))
            .collect()
    }

    /// Returns loaded unit identities in load order.
    pub fn loaded_ids(&self) -> Vec<UnitId> {
        self.modules.read().iter().map(|r| r.id.clone()).collect()
    }

    /// Returns the manifest of a loaded unit.
    pub fn manifest(&self, unit: &UnitId) -> Option<ModuleManifest> {
        self.modules
            .read()
            .iter()
            .find(|r| &r.id == unit)
            .map(|r| r.manifest.clone())
    }

    /// Returns the number of loaded units.
    pub fn len(&self) -> usize {
        self.modules.read().len()
    }

    /// Returns `true` if no unit is loaded.
    pub fn is_empty(&self) -> bool {
        self.modules.read().is_empty()
    }

    /// Settings block for a module name, preferring an exact key and then
    /// an ASCII case-insensitive one (environment sources lowercase keys).
    fn settings_for(&self, name: &str) -> Value {
        self.settings
            .get(name)
            .or_else(|| {
                self.settings
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(_, value)| value)
            })
            .cloned()
            .unwrap_or(Value::Null)
    }
}

impl Service for ModuleManager {}

impl fmt::Debug for ModuleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleManager")
            .field("loaded", &self.loaded_ids())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BoxError, HookPanicked};
    use crate::service::{ServiceKey, ServiceState};
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default, Clone)]
    struct Counters {
        loads: Arc<AtomicUsize>,
        unloads: Arc<AtomicUsize>,
    }

    #[derive(Clone, Copy, Default)]
    enum Script {
        #[default]
        Clean,
        FailLoad,
        PanicLoad,
        FailUnload,
    }

    struct Scripted {
        counters: Counters,
        script: Script,
    }

    impl Module for Scripted {
        fn on_load(&mut self, _ctx: &ModuleContext) -> Result<(), BoxError> {
            self.counters.loads.fetch_add(1, Ordering::SeqCst);
            match self.script {
                Script::FailLoad => Err("missing dependency".into()),
                Script::PanicLoad => panic!("corrupt module"),
                _ => Ok(()),
            }
        }

        fn on_unload(&mut self, _ctx: &ModuleContext) -> Result<(), BoxError> {
            self.counters.unloads.fetch_add(1, Ordering::SeqCst);
            match self.script {
                Script::FailUnload => Err("still busy".into()),
                _ => Ok(()),
            }
        }
    }

    fn unit(id: &'static str, counters: &Counters, script: Script) -> LoadableUnit {
        let counters = counters.clone();
        LoadableUnit::new(
            id,
            ModuleManifest::new(id, "1.0.0", "tests", None),
            move || {
                Box::new(Scripted {
                    counters: counters.clone(),
                    script,
                })
            },
        )
    }

    fn manager() -> ModuleManager {
        ModuleManager::new(Arc::new(ServiceRegistry::new()))
    }

    #[test]
    fn test_load_tracks_module() {
        let manager = manager();
        let counters = Counters::default();
        let unit = unit("audio", &counters, Script::Clean);

        manager.load(&unit).unwrap();
        assert!(manager.is_loaded(unit.id()));
        assert_eq!(manager.manifest(unit.id()).unwrap().name(), "audio");
        assert_eq!(counters.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_load_without_manifest_is_rejected() {
        let manager = manager();
        let unit = LoadableUnit::plain("helpers");

        let err = manager.load(&unit).unwrap_err();
        assert!(matches!(err, ModuleError::ManifestMissing { .. }));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_load_twice_never_duplicates() {
        let manager = manager();
        let counters = Counters::default();
        let unit = unit("audio", &counters, Script::Clean);

        manager.load(&unit).unwrap();
        let err = manager.load(&unit).unwrap_err();
        assert!(matches!(err, ModuleError::AlreadyLoaded { .. }));
        assert_eq!(manager.len(), 1);
        assert_eq!(counters.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_activation_failure_is_not_tracked() {
        let manager = manager();
        let counters = Counters::default();

        let err = manager
            .load(&unit("broken", &counters, Script::FailLoad))
            .unwrap_err();
        assert!(matches!(err, ModuleError::Activation { .. }));
        assert_eq!(err.unit().as_str(), "broken");

        let err = manager
            .load(&unit("cursed", &counters, Script::PanicLoad))
            .unwrap_err();
        let ModuleError::Activation { source, .. } = err else {
            panic!("expected an activation error");
        };
        assert!(source.downcast_ref::<HookPanicked>().is_some());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_unload_not_loaded_is_rejected() {
        let manager = manager();
        let counters = Counters::default();
        manager.load(&unit("audio", &counters, Script::Clean)).unwrap();

        let err = manager.unload(&UnitId::from("video")).unwrap_err();
        assert!(matches!(err, ModuleError::NotLoaded { .. }));
        assert_eq!(manager.loaded_ids(), vec![UnitId::from("audio")]);
    }

    #[test]
    fn test_unload_deactivates_and_allows_reload() {
        let manager = manager();
        let counters = Counters::default();
        let unit = unit("audio", &counters, Script::Clean);

        manager.load(&unit).unwrap();
        manager.unload(unit.id()).unwrap();
        assert!(!manager.is_loaded(unit.id()));
        assert_eq!(counters.unloads.load(Ordering::SeqCst), 1);

        manager.load(&unit).unwrap();
        assert_eq!(counters.loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_deactivation_failure_keeps_module_tracked() {
        let manager = manager();
        let counters = Counters::default();
        let unit = unit("sticky", &counters, Script::FailUnload);

        manager.load(&unit).unwrap();
        let err = manager.unload(unit.id()).unwrap_err();
        assert!(matches!(err, ModuleError::Deactivation { .. }));
        assert!(manager.is_loaded(unit.id()));
    }

    struct SelfUnloading {
        nested: Arc<Mutex<Option<ModuleResult<()>>>>,
    }

    impl Module for SelfUnloading {
        fn on_load(&mut self, _ctx: &ModuleContext) -> Result<(), BoxError> {
            Ok(())
        }

        fn on_unload(&mut self, ctx: &ModuleContext) -> Result<(), BoxError> {
            let manager = ctx.resolve::<ModuleManager>()?;
            *self.nested.lock() = Some(manager.unload(ctx.unit()));
            Ok(())
        }
    }

    #[test]
    fn test_unload_from_own_hook_is_rejected() {
        let registry = Arc::new(ServiceRegistry::new());
        let manager = Arc::new(ModuleManager::new(Arc::clone(&registry)));
        registry.register(Arc::clone(&manager)).unwrap();

        let nested = Arc::new(Mutex::new(None));
        let captured = Arc::clone(&nested);
        let unit = LoadableUnit::new(
            "recursive",
            ModuleManifest::new("recursive", "1.0.0", "tests", None),
            move || {
                Box::new(SelfUnloading {
                    nested: Arc::clone(&captured),
                })
            },
        );

        manager.load(&unit).unwrap();
        manager.unload(unit.id()).unwrap();

        let inner = nested.lock().take().unwrap();
        assert!(matches!(
            inner,
            Err(ModuleError::UnloadInProgress { ref unit }) if unit.as_str() == "recursive"
        ));
        assert!(!manager.is_loaded(unit.id()));
    }

    #[test]
    fn test_loaded_modules_is_a_snapshot() {
        let manager = manager();
        let counters = Counters::default();
        manager.load(&unit("first", &counters, Script::Clean)).unwrap();

        let snapshot = manager.loaded_modules();
        manager.load(&unit("second", &counters, Script::Clean)).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key(&UnitId::from("first")));
        assert_eq!(
            manager.loaded_ids(),
            vec![UnitId::from("first"), UnitId::from("second")]
        );
    }

    trait Tuner: Service {
        fn frequency(&self) -> u32;
    }

    struct FixedTuner(u32);
    impl Service for FixedTuner {}
    impl Tuner for FixedTuner {
        fn frequency(&self) -> u32 {
            self.0
        }
    }

    #[derive(Deserialize)]
    struct RadioSettings {
        frequency: u32,
    }

    #[derive(Default)]
    struct RadioModule;

    impl Module for RadioModule {
        fn on_load(&mut self, ctx: &ModuleContext) -> Result<(), BoxError> {
            let settings: RadioSettings = ctx.get_config()?;
            ctx.provide::<dyn Tuner>(Arc::new(FixedTuner(settings.frequency)))?;
            Ok(())
        }
    }

    #[test]
    fn test_module_provides_configured_service() {
        let registry = Arc::new(ServiceRegistry::new());
        let settings = HashMap::from([(
            "Radio".to_string(),
            serde_json::json!({ "frequency": 101 }),
        )]);
        let manager = ModuleManager::with_settings(Arc::clone(&registry), settings);
        let unit = LoadableUnit::of::<RadioModule>(
            "radio",
            ModuleManifest::new("Radio", "2.0.0", "tests", None),
        );

        manager.load(&unit).unwrap();
        assert_eq!(registry.resolve::<dyn Tuner>().unwrap().frequency(), 101);
        assert_eq!(
            registry.state(ServiceKey::of::<dyn Tuner>()).unwrap(),
            ServiceState::Running
        );
    }

    #[test]
    fn test_settings_key_matches_name_case_insensitively() {
        let registry = Arc::new(ServiceRegistry::new());
        let settings = HashMap::from([(
            "radio".to_string(),
            serde_json::json!({ "frequency": 88 }),
        )]);
        let manager = ModuleManager::with_settings(Arc::clone(&registry), settings);
        let unit = LoadableUnit::of::<RadioModule>(
            "radio",
            ModuleManifest::new("Radio", "2.0.0", "tests", None),
        );

        manager.load(&unit).unwrap();
        assert_eq!(registry.resolve::<dyn Tuner>().unwrap().frequency(), 88);
    }

    #[test]
    fn test_module_without_settings_fails_required_config() {
        let manager = manager();
        let unit = LoadableUnit::of::<RadioModule>(
            "radio",
            ModuleManifest::new("Radio", "2.0.0", "tests", None),
        );

        let err = manager.load(&unit).unwrap_err();
        assert!(matches!(err, ModuleError::Activation { .. }));
        assert!(!manager.is_loaded(unit.id()));
    }
}
