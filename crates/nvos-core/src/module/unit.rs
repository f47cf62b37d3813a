use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use super::descriptor::ModuleDescriptor;
use super::entry::Module;
use super::manifest::ModuleManifest;

/// Creates a fresh module instance for each load.
pub type ModuleFactory = Arc<dyn Fn() -> Box<dyn Module> + Send + Sync>;

// =============================================================================
// UnitId
// =============================================================================

/// Stable identity of a loadable unit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitId(Cow<'static, str>);

impl UnitId {
    pub fn new(id: impl Into<Cow<'static, str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for UnitId {
    fn from(id: &'static str) -> Self {
        Self(Cow::Borrowed(id))
    }
}

impl From<String> for UnitId {
    fn from(id: String) -> Self {
        Self(Cow::Owned(id))
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// LoadableUnit
// =============================================================================

#[derive(Clone)]
struct ModuleSource {
    manifest: ModuleManifest,
    factory: ModuleFactory,
}

/// A candidate unit supplied by the host.
///
/// Only units carrying a manifest (and therefore an entry point) can be loaded
/// by the [`ModuleManager`](super::ModuleManager).
#[derive(Clone)]
pub struct LoadableUnit {
    id: UnitId,
    module: Option<ModuleSource>,
}

impl LoadableUnit {
    /// Creates a module unit from a manifest and an instance factory.
    pub fn new<F>(id: impl Into<UnitId>, manifest: ModuleManifest, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Module> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            module: Some(ModuleSource {
                manifest,
                factory: Arc::new(factory),
            }),
        }
    }

    /// Creates a module unit whose instances are built with `M::default()`.
    pub fn of<M: Module + Default>(id: impl Into<UnitId>, manifest: ModuleManifest) -> Self {
        Self::new(id, manifest, || Box::new(M::default()))
    }

    /// Creates a unit that is not a module.
    pub fn plain(id: impl Into<UnitId>) -> Self {
        Self {
            id: id.into(),
            module: None,
        }
    }

    /// Creates a unit from a statically declared descriptor.
    pub fn from_descriptor(descriptor: &'static ModuleDescriptor) -> Self {
        let create = descriptor.create;
        Self::new(descriptor.unit, descriptor.manifest.clone(), move || create())
    }

    pub fn id(&self) -> &UnitId {
        &self.id
    }

    /// Returns `true` if the unit carries a module manifest.
    pub fn has_manifest(&self) -> bool {
        self.module.is_some()
    }

    pub fn manifest(&self) -> Option<&ModuleManifest> {
        self.module.as_ref().map(|m| &m.manifest)
    }

    pub(crate) fn factory(&self) -> Option<&ModuleFactory> {
        self.module.as_ref().map(|m| &m.factory)
    }
}

impl fmt::Debug for LoadableUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadableUnit")
            .field("id", &self.id)
            .field("manifest", &self.manifest())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::module::ModuleContext;

    #[derive(Default)]
    struct Noop;

    impl Module for Noop {
        fn on_load(&mut self, _ctx: &ModuleContext) -> Result<(), BoxError> {
            Ok(())
        }
    }

    #[test]
    fn test_plain_unit_has_no_manifest() {
        let unit = LoadableUnit::plain("libstd_helpers");
        assert!(!unit.has_manifest());
        assert!(unit.manifest().is_none());
        assert!(unit.factory().is_none());
        assert_eq!(unit.id().as_str(), "libstd_helpers");
    }

    #[test]
    fn test_module_unit_exposes_manifest() {
        let manifest = ModuleManifest::new("Noop", "0.1.0", "tests", Some("does nothing"));
        let unit = LoadableUnit::of::<Noop>(String::from("noop"), manifest.clone());
        assert!(unit.has_manifest());
        assert_eq!(unit.manifest(), Some(&manifest));
        assert_eq!(unit.id(), &UnitId::from("noop"));
    }
}
