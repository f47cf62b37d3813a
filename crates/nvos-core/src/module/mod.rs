//! Pluggable modules.
//!
//! A [`LoadableUnit`] is an opaque handle supplied by the host.  Units that
//! carry a [`ModuleManifest`] can be handed to the [`ModuleManager`], which
//! instantiates the [`Module`] entry point, activates it with a
//! [`ModuleContext`], and tracks it until it is unloaded.
//!
//! Module crates declare themselves statically with [`define_module!`];
//! [`discover`] collects every linked declaration.
//!
//! [`define_module!`]: crate::define_module

pub mod context;
pub mod descriptor;
pub mod entry;
pub mod manager;
pub mod manifest;
pub mod unit;

pub use context::ModuleContext;
pub use descriptor::{MODULES, ModuleDescriptor, discover};
pub use entry::Module;
pub use manager::ModuleManager;
pub use manifest::ModuleManifest;
pub use unit::{LoadableUnit, ModuleFactory, UnitId};
