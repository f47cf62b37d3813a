//! Static module declarations.
//!
//! Each module crate contributes one [`ModuleDescriptor`] to the [`MODULES`]
//! distributed slice, usually through [`define_module!`].  Linking the crate
//! into the host binary is all it takes for [`discover`] to see it.
//!
//! [`define_module!`]: crate::define_module

use linkme::distributed_slice;

use super::entry::Module;
use super::manifest::ModuleManifest;
use super::unit::LoadableUnit;

/// A statically declared module: identity, manifest and constructor.
pub struct ModuleDescriptor {
    /// Unit identity, unique across the binary.
    pub unit: &'static str,
    pub manifest: ModuleManifest,
    /// Builds a fresh entry-point instance.
    pub create: fn() -> Box<dyn Module>,
}

impl ModuleDescriptor {
    pub const fn new(
        unit: &'static str,
        manifest: ModuleManifest,
        create: fn() -> Box<dyn Module>,
    ) -> Self {
        Self {
            unit,
            manifest,
            create,
        }
    }
}

/// Every module declared in the linked binary.
#[distributed_slice]
pub static MODULES: [ModuleDescriptor];

/// Returns a [`LoadableUnit`] for every linked module, ordered by identity.
pub fn discover() -> Vec<LoadableUnit> {
    let mut units: Vec<LoadableUnit> = MODULES.iter().map(LoadableUnit::from_descriptor).collect();
    units.sort_by(|a, b| a.id().cmp(b.id()));
    units
}

/// Declares a module and adds it to [`MODULES`].
///
/// The module type must implement [`Module`] and [`Default`].  The unit
/// identity is the declaring module path followed by the static's name.
///
/// ```rust,ignore
/// use nvos_core::prelude::*;
///
/// #[derive(Default)]
/// pub struct GreeterModule;
///
/// impl Module for GreeterModule {
///     fn on_load(&mut self, ctx: &ModuleContext) -> Result<(), BoxError> {
///         ctx.log().info("hello");
///         Ok(())
///     }
/// }
///
/// define_module! {
///     pub static GREETER: GreeterModule = {
///         name: "Greeter",
///         version: env!("CARGO_PKG_VERSION"),
///         author: "NVOS Contributors",
///         description: "Says hello",
///     };
/// }
/// ```
#[macro_export]
macro_rules! define_module {
    (
        $(#[$meta:meta])*
        $vis:vis static $ident:ident : $module:ty = {
            name: $name:expr,
            version: $version:expr,
            author: $author:expr
            $(, description: $description:expr)?
            $(,)?
        };
    ) => {
        $(#[$meta])*
        #[$crate::__private::linkme::distributed_slice($crate::module::MODULES)]
        #[linkme(crate = $crate::__private::linkme)]
        $vis static $ident: $crate::module::ModuleDescriptor = {
            fn create() -> ::std::boxed::Box<dyn $crate::module::Module> {
                ::std::boxed::Box::new(<$module as ::std::default::Default>::default())
            }
            $crate::module::ModuleDescriptor::new(
                ::core::concat!(::core::module_path!(), "::", ::core::stringify!($ident)),
                $crate::module::ModuleManifest::new(
                    $name,
                    $version,
                    $author,
                    $crate::__module_description!($($description)?),
                ),
                create,
            )
        };
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __module_description {
    () => {
        ::core::option::Option::None
    };
    ($description:expr) => {
        ::core::option::Option::Some($description)
    };
}
