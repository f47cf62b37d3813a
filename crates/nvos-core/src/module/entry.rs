use super::context::ModuleContext;
use crate::error::BoxError;

/// Entry point of a module.
///
/// The manager creates one instance per load, calls [`on_load`] once, and
/// calls [`on_unload`] when the module is unloaded.  Both run on the caller's
/// thread without any manager lock held.
///
/// [`on_load`]: Module::on_load
/// [`on_unload`]: Module::on_unload
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Default)]
/// struct AudioModule;
///
/// impl Module for AudioModule {
///     fn on_load(&mut self, ctx: &ModuleContext) -> Result<(), BoxError> {
///         ctx.provide::<dyn Mixer>(Arc::new(SoftwareMixer::default()))?;
///         Ok(())
///     }
/// }
/// ```
pub trait Module: Send + 'static {
    /// Activates the module. May register and start services through `ctx`.
    ///
    /// Returning an error aborts the load; the unit is not tracked.
    fn on_load(&mut self, ctx: &ModuleContext) -> Result<(), BoxError>;

    /// Deactivates the module.
    ///
    /// Must be safe to call even if the module registered no services.
    /// Returning an error keeps the module tracked as loaded.
    fn on_unload(&mut self, ctx: &ModuleContext) -> Result<(), BoxError> {
        let _ = ctx;
        Ok(())
    }
}
