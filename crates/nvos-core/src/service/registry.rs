//! The service registry.
//!
//! [`ServiceRegistry`] holds at most one entry per capability type.  Each
//! entry owns the singleton instance (as an `Arc<T>`) and its
//! [`ServiceState`].
//!
//! Lifecycle hooks run **without** the registry lock held, so a service may
//! resolve its collaborators from inside its own `start`/`stop`.  Mutations
//! are expected to come from one writer at a time; the lock only keeps each
//! individual operation consistent.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::{Service, ServiceKey, ServiceState};
use crate::error::{
    BoxError, ResolutionError, ResolutionResult, ServiceError, ServiceResult, guard_hook,
};

// =============================================================================
// Type-erased entries (internal)
// =============================================================================

trait ErasedService: Send + Sync {
    fn start(&self) -> Result<(), BoxError>;
    fn stop(&self) -> Result<(), BoxError>;
    fn release(&self) -> Result<(), BoxError>;
    fn as_any(&self) -> &dyn Any;
}

/// Keeps the `Arc<T>` exactly as registered so it can be handed back out
/// unchanged by [`ServiceRegistry::resolve`].
struct Typed<T: ?Sized>(Arc<T>);

impl<T: ?Sized + Service> ErasedService for Typed<T> {
    fn start(&self) -> Result<(), BoxError> {
        self.0.start()
    }

    fn stop(&self) -> Result<(), BoxError> {
        self.0.stop()
    }

    fn release(&self) -> Result<(), BoxError> {
        self.0.release()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct ServiceEntry {
    key: ServiceKey,
    instance: Arc<dyn ErasedService>,
    state: ServiceState,
}

fn find(entries: &[ServiceEntry], key: ServiceKey) -> Option<&ServiceEntry> {
    entries.iter().find(|e| e.key == key)
}

fn invalid(
    service: ServiceKey,
    state: Option<ServiceState>,
    operation: &'static str,
) -> ServiceError {
    ServiceError::InvalidState {
        service,
        state,
        operation,
    }
}

// =============================================================================
// ServiceRegistry
// =============================================================================

/// Registry of process-wide singleton services.
///
/// # Example
///
/// ```rust,ignore
/// let registry = ServiceRegistry::new();
/// registry.register::<dyn LogSink>(Arc::new(Logger::new()))?;
/// registry.start(ServiceKey::of::<dyn LogSink>())?;
///
/// let log: Arc<dyn LogSink> = registry.resolve()?;
/// log.info("ready");
/// ```
#[derive(Default)]
pub struct ServiceRegistry {
    /// Entries in registration order.
    entries: RwLock<Vec<ServiceEntry>>,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Mutations ───────────────────────────────────────────────────────────

    /// Registers `instance` as the singleton for capability type `T`.
    ///
    /// The entry starts in [`ServiceState::Registered`]; the instance is not
    /// started.
    ///
    /// # Errors
    ///
    /// [`ServiceError::DuplicateService`] if `T` already has an entry; the
    /// existing entry is left untouched.
    pub fn register<T: ?Sized + Service>(&self, instance: Arc<T>) -> ServiceResult<()> {
        let key = ServiceKey::of::<T>();
        let mut entries = self.entries.write();
        if find(&entries, key).is_some() {
            return Err(ServiceError::DuplicateService { service: key });
        }
        entries.push(ServiceEntry {
            key,
            instance: Arc::new(Typed(instance)),
            state: ServiceState::Registered,
        });
        info!(service = %key, "Service registered");
        Ok(())
    }

    /// Starts the service registered under `key`.
    ///
    /// Valid from `Registered` or `Stopped`.  Invokes the instance's
    /// [`Service::start`] hook, then transitions to `Running`.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::InvalidState`] if the service is already running or
    ///   not registered.
    /// - [`ServiceError::Startup`] if the hook fails; the state is unchanged so
    ///   the caller may retry or unregister.
    pub fn start(&self, key: ServiceKey) -> ServiceResult<()> {
        let instance = {
            let entries = self.entries.read();
            match find(&entries, key) {
                None => return Err(invalid(key, None, "start")),
                Some(entry) if entry.state == ServiceState::Running => {
                    return Err(invalid(key, Some(entry.state), "start"));
                }
                Some(entry) => Arc::clone(&entry.instance),
            }
        };

        debug!(service = %key, "Starting service");
        guard_hook(|| instance.start())
            .map_err(|source| ServiceError::Startup { service: key, source })?;

        self.transition(key, &instance, ServiceState::Running)?;
        info!(service = %key, "Service started");
        Ok(())
    }

    /// Stops the running service registered under `key`.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::InvalidState`] unless the service is `Running`.
    /// - [`ServiceError::Shutdown`] if the hook fails; the entry stays
    ///   `Running`.
    pub fn stop(&self, key: ServiceKey) -> ServiceResult<()> {
        let instance = {
            let entries = self.entries.read();
            match find(&entries, key) {
                Some(entry) if entry.state == ServiceState::Running => {
                    Arc::clone(&entry.instance)
                }
                other => return Err(invalid(key, other.map(|e| e.state), "stop")),
            }
        };

        debug!(service = %key, "Stopping service");
        guard_hook(|| instance.stop())
            .map_err(|source| ServiceError::Shutdown { service: key, source })?;

        self.transition(key, &instance, ServiceState::Stopped)?;
        info!(service = %key, "Service stopped");
        Ok(())
    }

    /// Removes the entry registered under `key`, in any state.
    ///
    /// Callers are expected to [`stop`](Self::stop) a running service first;
    /// removing one that is still running is allowed but logged.  After
    /// removal the instance's [`Service::release`] hook is invoked and the
    /// registry drops its reference.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::NotFound`] if nothing is registered under `key`.
    /// - [`ServiceError::Release`] if the release hook fails.  The entry is
    ///   removed regardless.
    pub fn unregister(&self, key: ServiceKey) -> ServiceResult<()> {
        let entry = {
            let mut entries = self.entries.write();
            let pos = entries
                .iter()
                .position(|e| e.key == key)
                .ok_or(ServiceError::NotFound { service: key })?;
            entries.remove(pos)
        };

        if entry.state == ServiceState::Running {
            warn!(service = %key, "Unregistering a service that is still running");
        }
        info!(service = %key, "Service unregistered");

        guard_hook(|| entry.instance.release())
            .map_err(|source| ServiceError::Release { service: key, source })
    }

    /// Commits a state transition after a hook ran outside the lock.
    fn transition(
        &self,
        key: ServiceKey,
        instance: &Arc<dyn ErasedService>,
        state: ServiceState,
    ) -> ServiceResult<()> {
        let mut entries = self.entries.write();
        match entries
            .iter_mut()
            .find(|e| e.key == key && Arc::ptr_eq(&e.instance, instance))
        {
            Some(entry) => {
                entry.state = state;
                Ok(())
            }
            None => {
                warn!(service = %key, "Service was unregistered while its lifecycle hook ran");
                Err(ServiceError::NotFound { service: key })
            }
        }
    }

    // ─── Queries ─────────────────────────────────────────────────────────────

    /// Resolves the instance registered for capability type `T`.
    ///
    /// # Errors
    ///
    /// [`ResolutionError::NotRegistered`] if `T` has no entry.
    pub fn resolve<T: ?Sized + 'static>(&self) -> ResolutionResult<Arc<T>> {
        let key = ServiceKey::of::<T>();
        let entries = self.entries.read();
        let entry = find(&entries, key).ok_or(ResolutionError::NotRegistered {
            service: key.name(),
        })?;
        entry
            .instance
            .as_any()
            .downcast_ref::<Typed<T>>()
            .map(|typed| Arc::clone(&typed.0))
            .ok_or(ResolutionError::TypeMismatch {
                service: key.name(),
            })
    }

    /// Returns the state of the service registered under `key`.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] if nothing is registered under `key`.
    pub fn state(&self, key: ServiceKey) -> ServiceResult<ServiceState> {
        find(&self.entries.read(), key)
            .map(|e| e.state)
            .ok_or(ServiceError::NotFound { service: key })
    }

    /// Returns `true` if a service is registered under `key`.
    pub fn contains(&self, key: ServiceKey) -> bool {
        find(&self.entries.read(), key).is_some()
    }

    /// Returns the registered capability keys, in registration order.
    pub fn registered(&self) -> Vec<ServiceKey> {
        self.entries.read().iter().map(|e| e.key).collect()
    }

    /// Returns every registered key with its state, in registration order.
    pub fn snapshot(&self) -> Vec<(ServiceKey, ServiceState)> {
        self.entries
            .read()
            .iter()
            .map(|e| (e.key, e.state))
            .collect()
    }

    /// Returns the number of registered services.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if no service is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.read();
        f.debug_map()
            .entries(entries.iter().map(|e| (e.key.name(), e.state)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HookPanicked;
    use std::sync::Weak;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct Recorder {
        starts: AtomicUsize,
        stops: AtomicUsize,
        releases: AtomicUsize,
        fail_start: AtomicBool,
        fail_stop: AtomicBool,
        fail_release: AtomicBool,
    }

    impl Service for Recorder {
        fn start(&self) -> Result<(), BoxError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if self.fail_start.load(Ordering::SeqCst) {
                return Err("start refused".into());
            }
            Ok(())
        }

        fn stop(&self) -> Result<(), BoxError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            if self.fail_stop.load(Ordering::SeqCst) {
                return Err("stop refused".into());
            }
            Ok(())
        }

        fn release(&self) -> Result<(), BoxError> {
            self.releases.fetch_add(1, Ordering::SeqCst);
            if self.fail_release.load(Ordering::SeqCst) {
                return Err("release refused".into());
            }
            Ok(())
        }
    }

    trait Greeter: Service {
        fn greet(&self) -> String;
    }

    struct English;

    impl Service for English {}

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    fn key() -> ServiceKey {
        ServiceKey::of::<Recorder>()
    }

    fn registry_with_recorder() -> (ServiceRegistry, Arc<Recorder>) {
        let registry = ServiceRegistry::new();
        let recorder = Arc::new(Recorder::default());
        registry.register(Arc::clone(&recorder)).unwrap();
        (registry, recorder)
    }

    #[test]
    fn test_register_then_resolve_returns_instance() {
        let (registry, recorder) = registry_with_recorder();

        let resolved: Arc<Recorder> = registry.resolve().unwrap();
        assert!(Arc::ptr_eq(&resolved, &recorder));
        assert_eq!(registry.state(key()).unwrap(), ServiceState::Registered);
        assert_eq!(recorder.starts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_resolve_trait_object_capability() {
        let registry = ServiceRegistry::new();
        registry.register::<dyn Greeter>(Arc::new(English)).unwrap();

        let greeter = registry.resolve::<dyn Greeter>().unwrap();
        assert_eq!(greeter.greet(), "hello");

        // The concrete type is a different capability.
        assert!(matches!(
            registry.resolve::<English>(),
            Err(ResolutionError::NotRegistered { .. })
        ));
    }

    #[test]
    fn test_duplicate_register_keeps_first() {
        let (registry, first) = registry_with_recorder();

        let err = registry.register(Arc::new(Recorder::default())).unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateService { .. }));

        let resolved: Arc<Recorder> = registry.resolve().unwrap();
        assert!(Arc::ptr_eq(&resolved, &first));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_start_while_running_is_rejected() {
        let (registry, recorder) = registry_with_recorder();

        registry.start(key()).unwrap();
        assert_eq!(registry.state(key()).unwrap(), ServiceState::Running);

        let err = registry.start(key()).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidState {
                state: Some(ServiceState::Running),
                ..
            }
        ));
        assert_eq!(registry.state(key()).unwrap(), ServiceState::Running);
        assert_eq!(recorder.starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_start_unregistered_is_invalid_state() {
        let registry = ServiceRegistry::new();
        let err = registry.start(key()).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState { state: None, .. }));
    }

    #[test]
    fn test_stop_only_from_running() {
        let (registry, recorder) = registry_with_recorder();

        let err = registry.stop(key()).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidState {
                state: Some(ServiceState::Registered),
                ..
            }
        ));

        registry.start(key()).unwrap();
        registry.stop(key()).unwrap();
        assert_eq!(registry.state(key()).unwrap(), ServiceState::Stopped);

        let err = registry.stop(key()).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidState {
                state: Some(ServiceState::Stopped),
                ..
            }
        ));
        assert_eq!(recorder.stops.load(Ordering::SeqCst), 1);

        // Stopped services may be started again.
        registry.start(key()).unwrap();
        assert_eq!(registry.state(key()).unwrap(), ServiceState::Running);
        assert_eq!(recorder.starts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_startup_failure_leaves_state_unchanged() {
        let (registry, recorder) = registry_with_recorder();
        recorder.fail_start.store(true, Ordering::SeqCst);

        let err = registry.start(key()).unwrap_err();
        assert!(matches!(err, ServiceError::Startup { .. }));
        assert_eq!(registry.state(key()).unwrap(), ServiceState::Registered);

        recorder.fail_start.store(false, Ordering::SeqCst);
        registry.start(key()).unwrap();
        assert_eq!(registry.state(key()).unwrap(), ServiceState::Running);
    }

    #[test]
    fn test_stop_failure_keeps_running() {
        let (registry, recorder) = registry_with_recorder();
        registry.start(key()).unwrap();
        recorder.fail_stop.store(true, Ordering::SeqCst);

        let err = registry.stop(key()).unwrap_err();
        assert!(matches!(err, ServiceError::Shutdown { .. }));
        assert_eq!(registry.state(key()).unwrap(), ServiceState::Running);
    }

    #[test]
    fn test_panicking_start_is_reported_as_startup_error() {
        struct Explosive;
        impl Service for Explosive {
            fn start(&self) -> Result<(), BoxError> {
                panic!("explosive start");
            }
        }

        let registry = ServiceRegistry::new();
        registry.register(Arc::new(Explosive)).unwrap();

        let err = registry.start(ServiceKey::of::<Explosive>()).unwrap_err();
        let ServiceError::Startup { source, .. } = err else {
            panic!("expected a startup error");
        };
        assert!(source.downcast_ref::<HookPanicked>().is_some());
        assert_eq!(
            registry.state(ServiceKey::of::<Explosive>()).unwrap(),
            ServiceState::Registered
        );
    }

    #[test]
    fn test_unregister_then_resolve_fails() {
        let (registry, recorder) = registry_with_recorder();

        registry.unregister(key()).unwrap();
        assert_eq!(recorder.releases.load(Ordering::SeqCst), 1);
        assert!(matches!(
            registry.resolve::<Recorder>(),
            Err(ResolutionError::NotRegistered { .. })
        ));
        assert!(matches!(
            registry.state(key()),
            Err(ServiceError::NotFound { .. })
        ));
        assert!(matches!(
            registry.unregister(key()),
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[test]
    fn test_unregister_running_service_is_allowed() {
        let (registry, recorder) = registry_with_recorder();
        registry.start(key()).unwrap();

        registry.unregister(key()).unwrap();
        assert!(registry.is_empty());
        assert_eq!(recorder.stops.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_release_failure_still_removes_entry() {
        let (registry, recorder) = registry_with_recorder();
        recorder.fail_release.store(true, Ordering::SeqCst);

        let err = registry.unregister(key()).unwrap_err();
        assert!(matches!(err, ServiceError::Release { .. }));
        assert!(!registry.contains(key()));
    }

    #[test]
    fn test_start_hook_may_resolve_other_services() {
        struct Dependent {
            registry: Weak<ServiceRegistry>,
            greeting: parking_lot::Mutex<Option<String>>,
        }

        impl Service for Dependent {
            fn start(&self) -> Result<(), BoxError> {
                let registry = self.registry.upgrade().ok_or("registry dropped")?;
                let greeter = registry.resolve::<dyn Greeter>()?;
                *self.greeting.lock() = Some(greeter.greet());
                Ok(())
            }
        }

        let registry = Arc::new(ServiceRegistry::new());
        registry.register::<dyn Greeter>(Arc::new(English)).unwrap();
        let dependent = Arc::new(Dependent {
            registry: Arc::downgrade(&registry),
            greeting: parking_lot::Mutex::new(None),
        });
        registry.register(Arc::clone(&dependent)).unwrap();

        registry.start(ServiceKey::of::<Dependent>()).unwrap();
        assert_eq!(dependent.greeting.lock().as_deref(), Some("hello"));
    }

    #[test]
    fn test_registered_keeps_registration_order() {
        let registry = ServiceRegistry::new();
        registry.register::<dyn Greeter>(Arc::new(English)).unwrap();
        registry.register(Arc::new(Recorder::default())).unwrap();
        registry.start(key()).unwrap();

        assert_eq!(
            registry.registered(),
            vec![ServiceKey::of::<dyn Greeter>(), key()]
        );
        assert_eq!(
            registry.snapshot(),
            vec![
                (ServiceKey::of::<dyn Greeter>(), ServiceState::Registered),
                (key(), ServiceState::Running),
            ]
        );
    }
}
