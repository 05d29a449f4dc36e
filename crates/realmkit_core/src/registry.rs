//! Registry of realms opened on one engine.
//!
//! The registry exists for bulk operations (shutdown, refresh); it does not
//! coordinate access to the realms it tracks.

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::realm::Realm;
use parking_lot::Mutex;
use realmkit_engine::{Engine, LibraryVersion};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Default)]
struct RegistryState {
    realms: Vec<Arc<Realm>>,
    shut_down: bool,
}

/// Owns an engine and every realm opened through it.
///
/// Dropping the registry shuts it down.
///
/// # Example
///
/// ```rust
/// use realmkit_core::{Config, MemoryEngine, Registry};
/// use std::sync::Arc;
///
/// let registry = Registry::init(Arc::new(MemoryEngine::new()));
/// let realm = registry.open(Config::new("app.realm")).unwrap();
/// assert_eq!(registry.num_open_realms(), 1);
///
/// assert_eq!(registry.shutdown(), 1);
/// assert!(realm.is_closed());
/// ```
pub struct Registry {
    engine: Arc<dyn Engine>,
    state: Mutex<RegistryState>,
}

impl Registry {
    /// Creates a registry around an engine.
    #[must_use]
    pub fn init(engine: Arc<dyn Engine>) -> Self {
        info!(
            target: "realmkit::registry",
            version = %engine.library_version(),
            "engine initialized"
        );
        Self {
            engine,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Returns the engine.
    #[must_use]
    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    /// Returns the engine library version.
    #[must_use]
    pub fn engine_version(&self) -> LibraryVersion {
        self.engine.library_version()
    }

    /// Opens a realm and starts tracking it.
    ///
    /// # Errors
    ///
    /// Returns `RealmClosed` after [`Registry::shutdown`], otherwise any
    /// error from [`Realm::open`].
    pub fn open(&self, config: Config) -> CoreResult<Arc<Realm>> {
        let mut state = self.state.lock();
        if state.shut_down {
            return Err(CoreError::RealmClosed);
        }
        let realm = Arc::new(Realm::open(Arc::clone(&self.engine), config)?);
        state.realms.push(Arc::clone(&realm));
        Ok(realm)
    }

    /// Number of realms opened through the registry, closed ones included.
    #[must_use]
    pub fn num_realms(&self) -> usize {
        self.state.lock().realms.len()
    }

    /// Number of tracked realms that are still open.
    #[must_use]
    pub fn num_open_realms(&self) -> usize {
        self.open_realms().len()
    }

    /// Whether [`Registry::shutdown`] has run.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.state.lock().shut_down
    }

    fn open_realms(&self) -> Vec<Arc<Realm>> {
        self.state
            .lock()
            .realms
            .iter()
            .filter(|r| !r.is_closed())
            .cloned()
            .collect()
    }

    /// Refreshes every open realm.
    ///
    /// Returns how many realms moved to a newer version.
    ///
    /// # Errors
    ///
    /// Stops at the first realm whose refresh fails.
    pub fn refresh_all(&self) -> CoreResult<usize> {
        let mut moved = 0;
        for realm in self.open_realms() {
            if realm.refresh()? {
                moved += 1;
            }
        }
        Ok(moved)
    }

    /// Closes every open realm and refuses further opens.
    ///
    /// Returns how many realms were closed. A second call only closes realms
    /// whose close failed the first time.
    pub fn shutdown(&self) -> usize {
        self.state.lock().shut_down = true;

        let mut closed = 0;
        for realm in self.open_realms() {
            match realm.close() {
                Ok(()) => closed += 1,
                Err(e) => warn!(
                    target: "realmkit::registry",
                    path = %realm.config().path,
                    error = %e,
                    "failed to close realm during shutdown"
                ),
            }
        }
        if closed > 0 {
            info!(target: "realmkit::registry", closed, "registry shut down");
        }
        closed
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Registry")
            .field("realms", &state.realms.len())
            .field("shut_down", &state.shut_down)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use realmkit_engine::{EngineCall, EngineError, ErrorCode, MemoryEngine};

    fn registry() -> (MemoryEngine, Registry) {
        let engine = MemoryEngine::new();
        let registry = Registry::init(Arc::new(engine.clone()));
        (engine, registry)
    }

    #[test]
    fn tracks_opened_realms() {
        let (_, registry) = registry();
        let a = registry.open(Config::new("a.realm")).unwrap();
        registry.open(Config::new("b.realm")).unwrap();
        assert_eq!(registry.num_realms(), 2);
        assert_eq!(registry.num_open_realms(), 2);

        a.close().unwrap();
        assert_eq!(registry.num_realms(), 2);
        assert_eq!(registry.num_open_realms(), 1);
    }

    #[test]
    fn failed_open_is_not_tracked() {
        let (_, registry) = registry();
        assert!(registry.open(Config::new("")).is_err());
        assert_eq!(registry.num_realms(), 0);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let (engine, registry) = registry();
        registry.open(Config::new("a.realm")).unwrap();
        registry.open(Config::new("b.realm")).unwrap();

        assert_eq!(registry.shutdown(), 2);
        assert_eq!(registry.shutdown(), 0);
        assert_eq!(registry.num_open_realms(), 0);
        assert_eq!(engine.count(EngineCall::Close), 2);
    }

    #[test]
    fn open_after_shutdown_fails() {
        let (_, registry) = registry();
        registry.shutdown();
        assert!(registry.is_shut_down());
        assert_eq!(
            registry.open(Config::new("a.realm")).unwrap_err(),
            CoreError::RealmClosed
        );
    }

    #[test]
    fn shutdown_counts_only_successful_closes() {
        let (engine, registry) = registry();
        registry.open(Config::new("a.realm")).unwrap();
        registry.open(Config::new("b.realm")).unwrap();
        engine.fail_next(
            EngineCall::Close,
            EngineError::new(ErrorCode::FileAccess, "busy"),
        );

        assert_eq!(registry.shutdown(), 1);
        assert_eq!(registry.num_open_realms(), 1);
        assert_eq!(registry.shutdown(), 1);
    }

    #[test]
    fn refresh_all_counts_moved_realms() {
        let (_, registry) = registry();
        let reader = registry.open(Config::new("shared.realm")).unwrap();
        let writer = registry.open(Config::new("shared.realm")).unwrap();

        reader.begin_read().unwrap();
        writer.begin_write().unwrap();
        writer.commit().unwrap();

        assert_eq!(registry.refresh_all().unwrap(), 1);
        assert_eq!(registry.refresh_all().unwrap(), 0);
    }

    #[test]
    fn dropping_registry_closes_realms() {
        let (engine, registry) = registry();
        let realm = registry.open(Config::new("a.realm")).unwrap();
        drop(registry);
        assert!(realm.is_closed());
        assert_eq!(engine.num_open("a.realm"), 0);
    }

    #[test]
    fn engine_version_comes_from_engine() {
        let (engine, registry) = registry();
        assert_eq!(registry.engine_version(), engine.library_version());
    }
}
