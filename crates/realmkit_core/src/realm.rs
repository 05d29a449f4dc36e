//! Realm handles.

use crate::config::Config;
use crate::error::{engine_failure, CoreError, CoreResult};
use crate::transaction::{TransactionKind, TransactionScope, TransactionState};
use parking_lot::Mutex;
use realmkit_engine::{Connection, Engine, VersionId};
use realmkit_schema::{ClassDescriptor, ClassKey, ClassRecord, PropertyRecord, Schema};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

struct Inner {
    connection: Box<dyn Connection>,
    state: TransactionState,
}

/// An open handle to a realm file.
///
/// Each handle tracks one [`TransactionState`]. Every transition runs under
/// the handle's lock, so concurrent callers never observe a half-finished
/// begin, commit or rollback. The lock does not serialize work done inside
/// an open transaction.
///
/// # Example
///
/// ```rust
/// use realmkit_core::{Config, MemoryEngine, Realm, TransactionState};
/// use std::sync::Arc;
///
/// let realm = Realm::open(Arc::new(MemoryEngine::new()), Config::new("demo.realm")).unwrap();
///
/// realm.begin_write().unwrap();
/// assert_eq!(realm.transaction_state(), TransactionState::Write);
/// assert!(realm.commit().unwrap());
///
/// // Committing again is a no-op, not an error.
/// assert!(!realm.commit().unwrap());
/// ```
pub struct Realm {
    engine: Arc<dyn Engine>,
    config: Config,
    inner: Mutex<Inner>,
}

impl Realm {
    /// Opens a realm.
    ///
    /// An in-memory configuration without a path gets a unique identifier.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the configuration does not validate, or the
    /// engine error if the engine refuses to open the file.
    pub fn open(engine: Arc<dyn Engine>, mut config: Config) -> CoreResult<Self> {
        config.validate()?;
        if config.in_memory && config.path.is_empty() {
            config.path = format!("memory-{}", uuid::Uuid::new_v4());
        }

        let connection = engine
            .open(&config.to_open_record())
            .ok_or_else(|| engine_failure(engine.as_ref(), "error opening realm"))?;

        debug!(
            target: "realmkit::realm",
            path = %config.path,
            mode = %config.schema_mode,
            "realm opened"
        );
        Ok(Self {
            engine,
            config,
            inner: Mutex::new(Inner {
                connection,
                state: TransactionState::None,
            }),
        })
    }

    /// Returns the configuration the realm was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the engine the realm was opened on.
    #[must_use]
    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    /// Whether the realm has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().connection.is_closed()
    }

    /// Whether write transactions are allowed.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.inner.lock().connection.is_writable()
    }

    /// Returns the current transaction state.
    #[must_use]
    pub fn transaction_state(&self) -> TransactionState {
        self.inner.lock().state
    }

    /// Starts a read transaction.
    ///
    /// # Errors
    ///
    /// - `TransactionAlreadyInProgress` if a transaction is active
    /// - `RealmClosed` if the realm is closed
    /// - the engine error if the engine call fails; the state stays `None`
    pub fn begin_read(&self) -> CoreResult<()> {
        self.begin(TransactionKind::Read)
    }

    /// Starts a write transaction.
    ///
    /// # Errors
    ///
    /// Same as [`Realm::begin_read`].
    pub fn begin_write(&self) -> CoreResult<()> {
        self.begin(TransactionKind::Write)
    }

    fn begin(&self, kind: TransactionKind) -> CoreResult<()> {
        let mut inner = self.inner.lock();
        if inner.state.is_active() {
            return Err(CoreError::TransactionAlreadyInProgress {
                current: inner.state,
            });
        }
        if inner.connection.is_closed() {
            return Err(CoreError::RealmClosed);
        }

        let (ok, fallback) = match kind {
            TransactionKind::Read => (
                inner.connection.begin_read(),
                "error beginning read transaction",
            ),
            TransactionKind::Write => (
                inner.connection.begin_write(),
                "error beginning write transaction",
            ),
        };
        if !ok {
            return Err(engine_failure(self.engine.as_ref(), fallback));
        }

        inner.state = kind.state();
        debug!(target: "realmkit::txn", path = %self.config.path, state = %inner.state, "transaction started");
        Ok(())
    }

    /// Commits the active transaction.
    ///
    /// Returns `Ok(false)` without calling the engine when no transaction is
    /// active, so committing twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns the engine error if the commit fails; the state is unchanged.
    pub fn commit(&self) -> CoreResult<bool> {
        self.end(true)
    }

    /// Rolls back the active transaction.
    ///
    /// Returns `Ok(false)` without calling the engine when no transaction is
    /// active.
    ///
    /// # Errors
    ///
    /// Returns the engine error if the rollback fails; the state is unchanged.
    pub fn rollback(&self) -> CoreResult<bool> {
        self.end(false)
    }

    fn end(&self, commit: bool) -> CoreResult<bool> {
        let mut inner = self.inner.lock();
        if !inner.state.is_active() {
            return Ok(false);
        }

        let (ok, fallback) = if commit {
            (inner.connection.commit(), "error committing current transaction")
        } else {
            (
                inner.connection.rollback(),
                "error rolling back current transaction",
            )
        };
        if !ok {
            return Err(engine_failure(self.engine.as_ref(), fallback));
        }

        let previous = std::mem::take(&mut inner.state);
        debug!(
            target: "realmkit::txn",
            path = %self.config.path,
            from = %previous,
            "{}",
            if commit { "transaction committed" } else { "transaction rolled back" }
        );
        Ok(true)
    }

    /// Runs `f` inside a transaction of the given kind.
    ///
    /// The transaction commits when `f` returns `Ok` and rolls back when it
    /// returns `Err` or panics. Calling [`TransactionScope::cancel`], or
    /// ending the transaction directly on the realm, inside `f` is allowed;
    /// the scope then has nothing left to do.
    ///
    /// # Errors
    ///
    /// Returns the error from `f`, or the begin or commit error converted
    /// into `E`. A failed commit is rolled back before the error returns, so
    /// the realm ends in `None` unless the rollback fails as well.
    pub fn transaction<F, T, E>(&self, kind: TransactionKind, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut TransactionScope<'_>) -> Result<T, E>,
        E: From<CoreError>,
    {
        self.begin(kind)?;
        let mut scope = TransactionScope::new(self, kind);
        match f(&mut scope) {
            Ok(value) => {
                scope.finish()?;
                Ok(value)
            }
            Err(e) => {
                scope.abandon();
                Err(e)
            }
        }
    }

    /// Runs `f` inside a read transaction. See [`Realm::transaction`].
    ///
    /// # Errors
    ///
    /// See [`Realm::transaction`].
    pub fn read<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut TransactionScope<'_>) -> Result<T, E>,
        E: From<CoreError>,
    {
        self.transaction(TransactionKind::Read, f)
    }

    /// Runs `f` inside a write transaction. See [`Realm::transaction`].
    ///
    /// # Errors
    ///
    /// See [`Realm::transaction`].
    pub fn write<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut TransactionScope<'_>) -> Result<T, E>,
        E: From<CoreError>,
    {
        self.transaction(TransactionKind::Write, f)
    }

    /// Advances the realm to the latest version.
    ///
    /// Returns whether the view moved.
    pub fn refresh(&self) -> CoreResult<bool> {
        let mut inner = self.inner.lock();
        inner
            .connection
            .refresh()
            .ok_or_else(|| engine_failure(self.engine.as_ref(), "error refreshing realm"))
    }

    /// Pins the realm to its current version.
    pub fn freeze(&self) -> CoreResult<bool> {
        let mut inner = self.inner.lock();
        inner
            .connection
            .freeze()
            .ok_or_else(|| engine_failure(self.engine.as_ref(), "error freezing realm"))
    }

    /// Reclaims unused space in the file.
    pub fn compact(&self) -> CoreResult<bool> {
        let mut inner = self.inner.lock();
        inner
            .connection
            .compact()
            .ok_or_else(|| engine_failure(self.engine.as_ref(), "error compacting realm"))
    }

    /// Returns the number of versions currently pinned in the file.
    pub fn num_versions(&self) -> CoreResult<u64> {
        self.inner.lock().connection.num_versions().ok_or_else(|| {
            engine_failure(self.engine.as_ref(), "error requesting number of versions")
        })
    }

    /// Returns the snapshot of the active transaction, if any.
    pub fn transaction_version(&self) -> CoreResult<Option<VersionId>> {
        self.inner.lock().connection.version_id().ok_or_else(|| {
            engine_failure(
                self.engine.as_ref(),
                "error requesting current transaction version",
            )
        })
    }

    /// Returns the schema version stored in the file.
    #[must_use]
    pub fn schema_version(&self) -> u64 {
        self.inner.lock().connection.schema_version()
    }

    /// Returns the number of classes in the file.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.inner.lock().connection.num_classes()
    }

    /// Returns the keys of every class in the file.
    pub fn class_keys(&self) -> CoreResult<Vec<ClassKey>> {
        self.inner
            .lock()
            .connection
            .class_keys()
            .ok_or_else(|| engine_failure(self.engine.as_ref(), "error requesting class keys"))
    }

    /// Returns the metadata record of one class.
    pub fn class_info(&self, key: ClassKey) -> CoreResult<ClassRecord> {
        self.inner
            .lock()
            .connection
            .class_info(key)
            .ok_or_else(|| engine_failure(self.engine.as_ref(), "error requesting class"))
    }

    /// Returns the property records of one class.
    pub fn class_properties(&self, key: ClassKey) -> CoreResult<Vec<PropertyRecord>> {
        self.inner.lock().connection.class_properties(key).ok_or_else(|| {
            engine_failure(self.engine.as_ref(), "error requesting class properties")
        })
    }

    /// Reads the full schema back from the engine.
    ///
    /// The returned descriptors carry the engine-assigned keys.
    pub fn schema(&self) -> CoreResult<Schema> {
        let mut classes = Vec::new();
        for key in self.class_keys()? {
            let info = self.class_info(key)?;
            let properties = self.class_properties(key)?;
            classes.push(ClassDescriptor::from_records(&info, &properties)?);
        }
        Ok(Schema::new(classes)?)
    }

    /// Deletes the realm's files. The realm must be closed.
    ///
    /// Returns whether anything was deleted.
    pub fn delete_files(&self) -> CoreResult<bool> {
        self.engine
            .delete_files(&self.config.path)
            .ok_or_else(|| engine_failure(self.engine.as_ref(), "error deleting realm files"))
    }

    /// Closes the realm. Closing twice succeeds.
    ///
    /// An active transaction is discarded by the engine.
    pub fn close(&self) -> CoreResult<()> {
        let mut inner = self.inner.lock();
        if inner.connection.is_closed() {
            return Ok(());
        }
        if !inner.connection.close() {
            return Err(engine_failure(self.engine.as_ref(), "error closing realm"));
        }
        inner.state = TransactionState::None;
        debug!(target: "realmkit::realm", path = %self.config.path, "realm closed");
        Ok(())
    }

    /// Renders a multi-line status report, each line prefixed with `prefix`.
    #[must_use]
    pub fn info(&self, prefix: &str) -> String {
        let mut states = vec![if self.is_closed() { "Closed" } else { "Open" }];
        if self.is_writable() {
            states.push("Writable");
        }
        if self.config.is_encrypted() {
            states.push("Encrypted");
        }
        let num_versions = self
            .num_versions()
            .map_or_else(|_| "?".to_string(), |n| n.to_string());
        let version = match self.transaction_version() {
            Ok(Some(id)) => id.to_string(),
            Ok(None) => "none".to_string(),
            Err(_) => "?".to_string(),
        };
        let keys = self
            .class_keys()
            .map(|keys| keys.iter().map(|k| k.as_u32().to_string()).collect::<Vec<_>>())
            .unwrap_or_default();

        format!(
            "{prefix}Realm Information\n\
             {prefix}- Path: {path}\n\
             {prefix}- State: {states}\n\
             {prefix}- Schema version: {schema_version} (num: {num_versions})\n\
             {prefix}- Current transaction: {state}\n\
             {prefix}- Transaction version ID: {version}\n\
             {prefix}- Number of classes: {num_classes} [{keys}]\n",
            path = self.config.path,
            states = states.join(", "),
            schema_version = self.schema_version(),
            state = self.transaction_state(),
            num_classes = self.num_classes(),
            keys = keys.join(", "),
        )
    }
}

impl fmt::Display for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = Path::new(&self.config.path)
            .file_name()
            .map_or_else(|| self.config.path.clone(), |n| n.to_string_lossy().into_owned());
        write!(f, "Realm: '{name}'")?;
        if self.config.is_encrypted() {
            f.write_str(" (encrypted)")?;
        }
        if self.is_closed() {
            f.write_str(" - closed")
        } else {
            write!(f, " - num classes: {}", self.num_classes())
        }
    }
}

impl fmt::Debug for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Realm")
            .field("path", &self.config.path)
            .field("state", &self.transaction_state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use realmkit_engine::{EngineCall, EngineError, ErrorCode, MemoryEngine};
    use realmkit_schema::Property;

    fn open(engine: &MemoryEngine, path: &str) -> Realm {
        Realm::open(Arc::new(engine.clone()), Config::new(path)).unwrap()
    }

    fn engine_code(err: &CoreError) -> Option<ErrorCode> {
        err.as_engine().map(EngineError::code)
    }

    #[test]
    fn begin_write_then_commit() {
        let engine = MemoryEngine::new();
        let realm = open(&engine, "a.realm");

        assert_eq!(realm.transaction_state(), TransactionState::None);
        realm.begin_write().unwrap();
        assert_eq!(realm.transaction_state(), TransactionState::Write);
        assert!(realm.commit().unwrap());
        assert_eq!(realm.transaction_state(), TransactionState::None);
    }

    #[test]
    fn second_begin_is_rejected() {
        let engine = MemoryEngine::new();
        let realm = open(&engine, "a.realm");

        realm.begin_write().unwrap();
        let err = realm.begin_write().unwrap_err();
        assert_eq!(
            err,
            CoreError::TransactionAlreadyInProgress {
                current: TransactionState::Write
            }
        );
        assert!(matches!(
            realm.begin_read(),
            Err(CoreError::TransactionAlreadyInProgress { .. })
        ));
        assert_eq!(engine.count(EngineCall::BeginWrite), 1);
        assert_eq!(engine.count(EngineCall::BeginRead), 0);
    }

    #[test]
    fn commit_then_begin_read() {
        let engine = MemoryEngine::new();
        let realm = open(&engine, "a.realm");

        realm.begin_write().unwrap();
        realm.commit().unwrap();
        realm.begin_read().unwrap();
        assert_eq!(realm.transaction_state(), TransactionState::Read);
        assert!(realm.rollback().unwrap());
    }

    #[test]
    fn end_without_transaction_is_noop() {
        let engine = MemoryEngine::new();
        let realm = open(&engine, "a.realm");

        assert!(!realm.commit().unwrap());
        assert!(!realm.rollback().unwrap());
        assert_eq!(engine.count(EngineCall::Commit), 0);
        assert_eq!(engine.count(EngineCall::Rollback), 0);
    }

    #[test]
    fn failed_begin_leaves_state_none() {
        let engine = MemoryEngine::new();
        let realm = open(&engine, "a.realm");
        engine.fail_next(
            EngineCall::BeginWrite,
            EngineError::new(ErrorCode::OutOfDiskSpace, "disk full"),
        );

        let err = realm.begin_write().unwrap_err();
        assert_eq!(engine_code(&err), Some(ErrorCode::OutOfDiskSpace));
        assert_eq!(realm.transaction_state(), TransactionState::None);
        realm.begin_write().unwrap();
    }

    #[test]
    fn failed_commit_keeps_state() {
        let engine = MemoryEngine::new();
        let realm = open(&engine, "a.realm");
        realm.begin_write().unwrap();
        engine.fail_next_silently(EngineCall::Commit);

        let err = realm.commit().unwrap_err();
        assert_eq!(engine_code(&err), Some(ErrorCode::Unknown));
        assert_eq!(realm.transaction_state(), TransactionState::Write);
        assert!(realm.commit().unwrap());
    }

    #[test]
    fn closed_realm_rejects_begin() {
        let engine = MemoryEngine::new();
        let realm = open(&engine, "a.realm");
        realm.close().unwrap();
        realm.close().unwrap();

        assert!(realm.is_closed());
        assert_eq!(realm.begin_read(), Err(CoreError::RealmClosed));
    }

    #[test]
    fn close_discards_active_transaction() {
        let engine = MemoryEngine::new();
        let realm = open(&engine, "a.realm");
        realm.begin_write().unwrap();
        realm.close().unwrap();
        assert_eq!(realm.transaction_state(), TransactionState::None);
    }

    #[test]
    fn invalid_config_is_rejected_before_engine() {
        let engine = MemoryEngine::new();
        let err = Realm::open(Arc::new(engine.clone()), Config::default()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig { .. }));
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn anonymous_in_memory_realm_gets_identifier() {
        let engine = MemoryEngine::new();
        let realm =
            Realm::open(Arc::new(engine.clone()), Config::default().in_memory(true)).unwrap();
        assert!(realm.config().path.starts_with("memory-"));
        assert!(engine.contains(&realm.config().path));
    }

    #[test]
    fn open_failure_reports_engine_error() {
        let engine = MemoryEngine::new();
        let err = Realm::open(
            Arc::new(engine.clone()),
            Config::new("missing.realm").read_only(true),
        )
        .unwrap_err();
        assert_eq!(engine_code(&err), Some(ErrorCode::FileAccess));
    }

    #[test]
    fn write_scope_commits_on_ok() {
        let engine = MemoryEngine::new();
        let realm = open(&engine, "a.realm");

        let value: CoreResult<i32> = realm.write(|scope| {
            assert_eq!(scope.kind(), TransactionKind::Write);
            assert_eq!(scope.realm().transaction_state(), TransactionState::Write);
            Ok(7)
        });
        assert_eq!(value, Ok(7));
        assert_eq!(realm.transaction_state(), TransactionState::None);
        assert_eq!(engine.count(EngineCall::Commit), 1);
    }

    #[test]
    fn scope_after_direct_commit_is_noop() {
        let engine = MemoryEngine::new();
        let realm = open(&engine, "a.realm");

        realm
            .write(|scope| {
                scope.realm().commit()?;
                Ok::<_, CoreError>(())
            })
            .unwrap();
        assert_eq!(engine.count(EngineCall::Commit), 1);
        assert_eq!(engine.count(EngineCall::Rollback), 0);
    }

    #[test]
    fn scope_cancel_rolls_back_once() {
        let engine = MemoryEngine::new();
        let realm = open(&engine, "a.realm");

        realm
            .read(|scope| {
                assert!(scope.cancel()?);
                assert!(!scope.cancel()?);
                assert!(scope.is_resolved());
                Ok::<_, CoreError>(())
            })
            .unwrap();
        assert_eq!(engine.count(EngineCall::Rollback), 1);
        assert_eq!(engine.count(EngineCall::Commit), 0);
    }

    #[test]
    fn scope_begin_failure_skips_closure() {
        let engine = MemoryEngine::new();
        let realm = open(&engine, "a.realm");
        realm.begin_read().unwrap();

        let mut ran = false;
        let result: CoreResult<()> = realm.write(|_| {
            ran = true;
            Ok(())
        });
        assert!(matches!(
            result,
            Err(CoreError::TransactionAlreadyInProgress { .. })
        ));
        assert!(!ran);
        assert_eq!(realm.transaction_state(), TransactionState::Read);
    }

    #[test]
    fn schema_round_trips_through_engine() {
        let person = ClassDescriptor::builder("Person")
            .property("id", Property::int().primary_key())
            .property("tags", Property::string().list())
            .build()
            .unwrap();
        let declared = Schema::new([person]).unwrap();
        let engine = MemoryEngine::new();
        let realm = Realm::open(
            Arc::new(engine),
            Config::new("s.realm").schema(declared.clone()),
        )
        .unwrap();

        let schema = realm.schema().unwrap();
        assert_eq!(schema.len(), 1);
        let class = schema.class("Person").unwrap();
        assert!(class.key().is_some());
        assert_eq!(class.property_names(), vec!["id", "tags"]);
        assert_eq!(
            class.property("tags").unwrap().describe(),
            declared.classes()[0].property("tags").unwrap().describe()
        );
    }

    #[test]
    fn display_and_info() {
        let engine = MemoryEngine::new();
        let realm = open(&engine, "/data/app.realm");
        assert_eq!(realm.to_string(), "Realm: 'app.realm' - num classes: 0");

        let info = realm.info("");
        assert!(info.contains("- State: Open, Writable\n"));
        assert!(info.contains("- Current transaction: NONE\n"));

        realm.close().unwrap();
        assert_eq!(realm.to_string(), "Realm: 'app.realm' - closed");
    }
}
