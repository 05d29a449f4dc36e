//! In-memory engine for testing.

use crate::engine::{
    Connection, EncryptionKey, Engine, LibraryVersion, OpenRecord, SchemaMode, VersionId,
};
use crate::error::{set_last_error, EngineError, EngineResult, ErrorCode};
use parking_lot::Mutex;
use realmkit_schema::{
    ClassKey, ClassRecord, ClassRecords, PropertyKey, PropertyKind, PropertyRecord,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// A fallible engine call, as recorded in the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineCall {
    /// [`Engine::open`]
    Open,
    /// [`Engine::delete_files`]
    DeleteFiles,
    /// [`Connection::close`]
    Close,
    /// [`Connection::begin_read`]
    BeginRead,
    /// [`Connection::begin_write`]
    BeginWrite,
    /// [`Connection::commit`]
    Commit,
    /// [`Connection::rollback`]
    Rollback,
    /// [`Connection::refresh`]
    Refresh,
    /// [`Connection::freeze`]
    Freeze,
    /// [`Connection::compact`]
    Compact,
    /// [`Connection::num_versions`]
    NumVersions,
    /// [`Connection::version_id`]
    VersionId,
    /// [`Connection::class_keys`]
    ClassKeys,
    /// [`Connection::class_info`]
    ClassInfo,
    /// [`Connection::class_properties`]
    ClassProperties,
}

impl EngineCall {
    /// Whether the call belongs to the transaction control surface.
    #[must_use]
    pub fn is_transaction_control(self) -> bool {
        matches!(
            self,
            EngineCall::BeginRead
                | EngineCall::BeginWrite
                | EngineCall::Commit
                | EngineCall::Rollback
                | EngineCall::Refresh
        )
    }
}

/// An in-memory storage engine.
///
/// Files live in a map keyed by path for the lifetime of the engine (or, for
/// in-memory opens, until the last handle closes). Clones share the same
/// state, so a test can keep one clone for inspection while handing another
/// to the code under test.
///
/// Besides behaving like an engine, it records every fallible call and can
/// be told to fail the next call of a given kind.
///
/// # Example
///
/// ```rust
/// use realmkit_engine::{Engine, EngineCall, MemoryEngine, OpenRecord};
///
/// let engine = MemoryEngine::new();
/// let record = OpenRecord { path: "test.realm".into(), ..OpenRecord::default() };
/// let mut conn = engine.open(&record).unwrap();
/// assert!(conn.begin_write());
/// assert!(conn.commit());
/// assert_eq!(
///     engine.calls(),
///     vec![EngineCall::Open, EngineCall::BeginWrite, EngineCall::Commit]
/// );
/// ```
#[derive(Debug, Clone)]
pub struct MemoryEngine {
    shared: Arc<Mutex<Shared>>,
    version: LibraryVersion,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    /// Creates an engine with no files.
    #[must_use]
    pub fn new() -> Self {
        Self::with_version(LibraryVersion {
            string: format!("realmkit-memory {}", env!("CARGO_PKG_VERSION")),
            major: env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0),
            minor: env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0),
            patch: env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or(0),
            extra: env!("CARGO_PKG_VERSION_PRE").to_string(),
        })
    }

    /// Creates an engine reporting the given library version.
    #[must_use]
    pub fn with_version(version: LibraryVersion) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared::default())),
            version,
        }
    }

    /// Returns every fallible call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<EngineCall> {
        self.shared.lock().calls.clone()
    }

    /// Returns how many times `call` was made.
    #[must_use]
    pub fn count(&self, call: EngineCall) -> usize {
        self.shared.lock().calls.iter().filter(|c| **c == call).count()
    }

    /// Forgets the recorded calls.
    pub fn clear_calls(&self) {
        self.shared.lock().calls.clear();
    }

    /// Makes the next `call` fail and report `error` through the last-error
    /// channel.
    pub fn fail_next(&self, call: EngineCall, error: EngineError) {
        self.shared.lock().faults.push(Fault {
            call,
            error: Some(error),
        });
    }

    /// Makes the next `call` fail without recording a last error.
    pub fn fail_next_silently(&self, call: EngineCall) {
        self.shared.lock().faults.push(Fault { call, error: None });
    }

    /// Whether a file exists at `path`.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.shared.lock().files.contains_key(path)
    }

    /// Number of open handles on `path`.
    #[must_use]
    pub fn num_open(&self, path: &str) -> usize {
        self.shared.lock().files.get(path).map_or(0, |f| f.open)
    }

    /// Latest committed version of `path`.
    #[must_use]
    pub fn file_version(&self, path: &str) -> Option<u64> {
        self.shared.lock().files.get(path).map(|f| f.version)
    }
}

impl Engine for MemoryEngine {
    fn open(&self, record: &OpenRecord) -> Option<Box<dyn Connection>> {
        let mut shared = self.shared.lock();
        let result = shared
            .admit(EngineCall::Open)
            .and_then(|()| shared.open_file(record).map_err(Some));
        report(result).map(|state| {
            Box::new(MemoryConnection {
                shared: Arc::clone(&self.shared),
                state,
            }) as Box<dyn Connection>
        })
    }

    fn delete_files(&self, path: &str) -> Option<bool> {
        let mut shared = self.shared.lock();
        let result = shared.admit(EngineCall::DeleteFiles).and_then(|()| {
            if shared.files.get(path).is_some_and(|f| f.open > 0) {
                return Err(Some(EngineError::new(
                    ErrorCode::DeleteOpenedRealm,
                    format!("cannot delete files of an open realm: '{path}' is still in use"),
                )));
            }
            Ok(shared.files.remove(path).is_some())
        });
        report(result)
    }

    fn library_version(&self) -> LibraryVersion {
        self.version.clone()
    }
}

/// A failure to report: `Some` goes to the last-error channel, `None` fails
/// silently.
type CallResult<T> = Result<T, Option<EngineError>>;

fn report<T>(result: CallResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(Some(error)) => {
            set_last_error(error);
            None
        }
        Err(None) => None,
    }
}

fn closed_error() -> EngineError {
    EngineError::new(
        ErrorCode::IllegalOperation,
        "cannot access realm that has been closed",
    )
}

#[derive(Debug)]
struct Fault {
    call: EngineCall,
    error: Option<EngineError>,
}

#[derive(Debug, Default)]
struct Shared {
    files: HashMap<String, StoredFile>,
    calls: Vec<EngineCall>,
    faults: Vec<Fault>,
    next_connection: u64,
}

impl Shared {
    /// Logs the call and fires a pending fault for it, if any.
    fn admit(&mut self, call: EngineCall) -> CallResult<()> {
        self.calls.push(call);
        match self.faults.iter().position(|f| f.call == call) {
            Some(pos) => Err(self.faults.remove(pos).error),
            None => Ok(()),
        }
    }

    fn file(&self, path: &str) -> EngineResult<&StoredFile> {
        self.files.get(path).ok_or_else(closed_error)
    }

    fn file_mut(&mut self, path: &str) -> EngineResult<&mut StoredFile> {
        self.files.get_mut(path).ok_or_else(closed_error)
    }

    fn open_file(&mut self, record: &OpenRecord) -> EngineResult<ConnState> {
        if record.path.is_empty() {
            return Err(EngineError::new(
                ErrorCode::InvalidPath,
                "path cannot be empty",
            ));
        }
        let read_only = record.schema_mode.is_read_only();

        match self.files.get_mut(&record.path) {
            None => {
                if read_only && !record.in_memory {
                    return Err(EngineError::new(
                        ErrorCode::FileAccess,
                        format!("no such file: '{}'", record.path),
                    ));
                }
                let mut file = StoredFile::new(record);
                file.replace_schema(&record.schema);
                self.files.insert(record.path.clone(), file);
            }
            Some(file) => {
                if file.encryption_key != record.encryption_key {
                    return Err(EngineError::new(
                        ErrorCode::FileAccess,
                        format!("unable to open '{}': invalid encryption key", record.path),
                    ));
                }
                file.reconcile(record)?;
            }
        }

        let file = self.file_mut(&record.path)?;
        file.open += 1;
        let snapshot = file.version;

        self.next_connection += 1;
        Ok(ConnState {
            id: self.next_connection,
            path: record.path.clone(),
            writable: !read_only,
            closed: false,
            frozen: false,
            transaction: None,
            snapshot,
        })
    }
}

#[derive(Debug)]
struct StoredFile {
    encryption_key: Option<EncryptionKey>,
    in_memory: bool,
    schema_version: u64,
    classes: Vec<ClassRecords>,
    next_class_key: u32,
    next_property_key: i64,
    version: u64,
    pins: HashMap<u64, u64>,
    open: usize,
}

impl StoredFile {
    fn new(record: &OpenRecord) -> Self {
        Self {
            encryption_key: record.encryption_key.clone(),
            in_memory: record.in_memory,
            schema_version: record.schema_version,
            classes: Vec::new(),
            next_class_key: 0,
            next_property_key: 0,
            version: 1,
            pins: HashMap::new(),
            open: 0,
        }
    }

    fn register_class(&mut self, (class, properties): &ClassRecords) -> ClassRecords {
        let class = ClassRecord {
            key: Some(ClassKey::new(self.next_class_key)),
            ..class.clone()
        };
        self.next_class_key += 1;
        let properties = properties
            .iter()
            .map(|p| self.register_property(p))
            .collect();
        (class, properties)
    }

    fn register_property(&mut self, property: &PropertyRecord) -> PropertyRecord {
        let key = PropertyKey::new(self.next_property_key);
        self.next_property_key += 1;
        PropertyRecord {
            key: Some(key),
            ..property.clone()
        }
    }

    fn replace_schema(&mut self, schema: &[ClassRecords]) {
        self.classes.clear();
        self.next_class_key = 0;
        self.next_property_key = 0;
        self.classes = schema.iter().map(|c| self.register_class(c)).collect();
    }

    fn add_missing(&mut self, schema: &[ClassRecords]) {
        for declared in schema {
            let existing = self.classes.iter().position(|(c, _)| c.name == declared.0.name);
            match existing {
                None => {
                    let class = self.register_class(declared);
                    self.classes.push(class);
                }
                Some(pos) => {
                    let missing: Vec<&PropertyRecord> = declared
                        .1
                        .iter()
                        .filter(|p| !self.classes[pos].1.iter().any(|q| q.name == p.name))
                        .collect();
                    let missing: Vec<PropertyRecord> = missing
                        .into_iter()
                        .map(|p| self.register_property(p))
                        .collect();
                    let (class, properties) = &mut self.classes[pos];
                    for property in missing {
                        if property.type_code == PropertyKind::LinkingObjects.code() {
                            class.num_computed_properties += 1;
                        } else {
                            class.num_properties += 1;
                        }
                        properties.push(property);
                    }
                }
            }
        }
    }

    fn matches(&self, schema: &[ClassRecords]) -> bool {
        strip_keys(&self.classes) == strip_keys(schema)
    }

    /// Applies the declared schema of a subsequent open.
    fn reconcile(&mut self, record: &OpenRecord) -> EngineResult<()> {
        if record.schema.is_empty() || self.matches(&record.schema) {
            self.schema_version = self.schema_version.max(record.schema_version);
            return Ok(());
        }
        if record.schema_version < self.schema_version {
            return Err(EngineError::new(
                ErrorCode::InvalidArgument,
                format!(
                    "provided schema version {} is less than last set version {}",
                    record.schema_version, self.schema_version
                ),
            ));
        }

        let bumped = record.schema_version > self.schema_version;
        match record.schema_mode {
            SchemaMode::ReadOnly | SchemaMode::Immutable => {
                return Err(EngineError::new(
                    ErrorCode::InvalidArgument,
                    format!(
                        "the declared schema differs from '{}' and cannot change in {} mode",
                        record.path, record.schema_mode
                    ),
                ));
            }
            SchemaMode::AdditiveDiscovered | SchemaMode::AdditiveExplicit => {
                self.add_missing(&record.schema);
            }
            SchemaMode::HardResetFile | SchemaMode::SoftResetFile => {
                self.replace_schema(&record.schema);
            }
            SchemaMode::Automatic | SchemaMode::Manual if bumped => {
                self.replace_schema(&record.schema);
            }
            SchemaMode::Automatic | SchemaMode::Manual => {
                return Err(EngineError::new(
                    ErrorCode::InvalidArgument,
                    "migration is required due to schema changes; bump the schema version",
                ));
            }
        }
        self.schema_version = record.schema_version;
        self.version += 1;
        Ok(())
    }

    fn num_versions(&self) -> u64 {
        self.pinned().len() as u64
    }

    fn pinned(&self) -> BTreeSet<u64> {
        let mut versions: BTreeSet<u64> = self.pins.values().copied().collect();
        versions.insert(self.version);
        versions
    }

    fn class(&self, key: ClassKey) -> EngineResult<&ClassRecords> {
        self.classes
            .iter()
            .find(|(c, _)| c.key == Some(key))
            .ok_or_else(|| {
                EngineError::new(ErrorCode::NoSuchTable, format!("no class with key {key}"))
            })
    }
}

fn strip_keys(classes: &[ClassRecords]) -> Vec<ClassRecords> {
    classes
        .iter()
        .map(|(class, properties)| {
            let class = ClassRecord {
                key: None,
                ..class.clone()
            };
            let properties = properties
                .iter()
                .map(|p| PropertyRecord {
                    key: None,
                    ..p.clone()
                })
                .collect();
            (class, properties)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transaction {
    Read,
    Write,
}

#[derive(Debug)]
struct ConnState {
    id: u64,
    path: String,
    writable: bool,
    closed: bool,
    frozen: bool,
    transaction: Option<Transaction>,
    snapshot: u64,
}

impl ConnState {
    fn ensure_open(&self) -> EngineResult<()> {
        if self.closed {
            Err(closed_error())
        } else {
            Ok(())
        }
    }
}

struct MemoryConnection {
    shared: Arc<Mutex<Shared>>,
    state: ConnState,
}

impl MemoryConnection {
    fn run<T>(
        &self,
        call: EngineCall,
        op: impl FnOnce(&mut Shared, &ConnState) -> EngineResult<T>,
    ) -> Option<T> {
        let mut shared = self.shared.lock();
        let result = shared.admit(call).and_then(|()| {
            self.state.ensure_open().map_err(Some)?;
            op(&mut *shared, &self.state).map_err(Some)
        });
        report(result)
    }

    fn run_mut<T>(
        &mut self,
        call: EngineCall,
        op: impl FnOnce(&mut Shared, &mut ConnState) -> EngineResult<T>,
    ) -> Option<T> {
        let mut shared = self.shared.lock();
        let state = &mut self.state;
        let result = shared.admit(call).and_then(|()| {
            state.ensure_open().map_err(Some)?;
            op(&mut *shared, state).map_err(Some)
        });
        report(result)
    }

    fn end_transaction(&mut self, call: EngineCall) -> bool {
        self.run_mut(call, |shared, state| {
            let file = shared.file_mut(&state.path)?;
            match state.transaction {
                None => {
                    return Err(EngineError::new(
                        ErrorCode::NotInATransaction,
                        "no transaction is in progress",
                    ))
                }
                Some(Transaction::Write) if call == EngineCall::Commit => {
                    file.version += 1;
                    state.snapshot = file.version;
                }
                Some(_) => {}
            }
            file.pins.remove(&state.id);
            state.transaction = None;
            Ok(())
        })
        .is_some()
    }
}

impl Connection for MemoryConnection {
    fn close(&mut self) -> bool {
        if self.state.closed {
            return true;
        }
        self.run_mut(EngineCall::Close, |shared, state| {
            let file = shared.file_mut(&state.path)?;
            file.pins.remove(&state.id);
            file.open = file.open.saturating_sub(1);
            if file.in_memory && file.open == 0 {
                shared.files.remove(&state.path);
            }
            state.transaction = None;
            state.closed = true;
            Ok(())
        })
        .is_some()
    }

    fn is_closed(&self) -> bool {
        self.state.closed
    }

    fn is_writable(&self) -> bool {
        !self.state.closed && self.state.writable && !self.state.frozen
    }

    fn begin_read(&mut self) -> bool {
        self.run_mut(EngineCall::BeginRead, |shared, state| {
            if state.transaction.is_some() {
                return Err(EngineError::new(
                    ErrorCode::IllegalOperation,
                    "a transaction is already in progress",
                ));
            }
            let file = shared.file_mut(&state.path)?;
            if !state.frozen {
                state.snapshot = file.version;
            }
            file.pins.insert(state.id, state.snapshot);
            state.transaction = Some(Transaction::Read);
            Ok(())
        })
        .is_some()
    }

    fn begin_write(&mut self) -> bool {
        self.run_mut(EngineCall::BeginWrite, |shared, state| {
            if !state.writable || state.frozen {
                return Err(EngineError::new(
                    ErrorCode::IllegalOperation,
                    "can't perform transactions on read-only or frozen realms",
                ));
            }
            if state.transaction.is_some() {
                return Err(EngineError::new(
                    ErrorCode::IllegalOperation,
                    "a transaction is already in progress",
                ));
            }
            let file = shared.file_mut(&state.path)?;
            state.snapshot = file.version;
            file.pins.insert(state.id, state.snapshot);
            state.transaction = Some(Transaction::Write);
            Ok(())
        })
        .is_some()
    }

    fn commit(&mut self) -> bool {
        self.end_transaction(EngineCall::Commit)
    }

    fn rollback(&mut self) -> bool {
        self.end_transaction(EngineCall::Rollback)
    }

    fn refresh(&mut self) -> Option<bool> {
        self.run_mut(EngineCall::Refresh, |shared, state| {
            if state.frozen || state.transaction == Some(Transaction::Write) {
                return Ok(false);
            }
            let file = shared.file_mut(&state.path)?;
            let moved = state.snapshot != file.version;
            state.snapshot = file.version;
            if state.transaction.is_some() {
                file.pins.insert(state.id, state.snapshot);
            }
            Ok(moved)
        })
    }

    fn freeze(&mut self) -> Option<bool> {
        self.run_mut(EngineCall::Freeze, |_, state| {
            if state.transaction == Some(Transaction::Write) {
                return Err(EngineError::new(
                    ErrorCode::IllegalOperation,
                    "cannot freeze a realm inside a write transaction",
                ));
            }
            state.frozen = true;
            Ok(true)
        })
    }

    fn compact(&mut self) -> Option<bool> {
        self.run_mut(EngineCall::Compact, |_, state| {
            if state.transaction.is_some() {
                return Err(EngineError::new(
                    ErrorCode::IllegalOperation,
                    "cannot compact a realm inside a transaction",
                ));
            }
            if !state.writable || state.frozen {
                return Err(EngineError::new(
                    ErrorCode::IllegalOperation,
                    "cannot compact a read-only realm",
                ));
            }
            Ok(true)
        })
    }

    fn schema_version(&self) -> u64 {
        self.shared
            .lock()
            .files
            .get(&self.state.path)
            .map_or(0, |f| f.schema_version)
    }

    fn num_versions(&self) -> Option<u64> {
        self.run(EngineCall::NumVersions, |shared, state| {
            Ok(shared.file(&state.path)?.num_versions())
        })
    }

    fn version_id(&self) -> Option<Option<VersionId>> {
        self.run(EngineCall::VersionId, |shared, state| {
            if state.transaction.is_none() {
                return Ok(None);
            }
            let file = shared.file(&state.path)?;
            let index = file.pinned().range(..state.snapshot).count() as u64;
            Ok(Some(VersionId {
                version: state.snapshot,
                index,
            }))
        })
    }

    fn num_classes(&self) -> usize {
        self.shared
            .lock()
            .files
            .get(&self.state.path)
            .map_or(0, |f| f.classes.len())
    }

    fn class_keys(&self) -> Option<Vec<ClassKey>> {
        self.run(EngineCall::ClassKeys, |shared, state| {
            Ok(shared
                .file(&state.path)?
                .classes
                .iter()
                .filter_map(|(c, _)| c.key)
                .collect())
        })
    }

    fn class_info(&self, key: ClassKey) -> Option<ClassRecord> {
        self.run(EngineCall::ClassInfo, |shared, state| {
            Ok(shared.file(&state.path)?.class(key)?.0.clone())
        })
    }

    fn class_properties(&self, key: ClassKey) -> Option<Vec<PropertyRecord>> {
        self.run(EngineCall::ClassProperties, |shared, state| {
            Ok(shared.file(&state.path)?.class(key)?.1.clone())
        })
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        if !self.state.closed {
            let mut shared = self.shared.lock();
            if let Some(file) = shared.files.get_mut(&self.state.path) {
                file.pins.remove(&self.state.id);
                file.open = file.open.saturating_sub(1);
                if file.in_memory && file.open == 0 {
                    shared.files.remove(&self.state.path);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::take_last_error;
    use realmkit_schema::{ClassDescriptor, Property};

    fn person_records() -> Vec<ClassRecords> {
        let person = ClassDescriptor::builder("Person")
            .property("id", Property::int().primary_key())
            .property("name", Property::string())
            .build()
            .unwrap();
        vec![person.to_records()]
    }

    fn record(path: &str) -> OpenRecord {
        OpenRecord {
            path: path.to_string(),
            schema: person_records(),
            ..OpenRecord::default()
        }
    }

    #[test]
    fn open_registers_schema_with_keys() {
        let engine = MemoryEngine::new();
        let conn = engine.open(&record("a.realm")).unwrap();

        let keys = conn.class_keys().unwrap();
        assert_eq!(keys, vec![ClassKey::new(0)]);
        let info = conn.class_info(keys[0]).unwrap();
        assert_eq!(info.name, "Person");
        assert_eq!(info.primary_key, "id");
        let props = conn.class_properties(keys[0]).unwrap();
        assert_eq!(props.len(), 2);
        assert!(props.iter().all(|p| p.key.is_some()));
        assert_eq!(conn.num_classes(), 1);
    }

    #[test]
    fn empty_path_is_rejected() {
        let engine = MemoryEngine::new();
        assert!(engine.open(&record("")).is_none());
        assert_eq!(take_last_error().map(|e| e.code()), Some(ErrorCode::InvalidPath));
    }

    #[test]
    fn read_only_open_of_missing_file_fails() {
        let engine = MemoryEngine::new();
        let rec = OpenRecord {
            schema_mode: SchemaMode::ReadOnly,
            ..record("missing.realm")
        };
        assert!(engine.open(&rec).is_none());
        assert_eq!(take_last_error().map(|e| e.code()), Some(ErrorCode::FileAccess));
    }

    #[test]
    fn write_commit_bumps_version() {
        let engine = MemoryEngine::new();
        let mut conn = engine.open(&record("v.realm")).unwrap();
        let before = engine.file_version("v.realm").unwrap();

        assert!(conn.begin_write());
        assert!(conn.version_id().unwrap().is_some());
        assert!(conn.commit());
        assert_eq!(engine.file_version("v.realm"), Some(before + 1));
        assert_eq!(conn.version_id().unwrap(), None);
    }

    #[test]
    fn commit_without_transaction_fails() {
        let engine = MemoryEngine::new();
        let mut conn = engine.open(&record("c.realm")).unwrap();
        assert!(!conn.commit());
        assert_eq!(
            take_last_error().map(|e| e.code()),
            Some(ErrorCode::NotInATransaction)
        );
    }

    #[test]
    fn rollback_keeps_version() {
        let engine = MemoryEngine::new();
        let mut conn = engine.open(&record("r.realm")).unwrap();
        let before = engine.file_version("r.realm");
        assert!(conn.begin_write());
        assert!(conn.rollback());
        assert_eq!(engine.file_version("r.realm"), before);
    }

    #[test]
    fn read_only_handles_cannot_write() {
        let engine = MemoryEngine::new();
        drop(engine.open(&record("ro.realm")).unwrap());

        let rec = OpenRecord {
            schema_mode: SchemaMode::ReadOnly,
            ..record("ro.realm")
        };
        let mut conn = engine.open(&rec).unwrap();
        assert!(!conn.is_writable());
        assert!(!conn.begin_write());
        assert_eq!(
            take_last_error().map(|e| e.code()),
            Some(ErrorCode::IllegalOperation)
        );
        assert!(conn.begin_read());
    }

    #[test]
    fn refresh_moves_to_latest_version() {
        let engine = MemoryEngine::new();
        let mut reader = engine.open(&record("shared.realm")).unwrap();
        let mut writer = engine.open(&record("shared.realm")).unwrap();

        assert!(reader.begin_read());
        assert!(writer.begin_write());
        assert!(writer.commit());
        assert_eq!(reader.num_versions(), Some(2));

        assert_eq!(reader.refresh(), Some(true));
        assert_eq!(reader.refresh(), Some(false));
        assert_eq!(reader.num_versions(), Some(1));
    }

    #[test]
    fn closed_connection_rejects_calls() {
        let engine = MemoryEngine::new();
        let mut conn = engine.open(&record("closed.realm")).unwrap();
        assert!(conn.close());
        assert!(conn.is_closed());
        assert!(conn.close());
        assert!(!conn.begin_read());
        assert_eq!(
            take_last_error().map(|e| e.code()),
            Some(ErrorCode::IllegalOperation)
        );
    }

    #[test]
    fn in_memory_file_disappears_after_last_close() {
        let engine = MemoryEngine::new();
        let rec = OpenRecord {
            in_memory: true,
            ..record("mem")
        };
        let mut conn = engine.open(&rec).unwrap();
        assert!(engine.contains("mem"));
        assert!(conn.close());
        assert!(!engine.contains("mem"));
    }

    #[test]
    fn delete_files_of_open_realm_fails() {
        let engine = MemoryEngine::new();
        let mut conn = engine.open(&record("d.realm")).unwrap();

        assert_eq!(engine.delete_files("d.realm"), None);
        assert_eq!(
            take_last_error().map(|e| e.code()),
            Some(ErrorCode::DeleteOpenedRealm)
        );

        assert!(conn.close());
        assert_eq!(engine.delete_files("d.realm"), Some(true));
        assert_eq!(engine.delete_files("d.realm"), Some(false));
    }

    #[test]
    fn schema_change_needs_version_bump() {
        let engine = MemoryEngine::new();
        drop(engine.open(&record("m.realm")).unwrap());

        let dog = ClassDescriptor::builder("Dog")
            .property("name", Property::string())
            .build()
            .unwrap();
        let mut changed = record("m.realm");
        changed.schema.push(dog.to_records());

        assert!(engine.open(&changed).is_none());
        assert_eq!(
            take_last_error().map(|e| e.code()),
            Some(ErrorCode::InvalidArgument)
        );

        changed.schema_version = 1;
        let conn = engine.open(&changed).unwrap();
        assert_eq!(conn.num_classes(), 2);
        assert_eq!(conn.schema_version(), 1);
    }

    #[test]
    fn additive_mode_only_adds() {
        let engine = MemoryEngine::new();
        drop(engine.open(&record("add.realm")).unwrap());

        let person = ClassDescriptor::builder("Person")
            .property("id", Property::int().primary_key())
            .property("email", Property::string().nullable())
            .build()
            .unwrap();
        let rec = OpenRecord {
            schema_mode: SchemaMode::AdditiveExplicit,
            schema: vec![person.to_records()],
            ..record("add.realm")
        };
        let conn = engine.open(&rec).unwrap();
        let key = conn.class_keys().unwrap()[0];
        let names: Vec<String> = conn
            .class_properties(key)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["id", "name", "email"]);
        assert_eq!(conn.class_info(key).unwrap().num_properties, 3);
    }

    #[test]
    fn wrong_encryption_key_is_rejected() {
        let engine = MemoryEngine::new();
        let key = EncryptionKey::from_bytes(&[1u8; 64]).unwrap();
        let rec = OpenRecord {
            encryption_key: Some(key),
            ..record("enc.realm")
        };
        drop(engine.open(&rec).unwrap());

        assert!(engine.open(&record("enc.realm")).is_none());
        assert_eq!(take_last_error().map(|e| e.code()), Some(ErrorCode::FileAccess));
        assert!(engine.open(&rec).is_some());
    }

    #[test]
    fn unknown_class_key_is_no_such_table() {
        let engine = MemoryEngine::new();
        let conn = engine.open(&record("t.realm")).unwrap();
        assert!(conn.class_info(ClassKey::new(42)).is_none());
        assert_eq!(take_last_error().map(|e| e.code()), Some(ErrorCode::NoSuchTable));
    }

    #[test]
    fn injected_fault_fires_once() {
        let engine = MemoryEngine::new();
        let mut conn = engine.open(&record("f.realm")).unwrap();
        engine.fail_next(
            EngineCall::BeginWrite,
            EngineError::new(ErrorCode::OutOfDiskSpace, "disk full"),
        );

        assert!(!conn.begin_write());
        let err = take_last_error().unwrap();
        assert_eq!(err.code(), ErrorCode::OutOfDiskSpace);
        assert_eq!(err.message(), "disk full");

        assert!(conn.begin_write());
        assert_eq!(engine.count(EngineCall::BeginWrite), 2);
    }

    #[test]
    fn silent_fault_leaves_channel_empty() {
        let engine = MemoryEngine::new();
        crate::error::clear_last_error();
        engine.fail_next_silently(EngineCall::Open);
        assert!(engine.open(&record("s.realm")).is_none());
        assert!(take_last_error().is_none());
    }

    #[test]
    fn dropping_a_connection_releases_the_file() {
        let engine = MemoryEngine::new();
        let conn = engine.open(&record("drop.realm")).unwrap();
        assert_eq!(engine.num_open("drop.realm"), 1);
        drop(conn);
        assert_eq!(engine.num_open("drop.realm"), 0);
        assert_eq!(engine.delete_files("drop.realm"), Some(true));
    }
}
