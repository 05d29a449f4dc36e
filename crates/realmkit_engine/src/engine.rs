//! The engine call boundary.

use crate::error::{clear_last_error, take_last_error, EngineError, InvalidKeyLength};
use realmkit_schema::{ClassKey, ClassRecord, ClassRecords, PropertyRecord};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of an engine encryption key in bytes.
pub const KEY_SIZE: usize = 64;

/// A 64-byte file encryption key.
///
/// The key is zeroized when dropped and never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Creates a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice is not exactly 64 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, InvalidKeyLength> {
        if bytes.len() != KEY_SIZE {
            return Err(InvalidKeyLength {
                expected: KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(Self { bytes: key })
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// How the engine reconciles the declared schema with the one on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(i32)]
pub enum SchemaMode {
    /// Migrate automatically when the schema version is bumped.
    #[default]
    Automatic = 0,
    /// The on-disk schema must not change.
    Immutable = 1,
    /// Open without write access.
    ReadOnly = 2,
    /// Delete the file on a schema mismatch that needs migration.
    SoftResetFile = 3,
    /// Always delete the file when the schema differs.
    HardResetFile = 4,
    /// Only add classes and properties; discovered additions.
    AdditiveDiscovered = 5,
    /// Only add classes and properties; explicit additions.
    AdditiveExplicit = 6,
    /// Schema changes are applied by the caller.
    Manual = 7,
}

impl SchemaMode {
    /// All modes in code order.
    pub const ALL: [SchemaMode; 8] = [
        SchemaMode::Automatic,
        SchemaMode::Immutable,
        SchemaMode::ReadOnly,
        SchemaMode::SoftResetFile,
        SchemaMode::HardResetFile,
        SchemaMode::AdditiveDiscovered,
        SchemaMode::AdditiveExplicit,
        SchemaMode::Manual,
    ];

    /// Returns the numeric code.
    #[must_use]
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Looks up a mode by numeric code.
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// Whether handles opened in this mode can never write.
    #[must_use]
    pub fn is_read_only(self) -> bool {
        matches!(self, SchemaMode::ReadOnly)
    }

    /// Whether the on-disk schema may only grow.
    #[must_use]
    pub fn is_additive(self) -> bool {
        matches!(
            self,
            SchemaMode::AdditiveDiscovered | SchemaMode::AdditiveExplicit
        )
    }
}

impl fmt::Display for SchemaMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchemaMode::Automatic => "automatic",
            SchemaMode::Immutable => "immutable",
            SchemaMode::ReadOnly => "read-only",
            SchemaMode::SoftResetFile => "soft reset file",
            SchemaMode::HardResetFile => "hard reset file",
            SchemaMode::AdditiveDiscovered => "additive (discovered)",
            SchemaMode::AdditiveExplicit => "additive (explicit)",
            SchemaMode::Manual => "manual",
        };
        f.write_str(name)
    }
}

/// Identifies the snapshot a transaction is reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionId {
    /// Monotonic version number.
    pub version: u64,
    /// Position of the snapshot in the engine's version list.
    pub index: u64,
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.version, self.index)
    }
}

/// Version information reported by the engine library.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LibraryVersion {
    /// Free-form version string.
    pub string: String,
    /// Major version.
    pub major: u32,
    /// Minor version.
    pub minor: u32,
    /// Patch version.
    pub patch: u32,
    /// Pre-release or build suffix.
    pub extra: String,
}

impl LibraryVersion {
    /// Whether any of the numeric parts are set.
    #[must_use]
    pub fn has_numbers(&self) -> bool {
        self.major != 0 || self.minor != 0 || self.patch != 0
    }
}

impl fmt::Display for LibraryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.string)?;
        if self.has_numbers() {
            write!(f, " ({}.{}.{}", self.major, self.minor, self.patch)?;
            if !self.extra.is_empty() {
                write!(f, "-{}", self.extra)?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

/// Everything the engine needs to open a file.
#[derive(Debug, Clone, Default)]
pub struct OpenRecord {
    /// File path, or an identifier for in-memory handles.
    pub path: String,
    /// Encryption key, if the file is encrypted.
    pub encryption_key: Option<EncryptionKey>,
    /// Version of the declared schema.
    pub schema_version: u64,
    /// Schema reconciliation mode.
    pub schema_mode: SchemaMode,
    /// Keep the data in memory only.
    pub in_memory: bool,
    /// Refuse to upgrade older file formats.
    pub disable_format_upgrade: bool,
    /// Create the file with sync history.
    pub force_sync_history: bool,
    /// Deliver change notifications automatically.
    pub automatic_change_notifications: bool,
    /// Upper bound on pinned versions. Zero means unbounded.
    pub max_number_of_active_versions: u64,
    /// Directory for named pipes.
    pub fifo_path: Option<String>,
    /// Share one underlying handle per path.
    pub cached: bool,
    /// The declared schema in marshaled form.
    pub schema: Vec<ClassRecords>,
}

/// A storage engine library.
///
/// Every fallible call reports only success or failure. After a failure the
/// caller reads [`Engine::last_error`] for the cause.
///
/// # Implementors
///
/// - [`super::MemoryEngine`] - in-memory engine for tests and ephemeral data
pub trait Engine: Send + Sync {
    /// Opens a file. Returns `None` on failure.
    fn open(&self, record: &OpenRecord) -> Option<Box<dyn Connection>>;

    /// Deletes the files backing `path`.
    ///
    /// Returns `Some(deleted)` on success, where `deleted` tells whether
    /// anything existed, and `None` on failure.
    fn delete_files(&self, path: &str) -> Option<bool>;

    /// Returns the library version.
    fn library_version(&self) -> LibraryVersion;

    /// Takes the last error recorded on this thread.
    fn last_error(&self) -> Option<EngineError> {
        take_last_error()
    }

    /// Discards the last error recorded on this thread.
    fn clear_last_error(&self) {
        clear_last_error();
    }
}

/// One open handle inside the engine.
///
/// Methods returning `bool` or `Option` signal failure with `false` or
/// `None`; the cause is then available from [`Engine::last_error`].
pub trait Connection: Send {
    /// Closes the handle. Closing twice succeeds.
    fn close(&mut self) -> bool;

    /// Whether the handle has been closed.
    fn is_closed(&self) -> bool;

    /// Whether write transactions are allowed.
    fn is_writable(&self) -> bool;

    /// Starts a read transaction.
    fn begin_read(&mut self) -> bool;

    /// Starts a write transaction.
    fn begin_write(&mut self) -> bool;

    /// Ends the current transaction, publishing any writes.
    fn commit(&mut self) -> bool;

    /// Ends the current transaction, discarding any writes.
    fn rollback(&mut self) -> bool;

    /// Advances to the latest version. `Some(true)` if the view moved.
    fn refresh(&mut self) -> Option<bool>;

    /// Pins the handle to its current version.
    fn freeze(&mut self) -> Option<bool>;

    /// Reclaims unused space in the file.
    fn compact(&mut self) -> Option<bool>;

    /// Returns the schema version stored in the file.
    fn schema_version(&self) -> u64;

    /// Returns how many versions are currently pinned.
    fn num_versions(&self) -> Option<u64>;

    /// Returns the snapshot of the active transaction, `Some(None)` if
    /// no transaction is active.
    fn version_id(&self) -> Option<Option<VersionId>>;

    /// Returns the number of classes in the file.
    fn num_classes(&self) -> usize;

    /// Returns the keys of all classes in the file.
    fn class_keys(&self) -> Option<Vec<ClassKey>>;

    /// Returns the metadata record of one class.
    fn class_info(&self, key: ClassKey) -> Option<ClassRecord>;

    /// Returns the property records of one class, in declaration order.
    fn class_properties(&self, key: ClassKey) -> Option<Vec<PropertyRecord>>;
}
