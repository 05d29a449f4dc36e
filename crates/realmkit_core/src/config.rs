//! Realm configuration.

use crate::error::{CoreError, CoreResult};
use realmkit_engine::{EncryptionKey, OpenRecord, SchemaMode};
use realmkit_schema::Schema;
use std::fmt;

/// Configuration for opening a realm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Path of the realm file. For in-memory realms, an identifier.
    pub path: String,

    /// Key for an encrypted file.
    pub encryption_key: Option<EncryptionKey>,

    /// Version of the declared schema.
    pub schema_version: u64,

    /// How the declared schema is reconciled with the file.
    pub schema_mode: SchemaMode,

    /// Keep all data in memory.
    pub in_memory: bool,

    /// Refuse to upgrade files written by older engines.
    pub disable_format_upgrade: bool,

    /// Create the file with sync history.
    pub force_sync_history: bool,

    /// Deliver change notifications automatically.
    pub automatic_change_notifications: bool,

    /// Maximum number of pinned versions (0 = unbounded).
    pub max_number_of_active_versions: u64,

    /// Directory for the engine's named pipes.
    pub fifo_path: Option<String>,

    /// Share one engine handle per path.
    pub cached: bool,

    /// Classes to open the realm with.
    pub schema: Schema,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: String::new(),
            encryption_key: None,
            schema_version: 0,
            schema_mode: SchemaMode::Automatic,
            in_memory: false,
            disable_format_upgrade: false,
            force_sync_history: false,
            automatic_change_notifications: true,
            max_number_of_active_versions: 0,
            fifo_path: None,
            cached: true,
            schema: Schema::empty(),
        }
    }
}

impl Config {
    /// Creates a configuration for the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Creates a configuration for an in-memory realm named `identifier`.
    #[must_use]
    pub fn in_memory_named(identifier: impl Into<String>) -> Self {
        Self::new(identifier).in_memory(true)
    }

    /// Sets the file path.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the encryption key.
    #[must_use]
    pub fn encryption_key(mut self, key: EncryptionKey) -> Self {
        self.encryption_key = Some(key);
        self
    }

    /// Sets the encryption key from raw bytes. An empty slice clears it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKeySize` unless the slice is empty or exactly 64 bytes.
    pub fn encryption_key_bytes(mut self, bytes: &[u8]) -> CoreResult<Self> {
        self.encryption_key = if bytes.is_empty() {
            None
        } else {
            Some(EncryptionKey::from_bytes(bytes)?)
        };
        Ok(self)
    }

    /// Sets the schema version.
    #[must_use]
    pub fn schema_version(mut self, version: u64) -> Self {
        self.schema_version = version;
        self
    }

    /// Sets the schema mode.
    #[must_use]
    pub fn schema_mode(mut self, mode: SchemaMode) -> Self {
        self.schema_mode = mode;
        self
    }

    /// Selects [`SchemaMode::ReadOnly`] or [`SchemaMode::Automatic`].
    #[must_use]
    pub fn read_only(mut self, value: bool) -> Self {
        self.schema_mode = if value {
            SchemaMode::ReadOnly
        } else {
            SchemaMode::Automatic
        };
        self
    }

    /// Sets whether the realm lives in memory only.
    #[must_use]
    pub fn in_memory(mut self, value: bool) -> Self {
        self.in_memory = value;
        self
    }

    /// Sets whether file format upgrades are refused.
    #[must_use]
    pub fn disable_format_upgrade(mut self, value: bool) -> Self {
        self.disable_format_upgrade = value;
        self
    }

    /// Sets whether sync history is forced on.
    #[must_use]
    pub fn force_sync_history(mut self, value: bool) -> Self {
        self.force_sync_history = value;
        self
    }

    /// Sets whether change notifications are delivered automatically.
    #[must_use]
    pub fn automatic_change_notifications(mut self, value: bool) -> Self {
        self.automatic_change_notifications = value;
        self
    }

    /// Sets the maximum number of pinned versions.
    #[must_use]
    pub fn max_number_of_active_versions(mut self, count: u64) -> Self {
        self.max_number_of_active_versions = count;
        self
    }

    /// Sets the directory for named pipes.
    #[must_use]
    pub fn fifo_path(mut self, path: impl Into<String>) -> Self {
        self.fifo_path = Some(path.into());
        self
    }

    /// Sets whether the engine handle is cached per path.
    #[must_use]
    pub fn cached(mut self, value: bool) -> Self {
        self.cached = value;
        self
    }

    /// Sets the declared schema.
    #[must_use]
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Whether handles opened with this configuration are read-only.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.schema_mode.is_read_only()
    }

    /// Whether an encryption key is set.
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.encryption_key.is_some()
    }

    /// Checks that the configuration can be opened.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the path is empty for an on-disk realm or
    /// the fifo path is set but empty.
    pub fn validate(&self) -> CoreResult<()> {
        if self.path.is_empty() && !self.in_memory {
            return Err(CoreError::invalid_config("path cannot be empty"));
        }
        if self.fifo_path.as_deref() == Some("") {
            return Err(CoreError::invalid_config("fifo path cannot be empty"));
        }
        Ok(())
    }

    /// Flattens the configuration into the record the engine opens.
    #[must_use]
    pub fn to_open_record(&self) -> OpenRecord {
        OpenRecord {
            path: self.path.clone(),
            encryption_key: self.encryption_key.clone(),
            schema_version: self.schema_version,
            schema_mode: self.schema_mode,
            in_memory: self.in_memory,
            disable_format_upgrade: self.disable_format_upgrade,
            force_sync_history: self.force_sync_history,
            automatic_change_notifications: self.automatic_change_notifications,
            max_number_of_active_versions: self.max_number_of_active_versions,
            fifo_path: self.fifo_path.clone(),
            cached: self.cached,
            schema: self.schema.to_records(),
        }
    }

    /// Renders a multi-line summary, each line prefixed with `prefix`.
    #[must_use]
    pub fn info(&self, prefix: &str) -> String {
        let mut out = format!("{prefix}Realm Config\n");
        out.push_str(&format!("{prefix}- Path: {}\n", self.path));
        out.push_str(&format!(
            "{prefix}- Encrypted: {}\n",
            if self.is_encrypted() { "yes" } else { "no" }
        ));
        out.push_str(&format!(
            "{prefix}- Schema: version {}, mode {}, {} classes\n",
            self.schema_version,
            self.schema_mode,
            self.schema.len()
        ));
        out.push_str(&format!("{prefix}- In memory: {}\n", self.in_memory));
        out.push_str(&format!(
            "{prefix}- Disable format upgrade: {}\n",
            self.disable_format_upgrade
        ));
        out.push_str(&format!(
            "{prefix}- Force sync history: {}\n",
            self.force_sync_history
        ));
        out.push_str(&format!(
            "{prefix}- Automatic change notifications: {}\n",
            self.automatic_change_notifications
        ));
        out.push_str(&format!(
            "{prefix}- Max active versions: {}\n",
            self.max_number_of_active_versions
        ));
        out.push_str(&format!(
            "{prefix}- Fifo path: {}\n",
            self.fifo_path.as_deref().unwrap_or("")
        ));
        out.push_str(&format!("{prefix}- Cached: {}\n", self.cached));
        out
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Config: '{}'", self.path)?;
        if self.is_encrypted() {
            f.write_str(", encrypted")?;
        }
        Ok(())
    }
}
