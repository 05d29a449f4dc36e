//! # realmkit Core
//!
//! Realm handles for realmkit.
//!
//! This crate provides:
//! - [`Config`] for describing how a realm is opened
//! - [`Realm`], an open handle with its transaction state machine
//! - [`TransactionScope`] for closure-bound transactions
//! - [`Registry`] for tracking and bulk-closing realms
//!
//! Schema declarations come from `realmkit_schema` and the engine boundary
//! from `realmkit_engine`; the commonly used items of both are re-exported.
//!
//! ## Example
//!
//! ```rust
//! use realmkit_core::{ClassDescriptor, Config, CoreError, MemoryEngine, Property, Registry, Schema};
//! use std::sync::Arc;
//!
//! let person = ClassDescriptor::builder("Person")
//!     .property("id", Property::int().primary_key())
//!     .property("name", Property::string())
//!     .build()
//!     .unwrap();
//!
//! let registry = Registry::init(Arc::new(MemoryEngine::new()));
//! let realm = registry
//!     .open(Config::new("people.realm").schema(Schema::new([person]).unwrap()))
//!     .unwrap();
//!
//! realm
//!     .write(|_txn| Ok::<_, CoreError>(()))
//!     .unwrap();
//! assert_eq!(realm.num_classes(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod realm;
mod registry;
mod transaction;

pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use realm::Realm;
pub use registry::Registry;
pub use transaction::{TransactionKind, TransactionScope, TransactionState};

pub use realmkit_engine::{
    EncryptionKey, Engine, EngineError, ErrorCode, LibraryVersion, LogicErrorKind, MemoryEngine,
    SchemaMode, VersionId,
};
pub use realmkit_schema::{
    ClassDescriptor, ClassKey, Object, Property, PropertyDescriptor, PropertyKind, PropertyValue,
    Schema, SchemaError, Value,
};
