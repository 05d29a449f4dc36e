//! # realmkit Engine
//!
//! The boundary between realmkit and the storage engine it drives.
//!
//! The engine is an opaque collaborator reached through blocking calls that
//! report success or failure. The cause of a failure is read afterwards from
//! a per-thread last-error channel.
//!
//! This crate provides:
//! - [`Engine`] and [`Connection`], the call surface
//! - [`OpenRecord`], the flat configuration passed to [`Engine::open`]
//! - [`EngineError`] and the last-error channel
//! - [`MemoryEngine`], an in-memory engine with call recording and fault
//!   injection

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod engine;
mod error;
mod memory;

pub use engine::{
    Connection, EncryptionKey, Engine, LibraryVersion, OpenRecord, SchemaMode, VersionId,
    KEY_SIZE,
};
pub use error::{
    clear_last_error, peek_last_error, set_last_error, take_last_error, EngineError,
    EngineResult, ErrorCode, ErrorDetail, InvalidKeyLength, LogicErrorKind,
};
pub use memory::{EngineCall, MemoryEngine};
