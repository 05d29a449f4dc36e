//! # realmkit Schema
//!
//! Typed object schemas for realmkit.
//!
//! This crate provides:
//! - The property type system: thirteen leaf kinds and their value
//!   conversion rules
//! - Property modifiers (nullable, primary key, indexed, list/set/dictionary)
//!   merged onto a single immutable descriptor
//! - Typed value slots and object instances
//! - Class descriptors and schemas built from ordered declarations
//! - Marshaling to and from the engine's flat metadata records
//!
//! ## Example
//!
//! ```rust
//! use realmkit_schema::{ClassDescriptor, Object, Property, Value};
//! use std::sync::Arc;
//!
//! let person = Arc::new(
//!     ClassDescriptor::builder("Person")
//!         .property("id", Property::int().primary_key())
//!         .property("name", Property::string())
//!         .build()
//!         .unwrap(),
//! );
//!
//! let ann = Object::from_positional(person, [Value::from(1), Value::from("Ann")]).unwrap();
//! assert_eq!(ann.get("name").unwrap(), &Value::from("Ann"));
//! assert_eq!(ann.property_names(), vec!["id", "name"]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod class;
mod error;
mod kind;
mod marshal;
mod object;
mod property;
mod value;

pub use class::{ClassBuilder, ClassDescriptor, ClassKey, Schema};
pub use error::{SchemaError, SchemaResult};
pub use kind::{ClassFlags, CollectionKind, PropertyFlags, PropertyKind};
pub use marshal::{ClassRecord, ClassRecords, PropertyRecord};
pub use object::{Object, PropertyIndex};
pub use property::{Property, PropertyDescriptor, PropertyKey, PropertyValue};
pub use value::{convert_scalar, default_scalar, Decimal128, ObjectId, ObjectLink, Timestamp, Value};
