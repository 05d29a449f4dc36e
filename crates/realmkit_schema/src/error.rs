//! Error types for the schema crate.

use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors raised while declaring schemas or reading and writing property values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A value could not be converted to the property's canonical type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Name of the expected kind.
        expected: String,
        /// Name of the kind that was supplied.
        actual: String,
    },

    /// Null was assigned to a property that is not nullable.
    #[error("property '{property}' is not nullable")]
    NotNullable {
        /// Name of the property.
        property: String,
    },

    /// A required property was left without a value during construction.
    #[error("property '{property}' was not initialized and is not nullable")]
    MissingPropertyValue {
        /// Name of the property.
        property: String,
    },

    /// Declared properties cannot be removed from an instance.
    #[error("cannot delete declared property '{property}'")]
    ReadOnlyProperty {
        /// Name of the property.
        property: String,
    },

    /// No property with this name exists on the class.
    #[error("invalid property name: {name}")]
    InvalidPropertyName {
        /// The name that was looked up.
        name: String,
    },

    /// A positional index was outside the declared properties.
    #[error("invalid property index {index}: class has {len} properties")]
    IndexOutOfRange {
        /// The index that was looked up.
        index: usize,
        /// Number of declared properties.
        len: usize,
    },

    /// Modifiers were combined in a way that cannot be represented.
    #[error("invalid property composition: {message}")]
    InvalidComposition {
        /// Description of the conflict.
        message: String,
    },

    /// A metadata record carried an unknown property type code.
    #[error("property type {code} is unknown or not supported")]
    InvalidKind {
        /// The numeric type code.
        code: i32,
    },

    /// A metadata record carried an unknown collection code.
    #[error("property collection type {code} is invalid")]
    InvalidCollection {
        /// The numeric collection code.
        code: i32,
    },

    /// A metadata record was structurally inconsistent.
    #[error("invalid metadata record: {message}")]
    InvalidRecord {
        /// Description of the problem.
        message: String,
    },

    /// Two properties of one class share a name.
    #[error("class '{class}' declares property '{property}' more than once")]
    DuplicateProperty {
        /// Name of the class.
        class: String,
        /// Name of the repeated property.
        property: String,
    },

    /// More than one property of a class is marked as primary key.
    #[error("class '{class}' has more than one primary key: '{first}' and '{second}'")]
    MultiplePrimaryKeys {
        /// Name of the class.
        class: String,
        /// The first primary key property.
        first: String,
        /// The conflicting primary key property.
        second: String,
    },

    /// A link property targets a class missing from the schema.
    #[error("property '{class}.{property}' links to unknown class '{target}'")]
    UnknownLinkTarget {
        /// Name of the class declaring the link.
        class: String,
        /// Name of the link property.
        property: String,
        /// Name of the missing target class.
        target: String,
    },

    /// Two classes of one schema share a name.
    #[error("schema declares class '{class}' more than once")]
    DuplicateClass {
        /// Name of the repeated class.
        class: String,
    },

    /// A property received both a positional and a keyword value.
    #[error("property '{property}' was given more than one value")]
    DuplicateArgument {
        /// Name of the property.
        property: String,
    },
}

impl SchemaError {
    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates a not-nullable error.
    pub fn not_nullable(property: impl Into<String>) -> Self {
        Self::NotNullable {
            property: property.into(),
        }
    }

    /// Creates an invalid composition error.
    pub fn invalid_composition(message: impl Into<String>) -> Self {
        Self::InvalidComposition {
            message: message.into(),
        }
    }

    /// Creates an invalid record error.
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Creates an invalid property name error.
    pub fn invalid_property_name(name: impl Into<String>) -> Self {
        Self::InvalidPropertyName { name: name.into() }
    }
}
