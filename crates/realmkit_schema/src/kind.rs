//! Property kinds, collection kinds and the flag bitmasks shared with the engine.

use crate::error::{SchemaError, SchemaResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// The leaf kind of a property.
///
/// Discriminants are the engine's numeric type codes.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyKind {
    /// Signed 64-bit integer.
    Int = 0,
    /// Boolean.
    Bool = 1,
    /// UTF-8 text.
    String = 2,
    /// Raw bytes.
    Binary = 4,
    /// Any supported scalar, decided at runtime.
    Mixed = 6,
    /// Point in time.
    Timestamp = 8,
    /// Single precision float.
    Float = 9,
    /// Double precision float.
    Double = 10,
    /// 128-bit decimal.
    Decimal128 = 11,
    /// Forward link to an object of another class.
    Object = 12,
    /// Backward link computed from another class's forward link.
    LinkingObjects = 14,
    /// 12-byte object identifier.
    ObjectId = 15,
    /// RFC 4122 UUID.
    Uuid = 17,
}

impl PropertyKind {
    /// Every kind, in code order.
    pub const ALL: [PropertyKind; 13] = [
        PropertyKind::Int,
        PropertyKind::Bool,
        PropertyKind::String,
        PropertyKind::Binary,
        PropertyKind::Mixed,
        PropertyKind::Timestamp,
        PropertyKind::Float,
        PropertyKind::Double,
        PropertyKind::Decimal128,
        PropertyKind::Object,
        PropertyKind::LinkingObjects,
        PropertyKind::ObjectId,
        PropertyKind::Uuid,
    ];

    /// Returns the engine type code.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Resolves a kind from an engine type code.
    pub fn from_code(code: i32) -> SchemaResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.code() == code)
            .ok_or(SchemaError::InvalidKind { code })
    }

    /// Returns the display name used by `describe`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            PropertyKind::Int => "Int",
            PropertyKind::Bool => "Bool",
            PropertyKind::String => "String",
            PropertyKind::Binary => "Binary",
            PropertyKind::Mixed => "Mixed",
            PropertyKind::Timestamp => "Timestamp",
            PropertyKind::Float => "Float",
            PropertyKind::Double => "Double",
            PropertyKind::Decimal128 => "Decimal128",
            PropertyKind::Object => "Object",
            PropertyKind::LinkingObjects => "LinkingObjects",
            PropertyKind::ObjectId => "ObjectId",
            PropertyKind::Uuid => "UUID",
        }
    }

    /// Returns true for forward and backward links.
    #[must_use]
    pub const fn is_link(self) -> bool {
        matches!(self, PropertyKind::Object | PropertyKind::LinkingObjects)
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How many values a property holds.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CollectionKind {
    /// A single value.
    #[default]
    None = 0,
    /// An ordered sequence.
    List = 1,
    /// An unordered set without duplicates.
    Set = 2,
    /// A map keyed by string.
    Dictionary = 4,
}

impl CollectionKind {
    /// Every collection kind, in code order.
    pub const ALL: [CollectionKind; 4] = [
        CollectionKind::None,
        CollectionKind::List,
        CollectionKind::Set,
        CollectionKind::Dictionary,
    ];

    /// Returns the engine collection code.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Resolves a collection kind from an engine collection code.
    pub fn from_code(code: i32) -> SchemaResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.code() == code)
            .ok_or(SchemaError::InvalidCollection { code })
    }

    /// Returns true unless this is [`CollectionKind::None`].
    #[must_use]
    pub const fn is_collection(self) -> bool {
        !matches!(self, CollectionKind::None)
    }
}

/// Property flag bits as stored in the engine's metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PropertyFlags(i32);

impl PropertyFlags {
    /// No flags.
    pub const NORMAL: Self = Self(0);
    /// The property accepts null.
    pub const NULLABLE: Self = Self(1);
    /// The property is the class's primary key.
    pub const PRIMARY_KEY: Self = Self(2);
    /// The property is indexed.
    pub const INDEXED: Self = Self(4);

    const KNOWN: i32 = 1 | 2 | 4;

    /// Builds flags from raw bits, rejecting bits the client does not know.
    pub fn from_bits(bits: i32) -> SchemaResult<Self> {
        if bits & !Self::KNOWN != 0 {
            return Err(SchemaError::invalid_record(format!(
                "unknown property flag bits {bits:#x}"
            )));
        }
        Ok(Self(bits))
    }

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> i32 {
        self.0
    }

    /// Returns true if every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Sets or clears the bits of `other`.
    #[must_use]
    pub const fn with(self, other: Self, enabled: bool) -> Self {
        if enabled {
            Self(self.0 | other.0)
        } else {
            Self(self.0 & !other.0)
        }
    }
}

impl BitOr for PropertyFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Class flag bits as stored in the engine's metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ClassFlags(i32);

impl ClassFlags {
    /// A top-level class.
    pub const NORMAL: Self = Self(0);
    /// Objects only exist inside a parent object.
    pub const EMBEDDED: Self = Self(1);
    /// Objects are write-only from the client's point of view.
    pub const ASYMMETRIC: Self = Self(2);
    /// Mask of all class-kind bits.
    pub const MASK: Self = Self(3);

    /// Builds flags from raw bits, keeping only the class-kind bits.
    #[must_use]
    pub const fn from_bits_truncate(bits: i32) -> Self {
        Self(bits & Self::MASK.0)
    }

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> i32 {
        self.0
    }

    /// Returns true if every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the display name of the class kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self.0 & Self::MASK.0 {
            0 => "normal",
            1 => "embedded",
            2 => "asymmetric",
            _ => "embedded|asymmetric",
        }
    }
}

impl BitOr for ClassFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}
