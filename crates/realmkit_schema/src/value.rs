//! Dynamic property values and the per-kind conversion rules.

use crate::error::{SchemaError, SchemaResult};
use crate::kind::PropertyKind;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Strings accepted as `true` when converting text to a boolean.
const TRUTHY: [&str; 4] = ["true", "t", "yes", "y"];

/// A point in time with nanosecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp {
    /// Seconds since the Unix epoch.
    pub seconds: i64,
    /// Nanoseconds within the second.
    pub nanoseconds: i32,
}

impl Timestamp {
    /// The Unix epoch.
    pub const UNIX_EPOCH: Self = Self::new(0, 0);

    /// Creates a timestamp.
    #[must_use]
    pub const fn new(seconds: i64, nanoseconds: i32) -> Self {
        Self {
            seconds,
            nanoseconds,
        }
    }
}

/// A 128-bit IEEE decimal in its raw two-word form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal128 {
    /// Low 64 bits.
    pub low: u64,
    /// High 64 bits (sign, combination field and exponent).
    pub high: u64,
}

impl Decimal128 {
    /// Positive zero with exponent zero.
    pub const ZERO: Self = Self::from_raw(0, 0x3040_0000_0000_0000);

    /// Creates a decimal from its raw words.
    #[must_use]
    pub const fn from_raw(low: u64, high: u64) -> Self {
        Self { low, high }
    }
}

impl Default for Decimal128 {
    fn default() -> Self {
        Self::ZERO
    }
}

/// A 12-byte object identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    /// Creates an object id from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// Parses the 24 hex digit form.
    pub fn parse_hex(text: &str) -> SchemaResult<Self> {
        let invalid = || SchemaError::type_mismatch(PropertyKind::ObjectId.name(), "malformed object id string");
        if text.len() != 24 || !text.is_ascii() {
            return Err(invalid());
        }
        let mut bytes = [0u8; 12];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&text[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// A reference to a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectLink {
    /// Engine key of the target class.
    pub class_key: u32,
    /// Engine key of the target object.
    pub object_key: i64,
}

/// A dynamically typed property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// UTF-8 text.
    String(String),
    /// Raw bytes.
    Binary(Vec<u8>),
    /// Point in time.
    Timestamp(Timestamp),
    /// 128-bit decimal.
    Decimal(Decimal128),
    /// Object identifier.
    ObjectId(ObjectId),
    /// UUID.
    Uuid(Uuid),
    /// Link to a stored object.
    Link(ObjectLink),
    /// Elements of a list or set property.
    List(Vec<Value>),
    /// Entries of a dictionary property.
    Dictionary(BTreeMap<String, Value>),
}

impl Value {
    /// Returns the name of the value's type, as used in mismatch errors.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Binary(_) => "binary",
            Value::Timestamp(_) => "timestamp",
            Value::Decimal(_) => "decimal128",
            Value::ObjectId(_) => "object id",
            Value::Uuid(_) => "uuid",
            Value::Link(_) => "link",
            Value::List(_) => "list",
            Value::Dictionary(_) => "dictionary",
        }
    }

    /// Check if this value is null.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get this value as a boolean, if it is one.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a float, if it is one.
    #[must_use]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as text, if it is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as bytes, if it is binary.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    /// Get the elements of a list value.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get the entries of a dictionary value.
    #[must_use]
    pub const fn as_dictionary(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Dictionary(entries) => Some(entries),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Binary(b) => write!(f, "<{} bytes>", b.len()),
            Value::Timestamp(t) => write!(f, "{}.{:09}", t.seconds, t.nanoseconds),
            Value::Decimal(d) => write!(f, "decimal128({:#x}, {:#x})", d.high, d.low),
            Value::ObjectId(id) => write!(f, "{id}"),
            Value::Uuid(id) => write!(f, "{id}"),
            Value::Link(link) => write!(f, "link({}:{})", link.class_key, link.object_key),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Dictionary(entries) => {
                f.write_str("{")?;
                for (i, (key, item)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key:?}: {item}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Float(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Binary(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Binary(b.to_vec())
    }
}

impl From<Timestamp> for Value {
    fn from(t: Timestamp) -> Self {
        Value::Timestamp(t)
    }
}

impl From<Decimal128> for Value {
    fn from(d: Decimal128) -> Self {
        Value::Decimal(d)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::ObjectId(id)
    }
}

impl From<Uuid> for Value {
    fn from(id: Uuid) -> Self {
        Value::Uuid(id)
    }
}

impl From<ObjectLink> for Value {
    fn from(link: ObjectLink) -> Self {
        Value::Link(link)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Converts a non-null scalar to the canonical representation of `kind`.
///
/// Null and collection handling belong to the property descriptor; this
/// function only applies the leaf rules.
pub fn convert_scalar(kind: PropertyKind, value: Value) -> SchemaResult<Value> {
    let mismatch = |value: &Value| SchemaError::type_mismatch(kind.name(), value.type_name());

    match kind {
        PropertyKind::Int => match value {
            Value::Int(_) => Ok(value),
            other => Err(mismatch(&other)),
        },
        PropertyKind::Bool => match value {
            Value::Bool(_) => Ok(value),
            Value::String(text) => {
                let lowered = text.to_lowercase();
                Ok(Value::Bool(TRUTHY.contains(&lowered.as_str())))
            }
            Value::Int(n) => Ok(Value::Bool(n != 0)),
            other => Err(mismatch(&other)),
        },
        PropertyKind::String => match value {
            Value::String(_) => Ok(value),
            Value::Binary(bytes) if bytes.is_ascii() => {
                // ASCII is always valid UTF-8
                Ok(Value::String(bytes.into_iter().map(char::from).collect()))
            }
            Value::Binary(_) => Err(SchemaError::type_mismatch(
                kind.name(),
                "non-ASCII binary",
            )),
            other => Err(mismatch(&other)),
        },
        PropertyKind::Binary => match value {
            Value::Binary(_) => Ok(value),
            other => Err(mismatch(&other)),
        },
        PropertyKind::Float => match value {
            Value::Float(n) => narrow_to_f32(n),
            #[allow(clippy::cast_precision_loss)]
            Value::Int(n) => narrow_to_f32(n as f64),
            other => Err(mismatch(&other)),
        },
        PropertyKind::Double => match value {
            Value::Float(_) => Ok(value),
            #[allow(clippy::cast_precision_loss)]
            Value::Int(n) => Ok(Value::Float(n as f64)),
            other => Err(mismatch(&other)),
        },
        PropertyKind::Mixed => Ok(value),
        PropertyKind::Timestamp => match value {
            Value::Timestamp(_) => Ok(value),
            other => Err(mismatch(&other)),
        },
        PropertyKind::Decimal128 => match value {
            Value::Decimal(_) => Ok(value),
            other => Err(mismatch(&other)),
        },
        PropertyKind::Object => match value {
            Value::Link(_) => Ok(value),
            other => Err(mismatch(&other)),
        },
        PropertyKind::ObjectId => match value {
            Value::ObjectId(_) => Ok(value),
            Value::String(text) => ObjectId::parse_hex(&text).map(Value::ObjectId),
            other => Err(mismatch(&other)),
        },
        PropertyKind::Uuid => match value {
            Value::Uuid(_) => Ok(value),
            Value::String(text) => Uuid::parse_str(&text)
                .map(Value::Uuid)
                .map_err(|_| SchemaError::type_mismatch(kind.name(), "malformed uuid string")),
            other => Err(mismatch(&other)),
        },
        // Backward links are computed by the engine.
        PropertyKind::LinkingObjects => Err(SchemaError::type_mismatch(
            "LinkingObjects (read-only)",
            value.type_name(),
        )),
    }
}

/// Rounds to single precision; finite values beyond the `f32` range are
/// rejected rather than saturated to infinity.
fn narrow_to_f32(n: f64) -> SchemaResult<Value> {
    #[allow(clippy::cast_possible_truncation)]
    let narrowed = n as f32;
    if n.is_finite() && narrowed.is_infinite() {
        return Err(SchemaError::type_mismatch(
            PropertyKind::Float.name(),
            "float out of single-precision range",
        ));
    }
    Ok(Value::Float(f64::from(narrowed)))
}

/// Returns the value a non-nullable scalar of `kind` starts with.
#[must_use]
pub fn default_scalar(kind: PropertyKind) -> Value {
    match kind {
        PropertyKind::Int => Value::Int(0),
        PropertyKind::Bool => Value::Bool(false),
        PropertyKind::String => Value::String(String::new()),
        PropertyKind::Binary => Value::Binary(Vec::new()),
        PropertyKind::Timestamp => Value::Timestamp(Timestamp::UNIX_EPOCH),
        PropertyKind::Float | PropertyKind::Double => Value::Float(0.0),
        PropertyKind::Decimal128 => Value::Decimal(Decimal128::ZERO),
        PropertyKind::ObjectId => Value::ObjectId(ObjectId::default()),
        PropertyKind::Uuid => Value::Uuid(Uuid::nil()),
        PropertyKind::Mixed | PropertyKind::Object | PropertyKind::LinkingObjects => Value::Null,
    }
}
