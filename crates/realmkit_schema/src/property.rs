//! Property declarations, immutable property descriptors and typed value slots.
//!
//! A property starts as a bare [`Property`] declaration for one leaf kind.
//! Modifiers (`nullable`, `primary_key`, `indexed`, and one of `list`,
//! `set`, `dictionary`) merge onto that single declaration, so the order
//! in which they are applied never changes the resulting
//! [`PropertyDescriptor`]:
//!
//! ```rust
//! use realmkit_schema::Property;
//!
//! let a = Property::int().nullable().primary_key().build("id").unwrap();
//! let b = Property::int().primary_key().nullable().build("id").unwrap();
//! assert_eq!(a, b);
//! ```

use crate::error::{SchemaError, SchemaResult};
use crate::kind::{CollectionKind, PropertyFlags, PropertyKind};
use crate::value::{convert_scalar, default_scalar, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Engine-assigned key of a property.
///
/// Only meaningful within the handle that reported it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PropertyKey(pub i64);

impl PropertyKey {
    /// Creates a new property key.
    #[must_use]
    pub const fn new(key: i64) -> Self {
        Self(key)
    }

    /// Returns the raw key value.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

/// A property declaration that has not been given a name yet.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct Property {
    kind: PropertyKind,
    public_name: Option<String>,
    flags: PropertyFlags,
    collection: CollectionKind,
    link_target: Option<String>,
    link_origin: Option<String>,
    /// First conflicting collection modifier, reported by `build`.
    conflict: Option<(CollectionKind, CollectionKind)>,
}

impl Property {
    /// Starts a declaration for any leaf kind.
    ///
    /// Link kinds still need their targets; prefer [`Property::object`] and
    /// [`Property::linking_objects`] for those.
    pub fn leaf(kind: PropertyKind) -> Self {
        Self {
            kind,
            public_name: None,
            flags: PropertyFlags::NORMAL,
            collection: CollectionKind::None,
            link_target: None,
            link_origin: None,
            conflict: None,
        }
    }

    /// Integer property.
    pub fn int() -> Self {
        Self::leaf(PropertyKind::Int)
    }

    /// Boolean property.
    pub fn boolean() -> Self {
        Self::leaf(PropertyKind::Bool)
    }

    /// String property.
    pub fn string() -> Self {
        Self::leaf(PropertyKind::String)
    }

    /// Binary property.
    pub fn binary() -> Self {
        Self::leaf(PropertyKind::Binary)
    }

    /// Dynamically typed property.
    pub fn mixed() -> Self {
        Self::leaf(PropertyKind::Mixed)
    }

    /// Timestamp property.
    pub fn timestamp() -> Self {
        Self::leaf(PropertyKind::Timestamp)
    }

    /// Single precision float property.
    pub fn float() -> Self {
        Self::leaf(PropertyKind::Float)
    }

    /// Double precision float property.
    pub fn double() -> Self {
        Self::leaf(PropertyKind::Double)
    }

    /// 128-bit decimal property.
    pub fn decimal128() -> Self {
        Self::leaf(PropertyKind::Decimal128)
    }

    /// Object id property.
    pub fn object_id() -> Self {
        Self::leaf(PropertyKind::ObjectId)
    }

    /// UUID property.
    pub fn uuid() -> Self {
        Self::leaf(PropertyKind::Uuid)
    }

    /// Forward link to objects of `target`.
    pub fn object(target: impl Into<String>) -> Self {
        let mut property = Self::leaf(PropertyKind::Object);
        property.link_target = Some(target.into());
        property
    }

    /// Backward link collecting the `target` objects whose `origin_property`
    /// points at this object.
    pub fn linking_objects(target: impl Into<String>, origin_property: impl Into<String>) -> Self {
        let mut property = Self::leaf(PropertyKind::LinkingObjects);
        property.link_target = Some(target.into());
        property.link_origin = Some(origin_property.into());
        property
    }

    /// Sets the name the engine exposes publicly. Empty names are ignored.
    pub fn public_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.public_name = (!name.is_empty()).then_some(name);
        self
    }

    /// Allows null values.
    pub fn nullable(mut self) -> Self {
        self.flags = self.flags | PropertyFlags::NULLABLE;
        self
    }

    /// Marks the property as the class's primary key.
    pub fn primary_key(mut self) -> Self {
        self.flags = self.flags | PropertyFlags::PRIMARY_KEY;
        self
    }

    /// Asks the engine to index the property.
    pub fn indexed(mut self) -> Self {
        self.flags = self.flags | PropertyFlags::INDEXED;
        self
    }

    /// Makes the property an ordered list of values.
    pub fn list(self) -> Self {
        self.with_collection(CollectionKind::List)
    }

    /// Makes the property a set of values.
    pub fn set(self) -> Self {
        self.with_collection(CollectionKind::Set)
    }

    /// Makes the property a string-keyed dictionary of values.
    pub fn dictionary(self) -> Self {
        self.with_collection(CollectionKind::Dictionary)
    }

    /// Applies a collection kind; a second collection kind is recorded as a
    /// conflict and rejected by `build`.
    pub fn with_collection(mut self, collection: CollectionKind) -> Self {
        if !collection.is_collection() {
            return self;
        }
        if self.collection.is_collection() {
            self.conflict.get_or_insert((self.collection, collection));
        } else {
            self.collection = collection;
        }
        self
    }

    /// Returns the leaf kind being declared.
    #[must_use]
    pub const fn kind(&self) -> PropertyKind {
        self.kind
    }

    /// Finishes the declaration under `name`.
    pub fn build(self, name: impl Into<String>) -> SchemaResult<PropertyDescriptor> {
        let name = name.into();
        if name.is_empty() {
            return Err(SchemaError::invalid_composition(
                "property name cannot be empty",
            ));
        }
        self.finish(name)
    }

    /// Builds an unnamed descriptor and binds `value` to it.
    pub fn new_value(self, value: impl Into<Value>) -> SchemaResult<PropertyValue> {
        let descriptor = Arc::new(self.finish(String::new())?);
        PropertyValue::new(descriptor, value)
    }

    pub(crate) fn finish(self, name: String) -> SchemaResult<PropertyDescriptor> {
        if let Some((first, second)) = self.conflict {
            return Err(SchemaError::invalid_composition(format!(
                "property collection types cannot be combined ({first:?} and {second:?})"
            )));
        }

        let missing_link = |what: &str| {
            SchemaError::invalid_composition(format!(
                "{} property '{name}' requires a {what}",
                self.kind
            ))
        };
        let (link_target, link_origin) = match self.kind {
            PropertyKind::Object => {
                let target = self.link_target.filter(|t| !t.is_empty());
                (Some(target.ok_or_else(|| missing_link("target class"))?), None)
            }
            PropertyKind::LinkingObjects => {
                let target = self.link_target.filter(|t| !t.is_empty());
                let origin = self.link_origin.filter(|o| !o.is_empty());
                (
                    Some(target.ok_or_else(|| missing_link("target class"))?),
                    Some(origin.ok_or_else(|| missing_link("origin property"))?),
                )
            }
            _ => (None, None),
        };

        Ok(PropertyDescriptor {
            name,
            public_name: self.public_name,
            kind: self.kind,
            flags: self.flags,
            collection: self.collection,
            link_target,
            link_origin,
            key: None,
        })
    }
}

/// The complete, immutable description of one property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyDescriptor {
    name: String,
    public_name: Option<String>,
    kind: PropertyKind,
    flags: PropertyFlags,
    collection: CollectionKind,
    link_target: Option<String>,
    link_origin: Option<String>,
    key: Option<PropertyKey>,
}

impl PropertyDescriptor {
    /// Returns the declared name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the public-facing name, if one was set.
    #[must_use]
    pub fn public_name(&self) -> Option<&str> {
        self.public_name.as_deref()
    }

    /// Returns the leaf kind.
    #[must_use]
    pub const fn kind(&self) -> PropertyKind {
        self.kind
    }

    /// Returns the packed flag bits.
    #[must_use]
    pub const fn flags(&self) -> PropertyFlags {
        self.flags
    }

    /// Returns true if the property admits null.
    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        self.flags.contains(PropertyFlags::NULLABLE)
    }

    /// Returns true if the property is its class's primary key.
    #[must_use]
    pub const fn is_primary_key(&self) -> bool {
        self.flags.contains(PropertyFlags::PRIMARY_KEY)
    }

    /// Returns true if the property is indexed.
    #[must_use]
    pub const fn is_indexed(&self) -> bool {
        self.flags.contains(PropertyFlags::INDEXED)
    }

    /// Returns the collection kind.
    #[must_use]
    pub const fn collection(&self) -> CollectionKind {
        self.collection
    }

    /// Returns the linked class for link and backward-link kinds.
    #[must_use]
    pub fn link_target(&self) -> Option<&str> {
        self.link_target.as_deref()
    }

    /// Returns the origin property of a backward link.
    #[must_use]
    pub fn link_origin_property(&self) -> Option<&str> {
        self.link_origin.as_deref()
    }

    /// Returns the engine key, once the engine has assigned one.
    #[must_use]
    pub const fn key(&self) -> Option<PropertyKey> {
        self.key
    }

    /// Returns true for engine-computed properties (backward links).
    #[must_use]
    pub const fn is_computed(&self) -> bool {
        matches!(self.kind, PropertyKind::LinkingObjects)
    }

    /// Returns true if null may be assigned. Backward links are computed
    /// by the engine and only ever hold null on the client side.
    #[must_use]
    pub const fn accepts_null(&self) -> bool {
        self.is_nullable() || self.is_computed()
    }

    /// Attaches the engine-assigned key.
    #[must_use]
    pub fn with_key(mut self, key: PropertyKey) -> Self {
        self.key = Some(key);
        self
    }

    /// Renders the type, e.g. `List<Int?>(primary key)`.
    #[must_use]
    pub fn describe(&self) -> String {
        let leaf = format!("{}{}", self.kind, if self.is_nullable() { "?" } else { "" });
        let wrapped = match self.collection {
            CollectionKind::None => leaf,
            CollectionKind::List => format!("List<{leaf}>"),
            CollectionKind::Set => format!("Set<{leaf}>"),
            CollectionKind::Dictionary => format!("Dictionary<{leaf}>"),
        };
        if self.is_primary_key() {
            format!("{wrapped}(primary key)")
        } else {
            wrapped
        }
    }

    /// Converts `value` to this property's canonical representation.
    pub fn convert(&self, value: Value) -> SchemaResult<Value> {
        if value.is_null() {
            return if self.accepts_null() {
                Ok(Value::Null)
            } else {
                Err(SchemaError::not_nullable(&self.name))
            };
        }

        match self.collection {
            CollectionKind::None => convert_scalar(self.kind, value),
            CollectionKind::List | CollectionKind::Set => {
                let Value::List(items) = value else {
                    return Err(SchemaError::type_mismatch(self.describe(), value.type_name()));
                };
                let mut converted: Vec<Value> = Vec::with_capacity(items.len());
                for item in items {
                    let item = self.convert_element(item)?;
                    if self.collection == CollectionKind::Set && converted.contains(&item) {
                        continue;
                    }
                    converted.push(item);
                }
                Ok(Value::List(converted))
            }
            CollectionKind::Dictionary => {
                let Value::Dictionary(entries) = value else {
                    return Err(SchemaError::type_mismatch(self.describe(), value.type_name()));
                };
                entries
                    .into_iter()
                    .map(|(key, item)| Ok((key, self.convert_element(item)?)))
                    .collect::<SchemaResult<_>>()
                    .map(Value::Dictionary)
            }
        }
    }

    fn convert_element(&self, item: Value) -> SchemaResult<Value> {
        if item.is_null() {
            if self.is_nullable() {
                return Ok(Value::Null);
            }
            return Err(SchemaError::not_nullable(&self.name));
        }
        convert_scalar(self.kind, item)
    }

    /// Returns the value a fresh instance holds for this property.
    #[must_use]
    pub fn default_value(&self) -> Value {
        if self.accepts_null() {
            return Value::Null;
        }
        match self.collection {
            CollectionKind::None => default_scalar(self.kind),
            CollectionKind::List | CollectionKind::Set => Value::List(Vec::new()),
            CollectionKind::Dictionary => Value::Dictionary(Default::default()),
        }
    }
}

impl fmt::Display for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}: '{}'>", self.describe(), self.name)
    }
}

/// A value slot bound to one property descriptor.
///
/// The held value is always in the descriptor's canonical representation
/// and is null only if the descriptor is nullable.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyValue {
    descriptor: Arc<PropertyDescriptor>,
    value: Value,
}

impl PropertyValue {
    /// Binds `value` to `descriptor`, converting it first.
    pub fn new(descriptor: Arc<PropertyDescriptor>, value: impl Into<Value>) -> SchemaResult<Self> {
        let value = descriptor.convert(value.into())?;
        Ok(Self { descriptor, value })
    }

    /// Creates a slot holding the descriptor's default value.
    #[must_use]
    pub fn with_default(descriptor: Arc<PropertyDescriptor>) -> Self {
        let value = descriptor.default_value();
        Self { descriptor, value }
    }

    /// Returns the property name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// Returns the property kind.
    #[must_use]
    pub fn kind(&self) -> PropertyKind {
        self.descriptor.kind()
    }

    /// Returns true if the slot admits null.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.descriptor.is_nullable()
    }

    /// Returns the descriptor this slot is bound to.
    #[must_use]
    pub fn descriptor(&self) -> &Arc<PropertyDescriptor> {
        &self.descriptor
    }

    /// Returns the current value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Replaces the value. On error the previous value is kept.
    pub fn set(&mut self, value: impl Into<Value>) -> SchemaResult<()> {
        self.value = self.descriptor.convert(value.into())?;
        Ok(())
    }

    /// Consumes the slot, returning its value.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.value
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{}: '{}' = {}>",
            self.descriptor.describe(),
            self.name(),
            self.value
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn integer_new_value() {
        let value = Property::int().new_value(5).unwrap();
        assert_eq!(value.value(), &Value::Int(5));
    }

    #[test]
    fn integer_rejects_null() {
        let err = Property::int().new_value(Value::Null).unwrap_err();
        assert!(matches!(err, SchemaError::NotNullable { .. }));
    }

    #[test]
    fn nullable_integer_accepts_null() {
        let value = Property::int().nullable().new_value(Value::Null).unwrap();
        assert!(value.value().is_null());
    }

    #[test]
    fn modifier_order_does_not_matter() {
        let a = Property::string().nullable().primary_key().build("id").unwrap();
        let b = Property::string().primary_key().nullable().build("id").unwrap();
        assert_eq!(a, b);

        let c = Property::int().list().nullable().indexed().build("xs").unwrap();
        let d = Property::int().indexed().nullable().list().build("xs").unwrap();
        assert_eq!(c, d);
    }

    #[test]
    fn second_collection_modifier_rejected() {
        let err = Property::int().list().set().build("xs").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidComposition { .. }));

        let err = Property::int().dictionary().list().build("xs").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidComposition { .. }));
    }

    #[test]
    fn nullable_and_collection_are_independent() {
        let list = Property::int().list().build("xs").unwrap();
        assert!(!list.is_nullable());
        assert_eq!(list.collection(), CollectionKind::List);

        let nullable_list = Property::int().nullable().list().build("xs").unwrap();
        assert!(nullable_list.is_nullable());
        assert_eq!(nullable_list.collection(), CollectionKind::List);
    }

    #[test]
    fn links_require_targets() {
        assert!(Property::leaf(PropertyKind::Object).build("dog").is_err());
        assert!(Property::linking_objects("Person", "").build("owners").is_err());

        let owners = Property::linking_objects("Person", "dog").build("owners").unwrap();
        assert_eq!(owners.link_target(), Some("Person"));
        assert_eq!(owners.link_origin_property(), Some("dog"));
        assert!(owners.is_computed());
    }

    #[test]
    fn links_are_nullable_only_when_declared() {
        let dog = Property::object("Dog").build("dog").unwrap();
        assert!(!dog.is_nullable());
        assert!(matches!(
            dog.convert(Value::Null),
            Err(SchemaError::NotNullable { .. })
        ));
        let dog = Property::object("Dog").nullable().build("dog").unwrap();
        assert_eq!(dog.convert(Value::Null), Ok(Value::Null));
        let any = Property::mixed().build("any").unwrap();
        assert!(!any.is_nullable());
    }

    #[test]
    fn backward_links_accept_only_null() {
        let owners = Property::linking_objects("Person", "dog").build("owners").unwrap();
        assert!(!owners.is_nullable());
        assert!(owners.accepts_null());
        assert_eq!(owners.convert(Value::Null), Ok(Value::Null));
        assert!(matches!(
            owners.convert(Value::List(Vec::new())),
            Err(SchemaError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn empty_name_rejected() {
        assert!(Property::int().build("").is_err());
    }

    #[test]
    fn describe_wraps_collection_and_primary_key() {
        let p = Property::int().nullable().list().build("xs").unwrap();
        assert_eq!(p.describe(), "List<Int?>");
        let p = Property::string().primary_key().build("id").unwrap();
        assert_eq!(p.describe(), "String(primary key)");
        assert_eq!(p.to_string(), "<String(primary key): 'id'>");
        let p = Property::uuid().dictionary().build("m").unwrap();
        assert_eq!(p.describe(), "Dictionary<UUID>");
    }

    #[test]
    fn list_elements_are_converted() {
        let p = Arc::new(Property::double().list().build("xs").unwrap());
        let value = PropertyValue::new(p.clone(), Value::List(vec![Value::Int(1), Value::Float(2.5)]))
            .unwrap();
        assert_eq!(
            value.value(),
            &Value::List(vec![Value::Float(1.0), Value::Float(2.5)])
        );

        let err = PropertyValue::new(p.clone(), Value::List(vec![Value::Null])).unwrap_err();
        assert!(matches!(err, SchemaError::NotNullable { .. }));

        let err = PropertyValue::new(p, Value::Float(1.0)).unwrap_err();
        assert!(matches!(err, SchemaError::TypeMismatch { .. }));
    }

    #[test]
    fn set_drops_duplicates() {
        let p = Arc::new(Property::string().set().build("tags").unwrap());
        let value = PropertyValue::new(
            p,
            Value::List(vec!["a".into(), "b".into(), "a".into()]),
        )
        .unwrap();
        assert_eq!(value.value(), &Value::List(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn dictionary_values_are_converted() {
        let p = Arc::new(Property::boolean().nullable().dictionary().build("flags").unwrap());
        let mut entries = BTreeMap::new();
        entries.insert("on".to_string(), Value::from("yes"));
        entries.insert("off".to_string(), Value::Null);
        let value = PropertyValue::new(p, Value::Dictionary(entries)).unwrap();
        let entries = value.value().as_dictionary().unwrap();
        assert_eq!(entries["on"], Value::Bool(true));
        assert_eq!(entries["off"], Value::Null);
    }

    #[test]
    fn failed_set_keeps_previous_value() {
        let p = Arc::new(Property::int().build("n").unwrap());
        let mut slot = PropertyValue::new(p, 1).unwrap();
        assert!(slot.set("one").is_err());
        assert!(slot.set(Value::Null).is_err());
        assert_eq!(slot.value(), &Value::Int(1));
        slot.set(2).unwrap();
        assert_eq!(slot.value(), &Value::Int(2));
    }

    #[test]
    fn defaults_respect_nullability_and_collections() {
        let p = Property::int().build("n").unwrap();
        assert_eq!(p.default_value(), Value::Int(0));
        let p = Property::int().nullable().build("n").unwrap();
        assert_eq!(p.default_value(), Value::Null);
        let p = Property::int().list().build("n").unwrap();
        assert_eq!(p.default_value(), Value::List(Vec::new()));
        let p = Property::linking_objects("Person", "dog").build("owners").unwrap();
        assert_eq!(p.default_value(), Value::Null);
    }

    #[test]
    fn value_display() {
        let p = Arc::new(Property::int().build("age").unwrap());
        let slot = PropertyValue::new(p, 42).unwrap();
        assert_eq!(slot.to_string(), "<Int: 'age' = 42>");
    }
}
