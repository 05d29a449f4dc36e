//! Conversion between descriptors and the engine's flat metadata records.
//!
//! Marshaling never carries engine keys; the engine assigns those when a
//! schema is registered. Unmarshaling reads the keys back, so a descriptor
//! recovered from an open handle differs from its declaration only in
//! `key()`.

use crate::class::{ClassDescriptor, ClassKey, Schema};
use crate::error::{SchemaError, SchemaResult};
use crate::kind::{ClassFlags, CollectionKind, PropertyFlags, PropertyKind};
use crate::property::{Property, PropertyDescriptor, PropertyKey};
use serde::{Deserialize, Serialize};

/// Flat property metadata as exchanged with the engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PropertyRecord {
    /// Declared name.
    pub name: String,
    /// Public-facing name, empty when unset.
    pub public_name: String,
    /// Numeric property kind.
    pub type_code: i32,
    /// Numeric collection kind.
    pub collection_code: i32,
    /// Linked class for link kinds, empty otherwise.
    pub link_target: String,
    /// Origin property for backward links, empty otherwise.
    pub link_origin_property: String,
    /// Engine key; `None` until the engine registers the property.
    pub key: Option<PropertyKey>,
    /// Packed [`PropertyFlags`] bits.
    pub flags: i32,
}

/// Flat class metadata as exchanged with the engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClassRecord {
    /// Class name.
    pub name: String,
    /// Name of the primary key property, empty when there is none.
    pub primary_key: String,
    /// Number of persisted properties.
    pub num_properties: usize,
    /// Number of computed properties (backward links).
    pub num_computed_properties: usize,
    /// Engine key; `None` until the engine registers the class.
    pub key: Option<ClassKey>,
    /// Packed [`ClassFlags`] bits.
    pub flags: i32,
}

/// A class record together with its property records, in declaration order.
pub type ClassRecords = (ClassRecord, Vec<PropertyRecord>);

impl PropertyDescriptor {
    /// Marshals the descriptor into an engine record.
    #[must_use]
    pub fn to_record(&self) -> PropertyRecord {
        PropertyRecord {
            name: self.name().to_string(),
            public_name: self.public_name().unwrap_or_default().to_string(),
            type_code: self.kind().code(),
            collection_code: self.collection().code(),
            link_target: self.link_target().unwrap_or_default().to_string(),
            link_origin_property: self.link_origin_property().unwrap_or_default().to_string(),
            key: None,
            flags: self.flags().bits(),
        }
    }

    /// Unmarshals an engine record.
    ///
    /// Modifiers are reapplied from the flag bits alone, in the fixed order
    /// nullable, collection, primary key.
    pub fn from_record(record: &PropertyRecord) -> SchemaResult<Self> {
        let kind = PropertyKind::from_code(record.type_code)?;
        let collection = CollectionKind::from_code(record.collection_code)?;
        let flags = PropertyFlags::from_bits(record.flags)?;

        let mut property = match kind {
            PropertyKind::Object => Property::object(&record.link_target),
            PropertyKind::LinkingObjects => {
                Property::linking_objects(&record.link_target, &record.link_origin_property)
            }
            _ => Property::leaf(kind),
        }
        .public_name(&record.public_name);

        if flags.contains(PropertyFlags::NULLABLE) {
            property = property.nullable();
        }
        property = property.with_collection(collection);
        if flags.contains(PropertyFlags::PRIMARY_KEY) {
            property = property.primary_key();
        }
        if flags.contains(PropertyFlags::INDEXED) {
            property = property.indexed();
        }

        let descriptor = property
            .build(&record.name)
            .map_err(|e| SchemaError::invalid_record(format!("property '{}': {e}", record.name)))?;
        Ok(match record.key {
            Some(key) => descriptor.with_key(key),
            None => descriptor,
        })
    }
}

impl ClassDescriptor {
    /// Marshals the class and its properties into engine records.
    #[must_use]
    pub fn to_records(&self) -> ClassRecords {
        let computed = self.num_computed_properties();
        let class = ClassRecord {
            name: self.name().to_string(),
            primary_key: self.primary_key().unwrap_or_default().to_string(),
            num_properties: self.num_properties() - computed,
            num_computed_properties: computed,
            key: None,
            flags: self.flags().bits(),
        };
        let properties = self.properties().iter().map(|p| p.to_record()).collect();
        (class, properties)
    }

    /// Unmarshals a class from its engine records.
    pub fn from_records(class: &ClassRecord, properties: &[PropertyRecord]) -> SchemaResult<Self> {
        let declared = class
            .num_properties
            .checked_add(class.num_computed_properties)
            .ok_or_else(|| {
                SchemaError::invalid_record(format!(
                    "class '{}' reports an impossible property count",
                    class.name
                ))
            })?;
        if declared != properties.len() {
            return Err(SchemaError::invalid_record(format!(
                "class '{}' reports {declared} properties but {} records were supplied",
                class.name,
                properties.len()
            )));
        }

        let mut builder = ClassDescriptor::builder(&class.name)
            .flags(ClassFlags::from_bits_truncate(class.flags));
        for record in properties {
            builder = builder.descriptor(PropertyDescriptor::from_record(record)?);
        }
        let descriptor = builder.build()?;

        if descriptor.primary_key().unwrap_or_default() != class.primary_key {
            return Err(SchemaError::invalid_record(format!(
                "class '{}' names primary key '{}' but no matching property is flagged",
                class.name, class.primary_key
            )));
        }

        Ok(match class.key {
            Some(key) => descriptor.with_key(key),
            None => descriptor,
        })
    }
}

impl Schema {
    /// Marshals every class, in declaration order.
    #[must_use]
    pub fn to_records(&self) -> Vec<ClassRecords> {
        self.classes().iter().map(|c| c.to_records()).collect()
    }

    /// Unmarshals a schema reported by the engine.
    pub fn from_records(records: &[ClassRecords]) -> SchemaResult<Self> {
        let classes = records
            .iter()
            .map(|(class, properties)| ClassDescriptor::from_records(class, properties))
            .collect::<SchemaResult<Vec<_>>>()?;
        Self::new(classes)
    }
}
