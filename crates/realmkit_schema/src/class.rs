//! Class descriptors and schemas.
//!
//! A class is declared through [`ClassDescriptor::builder`], which keeps the
//! properties in declaration order. That order is both the on-disk order
//! and the order positional constructor arguments bind in.

use crate::error::{SchemaError, SchemaResult};
use crate::kind::{ClassFlags, PropertyKind};
use crate::property::{Property, PropertyDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Engine-assigned key of a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClassKey(pub u32);

impl ClassKey {
    /// Creates a new class key.
    #[must_use]
    pub const fn new(key: u32) -> Self {
        Self(key)
    }

    /// Returns the raw key value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ClassKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class:{}", self.0)
    }
}

/// Builder collecting property declarations in order.
#[derive(Debug)]
#[must_use]
pub struct ClassBuilder {
    name: String,
    flags: ClassFlags,
    properties: Vec<SchemaResult<PropertyDescriptor>>,
}

impl ClassBuilder {
    /// Declares the next property.
    pub fn property(mut self, name: impl Into<String>, property: Property) -> Self {
        self.properties.push(property.build(name));
        self
    }

    /// Appends an already built descriptor.
    pub fn descriptor(mut self, descriptor: PropertyDescriptor) -> Self {
        self.properties.push(Ok(descriptor));
        self
    }

    /// Sets the class-kind flags.
    pub fn flags(mut self, flags: ClassFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Marks the class as embedded.
    pub fn embedded(self) -> Self {
        let flags = self.flags | ClassFlags::EMBEDDED;
        self.flags(flags)
    }

    /// Marks the class as asymmetric.
    pub fn asymmetric(self) -> Self {
        let flags = self.flags | ClassFlags::ASYMMETRIC;
        self.flags(flags)
    }

    /// Validates the declarations and produces the class.
    ///
    /// # Errors
    ///
    /// - the first invalid property declaration
    /// - `DuplicateProperty` if two properties share a name
    /// - `MultiplePrimaryKeys` if more than one property is a primary key
    pub fn build(self) -> SchemaResult<ClassDescriptor> {
        if self.name.is_empty() {
            return Err(SchemaError::invalid_composition("class name cannot be empty"));
        }

        let mut properties = Vec::with_capacity(self.properties.len());
        let mut index = HashMap::with_capacity(self.properties.len());
        let mut primary_key: Option<String> = None;

        for declared in self.properties {
            let descriptor = declared?;
            let position = properties.len();
            if index.insert(descriptor.name().to_string(), position).is_some() {
                return Err(SchemaError::DuplicateProperty {
                    class: self.name,
                    property: descriptor.name().to_string(),
                });
            }
            if descriptor.is_primary_key() {
                if let Some(first) = primary_key {
                    return Err(SchemaError::MultiplePrimaryKeys {
                        class: self.name,
                        first,
                        second: descriptor.name().to_string(),
                    });
                }
                primary_key = Some(descriptor.name().to_string());
            }
            properties.push(Arc::new(descriptor));
        }

        Ok(ClassDescriptor {
            name: self.name,
            flags: self.flags,
            properties,
            index,
            primary_key,
            key: None,
        })
    }
}

/// An ordered, named collection of property descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDescriptor {
    name: String,
    flags: ClassFlags,
    properties: Vec<Arc<PropertyDescriptor>>,
    index: HashMap<String, usize>,
    primary_key: Option<String>,
    key: Option<ClassKey>,
}

impl ClassDescriptor {
    /// Starts declaring a class.
    pub fn builder(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder {
            name: name.into(),
            flags: ClassFlags::NORMAL,
            properties: Vec::new(),
        }
    }

    /// Returns the class name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the class-kind flags.
    #[must_use]
    pub const fn flags(&self) -> ClassFlags {
        self.flags
    }

    /// Returns true for embedded classes.
    #[must_use]
    pub const fn is_embedded(&self) -> bool {
        self.flags.contains(ClassFlags::EMBEDDED)
    }

    /// Returns true for asymmetric classes.
    #[must_use]
    pub const fn is_asymmetric(&self) -> bool {
        self.flags.contains(ClassFlags::ASYMMETRIC)
    }

    /// Returns the engine key, once assigned.
    #[must_use]
    pub const fn key(&self) -> Option<ClassKey> {
        self.key
    }

    /// Attaches the engine-assigned key.
    #[must_use]
    pub fn with_key(mut self, key: ClassKey) -> Self {
        self.key = Some(key);
        self
    }

    /// Returns the properties in declaration order.
    #[must_use]
    pub fn properties(&self) -> &[Arc<PropertyDescriptor>] {
        &self.properties
    }

    /// Returns the property names in declaration order.
    #[must_use]
    pub fn property_names(&self) -> Vec<&str> {
        self.properties.iter().map(|p| p.name()).collect()
    }

    /// Returns the number of declared properties.
    #[must_use]
    pub fn num_properties(&self) -> usize {
        self.properties.len()
    }

    /// Returns the number of engine-computed properties.
    #[must_use]
    pub fn num_computed_properties(&self) -> usize {
        self.properties.iter().filter(|p| p.is_computed()).count()
    }

    /// Returns the declaration position of `name`.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Looks up a property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Arc<PropertyDescriptor>> {
        self.position(name).map(|i| &self.properties[i])
    }

    /// Looks up a property by declaration position.
    #[must_use]
    pub fn property_at(&self, position: usize) -> Option<&Arc<PropertyDescriptor>> {
        self.properties.get(position)
    }

    /// Returns the name of the primary key property.
    #[must_use]
    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    /// Renders a header and one line per property.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = format!(
            "Class: {} ({})\n{}\n",
            self.name,
            self.flags.name(),
            "-".repeat(56)
        );
        for (i, property) in self.properties.iter().enumerate() {
            out.push_str(&format!("{i:>3}: {}: {}\n", property.name(), property.describe()));
        }
        out
    }
}

impl fmt::Display for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Class {}: {} properties>", self.name, self.properties.len())
    }
}

/// The set of classes opened together on one handle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    classes: Vec<Arc<ClassDescriptor>>,
}

impl Schema {
    /// Creates an empty schema.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Assembles classes into a schema.
    ///
    /// # Errors
    ///
    /// - `DuplicateClass` if two classes share a name
    /// - `UnknownLinkTarget` if a link points at a missing class, or a
    ///   backward link names a missing origin property
    pub fn new(classes: impl IntoIterator<Item = ClassDescriptor>) -> SchemaResult<Self> {
        let classes: Vec<Arc<ClassDescriptor>> = classes.into_iter().map(Arc::new).collect();

        let mut seen = HashSet::new();
        for class in &classes {
            if !seen.insert(class.name()) {
                return Err(SchemaError::DuplicateClass {
                    class: class.name().to_string(),
                });
            }
        }

        let by_name: HashMap<&str, &ClassDescriptor> =
            classes.iter().map(|c| (c.name(), c.as_ref())).collect();
        for class in &classes {
            for property in class.properties() {
                let Some(target) = property.link_target() else {
                    continue;
                };
                let unknown = |target: String| SchemaError::UnknownLinkTarget {
                    class: class.name().to_string(),
                    property: property.name().to_string(),
                    target,
                };
                let Some(target_class) = by_name.get(target) else {
                    return Err(unknown(target.to_string()));
                };
                if property.kind() == PropertyKind::LinkingObjects {
                    let origin = property.link_origin_property().unwrap_or_default();
                    let links_back = target_class
                        .property(origin)
                        .is_some_and(|p| p.link_target() == Some(class.name()));
                    if !links_back {
                        return Err(unknown(format!("{target}.{origin}")));
                    }
                }
            }
        }

        Ok(Self { classes })
    }

    /// Returns the classes in declaration order.
    #[must_use]
    pub fn classes(&self) -> &[Arc<ClassDescriptor>] {
        &self.classes
    }

    /// Looks up a class by name.
    #[must_use]
    pub fn class(&self, name: &str) -> Option<&Arc<ClassDescriptor>> {
        self.classes.iter().find(|c| c.name() == name)
    }

    /// Returns the number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Returns true if the schema declares no classes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
