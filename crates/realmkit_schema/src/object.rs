//! Object instances: one typed value slot per declared property.

use crate::class::ClassDescriptor;
use crate::error::{SchemaError, SchemaResult};
use crate::property::PropertyValue;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Addresses a property of an instance by position or by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyIndex<'a> {
    /// Declaration position.
    Position(usize),
    /// Property name.
    Name(&'a str),
}

impl From<usize> for PropertyIndex<'_> {
    fn from(position: usize) -> Self {
        PropertyIndex::Position(position)
    }
}

impl<'a> From<&'a str> for PropertyIndex<'a> {
    fn from(name: &'a str) -> Self {
        PropertyIndex::Name(name)
    }
}

impl<'a> From<&'a String> for PropertyIndex<'a> {
    fn from(name: &'a String) -> Self {
        PropertyIndex::Name(name)
    }
}

/// An instance of a class.
///
/// Values are stored by declaration position; name lookups go through the
/// class's name index, so both forms reach the same slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    class: Arc<ClassDescriptor>,
    values: Vec<PropertyValue>,
}

impl Object {
    /// Creates an instance holding every property's default value.
    #[must_use]
    pub fn new(class: Arc<ClassDescriptor>) -> Self {
        let values = class
            .properties()
            .iter()
            .map(|p| PropertyValue::with_default(Arc::clone(p)))
            .collect();
        Self { class, values }
    }

    /// Creates an instance from positional arguments in declaration order.
    pub fn from_positional<I, V>(class: Arc<ClassDescriptor>, positional: I) -> SchemaResult<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::construct(class, positional, std::iter::empty::<(&str, Value)>())
    }

    /// Creates an instance from keyword arguments.
    pub fn from_named<'a, N, V>(class: Arc<ClassDescriptor>, named: N) -> SchemaResult<Self>
    where
        N: IntoIterator<Item = (&'a str, V)>,
        V: Into<Value>,
    {
        Self::construct(class, std::iter::empty::<Value>(), named)
    }

    /// Creates an instance from positional arguments followed by keyword
    /// arguments.
    ///
    /// With no arguments at all every property takes its default. Otherwise
    /// any property left unbound must be nullable or a backward link, and is
    /// set to null.
    ///
    /// # Errors
    ///
    /// - `IndexOutOfRange` if there are more positional arguments than properties
    /// - `InvalidPropertyName` for an unknown keyword
    /// - `DuplicateArgument` if a keyword names a property already bound
    /// - `MissingPropertyValue` if a non-nullable property is left unbound
    /// - any conversion error of the bound values
    pub fn construct<'a, P, PV, N, NV>(
        class: Arc<ClassDescriptor>,
        positional: P,
        named: N,
    ) -> SchemaResult<Self>
    where
        P: IntoIterator<Item = PV>,
        PV: Into<Value>,
        N: IntoIterator<Item = (&'a str, NV)>,
        NV: Into<Value>,
    {
        let len = class.num_properties();
        let mut bound: Vec<Option<PropertyValue>> = vec![None; len];
        let mut any = false;

        for (position, value) in positional.into_iter().enumerate() {
            any = true;
            let descriptor = class
                .property_at(position)
                .ok_or(SchemaError::IndexOutOfRange { index: position, len })?;
            bound[position] = Some(PropertyValue::new(Arc::clone(descriptor), value)?);
        }

        for (name, value) in named {
            any = true;
            let position = class
                .position(name)
                .ok_or_else(|| SchemaError::invalid_property_name(name))?;
            if bound[position].is_some() {
                return Err(SchemaError::DuplicateArgument {
                    property: name.to_string(),
                });
            }
            let descriptor = Arc::clone(&class.properties()[position]);
            bound[position] = Some(PropertyValue::new(descriptor, value)?);
        }

        if !any {
            return Ok(Self::new(class));
        }

        let values = bound
            .into_iter()
            .zip(class.properties())
            .map(|(slot, descriptor)| match slot {
                Some(slot) => Ok(slot),
                None if descriptor.accepts_null() => {
                    PropertyValue::new(Arc::clone(descriptor), Value::Null)
                }
                None => Err(SchemaError::MissingPropertyValue {
                    property: descriptor.name().to_string(),
                }),
            })
            .collect::<SchemaResult<Vec<_>>>()?;

        Ok(Self { class, values })
    }

    /// Returns the class this instance belongs to.
    #[must_use]
    pub fn class(&self) -> &Arc<ClassDescriptor> {
        &self.class
    }

    /// Returns the class name.
    #[must_use]
    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    /// Returns the number of properties.
    #[must_use]
    pub fn num_properties(&self) -> usize {
        self.values.len()
    }

    /// Returns the property names in declaration order.
    #[must_use]
    pub fn property_names(&self) -> Vec<&str> {
        self.class.property_names()
    }

    fn resolve(&self, index: PropertyIndex<'_>) -> SchemaResult<usize> {
        match index {
            PropertyIndex::Position(position) if position < self.values.len() => Ok(position),
            PropertyIndex::Position(position) => Err(SchemaError::IndexOutOfRange {
                index: position,
                len: self.values.len(),
            }),
            PropertyIndex::Name(name) => self
                .class
                .position(name)
                .ok_or_else(|| SchemaError::invalid_property_name(name)),
        }
    }

    /// Returns the value slot at `index`.
    pub fn slot<'a>(&self, index: impl Into<PropertyIndex<'a>>) -> SchemaResult<&PropertyValue> {
        let position = self.resolve(index.into())?;
        Ok(&self.values[position])
    }

    /// Returns the value at `index`.
    pub fn get<'a>(&self, index: impl Into<PropertyIndex<'a>>) -> SchemaResult<&Value> {
        self.slot(index).map(PropertyValue::value)
    }

    /// Assigns the value at `index`, converting it to the property's type.
    pub fn set<'a>(
        &mut self,
        index: impl Into<PropertyIndex<'a>>,
        value: impl Into<Value>,
    ) -> SchemaResult<()> {
        let position = self.resolve(index.into())?;
        self.values[position].set(value)
    }

    /// Declared properties cannot be removed; this always fails.
    ///
    /// Returns `ReadOnlyProperty` for declared properties and the usual
    /// lookup error otherwise.
    pub fn remove<'a>(&mut self, index: impl Into<PropertyIndex<'a>>) -> SchemaResult<()> {
        let position = self.resolve(index.into())?;
        Err(SchemaError::ReadOnlyProperty {
            property: self.values[position].name().to_string(),
        })
    }

    /// Iterates over the value slots in declaration order.
    pub fn values(&self) -> impl Iterator<Item = &PropertyValue> {
        self.values.iter()
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.class.name())?;
        for (i, slot) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, " {}: {}", slot.name(), slot.value())?;
        }
        f.write_str(" }")
    }
}
