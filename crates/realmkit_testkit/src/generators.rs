//! Property-based test generators using proptest.
//!
//! Strategies produce valid declarations only: names are non-empty, link
//! kinds carry targets, and at most one collection modifier is applied.

use proptest::prelude::*;
use realmkit_schema::{ClassDescriptor, CollectionKind, Property, PropertyKind};

/// One modifier applied to a property declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    /// `.nullable()`
    Nullable,
    /// `.primary_key()`
    PrimaryKey,
    /// `.indexed()`
    Indexed,
    /// `.list()`, `.set()` or `.dictionary()`
    Collection(CollectionKind),
}

impl Modifier {
    /// Applies the modifier to a declaration.
    pub fn apply(self, property: Property) -> Property {
        match self {
            Modifier::Nullable => property.nullable(),
            Modifier::PrimaryKey => property.primary_key(),
            Modifier::Indexed => property.indexed(),
            Modifier::Collection(kind) => property.with_collection(kind),
        }
    }
}

/// Target class used for generated link properties.
pub const LINK_TARGET: &str = "Target";
/// Origin property used for generated backward links.
pub const LINK_ORIGIN: &str = "source";

/// A property declaration before its modifiers are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySpec {
    /// Leaf kind.
    pub kind: PropertyKind,
    /// Modifiers, in application order.
    pub modifiers: Vec<Modifier>,
    /// Optional public name.
    pub public_name: Option<String>,
}

impl PropertySpec {
    /// Starts the declaration for `kind`, with link targets filled in.
    pub fn base(&self) -> Property {
        let property = match self.kind {
            PropertyKind::Object => Property::object(LINK_TARGET),
            PropertyKind::LinkingObjects => Property::linking_objects(LINK_TARGET, LINK_ORIGIN),
            kind => Property::leaf(kind),
        };
        match &self.public_name {
            Some(name) => property.public_name(name),
            None => property,
        }
    }

    /// Builds the declaration applying modifiers in `order`.
    pub fn property_with(&self, order: &[Modifier]) -> Property {
        order.iter().fold(self.base(), |p, m| m.apply(p))
    }

    /// Builds the declaration applying modifiers in their listed order.
    pub fn property(&self) -> Property {
        self.property_with(&self.modifiers)
    }
}

/// Strategy for any of the thirteen leaf kinds.
pub fn property_kind_strategy() -> impl Strategy<Value = PropertyKind> {
    prop::sample::select(PropertyKind::ALL.to_vec())
}

/// Strategy for any collection kind, `None` included.
pub fn collection_kind_strategy() -> impl Strategy<Value = CollectionKind> {
    prop::sample::select(CollectionKind::ALL.to_vec())
}

/// Strategy for a valid modifier set in arbitrary order.
pub fn modifiers_strategy() -> impl Strategy<Value = Vec<Modifier>> {
    (
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
        collection_kind_strategy(),
    )
        .prop_map(|(nullable, primary_key, indexed, collection)| {
            let mut modifiers = Vec::new();
            if nullable {
                modifiers.push(Modifier::Nullable);
            }
            if primary_key {
                modifiers.push(Modifier::PrimaryKey);
            }
            if indexed {
                modifiers.push(Modifier::Indexed);
            }
            if collection.is_collection() {
                modifiers.push(Modifier::Collection(collection));
            }
            modifiers
        })
        .prop_shuffle()
}

/// Strategy for property names.
pub fn property_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for a property declaration covering every kind and modifier
/// composition.
pub fn property_spec_strategy() -> impl Strategy<Value = PropertySpec> {
    (
        property_kind_strategy(),
        modifiers_strategy(),
        prop::option::of(property_name_strategy()),
    )
        .prop_map(|(kind, modifiers, public_name)| PropertySpec {
            kind,
            modifiers,
            public_name,
        })
}

/// Strategy for a class with unique property names and at most one primary
/// key. Link properties point at [`LINK_TARGET`].
pub fn class_strategy() -> impl Strategy<Value = ClassDescriptor> {
    (
        "[A-Z][a-zA-Z0-9]{0,15}",
        prop::collection::btree_map(property_name_strategy(), property_spec_strategy(), 1..8),
    )
        .prop_map(|(name, specs)| {
            let mut builder = ClassDescriptor::builder(name);
            let mut has_primary_key = false;
            for (prop_name, mut spec) in specs {
                if has_primary_key {
                    spec.modifiers.retain(|m| *m != Modifier::PrimaryKey);
                }
                has_primary_key |= spec.modifiers.contains(&Modifier::PrimaryKey);
                builder = builder.property(prop_name, spec.property());
            }
            builder.build().expect("generated class is valid")
        })
}
