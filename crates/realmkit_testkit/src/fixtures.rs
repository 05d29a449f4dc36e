//! Test fixtures and realm helpers.
//!
//! Provides a small two-class schema and realms opened on a fresh
//! [`MemoryEngine`], with the engine kept around for call inspection.

use realmkit_core::{Config, Realm};
use realmkit_engine::{EngineCall, MemoryEngine};
use realmkit_schema::{ClassDescriptor, Property, Schema};
use std::sync::{Arc, Once};

/// `Person { id: int (primary key), name: string, age: int?, dog: Dog?, nicknames: List<string> }`
pub fn person_class() -> ClassDescriptor {
    ClassDescriptor::builder("Person")
        .property("id", Property::int().primary_key())
        .property("name", Property::string().indexed())
        .property("age", Property::int().nullable())
        .property("dog", Property::object("Dog").nullable())
        .property("nicknames", Property::string().list())
        .build()
        .expect("Person fixture is valid")
}

/// `Dog { name: string, owners: LinkingObjects<Person.dog> }`
pub fn dog_class() -> ClassDescriptor {
    ClassDescriptor::builder("Dog")
        .property("name", Property::string())
        .property("owners", Property::linking_objects("Person", "dog"))
        .build()
        .expect("Dog fixture is valid")
}

/// The Person/Dog schema.
pub fn sample_schema() -> Schema {
    Schema::new([person_class(), dog_class()]).expect("sample schema is valid")
}

/// A realm on its own in-memory engine.
pub struct TestRealm {
    /// The engine, shared with the realm.
    pub engine: MemoryEngine,
    /// The realm under test.
    pub realm: Realm,
}

impl TestRealm {
    /// Opens a realm with no declared classes.
    pub fn empty() -> Self {
        Self::with_config(Config::new("test.realm"))
    }

    /// Opens a realm with the sample schema.
    pub fn sample() -> Self {
        Self::with_config(Config::new("sample.realm").schema(sample_schema()))
    }

    /// Opens a realm with the given configuration.
    pub fn with_config(config: Config) -> Self {
        let engine = MemoryEngine::new();
        let realm = Realm::open(Arc::new(engine.clone()), config).expect("Failed to open realm");
        engine.clear_calls();
        Self { engine, realm }
    }

    /// Returns the transaction control calls made since the realm opened.
    pub fn transaction_calls(&self) -> Vec<EngineCall> {
        self.engine
            .calls()
            .into_iter()
            .filter(|c| c.is_transaction_control())
            .collect()
    }
}

impl std::ops::Deref for TestRealm {
    type Target = Realm;

    fn deref(&self) -> &Self::Target {
        &self.realm
    }
}

/// Runs a test against a fresh realm opened with the sample schema.
///
/// # Example
///
/// ```rust
/// use realmkit_testkit::with_test_realm;
///
/// with_test_realm(|realm| {
///     assert_eq!(realm.num_classes(), 2);
/// });
/// ```
pub fn with_test_realm<F, R>(f: F) -> R
where
    F: FnOnce(&Realm) -> R,
{
    let test = TestRealm::sample();
    f(&test.realm)
}

/// Installs a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
