//! Session bags.
//!
//! A bag is a named sub-mapping inside the session with its own storage
//! key. The store pulls each bag's data out of the flat attributes when the
//! session starts and writes the current data back before persisting, so
//! bag contents ride the same serialized blob as plain attributes without
//! ever being visible as raw flat keys to application code.

use std::any::Any;

use chrono::Utc;
use serde_json::{Map, Value};

/// Storage key prefix for user-registered bags.
///
/// Namespacing bag data under `_bag.<name>` keeps a plain attribute named
/// like the bag from ever colliding with the bag's persisted data.
pub const BAG_PREFIX: &str = "_bag";

/// A named, independently initialized sub-mapping of the session.
pub trait SessionBag: Send {
    /// Registration name, used for [`Store::get_bag`](crate::Store::get_bag)
    /// lookups.
    fn name(&self) -> &str;

    /// Key the bag's data is persisted under inside the attribute map.
    fn storage_key(&self) -> &str;

    /// Hydrate the bag from the sub-map extracted at session start.
    fn initialize(&mut self, data: Map<String, Value>);

    /// Snapshot of the bag's current data, written back at save time.
    fn data(&self) -> Map<String, Value>;

    /// Downcast support for typed access through `dyn SessionBag`.
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl std::fmt::Debug for dyn SessionBag + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("dyn SessionBag")
            .field("name", &self.name())
            .finish()
    }
}

/// Fixed bag tracking when the session was created and last loaded.
///
/// Registered on every store; persisted under `_meta` through the same
/// protocol as user bags.
#[derive(Debug, Clone)]
pub struct MetadataBag {
    created: i64,
    last_used: i64,
}

impl MetadataBag {
    /// Create a metadata bag stamped with the current time.
    pub fn new() -> Self {
        let now = Utc::now().timestamp();
        Self {
            created: now,
            last_used: now,
        }
    }

    /// Unix timestamp of session creation.
    pub fn created(&self) -> i64 {
        self.created
    }

    /// Unix timestamp of the most recent session load.
    pub fn last_used(&self) -> i64 {
        self.last_used
    }
}

impl Default for MetadataBag {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBag for MetadataBag {
    fn name(&self) -> &str {
        "metadata"
    }

    fn storage_key(&self) -> &str {
        "_meta"
    }

    fn initialize(&mut self, data: Map<String, Value>) {
        let now = Utc::now().timestamp();
        self.created = data
            .get("created")
            .and_then(Value::as_i64)
            .unwrap_or(now);
        // Every load counts as a use.
        self.last_used = now;
    }

    fn data(&self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("created".to_string(), Value::from(self.created));
        data.insert("last_used".to_string(), Value::from(self.last_used));
        data
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Generic user-registrable bag holding a flat key/value mapping.
#[derive(Debug, Clone)]
pub struct AttributeBag {
    name: String,
    storage_key: String,
    data: Map<String, Value>,
}

impl AttributeBag {
    /// Create an empty bag with the given registration name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let storage_key = format!("{}.{}", BAG_PREFIX, name);
        Self {
            name,
            storage_key,
            data: Map::new(),
        }
    }

    /// Get a value from the bag.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Set a value in the bag.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Remove a value from the bag, returning it.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// True if the bag holds the key.
    pub fn has(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Remove everything from the bag.
    pub fn clear(&mut self) {
        self.data.clear();
    }
}

impl SessionBag for AttributeBag {
    fn name(&self) -> &str {
        &self.name
    }

    fn storage_key(&self) -> &str {
        &self.storage_key
    }

    fn initialize(&mut self, data: Map<String, Value>) {
        self.data = data;
    }

    fn data(&self) -> Map<String, Value> {
        self.data.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
