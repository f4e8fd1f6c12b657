//! Dotted-key attribute storage.
//!
//! Session attributes are a mapping from string keys to arbitrary JSON
//! values. Dotted keys (`"a.b.c"`) address nested objects, which `set`
//! creates on demand. The whole map serializes to the opaque blob the
//! handlers persist.

use serde_json::{Map, Value};

/// The in-memory attribute mapping of one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeMap {
    inner: Map<String, Value>,
}

impl AttributeMap {
    /// Create an empty attribute map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value at a dotted key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut segments = key.split('.');
        let first = segments.next()?;
        let mut current = self.inner.get(first)?;
        for seg in segments {
            current = current.as_object()?.get(seg)?;
        }
        Some(current)
    }

    /// Get a mutable reference to the value at a dotted key.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        let mut segments = key.split('.');
        let first = segments.next()?;
        let mut current = self.inner.get_mut(first)?;
        for seg in segments {
            current = current.as_object_mut()?.get_mut(seg)?;
        }
        Some(current)
    }

    /// Check whether a dotted key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Set the value at a dotted key, creating intermediate objects on
    /// demand. An intermediate value that is not an object is replaced by
    /// one.
    pub fn set(&mut self, key: &str, value: Value) {
        let segments: Vec<&str> = key.split('.').collect();
        let (last, parents) = match segments.split_last() {
            Some(parts) => parts,
            None => return,
        };

        let mut map = &mut self.inner;
        for seg in parents {
            let entry = map
                .entry((*seg).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            map = match entry.as_object_mut() {
                Some(m) => m,
                None => return,
            };
        }
        map.insert((*last).to_string(), value);
    }

    /// Remove the value at a dotted key and return it.
    pub fn pull(&mut self, key: &str) -> Option<Value> {
        let segments: Vec<&str> = key.split('.').collect();
        let (last, parents) = segments.split_last()?;

        let mut map = &mut self.inner;
        for seg in parents {
            map = map.get_mut(*seg)?.as_object_mut()?;
        }
        map.remove(*last)
    }

    /// Remove the value at a dotted key, discarding it.
    pub fn forget(&mut self, key: &str) {
        let _ = self.pull(key);
    }

    /// Append a value to the array at a dotted key.
    ///
    /// The array is created if absent. A present value that is not an
    /// array is replaced by a fresh single-element array.
    pub fn push(&mut self, key: &str, value: Value) {
        let is_array = matches!(self.get(key), Some(Value::Array(_)));
        if is_array {
            if let Some(Value::Array(items)) = self.get_mut(key) {
                items.push(value);
            }
            return;
        }
        self.set(key, Value::Array(vec![value]));
    }

    /// View the full flat mapping.
    pub fn all(&self) -> &Map<String, Value> {
        &self.inner
    }

    /// Replace the entire mapping.
    pub fn replace(&mut self, attributes: Map<String, Value>) {
        self.inner = attributes;
    }

    /// Remove every attribute.
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Number of top-level attributes.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True if no attributes are set.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Serialize to the opaque blob persisted by handlers.
    pub fn to_blob(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.inner)
    }

    /// Deserialize a persisted blob.
    pub fn from_blob(blob: &str) -> Result<Self, serde_json::Error> {
        Ok(Self {
            inner: serde_json::from_str(blob)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_and_get_flat() {
        let mut attrs = AttributeMap::new();
        attrs.set("user", json!("alice"));

        assert_eq!(attrs.get("user"), Some(&json!("alice")));
        assert_eq!(attrs.get("missing"), None);
    }

    #[test]
    fn test_dotted_set_creates_nested_objects() {
        let mut attrs = AttributeMap::new();
        attrs.set("a.b.c", json!(42));

        assert_eq!(attrs.get("a.b.c"), Some(&json!(42)));
        assert_eq!(attrs.get("a.b"), Some(&json!({"c": 42})));
        assert_eq!(attrs.get("a"), Some(&json!({"b": {"c": 42}})));
    }

    #[test]
    fn test_dotted_set_replaces_non_object_intermediate() {
        let mut attrs = AttributeMap::new();
        attrs.set("a", json!("scalar"));
        attrs.set("a.b", json!(1));

        assert_eq!(attrs.get("a.b"), Some(&json!(1)));
    }

    #[test]
    fn test_pull_returns_and_removes() {
        let mut attrs = AttributeMap::new();
        attrs.set("nested.value", json!([1, 2, 3]));

        assert_eq!(attrs.pull("nested.value"), Some(json!([1, 2, 3])));
        assert_eq!(attrs.get("nested.value"), None);
        // Parent object survives, now empty.
        assert_eq!(attrs.get("nested"), Some(&json!({})));
    }

    #[test]
    fn test_pull_missing_is_none() {
        let mut attrs = AttributeMap::new();
        assert_eq!(attrs.pull("nope"), None);
        assert_eq!(attrs.pull("also.nope"), None);
    }

    #[test]
    fn test_forget_discards() {
        let mut attrs = AttributeMap::new();
        attrs.set("key", json!(true));
        attrs.forget("key");
        assert!(!attrs.contains("key"));
    }

    #[test]
    fn test_push_creates_array() {
        let mut attrs = AttributeMap::new();
        attrs.push("items", json!("first"));
        attrs.push("items", json!("second"));

        assert_eq!(attrs.get("items"), Some(&json!(["first", "second"])));
    }

    #[test]
    fn test_push_replaces_non_array() {
        let mut attrs = AttributeMap::new();
        attrs.set("items", json!("scalar"));
        attrs.push("items", json!("pushed"));

        assert_eq!(attrs.get("items"), Some(&json!(["pushed"])));
    }

    #[test]
    fn test_clear_and_replace() {
        let mut attrs = AttributeMap::new();
        attrs.set("one", json!(1));
        attrs.set("two", json!(2));
        assert_eq!(attrs.len(), 2);

        attrs.clear();
        assert!(attrs.is_empty());

        let mut fresh = Map::new();
        fresh.insert("three".to_string(), json!(3));
        attrs.replace(fresh);
        assert_eq!(attrs.get("three"), Some(&json!(3)));
        assert_eq!(attrs.len(), 1);
    }

    #[test]
    fn test_blob_roundtrip() {
        let mut attrs = AttributeMap::new();
        attrs.set("user.name", json!("alice"));
        attrs.set("user.roles", json!(["admin", "dev"]));
        attrs.set("count", json!(7));
        attrs.set("flag", json!(null));

        let blob = attrs.to_blob().unwrap();
        let restored = AttributeMap::from_blob(&blob).unwrap();

        assert_eq!(restored, attrs);
    }

    #[test]
    fn test_from_blob_rejects_garbage() {
        assert!(AttributeMap::from_blob("{broken").is_err());
        // Valid JSON, but not an object.
        assert!(AttributeMap::from_blob("[1,2,3]").is_err());
    }
}
