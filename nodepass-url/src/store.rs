//! Key-value persistence handed to whatever needs to remember things between
//! runs (the browser console used local storage for this).

use ahash::AHashMap;
use parking_lot::RwLock;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str) -> Option<String>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: String) {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Option<String> {
        (**self).remove(key)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<AHashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.entries.write().insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) -> Option<String> {
        self.entries.write().remove(key)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a"), None);
        store.set("a", "1".to_string());
        store.set("a", "2".to_string());
        assert_eq!(store.get("a").as_deref(), Some("2"));
        assert_eq!(store.remove("a").as_deref(), Some("2"));
        assert_eq!(store.remove("a"), None);
    }

    #[test]
    fn test_shared_store() {
        let store = Arc::new(MemoryStore::new());
        let other = store.clone();
        std::thread::spawn(move || other.set("k", "v".to_string())).join().unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v"));
    }
}
