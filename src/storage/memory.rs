use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use super::{ObjectStore, StorageError};

/// An in-process object store backed by a sorted map.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object, replacing any existing one.
    pub fn insert(&self, key: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), body.into());
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectStore for MemoryObjectStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })
    }

    fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StorageError> {
        let mut objects = self.objects.lock().unwrap_or_else(PoisonError::into_inner);
        if objects.contains_key(key) {
            return Err(StorageError::AlreadyExists {
                key: key.to_string(),
            });
        }
        objects.insert(key.to_string(), body);
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let objects = self.objects.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_and_no_overwrite() {
        let store = MemoryObjectStore::new();
        store.put("a/b", b"one".to_vec()).unwrap();
        assert_eq!(store.get("a/b").unwrap(), b"one");
        let err = store.put("a/b", b"two".to_vec()).unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { .. }));
        assert_eq!(store.get("a/b").unwrap(), b"one");
    }

    #[test]
    fn missing_key_is_not_found() {
        let err = MemoryObjectStore::new().get("nope").unwrap_err();
        assert_eq!(err.to_string(), "object not found: nope");
    }

    #[test]
    fn list_filters_by_prefix() {
        let store = MemoryObjectStore::new();
        for k in ["p/2024/01/02/x", "p/2024/01/01/b", "p/2024/01/01/a", "q/1"] {
            store.insert(k, Vec::new());
        }
        assert_eq!(
            store.list("p/2024/01/01/").unwrap(),
            vec!["p/2024/01/01/a".to_string(), "p/2024/01/01/b".to_string()]
        );
        assert_eq!(store.list("").unwrap().len(), 4);
    }
}
