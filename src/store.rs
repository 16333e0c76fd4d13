//! In-memory key-value store with thread-safe access
//!
//! A single `RwLock` guards the whole map: reads share it, every write
//! (including the read-modify-write of an increment) holds it exclusively.

use crate::error::StoreError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Trait defining the interface for key-value storage operations
pub trait Store: Send + Sync {
    /// Set a key-value pair, rejecting values that fail validation
    async fn set(&self, key: String, value: String) -> Result<(), StoreError>;

    /// Get a value by key
    async fn get(&self, key: &str) -> Option<String>;

    /// Delete a key, returning whether it existed
    async fn delete(&self, key: &str) -> bool;

    /// Add `by` to the integer stored at `key`, treating an absent key as 0
    async fn increment(&self, key: &str, by: i64) -> Result<i64, StoreError>;

    /// Check if a key exists
    async fn exists(&self, key: &str) -> bool;

    /// Get the number of stored items
    async fn len(&self) -> usize;
}

/// A value containing a space must arrive wrapped in a pair of double quotes.
pub fn is_valid_value(value: &str) -> bool {
    if value.contains(' ') {
        value.len() >= 2 && value.starts_with('"') && value.ends_with('"')
    } else {
        true
    }
}

/// Thread-safe in-memory key-value store
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    async fn set(&self, key: String, value: String) -> Result<(), StoreError> {
        if !is_valid_value(&value) {
            return Err(StoreError::InvalidValue);
        }

        let mut data = self.data.write().await;
        data.insert(key, value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Option<String> {
        let data = self.data.read().await;
        data.get(key).cloned()
    }

    async fn delete(&self, key: &str) -> bool {
        let mut data = self.data.write().await;
        data.remove(key).is_some()
    }

    async fn increment(&self, key: &str, by: i64) -> Result<i64, StoreError> {
        // The write guard spans parse, add and store.
        let mut data = self.data.write().await;

        let current = match data.get(key) {
            Some(raw) => raw.parse::<i64>().map_err(|_| StoreError::NotAnInteger)?,
            None => 0,
        };
        let next = current.checked_add(by).ok_or(StoreError::Overflow)?;

        data.insert(key.to_string(), next.to_string());
        Ok(next)
    }

    async fn exists(&self, key: &str) -> bool {
        let data = self.data.read().await;
        data.contains_key(key)
    }

    async fn len(&self) -> usize {
        let data = self.data.read().await;
        data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_basic_operations() {
        let store = MemoryStore::new();

        assert_eq!(store.get("never_written").await, None);

        store.set("key1".to_string(), "value1".to_string()).await.unwrap();
        assert_eq!(store.get("key1").await, Some("value1".to_string()));
        assert!(store.exists("key1").await);
        assert!(!store.exists("nonexistent").await);

        assert!(store.delete("key1").await);
        assert!(!store.delete("key1").await); // Already deleted
        assert_eq!(store.get("key1").await, None);
    }

    #[tokio::test]
    async fn test_set_validation() {
        let store = MemoryStore::new();

        store.set("plain".to_string(), "unquoted".to_string()).await.unwrap();
        store.set("quoted".to_string(), "\"1 2\"".to_string()).await.unwrap();
        assert_eq!(store.get("quoted").await, Some("\"1 2\"".to_string()));

        let err = store.set("bad".to_string(), "1 2".to_string()).await.unwrap_err();
        assert_eq!(err, StoreError::InvalidValue);
        assert_eq!(err.to_string(), "ERR syntax error: Value should be enclosed in quotes");

        // Only one side quoted is still rejected
        assert!(store.set("bad".to_string(), "\"1 2".to_string()).await.is_err());
        assert!(!store.exists("bad").await);
    }

    #[test]
    fn test_is_valid_value() {
        assert!(is_valid_value(""));
        assert!(is_valid_value("abc"));
        assert!(is_valid_value("\"abc"));
        assert!(is_valid_value("\" \""));
        assert!(!is_valid_value(" "));
        assert!(!is_valid_value("a b\""));
    }

    #[tokio::test]
    async fn test_increment() {
        let store = MemoryStore::new();

        assert_eq!(store.increment("counter", 5).await, Ok(5));
        assert_eq!(store.get("counter").await, Some("5".to_string()));
        assert_eq!(store.increment("counter", -7).await, Ok(-2));
        assert_eq!(store.get("counter").await, Some("-2".to_string()));
    }

    #[tokio::test]
    async fn test_increment_rejects_non_integer() {
        let store = MemoryStore::new();
        store.set("word".to_string(), "hello".to_string()).await.unwrap();

        assert_eq!(store.increment("word", 1).await, Err(StoreError::NotAnInteger));
        assert_eq!(store.get("word").await, Some("hello".to_string()));
    }

    #[tokio::test]
    async fn test_increment_overflow_leaves_value() {
        let store = MemoryStore::new();
        store.set("big".to_string(), i64::MAX.to_string()).await.unwrap();

        assert_eq!(store.increment("big", 1).await, Err(StoreError::Overflow));
        assert_eq!(store.get("big").await, Some(i64::MAX.to_string()));
    }

    #[tokio::test]
    async fn test_concurrent_increments() {
        let store = Arc::new(MemoryStore::new());
        let mut handles = vec![];

        for _ in 0..100 {
            let store_clone = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store_clone.increment("hits", 1).await.unwrap();
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.get("hits").await, Some("100".to_string()));
    }

    #[tokio::test]
    async fn test_concurrent_access() {
        let store = Arc::new(MemoryStore::new());
        let mut handles = vec![];

        for i in 0..10 {
            let store_clone = Arc::clone(&store);
            let handle = tokio::spawn(async move {
                let key = format!("key{}", i);
                let value = format!("value{}", i);
                store_clone.set(key.clone(), value.clone()).await.unwrap();
                assert_eq!(store_clone.get(&key).await, Some(value));
            });
            handles.push(handle);
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len().await, 10);
    }
}
