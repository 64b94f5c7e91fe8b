//! The `localStorage` global.

use indexmap::IndexMap;
use reprise_core::{EngineError, EngineResult};
use std::cell::RefCell;

/// Ordered string key/value storage
pub trait StorageApi {
    /// Number of keys
    ///
    /// # Errors
    ///
    /// Returns error if the backing store is unavailable
    fn length(&self) -> EngineResult<usize>;

    /// Key at `index` in insertion order
    ///
    /// # Errors
    ///
    /// Returns error if the backing store is unavailable
    fn key(&self, index: usize) -> EngineResult<Option<String>>;

    /// Value stored under `key`
    ///
    /// # Errors
    ///
    /// Returns error if the backing store is unavailable
    fn get_item(&self, key: &str) -> EngineResult<Option<String>>;

    /// Store `value` under `key`
    ///
    /// # Errors
    ///
    /// Returns error if the backing store is unavailable
    fn set_item(&self, key: &str, value: &str) -> EngineResult<()>;

    /// Remove `key`
    ///
    /// # Errors
    ///
    /// Returns error if the backing store is unavailable
    fn remove_item(&self, key: &str) -> EngineResult<()>;

    /// Remove every key
    ///
    /// # Errors
    ///
    /// Returns error if the backing store is unavailable
    fn clear(&self) -> EngineResult<()>;
}

/// In-memory storage preserving insertion order
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RefCell<IndexMap<String, String>>,
}

impl MemoryStorage {
    /// Empty storage
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> EngineResult<std::cell::RefMut<'_, IndexMap<String, String>>> {
        self.items
            .try_borrow_mut()
            .map_err(|_| EngineError::invalid_state("storage is busy"))
    }
}

impl StorageApi for MemoryStorage {
    fn length(&self) -> EngineResult<usize> {
        Ok(self.items()?.len())
    }

    fn key(&self, index: usize) -> EngineResult<Option<String>> {
        Ok(self.items()?.get_index(index).map(|(k, _)| k.clone()))
    }

    fn get_item(&self, key: &str) -> EngineResult<Option<String>> {
        Ok(self.items()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> EngineResult<()> {
        self.items()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> EngineResult<()> {
        self.items()?.shift_remove(key);
        Ok(())
    }

    fn clear(&self) -> EngineResult<()> {
        self.items()?.clear();
        Ok(())
    }
}
