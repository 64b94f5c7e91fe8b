//! `localStorage` snapshot and restore.
//!
//! Keys under the bookkeeping prefix belong to the engine and are never
//! captured, cleared or restored. An empty prefix reserves nothing.

use crate::context::{CaptureContext, NativeRefs, ReplayContext};
use crate::plugin::{Plugin, require_natives};
use reprise_core::EngineResult;
use reprise_host::StorageApi;
use reprise_log::StorageItem;
use tracing::debug;

fn is_bookkeeping(key: &str, prefix: &str) -> bool {
    !prefix.is_empty() && key.starts_with(prefix)
}

/// Every non-bookkeeping item, in enumeration order
///
/// # Errors
///
/// Returns error if storage cannot be read
pub fn snapshot(storage: &dyn StorageApi, prefix: &str) -> EngineResult<Vec<StorageItem>> {
    let mut items = Vec::new();
    for index in 0..storage.length()? {
        let Some(key) = storage.key(index)? else {
            continue;
        };
        if is_bookkeeping(&key, prefix) {
            continue;
        }
        if let Some(value) = storage.get_item(&key)? {
            items.push(StorageItem::new(key, value));
        }
    }
    Ok(items)
}

/// Replace every non-bookkeeping item with `items`
///
/// # Errors
///
/// Returns error if storage cannot be written
pub fn restore(storage: &dyn StorageApi, prefix: &str, items: &[StorageItem]) -> EngineResult<()> {
    let mut stale = Vec::new();
    for index in 0..storage.length()? {
        if let Some(key) = storage.key(index)? {
            if !is_bookkeeping(&key, prefix) {
                stale.push(key);
            }
        }
    }
    for key in &stale {
        storage.remove_item(key)?;
    }
    for item in items {
        storage.set_item(&item.key, &item.value)?;
    }
    debug!(removed = stale.len(), restored = items.len(), "restored storage");
    Ok(())
}

/// Captures storage contents and installs them before replay
pub struct StoragePlugin {
    natives: Option<NativeRefs>,
    /// Contents found before the replay, with the prefix in effect
    pre_replay: Option<(String, Vec<StorageItem>)>,
}

impl StoragePlugin {
    /// Create the plugin
    #[must_use]
    pub fn new() -> Self {
        Self {
            natives: None,
            pre_replay: None,
        }
    }
}

impl Default for StoragePlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for StoragePlugin {
    fn init(&mut self, natives: &NativeRefs) -> EngineResult<()> {
        self.natives = Some(natives.clone());
        Ok(())
    }

    fn capture(&mut self, cx: &CaptureContext) -> EngineResult<()> {
        let natives = require_natives(&self.natives)?;
        let items = snapshot(&*natives.storage, &cx.config.bookkeeping_prefix)?;
        debug!(items = items.len(), "captured storage");
        cx.log.record(|log| log.storage.state = items)
    }

    fn before_replay(&mut self, cx: &ReplayContext) -> EngineResult<()> {
        let natives = require_natives(&self.natives)?;
        let prefix = cx.config.bookkeeping_prefix().to_string();
        let current = snapshot(&*natives.storage, &prefix)?;
        let recorded = cx.log.read(|log| log.storage.state.clone())?;
        restore(&*natives.storage, &prefix, &recorded)?;
        self.pre_replay = Some((prefix, current));
        Ok(())
    }

    fn clean_up(&mut self) -> EngineResult<()> {
        let natives = require_natives(&self.natives)?;
        if let Some((prefix, items)) = self.pre_replay.take() {
            restore(&*natives.storage, &prefix, &items)?;
        }
        Ok(())
    }
}
