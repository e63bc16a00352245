// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Storage for the last known good configuration document.

use std::fmt::Debug;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tracing::error;

use crate::error::CacheError;

/// Cache API used to plug custom storage behind the client.
///
/// Implementations may fail; the refresh policies absorb every error and keep
/// serving the value they last wrote.
pub trait ConfigCache: Send + Sync + Debug {
    /// Returns the cached document, `None` when nothing was stored yet.
    fn get(&self) -> Result<Option<String>, CacheError>;

    /// Replaces the cached document.
    fn set(&self, value: String) -> Result<(), CacheError>;

    /// Drops the cached document.
    fn invalidate(&self) -> Result<(), CacheError>;

    /// Releases resources owned by the cache.
    fn close(&self) {}
}

/// Default cache keeping the document in a single atomic slot.
#[derive(Debug, Default)]
pub struct InMemoryConfigCache {
    value: ArcSwapOption<String>,
}

impl InMemoryConfigCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigCache for InMemoryConfigCache {
    fn get(&self) -> Result<Option<String>, CacheError> {
        Ok(self.value.load_full().map(|value| value.as_ref().clone()))
    }

    fn set(&self, value: String) -> Result<(), CacheError> {
        self.value.store(Some(Arc::new(value)));
        Ok(())
    }

    fn invalidate(&self) -> Result<(), CacheError> {
        self.value.store(None);
        Ok(())
    }
}

/// Fault-absorbing view over a user supplied [`ConfigCache`].
///
/// Every successful write is mirrored into a local slot, which answers reads
/// whenever the wrapped cache fails.
#[derive(Debug)]
pub(crate) struct GuardedCache {
    cache: Arc<dyn ConfigCache>,
    last_written: ArcSwapOption<String>,
}

impl GuardedCache {
    pub(crate) fn new(cache: Arc<dyn ConfigCache>) -> Self {
        Self {
            cache,
            last_written: ArcSwapOption::empty(),
        }
    }

    pub(crate) fn get(&self) -> Option<String> {
        match self.cache.get() {
            Ok(value) => value,
            Err(err) => {
                error!(error = %err, "betterconfig cache read failed, serving in-memory copy");
                self.last_written
                    .load_full()
                    .map(|value| value.as_ref().clone())
            }
        }
    }

    pub(crate) fn set(&self, value: String) {
        self.last_written.store(Some(Arc::new(value.clone())));
        if let Err(err) = self.cache.set(value) {
            error!(error = %err, "betterconfig cache write failed");
        }
    }

    /// Writes `config` when it differs from the cached document.
    ///
    /// Returns whether a write happened.
    pub(crate) fn store_if_changed(&self, config: &str) -> bool {
        if self.get().as_deref() == Some(config) {
            return false;
        }
        self.set(config.to_owned());
        true
    }

    pub(crate) fn invalidate(&self) {
        self.last_written.store(None);
        if let Err(err) = self.cache.invalidate() {
            error!(error = %err, "betterconfig cache invalidation failed");
        }
    }

    pub(crate) fn close(&self) {
        self.cache.close();
    }
}

/// Cache whose every operation fails, used to check fault absorption.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct FailingCache;

#[cfg(test)]
impl ConfigCache for FailingCache {
    fn get(&self) -> Result<Option<String>, CacheError> {
        Err(CacheError("read refused".into()))
    }

    fn set(&self, _value: String) -> Result<(), CacheError> {
        Err(CacheError("write refused".into()))
    }

    fn invalidate(&self) -> Result<(), CacheError> {
        Err(CacheError("invalidate refused".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn in_memory_cache_starts_empty() {
        let cache = InMemoryConfigCache::new();
        assert_eq!(cache.get().expect("in-memory get"), None);
    }

    #[test]
    fn in_memory_cache_last_writer_wins() {
        let cache = InMemoryConfigCache::new();
        cache.set("first".into()).expect("in-memory set");
        cache.set("second".into()).expect("in-memory set");
        assert_eq!(cache.get().expect("in-memory get").as_deref(), Some("second"));

        cache.invalidate().expect("in-memory invalidate");
        assert_eq!(cache.get().expect("in-memory get"), None);
    }

    #[test]
    fn guarded_cache_writes_only_changes() {
        let guarded = GuardedCache::new(Arc::new(InMemoryConfigCache::new()));
        assert!(guarded.store_if_changed("{\"a\":1}"));
        assert!(!guarded.store_if_changed("{\"a\":1}"));
        assert!(guarded.store_if_changed("{\"a\":2}"));
        assert_eq!(guarded.get().as_deref(), Some("{\"a\":2}"));
    }

    #[test]
    #[traced_test]
    fn guarded_cache_serves_memory_copy_when_cache_fails() {
        let guarded = GuardedCache::new(Arc::new(FailingCache));
        assert_eq!(guarded.get(), None);

        guarded.set("test".into());
        assert_eq!(guarded.get().as_deref(), Some("test"));
        assert!(logs_contain("betterconfig cache write failed"));
        assert!(logs_contain("betterconfig cache read failed"));

        guarded.invalidate();
        assert_eq!(guarded.get(), None);
    }
}
