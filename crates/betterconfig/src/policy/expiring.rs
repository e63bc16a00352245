// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{PolicyCore, RefreshPolicy};
use crate::cache::ConfigCache;
use crate::error::Error;
use crate::fetcher::{ConfigFetcher, FetchResponse};

/// Expiry window used when none is configured.
pub const DEFAULT_CACHE_REFRESH_INTERVAL: Duration = Duration::from_secs(60);
/// Shortest accepted expiry window.
pub const MIN_CACHE_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Configures an [`ExpiringCachePolicy`].
#[derive(Debug, Clone)]
pub struct ExpiringCachePolicyBuilder {
    cache_refresh_interval: Duration,
    async_refresh: bool,
}

impl Default for ExpiringCachePolicyBuilder {
    fn default() -> Self {
        Self {
            cache_refresh_interval: DEFAULT_CACHE_REFRESH_INTERVAL,
            async_refresh: false,
        }
    }
}

impl ExpiringCachePolicyBuilder {
    /// Sets how long a cached document is served before a read reloads it.
    pub fn cache_refresh_interval_in_seconds(mut self, seconds: u64) -> Result<Self, Error> {
        let interval = Duration::from_secs(seconds);
        if interval < MIN_CACHE_REFRESH_INTERVAL {
            return Err(Error::invalid_argument(
                "cache_refresh_interval_in_seconds cannot be less than 1 second",
            ));
        }
        self.cache_refresh_interval = interval;
        Ok(self)
    }

    /// When enabled, expired reads return the stale document and reload in background.
    pub fn async_refresh(mut self, async_refresh: bool) -> Self {
        self.async_refresh = async_refresh;
        self
    }

    pub fn build(self, fetcher: ConfigFetcher, cache: Arc<dyn ConfigCache>) -> ExpiringCachePolicy {
        ExpiringCachePolicy {
            inner: Arc::new(ExpiringInner {
                core: PolicyCore::new(fetcher, cache),
                refresh_interval: self.cache_refresh_interval,
                async_refresh: self.async_refresh,
                written_at: ArcSwapOption::empty(),
                reload_lock: Arc::new(Mutex::new(())),
                shutdown: CancellationToken::new(),
            }),
        }
    }
}

#[derive(Debug)]
struct ExpiringInner {
    core: PolicyCore,
    refresh_interval: Duration,
    async_refresh: bool,
    /// Completion time of the last reload that produced a document.
    written_at: ArcSwapOption<Instant>,
    /// Held for the whole duration of a reload.
    reload_lock: Arc<Mutex<()>>,
    shutdown: CancellationToken,
}

impl ExpiringInner {
    fn has_loaded(&self) -> bool {
        self.written_at.load().is_some()
    }

    fn is_expired(&self) -> bool {
        match self.written_at.load().as_deref() {
            Some(written_at) => written_at.elapsed() >= self.refresh_interval,
            None => true,
        }
    }

    /// Reloads while holding the reload lock, unless a concurrent reader already did.
    async fn reload_blocking(&self) -> Option<String> {
        let _guard = self.reload_lock.lock().await;
        // close() may have run while this reader waited for the lock.
        if self.core.is_closed() {
            warn!("betterconfig read on a closed expiring-cache policy");
            return None;
        }
        if !self.is_expired() {
            return self.core.cached();
        }
        self.reload().await
    }

    /// Caller must hold `reload_lock`.
    async fn reload(&self) -> Option<String> {
        let response = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => FetchResponse::Failed,
            response = self.core.fetch_and_store() => response,
        };
        let value = match response {
            FetchResponse::Fetched(config) => Some(config),
            FetchResponse::NotModified | FetchResponse::Failed => self.core.cached(),
        };
        // Nothing to serve means the next read has to try again.
        if value.is_some() {
            self.written_at.store(Some(Arc::new(Instant::now())));
        }
        value
    }
}

/// Policy reloading the cached document on read once it expired.
#[derive(Debug)]
pub struct ExpiringCachePolicy {
    inner: Arc<ExpiringInner>,
}

impl ExpiringCachePolicy {
    pub fn builder() -> ExpiringCachePolicyBuilder {
        ExpiringCachePolicyBuilder::default()
    }

    pub fn cache_refresh_interval(&self) -> Duration {
        self.inner.refresh_interval
    }

    pub fn is_async_refresh(&self) -> bool {
        self.inner.async_refresh
    }

    fn spawn_background_reload(&self) {
        let guard = match Arc::clone(&self.inner.reload_lock).try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("betterconfig reload already in flight, serving stale configuration");
                return;
            }
        };
        let inner = Arc::clone(&self.inner);
        self.inner.core.fetcher().runtime().spawn(async move {
            let _guard = guard;
            if inner.is_expired() {
                inner.reload().await;
            }
        });
    }
}

#[async_trait]
impl RefreshPolicy for ExpiringCachePolicy {
    async fn get_configuration_json(&self) -> Option<String> {
        if self.inner.core.is_closed() {
            warn!("betterconfig read on a closed expiring-cache policy");
            return None;
        }
        if !self.inner.is_expired() {
            return self.inner.core.cached();
        }
        if self.inner.async_refresh && self.inner.has_loaded() {
            self.spawn_background_reload();
            return self.inner.core.cached();
        }
        self.inner.reload_blocking().await
    }

    async fn refresh(&self) {
        if self.inner.core.is_closed() {
            debug!("betterconfig refresh skipped, policy is closed");
            return;
        }
        let _guard = self.inner.reload_lock.lock().await;
        self.inner.reload().await;
    }

    fn invalidate_cache(&self) {
        self.inner.written_at.store(None);
        self.inner.core.invalidate();
    }

    async fn close(&self) {
        self.inner.shutdown.cancel();
        // Waits for an in-flight reload to observe the cancellation.
        let _guard = self.inner.reload_lock.lock().await;
        self.inner.core.close();
    }

    fn core(&self) -> &PolicyCore {
        &self.inner.core
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
