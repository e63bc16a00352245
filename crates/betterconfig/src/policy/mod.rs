// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Refresh policies.
//!
//! A policy binds a [`ConfigFetcher`] to a [`ConfigCache`] and decides when a
//! read triggers a fetch and which document the read observes. Three variants
//! ship with the crate:
//!
//! - [`AutoPollingPolicy`] polls in the background; reads only wait for the
//!   first successful poll.
//! - [`ExpiringCachePolicy`] reloads on read once the cached document is older
//!   than the configured interval, either blocking the reader or in background.
//! - [`ManualPollingPolicy`] fetches on every read.

use std::any::Any;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::cache::{ConfigCache, GuardedCache};
use crate::fetcher::{ConfigFetcher, FetchResponse};

mod auto_poll;
mod expiring;
mod manual;

pub use auto_poll::{
    AutoPollingPolicy, AutoPollingPolicyBuilder, DEFAULT_AUTO_POLL_RATE, MIN_AUTO_POLL_RATE,
};
pub use expiring::{
    ExpiringCachePolicy, ExpiringCachePolicyBuilder, DEFAULT_CACHE_REFRESH_INTERVAL,
    MIN_CACHE_REFRESH_INTERVAL,
};
pub use manual::ManualPollingPolicy;

/// Builds the refresh policy of a client from its fetcher and cache.
pub type PolicyFactory =
    Box<dyn FnOnce(ConfigFetcher, Arc<dyn ConfigCache>) -> Box<dyn RefreshPolicy> + Send>;

/// Capability set shared by every refresh policy.
#[async_trait]
pub trait RefreshPolicy: Send + Sync + Debug + 'static {
    /// Returns the document the policy currently considers current.
    ///
    /// `None` means no document is available yet (or the policy is closed).
    async fn get_configuration_json(&self) -> Option<String>;

    /// Fetches once and stores the result when it differs from the cache.
    async fn refresh(&self) {
        self.core().refresh().await;
    }

    /// Returns whatever the cache holds without triggering a fetch.
    fn latest_cached_value(&self) -> Option<String> {
        self.core().cached()
    }

    /// Drops the cached document.
    fn invalidate_cache(&self) {
        self.core().invalidate();
    }

    /// Stops background work and closes the fetcher and the cache.
    async fn close(&self) {
        self.core().close();
    }

    /// Fetcher and cache shared by all policies.
    fn core(&self) -> &PolicyCore;

    /// Enables downcasting to the concrete policy.
    fn as_any(&self) -> &dyn Any;
}

/// Fetcher and fault-absorbing cache owned by a policy.
#[derive(Debug)]
pub struct PolicyCore {
    fetcher: ConfigFetcher,
    cache: GuardedCache,
    closed: AtomicBool,
}

impl PolicyCore {
    pub fn new(fetcher: ConfigFetcher, cache: Arc<dyn ConfigCache>) -> Self {
        Self {
            fetcher,
            cache: GuardedCache::new(cache),
            closed: AtomicBool::new(false),
        }
    }

    pub fn fetcher(&self) -> &ConfigFetcher {
        &self.fetcher
    }

    /// Returns the cached document; cache faults read as the last written value.
    pub fn cached(&self) -> Option<String> {
        self.cache.get()
    }

    /// Fetches once, writing a fetched document that differs from the cache.
    pub async fn fetch_and_store(&self) -> FetchResponse {
        let response = self.fetcher.fetch().await;
        if let FetchResponse::Fetched(config) = &response {
            if self.cache.store_if_changed(config) {
                debug!("betterconfig cache updated with new configuration");
            }
        }
        response
    }

    pub async fn refresh(&self) {
        if self.is_closed() {
            debug!("betterconfig refresh skipped, policy is closed");
            return;
        }
        self.fetch_and_store().await;
    }

    pub fn invalidate(&self) {
        self.cache.invalidate();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Closes the fetcher and the cache once; returns `false` when already closed.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.fetcher.close();
        self.cache.close();
        true
    }
}
