// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Client facade wiring fetcher, cache, refresh policy and sync bridge.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, error};

use crate::cache::{ConfigCache, InMemoryConfigCache};
use crate::error::Error;
use crate::fetcher::{config_url_with_base, ConfigFetcher};
use crate::http::{self, HttpOptions};
use crate::parser::{self, SettingValue};
use crate::policy::{AutoPollingPolicy, PolicyFactory, RefreshPolicy};
use crate::sync_bridge::SyncBridge;

/// Shortest accepted bound for synchronous calls.
pub const MIN_MAX_WAIT_TIME_FOR_SYNC_CALLS: Duration = Duration::from_secs(2);

const RUNTIME_WORKER_THREADS: usize = 2;

/// Configures a [`BetterConfigClient`].
pub struct BetterConfigClientBuilder {
    http_client: Option<Client>,
    http_options: HttpOptions,
    cache: Option<Arc<dyn ConfigCache>>,
    refresh_policy: Option<PolicyFactory>,
    max_wait_time_for_sync_calls: Duration,
    base_url_override: Option<String>,
    runtime_handle: Option<Handle>,
}

impl fmt::Debug for BetterConfigClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BetterConfigClientBuilder")
            .field("http_client", &self.http_client)
            .field("http_options", &self.http_options)
            .field("cache", &self.cache)
            .field("refresh_policy", &self.refresh_policy.is_some())
            .field(
                "max_wait_time_for_sync_calls",
                &self.max_wait_time_for_sync_calls,
            )
            .field("base_url_override", &self.base_url_override)
            .field("runtime_handle", &self.runtime_handle.is_some())
            .finish()
    }
}

impl Default for BetterConfigClientBuilder {
    fn default() -> Self {
        Self {
            http_client: None,
            http_options: HttpOptions::default(),
            cache: None,
            refresh_policy: None,
            max_wait_time_for_sync_calls: Duration::ZERO,
            base_url_override: None,
            runtime_handle: None,
        }
    }
}

impl BetterConfigClientBuilder {
    /// Uses `client` instead of building one from the [`HttpOptions`].
    pub fn http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn http_options(mut self, options: HttpOptions) -> Self {
        self.http_options = options;
        self
    }

    /// Replaces the default [`InMemoryConfigCache`].
    pub fn cache(mut self, cache: Arc<dyn ConfigCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sets the factory building the refresh policy; auto-polling by default.
    pub fn refresh_policy<F>(mut self, factory: F) -> Self
    where
        F: FnOnce(ConfigFetcher, Arc<dyn ConfigCache>) -> Box<dyn RefreshPolicy> + Send + 'static,
    {
        self.refresh_policy = Some(Box::new(factory));
        self
    }

    /// Bounds how long synchronous reads wait for the policy.
    ///
    /// Unbounded unless set; values below two seconds are rejected.
    pub fn max_wait_time_for_sync_calls_in_seconds(mut self, seconds: u64) -> Result<Self, Error> {
        let max_wait = Duration::from_secs(seconds);
        if max_wait < MIN_MAX_WAIT_TIME_FOR_SYNC_CALLS {
            return Err(Error::invalid_argument(
                "max_wait_time_for_sync_calls_in_seconds cannot be less than 2 seconds",
            ));
        }
        self.max_wait_time_for_sync_calls = max_wait;
        Ok(self)
    }

    /// Fetches `{base_url}/{project_secret}/config.json` instead of the CDN document.
    pub fn base_url_override(mut self, base_url: impl Into<String>) -> Self {
        self.base_url_override = Some(base_url.into());
        self
    }

    /// Runs requests and background polling on an existing multi-thread runtime.
    ///
    /// Without a handle the client starts and owns its own runtime.
    pub fn runtime_handle(mut self, handle: Handle) -> Self {
        self.runtime_handle = Some(handle);
        self
    }

    pub fn build(self, project_secret: &str) -> Result<BetterConfigClient, Error> {
        if project_secret.is_empty() {
            return Err(Error::invalid_argument("project_secret is null or empty"));
        }

        let (runtime, handle) = match self.runtime_handle {
            Some(handle) => (None, handle),
            None => {
                let runtime = Builder::new_multi_thread()
                    .worker_threads(RUNTIME_WORKER_THREADS)
                    .thread_name("betterconfig")
                    .enable_all()
                    .build()?;
                let handle = runtime.handle().clone();
                (Some(runtime), handle)
            }
        };

        let http = match self.http_client {
            Some(client) => client,
            None => http::create_http_client(&self.http_options)?,
        };
        let fetcher = ConfigFetcher::new(http, project_secret, handle.clone())
            .with_retry_on_connection_failure(self.http_options.retry_on_connection_failure);
        if let Some(base_url) = &self.base_url_override {
            fetcher.set_url(config_url_with_base(base_url, project_secret));
        }
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(InMemoryConfigCache::new()));

        // Auto-polling spawns its poller, so build policies inside the runtime context.
        let policy: Arc<dyn RefreshPolicy> = {
            let _entered = handle.enter();
            match self.refresh_policy {
                Some(factory) => Arc::from(factory(fetcher, cache)),
                None => Arc::new(AutoPollingPolicy::builder().build(fetcher, cache)),
            }
        };
        debug!(url = %policy.core().fetcher().url(), "betterconfig client created");

        Ok(BetterConfigClient {
            policy,
            bridge: SyncBridge::new(handle, self.max_wait_time_for_sync_calls),
            runtime,
        })
    }
}

/// Entry point for reading a BetterConfig configuration.
///
/// Every read exists in a blocking form, bounded by
/// `max_wait_time_for_sync_calls_in_seconds`, and in an `_async` form. Reads
/// never fail on transport or parse faults: they return the default value
/// passed by the caller instead.
///
/// The blocking forms panic when called from within an async context; use the
/// `_async` forms there.
pub struct BetterConfigClient {
    policy: Arc<dyn RefreshPolicy>,
    bridge: SyncBridge,
    runtime: Option<Runtime>,
}

impl fmt::Debug for BetterConfigClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BetterConfigClient")
            .field("policy", &self.policy)
            .field("bridge", &self.bridge)
            .field("owns_runtime", &self.runtime.is_some())
            .finish()
    }
}

impl BetterConfigClient {
    /// Builds a client with the default auto-polling policy.
    pub fn new(project_secret: &str) -> Result<Self, Error> {
        Self::builder().build(project_secret)
    }

    pub fn builder() -> BetterConfigClientBuilder {
        BetterConfigClientBuilder::default()
    }

    /// Returns the refresh policy as `T` when it is of that type.
    pub fn refresh_policy<T: RefreshPolicy>(&self) -> Option<&T> {
        self.policy.as_any().downcast_ref::<T>()
    }

    pub fn get_configuration_json_string(&self) -> Option<String> {
        self.bridge.get_configuration_json(&self.policy)
    }

    pub async fn get_configuration_json_string_async(&self) -> Option<String> {
        self.policy.get_configuration_json().await
    }

    /// Deserializes the whole document, returning `default` when unavailable.
    pub fn get_configuration<T: DeserializeOwned>(&self, default: T) -> T {
        configuration_or_default(self.get_configuration_json_string(), default)
    }

    pub async fn get_configuration_async<T: DeserializeOwned>(&self, default: T) -> T {
        configuration_or_default(self.get_configuration_json_string_async().await, default)
    }

    /// Reads `key` as `T`, returning `default` when it cannot be served.
    ///
    /// Only an empty `key` is an error.
    pub fn get_value<T: SettingValue>(&self, key: &str, default: T) -> Result<T, Error> {
        check_key(key)?;
        Ok(value_or_default(
            self.get_configuration_json_string(),
            key,
            default,
        ))
    }

    pub async fn get_value_async<T: SettingValue>(&self, key: &str, default: T) -> Result<T, Error> {
        check_key(key)?;
        Ok(value_or_default(
            self.get_configuration_json_string_async().await,
            key,
            default,
        ))
    }

    pub fn get_string_value(&self, key: &str, default: &str) -> Result<String, Error> {
        self.get_value(key, default.to_owned())
    }

    pub fn get_integer_value(&self, key: &str, default: i32) -> Result<i32, Error> {
        self.get_value(key, default)
    }

    pub fn get_double_value(&self, key: &str, default: f64) -> Result<f64, Error> {
        self.get_value(key, default)
    }

    pub fn get_boolean_value(&self, key: &str, default: bool) -> Result<bool, Error> {
        self.get_value(key, default)
    }

    /// Fetches the configuration now, waiting at most the sync-call bound.
    pub fn force_refresh(&self) {
        self.bridge.refresh(&self.policy);
    }

    pub async fn force_refresh_async(&self) {
        self.policy.refresh().await;
    }

    /// Drops the cached document; the next read goes back to the network.
    pub fn invalidate_cache(&self) {
        self.policy.invalidate_cache();
    }

    /// Stops background polling and closes the fetcher and the cache.
    ///
    /// Reads issued after `close` return their default value.
    pub fn close(&self) {
        let policy = Arc::clone(&self.policy);
        if let Err(err) = self.bridge.wait(async move { policy.close().await }) {
            error!(error = %err, "betterconfig close did not complete");
        }
    }

    pub async fn close_async(&self) {
        self.policy.close().await;
    }
}

impl Drop for BetterConfigClient {
    fn drop(&mut self) {
        self.policy.core().close();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

fn check_key(key: &str) -> Result<(), Error> {
    if key.is_empty() {
        return Err(Error::invalid_argument("key is null or empty"));
    }
    Ok(())
}

fn configuration_or_default<T: DeserializeOwned>(json: Option<String>, default: T) -> T {
    let Some(json) = json else {
        return default;
    };
    match parser::parse(&json) {
        Ok(value) => value,
        Err(err) => {
            error!(error = %err, "betterconfig configuration could not be parsed, returning default");
            default
        }
    }
}

fn value_or_default<T: SettingValue>(json: Option<String>, key: &str, default: T) -> T {
    let Some(json) = json else {
        return default;
    };
    match parser::parse_value(&json, key) {
        Ok(value) => value,
        Err(err) => {
            error!(key, error = %err, "betterconfig value could not be read, returning default");
            default
        }
    }
}
