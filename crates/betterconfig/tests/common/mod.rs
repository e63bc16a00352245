// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Common test utilities for integration tests

#![allow(dead_code)]

pub mod mock_server;

use std::sync::Arc;

use betterconfig::{ConfigCache, ConfigFetcher, InMemoryConfigCache};
use reqwest::Client;
use tokio::runtime::{Builder, Handle, Runtime};

/// Fetcher on the current runtime pointed at a mock server URL
pub fn fetcher_for(url: &str) -> ConfigFetcher {
    let fetcher = ConfigFetcher::new(Client::new(), "", Handle::current());
    fetcher.set_url(url);
    fetcher
}

pub fn in_memory_cache() -> Arc<dyn ConfigCache> {
    Arc::new(InMemoryConfigCache::new())
}

/// Runtime hosting the mock server of blocking tests
pub fn server_runtime() -> Runtime {
    Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .expect("Failed to build server runtime")
}
