// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Client for BetterConfig remote configuration documents.
//!
//! A [`BetterConfigClient`] downloads a flat JSON document from the
//! BetterConfig CDN and serves typed reads from it. How fresh a read is
//! depends on the [`RefreshPolicy`] the client was built with: background
//! polling, an expiring cache, or a fetch on every read.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod parser;
pub mod policy;
pub mod sync_bridge;

pub use cache::{ConfigCache, InMemoryConfigCache};
pub use client::{BetterConfigClient, BetterConfigClientBuilder};
pub use config::{ClientConfig, RefreshMode};
pub use error::{CacheError, Error, ParseError};
pub use fetcher::{ConfigFetcher, FetchResponse};
pub use http::HttpOptions;
pub use parser::SettingValue;
pub use policy::{
    AutoPollingPolicy, AutoPollingPolicyBuilder, ExpiringCachePolicy, ExpiringCachePolicyBuilder,
    ManualPollingPolicy, PolicyCore, PolicyFactory, RefreshPolicy,
};
pub use sync_bridge::SyncBridge;
