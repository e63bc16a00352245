// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::str::FromStr;
use std::sync::Arc;

use crate::cache::ConfigCache;
use crate::client::{BetterConfigClient, BetterConfigClientBuilder};
use crate::error::Error;
use crate::fetcher::ConfigFetcher;
use crate::policy::{
    AutoPollingPolicy, ExpiringCachePolicy, ManualPollingPolicy, RefreshPolicy,
    DEFAULT_AUTO_POLL_RATE, DEFAULT_CACHE_REFRESH_INTERVAL,
};

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Refresh policy selected by [`ClientConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshMode {
    #[default]
    AutoPoll,
    Expiring,
    Manual,
}

impl FromStr for RefreshMode {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "auto" | "auto_poll" | "autopoll" => Ok(Self::AutoPoll),
            "expiring" | "lazy" => Ok(Self::Expiring),
            "manual" => Ok(Self::Manual),
            other => Err(Error::invalid_argument(format!(
                "invalid refresh mode '{other}'. Must be one of: auto, expiring, manual"
            ))),
        }
    }
}

/// Client settings read from the environment.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Project secret identifying the configuration document
    pub project_secret: String,
    /// Base URL replacing the CDN
    pub base_url: Option<String>,
    pub refresh_mode: RefreshMode,
    /// Auto-poll period in seconds
    pub poll_interval_secs: u64,
    /// Expiring-cache window in seconds
    pub cache_refresh_interval_secs: u64,
    /// Expiring-cache reloads in background
    pub async_refresh: bool,
    /// Bound of synchronous reads in seconds, 0 for none
    pub max_wait_secs: u64,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            project_secret: String::new(),
            base_url: None,
            refresh_mode: RefreshMode::default(),
            poll_interval_secs: DEFAULT_AUTO_POLL_RATE.as_secs(),
            cache_refresh_interval_secs: DEFAULT_CACHE_REFRESH_INTERVAL.as_secs(),
            async_refresh: false,
            max_wait_secs: 0,
            log_level: "info".to_string(),
        }
    }
}

impl ClientConfig {
    /// Create configuration from `BETTERCONFIG_*` environment variables
    pub fn from_env() -> Result<Self, Error> {
        let defaults = Self::default();

        let project_secret = env::var("BETTERCONFIG_PROJECT_SECRET").unwrap_or_default();
        let base_url = env::var("BETTERCONFIG_BASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        let refresh_mode = match env::var("BETTERCONFIG_REFRESH_MODE") {
            Ok(mode) => mode.parse()?,
            Err(_) => defaults.refresh_mode,
        };
        let poll_interval_secs = env_secs("BETTERCONFIG_POLL_INTERVAL")?
            .unwrap_or(defaults.poll_interval_secs);
        let cache_refresh_interval_secs = env_secs("BETTERCONFIG_CACHE_REFRESH_INTERVAL")?
            .unwrap_or(defaults.cache_refresh_interval_secs);
        let async_refresh = env::var("BETTERCONFIG_ASYNC_REFRESH")
            .map(|val| val.eq_ignore_ascii_case("true"))
            .unwrap_or(defaults.async_refresh);
        let max_wait_secs = env_secs("BETTERCONFIG_MAX_WAIT")?.unwrap_or(defaults.max_wait_secs);
        let log_level = env::var("BETTERCONFIG_LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or(defaults.log_level);

        let config = Self {
            project_secret,
            base_url,
            refresh_mode,
            poll_interval_secs,
            cache_refresh_interval_secs,
            async_refresh,
            max_wait_secs,
            log_level,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), Error> {
        if self.project_secret.trim().is_empty() {
            return Err(Error::invalid_argument(
                "BETTERCONFIG_PROJECT_SECRET cannot be empty",
            ));
        }

        // Range checks are owned by the builders
        self.client_builder()?;

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(Error::invalid_argument(format!(
                "invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }

    /// Returns a builder carrying every setting of this configuration.
    pub fn client_builder(&self) -> Result<BetterConfigClientBuilder, Error> {
        let mut builder = BetterConfigClient::builder();
        if let Some(base_url) = &self.base_url {
            builder = builder.base_url_override(base_url.clone());
        }
        if self.max_wait_secs != 0 {
            builder = builder.max_wait_time_for_sync_calls_in_seconds(self.max_wait_secs)?;
        }

        let builder = match self.refresh_mode {
            RefreshMode::AutoPoll => {
                let policy =
                    AutoPollingPolicy::builder().auto_poll_rate_in_seconds(self.poll_interval_secs)?;
                builder.refresh_policy(
                    move |fetcher: ConfigFetcher, cache: Arc<dyn ConfigCache>| -> Box<dyn RefreshPolicy> {
                        Box::new(policy.build(fetcher, cache))
                    },
                )
            }
            RefreshMode::Expiring => {
                let policy = ExpiringCachePolicy::builder()
                    .cache_refresh_interval_in_seconds(self.cache_refresh_interval_secs)?
                    .async_refresh(self.async_refresh);
                builder.refresh_policy(
                    move |fetcher: ConfigFetcher, cache: Arc<dyn ConfigCache>| -> Box<dyn RefreshPolicy> {
                        Box::new(policy.build(fetcher, cache))
                    },
                )
            }
            RefreshMode::Manual => builder.refresh_policy(
                |fetcher: ConfigFetcher, cache: Arc<dyn ConfigCache>| -> Box<dyn RefreshPolicy> {
                    Box::new(ManualPollingPolicy::new(fetcher, cache))
                },
            ),
        };
        Ok(builder)
    }

    pub fn build_client(&self) -> Result<BetterConfigClient, Error> {
        self.client_builder()?.build(&self.project_secret)
    }
}

fn env_secs(name: &str) -> Result<Option<u64>, Error> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| Error::invalid_argument(format!("{name} must be a number of seconds"))),
        Err(_) => Ok(None),
    }
}
