// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::any::Any;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{PolicyCore, RefreshPolicy};
use crate::cache::ConfigCache;
use crate::error::Error;
use crate::fetcher::ConfigFetcher;

/// Poll period used when none is configured.
pub const DEFAULT_AUTO_POLL_RATE: Duration = Duration::from_secs(60);
/// Shortest accepted poll period.
pub const MIN_AUTO_POLL_RATE: Duration = Duration::from_secs(2);

/// Configures an [`AutoPollingPolicy`].
#[derive(Debug, Clone)]
pub struct AutoPollingPolicyBuilder {
    auto_poll_rate: Duration,
}

impl Default for AutoPollingPolicyBuilder {
    fn default() -> Self {
        Self {
            auto_poll_rate: DEFAULT_AUTO_POLL_RATE,
        }
    }
}

impl AutoPollingPolicyBuilder {
    /// Sets how often the configuration is fetched in the background.
    pub fn auto_poll_rate_in_seconds(mut self, seconds: u64) -> Result<Self, Error> {
        let rate = Duration::from_secs(seconds);
        if rate < MIN_AUTO_POLL_RATE {
            return Err(Error::invalid_argument(
                "auto_poll_rate_in_seconds cannot be less than 2 seconds",
            ));
        }
        self.auto_poll_rate = rate;
        Ok(self)
    }

    /// Starts polling immediately on the fetcher's runtime.
    pub fn build(self, fetcher: ConfigFetcher, cache: Arc<dyn ConfigCache>) -> AutoPollingPolicy {
        AutoPollingPolicy::start(fetcher, cache, self.auto_poll_rate)
    }
}

#[derive(Debug)]
struct PollerShared {
    core: PolicyCore,
    initialized: watch::Sender<bool>,
}

impl PollerShared {
    async fn poll(&self) {
        let response = self.core.fetch_and_store().await;
        if response.is_failed() {
            return;
        }
        let first = self.initialized.send_if_modified(|initialized| {
            let first = !*initialized;
            *initialized = true;
            first
        });
        if first {
            info!("betterconfig auto-poll initialized");
        }
    }

    async fn run(self: Arc<Self>, rate: Duration, shutdown: CancellationToken) {
        let mut ticker = interval(rate);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("betterconfig auto-poll shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        _ = self.poll() => {}
                    }
                }
            }
        }
    }
}

/// Policy refreshing the cache from a background task at a fixed rate.
///
/// Reads never wait for a fetch once the first poll succeeded; before that
/// they wait for it (or for [`RefreshPolicy::close`]).
#[derive(Debug)]
pub struct AutoPollingPolicy {
    shared: Arc<PollerShared>,
    initialized: watch::Receiver<bool>,
    shutdown: CancellationToken,
    poller: Mutex<Option<JoinHandle<()>>>,
    auto_poll_rate: Duration,
}

impl AutoPollingPolicy {
    pub fn builder() -> AutoPollingPolicyBuilder {
        AutoPollingPolicyBuilder::default()
    }

    fn start(fetcher: ConfigFetcher, cache: Arc<dyn ConfigCache>, rate: Duration) -> Self {
        let runtime = fetcher.runtime().clone();
        let (initialized_tx, initialized) = watch::channel(false);
        let shared = Arc::new(PollerShared {
            core: PolicyCore::new(fetcher, cache),
            initialized: initialized_tx,
        });
        let shutdown = CancellationToken::new();
        let poller = runtime.spawn(Arc::clone(&shared).run(rate, shutdown.clone()));
        debug!(rate_secs = rate.as_secs(), "betterconfig auto-poll started");

        Self {
            shared,
            initialized,
            shutdown,
            poller: Mutex::new(Some(poller)),
            auto_poll_rate: rate,
        }
    }

    pub fn auto_poll_rate(&self) -> Duration {
        self.auto_poll_rate
    }

    /// Whether a poll completed without failure yet.
    pub fn is_initialized(&self) -> bool {
        *self.initialized.borrow()
    }
}

#[async_trait]
impl RefreshPolicy for AutoPollingPolicy {
    async fn get_configuration_json(&self) -> Option<String> {
        if self.shared.core.is_closed() {
            warn!("betterconfig read on a closed auto-poll policy");
            return None;
        }
        if self.is_initialized() {
            return self.shared.core.cached();
        }

        let mut initialized = self.initialized.clone();
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {}
            _ = initialized.wait_for(|ready| *ready) => {}
        }
        self.shared.core.cached()
    }

    async fn close(&self) {
        self.shutdown.cancel();
        let poller = self.poller.lock().ok().and_then(|mut guard| guard.take());
        if let Some(poller) = poller {
            poller.abort();
            let _ = poller.await;
        }
        self.shared.core.close();
    }

    fn core(&self) -> &PolicyCore {
        &self.shared.core
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for AutoPollingPolicy {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
