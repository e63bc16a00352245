// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Blocking access to the asynchronous refresh policies.
//!
//! The bridge spawns the policy call on the client runtime and parks the
//! calling thread on its join handle, optionally bounded by a timeout. Timing
//! out only stops the wait: the spawned call keeps running and may still
//! update the cache.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinError;
use tracing::error;

use crate::policy::RefreshPolicy;

/// Reason a bridged call produced no value.
#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("no result within {0:?}")]
    Timeout(Duration),
    #[error("task did not complete: {0}")]
    Task(#[from] JoinError),
}

/// Turns policy futures into bounded blocking calls.
#[derive(Debug, Clone)]
pub struct SyncBridge {
    runtime: Handle,
    max_wait: Option<Duration>,
}

impl SyncBridge {
    /// A zero `max_wait` waits without bound.
    pub fn new(runtime: Handle, max_wait: Duration) -> Self {
        Self {
            runtime,
            max_wait: (!max_wait.is_zero()).then_some(max_wait),
        }
    }

    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait
    }

    /// Runs `future` on the runtime and blocks the current thread for its output.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context, like
    /// every blocking tokio entry point.
    pub fn wait<F>(&self, future: F) -> Result<F::Output, WaitError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let task = self.runtime.spawn(future);
        let max_wait = self.max_wait;
        self.runtime.block_on(async move {
            match max_wait {
                Some(limit) => match tokio::time::timeout(limit, task).await {
                    Ok(joined) => joined.map_err(WaitError::Task),
                    Err(_) => Err(WaitError::Timeout(limit)),
                },
                None => task.await.map_err(WaitError::Task),
            }
        })
    }

    /// Reads the current document, falling back to the cached one on timeout.
    pub fn get_configuration_json(&self, policy: &Arc<dyn RefreshPolicy>) -> Option<String> {
        let reader = Arc::clone(policy);
        match self.wait(async move { reader.get_configuration_json().await }) {
            Ok(config) => config,
            Err(err) => {
                error!(error = %err, "betterconfig configuration read did not complete, serving latest cached value");
                policy.latest_cached_value()
            }
        }
    }

    /// Forces a refresh, giving up the wait after `max_wait`.
    pub fn refresh(&self, policy: &Arc<dyn RefreshPolicy>) {
        let policy = Arc::clone(policy);
        if let Err(err) = self.wait(async move { policy.refresh().await }) {
            error!(error = %err, "betterconfig refresh did not complete");
        }
    }
}
