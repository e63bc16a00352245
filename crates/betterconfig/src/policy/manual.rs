// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::{PolicyCore, RefreshPolicy};
use crate::cache::ConfigCache;
use crate::fetcher::{ConfigFetcher, FetchResponse};

/// Policy fetching the configuration on every read.
///
/// Reads return the fetched document, or the cached one when the server
/// answered `304` or the fetch failed.
#[derive(Debug)]
pub struct ManualPollingPolicy {
    core: PolicyCore,
}

impl ManualPollingPolicy {
    pub fn new(fetcher: ConfigFetcher, cache: Arc<dyn ConfigCache>) -> Self {
        Self {
            core: PolicyCore::new(fetcher, cache),
        }
    }
}

#[async_trait]
impl RefreshPolicy for ManualPollingPolicy {
    async fn get_configuration_json(&self) -> Option<String> {
        if self.core.is_closed() {
            warn!("betterconfig read on a closed manual policy");
            return None;
        }
        match self.core.fetch_and_store().await {
            FetchResponse::Fetched(config) => Some(config),
            FetchResponse::NotModified | FetchResponse::Failed => self.core.cached(),
        }
    }

    fn core(&self) -> &PolicyCore {
        &self.core
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
