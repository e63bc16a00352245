// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Conditional-GET fetcher for the configuration document.
//!
//! The fetcher remembers the `ETag` of the last document it downloaded and
//! echoes it through `If-None-Match`, so an unchanged document costs a `304`
//! round trip. Every fault is absorbed into [`FetchResponse::Failed`]; callers
//! never see transport errors.

use std::sync::Arc;

use arc_swap::ArcSwap;
use reqwest::header::{ETAG, IF_NONE_MATCH, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::http;

/// CDN location under which every project publishes its configuration.
pub const CDN_BASE_URL: &str = "https://cdn.betterconfig.com/configuration-files/";
/// File name of the configuration document below the project directory.
const CONFIG_FILE_PATH: &str = "/config.json";

/// Outcome of a single configuration fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResponse {
    /// The server returned a new document.
    Fetched(String),
    /// The server confirmed the remembered `ETag` is still current.
    NotModified,
    /// Transport error, unexpected status or unreadable body.
    Failed,
}

impl FetchResponse {
    pub fn is_fetched(&self) -> bool {
        matches!(self, Self::Fetched(_))
    }

    pub fn is_not_modified(&self) -> bool {
        matches!(self, Self::NotModified)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Returns the fetched document, only present on [`FetchResponse::Fetched`].
    pub fn config(&self) -> Option<&str> {
        match self {
            Self::Fetched(config) => Some(config),
            _ => None,
        }
    }
}

/// Builds the CDN URL of the configuration document for a project.
pub fn config_url(project_secret: &str) -> String {
    config_url_with_base(CDN_BASE_URL, project_secret)
}

/// Builds the URL of the configuration document below another base URL.
pub fn config_url_with_base(base_url: &str, project_secret: &str) -> String {
    format!(
        "{}/{project_secret}{CONFIG_FILE_PATH}",
        base_url.trim_end_matches('/')
    )
}

#[derive(Debug)]
struct FetcherInner {
    http: Client,
    url: ArcSwap<String>,
    /// Guards the whole exchange so concurrent fetches observe etags in server order.
    etag: Mutex<Option<String>>,
    shutdown: CancellationToken,
}

/// Fetches the configuration document of one project.
///
/// Requests are executed on the runtime the fetcher was created with, which
/// lets callers await [`ConfigFetcher::fetch`] from any executor.
#[derive(Debug, Clone)]
pub struct ConfigFetcher {
    inner: Arc<FetcherInner>,
    runtime: Handle,
    retry_on_connection_failure: bool,
}

impl ConfigFetcher {
    /// Creates a fetcher targeting the CDN document of `project_secret`.
    pub fn new(http: Client, project_secret: &str, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(FetcherInner {
                http,
                url: ArcSwap::from_pointee(config_url(project_secret)),
                etag: Mutex::new(None),
                shutdown: CancellationToken::new(),
            }),
            runtime,
            retry_on_connection_failure: true,
        }
    }

    /// Enables or disables the single immediate retry after a failed connect.
    pub fn with_retry_on_connection_failure(mut self, retry: bool) -> Self {
        self.retry_on_connection_failure = retry;
        self
    }

    /// Replaces the URL used by subsequent fetches.
    pub fn set_url(&self, url: impl Into<String>) {
        self.inner.url.store(Arc::new(url.into()));
    }

    /// Returns the URL currently targeted by the fetcher.
    pub fn url(&self) -> String {
        self.inner.url.load().as_ref().clone()
    }

    /// Returns the `ETag` remembered from the last fetched document.
    pub async fn etag(&self) -> Option<String> {
        self.inner.etag.lock().await.clone()
    }

    /// Returns the runtime on which requests and background work are executed.
    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Performs one conditional GET against the configured URL.
    pub async fn fetch(&self) -> FetchResponse {
        if self.is_closed() {
            debug!("betterconfig fetch skipped, fetcher is closed");
            return FetchResponse::Failed;
        }

        let inner = Arc::clone(&self.inner);
        let retry = self.retry_on_connection_failure;
        match self.runtime.spawn(async move { inner.fetch(retry).await }).await {
            Ok(response) => response,
            Err(err) => {
                error!(error = %err, "betterconfig fetch task did not complete");
                FetchResponse::Failed
            }
        }
    }

    /// Cancels outstanding requests; later fetches fail without touching the network.
    pub fn close(&self) {
        self.inner.shutdown.cancel();
    }
}

impl FetcherInner {
    async fn fetch(&self, retry: bool) -> FetchResponse {
        let mut etag = self.etag.lock().await;
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                debug!("betterconfig fetch cancelled by close");
                FetchResponse::Failed
            }
            response = self.exchange(&mut etag, retry) => response,
        }
    }

    async fn exchange(&self, etag: &mut Option<String>, retry: bool) -> FetchResponse {
        let url = self.url.load_full();
        let response = match self.send(&url, etag.as_deref(), retry).await {
            Ok(response) => response,
            Err(err) => {
                error!(url = %url, error = %err, "betterconfig fetch failed");
                return FetchResponse::Failed;
            }
        };

        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            debug!(url = %url, "betterconfig configuration not modified");
            return FetchResponse::NotModified;
        }
        if !status.is_success() {
            debug!(url = %url, status = %status, "betterconfig fetch returned non-success status");
            return FetchResponse::Failed;
        }

        let new_etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        match response.text().await {
            Ok(body) => {
                debug!(url = %url, etag = ?new_etag, body_len = body.len(), "betterconfig configuration fetched");
                *etag = new_etag;
                FetchResponse::Fetched(body)
            }
            Err(err) => {
                error!(url = %url, error = %err, "betterconfig fetch could not read response body");
                FetchResponse::Failed
            }
        }
    }

    async fn send(
        &self,
        url: &str,
        etag: Option<&str>,
        retry: bool,
    ) -> Result<Response, reqwest::Error> {
        match self.request(url, etag).send().await {
            Err(err) if retry && err.is_connect() => {
                debug!(url = %url, error = %err, "betterconfig fetch could not connect, retrying once");
                self.request(url, etag).send().await
            }
            other => other,
        }
    }

    fn request(&self, url: &str, etag: Option<&str>) -> RequestBuilder {
        let builder = self.http.get(url).header(USER_AGENT, http::USER_AGENT);
        match etag {
            Some(etag) => builder.header(IF_NONE_MATCH, etag),
            None => builder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_url_embeds_project_secret() {
        assert_eq!(
            config_url("PKDVCLf-Hq-h-kCzMp-L7Q/psuH7BGHoUmdONrzzUOY7A"),
            "https://cdn.betterconfig.com/configuration-files/PKDVCLf-Hq-h-kCzMp-L7Q/psuH7BGHoUmdONrzzUOY7A/config.json"
        );
    }

    #[test]
    fn config_url_with_base_tolerates_trailing_slash() {
        assert_eq!(
            config_url_with_base("http://127.0.0.1:8080/", "secret"),
            "http://127.0.0.1:8080/secret/config.json"
        );
        assert_eq!(
            config_url_with_base("http://127.0.0.1:8080", "secret"),
            "http://127.0.0.1:8080/secret/config.json"
        );
    }

    #[test]
    fn fetch_response_accessors() {
        let fetched = FetchResponse::Fetched("{}".to_string());
        assert!(fetched.is_fetched());
        assert_eq!(fetched.config(), Some("{}"));

        assert!(FetchResponse::NotModified.is_not_modified());
        assert_eq!(FetchResponse::NotModified.config(), None);

        assert!(FetchResponse::Failed.is_failed());
        assert_eq!(FetchResponse::Failed.config(), None);
    }

    #[tokio::test]
    async fn set_url_replaces_target() {
        let fetcher = ConfigFetcher::new(Client::new(), "secret", Handle::current());
        assert_eq!(fetcher.url(), config_url("secret"));

        fetcher.set_url("http://127.0.0.1:1/");
        assert_eq!(fetcher.url(), "http://127.0.0.1:1/");
    }

    #[tokio::test]
    async fn closed_fetcher_fails_without_request() {
        let fetcher = ConfigFetcher::new(Client::new(), "secret", Handle::current());
        fetcher.set_url("http://127.0.0.1:1/");
        fetcher.close();

        assert!(fetcher.is_closed());
        assert_eq!(fetcher.fetch().await, FetchResponse::Failed);
        assert_eq!(fetcher.etag().await, None);
    }

    #[tokio::test]
    async fn unreachable_server_yields_failed() {
        let fetcher = ConfigFetcher::new(Client::new(), "secret", Handle::current())
            .with_retry_on_connection_failure(false);
        // Port 1 is reserved and refuses connections on loopback.
        fetcher.set_url("http://127.0.0.1:1/");

        assert_eq!(fetcher.fetch().await, FetchResponse::Failed);
        assert_eq!(fetcher.etag().await, None);
    }
}
