// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP transport construction for the configuration fetcher.

use std::time::Duration;

use reqwest::Client;

use crate::error::Error;

/// Value sent in the `User-Agent` header of every configuration request.
pub const USER_AGENT: &str = concat!("BetterConfigClient-Rust/", env!("CARGO_PKG_VERSION"));

/// Options governing how the default HTTP client is constructed.
#[derive(Debug, Clone, Copy)]
pub struct HttpOptions {
    /// Overall timeout applied to a single configuration request.
    pub request_timeout: Option<Duration>,
    /// Timeout applied while establishing a connection.
    pub connect_timeout: Option<Duration>,
    /// Retry a request once when the connection could not be established.
    pub retry_on_connection_failure: bool,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            request_timeout: None,
            connect_timeout: Some(Duration::from_secs(10)),
            retry_on_connection_failure: true,
        }
    }
}

/// Builds the `reqwest` client used when the caller does not inject one.
pub fn create_http_client(options: &HttpOptions) -> Result<Client, Error> {
    let mut builder = Client::builder().use_rustls_tls();
    if let Some(timeout) = options.request_timeout {
        builder = builder.timeout(timeout);
    }
    if let Some(timeout) = options.connect_timeout {
        builder = builder.connect_timeout(timeout);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_identifies_library_and_version() {
        assert!(USER_AGENT.starts_with("BetterConfigClient-Rust/"));
        assert!(USER_AGENT.ends_with(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn default_options_retry_on_connection_failure() {
        let options = HttpOptions::default();
        assert!(options.retry_on_connection_failure);
        assert!(options.request_timeout.is_none());
    }

    #[test]
    fn create_http_client_accepts_timeouts() {
        let options = HttpOptions {
            request_timeout: Some(Duration::from_secs(5)),
            connect_timeout: None,
            retry_on_connection_failure: false,
        };
        assert!(create_http_client(&options).is_ok());
    }
}
