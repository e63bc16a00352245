// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy of the client.
//!
//! Only [`Error`] ever reaches callers of the public API. Transport, parse and
//! cache faults are absorbed inside the refresh subsystem and surface as logs
//! plus a fallback value.

/// Usage and construction errors surfaced to the caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An argument or configuration value is outside of its accepted range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The default HTTP client could not be constructed.
    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// The client-owned runtime could not be started.
    #[error("failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

/// Failure raised by the configuration parser.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The parser was called with an empty document or key.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The document is not valid JSON or does not match the requested type.
    #[error("failed to parse configuration json: {source}")]
    InvalidJson {
        json: String,
        #[source]
        source: serde_json::Error,
    },

    /// The document is not a JSON object, so keys cannot be looked up.
    #[error("configuration json is not an object")]
    NotAnObject,

    /// The key is absent or explicitly `null`.
    #[error("key '{0}' not found in configuration")]
    KeyNotFound(String),

    /// The value stored under the key cannot be converted to the requested type.
    #[error("value of key '{key}' cannot be read as {expected}")]
    TypeMismatch { key: String, expected: &'static str },
}

impl ParseError {
    /// Returns the offending document when the failure came from malformed JSON.
    pub fn json(&self) -> Option<&str> {
        match self {
            Self::InvalidJson { json, .. } => Some(json),
            _ => None,
        }
    }
}

/// Failure raised by a [`crate::cache::ConfigCache`] implementation.
#[derive(Debug, thiserror::Error)]
#[error("cache error: {0}")]
pub struct CacheError(pub String);
