// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

mod common;

use std::time::Duration;

use betterconfig::http::USER_AGENT;
use betterconfig::FetchResponse;
use common::fetcher_for;
use common::mock_server::{MockResponse, MockServer};

#[tokio::test]
async fn test_etag_round_trip() {
    let server = MockServer::start().await;
    server.enqueue(MockResponse::ok("test").with_header("ETag", "fakeETag"));
    server.enqueue(MockResponse::status(304));
    let fetcher = fetcher_for(&server.url());

    let first = fetcher.fetch().await;
    assert_eq!(first, FetchResponse::Fetched("test".to_string()));
    assert_eq!(fetcher.etag().await.as_deref(), Some("fakeETag"));

    let second = fetcher.fetch().await;
    assert!(second.is_not_modified());
    assert_eq!(second.config(), None);
    assert_eq!(fetcher.etag().await.as_deref(), Some("fakeETag"));

    let requests = server.get_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].header("If-None-Match"), None);
    assert_eq!(requests[1].header("If-None-Match"), Some("fakeETag"));
    for request in &requests {
        assert_eq!(request.header("User-Agent"), Some(USER_AGENT));
    }
}

#[tokio::test]
async fn test_failed_fetch_keeps_etag() {
    let server = MockServer::start().await;
    server.enqueue(MockResponse::ok("test").with_header("ETag", "v1"));
    server.enqueue(MockResponse::status(500).with_body("boom"));
    server.enqueue(MockResponse::status(404));
    let fetcher = fetcher_for(&server.url());

    assert!(fetcher.fetch().await.is_fetched());
    assert!(fetcher.fetch().await.is_failed());
    assert!(fetcher.fetch().await.is_failed());
    assert_eq!(fetcher.etag().await.as_deref(), Some("v1"));
}

#[tokio::test]
async fn test_document_without_etag_clears_it() {
    let server = MockServer::start().await;
    server.enqueue(MockResponse::ok("test").with_header("ETag", "v1"));
    server.enqueue(MockResponse::ok("test2"));
    server.enqueue(MockResponse::ok("test3"));
    let fetcher = fetcher_for(&server.url());

    fetcher.fetch().await;
    assert_eq!(
        fetcher.fetch().await,
        FetchResponse::Fetched("test2".to_string())
    );
    assert_eq!(fetcher.etag().await, None);

    fetcher.fetch().await;
    assert_eq!(server.get_requests()[2].header("If-None-Match"), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_close_cancels_in_flight_request() {
    let server = MockServer::start().await;
    server.enqueue(MockResponse::ok("late").with_delay(Duration::from_secs(5)));
    let fetcher = fetcher_for(&server.url());

    let in_flight = {
        let fetcher = fetcher.clone();
        tokio::spawn(async move { fetcher.fetch().await })
    };
    tokio::time::sleep(Duration::from_millis(300)).await;
    fetcher.close();

    let response = tokio::time::timeout(Duration::from_secs(2), in_flight)
        .await
        .expect("close interrupts the request")
        .expect("fetch task");
    assert!(response.is_failed());
    assert!(fetcher.fetch().await.is_failed());
    assert_eq!(server.request_count(), 1);
}
