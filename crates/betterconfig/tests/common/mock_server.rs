// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Scripted mock HTTP server standing in for the configuration CDN

use bytes::Bytes;
use http_body_util::Full;
use hyper::{body::Incoming, Request, Response};
use hyper_util::rt::TokioIo;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::runtime::Handle;

/// Response served for one request, in queue order
#[derive(Clone, Debug)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
    pub headers: Vec<(String, String)>,
    pub delay: Duration,
}

impl MockResponse {
    pub fn ok(body: &str) -> Self {
        Self::status(200).with_body(body)
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
            headers: Vec::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Holds the response back before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Clone, Debug)]
pub struct ReceivedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
}

impl ReceivedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Clone)]
pub struct MockServer {
    pub addr: SocketAddr,
    pub received_requests: Arc<Mutex<Vec<ReceivedRequest>>>,
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
}

impl MockServer {
    /// Start a mock HTTP server on a random port of the current runtime
    pub async fn start() -> Self {
        Self::start_on(&Handle::current())
    }

    /// Start a mock HTTP server on a random port, serving from `runtime`
    pub fn start_on(runtime: &Handle) -> Self {
        let listener =
            std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind mock server");
        listener
            .set_nonblocking(true)
            .expect("Failed to set listener non-blocking");
        let addr = listener.local_addr().expect("Failed to get local addr");

        let received_requests = Arc::new(Mutex::new(Vec::new()));
        let responses = Arc::new(Mutex::new(VecDeque::new()));
        let requests_clone = received_requests.clone();
        let responses_clone = responses.clone();

        runtime.spawn(async move {
            let listener = TcpListener::from_std(listener).expect("Failed to adopt listener");
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => break,
                };

                let io = TokioIo::new(stream);
                let requests = requests_clone.clone();
                let responses = responses_clone.clone();

                tokio::spawn(async move {
                    let service = hyper::service::service_fn(move |req: Request<Incoming>| {
                        let requests = requests.clone();
                        let responses = responses.clone();
                        async move {
                            let headers: Vec<(String, String)> = req
                                .headers()
                                .iter()
                                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
                                .collect();
                            requests.lock().unwrap().push(ReceivedRequest {
                                method: req.method().to_string(),
                                path: req.uri().path().to_string(),
                                headers,
                            });

                            // An empty script answers like a broken CDN
                            let scripted = responses
                                .lock()
                                .unwrap()
                                .pop_front()
                                .unwrap_or_else(|| MockResponse::status(500));
                            if !scripted.delay.is_zero() {
                                tokio::time::sleep(scripted.delay).await;
                            }

                            let mut builder = Response::builder().status(scripted.status);
                            for (name, value) in &scripted.headers {
                                builder = builder.header(name.as_str(), value.as_str());
                            }
                            builder.body(Full::new(Bytes::from(scripted.body)))
                        }
                    });

                    let _ = hyper::server::conn::http1::Builder::new()
                        .serve_connection(io, service)
                        .await;
                });
            }
        });

        MockServer {
            addr,
            received_requests,
            responses,
        }
    }

    /// Get the base URL of the mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Queue the response served to the next unanswered request
    pub fn enqueue(&self, response: MockResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Get all received requests
    pub fn get_requests(&self) -> Vec<ReceivedRequest> {
        self.received_requests.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn request_count(&self) -> usize {
        self.received_requests.lock().unwrap().len()
    }
}
