// packages/tracker/src/delivery/transport.rs
//! HTTP transport to the collection endpoint
//!
//! The engine only needs "POST these bytes, tell me the status". Timeouts and
//! retries are handled by the engine, not the transport.

use crate::utils::errors::{Result, TrackerError};
use bytes::Bytes;
use futures::future::BoxFuture;
use http_body_util::{BodyExt, Full};
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::debug;

/// Delivers serialised batches
pub trait Transport: Send + Sync {
    /// POST a JSON body to `url`, resolving to the response status code
    fn post<'a>(&'a self, url: &'a str, body: Bytes) -> BoxFuture<'a, Result<u16>>;
}

/// hyper-based HTTP/1.1 transport
pub struct HttpTransport {
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HttpTransport {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn post<'a>(&'a self, url: &'a str, body: Bytes) -> BoxFuture<'a, Result<u16>> {
        Box::pin(async move {
            let request = Request::builder()
                .method(Method::POST)
                .uri(url)
                .header(CONTENT_TYPE, "application/json")
                .body(Full::new(body))
                .map_err(|e| TrackerError::TransportFailed(format!("Request build error: {}", e)))?;

            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| TrackerError::TransportFailed(format!("Request failed: {}", e)))?;

            let status = response.status();

            // drain the body so the connection can be reused
            if let Err(e) = response.into_body().collect().await {
                debug!("Failed to read response body: {}", e);
            }

            Ok(status.as_u16())
        })
    }
}
