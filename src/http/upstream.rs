//! Forwarding requests to backends.
//!
//! # Responsibilities
//! - Rewrite the request URI onto the backend's base URL
//! - Send the request and hand back the streaming response
//!
//! # Design Decisions
//! - Transport sits behind the [`Upstream`] trait; breakers and the health
//!   aggregator only ever see a fallible future
//! - The client's Host header is dropped so the backend sees its own authority
//! - No deadline here; the calling breaker owns the timeout

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use futures_util::future::BoxFuture;
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;

use crate::config::BackendDescriptor;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid upstream uri: {0}")]
    InvalidUri(#[from] axum::http::uri::InvalidUri),

    #[error("upstream request failed: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("upstream responded with {0}")]
    Status(StatusCode),
}

pub type UpstreamFuture = BoxFuture<'static, Result<Response<Body>, UpstreamError>>;

/// Sends one request to one backend.
pub trait Upstream: Send + Sync + 'static {
    fn send(&self, backend: &BackendDescriptor, request: Request<Body>) -> UpstreamFuture;
}

/// Plain HTTP/1.1 + HTTP/2 forwarding over hyper.
#[derive(Clone)]
pub struct HttpUpstream {
    client: Client<HttpConnector, Body>,
}

impl HttpUpstream {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client }
    }
}

impl Default for HttpUpstream {
    fn default() -> Self {
        Self::new()
    }
}

impl Upstream for HttpUpstream {
    fn send(&self, backend: &BackendDescriptor, request: Request<Body>) -> UpstreamFuture {
        let (mut parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let target = backend.url_for(path_and_query);
        let client = self.client.clone();

        Box::pin(async move {
            parts.uri = target.parse()?;
            parts.headers.remove(header::HOST);

            let response: Response<Incoming> =
                client.request(Request::from_parts(parts, body)).await?;
            Ok(response.map(Body::new))
        })
    }
}
