//! HTTP transport over hyper
//!
//! [`HyperTransport`] sends each call as one HTTP/1.1 request through a
//! pooled `hyper_util` client. Any response, whatever its status, is
//! returned as `Ok`; only failures that produced no response are errors.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::Request;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tern_core::{Error, Headers, HttpRequest, HttpResponse, Result, Transport};

/// Pooled HTTP/1.1 client
#[derive(Clone)]
pub struct HyperTransport {
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HyperTransport {
    pub fn new() -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
        }
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport").finish()
    }
}

#[async_trait]
impl Transport for HyperTransport {
    #[tracing::instrument(skip_all, fields(verb = %request.verb, url = %request.url))]
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = Request::builder()
            .method(request.verb.as_str())
            .uri(&request.url);
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }

        let http_request = builder
            .body(Full::new(Bytes::from(request.body)))
            .map_err(|e| Error::Transport(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .request(http_request)
            .await
            .map_err(|e| Error::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        let mut headers = Headers::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.append(name.as_str(), value);
            }
        }

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| Error::Transport(format!("Failed to read response: {}", e)))?
            .to_bytes();

        let body = String::from_utf8(body.to_vec())
            .map_err(|e| Error::Transport(format!("Response body is not UTF-8: {}", e)))?;

        tracing::trace!(status, "Response received");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
