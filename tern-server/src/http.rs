//! HTTP/1.1 binding over hyper
//!
//! [`HttpServer`] owns a bound `TcpListener` and serves a [`Server`] on it.
//! Each accepted connection runs in its own task; every request on it is
//! wrapped in a [`HyperExchange`] and answered with whatever the server core
//! returns. The accept loop stops when the shutdown token is cancelled;
//! connections already accepted finish on their own.
//!
//! Request bodies are read through `http_body_util::Limited`; a body larger
//! than [`HttpServer::max_body_size`] is rejected as `CouldntParseRequest`
//! before any of it is decoded.
//!
//! # Examples
//!
//! ```rust,no_run
//! use tern_server::Server;
//!
//! # async fn example() -> tern_core::Result<()> {
//! let http = Server::builder().bind_str("127.0.0.1:0")?.listen().await?;
//! let addr = http.local_addr()?;
//! let shutdown = http.shutdown_token();
//!
//! let task = tokio::spawn(http.run());
//! println!("serving on http://{}", addr);
//!
//! shutdown.cancel();
//! task.await.ok();
//! # Ok(())
//! # }
//! ```

use crate::exchange::{query_pairs, Exchange};
use crate::server::Server;
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use tern_core::{Error, Headers, HttpResponse, Result, Verb};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Default cap on a request body, in bytes
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// A bound HTTP listener serving one [`Server`]
pub struct HttpServer {
    listener: TcpListener,
    server: Server,
    shutdown: CancellationToken,
    max_body_size: usize,
}

impl HttpServer {
    pub fn new(listener: TcpListener, server: Server) -> Self {
        Self {
            listener,
            server,
            shutdown: CancellationToken::new(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    /// Reject request bodies larger than `bytes`
    pub fn with_max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| Error::Transport(format!("Failed to get local address: {}", e)))
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    /// Token that stops the accept loop when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Accept connections until shut down
    #[tracing::instrument(skip(self), name = "server.run")]
    pub async fn run(self) -> Result<()> {
        tracing::info!(
            addr = ?self.listener.local_addr().ok(),
            max_body_size = self.max_body_size,
            "Starting tern HTTP server"
        );

        loop {
            let (stream, addr) = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Shutdown requested, no longer accepting connections");
                    return Ok(());
                }
                accepted = self.listener.accept() => accepted
                    .map_err(|e| Error::Transport(format!("Failed to accept connection: {}", e)))?,
            };

            tracing::debug!(addr = %addr, "New connection accepted");

            let io = TokioIo::new(stream);
            let server = self.server.clone();
            let limit = self.max_body_size;

            tokio::task::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let server = server.clone();
                    async move { Ok::<_, Infallible>(serve(server, req, limit).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    tracing::error!(addr = %addr, error = %err, "Error serving connection");
                }
            });
        }
    }
}

async fn serve(server: Server, req: Request<Incoming>, limit: usize) -> Response<Full<Bytes>> {
    let response = server.handle(HyperExchange::new(req, limit)).await;
    into_hyper_response(response)
}

/// Convert a core response into a hyper one
fn into_hyper_response(response: HttpResponse) -> Response<Full<Bytes>> {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = Response::builder().status(status);
    for (name, value) in response.headers.iter() {
        builder = builder.header(name, value);
    }

    match builder.body(Full::new(Bytes::from(response.body))) {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(error = %err, "Response could not be built");
            let mut fallback = Response::new(Full::new(Bytes::from_static(
                b"{\"error\":{\"message\":\"Internal server error\",\"type\":\"InternalServerError\"}}",
            )));
            *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        }
    }
}

/// An [`Exchange`] over a live hyper request
pub struct HyperExchange {
    verb: Verb,
    query: Vec<(String, String)>,
    headers: Headers,
    body: Option<Incoming>,
    max_body_size: usize,
}

impl HyperExchange {
    /// Wrap `req`, reading at most `max_body_size` bytes of its body
    pub fn new(req: Request<Incoming>, max_body_size: usize) -> Self {
        let verb = Verb::from_method(req.method().as_str());
        let query = req
            .uri()
            .path_and_query()
            .map(|pq| query_pairs(pq.as_str()))
            .unwrap_or_default();

        let mut headers = Headers::new();
        for (name, value) in req.headers() {
            if let Ok(value) = value.to_str() {
                headers.append(name.as_str(), value);
            }
        }

        Self {
            verb,
            query,
            headers,
            body: Some(req.into_body()),
            max_body_size,
        }
    }
}

#[async_trait]
impl Exchange for HyperExchange {
    fn verb(&self) -> Verb {
        self.verb
    }

    fn query(&self, name: &str) -> Option<String> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }

    fn headers(&self) -> &Headers {
        &self.headers
    }

    async fn read_body(&mut self) -> Result<String> {
        let body = self
            .body
            .take()
            .ok_or_else(|| Error::Transport("request body already consumed".into()))?;

        let bytes = Limited::new(body, self.max_body_size)
            .collect()
            .await
            .map_err(|e| {
                if e.downcast_ref::<LengthLimitError>().is_some() {
                    Error::Transport(format!(
                        "request body exceeds {} bytes",
                        self.max_body_size
                    ))
                } else {
                    Error::Transport(format!("Failed to read request body: {}", e))
                }
            })?
            .to_bytes();

        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::Codec(format!("Request body is not UTF-8: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_hyper_response() {
        let response = HttpResponse::json(401, "{}")
            .with_header("set-cookie", "a=1")
            .with_header("set-cookie", "b=2");

        let converted = into_hyper_response(response);
        assert_eq!(converted.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(converted.headers().get_all("set-cookie").iter().count(), 2);
        assert_eq!(
            converted.headers().get("content-type").unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_invalid_header_falls_back_to_500() {
        let response = HttpResponse::new(200, "ok").with_header("bad header", "x");
        let converted = into_hyper_response(response);
        assert_eq!(converted.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_shutdown_stops_accept_loop() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let http = HttpServer::new(listener, Server::builder().build().unwrap());
        let shutdown = http.shutdown_token();

        let task = tokio::spawn(http.run());
        shutdown.cancel();
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_body_limit_defaults_and_overrides() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let http = HttpServer::new(listener, Server::builder().build().unwrap());
        assert_eq!(http.max_body_size(), DEFAULT_MAX_BODY_SIZE);

        let http = http.with_max_body_size(64);
        assert_eq!(http.max_body_size(), 64);
    }
}
