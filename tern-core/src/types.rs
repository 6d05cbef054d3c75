//! Transport-level types shared by server and client
//!
//! tern does not depend on a particular HTTP stack. Requests and responses
//! cross the boundary as the small owned structs defined here, and the client
//! reaches the network through the [`Transport`] trait.
//!
//! # Request Shapes
//!
//! - **GET**: `<base>?method=<dotted.path>&input=<encoded value>`
//! - **POST**: body `{ "method": "<dotted.path>", "input": <encoded value> }`
//!
//! # Response Shapes
//!
//! - **Success**: status 200, body is the encoded output
//! - **Failure**: the error's status, body `{ "error": { "message", "type" } }`
//!
//! # Examples
//!
//! ```rust
//! use tern_core::{HttpResponse, Verb};
//!
//! let response = HttpResponse::json(200, "42")
//!     .with_header("set-cookie", "a=1")
//!     .with_header("set-cookie", "b=2");
//!
//! assert!(response.is_success());
//! assert_eq!(response.header("Content-Type"), Some("application/json"));
//! assert_eq!(response.header_values("set-cookie").count(), 2);
//! assert_eq!(Verb::from_method("get"), Verb::Get);
//! ```

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;

/// Content type of every tern request and response body
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Request verb
///
/// Only the distinction between GET and everything else matters to the
/// protocol; any non-GET verb carries its call in the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
}

impl Verb {
    /// Classify an HTTP method name, case-insensitively
    pub fn from_method(method: &str) -> Self {
        if method.eq_ignore_ascii_case("get") {
            Verb::Get
        } else {
            Verb::Post
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a leaf method name may be called with GET
pub fn is_gettable(method_name: &str) -> bool {
    method_name.starts_with("get") || method_name.starts_with("list")
}

/// The last segment of a dotted method path
pub fn leaf_name(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

/// Ordered header list; names compare case-insensitively, repeats allowed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header, keeping any existing values
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replace every value of a header with a single one
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.entries.push((name, value.into()));
    }

    /// First value of a header
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append every header of `other`
    pub fn extend(&mut self, other: Headers) {
        self.entries.extend(other.entries);
    }
}

/// An outgoing or incoming request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub verb: Verb,
    /// Absolute URL including any query string
    pub url: String,
    pub headers: Headers,
    /// Empty for GET
    pub body: String,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        let mut headers = Headers::new();
        headers.set("accept", JSON_CONTENT_TYPE);
        Self {
            verb: Verb::Get,
            url: url.into(),
            headers,
            body: String::new(),
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        let mut headers = Headers::new();
        headers.set("content-type", JSON_CONTENT_TYPE);
        headers.set("accept", JSON_CONTENT_TYPE);
        Self {
            verb: Verb::Post,
            url: url.into(),
            headers,
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }
}

/// A response as seen on either side of the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: body.into(),
        }
    }

    /// A response with `Content-Type: application/json`
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        let mut response = Self::new(status, body);
        response.headers.set("content-type", JSON_CONTENT_TYPE);
        response
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers.get_all(name)
    }

    /// True for 2xx statuses
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends a request and returns the response
///
/// Implementations exist for a real HTTP client and for an in-process
/// loopback into a server. Errors are reserved for failures that produced no
/// response at all; a 4xx or 5xx is still `Ok`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}
