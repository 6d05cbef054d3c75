//! Boundary between the server core and an HTTP stack
//!
//! The core never touches a concrete HTTP type. A binding wraps each
//! incoming request in an [`Exchange`] and writes back the `HttpResponse`
//! the server returns. Two bindings ship with this crate:
//!
//! - **HyperExchange** (in `http`): a live hyper request
//! - **MemoryExchange**: an owned `HttpRequest`, used by the loopback
//!   transport and by tests
//!
//! Middleware and resolvers never see the exchange itself. They get a
//! [`RequestHelpers`] handle for cookies and headers; anything they set is
//! buffered and merged into the response, whether the call succeeds or fails.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tern_core::{Error, Headers, HttpRequest, Result, Verb};

/// One incoming request as seen by the server core
#[async_trait]
pub trait Exchange: Send {
    fn verb(&self) -> Verb;

    /// A decoded query-string parameter
    fn query(&self, name: &str) -> Option<String>;

    /// Request headers
    fn headers(&self) -> &Headers;

    /// Read the whole body as UTF-8
    async fn read_body(&mut self) -> Result<String>;

    /// Cookies sent with the request
    fn cookies(&self) -> HashMap<String, String> {
        parse_cookies(self.headers().get_all("cookie"))
    }
}

/// Parse `Cookie` header values into a name/value map
///
/// The first occurrence of a name wins. Surrounding double quotes are
/// stripped from values.
pub fn parse_cookies<'a>(headers: impl IntoIterator<Item = &'a str>) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for header in headers {
        for pair in header.split(';') {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            cookies
                .entry(name.to_string())
                .or_insert_with(|| value.to_string());
        }
    }
    cookies
}

/// `SameSite` cookie attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Attributes written after a cookie's value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieOptions {
    pub path: Option<String>,
    pub domain: Option<String>,
    /// Lifetime in seconds; `Some(0)` expires the cookie immediately
    pub max_age: Option<i64>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: Option<SameSite>,
}

impl CookieOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn http_only(mut self) -> Self {
        self.http_only = true;
        self
    }

    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    /// Render a full `Set-Cookie` header value
    pub fn serialize(&self, name: &str, value: &str) -> String {
        let mut out = format!("{}={}", name, value);
        if let Some(max_age) = self.max_age {
            let _ = write!(out, "; Max-Age={}", max_age);
        }
        if let Some(domain) = &self.domain {
            let _ = write!(out, "; Domain={}", domain);
        }
        if let Some(path) = &self.path {
            let _ = write!(out, "; Path={}", path);
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        if self.secure {
            out.push_str("; Secure");
        }
        if let Some(same_site) = self.same_site {
            let _ = write!(out, "; SameSite={}", same_site.as_str());
        }
        out
    }
}

/// Cookie and header access for middleware and resolvers
///
/// Cloning is cheap; all clones share one response-header buffer.
#[derive(Clone)]
pub struct RequestHelpers {
    inner: Arc<HelpersInner>,
}

struct HelpersInner {
    method: String,
    verb: Verb,
    headers: Headers,
    cookies: HashMap<String, String>,
    response_headers: Mutex<Headers>,
}

impl RequestHelpers {
    pub(crate) fn new(
        method: impl Into<String>,
        verb: Verb,
        headers: Headers,
        cookies: HashMap<String, String>,
    ) -> Self {
        Self {
            inner: Arc::new(HelpersInner {
                method: method.into(),
                verb,
                headers,
                cookies,
                response_headers: Mutex::new(Headers::new()),
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn for_test(method: &str, verb: Verb) -> Self {
        Self::new(method, verb, Headers::new(), HashMap::new())
    }

    /// Dotted path of the method being called
    pub fn method(&self) -> &str {
        &self.inner.method
    }

    pub fn verb(&self) -> Verb {
        self.inner.verb
    }

    /// A request header
    pub fn header(&self, name: &str) -> Option<String> {
        self.inner.headers.get(name).map(str::to_string)
    }

    /// A request cookie
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.inner.cookies.get(name).cloned()
    }

    /// All request cookies
    pub fn cookies(&self) -> HashMap<String, String> {
        self.inner.cookies.clone()
    }

    /// Queue a `Set-Cookie` header on the response
    pub fn set_cookie(&self, name: &str, value: &str, options: CookieOptions) {
        self.inner
            .response_headers
            .lock()
            .append("set-cookie", options.serialize(name, value));
    }

    /// Queue a `Set-Cookie` header that expires `name` immediately
    pub fn delete_cookie(&self, name: &str, options: CookieOptions) {
        self.set_cookie(name, "", options.max_age(0));
    }

    /// Set a response header, replacing earlier values of the same name
    pub fn set_header(&self, name: &str, value: &str) {
        self.inner.response_headers.lock().set(name, value);
    }

    /// Drain everything queued for the response
    pub(crate) fn take_response_headers(&self) -> Headers {
        std::mem::take(&mut *self.inner.response_headers.lock())
    }
}

impl std::fmt::Debug for RequestHelpers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHelpers")
            .field("method", &self.inner.method)
            .field("verb", &self.inner.verb)
            .finish()
    }
}

/// Decoded query parameters of a URL, absolute or relative
pub fn query_pairs(raw_url: &str) -> Vec<(String, String)> {
    let query = match raw_url.split_once('?') {
        Some((_, query)) => query.split('#').next().unwrap_or(query),
        None => return Vec::new(),
    };
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

/// An exchange over an owned request
#[derive(Debug, Clone)]
pub struct MemoryExchange {
    request: HttpRequest,
    query: Vec<(String, String)>,
    body_read: bool,
}

impl MemoryExchange {
    pub fn new(request: HttpRequest) -> Self {
        let query = query_pairs(&request.url);
        Self {
            request,
            query,
            body_read: false,
        }
    }
}

#[async_trait]
impl Exchange for MemoryExchange {
    fn verb(&self) -> Verb {
        self.request.verb
    }

    fn query(&self, name: &str) -> Option<String> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }

    fn headers(&self) -> &Headers {
        &self.request.headers
    }

    async fn read_body(&mut self) -> Result<String> {
        if self.body_read {
            return Err(Error::Transport("request body already consumed".into()));
        }
        self.body_read = true;
        Ok(std::mem::take(&mut self.request.body))
    }
}
