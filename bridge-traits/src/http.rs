//! HTTP Client Abstraction
//!
//! Provides async HTTP operations used for link acquisition, redirect probing
//! and media downloads.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::AsyncRead;

use crate::error::Result;

/// GET request builder
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub timeout: Option<Duration>,
    /// When false the client must hand back 3xx responses untouched.
    pub follow_redirects: bool,
    /// When true the response body is not read; `HttpResponse::body` stays empty.
    pub headers_only: bool,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            timeout: None,
            follow_redirects: true,
            headers_only: false,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn bearer_token(self, token: impl Into<String>) -> Self {
        self.header("Authorization", format!("Bearer {}", token.into()))
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    pub fn no_redirects(mut self) -> Self {
        self.follow_redirects = false;
        self
    }

    pub fn headers_only(mut self) -> Self {
        self.headers_only = true;
        self
    }
}

/// HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Final URL of the response (after any redirects the client followed).
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, url: impl Into<String>) -> Self {
        Self {
            status,
            url: url.into(),
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Get response body as a string, replacing invalid UTF-8 sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Check if response status is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if the status is one of the redirect codes a client may follow
    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307 | 308)
    }

    /// Check if response status indicates a client or server error (>= 400)
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

/// Async HTTP client trait
///
/// Implementations must:
/// - honour `HttpRequest::timeout` and report expiry as [`BridgeError::Timeout`]
/// - report refused/reset/DNS failures as [`BridgeError::Connection`]
/// - not follow redirects when `follow_redirects` is false
///
/// # Example
///
/// ```ignore
/// use bridge_traits::http::{HttpClient, HttpRequest};
///
/// async fn fetch_list(client: &dyn HttpClient) -> Result<String> {
///     let request = HttpRequest::get("https://api.example.com/list")
///         .timeout(Duration::from_secs(10));
///     Ok(client.execute(request).await?.text())
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Execute an HTTP request and buffer the response.
    ///
    /// Non-2xx statuses are returned as responses, not errors.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Download a resource as a stream of bytes.
    ///
    /// Used for media files that should not be loaded entirely into memory.
    /// Redirects are followed and `headers` are sent; `timeout`, if set,
    /// bounds the wait for the response head only. A non-2xx status is an
    /// error.
    async fn download_stream(
        &self,
        request: HttpRequest,
    ) -> Result<Box<dyn AsyncRead + Send + Unpin>>;
}
