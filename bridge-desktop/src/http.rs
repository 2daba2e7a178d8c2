//! HTTP Client Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpRequest, HttpResponse},
};
use futures_util::TryStreamExt;
use reqwest::{redirect, Client};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_USER_AGENT: &str = concat!("clipfeed/", env!("CARGO_PKG_VERSION"));

/// Reqwest-based HTTP client implementation
///
/// Holds two pooled clients: one that follows redirects and one with
/// redirects disabled, selected per request by `HttpRequest::follow_redirects`.
/// Retries are left to the caller.
pub struct ReqwestHttpClient {
    client: Client,
    no_redirect_client: Client,
}

impl ReqwestHttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_connect_timeout(Duration::from_secs(10))
    }

    /// Create a new HTTP client with a custom connect timeout.
    ///
    /// No overall timeout is set on the clients; requests carry their own.
    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self> {
        let client = Self::builder(connect_timeout)
            .build()
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to build HTTP client: {}", e)))?;
        let no_redirect_client = Self::builder(connect_timeout)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            no_redirect_client,
        })
    }

    fn builder(connect_timeout: Duration) -> reqwest::ClientBuilder {
        Client::builder()
            .connect_timeout(connect_timeout)
            .pool_max_idle_per_host(10)
            .user_agent(DEFAULT_USER_AGENT)
    }

    /// Map a reqwest failure onto the bridge error classes callers branch on
    fn map_error(e: reqwest::Error) -> BridgeError {
        if e.is_timeout() {
            BridgeError::Timeout(e.to_string())
        } else if e.is_connect() {
            BridgeError::Connection(e.to_string())
        } else {
            BridgeError::OperationFailed(e.to_string())
        }
    }

    /// Build reqwest request from bridge request
    fn build_request(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let client = if request.follow_redirects {
            &self.client
        } else {
            &self.no_redirect_client
        };
        let mut req = client.get(&request.url);

        for (key, value) in &request.headers {
            req = req.header(key, value);
        }

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        req
    }

    fn collect_headers(headers: &reqwest::header::HeaderMap) -> HashMap<String, String> {
        headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!(
            url = %request.url,
            follow_redirects = request.follow_redirects,
            "Executing HTTP request"
        );

        let response = self.build_request(&request).send().await.map_err(|e| {
            warn!(error = %e, url = %request.url, "HTTP request failed");
            Self::map_error(e)
        })?;

        let status = response.status().as_u16();
        let url = response.url().to_string();
        let headers = Self::collect_headers(response.headers());

        let body = if request.headers_only {
            bytes::Bytes::new()
        } else {
            response.bytes().await.map_err(Self::map_error)?
        };

        debug!(status, url = %url, size = body.len(), "HTTP response received");

        Ok(HttpResponse {
            status,
            url,
            headers,
            body,
        })
    }

    async fn download_stream(
        &self,
        request: HttpRequest,
    ) -> Result<Box<dyn tokio::io::AsyncRead + Send + Unpin>> {
        let mut req = self.client.get(&request.url);
        for (key, value) in &request.headers {
            req = req.header(key, value);
        }

        let send = req.send();
        let response = match request.timeout {
            // The body may legitimately take longer; only the response head is bounded.
            Some(limit) => tokio::time::timeout(limit, send).await.map_err(|_| {
                BridgeError::Timeout(format!("no response from {} within {:?}", request.url, limit))
            })?,
            None => send.await,
        }
        .map_err(Self::map_error)?;

        if !response.status().is_success() {
            return Err(BridgeError::OperationFailed(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        debug!(url = %request.url, "Download stream opened");

        let stream = response.bytes_stream().map_err(std::io::Error::other);
        let reader = tokio_util::io::StreamReader::new(stream);

        Ok(Box::new(reader))
    }
}
