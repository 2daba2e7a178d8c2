//! Manual redirect following.
//!
//! Link-list endpoints usually hand out short or tracking URLs. The chain is
//! walked hop by hop (auto-follow disabled) so the final CDN URL can be cached
//! and every hop logged.

use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Follows HTTP redirects up to a fixed depth.
pub struct RedirectResolver {
    http_client: Arc<dyn HttpClient>,
    max_redirects: usize,
    timeout: Duration,
}

impl RedirectResolver {
    pub fn new(http_client: Arc<dyn HttpClient>, max_redirects: usize, timeout: Duration) -> Self {
        Self {
            http_client,
            max_redirects,
            timeout,
        }
    }

    /// Resolve `url` to the last URL reached in its redirect chain.
    ///
    /// Never fails: on any request error, or when the final status is >= 400,
    /// the input URL is returned unchanged. When the chain is longer than the
    /// bound, the URL reached at the bound is returned.
    pub async fn resolve(&self, url: &str) -> String {
        info!(url, "Following redirects");
        match self.walk(url).await {
            Ok(Some(final_url)) => {
                info!(url = %final_url, "Resolved final video URL");
                final_url
            }
            Ok(None) => url.to_string(),
            Err(e) => {
                warn!(error = %e, url, "Redirect resolution failed, keeping original URL");
                url.to_string()
            }
        }
    }

    async fn walk(&self, url: &str) -> BridgeResult<Option<String>> {
        let mut current = url.to_string();
        let mut response = self.fetch_hop(&current).await?;
        let mut hops = 0;

        while response.is_redirect() && hops < self.max_redirects {
            let Some(location) = response.header("Location") else {
                break;
            };
            let Some(next) = join_location(&current, location) else {
                debug!(url = %current, location, "Unusable Location header, stopping");
                break;
            };
            debug!(hop = hops + 1, from = %current, to = %next, "Redirect");

            response = self.fetch_hop(&next).await?;
            current = next;
            hops += 1;
        }

        if response.is_error() {
            debug!(status = response.status, url = %current, "Redirect chain ended in error");
            return Ok(None);
        }

        Ok(Some(current))
    }

    async fn fetch_hop(&self, url: &str) -> BridgeResult<HttpResponse> {
        let request = HttpRequest::get(url)
            .no_redirects()
            .headers_only()
            .timeout(self.timeout);
        self.http_client.execute(request).await
    }
}

/// Resolve a `Location` value against the URL that produced it.
///
/// `None` when either side cannot be parsed.
fn join_location(base: &str, location: &str) -> Option<String> {
    url::Url::parse(base)
        .and_then(|base| base.join(location))
        .map(|joined| joined.to_string())
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_locations_join_against_current_url() {
        assert_eq!(
            join_location("https://short.example.com/a/b", "/v/1.mp4").as_deref(),
            Some("https://short.example.com/v/1.mp4")
        );
        assert_eq!(
            join_location("https://short.example.com/a/b", "c.mp4").as_deref(),
            Some("https://short.example.com/a/c.mp4")
        );
        assert_eq!(
            join_location("https://short.example.com/a", "https://cdn.example.com/x.mp4").as_deref(),
            Some("https://cdn.example.com/x.mp4")
        );
    }

    #[test]
    fn unparseable_urls_do_not_join() {
        assert_eq!(join_location("short.example.com/a", "/v/1.mp4"), None);
        assert_eq!(join_location("https://short.example.com/a", "http://[::1"), None);
    }
}
