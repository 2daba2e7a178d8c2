//! URL extraction from link-list responses.
//!
//! Upstream endpoints answer with JSON objects, JSON arrays of objects, or
//! arbitrary text. JSON is searched by key priority; anything that fails to
//! parse is scanned with a small set of URL patterns.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::debug;

use crate::error::{AcquisitionError, Result};

/// Keys tried on a JSON object, highest priority first.
pub const URL_KEYS: [&str; 6] = ["data", "url", "video_url", "link", "src", "video"];

static VIDEO_FILE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^"'\s]+?\.(?:mp4|mov|avi|mkv)"#).unwrap());
static DOUBLE_QUOTED_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(https?://[^"]+)""#).unwrap());
static SINGLE_QUOTED_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(https?://[^']+)'"#).unwrap());

/// Stateless extractor turning a response body into a candidate media URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlResolver;

impl UrlResolver {
    /// Extract a candidate URL from a response body.
    ///
    /// # Errors
    ///
    /// - [`AcquisitionError::EmptyResult`] when the body is JSON without a usable value
    /// - [`AcquisitionError::Parse`] when the body is not JSON and no URL is found in it
    pub fn extract(&self, body: &str, endpoint: &str) -> Result<String> {
        match serde_json::from_str::<Value>(body) {
            Ok(value) => self
                .from_json(&value)
                .ok_or_else(|| AcquisitionError::EmptyResult(endpoint.to_string())),
            Err(parse_err) => {
                debug!(error = %parse_err, "Response is not JSON, scanning text for a URL");
                self.from_text(body)
                    .ok_or_else(|| AcquisitionError::Parse(parse_err.to_string()))
            }
        }
    }

    /// Search a JSON value by key priority.
    ///
    /// A non-empty array is searched through its first element. A nested
    /// object or array under a key is searched with the same rule; if it
    /// yields nothing the next key is tried.
    pub fn from_json(&self, value: &Value) -> Option<String> {
        let candidate = match value {
            Value::Array(items) => items.first()?,
            other => other,
        };

        let Value::Object(map) = candidate else {
            return None;
        };

        for key in URL_KEYS {
            let Some(found) = map.get(key) else {
                continue;
            };

            match found {
                Value::Object(_) | Value::Array(_) => {
                    if let Some(url) = self.from_json(found) {
                        return Some(url);
                    }
                }
                Value::String(s) => {
                    let trimmed = s.trim();
                    if !trimmed.is_empty() {
                        return Some(trimmed.to_string());
                    }
                }
                Value::Number(n) => return Some(n.to_string()),
                Value::Bool(b) => return Some(b.to_string()),
                Value::Null => {}
            }
        }

        None
    }

    /// Best-effort scan of raw text. Patterns are tried in order: a URL ending
    /// in a video extension, a double-quoted URL, a single-quoted URL.
    pub fn from_text(&self, text: &str) -> Option<String> {
        if let Some(m) = VIDEO_FILE_URL.find(text) {
            return Some(m.as_str().to_string());
        }

        [&*DOUBLE_QUOTED_URL, &*SINGLE_QUOTED_URL]
            .into_iter()
            .find_map(|pattern| pattern.captures(text))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}
