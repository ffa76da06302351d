//! Request options and result shapes for single-URL scrapes.

use crate::structured::StructuredData;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Recognized per-request options. Unknown keys are rejected by the facade
/// before reaching the core, so this struct is exhaustive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScrapeOptions {
    /// Isolate the semantic body of the page before rendering.
    pub only_main: bool,
    /// Per-navigation timeout in milliseconds; falls back to settings.
    pub timeout_ms: Option<u64>,
    /// CSS selector the page must produce before capture.
    pub wait_for_selector: Option<String>,
    /// Emulate a mobile viewport.
    pub mobile: bool,
    pub include_screenshot: bool,
    pub include_raw_html: bool,
    /// Fixed user agent for this request, overriding the session pool.
    pub user_agent: Option<String>,
    /// Extra request headers merged over the stealth defaults.
    pub headers: BTreeMap<String, String>,
    /// Skip the cache entirely: neither read nor written.
    pub bypass_cache: bool,
    /// Cache TTL override in seconds.
    pub cache_ttl_s: Option<u64>,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            only_main: true,
            timeout_ms: None,
            wait_for_selector: None,
            mobile: false,
            include_screenshot: false,
            include_raw_html: false,
            user_agent: None,
            headers: BTreeMap::new(),
            bypass_cache: false,
            cache_ttl_s: None,
            window_width: 1280,
            window_height: 720,
        }
    }
}

/// Outcome of one scrape call. Never an Err at the API boundary; failures are
/// `success == false` with a populated `metadata.error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub success: bool,
    pub data: ScrapeData,
    /// Whether `data` was served from the result cache.
    #[serde(default)]
    pub cached: bool,
}

impl ScrapeResult {
    /// Failure result with metadata carrying the error and a 500 status.
    #[must_use]
    pub fn failure(url: &str, error: String) -> Self {
        Self {
            success: false,
            data: ScrapeData {
                metadata: PageMetadata {
                    source_url: url.to_string(),
                    status_code: 500,
                    error: Some(error.clone()),
                    ..PageMetadata::default()
                },
                warning: Some(error),
                ..ScrapeData::default()
            },
            cached: false,
        }
    }
}

/// Payload of a successful (or failed-with-context) scrape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapeData {
    pub markdown: Option<String>,
    /// Cleaned HTML.
    pub html: Option<String>,
    /// Untouched page source, only when requested.
    pub raw_html: Option<String>,
    /// Base64 PNG/JPEG, only when requested and capture succeeded.
    pub screenshot: Option<String>,
    /// Deduplicated outbound link hrefs.
    pub links: Option<Vec<String>>,
    pub metadata: PageMetadata,
    pub structured_data: Option<StructuredData>,
    pub warning: Option<String>,
}

/// Flat page metadata. The enumerated fields are always present in the JSON
/// shape; everything else the extractor finds lands in `extra` (OpenGraph and
/// Twitter values under their native prefixed keys).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Primary language subtag; empty string when unknown, never null.
    pub language: String,
    pub source_url: String,
    pub status_code: u16,
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl Default for PageMetadata {
    fn default() -> Self {
        Self {
            title: None,
            description: None,
            language: String::new(),
            source_url: String::new(),
            status_code: 0,
            error: None,
            extra: BTreeMap::new(),
        }
    }
}

impl PageMetadata {
    /// Merge the extractor's flat map over this metadata. Known keys move
    /// into their typed fields; the rest goes to `extra`.
    pub fn absorb(&mut self, map: BTreeMap<String, String>) {
        for (key, value) in map {
            match key.as_str() {
                "title" => self.title = Some(value),
                "description" => self.description = Some(value),
                "language" => self.language = value,
                _ => {
                    self.extra.insert(key, value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_match_contract() {
        let o = ScrapeOptions::default();
        assert!(o.only_main);
        assert!(!o.bypass_cache);
        assert!(!o.include_raw_html);
        assert_eq!(o.window_width, 1280);
    }

    #[test]
    fn unknown_option_keys_are_rejected() {
        let err = serde_json::from_str::<ScrapeOptions>(r#"{"frobnicate": true}"#);
        assert!(err.is_err());
    }

    #[test]
    fn absorb_routes_known_keys() {
        let mut meta = PageMetadata::default();
        let mut map = BTreeMap::new();
        map.insert("title".to_string(), "T".to_string());
        map.insert("language".to_string(), "en".to_string());
        map.insert("og:image".to_string(), "/x.png".to_string());
        meta.absorb(map);
        assert_eq!(meta.title.as_deref(), Some("T"));
        assert_eq!(meta.language, "en");
        assert_eq!(meta.extra.get("og:image").map(String::as_str), Some("/x.png"));
    }

    #[test]
    fn failure_result_populates_error_block() {
        let r = ScrapeResult::failure("https://x.test/a", "boom".to_string());
        assert!(!r.success);
        assert_eq!(r.data.metadata.status_code, 500);
        assert_eq!(r.data.metadata.error.as_deref(), Some("boom"));
        assert_eq!(r.data.warning.as_deref(), Some("boom"));
        assert_eq!(r.data.metadata.source_url, "https://x.test/a");
    }
}
