//! Deterministic request fingerprint for cache keying.
//!
//! Only options that change the produced output participate; timeouts,
//! headers, and cache controls must not shift the key.

use crate::scrape::types::ScrapeOptions;
use sha2::{Digest, Sha256};

/// SHA-256 over the absolute URL and the canonical encoding of the
/// output-affecting option subset, rendered as lowercase hex.
///
/// serde_json's default map ordering is sorted, so the encoding is stable
/// regardless of construction order.
#[must_use]
pub fn fingerprint(url: &str, options: &ScrapeOptions) -> String {
    let relevant = serde_json::json!({
        "include_raw_html": options.include_raw_html,
        "include_screenshot": options.include_screenshot,
        "mobile": options.mobile,
        "only_main": options.only_main,
        "wait_for_selector": options.wait_for_selector,
    });

    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(b"|");
    hasher.update(relevant.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Backend key for a fingerprint.
#[must_use]
pub fn cache_key(fp: &str) -> String {
    format!("scrape:{fp}")
}
