//! Structured-data extraction: JSON-LD, OpenGraph, Twitter Card, generic meta.
//!
//! Every sub-step degrades to an empty slot on failure; the extractor never
//! fails the enclosing scrape.

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::warn;

static JSON_LD_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("script[type='application/ld+json']")
        .expect("BUG: hardcoded JSON-LD selector is invalid")
});

static META_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta").expect("BUG: hardcoded meta selector is invalid"));

static HTML_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("html").expect("BUG: hardcoded html selector is invalid"));

/// Machine-readable metadata embedded in a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredData {
    /// One parsed object per valid `<script type="application/ld+json">`.
    pub json_ld: Vec<serde_json::Value>,
    /// `og:*` meta values, prefix stripped.
    pub open_graph: BTreeMap<String, String>,
    /// `twitter:*` meta values, prefix stripped.
    pub twitter_card: BTreeMap<String, String>,
    /// Remaining `<meta name|property>` pairs. Always contains `language`
    /// (empty string when unknown).
    pub meta: BTreeMap<String, String>,
}

impl StructuredData {
    /// A valid-but-empty value, used when extraction fails wholesale.
    #[must_use]
    pub fn empty() -> Self {
        let mut meta = BTreeMap::new();
        meta.insert("language".to_string(), String::new());
        Self {
            meta,
            ..Self::default()
        }
    }
}

/// Extract all structured data from raw HTML.
#[must_use]
pub fn extract_all(html: &str) -> StructuredData {
    let document = Html::parse_document(html);

    let mut data = StructuredData {
        json_ld: extract_json_ld(&document),
        open_graph: extract_prefixed_meta(&document, "og:"),
        twitter_card: extract_prefixed_meta(&document, "twitter:"),
        meta: extract_generic_meta(&document),
    };
    data.meta
        .entry("language".to_string())
        .or_insert_with(|| extract_language(&document));
    data
}

/// Parse every JSON-LD script tag, skipping invalid JSON and objects that
/// lack the required `@context`/`@type` pair.
fn extract_json_ld(document: &Html) -> Vec<serde_json::Value> {
    let mut out = Vec::new();
    for script in document.select(&JSON_LD_SELECTOR) {
        let text: String = script.text().collect();
        if text.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(value) => {
                if is_valid_json_ld(&value) {
                    out.push(value);
                } else {
                    warn!("Skipping JSON-LD block without @context/@type");
                }
            }
            Err(e) => warn!("Skipping invalid JSON-LD block: {e}"),
        }
    }
    out
}

fn is_valid_json_ld(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Object(map) => {
            map.contains_key("@context") && map.contains_key("@type")
        }
        serde_json::Value::Array(items) => items.iter().all(is_valid_json_ld),
        _ => false,
    }
}

/// Collect meta tags whose name/property starts with `prefix`, keyed with the
/// prefix stripped.
fn extract_prefixed_meta(document: &Html, prefix: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for tag in document.select(&META_SELECTOR) {
        let name = tag
            .value()
            .attr("property")
            .or_else(|| tag.value().attr("name"));
        let (Some(name), Some(content)) = (name, tag.value().attr("content")) else {
            continue;
        };
        if let Some(stripped) = name.strip_prefix(prefix) {
            if !stripped.is_empty() && !content.is_empty() {
                out.insert(stripped.to_string(), content.to_string());
            }
        }
    }
    out
}

/// Collect all remaining `<meta name|property>` pairs.
fn extract_generic_meta(document: &Html) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for tag in document.select(&META_SELECTOR) {
        let name = tag
            .value()
            .attr("name")
            .or_else(|| tag.value().attr("property"));
        let (Some(name), Some(content)) = (name, tag.value().attr("content")) else {
            continue;
        };
        if name.starts_with("og:") || name.starts_with("twitter:") {
            continue;
        }
        if !content.is_empty() {
            out.insert(name.to_string(), content.to_string());
        }
    }
    out
}

/// Best-effort language detection: `<html lang>` primary subtag, then meta
/// tags, then OG locale. Empty string when nothing matches, never absent.
#[must_use]
pub fn extract_language(document: &Html) -> String {
    if let Some(html_el) = document.select(&HTML_SELECTOR).next() {
        if let Some(lang) = html_el.value().attr("lang") {
            if let Some(primary) = lang.split('-').next() {
                if !primary.is_empty() {
                    return primary.to_string();
                }
            }
        }
    }

    for tag in document.select(&META_SELECTOR) {
        let name = tag
            .value()
            .attr("http-equiv")
            .or_else(|| tag.value().attr("name"))
            .or_else(|| tag.value().attr("property"));
        let matches = matches!(name, Some("content-language" | "language" | "og:locale"));
        if matches {
            if let Some(content) = tag.value().attr("content") {
                if let Some(primary) = content.split(['_', '-']).next() {
                    if !primary.is_empty() {
                        return primary.to_string();
                    }
                }
            }
        }
    }

    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_json_ld_and_skips_invalid() {
        let html = r#"
            <html><head>
            <script type="application/ld+json">{"@context":"https://schema.org","@type":"Article","headline":"Hi"}</script>
            <script type="application/ld+json">{not json</script>
            </head><body></body></html>
        "#;
        let data = extract_all(html);
        assert_eq!(data.json_ld.len(), 1);
        assert_eq!(data.json_ld[0]["@type"], "Article");
    }

    #[test]
    fn json_ld_without_required_keys_is_dropped() {
        let html = r#"
            <html><head>
            <script type="application/ld+json">{"name":"no schema markers"}</script>
            <script type="application/ld+json">[{"@context":"https://schema.org","@type":"Person","name":"Jo"}]</script>
            </head></html>
        "#;
        let data = extract_all(html);
        assert_eq!(data.json_ld.len(), 1);
        assert!(data.json_ld[0].is_array());
    }

    #[test]
    fn prefixes_are_stripped() {
        let html = r#"
            <html><head>
            <meta property="og:title" content="OG Title">
            <meta name="twitter:card" content="summary">
            <meta name="description" content="plain desc">
            </head></html>
        "#;
        let data = extract_all(html);
        assert_eq!(data.open_graph.get("title").map(String::as_str), Some("OG Title"));
        assert_eq!(data.twitter_card.get("card").map(String::as_str), Some("summary"));
        assert_eq!(data.meta.get("description").map(String::as_str), Some("plain desc"));
        assert!(!data.meta.contains_key("og:title"));
    }

    #[test]
    fn language_prefers_html_lang_primary_subtag() {
        let html = r#"<html lang="en-US"><head></head><body></body></html>"#;
        let data = extract_all(html);
        assert_eq!(data.meta.get("language").map(String::as_str), Some("en"));
    }

    #[test]
    fn language_falls_back_to_og_locale() {
        let html = r#"<html><head><meta property="og:locale" content="fr_FR"></head></html>"#;
        let data = extract_all(html);
        assert_eq!(data.meta.get("language").map(String::as_str), Some("fr"));
    }

    #[test]
    fn language_is_empty_string_when_unknown() {
        let data = extract_all("<html><body><p>hello</p></body></html>");
        assert_eq!(data.meta.get("language").map(String::as_str), Some(""));
    }
}
