//! Flat page-metadata extraction.
//!
//! Produces a single string map: the well-known fields (`title`,
//! `description`, `language`, `author`, ...) plus the full OpenGraph and
//! Twitter Card sets under their native prefixed keys. `language` is always
//! present, empty when unknown. Runs on raw HTML before cleaning strips the
//! meta/link tags it reads.

use crate::structured::extract_language;
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("BUG: hardcoded title selector is invalid"));

static META_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta").expect("BUG: hardcoded meta selector is invalid"));

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("link").expect("BUG: hardcoded link selector is invalid"));

static TIME_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("time[datetime]").expect("BUG: hardcoded time selector is invalid")
});

/// Extract the flat metadata map from raw HTML.
#[must_use]
pub fn extract_metadata(html: &str) -> BTreeMap<String, String> {
    let document = Html::parse_document(html);
    let mut map = BTreeMap::new();

    // Every <meta name|property> pair goes in under its native key; the
    // prefixed OpenGraph/Twitter sets ride along unchanged.
    let mut charset = None;
    for tag in document.select(&META_SELECTOR) {
        if let Some(cs) = tag.value().attr("charset") {
            charset = Some(cs.trim().to_string());
        }
        let name = tag
            .value()
            .attr("name")
            .or_else(|| tag.value().attr("property"));
        let (Some(name), Some(content)) = (name, tag.value().attr("content")) else {
            continue;
        };
        let content = content.trim();
        if !name.is_empty() && !content.is_empty() {
            map.insert(name.to_string(), content.to_string());
        }
    }
    if let Some(cs) = charset {
        map.insert("charset".to_string(), cs);
    }

    // Title from <title>, with og:title as fallback
    let title = document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| map.get("og:title").cloned());
    if let Some(title) = title {
        map.insert("title".to_string(), title);
    }

    if !map.contains_key("description") {
        if let Some(desc) = map.get("og:description").cloned() {
            map.insert("description".to_string(), desc);
        }
    }

    // Published date: article meta first, then any <time datetime>
    if !map.contains_key("published_date") {
        let published = map
            .get("article:published_time")
            .cloned()
            .or_else(|| {
                document
                    .select(&TIME_SELECTOR)
                    .next()
                    .and_then(|t| t.value().attr("datetime"))
                    .map(str::to_string)
            });
        if let Some(published) = published {
            map.insert("published_date".to_string(), published);
        }
    }

    // Canonical URL and favicon from <link>
    for link in document.select(&LINK_SELECTOR) {
        let (Some(rel), Some(href)) = (link.value().attr("rel"), link.value().attr("href")) else {
            continue;
        };
        match rel {
            "canonical" => {
                map.insert("canonical_url".to_string(), href.trim().to_string());
            }
            "icon" | "shortcut icon" => {
                map.entry("favicon".to_string())
                    .or_insert_with(|| href.trim().to_string());
            }
            _ => {}
        }
    }

    // Language is always present, empty string when unknown
    map.insert("language".to_string(), extract_language(&document));

    map
}
