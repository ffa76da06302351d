//! HTML cleaning: drop non-content elements, keep a tight attribute set.
//!
//! The cleaner walks the parsed DOM once and re-serializes it, skipping
//! `<script>`, `<style>`, `<iframe>`, `<noscript>`, `<meta>`, `<link>` and
//! comment nodes. `<nav>`, `<footer>` and `<header>` are dropped only when
//! they do not wrap real content (a descendant `<main>`, `<article>` or
//! `<section>`). Metadata must be extracted before cleaning since meta/link
//! tags do not survive.

use anyhow::Result;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

/// Maximum HTML input size (10 MB). Real pages sit far below this; anything
/// larger is treated as hostile input.
pub(crate) const MAX_HTML_SIZE: usize = 10 * 1024 * 1024;

/// Tags removed unconditionally, with their entire subtree.
const STRIP_TAGS: &[&str] = &["script", "style", "iframe", "noscript", "meta", "link"];

/// Chrome tags removed unless they contain a content landmark.
const CHROME_TAGS: &[&str] = &["nav", "footer", "header"];

/// Attributes kept on surviving elements, next to any `data-*` / `aria-*`.
const KEPT_ATTRS: &[&str] = &[
    "href", "src", "alt", "title", "class", "id", "role", "type", "rel", "target",
];

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

static LANDMARK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("main, article, section")
        .expect("BUG: hardcoded CSS selector 'main, article, section' is invalid")
});

/// Clean an HTML document or fragment.
pub fn clean_html(html: &str) -> Result<String> {
    if html.len() > MAX_HTML_SIZE {
        return Err(anyhow::anyhow!(
            "HTML input too large: {} bytes, maximum allowed is {} bytes",
            html.len(),
            MAX_HTML_SIZE
        ));
    }

    let document = Html::parse_document(html);
    let root = document.root_element();

    let mut out = String::with_capacity(html.len() / 2);
    serialize_element(&root, &mut out);
    Ok(out)
}

fn keep_attr(name: &str) -> bool {
    KEPT_ATTRS.contains(&name) || name.starts_with("data-") || name.starts_with("aria-")
}

/// Whether an element should be dropped with its whole subtree.
fn should_strip(element: &ElementRef) -> bool {
    let name = element.value().name();
    if STRIP_TAGS.contains(&name) {
        return true;
    }
    if CHROME_TAGS.contains(&name) {
        // Keep page chrome only when it wraps a content landmark
        return element.select(&LANDMARK_SELECTOR).next().is_none();
    }
    false
}

fn serialize_element(element: &ElementRef, out: &mut String) {
    let name = element.value().name();

    out.push('<');
    out.push_str(name);
    for (attr_name, value) in element.value().attrs() {
        if !keep_attr(attr_name) {
            continue;
        }
        out.push(' ');
        out.push_str(attr_name);
        out.push_str("=\"");
        push_escaped(value, out, true);
        out.push('"');
    }
    out.push('>');

    if VOID_ELEMENTS.contains(&name) {
        return;
    }

    serialize_children(element, out);

    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn serialize_children(element: &ElementRef, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => push_escaped(text, out, false),
            Node::Element(_) => {
                if let Some(child_elem) = ElementRef::wrap(child) {
                    if should_strip(&child_elem) {
                        continue;
                    }
                    serialize_element(&child_elem, out);
                }
            }
            // Comments and doctypes do not survive cleaning
            _ => {}
        }
    }
}

fn push_escaped(text: &str, out: &mut String, in_attr: bool) {
    for ch in text.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' if in_attr => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_scripts_and_styles() -> Result<()> {
        let html = r#"<div><script>alert('x')</script><style>.a{}</style><p>Content</p></div>"#;
        let result = clean_html(html)?;
        assert!(!result.contains("<script"));
        assert!(!result.contains("alert"));
        assert!(!result.contains("<style"));
        assert!(result.contains("Content"));
        Ok(())
    }

    #[test]
    fn removes_iframes_noscript_and_comments() -> Result<()> {
        let html = r#"<div><!-- hidden --><iframe src="ads"></iframe><noscript>no js</noscript><p>Keep</p></div>"#;
        let result = clean_html(html)?;
        assert!(!result.contains("hidden"));
        assert!(!result.contains("iframe"));
        assert!(!result.contains("no js"));
        assert!(result.contains("Keep"));
        Ok(())
    }

    #[test]
    fn drops_empty_chrome_but_keeps_wrapping_chrome() -> Result<()> {
        let html = r"
            <body>
                <nav>Menu</nav>
                <header><section><p>Hero</p></section></header>
                <footer>Legal</footer>
            </body>
        ";
        let result = clean_html(html)?;
        assert!(!result.contains("Menu"));
        assert!(!result.contains("Legal"));
        assert!(result.contains("Hero"));
        Ok(())
    }

    #[test]
    fn filters_attributes_to_allowlist() -> Result<()> {
        let html = r#"<a href="/x" onclick="evil()" style="color:red" data-kind="doc" aria-label="x" tabindex="3">link</a>"#;
        let result = clean_html(html)?;
        assert!(result.contains(r#"href="/x""#));
        assert!(result.contains(r#"data-kind="doc""#));
        assert!(result.contains(r#"aria-label="x""#));
        assert!(!result.contains("onclick"));
        assert!(!result.contains("style="));
        assert!(!result.contains("tabindex"));
        Ok(())
    }

    #[test]
    fn removes_meta_and_link_tags() -> Result<()> {
        let html = r#"<html><head><meta name="a" content="b"><link rel="stylesheet" href="s.css"></head><body><p>Body</p></body></html>"#;
        let result = clean_html(html)?;
        assert!(!result.contains("<meta"));
        assert!(!result.contains("<link"));
        assert!(result.contains("Body"));
        Ok(())
    }

    #[test]
    fn oversized_input_is_rejected() {
        let huge = "x".repeat(MAX_HTML_SIZE + 1);
        assert!(clean_html(&huge).is_err());
    }
}
