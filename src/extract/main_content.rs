//! Main-content selection heuristics.
//!
//! Isolates the semantic body of a page from its chrome by trying containers
//! in priority order: `<main>`, `<article>`, a div whose id/class mentions
//! content/main/article, an element with `role="main"`, and finally the
//! single `<div>`/`<section>` carrying the most text.

use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

// Parsed once at first access and cached forever. Hardcoded selectors never
// fail to parse.

static MAIN_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("main").expect("BUG: hardcoded CSS selector 'main' is invalid")
});

static ARTICLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("article").expect("BUG: hardcoded CSS selector 'article' is invalid")
});

static DIV_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div").expect("BUG: hardcoded CSS selector 'div' is invalid"));

static ROLE_MAIN_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("[role='main']").expect("BUG: hardcoded CSS selector [role='main'] is invalid")
});

static CONTAINER_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div, section").expect("BUG: hardcoded CSS selector 'div, section' is invalid")
});

static CONTENT_NAME_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)content|main|article").expect("BUG: hardcoded regex is invalid")
});

/// Select the main content container from an HTML document, returning its
/// outer HTML. None when the document has no candidate at all.
#[must_use]
pub fn select_main_content(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    if let Some(element) = document.select(&MAIN_SELECTOR).next() {
        return Some(element.html());
    }
    if let Some(element) = document.select(&ARTICLE_SELECTOR).next() {
        return Some(element.html());
    }

    // A div advertising itself as content via id or class
    for div in document.select(&DIV_SELECTOR) {
        let id_matches = div
            .value()
            .attr("id")
            .is_some_and(|id| CONTENT_NAME_RE.is_match(id));
        let class_matches = div
            .value()
            .attr("class")
            .is_some_and(|class| CONTENT_NAME_RE.is_match(class));
        if id_matches || class_matches {
            return Some(div.html());
        }
    }

    if let Some(element) = document.select(&ROLE_MAIN_SELECTOR).next() {
        return Some(element.html());
    }

    // Last resort: the container with the largest text content
    document
        .select(&CONTAINER_SELECTOR)
        .max_by_key(text_len)
        .map(|element| element.html())
}

fn text_len(element: &ElementRef) -> usize {
    element.text().map(str::len).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_takes_priority_over_article() {
        let html = r"
            <html><body>
                <article><p>Article</p></article>
                <main><p>Main</p></main>
            </body></html>
        ";
        let result = select_main_content(html).expect("container found");
        assert!(result.contains("<main>"));
        assert!(result.contains("Main"));
        assert!(!result.contains("Article"));
    }

    #[test]
    fn article_selected_when_no_main() {
        let html = r"
            <html><body>
                <nav>Navigation</nav>
                <article><p>Article content</p></article>
            </body></html>
        ";
        let result = select_main_content(html).expect("container found");
        assert!(result.contains("Article content"));
        assert!(!result.contains("Navigation"));
    }

    #[test]
    fn content_div_matched_by_class() {
        let html = r#"
            <html><body>
                <div class="sidebar">Aside</div>
                <div class="page-content"><p>Body text</p></div>
            </body></html>
        "#;
        let result = select_main_content(html).expect("container found");
        assert!(result.contains("Body text"));
        assert!(!result.contains("Aside"));
    }

    #[test]
    fn role_main_is_honored() {
        let html = r#"
            <html><body>
                <span role="main"><p>Role main</p></span>
            </body></html>
        "#;
        let result = select_main_content(html).expect("container found");
        assert!(result.contains("Role main"));
    }

    #[test]
    fn largest_container_wins_as_fallback() {
        let html = r"
            <html><body>
                <section><p>tiny</p></section>
                <section><p>this section has substantially more text than the other</p></section>
            </body></html>
        ";
        let result = select_main_content(html).expect("container found");
        assert!(result.contains("substantially more text"));
    }

    #[test]
    fn no_candidate_returns_none() {
        assert!(select_main_content("<p>bare paragraph</p>").is_none());
    }
}
