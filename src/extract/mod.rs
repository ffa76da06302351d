//! Content extraction: cleaned HTML, markdown, and a flat metadata map.
//!
//! Order matters: metadata is read from the raw HTML first because cleaning
//! strips the meta/link tags it needs; main-content selection (when
//! requested) narrows the document before cleaning and rendering.

pub mod clean;
pub mod main_content;
pub mod markdown;
pub mod metadata;

pub use clean::clean_html;
pub use main_content::select_main_content;
pub use markdown::render_markdown;
pub use metadata::extract_metadata;

use anyhow::{Context, Result};
use std::collections::BTreeMap;

/// Output of one extraction pass over raw HTML.
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    /// Cleaned HTML (main content only when `only_main` was set).
    pub html: String,
    /// Markdown rendering of the cleaned HTML.
    pub markdown: String,
    /// Flat metadata map from the full raw document.
    pub metadata: BTreeMap<String, String>,
}

/// Run the full extraction pipeline.
pub fn extract_content(raw_html: &str, only_main: bool) -> Result<ExtractedContent> {
    let metadata = extract_metadata(raw_html);

    let scoped = if only_main {
        select_main_content(raw_html).unwrap_or_else(|| raw_html.to_string())
    } else {
        raw_html.to_string()
    };

    let html = clean_html(&scoped).context("failed to clean HTML")?;
    let markdown = render_markdown(&html);

    Ok(ExtractedContent {
        html,
        markdown,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html lang="en">
        <head>
            <title>Sample</title>
            <meta name="description" content="About things.">
        </head>
        <body>
            <nav>Top navigation</nav>
            <main>
                <h1>Welcome</h1>
                <script>tracker()</script>
                <p>Real <strong>content</strong> here.</p>
            </main>
            <footer>Copyright</footer>
        </body>
        </html>
    "#;

    #[test]
    fn pipeline_scopes_cleans_and_renders() -> Result<()> {
        let result = extract_content(PAGE, true)?;
        assert!(result.markdown.contains("# Welcome"));
        assert!(result.markdown.contains("**content**"));
        assert!(!result.markdown.contains("tracker"));
        assert!(!result.markdown.contains("Top navigation"));
        assert!(!result.html.contains("<script"));
        assert_eq!(result.metadata.get("title").map(String::as_str), Some("Sample"));
        assert_eq!(result.metadata.get("language").map(String::as_str), Some("en"));
        Ok(())
    }

    #[test]
    fn full_page_mode_keeps_body_but_still_cleans() -> Result<()> {
        let result = extract_content(PAGE, false)?;
        // nav has no landmark descendant, so it is dropped even outside
        // main-content mode
        assert!(!result.html.contains("Top navigation"));
        assert!(result.markdown.contains("# Welcome"));
        assert!(!result.markdown.contains("<script>"));
        Ok(())
    }

    #[test]
    fn markdown_never_carries_script_or_style() -> Result<()> {
        let html = r"<main><style>.x{}</style><p>a</p><script>b()</script></main>";
        let result = extract_content(html, true)?;
        assert!(!result.markdown.contains("<script"));
        assert!(!result.markdown.contains("<style"));
        assert!(!result.markdown.contains("b()"));
        Ok(())
    }
}
