//! Full extraction pipeline over realistic page fixtures.

use scrapeforge::extract::{extract_content, render_markdown};

const ARTICLE_PAGE: &str = r#"
<html lang="de-DE">
<head>
    <title>Die Seite</title>
    <meta name="description" content="Eine Beschreibung.">
    <meta property="og:title" content="OG Titel">
    <meta name="twitter:card" content="summary_large_image">
    <link rel="canonical" href="https://beispiel.test/artikel">
    <style>.hero { color: red; }</style>
</head>
<body>
    <nav><a href="/home">Home</a></nav>
    <main>
        <h1>Der Artikel</h1>
        <p>Erster Absatz mit <em>Betonung</em> und <strong>Gewicht</strong>.</p>
        <img src="/bilder/foto.jpg">
        <ul>
            <li>Punkt eins</li>
            <li>Punkt zwei</li>
        </ul>
        <pre><code class="language-python">print("hi")</code></pre>
        <script>analytics.track()</script>
    </main>
    <footer>Impressum</footer>
</body>
</html>
"#;

#[test]
fn article_extraction_produces_all_three_outputs() {
    let result = extract_content(ARTICLE_PAGE, true).expect("extraction succeeds");

    // Markdown carries the content, not the chrome
    assert!(result.markdown.contains("# Der Artikel"));
    assert!(result.markdown.contains("*Betonung*"));
    assert!(result.markdown.contains("**Gewicht**"));
    assert!(result.markdown.contains("- Punkt eins"));
    assert!(result.markdown.contains("```python"));
    assert!(!result.markdown.contains("Impressum"));
    assert!(!result.markdown.contains("analytics"));

    // Cleaned HTML is script/style free
    assert!(!result.html.contains("<script"));
    assert!(!result.html.contains("<style"));

    // Metadata came from the full document, before scoping
    assert_eq!(
        result.metadata.get("title").map(String::as_str),
        Some("Die Seite")
    );
    assert_eq!(
        result.metadata.get("language").map(String::as_str),
        Some("de")
    );
    assert_eq!(
        result.metadata.get("canonical_url").map(String::as_str),
        Some("https://beispiel.test/artikel")
    );
    assert_eq!(
        result.metadata.get("og:title").map(String::as_str),
        Some("OG Titel")
    );
}

#[test]
fn image_without_alt_or_title_gets_defaults() {
    let result = extract_content(ARTICLE_PAGE, true).expect("extraction succeeds");
    assert!(
        result
            .markdown
            .contains(r#"![Image](/bilder/foto.jpg "foto.jpg")"#),
        "got: {}",
        result.markdown
    );
}

#[test]
fn markdown_of_cleaned_html_has_no_script_or_style_substrings() {
    // The extraction round-trip property, on a page dense with both
    let html = r"
        <main>
            <style>p { margin: 0 }</style>
            <p>visible</p>
            <script type='text/javascript'>var x = '<style>';</script>
        </main>
    ";
    let result = extract_content(html, true).expect("extraction succeeds");
    assert!(!result.markdown.contains("<script"));
    assert!(!result.markdown.contains("<style"));
    assert!(result.markdown.contains("visible"));
}

#[test]
fn two_extractions_are_byte_identical() {
    let a = extract_content(ARTICLE_PAGE, true).expect("first");
    let b = extract_content(ARTICLE_PAGE, true).expect("second");
    assert_eq!(a.markdown, b.markdown);
    assert_eq!(a.html, b.html);
    assert_eq!(a.metadata, b.metadata);
}

#[test]
fn tables_and_blockquotes_survive_the_pipeline() {
    let html = r"
        <main>
            <blockquote><p>ein Zitat</p></blockquote>
            <table>
                <tr><th>Spalte</th></tr>
                <tr><td>Wert</td></tr>
            </table>
        </main>
    ";
    let result = extract_content(html, true).expect("extraction succeeds");
    assert!(result.markdown.contains("> ein Zitat"));
    assert!(result.markdown.contains("| Spalte |"));
    assert!(result.markdown.contains("| Wert |"));
}

#[test]
fn renderer_collapses_blank_runs_to_two_newlines() {
    let md = render_markdown("<p>a</p><div></div><div></div><div></div><p>b</p>");
    assert!(!md.contains("\n\n\n"), "got: {md:?}");
}
