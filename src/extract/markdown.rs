//! HTML to Markdown rendering.
//!
//! A single DOM walk produces raw markdown, then a deterministic rewrite
//! pipeline tightens spacing: strip leftover comments, normalize non-breaking
//! spaces, repair heading/list markers, drop trailing spaces, collapse blank
//! runs. The pipeline is referentially transparent: identical input yields
//! identical output, with no line wrapping.

use scraper::node::Node;
use scraper::{ElementRef, Html};
use std::sync::LazyLock;

static HTML_COMMENT_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?s)<!--.*?-->").expect("BUG: hardcoded comment regex is invalid")
});

static HEADING_SPACING_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?m)^(#{1,6})([^#\s])").expect("BUG: hardcoded heading regex is invalid")
});

static LIST_SPACING_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?m)^(\s*)-([^\s\-])").expect("BUG: hardcoded list regex is invalid")
});

static TRAILING_SPACE_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?m)[ \t]+$").expect("BUG: hardcoded trailing-space regex is invalid")
});

static BLANK_RUN_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\n{3,}").expect("BUG: hardcoded blank-run regex is invalid")
});

/// Render HTML to line-wrap-free markdown.
#[must_use]
pub fn render_markdown(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::with_capacity(html.len() / 4);
    walk_children(&document.root_element(), &mut out, &mut RenderState::default());
    postprocess(&out)
}

/// The rewrite pipeline applied to raw rendered markdown.
#[must_use]
pub fn postprocess(markdown: &str) -> String {
    let step = HTML_COMMENT_RE.replace_all(markdown, "");
    let step = normalize_nbsp(&step);
    let step = HEADING_SPACING_RE.replace_all(&step, "$1 $2");
    let step = LIST_SPACING_RE.replace_all(&step, "$1- $2");
    let step = TRAILING_SPACE_RE.replace_all(&step, "");
    let step = BLANK_RUN_RE.replace_all(&step, "\n\n");
    step.trim().to_string()
}

fn normalize_nbsp(text: &str) -> String {
    text.replace("&nbsp;", " ").replace('\u{a0}', " ")
}

#[derive(Default)]
struct RenderState {
    /// Nesting depth of the current list, for indentation.
    list_depth: usize,
}

/// Ensure the output ends at a block boundary (two newlines), unless empty.
fn ensure_block_sep(out: &mut String) {
    if out.is_empty() {
        return;
    }
    while out.ends_with(' ') || out.ends_with('\t') {
        out.pop();
    }
    if out.ends_with("\n\n") {
        return;
    }
    if out.ends_with('\n') {
        out.push('\n');
    } else {
        out.push_str("\n\n");
    }
}

fn walk_children(element: &ElementRef, out: &mut String, state: &mut RenderState) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                push_collapsed_text(text, out);
            }
            Node::Element(_) => {
                if let Some(child_elem) = ElementRef::wrap(child) {
                    render_element(&child_elem, out, state);
                }
            }
            _ => {}
        }
    }
}

/// Append text with runs of whitespace collapsed to single spaces, the way a
/// browser lays out non-preformatted text.
fn push_collapsed_text(text: &str, out: &mut String) {
    let mut last_was_space = out.ends_with([' ', '\n']) || out.is_empty();
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
}

fn render_element(element: &ElementRef, out: &mut String, state: &mut RenderState) {
    let name = element.value().name();
    match name {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = name.as_bytes()[1] - b'0';
            ensure_block_sep(out);
            for _ in 0..level {
                out.push('#');
            }
            out.push(' ');
            out.push_str(inline_text(element).trim());
            ensure_block_sep(out);
        }
        "p" => {
            ensure_block_sep(out);
            walk_children(element, out, state);
            ensure_block_sep(out);
        }
        "em" | "i" => {
            let inner = render_inline(element, state);
            let inner = inner.trim();
            if !inner.is_empty() {
                out.push('*');
                out.push_str(inner);
                out.push('*');
            }
        }
        "strong" | "b" => {
            let inner = render_inline(element, state);
            let inner = inner.trim();
            if !inner.is_empty() {
                out.push_str("**");
                out.push_str(inner);
                out.push_str("**");
            }
        }
        "a" => render_anchor(element, out, state),
        "img" => render_image(element, out),
        "ul" => render_list(element, out, state, None),
        "ol" => render_list(element, out, state, Some(1)),
        "pre" => render_code_block(element, out),
        "code" => {
            let text: String = element.text().collect();
            let text = text.trim();
            if !text.is_empty() {
                out.push('`');
                out.push_str(text);
                out.push('`');
            }
        }
        "blockquote" => {
            let inner = render_block(element, state);
            ensure_block_sep(out);
            for line in inner.trim().lines() {
                out.push_str("> ");
                out.push_str(line);
                out.push('\n');
            }
            ensure_block_sep(out);
        }
        "br" => out.push('\n'),
        "hr" => {
            ensure_block_sep(out);
            out.push_str("---");
            ensure_block_sep(out);
        }
        "table" => render_table(element, out),
        // Head-only leftovers carry no renderable content
        "title" => {}
        _ => walk_children(element, out, state),
    }
}

/// Render an element's children into a fresh buffer (block context).
fn render_block(element: &ElementRef, state: &mut RenderState) -> String {
    let mut buf = String::new();
    walk_children(element, &mut buf, state);
    buf
}

/// Render an element's children into a fresh buffer and flatten newlines,
/// for inline contexts such as link labels and table cells.
fn render_inline(element: &ElementRef, state: &mut RenderState) -> String {
    let buf = render_block(element, state);
    collapse_inline(&buf)
}

fn collapse_inline(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = true;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    out.trim().to_string()
}

/// Plain text content of an element, whitespace-collapsed.
fn inline_text(element: &ElementRef) -> String {
    collapse_inline(&element.text().collect::<String>())
}

fn render_anchor(element: &ElementRef, out: &mut String, state: &mut RenderState) {
    let label = render_inline(element, state);
    match element.value().attr("href") {
        Some(href) if !href.is_empty() => {
            let label: &str = if label.is_empty() { href } else { label.as_str() };
            out.push('[');
            out.push_str(label);
            out.push_str("](");
            out.push_str(href);
            out.push(')');
        }
        _ => out.push_str(&label),
    }
}

fn render_image(element: &ElementRef, out: &mut String) {
    let Some(src) = element.value().attr("src").filter(|s| !s.is_empty()) else {
        return;
    };
    let alt = element
        .value()
        .attr("alt")
        .filter(|a| !a.trim().is_empty())
        .unwrap_or("Image");
    let title = element
        .value()
        .attr("title")
        .map(str::to_string)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| filename_from_src(src));

    ensure_block_sep(out);
    out.push_str("![");
    out.push_str(alt.trim());
    out.push_str("](");
    out.push_str(src);
    if !title.is_empty() {
        out.push_str(" \"");
        out.push_str(&title);
        out.push('"');
    }
    out.push(')');
    ensure_block_sep(out);
}

/// Default image title: the filename portion of the source, query stripped.
fn filename_from_src(src: &str) -> String {
    src.rsplit('/')
        .next()
        .unwrap_or(src)
        .split('?')
        .next()
        .unwrap_or("")
        .to_string()
}

fn render_list(
    element: &ElementRef,
    out: &mut String,
    state: &mut RenderState,
    ordered_from: Option<usize>,
) {
    if state.list_depth == 0 {
        ensure_block_sep(out);
    } else if !out.ends_with('\n') {
        out.push('\n');
    }

    state.list_depth += 1;
    let indent = "  ".repeat(state.list_depth - 1);
    let mut counter = ordered_from;

    for child in element.children() {
        let Some(li) = ElementRef::wrap(child) else {
            continue;
        };
        if li.value().name() != "li" {
            continue;
        }
        let marker = match counter {
            Some(n) => {
                counter = Some(n + 1);
                format!("{n}. ")
            }
            None => "- ".to_string(),
        };
        let body = render_block(&li, state);
        let body = body.trim();
        out.push_str(&indent);
        out.push_str(&marker);
        // Nested lists inside the item keep their own line structure
        for (i, line) in body.lines().enumerate() {
            if i > 0 {
                out.push('\n');
                out.push_str(&indent);
                out.push_str("  ");
            }
            out.push_str(line.trim_end());
        }
        out.push('\n');
    }

    state.list_depth -= 1;
    if state.list_depth == 0 {
        ensure_block_sep(out);
    }
}

fn render_code_block(element: &ElementRef, out: &mut String) {
    // Language from pre/code class="language-x" or data-language
    let mut language = code_language(element);
    let mut code_text: Option<String> = None;
    for child in element.children() {
        if let Some(code) = ElementRef::wrap(child) {
            if code.value().name() == "code" {
                if language.is_empty() {
                    language = code_language(&code);
                }
                code_text = Some(code.text().collect());
                break;
            }
        }
    }
    let text = code_text.unwrap_or_else(|| element.text().collect());
    let text = text.trim_matches('\n');

    ensure_block_sep(out);
    out.push_str("```");
    out.push_str(&language);
    out.push('\n');
    out.push_str(text);
    out.push_str("\n```");
    ensure_block_sep(out);
}

fn code_language(element: &ElementRef) -> String {
    if let Some(lang) = element.value().attr("data-language") {
        return lang.to_string();
    }
    if let Some(class) = element.value().attr("class") {
        for token in class.split_whitespace() {
            if let Some(lang) = token.strip_prefix("language-") {
                return lang.to_string();
            }
        }
    }
    String::new()
}

fn render_table(element: &ElementRef, out: &mut String) {
    let mut rows: Vec<Vec<String>> = Vec::new();
    collect_table_rows(element, &mut rows);
    if rows.is_empty() {
        return;
    }

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    ensure_block_sep(out);
    for (i, row) in rows.iter().enumerate() {
        out.push('|');
        for col in 0..width {
            out.push(' ');
            out.push_str(row.get(col).map(String::as_str).unwrap_or(""));
            out.push_str(" |");
        }
        out.push('\n');
        if i == 0 {
            out.push('|');
            for _ in 0..width {
                out.push_str(" --- |");
            }
            out.push('\n');
        }
    }
    ensure_block_sep(out);
}

fn collect_table_rows(element: &ElementRef, rows: &mut Vec<Vec<String>>) {
    for child in element.children() {
        let Some(child_elem) = ElementRef::wrap(child) else {
            continue;
        };
        match child_elem.value().name() {
            "thead" | "tbody" | "tfoot" => collect_table_rows(&child_elem, rows),
            "tr" => {
                let mut cells = Vec::new();
                for cell in child_elem.children() {
                    if let Some(cell_elem) = ElementRef::wrap(cell) {
                        if matches!(cell_elem.value().name(), "td" | "th") {
                            cells.push(inline_text(&cell_elem).replace('|', "\\|"));
                        }
                    }
                }
                if !cells.is_empty() {
                    rows.push(cells);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_map_to_hash_levels() {
        let md = render_markdown("<h1>Top</h1><h3>Deep</h3>");
        assert!(md.contains("# Top"));
        assert!(md.contains("### Deep"));
    }

    #[test]
    fn emphasis_and_strong_markers() {
        let md = render_markdown("<p>be <em>gentle</em> but <strong>firm</strong></p>");
        assert!(md.contains("*gentle*"));
        assert!(md.contains("**firm**"));
    }

    #[test]
    fn links_render_with_labels() {
        let md = render_markdown(r#"<p><a href="/docs">the docs</a></p>"#);
        assert!(md.contains("[the docs](/docs)"));
    }

    #[test]
    fn image_defaults_alt_and_title() {
        let md = render_markdown(r#"<img src="/img/photo.png?v=2">"#);
        assert!(md.contains(r#"![Image](/img/photo.png?v=2 "photo.png")"#), "got: {md}");
    }

    #[test]
    fn image_keeps_explicit_alt_and_title() {
        let md = render_markdown(r#"<img src="/a.png" alt="Diagram" title="The diagram">"#);
        assert!(md.contains(r#"![Diagram](/a.png "The diagram")"#));
    }

    #[test]
    fn lists_preserve_structure() {
        let md = render_markdown("<ul><li>one</li><li>two</li></ul><ol><li>first</li></ol>");
        assert!(md.contains("- one\n- two"));
        assert!(md.contains("1. first"));
    }

    #[test]
    fn nested_lists_indent() {
        let md = render_markdown("<ul><li>outer<ul><li>inner</li></ul></li></ul>");
        assert!(md.contains("- outer"));
        assert!(md.contains("  - inner"), "got: {md}");
    }

    #[test]
    fn code_blocks_are_fenced_with_language() {
        let md =
            render_markdown(r#"<pre><code class="language-rust">fn main() {}</code></pre>"#);
        assert!(md.contains("```rust\nfn main() {}\n```"), "got: {md}");
    }

    #[test]
    fn inline_code_uses_backticks() {
        let md = render_markdown("<p>call <code>foo()</code> now</p>");
        assert!(md.contains("`foo()`"));
    }

    #[test]
    fn tables_are_preserved() {
        let md = render_markdown(
            "<table><tr><th>Name</th><th>Age</th></tr><tr><td>Ada</td><td>36</td></tr></table>",
        );
        assert!(md.contains("| Name | Age |"));
        assert!(md.contains("| --- | --- |"));
        assert!(md.contains("| Ada | 36 |"));
    }

    #[test]
    fn blockquotes_are_prefixed() {
        let md = render_markdown("<blockquote><p>quoted line</p></blockquote>");
        assert!(md.contains("> quoted line"));
    }

    #[test]
    fn postprocess_collapses_blank_runs() {
        assert_eq!(postprocess("a\n\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn postprocess_normalizes_nbsp_and_trailing_spaces() {
        assert_eq!(postprocess("a\u{a0}b&nbsp;c   \nnext"), "a b c\nnext");
    }

    #[test]
    fn postprocess_repairs_heading_and_list_markers() {
        assert_eq!(postprocess("#Title"), "# Title");
        assert_eq!(postprocess("-item"), "- item");
    }

    #[test]
    fn postprocess_is_idempotent() {
        let raw = "#Title\n\n\n\ntext   \n-item\u{a0}x";
        let once = postprocess(raw);
        assert_eq!(postprocess(&once), once);
    }

    #[test]
    fn rendering_is_deterministic() {
        let html = "<h1>T</h1><p>body <em>x</em></p><ul><li>a</li></ul>";
        assert_eq!(render_markdown(html), render_markdown(html));
    }
}
