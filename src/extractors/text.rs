//! Clean body text extraction.
//!
//! The original (`extractor.py::extract_text`) prefers `trafilatura` and
//! falls back to a BeautifulSoup tag-strip when it yields nothing. There is
//! no `trafilatura` equivalent in the Rust ecosystem, so the primary path
//! here is the `readability` crate (grounded on the `web-loader-engine`
//! example's use of it for the same purpose); the DOM tree-walk fallback
//! mirrors the BS4 fallback tag-for-tag.

use scraper::node::Node;
use scraper::{ElementRef, Html};
use std::io::Cursor;

const SKIP_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "noscript", "iframe", "svg",
];

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "li", "h1", "h2", "h3", "h4", "h5", "h6", "tr", "blockquote", "pre",
    "section", "article", "table", "ul", "ol",
];

/// Extract clean text from an HTML document, truncated to `max_len` bytes.
pub fn extract_text(html: &str, max_len: usize) -> String {
    if html.is_empty() {
        return String::new();
    }

    let text = extract_with_readability(html).unwrap_or_default();
    let text = if text.trim().is_empty() {
        extract_with_dom_walk(html)
    } else {
        text
    };

    truncate(&text, max_len)
}

fn extract_with_readability(html: &str) -> Option<String> {
    let url = url::Url::parse("http://localhost/").ok()?;
    let mut cursor = Cursor::new(html.as_bytes());
    let product = readability::extractor::extract(&mut cursor, &url).ok()?;
    if product.text.trim().is_empty() {
        None
    } else {
        Some(product.text)
    }
}

/// Strip the same boilerplate tag set via a plain DOM walk, collecting text
/// with a newline after every block-level element and collapsing the
/// resulting runs of blank lines.
fn extract_with_dom_walk(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut buf = String::new();
    walk(document.root_element(), &mut buf);
    collapse_blank_lines(&buf)
}

fn walk(el: ElementRef<'_>, out: &mut String) {
    let tag = el.value().name();
    if SKIP_TAGS.contains(&tag) {
        return;
    }

    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    walk(child_el, out);
                }
            }
            _ => {}
        }
    }

    if BLOCK_TAGS.contains(&tag) {
        out.push('\n');
    }
}

fn collapse_blank_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        text.to_string()
    } else {
        crate::utils::safe_truncate_chars(text, max_len).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_html_yields_empty_text() {
        assert_eq!(extract_text("", 1000), "");
    }

    #[test]
    fn dom_walk_strips_boilerplate_tags() {
        let html = r#"<html><body>
            <nav>Site Nav</nav>
            <header>Header</header>
            <p>Hello from a static page.</p>
            <script>alert(1)</script>
            <footer>Footer</footer>
        </body></html>"#;
        let text = extract_with_dom_walk(html);
        assert!(text.contains("Hello from a static page."));
        assert!(!text.contains("Site Nav"));
        assert!(!text.contains("alert(1)"));
        assert!(!text.contains("Footer"));
    }

    #[test]
    fn dom_walk_inserts_block_separators() {
        let html = "<html><body><p>First</p><p>Second</p></body></html>";
        let text = extract_with_dom_walk(html);
        assert_eq!(text, "First\nSecond");
    }

    #[test]
    fn respects_max_content_length() {
        let html = "<html><body><p>aaaaaaaaaa</p></body></html>";
        let text = extract_text(html, 5);
        assert!(text.len() <= 5);
    }
}
