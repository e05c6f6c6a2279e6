//! Link extraction: every `<a href>` not pointing at a fragment or a
//! non-network scheme, resolved to an absolute URL and deduplicated in
//! first-seen order. Port of `extractor.py::extract_links`.

use crate::types::ExtractedLink;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;

const MAX_LINK_TEXT_CHARS: usize = 200;
const SKIPPED_PREFIXES: [&str; 4] = ["#", "javascript:", "mailto:", "tel:"];

static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").expect("static selector"));

/// Extract all anchors from `html`, resolved against `url` and classified
/// `is_external` by host comparison against `url`'s host.
pub fn extract_links(html: &str, url: &str) -> Vec<ExtractedLink> {
    if html.is_empty() {
        return Vec::new();
    }

    let Ok(base) = url::Url::parse(url) else {
        return Vec::new();
    };
    let base_host = base.host_str().unwrap_or_default();

    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for anchor in document.select(&ANCHOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if href.is_empty() || SKIPPED_PREFIXES.iter().any(|p| href.starts_with(p)) {
            continue;
        }

        let Ok(absolute) = base.join(href) else {
            continue;
        };
        let absolute_url = absolute.to_string();
        if !seen.insert(absolute_url.clone()) {
            continue;
        }

        let text: String = anchor.text().collect::<String>().trim().to_string();
        let text = crate::utils::safe_truncate_chars(&text, MAX_LINK_TEXT_CHARS).to_string();
        let is_external = absolute.host_str().unwrap_or_default() != base_host;

        links.push(ExtractedLink {
            url: absolute_url,
            text,
            is_external,
        });
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_and_classifies_links() {
        let html = r#"<a href="https://example.com/other">Other Page</a>
            <a href="https://elsewhere.example/page">External</a>"#;
        let links = extract_links(html, "https://example.com/page");
        assert_eq!(links.len(), 2);
        assert!(!links[0].is_external);
        assert!(links[1].is_external);
    }

    #[test]
    fn skips_fragments_and_pseudo_schemes() {
        let html = r#"<a href="#top">Top</a>
            <a href="javascript:void(0)">JS</a>
            <a href="mailto:a@b.com">Mail</a>
            <a href="tel:+15551234">Call</a>
            <a href="/ok">Ok</a>"#;
        let links = extract_links(html, "https://example.com/page");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://example.com/ok");
    }

    #[test]
    fn deduplicates_by_absolute_url_in_first_seen_order() {
        let html = r#"<a href="/a">First</a><a href="/a">Second</a>"#;
        let links = extract_links(html, "https://example.com/");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].text, "First");
    }

    #[test]
    fn truncates_link_text_to_200_chars() {
        let long_text = "x".repeat(500);
        let html = format!(r#"<a href="/a">{long_text}</a>"#);
        let links = extract_links(&html, "https://example.com/");
        assert_eq!(links[0].text.chars().count(), 200);
    }
}
