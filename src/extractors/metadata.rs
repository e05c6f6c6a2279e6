//! Page metadata extraction: title, description, Open Graph tags, language,
//! canonical URL, author, and published date.
//!
//! Field-for-field port of `extractor.py::extract_metadata` and its
//! `_get_*` helpers, using `scraper` selectors instead of BeautifulSoup.

use crate::types::PageMetadata;
use scraper::{Html, Selector};
use std::sync::LazyLock;

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("static selector"));
static META_DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="description"]"#).expect("static selector"));
static META_AUTHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="author"]"#).expect("static selector"));
static OG_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[property="og:title"]"#).expect("static selector"));
static OG_DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[property="og:description"]"#).expect("static selector")
});
static OG_IMAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[property="og:image"]"#).expect("static selector"));
static HTML_LANG: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("html").expect("static selector"));
static CANONICAL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"link[rel="canonical"]"#).expect("static selector"));
static ARTICLE_PUBLISHED_TIME: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[property="article:published_time"]"#).expect("static selector")
});
static META_DATE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="date"]"#).expect("static selector"));
static META_PUBDATE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="pubdate"]"#).expect("static selector"));
static META_PUBLISHDATE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="publishdate"]"#).expect("static selector"));
static META_DATE_PUBLISHED_ITEMPROP: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[itemprop="datePublished"]"#).expect("static selector")
});
static TIME_DATETIME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("time[datetime]").expect("static selector"));

/// Extract `PageMetadata` from `html`, resolving relative URLs (`og:image`,
/// `canonical`) against `url`.
pub fn extract_metadata(html: &str, url: &str) -> PageMetadata {
    if html.is_empty() {
        return PageMetadata::default();
    }

    let document = Html::parse_document(html);

    PageMetadata {
        title: text_of(&document, &TITLE),
        description: meta_content(&document, &META_DESCRIPTION),
        og_title: meta_content(&document, &OG_TITLE),
        og_description: meta_content(&document, &OG_DESCRIPTION),
        og_image: resolve(meta_content(&document, &OG_IMAGE), url),
        language: html_lang(&document),
        canonical_url: canonical(&document, url),
        author: meta_content(&document, &META_AUTHOR),
        published_date: published_date(&document),
        pdf_pages: None,
        pdf_author: None,
        pdf_created_date: None,
    }
}

fn text_of(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn meta_content(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn html_lang(document: &Html) -> Option<String> {
    document
        .select(&HTML_LANG)
        .next()
        .and_then(|el| el.value().attr("lang"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn canonical(document: &Html, base_url: &str) -> Option<String> {
    let href = document
        .select(&CANONICAL)
        .next()
        .and_then(|el| el.value().attr("href"))
        .map(str::to_string)?;
    resolve(Some(href), base_url)
}

fn published_date(document: &Html) -> Option<String> {
    for selector in [
        &*ARTICLE_PUBLISHED_TIME,
        &*META_DATE,
        &*META_PUBDATE,
        &*META_PUBLISHDATE,
        &*META_DATE_PUBLISHED_ITEMPROP,
    ] {
        if let Some(content) = meta_content(document, selector) {
            return Some(content);
        }
    }

    document
        .select(&TIME_DATETIME)
        .next()
        .and_then(|el| el.value().attr("datetime"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn resolve(maybe_url: Option<String>, base_url: &str) -> Option<String> {
    let raw = maybe_url?;
    match url::Url::parse(base_url).and_then(|base| base.join(&raw)) {
        Ok(resolved) => Some(resolved.to_string()),
        Err(_) => Some(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html lang="en"><head>
        <title>Static Page</title>
        <meta name="description" content="A simple static page">
        <meta property="og:title" content="OG Title">
        <meta property="og:image" content="/img.png">
        <link rel="canonical" href="/canon">
        <meta property="article:published_time" content="2024-01-15T00:00:00Z">
    </head><body></body></html>"#;

    #[test]
    fn extracts_basic_fields() {
        let meta = extract_metadata(PAGE, "https://example.com/page");
        assert_eq!(meta.title.as_deref(), Some("Static Page"));
        assert_eq!(meta.description.as_deref(), Some("A simple static page"));
        assert_eq!(meta.language.as_deref(), Some("en"));
    }

    #[test]
    fn resolves_relative_og_image_and_canonical() {
        let meta = extract_metadata(PAGE, "https://example.com/page");
        assert_eq!(meta.og_image.as_deref(), Some("https://example.com/img.png"));
        assert_eq!(meta.canonical_url.as_deref(), Some("https://example.com/canon"));
    }

    #[test]
    fn published_date_prefers_article_published_time() {
        let meta = extract_metadata(PAGE, "https://example.com/page");
        assert_eq!(meta.published_date.as_deref(), Some("2024-01-15T00:00:00Z"));
    }

    #[test]
    fn falls_back_to_time_tag_datetime() {
        let html = r#"<html><body><time datetime="2024-03-01">March</time></body></html>"#;
        let meta = extract_metadata(html, "https://example.com/");
        assert_eq!(meta.published_date.as_deref(), Some("2024-03-01"));
    }

    #[test]
    fn empty_html_yields_default_metadata() {
        let meta = extract_metadata("", "https://example.com/");
        assert!(meta.title.is_none());
    }
}
