//! JSON-LD and microdata structured-data extraction.
//!
//! Ports `test_structured_data.py`'s observable behavior: every
//! `<script type="application/ld+json">` is parsed (arrays flattened,
//! malformed blocks skipped silently), and `schema_org_types` is the
//! sorted-unique union of JSON-LD `@type` values and microdata `itemtype`
//! leaf names.

use crate::types::StructuredData;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use std::sync::LazyLock;

static LD_JSON_SCRIPT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).expect("static selector"));
static ITEMTYPE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[itemtype]").expect("static selector"));

/// Extract structured data from `html`, or `None` if nothing is found.
pub fn extract_structured_data(html: &str) -> Option<StructuredData> {
    if html.is_empty() {
        return None;
    }

    let document = Html::parse_document(html);
    let json_ld = collect_json_ld(&document);
    let mut types: BTreeSet<String> = json_ld.iter().flat_map(schema_types_of).collect();
    types.extend(microdata_types(&document));

    if json_ld.is_empty() && types.is_empty() {
        return None;
    }

    Some(StructuredData {
        json_ld: if json_ld.is_empty() { None } else { Some(json_ld) },
        schema_org_types: if types.is_empty() {
            None
        } else {
            Some(types.into_iter().collect())
        },
    })
}

fn collect_json_ld(document: &Html) -> Vec<serde_json::Value> {
    let mut out = Vec::new();
    for script in document.select(&LD_JSON_SCRIPT) {
        let raw: String = script.text().collect();
        let Ok(value) = serde_json::from_str::<serde_json::Value>(raw.trim()) else {
            continue;
        };
        match value {
            serde_json::Value::Array(items) => out.extend(items),
            other => out.push(other),
        }
    }
    out
}

fn schema_types_of(value: &serde_json::Value) -> Vec<String> {
    match value.get("@type") {
        Some(serde_json::Value::String(s)) => vec![s.clone()],
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Leaf name of a schema.org `itemtype` URL, e.g.
/// `https://schema.org/Product` -> `Product`.
fn microdata_types(document: &Html) -> Vec<String> {
    document
        .select(&ITEMTYPE)
        .filter_map(|el| el.value().attr("itemtype"))
        .filter_map(|itemtype| itemtype.rsplit('/').next())
        .filter(|leaf| !leaf.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE: &str = r#"<html><head>
        <script type="application/ld+json">
        {"@context": "https://schema.org", "@type": "Article", "headline": "Test Article"}
        </script>
        </head><body></body></html>"#;

    #[test]
    fn extracts_single_json_ld_block() {
        let data = extract_structured_data(ARTICLE).unwrap();
        let json_ld = data.json_ld.unwrap();
        assert_eq!(json_ld.len(), 1);
        assert_eq!(json_ld[0]["headline"], "Test Article");
    }

    #[test]
    fn extracts_multiple_blocks() {
        let html = r#"<script type="application/ld+json">{"@type":"Article"}</script>
            <script type="application/ld+json">{"@type":"BreadcrumbList"}</script>"#;
        let data = extract_structured_data(html).unwrap();
        assert_eq!(data.json_ld.unwrap().len(), 2);
    }

    #[test]
    fn flattens_json_ld_arrays() {
        let html = r#"<script type="application/ld+json">
            [{"@type":"Article"},{"@type":"WebPage"}]
        </script>"#;
        let data = extract_structured_data(html).unwrap();
        assert_eq!(data.json_ld.unwrap().len(), 2);
    }

    #[test]
    fn skips_invalid_json_ld_blocks() {
        let html = r#"<script type="application/ld+json">{invalid json here}</script>
            <script type="application/ld+json">{"@type":"Article","headline":"Valid"}</script>"#;
        let data = extract_structured_data(html).unwrap();
        let json_ld = data.json_ld.unwrap();
        assert_eq!(json_ld.len(), 1);
        assert_eq!(json_ld[0]["headline"], "Valid");
    }

    #[test]
    fn schema_org_types_sorted_and_unique() {
        let html = r#"<script type="application/ld+json">{"@type":["Article","NewsArticle"]}</script>"#;
        let data = extract_structured_data(html).unwrap();
        let types = data.schema_org_types.unwrap();
        assert_eq!(types, vec!["Article".to_string(), "NewsArticle".to_string()]);
    }

    #[test]
    fn extracts_microdata_itemtype_leaf_names() {
        let html = r#"<div itemscope itemtype="https://schema.org/Product">
            <div itemprop="offers" itemscope itemtype="https://schema.org/Offer"></div>
        </div>"#;
        let data = extract_structured_data(html).unwrap();
        let types = data.schema_org_types.unwrap();
        assert!(types.contains(&"Product".to_string()));
        assert!(types.contains(&"Offer".to_string()));
    }

    #[test]
    fn no_structured_data_returns_none() {
        assert!(extract_structured_data("<html><body><p>Just content</p></body></html>").is_none());
        assert!(extract_structured_data("").is_none());
    }
}
