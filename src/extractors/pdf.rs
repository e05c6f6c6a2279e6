//! PDF text and metadata extraction.
//!
//! Port of `pdf_extractor.py`'s `PdfExtractor.extract`: `pdf-extract` plays
//! the role of pymupdf's `page.get_text()` for the text, and `lopdf` (the
//! library `pdf-extract` itself is built on) reads the document's `Info`
//! dictionary for title/author/creation date. A `D:`-prefixed creation date
//! is normalized by stripping the prefix, same as the original.

use lopdf::{Dictionary, Document, Object};

/// Text and metadata pulled out of one PDF document.
#[derive(Debug, Clone, Default)]
pub struct PdfExtraction {
    pub text: String,
    pub pages: u32,
    pub title: Option<String>,
    pub author: Option<String>,
    pub created_date: Option<String>,
}

/// Extract text and metadata from raw PDF bytes. Returns an empty-text,
/// zero-page result (never an error) if the document fails to open, mirroring
/// the original's catch-and-log-empty behavior.
pub fn extract_pdf(bytes: &[u8]) -> PdfExtraction {
    let pages = match pdf_extract::extract_text_from_mem_by_pages(bytes) {
        Ok(pages) => pages,
        Err(_) => return PdfExtraction::default(),
    };
    let page_count = pages.len() as u32;
    let text = pages.join("\n").trim().to_string();

    let (title, author, created_date) = Document::load_mem(bytes)
        .ok()
        .and_then(|doc| info_dict(&doc).cloned())
        .map(|info| {
            (
                dict_string(&info, b"Title"),
                dict_string(&info, b"Author"),
                dict_string(&info, b"CreationDate").map(|d| normalize_pdf_date(&d)),
            )
        })
        .unwrap_or((None, None, None));

    PdfExtraction {
        text,
        pages: page_count,
        title,
        author,
        created_date,
    }
}

fn info_dict(doc: &Document) -> Option<&Dictionary> {
    match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn dict_string(dict: &Dictionary, key: &[u8]) -> Option<String> {
    let value = match dict.get(key).ok()? {
        Object::String(bytes, _) => String::from_utf8_lossy(bytes).into_owned(),
        _ => return None,
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Strip pymupdf/PDF-style `D:` date prefixes, e.g. `D:20240115100000` ->
/// `20240115100000`.
fn normalize_pdf_date(raw: &str) -> String {
    raw.strip_prefix("D:").unwrap_or(raw).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparseable_bytes_yield_empty_result() {
        let result = extract_pdf(b"not a pdf");
        assert_eq!(result.text, "");
        assert_eq!(result.pages, 0);
        assert!(result.title.is_none());
    }

    #[test]
    fn normalizes_d_prefixed_creation_date() {
        assert_eq!(normalize_pdf_date("D:20240115100000"), "20240115100000");
        assert_eq!(normalize_pdf_date("20240115100000"), "20240115100000");
    }
}
