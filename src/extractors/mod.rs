//! HTML/PDF content extraction: text, metadata, links, and structured data.
//!
//! Each extractor is a pure function over already-fetched bytes. None of
//! them touch the network or the browser, which is what makes them testable
//! in isolation (mirrors the original `ContentExtractor`/`PdfExtractor`
//! split in `extractor.py`/`pdf_extractor.py`).

pub mod links;
pub mod metadata;
pub mod pdf;
pub mod structured_data;
pub mod text;

pub use links::extract_links;
pub use metadata::extract_metadata;
pub use pdf::extract_pdf;
pub use structured_data::extract_structured_data;
pub use text::extract_text;
