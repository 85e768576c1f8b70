//! Paged documents the reader can open
//!
//! Pages are addressed 1-based everywhere in this module, matching what the
//! reader shows and what the backend stores in bookmarks.

use std::sync::LazyLock;

use regex::Regex;

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Failed to compile whitespace regex"));

const FORM_FEED: char = '\u{000C}';

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("document has no pages")]
    Empty,

    #[error("page {page} is outside 1..={page_count}")]
    PageOutOfRange { page: usize, page_count: usize },

    #[error("unsupported document format")]
    UnsupportedFormat,

    #[cfg(feature = "pdf")]
    #[error("PDF engine: {0}")]
    Pdf(#[from] mupdf::error::Error),
}

/// A fixed-page document: page count never changes after opening.
pub trait PagedDocument {
    fn page_count(&self) -> usize;

    /// Text of a single page, whitespace collapsed to single spaces.
    fn page_text(&self, page: usize) -> Result<String, DocumentError>;

    fn title(&self) -> Option<&str> {
        None
    }
}

/// Collapse whitespace runs so narration reads continuous prose.
pub fn normalize_page_text(raw: &str) -> String {
    WHITESPACE_RUN.replace_all(raw.trim(), " ").into_owned()
}

fn check_page(page: usize, page_count: usize) -> Result<usize, DocumentError> {
    if page == 0 || page > page_count {
        return Err(DocumentError::PageOutOfRange { page, page_count });
    }
    Ok(page - 1)
}

/// UTF-8 text split into pages on form feeds.
#[derive(Debug, Clone)]
pub struct TextDocument {
    pages: Vec<String>,
}

impl TextDocument {
    pub fn from_text(text: &str) -> Result<Self, DocumentError> {
        let pages: Vec<String> = text.split(FORM_FEED).map(str::to_string).collect();
        if pages.iter().all(|p| p.trim().is_empty()) {
            return Err(DocumentError::Empty);
        }
        Ok(Self { pages })
    }

    pub fn from_pages<I, S>(pages: I) -> Result<Self, DocumentError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pages: Vec<String> = pages.into_iter().map(Into::into).collect();
        if pages.is_empty() {
            return Err(DocumentError::Empty);
        }
        Ok(Self { pages })
    }
}

impl PagedDocument for TextDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, page: usize) -> Result<String, DocumentError> {
        let index = check_page(page, self.pages.len())?;
        Ok(normalize_page_text(&self.pages[index]))
    }
}

#[cfg(feature = "pdf")]
pub use pdf::PdfDocument;

#[cfg(feature = "pdf")]
mod pdf {
    use mupdf::text_page::TextBlockType;
    use mupdf::{Document, TextPageFlags};

    use super::{DocumentError, PagedDocument, check_page, normalize_page_text};

    pub struct PdfDocument {
        doc: Document,
        page_count: usize,
        title: Option<String>,
    }

    impl PdfDocument {
        pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocumentError> {
            let doc = Document::from_bytes(bytes, "application/pdf")?;
            let page_count = doc.page_count()? as usize;
            if page_count == 0 {
                return Err(DocumentError::Empty);
            }
            let title = doc
                .metadata(mupdf::MetadataName::Title)
                .ok()
                .filter(|t| !t.is_empty());
            Ok(Self {
                doc,
                page_count,
                title,
            })
        }
    }

    impl PagedDocument for PdfDocument {
        fn page_count(&self) -> usize {
            self.page_count
        }

        fn page_text(&self, page: usize) -> Result<String, DocumentError> {
            let index = check_page(page, self.page_count)?;
            let page = self.doc.load_page(index as i32)?;
            let text_page = page.to_text_page(TextPageFlags::empty())?;

            let mut lines = Vec::new();
            for block in text_page.blocks() {
                if block.r#type() != TextBlockType::Text {
                    continue;
                }
                for line in block.lines() {
                    let text: String = line.chars().filter_map(|ch| ch.char()).collect();
                    if !text.trim().is_empty() {
                        lines.push(text);
                    }
                }
            }
            Ok(normalize_page_text(&lines.join(" ")))
        }

        fn title(&self) -> Option<&str> {
            self.title.as_deref()
        }
    }
}

/// Open document bytes as served by the backend's document proxy.
pub fn open_document(bytes: &[u8]) -> Result<Box<dyn PagedDocument>, DocumentError> {
    if bytes.starts_with(b"%PDF") {
        #[cfg(feature = "pdf")]
        {
            return Ok(Box::new(PdfDocument::from_bytes(bytes)?));
        }
        #[cfg(not(feature = "pdf"))]
        {
            return Err(DocumentError::UnsupportedFormat);
        }
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(Box::new(TextDocument::from_text(text)?)),
        Err(_) => Err(DocumentError::UnsupportedFormat),
    }
}
