//! Loading paginated source documents from disk.
//!
//! PDFs are read page by page (feature `pdf`). Any other file is treated as
//! text and split into pages on form-feed characters, which is how `pdftotext`
//! and similar tools mark page breaks.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::document::{Page, SourceDocument};
use crate::error::{RagError, Result};
use crate::normalize::normalize;

const PAGE_BREAK: char = '\x0c';

/// Load and normalize a source document.
///
/// # Errors
///
/// - [`RagError::SourceNotFound`] if `path` does not exist.
/// - [`RagError::SourceError`] if the file cannot be read or parsed, or holds
///   no extractable text.
pub fn load_document(path: &Path) -> Result<SourceDocument> {
    if !path.exists() {
        return Err(RagError::SourceNotFound { path: path.to_path_buf() });
    }

    let id = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    info!(path = %path.display(), "loading source document");

    let is_pdf = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    let pages = if is_pdf { load_pdf_pages(path)? } else { load_text_pages(path)? };

    let document = SourceDocument::new(id, pages);
    if document.is_blank() {
        return Err(RagError::SourceError {
            path: path.to_path_buf(),
            message: "document contains no extractable text".into(),
        });
    }

    info!(source_id = %document.id, page_count = document.pages.len(), "loaded source document");
    Ok(document)
}

/// Split text into pages on form-feed characters.
///
/// Page numbers are 1-based and count every page, including blank ones, so
/// they line up with the printed book.
pub fn paginate_text(text: &str) -> Vec<Page> {
    text.split(PAGE_BREAK)
        .enumerate()
        .map(|(i, page)| Page::new(i as u32 + 1, normalize(page)))
        .collect()
}

fn load_text_pages(path: &Path) -> Result<Vec<Page>> {
    let bytes = std::fs::read(path).map_err(|e| RagError::SourceError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    // Page breaks are control characters, so split before normalizing.
    Ok(paginate_text(&String::from_utf8_lossy(&bytes)))
}

#[cfg(feature = "pdf")]
fn load_pdf_pages(path: &Path) -> Result<Vec<Page>> {
    let doc = lopdf::Document::load(path).map_err(|e| RagError::SourceError {
        path: path.to_path_buf(),
        message: format!("failed to load PDF: {e}"),
    })?;

    let mut pages = Vec::new();
    for page_number in doc.get_pages().into_keys() {
        match doc.extract_text(&[page_number]) {
            Ok(text) => pages.push(Page::new(page_number, normalize(&text))),
            Err(e) => {
                // Image-only pages have no text layer; keep numbering intact.
                warn!(page_number, error = %e, "could not extract text from page");
                pages.push(Page::new(page_number, String::new()));
            }
        }
    }

    debug!(page_count = pages.len(), "extracted PDF pages");
    Ok(pages)
}

#[cfg(not(feature = "pdf"))]
fn load_pdf_pages(path: &Path) -> Result<Vec<Page>> {
    Err(RagError::SourceError {
        path: path.to_path_buf(),
        message: "PDF support is disabled; enable the `pdf` feature".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paginates_on_form_feed() {
        let pages = paginate_text("first page\x0csecond page\x0c\x0cfourth");
        assert_eq!(pages.len(), 4);
        assert_eq!(pages[0], Page::new(1, "first page"));
        assert_eq!(pages[1], Page::new(2, "second page"));
        assert_eq!(pages[2], Page::new(3, ""));
        assert_eq!(pages[3].number, 4);
    }

    #[test]
    fn missing_source_is_reported() {
        let err = load_document(Path::new("/definitely/not/here/book.txt")).unwrap_err();
        assert!(matches!(err, RagError::SourceNotFound { .. }));
    }

    #[test]
    fn loads_text_file_with_normalization() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.txt");
        std::fs::write(&path, b"Intro\xED\xA0\x80 text\x0cChapter two").unwrap();

        let doc = load_document(&path).unwrap();
        assert_eq!(doc.id, "book.txt");
        assert_eq!(doc.pages, vec![Page::new(1, "Intro text"), Page::new(2, "Chapter two")]);
    }

    #[test]
    fn page_breaks_survive_loading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.txt");
        std::fs::write(&path, "ends with one\x0cpage two starts\x0cpage three").unwrap();

        let doc = load_document(&path).unwrap();
        assert_eq!(
            doc.pages,
            vec![
                Page::new(1, "ends with one"),
                Page::new(2, "page two starts"),
                Page::new(3, "page three"),
            ]
        );
        assert!(doc.pages.iter().all(|p| !p.text.contains("onepage")));
    }

    #[test]
    fn blank_document_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "  \x0c \n").unwrap();

        let err = load_document(&path).unwrap_err();
        assert!(matches!(err, RagError::SourceError { .. }));
    }
}
