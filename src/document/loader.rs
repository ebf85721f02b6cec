// src/document/loader.rs
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::{detect_period, Document, Page};
use crate::utils::error::DocumentError;

// --- CSS Selectors (Lazy Static) ---
static PAGE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.page, section.page, article.page").expect("Failed to compile PAGE_SELECTOR")
});

static BODY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("body").expect("Failed to compile BODY_SELECTOR"));

// Empty page-break divs separate pages in exported HTML reports
static PAGE_BREAK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<div[^>]*style=['"][^'"]*page-break[^'"]*['"][^>]*>\s*</div>"#)
        .expect("valid page-break regex")
});

const FORM_FEED: char = '\u{000C}';

/// Loads a document from disk, dispatching on the file extension.
///
/// Only an unreadable or unsupported file is an error; a page whose text
/// cannot be extracted becomes an empty page.
pub fn load_document(path: &Path, period_scan_pages: usize) -> Result<Document, DocumentError> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let pages = match ext.as_str() {
        "pdf" => pdf_pages(path)?,
        "txt" | "text" => text_pages(&std::fs::read_to_string(path)?),
        "html" | "htm" => html_pages(&std::fs::read_to_string(path)?),
        other => return Err(DocumentError::UnsupportedType(other.to_string())),
    };

    if pages.is_empty() {
        return Err(DocumentError::Empty(path.display().to_string()));
    }

    let id = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let period = detect_period(path, &pages, period_scan_pages);

    tracing::info!("Loaded {} ({} pages, period {})", path.display(), pages.len(), period);
    Ok(Document {
        id,
        path: path.to_path_buf(),
        period,
        pages,
    })
}

fn pdf_pages(path: &Path) -> Result<Vec<Page>, DocumentError> {
    let pdf = lopdf::Document::load(path).map_err(|e| DocumentError::Pdf {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let mut pages = Vec::new();
    for &number in pdf.get_pages().keys() {
        let text = match pdf.extract_text(&[number]) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Text extraction failed for page {} of {}: {}", number, path.display(), e);
                String::new()
            }
        };
        pages.push(Page::new(number as usize, text));
    }
    Ok(pages)
}

/// Plain-text exports separate pages with form feeds.
pub fn text_pages(content: &str) -> Vec<Page> {
    content
        .split(FORM_FEED)
        .enumerate()
        .map(|(i, text)| Page::new(i + 1, text))
        .collect()
}

/// Splits an HTML report into pages on `.page` containers, falling back to
/// page-break dividers and finally to the whole body.
pub fn html_pages(content: &str) -> Vec<Page> {
    let document = Html::parse_document(content);
    let containers: Vec<ElementRef> = document.select(&PAGE_SELECTOR).collect();
    if !containers.is_empty() {
        return containers
            .into_iter()
            .enumerate()
            .map(|(i, el)| Page::with_html(i + 1, element_text(el), el.html()))
            .collect();
    }

    PAGE_BREAK_RE
        .split(content)
        .filter(|chunk| !chunk.trim().is_empty())
        .enumerate()
        .map(|(i, chunk)| {
            let fragment = Html::parse_document(chunk);
            let text = fragment
                .select(&BODY_SELECTOR)
                .next()
                .map(element_text)
                .unwrap_or_default();
            Page::with_html(i + 1, text, chunk.to_string())
        })
        .collect()
}

/// Text nodes joined line by line, so keyword and regex scans see one node per line.
fn element_text(element: ElementRef) -> String {
    element
        .text()
        .map(|t| t.replace('\u{a0}', " "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_feed_splits_pages() {
        let pages = text_pages("cover\u{000C}Income Statement\nRevenue  10\u{000C}notes");
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[1].number, 2);
        assert!(pages[1].text.contains("Revenue"));
    }

    #[test]
    fn html_page_containers() {
        let html = r#"<html><body>
            <div class="page"><h1>Cover</h1></div>
            <div class="page"><h2>Income Statement</h2>
              <table><tr><td>Revenue</td><td>1,000</td></tr></table></div>
        </body></html>"#;
        let pages = html_pages(html);
        assert_eq!(pages.len(), 2);
        assert!(pages[1].text.contains("Income Statement"));
        assert!(pages[1].html.as_deref().unwrap().contains("<table>"));
    }

    #[test]
    fn html_page_breaks() {
        let html = r#"<p>Cover</p><div style="page-break-after: always"></div><p>Share Information</p>"#;
        let pages = html_pages(html);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].text, "Share Information");
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.docx");
        std::fs::write(&path, "x").unwrap();
        assert!(matches!(
            load_document(&path, 10),
            Err(DocumentError::UnsupportedType(_))
        ));
    }

    #[test]
    fn loads_text_report_with_period() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annual_report_20-21.txt");
        std::fs::write(&path, "cover\u{000C}Income Statement").unwrap();
        let doc = load_document(&path, 10).unwrap();
        assert_eq!(doc.id, "annual_report_20-21");
        assert_eq!(doc.period.token(), "2020-2021");
        assert_eq!(doc.page_count(), 2);
    }

    #[test]
    fn unreadable_pdf_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken_19-20.pdf");
        std::fs::write(&path, "not a pdf").unwrap();
        assert!(matches!(load_document(&path, 10), Err(DocumentError::Pdf { .. })));
    }
}
