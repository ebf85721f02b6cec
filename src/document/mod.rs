// src/document/mod.rs
pub mod loader;

use std::path::{Path, PathBuf};

use chrono::Datelike;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::fiscal::FiscalPeriod;

pub use loader::load_document;

// --- Period Detection Patterns ---
// "jk_annual_report_19-20.pdf", "report_2019-2020.pdf"
static FILENAME_PERIOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\D)(\d{4}|\d{2})-(\d{4}|\d{2})(?:\D|$)").expect("valid filename period regex")
});

// "Annual Report 2019/20" on a cover page
static BANNER_PERIOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)annual\s+report\s+(\d{4})\s*[/-]\s*(\d{2,4})").expect("valid banner period regex")
});

static FILENAME_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\D)((?:19|20)\d{2})(?:\D|$)").expect("valid filename year regex"));

/// One page of extracted text. Page numbers are 1-based.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub number: usize,
    pub text: String,
    /// Original markup for HTML sources; lets the lattice backend read real `<table>`s.
    pub html: Option<String>,
}

impl Page {
    pub fn new(number: usize, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
            html: None,
        }
    }

    pub fn with_html(number: usize, text: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
            html: Some(html.into()),
        }
    }
}

/// A loaded source document. Immutable once built.
#[derive(Debug, Clone)]
pub struct Document {
    /// File stem; keys the override table and output paths.
    pub id: String,
    pub path: PathBuf,
    pub period: FiscalPeriod,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn new(id: impl Into<String>, period: FiscalPeriod, pages: Vec<Page>) -> Self {
        let id = id.into();
        Self {
            path: PathBuf::from(&id),
            id,
            period,
            pages,
        }
    }

    pub fn page(&self, number: usize) -> Option<&Page> {
        // Pages are stored in order, but PDF page trees may skip numbers.
        self.pages
            .get(number.wrapping_sub(1))
            .filter(|p| p.number == number)
            .or_else(|| self.pages.iter().find(|p| p.number == number))
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Works out the fiscal period of a document: filename token, then a cover-page
/// banner, then a lone year in the filename, then the current year.
pub fn detect_period(path: &Path, pages: &[Page], scan_pages: usize) -> FiscalPeriod {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    if let Some(caps) = FILENAME_PERIOD_RE.captures(&file_name) {
        let token = format!("{}-{}", &caps[1], &caps[2]);
        match token.parse::<FiscalPeriod>() {
            Ok(period) => return period,
            Err(e) => tracing::debug!("Ignoring filename period token in {}: {}", file_name, e),
        }
    }

    for page in pages.iter().take(scan_pages) {
        if let Some(caps) = BANNER_PERIOD_RE.captures(&page.text) {
            let token = format!("{}-{}", &caps[1], &caps[2]);
            if let Ok(period) = token.parse::<FiscalPeriod>() {
                tracing::debug!("Period {} taken from page {} banner", period, page.number);
                return period;
            }
        }
    }

    if let Some(caps) = FILENAME_YEAR_RE.captures(&file_name) {
        if let Ok(year) = caps[1].parse::<i32>() {
            return FiscalPeriod::starting(year);
        }
    }

    let current = chrono::Local::now().year();
    tracing::warn!(
        "No fiscal period found for {}; assuming {}-{}",
        file_name,
        current - 1,
        current
    );
    FiscalPeriod::starting(current - 1)
}
