// src/extractors/locator.rs
//! Candidate page discovery for a keyword.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::document::Document;

static PAGE_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,3}\b").expect("valid page reference regex"));

/// Topical families of statement headings, each with a typical page range in
/// a full-length annual report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicCategory {
    IncomeStatement,
    FinancialPosition,
    Shareholders,
    EarningsPerShare,
    SummaryIndicators,
    Other,
}

impl TopicCategory {
    pub fn of(keyword: &str) -> Self {
        let k = keyword.to_lowercase();
        if k.contains("income statement") || k.contains("profit or loss") {
            TopicCategory::IncomeStatement
        } else if k.contains("balance sheet") || k.contains("financial position") {
            TopicCategory::FinancialPosition
        } else if k.contains("shareholder") || k.contains("share information") {
            TopicCategory::Shareholders
        } else if k.contains("earnings per share") || k.contains("eps") {
            TopicCategory::EarningsPerShare
        } else if k.contains("summary indicators") {
            TopicCategory::SummaryIndicators
        } else {
            TopicCategory::Other
        }
    }

    pub fn typical_pages(&self) -> Vec<usize> {
        match self {
            TopicCategory::IncomeStatement => (180..190).collect(),
            TopicCategory::FinancialPosition => (185..195).collect(),
            TopicCategory::Shareholders => (140..150).collect(),
            TopicCategory::EarningsPerShare => (180..190).chain(240..250).collect(),
            TopicCategory::SummaryIndicators => (140..150).collect(),
            TopicCategory::Other => (100..200).step_by(10).collect(),
        }
    }
}

pub struct PageLocator<'a> {
    document: &'a Document,
    toc_scan_pages: usize,
}

impl<'a> PageLocator<'a> {
    pub fn new(document: &'a Document, toc_scan_pages: usize) -> Self {
        Self {
            document,
            toc_scan_pages,
        }
    }

    /// Pages whose text contains the keyword, case-insensitively, in page order.
    pub fn find(&self, keyword: &str) -> Vec<usize> {
        let needle = keyword.to_lowercase();
        let pages: Vec<usize> = self
            .document
            .pages
            .iter()
            .filter(|p| p.text.to_lowercase().contains(&needle))
            .map(|p| p.number)
            .collect();
        tracing::debug!("Found {} pages matching keyword '{}'", pages.len(), keyword);
        pages
    }

    /// Page numbers listed next to the keyword on a contents page, else the
    /// typical range for the keyword's topic. Only existing pages are returned.
    pub fn guess(&self, keyword: &str) -> Vec<usize> {
        let from_toc = self.guess_from_contents(keyword);
        if !from_toc.is_empty() {
            tracing::debug!("Contents page lists '{}' at pages {:?}", keyword, from_toc);
            return from_toc;
        }

        let category = TopicCategory::of(keyword);
        let pages: Vec<usize> = category
            .typical_pages()
            .into_iter()
            .filter(|&n| self.document.page(n).is_some())
            .collect();
        tracing::debug!("Guessed {} {:?} pages for '{}'", pages.len(), category, keyword);
        pages
    }

    /// `find`, falling back to `guess`.
    pub fn locate(&self, keyword: &str) -> Vec<usize> {
        let found = self.find(keyword);
        if found.is_empty() {
            self.guess(keyword)
        } else {
            found
        }
    }

    fn guess_from_contents(&self, keyword: &str) -> Vec<usize> {
        let needle = keyword.to_lowercase();

        for page in self.document.pages.iter().take(self.toc_scan_pages) {
            let text = page.text.to_lowercase();
            if !(text.contains("contents") || text.contains("index")) || !text.contains(&needle) {
                continue;
            }

            let lines: Vec<&str> = text.lines().collect();
            for (i, line) in lines.iter().enumerate() {
                if !line.contains(&needle) {
                    continue;
                }
                // The keyword's own line first, then its neighbours
                let window = [Some(i), i.checked_sub(1), Some(i + 1)];
                for search_line in window.iter().flatten().filter_map(|&j| lines.get(j)) {
                    // Digits inside the keyword itself ("Top 20 Shareholders") are not page refs
                    let search_line = search_line.replace(&needle, " ");
                    let pages: Vec<usize> = PAGE_REF_RE
                        .find_iter(&search_line)
                        .filter_map(|m| m.as_str().parse::<usize>().ok())
                        .filter(|&n| n != page.number && self.document.page(n).is_some())
                        .collect();
                    if !pages.is_empty() {
                        return pages;
                    }
                }
            }
        }
        Vec::new()
    }
}
