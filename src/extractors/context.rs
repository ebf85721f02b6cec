// src/extractors/context.rs
//! Per-document view shared by the field resolvers: keyword pages and the
//! tables recovered from them, memoized by keyword.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use once_cell::unsync::OnceCell;

use crate::config::{ExtractorConfig, Thresholds};
use crate::document::{Document, Page};
use crate::extractors::locator::PageLocator;
use crate::extractors::tables::{RawTable, StrategyChain};
use crate::fiscal::FiscalPeriod;

pub struct ReportContext<'a> {
    pub document: &'a Document,
    pub config: &'a ExtractorConfig,
    chain: &'a StrategyChain,
    locator: PageLocator<'a>,
    by_keyword: RefCell<HashMap<String, Rc<Vec<RawTable>>>>,
    every_page: OnceCell<Rc<Vec<RawTable>>>,
}

impl<'a> ReportContext<'a> {
    pub fn new(document: &'a Document, config: &'a ExtractorConfig, chain: &'a StrategyChain) -> Self {
        Self {
            document,
            config,
            chain,
            locator: PageLocator::new(document, config.toc_scan_pages),
            by_keyword: RefCell::new(HashMap::new()),
            every_page: OnceCell::new(),
        }
    }

    pub fn period(&self) -> FiscalPeriod {
        self.document.period
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.config.thresholds
    }

    /// Pages holding the keyword, else the guessed pages.
    pub fn keyword_pages(&self, keyword: &str) -> Vec<&'a Page> {
        self.pages(&self.locator.locate(keyword))
    }

    /// Tables on the keyword's pages. When those pages yield nothing, the
    /// guessed pages are tried instead.
    pub fn tables(&self, keyword: &str) -> Rc<Vec<RawTable>> {
        let key = keyword.to_lowercase();
        if let Some(cached) = self.by_keyword.borrow().get(&key) {
            return Rc::clone(cached);
        }

        let found = self.locator.find(keyword);
        let mut tables = self.chain.extract(&self.pages(&found));
        if tables.is_empty() {
            let guessed: Vec<usize> = self
                .locator
                .guess(keyword)
                .into_iter()
                .filter(|n| !found.contains(n))
                .collect();
            if !guessed.is_empty() {
                tracing::debug!("No tables on '{}' pages; trying {} guessed pages", keyword, guessed.len());
                tables = self.chain.extract(&self.pages(&guessed));
            }
        }
        tracing::debug!("{} table(s) for '{}' in {}", tables.len(), keyword, self.document.id);

        let tables = Rc::new(tables);
        self.by_keyword.borrow_mut().insert(key, Rc::clone(&tables));
        tables
    }

    /// Tables from every page of the document.
    pub fn all_tables(&self) -> Rc<Vec<RawTable>> {
        Rc::clone(self.every_page.get_or_init(|| {
            let pages: Vec<&Page> = self.document.pages.iter().collect();
            Rc::new(self.chain.extract(&pages))
        }))
    }

    fn pages(&self, numbers: &[usize]) -> Vec<&'a Page> {
        numbers.iter().filter_map(|&n| self.document.page(n)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_are_memoized_per_keyword() {
        let doc = Document::new(
            "memo",
            FiscalPeriod::starting(2020),
            vec![Page::new(1, "Income Statement\nRevenue    100,000\nCost of sales    (70,000)")],
        );
        let config = ExtractorConfig::default();
        let chain = StrategyChain::standard();
        let ctx = ReportContext::new(&doc, &config, &chain);

        let first = ctx.tables("Income Statement");
        let again = ctx.tables("INCOME STATEMENT");
        assert_eq!(first.len(), 1);
        assert!(Rc::ptr_eq(&first, &again));
        assert!(ctx.tables("Rights Issue").is_empty());
        assert_eq!(ctx.all_tables().len(), 1);
    }
}
