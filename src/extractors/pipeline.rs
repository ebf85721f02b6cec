// src/extractors/pipeline.rs
//! Document → ExtractionRecord.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::ExtractorConfig;
use crate::document::{load_document, Document, Page};
use crate::extractors::context::ReportContext;
use crate::extractors::overrides::OverrideTable;
use crate::extractors::record::{ExtractionRecord, Provenance};
use crate::extractors::tables::StrategyChain;
use crate::extractors::{metrics, rights, shareholders};
use crate::utils::error::{AppError, DocumentError};
use crate::utils::html_debug;

static CURRENCY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(LKR|USD|EUR|GBP|INR)\b|\b(Rs)\.|(US\$)").expect("valid currency marker regex")
});

pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["pdf", "txt", "text", "html", "htm"];

const STATEMENT_KEYWORDS: [&str; 2] = ["Income Statement", "STATEMENT OF PROFIT OR LOSS"];

pub struct ReportExtractor {
    config: ExtractorConfig,
    overrides: OverrideTable,
    chain: StrategyChain,
    debug_dir: Option<PathBuf>,
}

impl ReportExtractor {
    pub fn new(config: ExtractorConfig, overrides: OverrideTable) -> Self {
        Self {
            config,
            overrides,
            chain: StrategyChain::standard(),
            debug_dir: None,
        }
    }

    /// Replaces the table backends.
    pub fn with_chain(mut self, chain: StrategyChain) -> Self {
        self.chain = chain;
        self
    }

    /// Writes annotated dumps of located pages under `dir`.
    pub fn with_debug_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.debug_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Builds the record for one document. Never fails: every field falls
    /// back to a derived or placeholder value.
    pub fn extract(&self, document: &Document) -> ExtractionRecord {
        tracing::info!("Extracting {} ({})", document.id, document.period);
        let ctx = ReportContext::new(document, &self.config, &self.chain);
        let entry = self.overrides.lookup(document);

        let currency = detect_currency(&ctx, &self.config.default_currency);
        let no_overrides = HashMap::new();
        let metric_overrides = entry.map(|e| &e.metrics).unwrap_or(&no_overrides);
        let metrics = metrics::resolve(&ctx, metric_overrides, &currency);

        let right_issue = match entry.and_then(|e| e.right_issue.clone()) {
            Some(overridden) => overridden,
            None => rights::resolve(&ctx),
        };

        let (top_shareholders, shareholders_source) = match entry.and_then(|e| e.top_shareholders.clone()) {
            Some(list) => (
                shareholders::rank(list, self.config.thresholds.max_shareholders),
                Provenance::Override,
            ),
            None => shareholders::resolve(&ctx),
        };

        if let Some(dir) = &self.debug_dir {
            if let Err(e) = html_debug::dump_located_pages(dir, &ctx) {
                tracing::warn!("Failed to write debug pages for {}: {}", document.id, e);
            }
        }

        ExtractionRecord {
            document_id: document.id.clone(),
            period: document.period,
            metrics,
            right_issue,
            top_shareholders,
            shareholders_source,
        }
    }

    pub fn extract_path(&self, path: &Path) -> Result<ExtractionRecord, DocumentError> {
        let document = load_document(path, self.config.period_scan_pages)?;
        Ok(self.extract(&document))
    }

    /// Processes documents one at a time; unreadable ones are logged and skipped.
    pub fn extract_batch(&self, paths: &[PathBuf]) -> Vec<ExtractionRecord> {
        let mut records = Vec::new();
        for path in paths {
            match self.extract_path(path) {
                Ok(record) => records.push(record),
                Err(e) => tracing::error!("Skipping {}: {}", path.display(), e),
            }
        }
        tracing::info!("Extracted {} of {} documents", records.len(), paths.len());
        records
    }
}

/// A file, or the supported files of a directory in name order.
pub fn collect_inputs(input: &Path) -> Result<Vec<PathBuf>, AppError> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        return Err(AppError::Config(format!("Input not found: {}", input.display())));
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(input)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .map(|e| e.to_string_lossy().to_lowercase())
                    .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.as_str()))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Currency marker on the statement pages, else the configured default.
fn detect_currency(ctx: &ReportContext, default: &str) -> String {
    let pages: Vec<&Page> = STATEMENT_KEYWORDS
        .iter()
        .flat_map(|kw| ctx.keyword_pages(kw))
        .collect();
    currency_marker(&pages).unwrap_or_else(|| default.to_string())
}

pub fn currency_marker(pages: &[&Page]) -> Option<String> {
    pages.iter().find_map(|page| {
        CURRENCY_RE.captures(&page.text).map(|caps| {
            if let Some(code) = caps.get(1) {
                code.as_str().to_string()
            } else if caps.get(2).is_some() {
                "LKR".to_string()
            } else {
                "USD".to_string()
            }
        })
    })
}
