// src/extractors/overrides.rs
//! Declarative table of verified values that win over extraction.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::extractors::metrics::Metric;
use crate::extractors::record::{RightsIssue, Shareholder};
use crate::fiscal::FiscalPeriod;
use crate::utils::error::AppError;

const BUNDLED: &str = include_str!("../../data/overrides.json");

/// Partial dataset for the documents it matches. An entry matches a
/// document whose id contains `document_id` or whose period equals `period`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideEntry {
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub period: Option<FiscalPeriod>,
    #[serde(default)]
    pub metrics: HashMap<Metric, f64>,
    #[serde(default)]
    pub right_issue: Option<RightsIssue>,
    #[serde(default)]
    pub top_shareholders: Option<Vec<Shareholder>>,
}

impl OverrideEntry {
    pub fn matches(&self, document: &Document) -> bool {
        let by_id = self
            .document_id
            .as_deref()
            .is_some_and(|id| !id.is_empty() && document.id.contains(id));
        let by_period = self.period.is_some_and(|p| p == document.period);
        by_id || by_period
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideTable {
    entries: Vec<OverrideEntry>,
}

impl OverrideTable {
    pub fn new(entries: Vec<OverrideEntry>) -> Self {
        Self { entries }
    }

    /// The table shipped with the crate.
    pub fn bundled() -> Result<Self, AppError> {
        Self::parse(BUNDLED, "bundled overrides")
    }

    /// Reads a JSON array of entries; replaces the bundled table.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let table = Self::parse(&raw, &path.display().to_string())?;
        tracing::info!("Loaded {} override entries from {}", table.entries.len(), path.display());
        Ok(table)
    }

    fn parse(raw: &str, origin: &str) -> Result<Self, AppError> {
        let entries: Vec<OverrideEntry> = serde_json::from_str(raw)
            .map_err(|e| AppError::Config(format!("Invalid override table {}: {}", origin, e)))?;
        Ok(Self { entries })
    }

    /// First entry matching the document.
    pub fn lookup(&self, document: &Document) -> Option<&OverrideEntry> {
        let found = self.entries.iter().find(|e| e.matches(document));
        if found.is_some() {
            tracing::info!("Override entry applies to {}", document.id);
        }
        found
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
