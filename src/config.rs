// src/config.rs
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::error::AppError;

/// Plausibility limits used to accept or reject candidate cell values.
///
/// The defaults are hand-tuned for statements reported in thousands of the
/// local currency. They are kept as named values so a deployment can adjust
/// them from a config file without touching the resolvers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Alternate-statement scans only accept monetary cells above this.
    pub currency_min: f64,
    /// EPS and per-share figures must lie strictly inside (0, per_share_max).
    pub per_share_max: f64,
    /// Percentages (margin, holdings) must lie strictly inside (0, percentage_max).
    pub percentage_max: f64,
    /// Rights-issue prices must lie strictly inside (0, issue_price_max).
    pub issue_price_max: f64,
    /// Smallest value treated as a share count by the column classifier.
    pub shares_min: f64,
    /// A shareholder table needs at least this many valid rows.
    pub min_shareholder_rows: usize,
    /// Shareholder lists are truncated to this length.
    pub max_shareholders: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            currency_min: 1_000_000.0,
            per_share_max: 100.0,
            percentage_max: 100.0,
            issue_price_max: 1_000.0,
            shares_min: 1_000.0,
            min_shareholder_rows: 5,
            max_shareholders: 20,
        }
    }
}

/// Everything the pipeline needs beyond the documents themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub thresholds: Thresholds,
    /// Currency tag used when no currency marker is found on statement pages.
    pub default_currency: String,
    /// Number of leading pages searched for a contents page.
    pub toc_scan_pages: usize,
    /// Number of leading pages searched for an "Annual Report YYYY/YY" banner.
    pub period_scan_pages: usize,
    /// Business segments reported alongside the yearly data.
    pub industry_groups: Vec<String>,
    /// Share count assumed when no shareholder row allows an estimate.
    pub default_outstanding_shares: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            default_currency: "LKR".to_string(),
            toc_scan_pages: 20,
            period_scan_pages: 10,
            industry_groups: [
                "Transportation",
                "Leisure",
                "Consumer Foods & Retail",
                "Financial Services",
                "Property",
                "Information Technology",
            ]
            .iter()
            .map(|g| g.to_string())
            .collect(),
            default_outstanding_shares: 1_385_000_000.0,
        }
    }
}

impl ExtractorConfig {
    /// Reads a JSON config file. Missing keys keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: ExtractorConfig = serde_json::from_str(&raw).map_err(|e| {
            AppError::Config(format!("Invalid config file {}: {}", path.display(), e))
        })?;
        tracing::debug!("Loaded extractor config from {}", path.display());
        Ok(config)
    }
}
