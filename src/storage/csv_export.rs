// src/storage/csv_export.rs
//! Per-period CSV files: metrics, top shareholders and rights issue.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::consolidate::format;
use crate::extractors::record::{
    ExtractionRecord, MetricValue, OperatingExpenses, Provenance, RightsIssue, Shareholder, StatementMetrics,
};
use crate::fiscal::FiscalPeriod;
use crate::utils::error::StorageError;

static METRICS_FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^financial_metrics_(\d{4}-\d{4})\.csv$").expect("valid metrics file regex"));

const REVENUE: &str = "Total Revenue";
const COST_OF_SALES: &str = "Cost of Sales";
const OPERATING_EXPENSES: &str = "Operating Expenses";
const GROSS_PROFIT: &str = "Gross Profit";
const GROSS_PROFIT_MARGIN: &str = "Gross Profit Margin (%)";
const EPS: &str = "Earnings Per Share";
const NAPS: &str = "Net Asset Per Share";

#[derive(Debug, Serialize, Deserialize)]
struct MetricRow {
    #[serde(rename = "Metric")]
    metric: String,
    #[serde(rename = "Value")]
    value: f64,
    #[serde(rename = "Formatted Value")]
    formatted: String,
    #[serde(rename = "Source", default = "extracted")]
    source: Provenance,
}

#[derive(Debug, Serialize, Deserialize)]
struct HolderRow {
    #[serde(rename = "Shareholder")]
    name: String,
    #[serde(rename = "Number of Shares")]
    shares: Option<f64>,
    #[serde(rename = "Percentage")]
    percentage: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct RightsRow {
    #[serde(rename = "Attribute")]
    attribute: String,
    #[serde(rename = "Value")]
    value: String,
}

fn extracted() -> Provenance {
    Provenance::Extracted
}

fn csv_error(e: csv::Error) -> StorageError {
    StorageError::SerializationError(e.to_string())
}

pub fn metrics_path(dir: &Path, period: &FiscalPeriod) -> PathBuf {
    dir.join(format!("financial_metrics_{}.csv", period.token()))
}

pub fn shareholders_path(dir: &Path, period: &FiscalPeriod) -> PathBuf {
    dir.join(format!("top_shareholders_{}.csv", period.token()))
}

pub fn rights_path(dir: &Path, period: &FiscalPeriod) -> PathBuf {
    dir.join(format!("rights_issues_{}.csv", period.token()))
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), StorageError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(csv_error)?;
    for row in rows {
        writer.serialize(row).map_err(csv_error)?;
    }
    writer.flush()?;
    Ok(())
}

fn read_rows<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>, StorageError> {
    let mut reader = csv::Reader::from_path(path).map_err(csv_error)?;
    reader
        .deserialize()
        .collect::<Result<Vec<T>, csv::Error>>()
        .map_err(csv_error)
}

/// Writes the three CSV files of one record into `dir`.
pub fn write_record(dir: &Path, record: &ExtractionRecord, default_currency: &str) -> Result<Vec<PathBuf>, StorageError> {
    let m = &record.metrics;
    let money = |metric: &str, v: &MetricValue| MetricRow {
        metric: metric.to_string(),
        value: v.value,
        formatted: format::currency(v.value, v.currency.as_deref().unwrap_or(default_currency)),
        source: v.source,
    };
    let plain = |metric: &str, v: &MetricValue, formatted: String| MetricRow {
        metric: metric.to_string(),
        value: v.value,
        formatted,
        source: v.source,
    };
    let metrics = [
        money(REVENUE, &m.revenue),
        money(COST_OF_SALES, &m.cost_of_sales),
        money(OPERATING_EXPENSES, &m.operating_expenses.total),
        money(GROSS_PROFIT, &m.gross_profit),
        plain(GROSS_PROFIT_MARGIN, &m.gross_profit_margin, format::percentage(m.gross_profit_margin.value)),
        plain(EPS, &m.earnings_per_share, format::per_share(m.earnings_per_share.value)),
        plain(NAPS, &m.net_asset_per_share, format::per_share(m.net_asset_per_share.value)),
    ];

    let holders: Vec<HolderRow> = record
        .top_shareholders
        .iter()
        .map(|h| HolderRow {
            name: h.name.clone(),
            shares: h.shares,
            percentage: h.percentage,
        })
        .collect();

    let na = |v: Option<String>| v.unwrap_or_else(|| "N/A".to_string());
    let rights = [
        ("ratio", na(record.right_issue.ratio.clone())),
        ("issue_price", na(record.right_issue.issue_price.map(|p| p.to_string()))),
        ("date", na(record.right_issue.date.clone())),
    ]
    .map(|(attribute, value)| RightsRow {
        attribute: attribute.to_string(),
        value,
    });

    let period = &record.period;
    let paths = vec![metrics_path(dir, period), shareholders_path(dir, period), rights_path(dir, period)];
    write_rows(&paths[0], &metrics)?;
    write_rows(&paths[1], &holders)?;
    write_rows(&paths[2], &rights)?;
    Ok(paths)
}

/// Periods that have a metrics file in `dir`, in order.
pub fn periods_in(dir: &Path) -> Result<Vec<FiscalPeriod>, StorageError> {
    if !dir.is_dir() {
        return Err(StorageError::NotFound(dir.display().to_string()));
    }
    let mut periods: Vec<FiscalPeriod> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            METRICS_FILE_RE
                .captures(&name)
                .and_then(|caps| caps[1].parse::<FiscalPeriod>().ok())
        })
        .collect();
    periods.sort();
    Ok(periods)
}

/// Rebuilds a record from the CSV files of `period`. The metrics file is
/// required; missing shareholder or rights files leave those fields empty.
pub fn read_record(dir: &Path, period: FiscalPeriod) -> Result<ExtractionRecord, StorageError> {
    let path = metrics_path(dir, &period);
    if !path.exists() {
        return Err(StorageError::NotFound(path.display().to_string()));
    }
    let rows: Vec<MetricRow> = read_rows(&path)?;
    let find = |metric: &str, monetary: bool| -> MetricValue {
        match rows.iter().find(|r| r.metric == metric) {
            Some(row) => MetricValue {
                value: row.value,
                source: row.source,
                currency: if monetary { currency_of(&row.formatted) } else { None },
            },
            None => MetricValue::new(0.0, Provenance::Placeholder),
        }
    };
    let component = || MetricValue::new(0.0, Provenance::Placeholder);

    let holders_file = shareholders_path(dir, &period);
    let mut top_shareholders: Vec<Shareholder> = if holders_file.exists() {
        read_rows::<HolderRow>(&holders_file)?
            .into_iter()
            .map(|r| Shareholder::new(r.name, r.percentage, r.shares))
            .collect()
    } else {
        Vec::new()
    };
    top_shareholders.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));

    let rights_file = rights_path(dir, &period);
    let mut right_issue = RightsIssue::default();
    if rights_file.exists() {
        for row in read_rows::<RightsRow>(&rights_file)? {
            let value = Some(row.value).filter(|v| v != "N/A" && !v.is_empty());
            match row.attribute.to_lowercase().as_str() {
                "ratio" => right_issue.ratio = value,
                "issue_price" => right_issue.issue_price = value.and_then(|v| v.parse().ok()),
                "date" => right_issue.date = value,
                other => tracing::debug!("Ignoring rights attribute '{}' in {}", other, rights_file.display()),
            }
        }
    }

    Ok(ExtractionRecord {
        document_id: format!("csv_{}", period.token()),
        period,
        metrics: StatementMetrics {
            revenue: find(REVENUE, true),
            cost_of_sales: find(COST_OF_SALES, true),
            operating_expenses: OperatingExpenses {
                total: find(OPERATING_EXPENSES, true),
                selling_distribution: component(),
                administrative: component(),
                other_operating: component(),
            },
            gross_profit: find(GROSS_PROFIT, true),
            gross_profit_margin: find(GROSS_PROFIT_MARGIN, false),
            earnings_per_share: find(EPS, false),
            net_asset_per_share: find(NAPS, false),
        },
        right_issue,
        shareholders_source: if top_shareholders.is_empty() {
            Provenance::Placeholder
        } else {
            Provenance::Extracted
        },
        top_shareholders,
    })
}

// "LKR 120.50 Mn" -> LKR
fn currency_of(formatted: &str) -> Option<String> {
    formatted
        .split_whitespace()
        .next()
        .filter(|code| code.chars().all(|c| c.is_ascii_uppercase()))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record() -> ExtractionRecord {
        let money = |x: f64| MetricValue::new(x, Provenance::Extracted).with_currency("USD");
        ExtractionRecord {
            document_id: "report_20-21".to_string(),
            period: FiscalPeriod::starting(2020),
            metrics: StatementMetrics {
                revenue: money(120_000.0),
                cost_of_sales: money(80_000.0),
                operating_expenses: OperatingExpenses {
                    total: MetricValue::new(5_000.0, Provenance::Derived).with_currency("USD"),
                    selling_distribution: money(5_000.0),
                    administrative: component_placeholder(),
                    other_operating: component_placeholder(),
                },
                gross_profit: MetricValue::new(40_000.0, Provenance::Derived).with_currency("USD"),
                gross_profit_margin: MetricValue::new(33.33, Provenance::Derived),
                earnings_per_share: MetricValue::new(7.5, Provenance::Placeholder),
                net_asset_per_share: MetricValue::new(155.0, Provenance::Placeholder),
            },
            right_issue: RightsIssue {
                ratio: Some("1:5".to_string()),
                issue_price: Some(12.5),
                date: None,
            },
            top_shareholders: vec![
                Shareholder::new("Melstacorp PLC", 9.31, Some(128_917_111.0)),
                Shareholder::new("Smith, J.", 2.5, None),
            ],
            shareholders_source: Provenance::Extracted,
        }
    }

    fn component_placeholder() -> MetricValue {
        MetricValue::new(0.0, Provenance::Placeholder)
    }

    #[test]
    fn files_have_expected_headers() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_record(dir.path(), &record(), "LKR").unwrap();
        let names: Vec<String> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "financial_metrics_2020-2021.csv",
                "top_shareholders_2020-2021.csv",
                "rights_issues_2020-2021.csv"
            ]
        );
        let metrics = std::fs::read_to_string(&paths[0]).unwrap();
        assert!(metrics.starts_with("Metric,Value,Formatted Value,Source\n"));
        assert!(metrics.contains("Total Revenue,120000.0,USD 0.12 Mn,extracted"));
        let holders = std::fs::read_to_string(&paths[1]).unwrap();
        assert!(holders.contains("\"Smith, J.\",,2.5"));
        let rights = std::fs::read_to_string(&paths[2]).unwrap();
        assert!(rights.contains("date,N/A"));
    }

    #[test]
    fn record_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        write_record(dir.path(), &record(), "LKR").unwrap();
        assert_eq!(periods_in(dir.path()).unwrap(), vec![FiscalPeriod::starting(2020)]);

        let back = read_record(dir.path(), FiscalPeriod::starting(2020)).unwrap();
        let original = record();
        assert_eq!(back.metrics.revenue, original.metrics.revenue);
        assert_eq!(back.metrics.gross_profit, original.metrics.gross_profit);
        assert_eq!(back.metrics.gross_profit_margin, original.metrics.gross_profit_margin);
        assert_eq!(back.metrics.earnings_per_share, original.metrics.earnings_per_share);
        assert_eq!(back.right_issue, original.right_issue);
        assert_eq!(back.top_shareholders, original.top_shareholders);
        assert!(back.metrics.operating_expenses.administrative.is_placeholder());
    }

    #[test]
    fn metrics_file_is_required() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_record(dir.path(), FiscalPeriod::starting(2019)),
            Err(StorageError::NotFound(_))
        ));
    }
}
