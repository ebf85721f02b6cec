// src/extractors/shareholders.rs
//! Top-shareholders resolver.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::Thresholds;
use crate::extractors::columns;
use crate::extractors::context::ReportContext;
use crate::extractors::numeric;
use crate::extractors::record::{Provenance, Shareholder};
use crate::extractors::tables::RawTable;
use crate::utils::error::ExtractError;

pub const SHAREHOLDER_KEYWORDS: [&str; 7] = [
    "Top Twenty Shareholders",
    "Top 20 Shareholders",
    "Twenty Largest Shareholders",
    "SHARE INFORMATION",
    "Twenty Major Shareholders",
    "20 Major Shareholders",
    "Top Twenty (20) Shareholders",
];

// Size-band label of a distribution schedule: "1 to 1,000", "1,001 - 10,000"
static BAND_RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d[\d,]*\s*(?:to|-|–)\s*\d[\d,]*$").expect("valid band range regex")
});

static DATE_SHAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}-\d{1,2}-\d{2,4}$").expect("valid date shape regex"));

// "Melstacorp PLC   128,917,111   9.31%" or "1. HWIC Asia Fund 8.61"
static TEXT_ROW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:\d{1,2}[.)]?\s+)?([A-Za-z][A-Za-z0-9\s()&',./-]*?[A-Za-z).])\s+(?:(\d{1,3}(?:,\d{3})+|\d{4,})\s+)?(\d{1,2}(?:\.\d{1,2})?)\s*%?\s*$",
    )
    .expect("valid shareholder line regex")
});

const SECTION_END_MARKERS: [&str; 3] = ["distribution of", "directors", "share price"];
const SKIPPED_NAMES: [&str; 4] = ["name", "shareholder", "shareholders", "total"];

/// Ranked list from tables, then page text, then a placeholder.
pub fn resolve(ctx: &ReportContext) -> (Vec<Shareholder>, Provenance) {
    let limits = ctx.thresholds();

    for keyword in SHAREHOLDER_KEYWORDS {
        for table in ctx.tables(keyword).iter() {
            match from_table(table, limits) {
                Ok(list) => {
                    tracing::info!(
                        "{} shareholders from page {} table ('{}')",
                        list.len(),
                        table.page,
                        keyword
                    );
                    return (list, Provenance::Extracted);
                }
                Err(e) => tracing::debug!("Page {}: {}", table.page, e),
            }
        }
    }

    for keyword in SHAREHOLDER_KEYWORDS {
        for page in ctx.keyword_pages(keyword) {
            let list = from_text(&page.text, limits);
            if list.len() >= limits.min_shareholder_rows {
                tracing::info!("{} shareholders from page {} text", list.len(), page.number);
                return (list, Provenance::Extracted);
            }
        }
    }

    tracing::warn!("No shareholder table found in {}; using placeholder", ctx.document.id);
    (placeholder(), Provenance::Placeholder)
}

/// True for share-distribution schedules, which list holding-size bands
/// instead of holders. Only the label column is inspected.
pub fn is_distribution_table(table: &RawTable) -> bool {
    table.column(0).any(|cell| {
        let label = cell.trim().to_lowercase();
        label.contains("less than")
            || label.contains("distribution")
            || (BAND_RANGE_RE.is_match(&label) && !DATE_SHAPE_RE.is_match(&label))
    })
}

/// Reads a ranked-holder table. Rejects band tables, tables whose name or
/// percentage column cannot be identified, and tables with too few valid rows.
pub fn from_table(table: &RawTable, limits: &Thresholds) -> Result<Vec<Shareholder>, ExtractError> {
    if is_distribution_table(table) {
        return Err(ExtractError::TableRejected("share distribution schedule".to_string()));
    }

    let roles = columns::classify_shareholder_columns(table, limits);
    let (name_col, pct_col) = match (roles.name, roles.percentage) {
        (Some(n), Some(p)) => (n, p),
        _ => {
            return Err(ExtractError::TableRejected(format!(
                "no name/percentage columns ({:?})",
                roles
            )))
        }
    };

    let first_row = usize::from(columns::is_header_row(table, 0));
    let mut holders = Vec::new();
    for row in first_row..table.height() {
        let name = table.cell(row, name_col).trim();
        if !is_holder_name(name) {
            continue;
        }
        let percentage = match numeric::parse(table.cell(row, pct_col)) {
            Some(p) if p > 0.0 && p < limits.percentage_max => p,
            _ => continue,
        };
        let shares = roles
            .shares
            .and_then(|c| numeric::parse(table.cell(row, c)))
            .filter(|s| *s > 0.0);
        holders.push(Shareholder::new(name, percentage, shares));
    }

    if holders.len() < limits.min_shareholder_rows {
        return Err(ExtractError::TableRejected(format!(
            "{} valid shareholder rows, need {}",
            holders.len(),
            limits.min_shareholder_rows
        )));
    }
    Ok(rank(holders, limits.max_shareholders))
}

/// Regex scan of a shareholder page. Starts after a heading line naming the
/// top holders (or at the top when there is none) and stops at the next
/// section heading.
pub fn from_text(text: &str, limits: &Thresholds) -> Vec<Shareholder> {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines
        .iter()
        .position(|l| {
            let l = l.to_lowercase();
            l.contains("largest shareholders") || l.contains("top 20 shareholders") || l.contains("top twenty")
        })
        .map(|i| i + 1)
        .unwrap_or(0);

    let mut holders = Vec::new();
    for line in &lines[start..] {
        let lower = line.to_lowercase();
        if SECTION_END_MARKERS.iter().any(|m| lower.contains(m)) {
            break;
        }
        let Some(caps) = TEXT_ROW_RE.captures(line) else {
            continue;
        };
        let name = caps[1].trim();
        if name.len() < 3 || !is_holder_name(name) {
            continue;
        }
        let Some(percentage) = numeric::parse(&caps[3]).filter(|p| *p > 0.0 && *p < limits.percentage_max) else {
            continue;
        };
        let shares = caps.get(2).and_then(|m| numeric::parse(m.as_str()));
        holders.push(Shareholder::new(name, percentage, shares));
    }
    rank(holders, limits.max_shareholders)
}

/// Ten deterministic stand-in holders.
pub fn placeholder() -> Vec<Shareholder> {
    (1..=10)
        .map(|i| {
            let divisor = f64::from(i + 1);
            Shareholder::new(
                format!("Major Shareholder {}", i),
                20.0 / divisor,
                Some(1_000_000.0 / divisor),
            )
        })
        .collect()
}

/// Deduplicates by name (first occurrence wins), sorts descending by
/// percentage keeping source order among ties, and truncates.
pub fn rank(holders: Vec<Shareholder>, cap: usize) -> Vec<Shareholder> {
    let mut seen = HashSet::new();
    let mut unique: Vec<Shareholder> = holders
        .into_iter()
        .filter(|h| seen.insert(h.name.to_lowercase()))
        .collect();
    unique.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));
    unique.truncate(cap);
    unique
}

fn is_holder_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    !lower.is_empty()
        && !SKIPPED_NAMES.contains(&lower.as_str())
        && !lower.starts_with("total")
        && !numeric::is_numeric_cell(name)
}
