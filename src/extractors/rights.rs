// src/extractors/rights.rs
//! Rights-issue resolver: ratio, issue price and date.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::Thresholds;
use crate::extractors::context::ReportContext;
use crate::extractors::numeric;
use crate::extractors::record::RightsIssue;
use crate::extractors::tables::RawTable;

pub const RIGHTS_KEYWORDS: [&str; 3] = ["Rights Issue", "Right Issues", "Rights Issues"];

static RATIO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,3}\s*:\s*\d{1,3}\b").expect("valid ratio regex"));

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,2}[-/.]\d{1,2}[-/.]\d{2,4}\b").expect("valid date regex"));

// "Rs. 12.50", "LKR 145.00", "price of 12.50"
static PRICE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\brs\.?|\blkr|\bprice[^\d\n]{0,20})\s*(\d[\d,]*(?:\.\d+)?)").expect("valid price regex")
});

const PRICE_LABELS: [&str; 3] = ["price", "issue", "rs."];

/// Table rows first, then the raw text of the keyword pages.
pub fn resolve(ctx: &ReportContext) -> RightsIssue {
    let limits = ctx.thresholds();
    for keyword in RIGHTS_KEYWORDS {
        let tables = ctx.tables(keyword);
        if let Some(found) = tables.iter().map(|t| from_table(t, limits)).find(|r| !r.is_empty()) {
            tracing::debug!("Rights issue from '{}' tables: {:?}", keyword, found);
            return found;
        }
    }

    for keyword in RIGHTS_KEYWORDS {
        for page in ctx.keyword_pages(keyword) {
            let found = from_text(&page.text, limits);
            if !found.is_empty() {
                tracing::debug!("Rights issue from page {} text: {:?}", page.number, found);
                return found;
            }
        }
    }

    tracing::debug!("No rights issue found in {}", ctx.document.id);
    RightsIssue::default()
}

/// Ratio rows give an `N:M` token, date rows a date, price or issue rows a
/// price. Attributes no labelled row supplies are then searched for anywhere
/// in the table.
pub fn from_table(table: &RawTable, limits: &Thresholds) -> RightsIssue {
    let mut rights = RightsIssue::default();
    for row in 0..table.height() {
        let text = table.row_text(row);
        let cells = || (0..table.width()).map(move |c| table.cell(row, c));

        if text.contains("ratio") {
            if rights.ratio.is_none() {
                rights.ratio = cells().find_map(ratio_in);
            }
        } else if text.contains("date") {
            if rights.date.is_none() {
                rights.date = cells().find_map(date_in);
            }
        } else if (text.contains("price") || text.contains("issue")) && rights.issue_price.is_none() {
            rights.issue_price = cells().find_map(|c| price_cell(c, limits));
        }
    }

    if rights.ratio.is_none() {
        rights.ratio = table.rows.iter().flatten().find_map(|c| ratio_in(c));
    }
    if rights.date.is_none() {
        rights.date = table.rows.iter().flatten().find_map(|c| date_in(c));
    }
    if rights.issue_price.is_none() {
        // Columns headed "Issue Rs.", "Price" and the like
        rights.issue_price = (0..table.width())
            .filter(|&c| {
                let header = table.cell(0, c).to_lowercase();
                PRICE_LABELS.iter().any(|l| header.contains(l))
            })
            .find_map(|c| table.column(c).skip(1).find_map(|cell| price_cell(cell, limits)));
    }
    rights
}

/// The same three searches over free text, labelled lines first, then any
/// line.
pub fn from_text(text: &str, limits: &Thresholds) -> RightsIssue {
    let mut rights = RightsIssue::default();
    for line in text.lines() {
        let lower = line.to_lowercase();
        if rights.ratio.is_none() && lower.contains("ratio") {
            rights.ratio = ratio_in(line);
        }
        if rights.date.is_none() && lower.contains("date") {
            rights.date = date_in(line);
        }
        if rights.issue_price.is_none() && (lower.contains("price") || lower.contains("issue")) {
            rights.issue_price = price_in(line, limits);
        }
    }

    if rights.ratio.is_none() {
        rights.ratio = text.lines().find_map(ratio_in);
    }
    if rights.date.is_none() {
        rights.date = text.lines().find_map(date_in);
    }
    if rights.issue_price.is_none() {
        rights.issue_price = text.lines().find_map(|line| price_in(line, limits));
    }
    rights
}

fn ratio_in(text: &str) -> Option<String> {
    RATIO_RE.find(text).map(|m| compact_ratio(m.as_str()))
}

fn date_in(text: &str) -> Option<String> {
    DATE_RE.find(text).map(|m| m.as_str().to_string())
}

fn price_in(line: &str, limits: &Thresholds) -> Option<f64> {
    PRICE_RE
        .captures_iter(line)
        .filter_map(|caps| numeric::parse(&caps[1]))
        .find(|&v| v > 0.0 && v < limits.issue_price_max)
}

// Ratio and date cells also parse as numbers
fn price_cell(cell: &str, limits: &Thresholds) -> Option<f64> {
    if !numeric::is_numeric_cell(cell) || RATIO_RE.is_match(cell) || DATE_RE.is_match(cell) {
        return None;
    }
    numeric::parse(cell).filter(|&v| v > 0.0 && v < limits.issue_price_max)
}

fn compact_ratio(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::tables::ExtractionMode;

    #[test]
    fn ratio_and_price_from_table_rows() {
        let table = RawTable::new(
            3,
            ExtractionMode::Stream,
            vec![
                vec!["Rights Issue".into(), "2021".into()],
                vec!["Ratio".into(), "1 : 5".into()],
                vec!["Issue price (Rs.)".into(), "12.50".into()],
                vec!["Date of allotment".into(), "15/03/2021".into()],
            ],
        );
        let rights = from_table(&table, &Thresholds::default());
        assert_eq!(rights.ratio.as_deref(), Some("1:5"));
        assert_eq!(rights.issue_price, Some(12.5));
        assert_eq!(rights.date.as_deref(), Some("15/03/2021"));
    }

    #[test]
    fn implausible_price_is_rejected() {
        let table = RawTable::new(
            1,
            ExtractionMode::Stream,
            vec![
                vec!["Issue price".into(), "2,500.00".into()],
                vec!["Subscription price".into(), "0".into()],
            ],
        );
        assert!(from_table(&table, &Thresholds::default()).is_empty());
    }

    #[test]
    fn text_scan_recovers_attributes() {
        let text = "The Board approved a rights issue in the ratio of 1:8\nat a price of Rs. 145.00 per share.\nRecord date 05.06.2020";
        let rights = from_text(text, &Thresholds::default());
        assert_eq!(rights.ratio.as_deref(), Some("1:8"));
        assert_eq!(rights.issue_price, Some(145.0));
        assert_eq!(rights.date.as_deref(), Some("05.06.2020"));
    }

    #[test]
    fn unlabelled_ratio_and_price_are_recovered() {
        let cases = [("1:5", "12.50", 12.5), ("2 : 7", "145.00", 145.0), ("1:10", "Rs. 9.75", 9.75), ("3:20", "999", 999.0)];
        for (ratio, price, expected) in cases {
            let table = RawTable::new(
                1,
                ExtractionMode::Stream,
                vec![
                    vec!["Rights Issue".into(), "Basis".into(), "Issue Rs.".into()],
                    vec!["2021".into(), ratio.into(), price.into()],
                ],
            );
            let compact: String = ratio.chars().filter(|c| !c.is_whitespace()).collect();
            let from_rows = from_table(&table, &Thresholds::default());
            assert_eq!(from_rows.ratio.as_deref(), Some(compact.as_str()), "table {}", ratio);
            assert_eq!(from_rows.issue_price, Some(expected), "table {}", price);

            let line = format!("Rights issue 2021: {} at Rs. {} per share", ratio, price.trim_start_matches("Rs. "));
            let from_line = from_text(&line, &Thresholds::default());
            assert_eq!(from_line.ratio.as_deref(), Some(compact.as_str()), "text {}", line);
            assert_eq!(from_line.issue_price, Some(expected), "text {}", line);
        }
    }

    #[test]
    fn nothing_found_stays_empty() {
        let rights = from_text("No corporate actions during the year.", &Thresholds::default());
        assert!(rights.is_empty());
    }
}
