// src/extractors/columns.rs
//! Column role inference in two phases: header text first, then content shape.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::Thresholds;
use crate::extractors::numeric;
use crate::extractors::tables::RawTable;
use crate::fiscal::FiscalPeriod;

static YEAR_HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("valid year header regex"));

// Note references: "4", "12", "3.1"
static NOTE_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}(?:\.\d)?$").expect("valid note reference regex"));

/// Scalar metrics look at no more than this many value columns per table.
pub const MAX_VALUE_COLUMNS: usize = 3;

/// Column indices of a ranked-shareholder table.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRoles {
    pub name: Option<usize>,
    pub shares: Option<usize>,
    pub percentage: Option<usize>,
}

impl ColumnRoles {
    fn is_taken(&self, col: usize) -> bool {
        [self.name, self.shares, self.percentage].contains(&Some(col))
    }

    /// Fills roles this set lacks from `fallback`, never reusing a column.
    pub fn or_else(mut self, fallback: ColumnRoles) -> ColumnRoles {
        if self.percentage.is_none() {
            if let Some(c) = fallback.percentage.filter(|&c| !self.is_taken(c)) {
                self.percentage = Some(c);
            }
        }
        if self.shares.is_none() {
            if let Some(c) = fallback.shares.filter(|&c| !self.is_taken(c)) {
                self.shares = Some(c);
            }
        }
        if self.name.is_none() {
            if let Some(c) = fallback.name.filter(|&c| !self.is_taken(c)) {
                self.name = Some(c);
            }
        }
        self
    }
}

/// True when a row reads like column headings rather than data: heading
/// words and no figures.
pub fn is_header_row(table: &RawTable, row: usize) -> bool {
    let text = table.row_text(row);
    let worded = ["name", "shareholder", "%", "no.", "number", "percent"]
        .iter()
        .any(|kw| text.contains(kw));
    worded
        && table
            .rows
            .get(row)
            .is_some_and(|cells| !cells.iter().any(|c| numeric::is_numeric_cell(c)))
}

/// Phase one: roles named by the header row.
pub fn roles_from_header(header: &[String]) -> ColumnRoles {
    let mut roles = ColumnRoles::default();
    for (i, cell) in header.iter().enumerate() {
        let h = cell.to_lowercase();
        if h.is_empty() {
            continue;
        }
        if h.contains('%') || h.contains("percent") {
            roles.percentage.get_or_insert(i);
        } else if h.contains("name") || h.contains("shareholder") || h.contains("holder") {
            roles.name.get_or_insert(i);
        } else if h.contains("number") || h.contains("shares") || h.contains("holding") || h.contains("no.") {
            roles.shares.get_or_insert(i);
        }
    }
    roles
}

#[derive(Debug, Default)]
struct ColumnShape {
    non_empty: usize,
    numeric: usize,
    percent_signs: usize,
    bounded_decimals: usize,
    large_integers: usize,
    textual: usize,
}

fn column_shape(table: &RawTable, col: usize, from_row: usize, thresholds: &Thresholds) -> ColumnShape {
    let mut shape = ColumnShape::default();
    for cell in table.column(col).skip(from_row) {
        let cell = cell.trim();
        if cell.is_empty() {
            continue;
        }
        shape.non_empty += 1;
        if cell.contains('%') {
            shape.percent_signs += 1;
        }
        match numeric::parse(cell).filter(|_| numeric::is_numeric_cell(cell)) {
            Some(v) => {
                shape.numeric += 1;
                if cell.contains('.') && v > 0.0 && v < thresholds.percentage_max {
                    shape.bounded_decimals += 1;
                }
                if !cell.contains('.') && v >= thresholds.shares_min {
                    shape.large_integers += 1;
                }
            }
            None => {
                if cell.chars().filter(|c| c.is_alphabetic()).count() >= 3 {
                    shape.textual += 1;
                }
            }
        }
    }
    shape
}

/// Phase two: roles guessed from what the data cells look like.
pub fn roles_from_shape(table: &RawTable, from_row: usize, thresholds: &Thresholds) -> ColumnRoles {
    let shapes: Vec<ColumnShape> = (0..table.width())
        .map(|c| column_shape(table, c, from_row, thresholds))
        .collect();
    let majority = |count: usize, shape: &ColumnShape| shape.non_empty > 0 && count * 2 >= shape.non_empty;

    let mut roles = ColumnRoles::default();

    roles.percentage = shapes
        .iter()
        .position(|s| s.percent_signs > 0 && majority(s.numeric, s))
        .or_else(|| shapes.iter().position(|s| majority(s.bounded_decimals, s)));

    roles.shares = shapes
        .iter()
        .enumerate()
        .find(|(i, s)| Some(*i) != roles.percentage && majority(s.large_integers, s))
        .map(|(i, _)| i);

    roles.name = shapes
        .iter()
        .enumerate()
        .filter(|(i, s)| !roles.is_taken(*i) && majority(s.textual, s))
        .max_by(|(ia, a), (ib, b)| a.textual.cmp(&b.textual).then(ib.cmp(ia)))
        .map(|(i, _)| i);

    roles
}

/// Header roles, gaps filled from content shape.
pub fn classify_shareholder_columns(table: &RawTable, thresholds: &Thresholds) -> ColumnRoles {
    let has_header = is_header_row(table, 0);
    let from_header = if has_header {
        roles_from_header(table.header())
    } else {
        ColumnRoles::default()
    };
    let from_row = usize::from(has_header);
    from_header.or_else(roles_from_shape(table, from_row, thresholds))
}

/// Phase one for scalar metrics: columns headed by a year, the period's end
/// year first, then its start year, then the rest left to right.
pub fn value_columns_from_header(header: &[String], period: &FiscalPeriod) -> Vec<usize> {
    let end = period.end_year.to_string();
    let start = period.start_year.to_string();

    let mut ranked: Vec<(u8, usize)> = header
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, h)| YEAR_HEADER_RE.is_match(h) && !h.to_lowercase().contains("note"))
        .map(|(i, h)| {
            let rank = if h.contains(&end) {
                0
            } else if h.contains(&start) {
                1
            } else {
                2
            };
            (rank, i)
        })
        .collect();
    ranked.sort();
    ranked.into_iter().map(|(_, i)| i).take(MAX_VALUE_COLUMNS).collect()
}

/// Phase two for scalar metrics: mostly-numeric columns after the label,
/// skipping note-reference columns.
pub fn value_columns_from_shape(table: &RawTable, from_row: usize) -> Vec<usize> {
    (1..table.width())
        .filter(|&c| {
            let cells: Vec<&str> = table
                .column(c)
                .skip(from_row)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            if cells.is_empty() {
                return false;
            }
            let numeric = cells.iter().filter(|s| numeric::is_numeric_cell(s)).count();
            let notes = cells.iter().filter(|s| NOTE_REF_RE.is_match(s)).count();
            numeric * 2 >= cells.len() && notes < cells.len()
        })
        .take(MAX_VALUE_COLUMNS)
        .collect()
}

/// Bounded set of value columns to scan for a metric row.
pub fn candidate_value_columns(table: &RawTable, period: &FiscalPeriod) -> Vec<usize> {
    let from_header = value_columns_from_header(table.header(), period);
    if !from_header.is_empty() {
        return from_header;
    }
    value_columns_from_shape(table, 0)
}
