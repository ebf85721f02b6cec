// src/extractors/tables.rs
//! Raw table extraction: backends, parameter sets and the fallback chain.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::document::Page;
use crate::extractors::numeric;
use crate::utils::error::ExtractError;

// --- CSS Selectors (Lazy Static) ---
static TABLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table").expect("Failed to compile TABLE_SELECTOR"));
static ROW_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("tr").expect("Failed to compile ROW_SELECTOR"));
static CELL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("th, td").expect("Failed to compile CELL_SELECTOR"));

// Two or more spaces (or any tab) separate columns in whitespace-aligned text
static CELL_GAP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\t+|\s{2,}").expect("valid cell gap regex"));

const RULE_SEPARATORS: [char; 2] = ['|', '│'];
const BORDER_CHARS: &str = "-+=|│─━═┼├┤┌┐└┘┬┴╋ ";
const SHADING_CHARS: &str = "░▒▓█ ";
const RULE_LINE_CHARS: &str = "-=_─━═ ";

/// Grid of secondary tuning values tried once both primary modes come back empty.
pub const EDGE_TOLERANCES: [usize; 3] = [1, 2, 3];
pub const BACKGROUND_SETTINGS: [bool; 2] = [true, false];

/// Ruled-border detection versus whitespace-alignment detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    Lattice,
    Stream,
}

/// One parameter set handed to a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionParams {
    pub mode: ExtractionMode,
    /// Blank lines that may separate two rows of the same table.
    pub edge_tol: usize,
    /// Skip shading/rule lines instead of treating them as table boundaries.
    pub process_background: bool,
}

impl ExtractionParams {
    pub const fn lattice() -> Self {
        Self {
            mode: ExtractionMode::Lattice,
            edge_tol: 0,
            process_background: false,
        }
    }

    pub const fn stream() -> Self {
        Self {
            mode: ExtractionMode::Stream,
            edge_tol: 0,
            process_background: false,
        }
    }
}

/// A rectangular grid of cell text as recovered from one page.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub page: usize,
    pub mode: ExtractionMode,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Builds a table, padding ragged rows with empty cells.
    pub fn new(page: usize, mode: ExtractionMode, mut rows: Vec<Vec<String>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in rows.iter_mut() {
            row.resize(width, String::new());
        }
        Self { page, mode, rows }
    }

    pub fn width(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn column(&self, col: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().map(move |r| r.get(col).map(String::as_str).unwrap_or(""))
    }

    /// Lower-cased, space-joined text of the non-empty cells of a row.
    pub fn row_text(&self, row: usize) -> String {
        self.rows
            .get(row)
            .map(|cells| {
                cells
                    .iter()
                    .filter(|c| !c.trim().is_empty())
                    .map(|c| c.to_lowercase())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default()
    }

    pub fn header(&self) -> &[String] {
        self.rows.first().map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Anything that can turn a page into tables.
///
/// Implementations report failures as `Err`; the chain logs them and moves
/// on, so a broken backend never aborts extraction.
pub trait TableBackend: Send + Sync {
    fn name(&self) -> &str;

    fn extract(&self, page: &Page, params: &ExtractionParams) -> Result<Vec<RawTable>, ExtractError>;
}

/// Built-in backend working from page text (and HTML markup when present).
#[derive(Debug, Default, Clone, Copy)]
pub struct TextLayoutBackend;

impl TableBackend for TextLayoutBackend {
    fn name(&self) -> &str {
        "text-layout"
    }

    fn extract(&self, page: &Page, params: &ExtractionParams) -> Result<Vec<RawTable>, ExtractError> {
        let tables = match params.mode {
            ExtractionMode::Lattice => {
                let from_markup = page
                    .html
                    .as_deref()
                    .map(|html| lattice_from_html(page.number, html))
                    .unwrap_or_default();
                if from_markup.is_empty() {
                    lattice_from_text(page, params)
                } else {
                    from_markup
                }
            }
            ExtractionMode::Stream => stream_from_text(page, params),
        };
        Ok(tables)
    }
}

/// Accumulates rows until a boundary, then emits a table if it is big enough.
struct TableBuilder {
    page: usize,
    mode: ExtractionMode,
    rows: Vec<Vec<String>>,
    blank_run: usize,
}

impl TableBuilder {
    fn new(page: usize, mode: ExtractionMode) -> Self {
        Self {
            page,
            mode,
            rows: Vec::new(),
            blank_run: 0,
        }
    }

    fn push(&mut self, cells: Vec<String>) {
        self.blank_run = 0;
        self.rows.push(cells);
    }

    fn blank(&mut self, edge_tol: usize, out: &mut Vec<RawTable>) {
        self.blank_run += 1;
        if self.blank_run > edge_tol {
            self.flush(out);
        }
    }

    fn flush(&mut self, out: &mut Vec<RawTable>) {
        self.blank_run = 0;
        let rows = std::mem::take(&mut self.rows);
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        if rows.len() < 2 || width < 2 {
            return;
        }
        let rows = match self.mode {
            ExtractionMode::Stream => align_right(rows, width),
            ExtractionMode::Lattice => rows,
        };
        out.push(RawTable::new(self.page, self.mode, rows));
    }
}

fn only_chars(line: &str, allowed: &str) -> bool {
    line.chars().all(|c| allowed.contains(c))
}

fn lattice_from_text(page: &Page, params: &ExtractionParams) -> Vec<RawTable> {
    let mut out = Vec::new();
    let mut builder = TableBuilder::new(page.number, ExtractionMode::Lattice);

    for line in page.text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            builder.blank(params.edge_tol, &mut out);
        } else if only_chars(trimmed, BORDER_CHARS) {
            continue;
        } else if only_chars(trimmed, SHADING_CHARS) {
            if !params.process_background {
                builder.flush(&mut out);
            }
        } else if trimmed.contains(RULE_SEPARATORS) {
            builder.push(split_ruled(trimmed));
        } else {
            builder.flush(&mut out);
        }
    }
    builder.flush(&mut out);
    out
}

fn split_ruled(line: &str) -> Vec<String> {
    let mut cells: Vec<String> = line
        .split(RULE_SEPARATORS)
        .map(|c| c.trim().to_string())
        .collect();
    if line.starts_with(RULE_SEPARATORS) && cells.first().is_some_and(|c| c.is_empty()) {
        cells.remove(0);
    }
    if line.ends_with(RULE_SEPARATORS) && cells.last().is_some_and(|c| c.is_empty()) {
        cells.pop();
    }
    cells
}

fn lattice_from_html(page: usize, html: &str) -> Vec<RawTable> {
    let fragment = Html::parse_fragment(html);
    fragment
        .select(&TABLE_SELECTOR)
        .filter_map(|table| {
            let rows: Vec<Vec<String>> = table
                .select(&ROW_SELECTOR)
                .map(|tr| tr.select(&CELL_SELECTOR).map(cell_text).collect::<Vec<_>>())
                .filter(|cells: &Vec<String>| cells.iter().any(|c| !c.is_empty()))
                .collect();
            let width = rows.iter().map(Vec::len).max().unwrap_or(0);
            (rows.len() >= 2 && width >= 2).then(|| RawTable::new(page, ExtractionMode::Lattice, rows))
        })
        .collect()
}

fn cell_text(cell: ElementRef) -> String {
    cell.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\u{a0}', " ")
}

fn stream_from_text(page: &Page, params: &ExtractionParams) -> Vec<RawTable> {
    let mut out = Vec::new();
    let mut builder = TableBuilder::new(page.number, ExtractionMode::Stream);

    for line in page.text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            builder.blank(params.edge_tol, &mut out);
            continue;
        }
        if only_chars(trimmed, RULE_LINE_CHARS) {
            if !params.process_background {
                builder.flush(&mut out);
            }
            continue;
        }

        let mut cells: Vec<String> = CELL_GAP_RE
            .split(trimmed)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if cells.len() >= 2 {
            // An indented line has no row label (column headers, subtotals)
            if CELL_GAP_RE.find(line).is_some_and(|m| m.start() == 0) {
                cells.insert(0, String::new());
            }
            builder.push(cells);
        } else {
            builder.flush(&mut out);
        }
    }
    builder.flush(&mut out);
    out
}

/// Short rows lose their empty cells to whitespace splitting. Figures sit
/// right-aligned under their year columns, so pad from the left, keeping a
/// text label in column 0.
fn align_right(rows: Vec<Vec<String>>, width: usize) -> Vec<Vec<String>> {
    rows.into_iter()
        .map(|row| {
            if row.len() == width {
                return row;
            }
            let mut aligned = vec![String::new(); width];
            let mut cells = row.into_iter().peekable();
            let mut offset = 0;
            if cells.peek().is_some_and(|c| !numeric::is_numeric_cell(c)) {
                aligned[0] = cells.next().unwrap_or_default();
                offset = 1;
            }
            let rest: Vec<String> = cells.collect();
            let start = width - rest.len();
            for (i, cell) in rest.into_iter().enumerate() {
                aligned[start.max(offset) + i] = cell;
            }
            aligned
        })
        .collect()
}

/// Ordered list of (parameter set × backend) attempts; per page, the first
/// attempt that yields at least one table wins.
pub struct StrategyChain {
    backends: Vec<Box<dyn TableBackend>>,
    attempts: Vec<ExtractionParams>,
}

impl StrategyChain {
    pub fn new(backends: Vec<Box<dyn TableBackend>>) -> Self {
        Self {
            backends,
            attempts: Self::default_attempts(),
        }
    }

    /// Chain over the built-in text layout backend.
    pub fn standard() -> Self {
        Self::new(vec![Box::new(TextLayoutBackend)])
    }

    /// Lattice, then stream, then the tuning grid across both modes.
    pub fn default_attempts() -> Vec<ExtractionParams> {
        let mut attempts = vec![ExtractionParams::lattice(), ExtractionParams::stream()];
        for mode in [ExtractionMode::Lattice, ExtractionMode::Stream] {
            for edge_tol in EDGE_TOLERANCES {
                for process_background in BACKGROUND_SETTINGS {
                    attempts.push(ExtractionParams {
                        mode,
                        edge_tol,
                        process_background,
                    });
                }
            }
        }
        attempts
    }

    pub fn attempts(&self) -> &[ExtractionParams] {
        &self.attempts
    }

    /// Tables from every page, in page order.
    pub fn extract(&self, pages: &[&Page]) -> Vec<RawTable> {
        pages.iter().flat_map(|page| self.extract_page(page)).collect()
    }

    pub fn extract_page(&self, page: &Page) -> Vec<RawTable> {
        for params in &self.attempts {
            for backend in &self.backends {
                match backend.extract(page, params) {
                    Ok(tables) if !tables.is_empty() => {
                        tracing::debug!(
                            "{} table(s) on page {} via {} {:?} (edge_tol={}, background={})",
                            tables.len(),
                            page.number,
                            backend.name(),
                            params.mode,
                            params.edge_tol,
                            params.process_background
                        );
                        return tables;
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("{}; trying next strategy", e),
                }
            }
        }
        tracing::debug!("No tables recovered from page {}", page.number);
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingBackend;

    impl TableBackend for FailingBackend {
        fn name(&self) -> &str {
            "failing"
        }

        fn extract(&self, page: &Page, _params: &ExtractionParams) -> Result<Vec<RawTable>, ExtractError> {
            Err(ExtractError::Backend {
                backend: "failing".to_string(),
                page: page.number,
                message: "renderer crashed".to_string(),
            })
        }
    }

    #[test]
    fn lattice_reads_ruled_rows() {
        let page = Page::new(
            4,
            "Income Statement\n+-----------+--------+\n| Revenue   | 1,000 |\n|-----------|--------|\n| Cost of sales | (700) |\n+-----------+--------+",
        );
        let tables = TextLayoutBackend.extract(&page, &ExtractionParams::lattice()).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows, vec![vec!["Revenue", "1,000"], vec!["Cost of sales", "(700)"]]);
        assert_eq!(tables[0].page, 4);
    }

    #[test]
    fn lattice_reads_html_tables() {
        let html = "<div><table><tr><th>Name</th><th>%</th></tr><tr><td>A PLC</td><td>9.31</td></tr></table></div>";
        let page = Page::with_html(1, "Name\n%\nA PLC\n9.31", html);
        let tables = TextLayoutBackend.extract(&page, &ExtractionParams::lattice()).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].cell(1, 0), "A PLC");
        assert_eq!(tables[0].cell(1, 1), "9.31");
    }

    #[test]
    fn stream_aligns_short_rows_right() {
        let page = Page::new(
            1,
            "Group Income Statement\n              Note      2020       2019\nRevenue          4    120,000    100,000\nGross profit          40,000     30,000",
        );
        let tables = TextLayoutBackend.extract(&page, &ExtractionParams::stream()).unwrap();
        assert_eq!(tables.len(), 1);
        let t = &tables[0];
        assert_eq!(t.width(), 4);
        assert_eq!(t.rows[0], vec!["", "Note", "2020", "2019"]);
        assert_eq!(t.rows[2], vec!["Gross profit", "", "40,000", "30,000"]);
    }

    #[test]
    fn shading_lines_only_bridged_with_background_processing() {
        let text = "| a | 1 |\n| b | 2 |\n▒▒▒▒▒▒▒▒\n| c | 3 |\n| d | 4 |";
        let page = Page::new(1, text);
        let plain = TextLayoutBackend.extract(&page, &ExtractionParams::lattice()).unwrap();
        assert_eq!(plain.len(), 2);
        let params = ExtractionParams {
            process_background: true,
            ..ExtractionParams::lattice()
        };
        let merged = TextLayoutBackend.extract(&page, &params).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].height(), 4);
    }

    #[test]
    fn chain_falls_through_to_tuning_grid() {
        // Single-row fragments separated by a blank line only join once edge_tol >= 1
        let page = Page::new(1, "Basic EPS    7.25\n\nDiluted EPS    7.10");
        let chain = StrategyChain::standard();
        let tables = chain.extract(&[&page]);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].mode, ExtractionMode::Stream);
        assert_eq!(tables[0].height(), 2);
    }

    #[test]
    fn backend_failure_is_isolated() {
        let page = Page::new(2, "Revenue    100,000\nCost of sales    (70,000)");
        let chain = StrategyChain::new(vec![Box::new(FailingBackend), Box::new(TextLayoutBackend)]);
        let tables = chain.extract(&[&page]);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].cell(1, 1), "(70,000)");
    }

    #[test]
    fn only_failing_backends_yield_nothing() {
        let page = Page::new(1, "Revenue    100,000\nCost    70,000");
        let chain = StrategyChain::new(vec![Box::new(FailingBackend)]);
        assert!(chain.extract(&[&page]).is_empty());
    }

    #[test]
    fn attempt_grid_shape() {
        let attempts = StrategyChain::default_attempts();
        assert_eq!(attempts.len(), 2 + 2 * 3 * 2);
        assert_eq!(attempts[0], ExtractionParams::lattice());
        assert_eq!(attempts[1], ExtractionParams::stream());
        assert_eq!(StrategyChain::standard().attempts(), attempts.as_slice());
    }
}
