// src/extractors/metrics.rs
//! Scalar field resolvers: ordered table-scan strategies per metric, then
//! accounting identities, then deterministic placeholders.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::Thresholds;
use crate::extractors::columns;
use crate::extractors::context::ReportContext;
use crate::extractors::numeric;
use crate::extractors::record::{MetricValue, OperatingExpenses, Provenance, StatementMetrics};
use crate::extractors::tables::RawTable;
use crate::fiscal::FiscalPeriod;

const INCOME_STATEMENT: &[&str] = &["Income Statement"];
const ALTERNATE_STATEMENTS: &[&str] = &[
    "CONSOLIDATED INCOME STATEMENT",
    "Group Income Statement",
    "STATEMENT OF PROFIT OR LOSS",
];
const SUMMARY_INDICATORS: &[&str] = &["Summary Indicators"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Revenue,
    CostOfSales,
    GrossProfit,
    OperatingExpenses,
    SellingDistribution,
    Administrative,
    OtherOperating,
    GrossProfitMargin,
    EarningsPerShare,
    NetAssetPerShare,
}

impl Metric {
    /// Expenses are reported in parentheses but stored as magnitudes.
    pub fn is_expense(&self) -> bool {
        matches!(
            self,
            Metric::CostOfSales
                | Metric::OperatingExpenses
                | Metric::SellingDistribution
                | Metric::Administrative
                | Metric::OtherOperating
        )
    }

    pub fn is_monetary(&self) -> bool {
        !matches!(
            self,
            Metric::GrossProfitMargin | Metric::EarningsPerShare | Metric::NetAssetPerShare
        )
    }

    /// Deterministic stand-in keyed on the fiscal start year.
    pub fn placeholder(&self, period: &FiscalPeriod) -> f64 {
        let delta = f64::from(period.start_year - 2019);
        match self {
            Metric::Revenue => 100_000_000.0 + delta * 10_000_000.0,
            Metric::CostOfSales => 75_000_000.0 + delta * 8_000_000.0,
            Metric::OperatingExpenses => 18_000_000.0 + delta * 1_500_000.0,
            Metric::GrossProfit => 25_000_000.0 + delta * 2_000_000.0,
            Metric::GrossProfitMargin => 20.0 - 0.5 * delta,
            Metric::EarningsPerShare => 7.0 + 0.5 * delta,
            Metric::NetAssetPerShare => 150.0 + 5.0 * delta,
            Metric::SellingDistribution | Metric::Administrative | Metric::OtherOperating => 0.0,
        }
    }

    /// Ordered table scans tried for this metric. Operating expenses as a
    /// whole are never read from a table; they are the sum of components.
    pub fn strategies(&self) -> Vec<TableScan> {
        match self {
            Metric::Revenue => {
                let labels: &'static [&'static [&'static str]] = &[&["total revenue"], &["revenue from contracts"]];
                vec![
                    TableScan::first_cell(INCOME_STATEMENT, labels).exact(&["revenue"]),
                    TableScan::whole_row(ALTERNATE_STATEMENTS, labels).accept(Plausibility::AboveCurrencyMin),
                    TableScan::whole_document(&[&["total revenue"]]),
                ]
            }
            Metric::CostOfSales => statement_scans(&[&["cost of sales"]], &[]),
            Metric::GrossProfit => statement_scans(&[&["gross profit"]], &["margin"]),
            Metric::SellingDistribution => component_scans(&[&["selling", "distribution"]]),
            Metric::Administrative => component_scans(&[&["administrative"]]),
            Metric::OtherOperating => component_scans(&[&["other operating expenses"]]),
            Metric::OperatingExpenses => Vec::new(),
            Metric::GrossProfitMargin => vec![TableScan::whole_row(
                &["Summary Indicators", "Income Statement"],
                &[&["gross profit margin"], &["gross margin"]],
            )
            .accept(Plausibility::Percentage)],
            Metric::EarningsPerShare => vec![
                TableScan::first_cell(INCOME_STATEMENT, &[&["earnings per share"], &["basic earnings per"]])
                    .accept(Plausibility::PerShare),
                TableScan::whole_row(
                    &["EARNINGS PER SHARE", "Basic earnings", "Diluted earnings"],
                    &[&["basic", "earnings"], &["basic", "eps"]],
                )
                .accept(Plausibility::PerShare),
                TableScan::whole_row(SUMMARY_INDICATORS, &[&["eps"], &["earnings per share"]])
                    .excluding(&["diluted"])
                    .accept(Plausibility::PerShare),
            ],
            Metric::NetAssetPerShare => {
                let labels: &'static [&'static [&'static str]] = &[&["net asset", "per share"]];
                vec![
                    TableScan::whole_row(SUMMARY_INDICATORS, labels).accept(Plausibility::Positive),
                    TableScan::whole_row(
                        &["Net assets per share", "Net asset value per share", "NAV per share"],
                        labels,
                    )
                    .accept(Plausibility::Positive),
                ]
            }
        }
    }
}

fn statement_scans(labels: &'static [&'static [&'static str]], excluded: &'static [&'static str]) -> Vec<TableScan> {
    vec![
        TableScan::first_cell(INCOME_STATEMENT, labels).excluding(excluded),
        TableScan::whole_row(ALTERNATE_STATEMENTS, labels)
            .excluding(excluded)
            .accept(Plausibility::AboveCurrencyMin),
    ]
}

fn component_scans(labels: &'static [&'static [&'static str]]) -> Vec<TableScan> {
    vec![
        TableScan::first_cell(INCOME_STATEMENT, labels),
        TableScan::whole_row(ALTERNATE_STATEMENTS, labels),
    ]
}

/// Value filter applied to candidate cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plausibility {
    NonZero,
    AboveCurrencyMin,
    PerShare,
    Percentage,
    Positive,
}

impl Plausibility {
    pub fn accepts(&self, value: f64, limits: &Thresholds) -> bool {
        match self {
            Plausibility::NonZero => value != 0.0,
            Plausibility::AboveCurrencyMin => value > limits.currency_min,
            Plausibility::PerShare => value > 0.0 && value < limits.per_share_max,
            Plausibility::Percentage => value > 0.0 && value < limits.percentage_max,
            Plausibility::Positive => value > 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelMatch {
    /// Label in the first cell; values from the table's candidate value columns.
    FirstCell,
    /// Label anywhere in the row; values from any numeric cell.
    WholeRow,
}

#[derive(Debug, Clone, Copy)]
pub enum Scope {
    Keywords(&'static [&'static str]),
    WholeDocument,
}

/// One pure resolver strategy: a keyword set, a row matcher and a value filter.
#[derive(Debug, Clone)]
pub struct TableScan {
    pub scope: Scope,
    pub label: LabelMatch,
    /// Row matches when every term of any one group is present.
    pub any_of: &'static [&'static [&'static str]],
    /// First-cell texts that match on their own ("Revenue").
    pub exact: &'static [&'static str],
    pub none_of: &'static [&'static str],
    pub plausibility: Plausibility,
}

impl TableScan {
    pub fn first_cell(keywords: &'static [&'static str], any_of: &'static [&'static [&'static str]]) -> Self {
        Self {
            scope: Scope::Keywords(keywords),
            label: LabelMatch::FirstCell,
            any_of,
            exact: &[],
            none_of: &[],
            plausibility: Plausibility::NonZero,
        }
    }

    pub fn whole_row(keywords: &'static [&'static str], any_of: &'static [&'static [&'static str]]) -> Self {
        Self {
            label: LabelMatch::WholeRow,
            ..Self::first_cell(keywords, any_of)
        }
    }

    pub fn whole_document(any_of: &'static [&'static [&'static str]]) -> Self {
        Self {
            scope: Scope::WholeDocument,
            ..Self::whole_row(&[], any_of)
        }
    }

    pub fn exact(mut self, labels: &'static [&'static str]) -> Self {
        self.exact = labels;
        self
    }

    pub fn excluding(mut self, terms: &'static [&'static str]) -> Self {
        self.none_of = terms;
        self
    }

    pub fn accept(mut self, plausibility: Plausibility) -> Self {
        self.plausibility = plausibility;
        self
    }

    /// Runs the scan over the context's tables; `magnitude` compares and
    /// returns absolute values.
    pub fn apply(&self, ctx: &ReportContext, magnitude: bool) -> Option<f64> {
        match self.scope {
            Scope::Keywords(keywords) => keywords
                .iter()
                .find_map(|kw| self.scan(&ctx.tables(kw), &ctx.period(), ctx.thresholds(), magnitude)),
            Scope::WholeDocument => self.scan(&ctx.all_tables(), &ctx.period(), ctx.thresholds(), magnitude),
        }
    }

    /// The table half of [`apply`](Self::apply), usable on any table set.
    pub fn scan(&self, tables: &[RawTable], period: &FiscalPeriod, limits: &Thresholds, magnitude: bool) -> Option<f64> {
        for table in tables {
            let value_columns: Vec<usize> = match self.label {
                LabelMatch::FirstCell => columns::candidate_value_columns(table, period),
                LabelMatch::WholeRow => (0..table.width()).collect(),
            };
            for row in 0..table.height() {
                if !self.row_matches(table, row) {
                    continue;
                }
                let hit = value_columns
                    .iter()
                    .map(|&c| table.cell(row, c))
                    .filter(|cell| numeric::is_numeric_cell(cell))
                    .filter_map(numeric::parse)
                    .map(|v| if magnitude { v.abs() } else { v })
                    .find(|&v| self.plausibility.accepts(v, limits));
                if hit.is_some() {
                    tracing::debug!("Matched row '{}' on page {}", table.cell(row, 0), table.page);
                    return hit;
                }
            }
        }
        None
    }

    fn row_matches(&self, table: &RawTable, row: usize) -> bool {
        let label = table.cell(row, 0).trim().to_lowercase();
        let text = match self.label {
            LabelMatch::FirstCell => label.clone(),
            LabelMatch::WholeRow => table.row_text(row),
        };
        if text.is_empty() || self.none_of.iter().any(|t| text.contains(t)) {
            return false;
        }
        self.exact.iter().any(|e| label == *e)
            || self
                .any_of
                .iter()
                .any(|group| group.iter().all(|term| text.contains(term)))
    }
}

/// Runs a metric's strategies in order; the first value wins.
pub fn extract(metric: Metric, ctx: &ReportContext) -> Option<f64> {
    let magnitude = metric.is_expense();
    metric.strategies().iter().enumerate().find_map(|(i, strategy)| {
        let value = strategy.apply(ctx, magnitude);
        if let Some(v) = value {
            tracing::debug!("{:?} = {} via strategy {} in {}", metric, v, i + 1, ctx.document.id);
        }
        value
    })
}

/// Resolves every scalar metric: overrides, then extraction, then
/// accounting identities over non-placeholder inputs, then placeholders.
pub fn resolve(ctx: &ReportContext, overrides: &HashMap<Metric, f64>, currency: &str) -> StatementMetrics {
    let period = ctx.period();
    let found = |metric: Metric| -> Option<MetricValue> {
        if let Some(&v) = overrides.get(&metric) {
            return Some(MetricValue::new(v, Provenance::Override));
        }
        extract(metric, ctx).map(|v| MetricValue::new(v, Provenance::Extracted))
    };

    let mut revenue = found(Metric::Revenue);
    let mut cost_of_sales = found(Metric::CostOfSales);
    let mut gross_profit = found(Metric::GrossProfit);

    let derived = |v: f64| Some(MetricValue::new(v, Provenance::Derived));
    let value_of = |m: &Option<MetricValue>| m.as_ref().filter(|m| m.source.is_evidence()).map(|m| m.value);
    match (value_of(&revenue), value_of(&cost_of_sales), value_of(&gross_profit)) {
        (Some(r), Some(c), None) => gross_profit = derived(r - c),
        (Some(r), None, Some(g)) => cost_of_sales = derived((r - g).abs()),
        (None, Some(c), Some(g)) => revenue = derived(g + c),
        _ => {}
    }

    let components = [Metric::SellingDistribution, Metric::Administrative, Metric::OtherOperating].map(found);
    let total = found(Metric::OperatingExpenses).or_else(|| {
        let present: Vec<f64> = components.iter().flatten().map(|m| m.value).collect();
        (!present.is_empty()).then(|| MetricValue::new(present.iter().sum(), Provenance::Derived))
    });

    let margin = found(Metric::GrossProfitMargin).or_else(|| match (&revenue, &gross_profit) {
        (Some(r), Some(g)) if r.value != 0.0 => {
            let margin = round2(g.value / r.value * 100.0);
            if Plausibility::Percentage.accepts(margin, ctx.thresholds()) {
                derived(margin)
            } else {
                tracing::debug!("Derived margin {} out of range in {}", margin, ctx.document.id);
                None
            }
        }
        _ => None,
    });

    let finish = |metric: Metric, value: Option<MetricValue>| -> MetricValue {
        let value = value.unwrap_or_else(|| {
            tracing::warn!("{:?} not found in {}; using placeholder", metric, ctx.document.id);
            MetricValue::new(metric.placeholder(&period), Provenance::Placeholder)
        });
        if metric.is_monetary() {
            value.with_currency(currency)
        } else {
            value
        }
    };

    let [selling, admin, other] = components;
    StatementMetrics {
        revenue: finish(Metric::Revenue, revenue),
        cost_of_sales: finish(Metric::CostOfSales, cost_of_sales),
        operating_expenses: OperatingExpenses {
            total: finish(Metric::OperatingExpenses, total),
            selling_distribution: finish_component(Metric::SellingDistribution, selling, &period, currency),
            administrative: finish_component(Metric::Administrative, admin, &period, currency),
            other_operating: finish_component(Metric::OtherOperating, other, &period, currency),
        },
        gross_profit: finish(Metric::GrossProfit, gross_profit),
        gross_profit_margin: finish(Metric::GrossProfitMargin, margin),
        earnings_per_share: finish(Metric::EarningsPerShare, found(Metric::EarningsPerShare)),
        net_asset_per_share: finish(Metric::NetAssetPerShare, found(Metric::NetAssetPerShare)),
    }
}

// Missing components are common and not worth a warning each.
fn finish_component(metric: Metric, value: Option<MetricValue>, period: &FiscalPeriod, currency: &str) -> MetricValue {
    value
        .unwrap_or_else(|| MetricValue::new(metric.placeholder(period), Provenance::Placeholder))
        .with_currency(currency)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractorConfig;
    use crate::document::{Document, Page};
    use crate::extractors::tables::{ExtractionMode, StrategyChain};

    fn table(rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            1,
            ExtractionMode::Stream,
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    fn resolve_pages(period: FiscalPeriod, pages: Vec<&str>, overrides: &HashMap<Metric, f64>) -> StatementMetrics {
        let doc = Document::new(
            "metrics",
            period,
            pages.into_iter().enumerate().map(|(i, t)| Page::new(i + 1, t)).collect(),
        );
        let config = ExtractorConfig::default();
        let chain = StrategyChain::standard();
        let ctx = ReportContext::new(&doc, &config, &chain);
        resolve(&ctx, overrides, "LKR")
    }

    #[test]
    fn first_cell_scan_skips_note_column() {
        let t = table(&[
            &["", "Note", "2020", "2019"],
            &["Revenue", "4", "120,000", "100,000"],
            &["Cost of sales", "5", "(80,000)", "(70,000)"],
        ]);
        let limits = Thresholds::default();
        let period = FiscalPeriod::starting(2019);
        let revenue = &Metric::Revenue.strategies()[0];
        assert_eq!(revenue.scan(&[t.clone()], &period, &limits, false), Some(120_000.0));
        let cost = &Metric::CostOfSales.strategies()[0];
        assert_eq!(cost.scan(&[t], &period, &limits, true), Some(80_000.0));
    }

    #[test]
    fn alternate_scan_enforces_currency_threshold() {
        let t = table(&[
            &["Gross profit", "40,000", "30,000"],
            &["Gross profit for the group", "4,500,000", "3,900,000"],
        ]);
        let scan = &Metric::GrossProfit.strategies()[1];
        let got = scan.scan(&[t], &FiscalPeriod::starting(2020), &Thresholds::default(), false);
        assert_eq!(got, Some(4_500_000.0));
    }

    #[test]
    fn eps_rejects_implausible_values() {
        let t = table(&[
            &["Basic earnings per share", "1,250.00"],
            &["Basic EPS (Rs.)", "7.25"],
        ]);
        let scan = &Metric::EarningsPerShare.strategies()[1];
        let got = scan.scan(&[t], &FiscalPeriod::starting(2020), &Thresholds::default(), false);
        assert_eq!(got, Some(7.25));
    }

    #[test]
    fn summary_eps_skips_diluted() {
        let t = table(&[&["Diluted EPS", "6.90"], &["EPS", "7.10"]]);
        let scan = &Metric::EarningsPerShare.strategies()[2];
        let got = scan.scan(&[t], &FiscalPeriod::starting(2020), &Thresholds::default(), false);
        assert_eq!(got, Some(7.10));
    }

    #[test]
    fn identities_fill_gross_profit_and_margin() {
        let metrics = resolve_pages(
            FiscalPeriod::starting(2020),
            vec!["Income Statement\nRevenue    120,000\nCost of sales    (80,000)\nAdministrative expenses    (5,000)"],
            &HashMap::new(),
        );
        assert_eq!(metrics.revenue.value, 120_000.0);
        assert_eq!(metrics.revenue.source, Provenance::Extracted);
        assert_eq!(metrics.cost_of_sales.value, 80_000.0);
        assert_eq!(metrics.gross_profit.value, 40_000.0);
        assert_eq!(metrics.gross_profit.source, Provenance::Derived);
        assert_eq!(metrics.gross_profit_margin.value, 33.33);
        assert_eq!(metrics.operating_expenses.total.value, 5_000.0);
        assert_eq!(metrics.operating_expenses.total.source, Provenance::Derived);
        assert!(metrics.operating_expenses.selling_distribution.is_placeholder());
        assert_eq!(metrics.revenue.currency.as_deref(), Some("LKR"));
        assert_eq!(metrics.earnings_per_share.currency, None);
    }

    #[test]
    fn placeholders_never_feed_identities() {
        let metrics = resolve_pages(
            FiscalPeriod::starting(2021),
            vec!["Income Statement\nRevenue    150,000\nFinance income    2,000"],
            &HashMap::new(),
        );
        assert_eq!(metrics.revenue.source, Provenance::Extracted);
        assert_eq!(metrics.cost_of_sales.value, 91_000_000.0);
        assert!(metrics.cost_of_sales.is_placeholder());
        assert_eq!(metrics.gross_profit.value, 29_000_000.0);
        assert!(metrics.gross_profit.is_placeholder());
        assert_eq!(metrics.gross_profit_margin.value, 19.0);
        assert!(metrics.gross_profit_margin.is_placeholder());
    }

    #[test]
    fn gross_loss_margin_falls_back_to_placeholder() {
        let metrics = resolve_pages(
            FiscalPeriod::starting(2020),
            vec!["Income Statement\nRevenue    100,000\nCost of sales    (120,000)"],
            &HashMap::new(),
        );
        assert_eq!(metrics.gross_profit.value, -20_000.0);
        assert_eq!(metrics.gross_profit.source, Provenance::Derived);
        assert!(metrics.gross_profit_margin.is_placeholder());
        assert_eq!(metrics.gross_profit_margin.value, 19.5);
        assert!(metrics.gross_profit_margin.value > 0.0 && metrics.gross_profit_margin.value < 100.0);
    }

    #[test]
    fn placeholders_are_deterministic() {
        let period = FiscalPeriod::starting(2022);
        let a = resolve_pages(period, vec!["nothing here"], &HashMap::new());
        let b = resolve_pages(period, vec!["nothing here"], &HashMap::new());
        assert_eq!(a, b);
        assert_eq!(a.revenue.value, 130_000_000.0);
        assert_eq!(a.operating_expenses.total.value, 22_500_000.0);
        assert_eq!(a.earnings_per_share.value, 8.5);
        assert_eq!(a.net_asset_per_share.value, 165.0);
        assert_eq!(a.gross_profit_margin.value, 18.5);
    }

    #[test]
    fn overrides_take_precedence() {
        let overrides = HashMap::from([(Metric::Revenue, 500_000.0), (Metric::EarningsPerShare, 3.2)]);
        let metrics = resolve_pages(
            FiscalPeriod::starting(2020),
            vec!["Income Statement\nRevenue    120,000\nCost of sales    (80,000)"],
            &overrides,
        );
        assert_eq!(metrics.revenue.value, 500_000.0);
        assert_eq!(metrics.revenue.source, Provenance::Override);
        assert_eq!(metrics.gross_profit.value, 420_000.0);
        assert_eq!(metrics.earnings_per_share.source, Provenance::Override);
    }

    #[test]
    fn metric_keys_deserialize_from_snake_case() {
        let parsed: HashMap<Metric, f64> =
            serde_json::from_str(r#"{"net_asset_per_share": 172.5, "cost_of_sales": 10.0}"#).unwrap();
        assert_eq!(parsed.get(&Metric::NetAssetPerShare), Some(&172.5));
    }
}
