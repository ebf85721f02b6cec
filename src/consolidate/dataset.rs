// src/consolidate/dataset.rs
//! Year-indexed dataset served to consumers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::ExtractorConfig;
use crate::consolidate::events::{Event, EventCalendar};
use crate::consolidate::format;
use crate::extractors::record::{ExtractionRecord, MetricValue, Shareholder};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Financials {
    pub revenue: f64,
    pub revenue_formatted: String,
    pub cost_of_sales: f64,
    pub cost_of_sales_formatted: String,
    pub operating_expenses: f64,
    pub operating_expenses_formatted: String,
    pub gross_profit: f64,
    pub gross_profit_formatted: String,
    pub gross_profit_margin: f64,
    pub gross_profit_margin_formatted: String,
    pub eps: f64,
    pub eps_formatted: String,
    pub net_asset_per_share: f64,
    pub net_asset_per_share_formatted: String,
    pub outstanding_shares: f64,
    pub net_profit: f64,
    pub net_profit_formatted: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayYearEntry {
    pub year: i32,
    pub financials: Financials,
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RightsIssueEntry {
    pub year: i32,
    pub ratio: String,
    pub issue_price: Option<f64>,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedDataset {
    pub industry_groups: Vec<String>,
    pub yearly_data: Vec<DisplayYearEntry>,
    pub right_issues: Vec<RightsIssueEntry>,
    pub top_shareholders: BTreeMap<i32, Vec<Shareholder>>,
}

impl ConsolidatedDataset {
    pub fn year(&self, year: i32) -> Option<&DisplayYearEntry> {
        self.yearly_data.iter().find(|e| e.year == year)
    }

    pub fn years(&self) -> Vec<i32> {
        self.yearly_data.iter().map(|e| e.year).collect()
    }
}

/// Merges per-document records into one dataset keyed by calendar year.
pub struct Consolidator<'a> {
    config: &'a ExtractorConfig,
    events: &'a EventCalendar,
}

impl<'a> Consolidator<'a> {
    pub fn new(config: &'a ExtractorConfig, events: &'a EventCalendar) -> Self {
        Self { config, events }
    }

    /// Records are taken in fiscal-period order. For every calendar year the
    /// first record that covers it supplies the financials, the last one the
    /// shareholder list.
    pub fn merge(&self, records: &[ExtractionRecord]) -> ConsolidatedDataset {
        let mut ordered: Vec<&ExtractionRecord> = records.iter().collect();
        ordered.sort_by_key(|r| r.period);

        let mut dataset = ConsolidatedDataset {
            industry_groups: self.config.industry_groups.clone(),
            ..Default::default()
        };

        for record in ordered {
            for year in record.period.display_years() {
                if let Some(ratio) = &record.right_issue.ratio {
                    let duplicate = dataset
                        .right_issues
                        .iter()
                        .any(|r| r.year == year && &r.ratio == ratio);
                    if !duplicate {
                        dataset.right_issues.push(RightsIssueEntry {
                            year,
                            ratio: ratio.clone(),
                            issue_price: record.right_issue.issue_price,
                            description: "Rights issue".to_string(),
                        });
                    }
                }

                // The latest period covering a year supplies its holder list
                dataset.top_shareholders.insert(year, record.top_shareholders.clone());

                if dataset.yearly_data.iter().any(|e| e.year == year) {
                    tracing::debug!("Year {} already covered; skipping {}", year, record.document_id);
                    continue;
                }
                dataset.yearly_data.push(DisplayYearEntry {
                    year,
                    financials: self.financials(record),
                    events: self.events.events_for(year),
                });
            }
        }

        dataset.yearly_data.sort_by_key(|e| e.year);
        tracing::info!(
            "Consolidated {} records into {} display years",
            records.len(),
            dataset.yearly_data.len()
        );
        dataset
    }

    fn financials(&self, record: &ExtractionRecord) -> Financials {
        let m = &record.metrics;
        let money = |v: &MetricValue| {
            let code = v.currency.as_deref().unwrap_or(self.config.default_currency.as_str());
            format::currency(v.value, code)
        };
        let outstanding_shares = estimate_outstanding_shares(
            &record.top_shareholders,
            self.config.default_outstanding_shares,
        );
        let net_profit = m.earnings_per_share.value * outstanding_shares;
        let profit_currency = m.revenue.currency.as_deref().unwrap_or(self.config.default_currency.as_str());

        Financials {
            revenue: m.revenue.value,
            revenue_formatted: money(&m.revenue),
            cost_of_sales: m.cost_of_sales.value,
            cost_of_sales_formatted: money(&m.cost_of_sales),
            operating_expenses: m.operating_expenses.total.value,
            operating_expenses_formatted: money(&m.operating_expenses.total),
            gross_profit: m.gross_profit.value,
            gross_profit_formatted: money(&m.gross_profit),
            gross_profit_margin: m.gross_profit_margin.value,
            gross_profit_margin_formatted: format::percentage(m.gross_profit_margin.value),
            eps: m.earnings_per_share.value,
            eps_formatted: format::per_share(m.earnings_per_share.value),
            net_asset_per_share: m.net_asset_per_share.value,
            net_asset_per_share_formatted: format::per_share(m.net_asset_per_share.value),
            outstanding_shares,
            net_profit,
            net_profit_formatted: format::currency(net_profit, profit_currency),
        }
    }
}

/// Total shares implied by the first holder with both a share count and a
/// percentage, else `default`.
pub fn estimate_outstanding_shares(holders: &[Shareholder], default: f64) -> f64 {
    holders
        .iter()
        .find_map(|h| match h.shares {
            Some(shares) if shares > 0.0 && h.percentage > 0.0 => Some(shares / h.percentage * 100.0),
            _ => None,
        })
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::record::{
        OperatingExpenses, Provenance, RightsIssue, StatementMetrics,
    };
    use crate::fiscal::FiscalPeriod;
    use pretty_assertions::assert_eq;

    fn value(v: f64) -> MetricValue {
        MetricValue::new(v, Provenance::Extracted)
    }

    fn record(id: &str, start: i32, revenue: f64, ratio: Option<&str>, holders: Vec<Shareholder>) -> ExtractionRecord {
        ExtractionRecord {
            document_id: id.to_string(),
            period: FiscalPeriod::starting(start),
            metrics: StatementMetrics {
                revenue: value(revenue).with_currency("LKR"),
                cost_of_sales: value(revenue * 0.7),
                operating_expenses: OperatingExpenses {
                    total: value(1_000.0),
                    selling_distribution: value(500.0),
                    administrative: value(500.0),
                    other_operating: value(0.0),
                },
                gross_profit: value(revenue * 0.3),
                gross_profit_margin: value(30.0),
                earnings_per_share: value(2.0),
                net_asset_per_share: value(150.0),
            },
            right_issue: RightsIssue {
                ratio: ratio.map(str::to_string),
                issue_price: ratio.map(|_| 12.5),
                date: None,
            },
            top_shareholders: holders,
            shareholders_source: Provenance::Extracted,
        }
    }

    #[test]
    fn first_writer_wins_per_year() {
        let config = ExtractorConfig::default();
        let events = EventCalendar::bundled().unwrap();
        let later = record("b", 2020, 120_000_000.0, None, vec![]);
        let earlier = record("a", 2019, 100_000_000.0, None, vec![]);
        let dataset = Consolidator::new(&config, &events).merge(&[later, earlier]);

        assert_eq!(dataset.years(), vec![2019, 2020, 2021]);
        assert_eq!(dataset.year(2020).unwrap().financials.revenue, 100_000_000.0);
        assert_eq!(dataset.year(2021).unwrap().financials.revenue, 120_000_000.0);
        assert_eq!(dataset.year(2019).unwrap().financials.revenue_formatted, "LKR 100.00 Mn");
        assert_eq!(dataset.year(2020).unwrap().events.len(), 2);
        assert_eq!(dataset.industry_groups.len(), 6);
    }

    #[test]
    fn later_period_supplies_shared_year_holders() {
        let config = ExtractorConfig::default();
        let events = EventCalendar::default();
        let old = vec![Shareholder::new("Old Holder", 9.0, None)];
        let new = vec![Shareholder::new("New Holder", 8.0, None)];
        let dataset = Consolidator::new(&config, &events).merge(&[
            record("b", 2020, 2.0, None, new),
            record("a", 2019, 1.0, None, old),
        ]);
        assert_eq!(dataset.top_shareholders[&2019][0].name, "Old Holder");
        assert_eq!(dataset.top_shareholders[&2020][0].name, "New Holder");
        assert_eq!(dataset.top_shareholders[&2021][0].name, "New Holder");
        assert_eq!(dataset.year(2020).unwrap().financials.revenue, 1.0);
    }

    #[test]
    fn rights_issues_deduplicated_by_year_and_ratio() {
        let config = ExtractorConfig::default();
        let events = EventCalendar::default();
        let dataset = Consolidator::new(&config, &events).merge(&[
            record("a", 2019, 1.0, Some("1:5"), vec![]),
            record("b", 2020, 1.0, Some("1:5"), vec![]),
            record("c", 2021, 1.0, None, vec![]),
        ]);
        let years: Vec<i32> = dataset.right_issues.iter().map(|r| r.year).collect();
        assert_eq!(years, vec![2019, 2020, 2021]);
        assert_eq!(dataset.right_issues[0].issue_price, Some(12.5));
    }

    #[test]
    fn outstanding_shares_and_net_profit() {
        let holders = vec![
            Shareholder::new("No count", 12.0, None),
            Shareholder::new("Melstacorp PLC", 10.0, Some(130_000_000.0)),
        ];
        assert_eq!(estimate_outstanding_shares(&holders, 1.0), 1_300_000_000.0);
        assert_eq!(estimate_outstanding_shares(&[], 1_385_000_000.0), 1_385_000_000.0);

        let config = ExtractorConfig::default();
        let events = EventCalendar::default();
        let dataset = Consolidator::new(&config, &events).merge(&[record("a", 2022, 1.0, None, holders)]);
        let fin = &dataset.year(2022).unwrap().financials;
        assert_eq!(fin.outstanding_shares, 1_300_000_000.0);
        assert_eq!(fin.net_profit, 2_600_000_000.0);
        assert_eq!(fin.net_profit_formatted, "LKR 2600.00 Mn");
        assert_eq!(dataset.top_shareholders[&2022][0].name, "No count");
        assert_eq!(dataset.top_shareholders[&2023][0].name, "No count");
    }

    #[test]
    fn api_shape_is_camel_case() {
        let config = ExtractorConfig::default();
        let events = EventCalendar::default();
        let dataset = Consolidator::new(&config, &events).merge(&[record("a", 2019, 1.0, Some("1:5"), vec![])]);
        let json = serde_json::to_value(&dataset).unwrap();
        assert!(json["yearlyData"][0]["financials"]["grossProfitMarginFormatted"].is_string());
        assert_eq!(json["rightIssues"][0]["issuePrice"], 12.5);
        assert!(json["topShareholders"]["2019"].is_array());
        assert!(json.get("industryGroups").is_some());
    }
}
