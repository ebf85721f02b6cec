// src/storage/persisted.rs
//! On-disk consolidated form: one metrics block per fiscal period.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::consolidate::format;
use crate::extractors::record::{
    ExtractionRecord, MetricValue, OperatingExpenses, Provenance, RightsIssue, Shareholder, StatementMetrics,
};
use crate::fiscal::FiscalPeriod;
use crate::utils::error::StorageError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub generated_at: String,
    pub total_years: usize,
    pub years_covered: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedReport {
    pub metadata: ReportMetadata,
    pub financial_data: BTreeMap<String, PeriodMetrics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedMetric {
    pub value: f64,
    pub formatted: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default = "default_source")]
    pub source: Provenance,
}

fn default_source() -> Provenance {
    Provenance::Extracted
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedHolder {
    pub percentage: f64,
    pub percentage_formatted: String,
    pub shares: Option<f64>,
    pub shares_formatted: String,
}

/// Holders keyed by name, kept in rank order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HolderMap(pub Vec<(String, PersistedHolder)>);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    pub total_revenue: PersistedMetric,
    pub cost_of_sales: PersistedMetric,
    pub operating_expenses: PersistedMetric,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selling_distribution_expenses: Option<PersistedMetric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub administrative_expenses: Option<PersistedMetric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_operating_expenses: Option<PersistedMetric>,
    pub gross_profit: PersistedMetric,
    pub gross_profit_margin: PersistedMetric,
    pub earnings_per_share: PersistedMetric,
    pub net_asset_per_share: PersistedMetric,
    #[serde(default)]
    pub right_issues: RightsIssue,
    #[serde(default)]
    pub top_shareholders: HolderMap,
    #[serde(default = "default_source")]
    pub top_shareholders_source: Provenance,
}

impl PersistedMetric {
    fn money(v: &MetricValue, default_currency: &str) -> Self {
        let code = v.currency.clone().unwrap_or_else(|| default_currency.to_string());
        Self {
            value: v.value,
            formatted: format::currency(v.value, &code),
            currency: Some(code),
            source: v.source,
        }
    }

    fn plain(v: &MetricValue, formatted: String) -> Self {
        Self {
            value: v.value,
            formatted,
            currency: None,
            source: v.source,
        }
    }

    fn to_value(&self) -> MetricValue {
        MetricValue {
            value: self.value,
            source: self.source,
            currency: self.currency.clone(),
        }
    }
}

impl PeriodMetrics {
    pub fn from_record(record: &ExtractionRecord, default_currency: &str) -> Self {
        let m = &record.metrics;
        let money = |v: &MetricValue| PersistedMetric::money(v, default_currency);
        let holders = record
            .top_shareholders
            .iter()
            .map(|h| {
                (
                    h.name.clone(),
                    PersistedHolder {
                        percentage: h.percentage,
                        percentage_formatted: format::percentage(h.percentage),
                        shares: h.shares,
                        shares_formatted: h.shares.map(format::share_count).unwrap_or_else(|| "N/A".to_string()),
                    },
                )
            })
            .collect();

        Self {
            document_id: Some(record.document_id.clone()),
            total_revenue: money(&m.revenue),
            cost_of_sales: money(&m.cost_of_sales),
            operating_expenses: money(&m.operating_expenses.total),
            selling_distribution_expenses: Some(money(&m.operating_expenses.selling_distribution)),
            administrative_expenses: Some(money(&m.operating_expenses.administrative)),
            other_operating_expenses: Some(money(&m.operating_expenses.other_operating)),
            gross_profit: money(&m.gross_profit),
            gross_profit_margin: PersistedMetric::plain(
                &m.gross_profit_margin,
                format::percentage(m.gross_profit_margin.value),
            ),
            earnings_per_share: PersistedMetric::plain(
                &m.earnings_per_share,
                format::per_share(m.earnings_per_share.value),
            ),
            net_asset_per_share: PersistedMetric::plain(
                &m.net_asset_per_share,
                format::per_share(m.net_asset_per_share.value),
            ),
            right_issues: record.right_issue.clone(),
            top_shareholders: HolderMap(holders),
            top_shareholders_source: record.shareholders_source,
        }
    }

    /// Rebuilds a record. Files written without expense components get
    /// zero-valued placeholder components.
    pub fn to_record(&self, period: FiscalPeriod) -> ExtractionRecord {
        let component = |c: &Option<PersistedMetric>| {
            c.as_ref()
                .map(PersistedMetric::to_value)
                .unwrap_or_else(|| MetricValue::new(0.0, Provenance::Placeholder))
        };
        let mut holders: Vec<Shareholder> = self
            .top_shareholders
            .0
            .iter()
            .map(|(name, h)| Shareholder::new(name.clone(), h.percentage, h.shares))
            .collect();
        holders.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));

        ExtractionRecord {
            document_id: self
                .document_id
                .clone()
                .unwrap_or_else(|| format!("consolidated_{}", period.token())),
            period,
            metrics: StatementMetrics {
                revenue: self.total_revenue.to_value(),
                cost_of_sales: self.cost_of_sales.to_value(),
                operating_expenses: OperatingExpenses {
                    total: self.operating_expenses.to_value(),
                    selling_distribution: component(&self.selling_distribution_expenses),
                    administrative: component(&self.administrative_expenses),
                    other_operating: component(&self.other_operating_expenses),
                },
                gross_profit: self.gross_profit.to_value(),
                gross_profit_margin: self.gross_profit_margin.to_value(),
                earnings_per_share: self.earnings_per_share.to_value(),
                net_asset_per_share: self.net_asset_per_share.to_value(),
            },
            right_issue: self.right_issues.clone(),
            top_shareholders: holders,
            shareholders_source: self.top_shareholders_source,
        }
    }
}

impl PersistedReport {
    /// One block per record, keyed by period token. A later record for an
    /// already-present period is dropped.
    pub fn from_records(records: &[ExtractionRecord], default_currency: &str) -> Self {
        let mut financial_data = BTreeMap::new();
        for record in records {
            financial_data
                .entry(record.period.token())
                .or_insert_with(|| PeriodMetrics::from_record(record, default_currency));
        }
        Self {
            metadata: ReportMetadata {
                generated_at: chrono::Utc::now().to_rfc3339(),
                total_years: financial_data.len(),
                years_covered: financial_data.keys().cloned().collect(),
            },
            financial_data,
        }
    }

    pub fn to_records(&self) -> Result<Vec<ExtractionRecord>, StorageError> {
        self.financial_data
            .iter()
            .map(|(token, metrics)| {
                let period: FiscalPeriod = token
                    .parse()
                    .map_err(|e| StorageError::SerializationError(format!("{}", e)))?;
                Ok(metrics.to_record(period))
            })
            .collect()
    }
}

impl Serialize for HolderMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, holder) in &self.0 {
            map.serialize_entry(name, holder)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for HolderMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HolderMapVisitor;

        impl<'de> Visitor<'de> for HolderMapVisitor {
            type Value = HolderMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of shareholder name to holding")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<HolderMap, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, holder)) = access.next_entry::<String, PersistedHolder>()? {
                    entries.push((name, holder));
                }
                Ok(HolderMap(entries))
            }
        }

        deserializer.deserialize_map(HolderMapVisitor)
    }
}
