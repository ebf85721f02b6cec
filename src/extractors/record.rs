// src/extractors/record.rs
//! Per-document extraction output.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::fiscal::FiscalPeriod;

/// How a value was obtained, in decreasing order of trust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Override,
    Extracted,
    Derived,
    Placeholder,
}

impl Provenance {
    /// Placeholders must never feed an accounting-identity derivation.
    pub fn is_evidence(&self) -> bool {
        !matches!(self, Provenance::Placeholder)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub value: f64,
    pub source: Provenance,
    /// Set on monetary metrics only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl MetricValue {
    pub fn new(value: f64, source: Provenance) -> Self {
        Self {
            value,
            source,
            currency: None,
        }
    }

    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = Some(currency.to_string());
        self
    }

    pub fn is_placeholder(&self) -> bool {
        self.source == Provenance::Placeholder
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatingExpenses {
    pub total: MetricValue,
    pub selling_distribution: MetricValue,
    pub administrative: MetricValue,
    pub other_operating: MetricValue,
}

/// Scalar statement metrics of one reporting period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementMetrics {
    pub revenue: MetricValue,
    pub cost_of_sales: MetricValue,
    pub operating_expenses: OperatingExpenses,
    pub gross_profit: MetricValue,
    pub gross_profit_margin: MetricValue,
    pub earnings_per_share: MetricValue,
    pub net_asset_per_share: MetricValue,
}

/// Rights issue details. Absent attributes are written as `"N/A"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RightsIssue {
    #[serde(with = "na_text", default)]
    pub ratio: Option<String>,
    #[serde(with = "na_number", default)]
    pub issue_price: Option<f64>,
    #[serde(with = "na_text", default)]
    pub date: Option<String>,
}

impl RightsIssue {
    pub fn is_empty(&self) -> bool {
        self.ratio.is_none() && self.issue_price.is_none() && self.date.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shareholder {
    pub name: String,
    pub percentage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shares: Option<f64>,
}

impl Shareholder {
    pub fn new(name: impl Into<String>, percentage: f64, shares: Option<f64>) -> Self {
        Self {
            name: name.into(),
            percentage,
            shares,
        }
    }
}

/// Everything recovered from one annual report. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub document_id: String,
    pub period: FiscalPeriod,
    #[serde(flatten)]
    pub metrics: StatementMetrics,
    pub right_issue: RightsIssue,
    pub top_shareholders: Vec<Shareholder>,
    pub shareholders_source: Provenance,
}

const NOT_AVAILABLE: &str = "N/A";

mod na_text {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value.as_deref().unwrap_or(NOT_AVAILABLE))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.filter(|s| s != NOT_AVAILABLE && !s.trim().is_empty()))
    }
}

mod na_number {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_f64(*v),
            None => serializer.serialize_str(NOT_AVAILABLE),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        Ok(match Option::<NumberOrText>::deserialize(deserializer)? {
            Some(NumberOrText::Number(v)) => Some(v),
            Some(NumberOrText::Text(s)) => s.trim().parse().ok(),
            None => None,
        })
    }
}
