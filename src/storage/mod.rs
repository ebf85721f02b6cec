// src/storage/mod.rs
pub mod csv_export;
pub mod persisted;

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::consolidate::ConsolidatedDataset;
use crate::extractors::record::ExtractionRecord;
use crate::utils::error::StorageError;

pub use persisted::{PeriodMetrics, PersistedReport};

pub const CONSOLIDATED_FILE: &str = "consolidated_financial_data.json";
pub const DATASET_FILE: &str = "dataset.json";

pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    /// Creates a new StorageManager with the specified base directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(StorageError::IoError)?;
        }
        Ok(Self { base_dir: base_path })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Writes `<base>/<period>/<period>_record.json` with an extraction timestamp.
    pub fn save_record(&self, record: &ExtractionRecord) -> Result<PathBuf, StorageError> {
        let token = record.period.token();
        let target_dir = self.base_dir.join(&token);
        if !target_dir.exists() {
            fs::create_dir_all(&target_dir).map_err(StorageError::IoError)?;
        }

        let file_path = target_dir.join(format!("{}_record.json", token));
        let mut body = serde_json::to_value(record).map_err(|e| StorageError::SerializationError(e.to_string()))?;
        if let Some(map) = body.as_object_mut() {
            map.insert(
                "extraction_timestamp".to_string(),
                serde_json::json!(chrono::Utc::now().to_rfc3339()),
            );
        }
        write_pretty(&file_path, &body)?;

        tracing::info!("Saved record to {}", file_path.display());
        Ok(file_path)
    }

    /// Writes the persisted consolidated form of all records.
    pub fn save_consolidated(
        &self,
        records: &[ExtractionRecord],
        default_currency: &str,
    ) -> Result<PathBuf, StorageError> {
        let report = PersistedReport::from_records(records, default_currency);
        let file_path = self.base_dir.join(CONSOLIDATED_FILE);
        write_pretty(&file_path, &report)?;
        tracing::info!(
            "Saved consolidated data for {} period(s) to {}",
            report.metadata.total_years,
            file_path.display()
        );
        Ok(file_path)
    }

    pub fn save_dataset(&self, dataset: &ConsolidatedDataset) -> Result<PathBuf, StorageError> {
        let file_path = self.base_dir.join(DATASET_FILE);
        write_pretty(&file_path, dataset)?;
        tracing::info!("Saved dataset ({} years) to {}", dataset.yearly_data.len(), file_path.display());
        Ok(file_path)
    }

    /// Writes `financial_metrics_<period>.csv`, `top_shareholders_<period>.csv`
    /// and `rights_issues_<period>.csv` into the base directory.
    pub fn save_csv(&self, record: &ExtractionRecord, default_currency: &str) -> Result<Vec<PathBuf>, StorageError> {
        let paths = csv_export::write_record(&self.base_dir, record, default_currency)?;
        tracing::info!("Saved {} CSV files for {}", paths.len(), record.period);
        Ok(paths)
    }

    /// Every period with a metrics CSV in the base directory.
    pub fn load_csv(&self) -> Result<Vec<ExtractionRecord>, StorageError> {
        load_csv_dir(&self.base_dir)
    }

    /// Reads the persisted consolidated form back into records.
    pub fn load_consolidated(&self) -> Result<Vec<ExtractionRecord>, StorageError> {
        load_consolidated_file(&self.base_dir.join(CONSOLIDATED_FILE))
    }
}

pub fn load_consolidated_file(path: &Path) -> Result<Vec<ExtractionRecord>, StorageError> {
    if !path.exists() {
        return Err(StorageError::NotFound(path.display().to_string()));
    }
    let raw = fs::read_to_string(path)?;
    let report: PersistedReport =
        serde_json::from_str(&raw).map_err(|e| StorageError::SerializationError(e.to_string()))?;
    report.to_records()
}

pub fn load_csv_dir(dir: &Path) -> Result<Vec<ExtractionRecord>, StorageError> {
    csv_export::periods_in(dir)?
        .into_iter()
        .map(|period| csv_export::read_record(dir, period))
        .collect()
}

fn write_pretty<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let body = serde_json::to_string_pretty(value).map_err(|e| StorageError::SerializationError(e.to_string()))?;
    fs::write(path, body).map_err(StorageError::IoError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::record::{MetricValue, OperatingExpenses, Provenance, RightsIssue, StatementMetrics};
    use crate::fiscal::FiscalPeriod;

    fn record(start: i32) -> ExtractionRecord {
        let v = |x: f64| MetricValue::new(x, Provenance::Placeholder).with_currency("LKR");
        ExtractionRecord {
            document_id: format!("report_{}", start),
            period: FiscalPeriod::starting(start),
            metrics: StatementMetrics {
                revenue: v(1.0),
                cost_of_sales: v(1.0),
                operating_expenses: OperatingExpenses {
                    total: v(1.0),
                    selling_distribution: v(0.0),
                    administrative: v(0.0),
                    other_operating: v(0.0),
                },
                gross_profit: v(1.0),
                gross_profit_margin: MetricValue::new(20.0, Provenance::Placeholder),
                earnings_per_share: MetricValue::new(7.0, Provenance::Placeholder),
                net_asset_per_share: MetricValue::new(150.0, Provenance::Placeholder),
            },
            right_issue: RightsIssue::default(),
            top_shareholders: Vec::new(),
            shareholders_source: Provenance::Placeholder,
        }
    }

    #[test]
    fn record_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path().join("out")).unwrap();
        let path = storage.save_record(&record(2019)).unwrap();
        assert_eq!(path, dir.path().join("out/2019-2020/2019-2020_record.json"));
        let body: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(body["period"], "2019-2020");
        assert!(body["extraction_timestamp"].is_string());
        assert_eq!(body["revenue"]["source"], "placeholder");
    }

    #[test]
    fn consolidated_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();
        storage.save_consolidated(&[record(2020), record(2019)], "LKR").unwrap();
        let loaded = storage.load_consolidated().unwrap();
        assert_eq!(loaded, vec![record(2019), record(2020)]);
    }

    #[test]
    fn csv_files_load_back_in_period_order() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();
        storage.save_csv(&record(2020), "LKR").unwrap();
        storage.save_csv(&record(2019), "LKR").unwrap();
        let loaded = storage.load_csv().unwrap();
        let periods: Vec<String> = loaded.iter().map(|r| r.period.token()).collect();
        assert_eq!(periods, vec!["2019-2020", "2020-2021"]);
        assert_eq!(loaded[0].metrics.revenue, record(2019).metrics.revenue);
        assert_eq!(storage.base_dir(), dir.path());
    }

    #[test]
    fn missing_consolidated_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();
        assert!(matches!(storage.load_consolidated(), Err(StorageError::NotFound(_))));
    }
}
