// src/cache.rs
//! Lazily built, explicitly invalidated consolidated dataset.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::config::ExtractorConfig;
use crate::consolidate::{ConsolidatedDataset, Consolidator, EventCalendar};
use crate::extractors::pipeline::{collect_inputs, ReportExtractor};
use crate::extractors::record::ExtractionRecord;
use crate::storage;
use crate::utils::error::AppError;

/// Where the cache gets its records from.
pub trait DatasetSource: Send + Sync {
    fn describe(&self) -> String;

    fn load_records(&self) -> Result<Vec<ExtractionRecord>, AppError>;
}

/// A previously written `consolidated_financial_data.json`.
pub struct ConsolidatedFileSource {
    path: PathBuf,
}

impl ConsolidatedFileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl DatasetSource for ConsolidatedFileSource {
    fn describe(&self) -> String {
        format!("consolidated file {}", self.path.display())
    }

    fn load_records(&self) -> Result<Vec<ExtractionRecord>, AppError> {
        Ok(storage::load_consolidated_file(&self.path)?)
    }
}

/// A directory of per-period CSV exports.
pub struct CsvDirSource {
    dir: PathBuf,
}

impl CsvDirSource {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

impl DatasetSource for CsvDirSource {
    fn describe(&self) -> String {
        format!("CSV directory {}", self.dir.display())
    }

    fn load_records(&self) -> Result<Vec<ExtractionRecord>, AppError> {
        Ok(storage::load_csv_dir(&self.dir)?)
    }
}

/// A directory of reports run through the extraction pipeline on demand.
pub struct DocumentDirSource {
    dir: PathBuf,
    extractor: ReportExtractor,
}

impl DocumentDirSource {
    pub fn new<P: AsRef<Path>>(dir: P, extractor: ReportExtractor) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            extractor,
        }
    }
}

impl DatasetSource for DocumentDirSource {
    fn describe(&self) -> String {
        format!("document directory {}", self.dir.display())
    }

    fn load_records(&self) -> Result<Vec<ExtractionRecord>, AppError> {
        let inputs = collect_inputs(&self.dir)?;
        Ok(self.extractor.extract_batch(&inputs))
    }
}

struct Snapshot {
    records: Arc<Vec<ExtractionRecord>>,
    dataset: Arc<ConsolidatedDataset>,
}

/// Holds the merged dataset until `invalidate` is called.
///
/// The lock only guards reading and swapping the built snapshot. Two readers
/// that miss at the same time both build; the later store wins and both
/// results are identical.
pub struct DatasetCache {
    source: Box<dyn DatasetSource>,
    config: ExtractorConfig,
    events: EventCalendar,
    state: RwLock<Option<Arc<Snapshot>>>,
}

impl DatasetCache {
    pub fn new(source: Box<dyn DatasetSource>, config: ExtractorConfig, events: EventCalendar) -> Self {
        Self {
            source,
            config,
            events,
            state: RwLock::new(None),
        }
    }

    pub fn dataset(&self) -> Result<Arc<ConsolidatedDataset>, AppError> {
        Ok(self.snapshot()?.dataset.clone())
    }

    /// The per-document records the dataset was merged from.
    pub fn raw(&self) -> Result<Arc<Vec<ExtractionRecord>>, AppError> {
        Ok(self.snapshot()?.records.clone())
    }

    pub fn invalidate(&self) {
        let mut state = self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if state.take().is_some() {
            tracing::info!("Dataset cache invalidated ({})", self.source.describe());
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }

    fn snapshot(&self) -> Result<Arc<Snapshot>, AppError> {
        if let Some(snapshot) = self
            .state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
        {
            return Ok(snapshot.clone());
        }

        tracing::info!("Building dataset from {}", self.source.describe());
        let records = self.source.load_records()?;
        let dataset = Consolidator::new(&self.config, &self.events).merge(&records);
        let snapshot = Arc::new(Snapshot {
            records: Arc::new(records),
            dataset: Arc::new(dataset),
        });

        let mut state = self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *state = Some(snapshot.clone());
        Ok(snapshot)
    }
}
