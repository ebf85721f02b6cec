// src/lib.rs
//! Financial figures, rights issues and top shareholders pulled from a
//! series of annual reports and merged into one year-indexed dataset.

pub mod cache;
pub mod config;
pub mod consolidate;
pub mod document;
pub mod extractors;
pub mod fiscal;
pub mod storage;
pub mod utils;

pub use cache::{ConsolidatedFileSource, DatasetCache, DatasetSource, DocumentDirSource};
pub use config::{ExtractorConfig, Thresholds};
pub use consolidate::{ConsolidatedDataset, Consolidator, EventCalendar};
pub use extractors::{ExtractionRecord, OverrideTable, ReportExtractor};
pub use fiscal::FiscalPeriod;
pub use utils::AppError;
