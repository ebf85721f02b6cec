// src/extractors/mod.rs
pub mod columns;
pub mod context;
pub mod locator;
pub mod metrics;
pub mod numeric;
pub mod overrides;
pub mod pipeline;
pub mod record;
pub mod rights;
pub mod shareholders;
pub mod tables;

// Re-export key extraction types for convenience
pub use context::ReportContext;
pub use locator::{PageLocator, TopicCategory};
pub use metrics::Metric;
pub use overrides::{OverrideEntry, OverrideTable};
pub use pipeline::{collect_inputs, ReportExtractor};
pub use record::{
    ExtractionRecord, MetricValue, OperatingExpenses, Provenance, RightsIssue, Shareholder,
    StatementMetrics,
};
pub use tables::{ExtractionMode, ExtractionParams, RawTable, StrategyChain, TableBackend, TextLayoutBackend};
