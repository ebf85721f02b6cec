// src/consolidate/mod.rs
pub mod dataset;
pub mod events;
pub mod format;

pub use dataset::{ConsolidatedDataset, Consolidator, DisplayYearEntry, Financials, RightsIssueEntry};
pub use events::{Event, EventCalendar};
