// src/main.rs
use std::path::PathBuf;

use clap::Parser;

use annual_report_extractor::cache::{ConsolidatedFileSource, DatasetCache};
use annual_report_extractor::config::ExtractorConfig;
use annual_report_extractor::consolidate::EventCalendar;
use annual_report_extractor::extractors::{collect_inputs, OverrideTable, ReportExtractor};
use annual_report_extractor::storage::StorageManager;
use annual_report_extractor::utils::{self, AppError};

/// Command Line Interface for the annual report extractor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Annual report file, or a directory of reports (.pdf, .txt, .html)
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for records and the consolidated dataset
    #[arg(short, long, default_value = "./output")]
    output_dir: PathBuf,

    /// JSON config file (thresholds, default currency, industry groups)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON override table; replaces the bundled one
    #[arg(long)]
    overrides: Option<PathBuf>,

    /// Currency code used when a report carries no currency marker
    #[arg(long)]
    currency: Option<String>,

    /// JSON event calendar keyed by year; replaces the bundled one
    #[arg(long)]
    events: Option<PathBuf>,

    /// Debug mode - save annotated HTML of the located pages
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<(), AppError> {
    // 1. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging();

    // 2. Parse CLI Arguments
    let args = Args::parse();
    tracing::info!("Starting processing for args: {:?}", args);

    let mut config = match &args.config {
        Some(path) => ExtractorConfig::from_file(path)?,
        None => ExtractorConfig::default(),
    };
    if let Some(currency) = &args.currency {
        config.default_currency = currency.to_uppercase();
    }

    let overrides = match &args.overrides {
        Some(path) => OverrideTable::from_file(path)?,
        None => OverrideTable::bundled()?,
    };
    tracing::info!("Loaded {} override entries", overrides.len());

    // 3. Initialize storage
    let storage = StorageManager::new(&args.output_dir)?;
    tracing::info!("Writing output to {}", storage.base_dir().display());

    // 4. Extract every report
    let inputs = collect_inputs(&args.input)?;
    if inputs.is_empty() {
        return Err(AppError::Config(format!(
            "No supported reports found in {}",
            args.input.display()
        )));
    }
    tracing::info!("Found {} report(s)", inputs.len());

    let mut extractor = ReportExtractor::new(config.clone(), overrides);
    if args.debug {
        extractor = extractor.with_debug_dir(args.output_dir.join("debug"));
    }
    let records = extractor.extract_batch(&inputs);
    if records.is_empty() {
        return Err(AppError::Processing(format!(
            "Failed to extract any of {} reports",
            inputs.len()
        )));
    }

    let mut failure_count = 0;
    for record in &records {
        if let Err(e) = storage.save_record(record) {
            tracing::error!("Failed to save record for {}: {}", record.document_id, e);
            failure_count += 1;
        }
        if let Err(e) = storage.save_csv(record, &extractor.config().default_currency) {
            tracing::error!("Failed to save CSV files for {}: {}", record.document_id, e);
            failure_count += 1;
        }
    }

    // 5. Persist the consolidated form, then serve the dataset from it
    let consolidated = storage.save_consolidated(&records, &config.default_currency)?;
    let events = match &args.events {
        Some(path) => EventCalendar::from_file(path)?,
        None => EventCalendar::bundled()?,
    };
    let cache = DatasetCache::new(Box::new(ConsolidatedFileSource::new(consolidated)), config, events);
    let dataset = cache.dataset()?;
    storage.save_dataset(&dataset)?;

    tracing::info!(
        "Processing finished. Records: {}, Display years: {:?}, Save failures: {}",
        records.len(),
        dataset.years(),
        failure_count
    );
    Ok(())
}
