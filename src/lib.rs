//! # Financial Statement Analyzer
//!
//! A library for turning uploaded spreadsheet tables (income statements, balance sheets,
//! trial balances) into canonical period records and deriving analytics from them.
//!
//! ## Core Concepts
//!
//! - **Raw Table**: Columns and rows of cells exactly as they came out of a spreadsheet
//! - **Layout**: `Wide` tables carry one column per period; `Long` tables carry one row per value
//! - **Canonical Record**: A single `(period, category, line_item, amount)` fact
//! - **Concept Resolution**: Free-text labels such as "Cost of Sales" are mapped to financial
//!   concepts used by ratio formulas
//! - **Analysis Artifact**: Ratios, trends, anomalies and a period comparison, each of which
//!   degrades independently when the data cannot support it
//!
//! ## Example
//!
//! ```rust,ignore
//! use financial_statement_analyzer::*;
//!
//! let table = RawTable::new(["Line Item", "Q1", "Q2"])
//!     .with_row([CellValue::from("Revenue"), 100.0.into(), 120.0.into()])
//!     .with_row([CellValue::from("Cost of Sales"), 40.0.into(), 45.0.into()]);
//!
//! let (layout, records, warnings) = detect_and_normalize(&table).unwrap();
//! assert_eq!(layout, Layout::Wide);
//!
//! let artifact = analyze(&records, None);
//! println!("{}", artifact.to_markdown());
//! ```

pub mod anomalies;
pub mod comparison;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod layout;
pub mod ratios;
pub mod report;
pub mod resolver;
pub mod schema;
pub mod trends;
pub mod utils;

pub use anomalies::{detect_anomalies, Anomaly, AnomalyReport, Severity};
pub use comparison::{compare_periods, ComparisonItem, PeriodComparison};
pub use config::{AnalysisConfig, DuplicatePolicy};
pub use dataset::{Dataset, InMemoryRecordStore, RecordSource};
pub use engine::Analyzer;
pub use error::{FinancialAnalysisError, Result};
pub use ingestion::{NormalizedTable, Normalizer};
pub use layout::detect_layout;
pub use ratios::{compute_ratios, RatioKind, RatioOutcome, RatioReport};
pub use report::records_to_csv;
pub use resolver::{resolve_concept, Concept, LineItemIndex, MatchTier};
pub use schema::*;
pub use trends::{compute_trends, Trend, TrendDirection, TrendReport};

use log::{debug, info};

pub struct StatementProcessor;

impl StatementProcessor {
    pub fn normalize(table: &RawTable, config: &AnalysisConfig) -> Result<NormalizedTable> {
        config.validate()?;

        info!(
            "Normalizing table with {} columns and {} rows",
            table.columns.len(),
            table.row_count()
        );

        let normalized = Normalizer::new(config).normalize(table)?;

        for warning in &normalized.warnings {
            debug!("Normalization warning: {}", warning.message);
        }

        Ok(normalized)
    }

    pub fn analyze(
        records: &[CanonicalRecord],
        compare_periods: Option<(&str, &str)>,
        config: &AnalysisConfig,
    ) -> Result<AnalysisArtifact> {
        config.validate()?;
        Ok(Analyzer::new(config).analyze(records, compare_periods))
    }

    pub fn analyze_stored<S: RecordSource + ?Sized>(
        source: &S,
        dataset_id: &str,
        compare_periods: Option<(&str, &str)>,
        config: &AnalysisConfig,
    ) -> Result<AnalysisArtifact> {
        let records = source.fetch_records(dataset_id)?;
        debug!(
            "Fetched {} records for dataset '{}'",
            records.len(),
            dataset_id
        );
        Self::analyze(&records, compare_periods, config)
    }
}

/// Detects the layout of `table` and converts it to canonical records with default settings.
pub fn detect_and_normalize(
    table: &RawTable,
) -> Result<(Layout, Vec<CanonicalRecord>, Vec<ParseWarning>)> {
    detect_and_normalize_with_config(table, &AnalysisConfig::default())
}

pub fn detect_and_normalize_with_config(
    table: &RawTable,
    config: &AnalysisConfig,
) -> Result<(Layout, Vec<CanonicalRecord>, Vec<ParseWarning>)> {
    let normalized = StatementProcessor::normalize(table, config)?;
    Ok((normalized.layout, normalized.records, normalized.warnings))
}

/// Runs every analysis engine with default settings. Never fails as a whole: problems are
/// reported per section of the artifact.
pub fn analyze(
    records: &[CanonicalRecord],
    compare_periods: Option<(&str, &str)>,
) -> AnalysisArtifact {
    Analyzer::new(&AnalysisConfig::default()).analyze(records, compare_periods)
}

pub fn analyze_with_config(
    records: &[CanonicalRecord],
    compare_periods: Option<(&str, &str)>,
    config: &AnalysisConfig,
) -> Result<AnalysisArtifact> {
    StatementProcessor::analyze(records, compare_periods, config)
}

pub fn analyze_dataset<S: RecordSource + ?Sized>(
    source: &S,
    dataset_id: &str,
    compare_periods: Option<(&str, &str)>,
    config: &AnalysisConfig,
) -> Result<AnalysisArtifact> {
    StatementProcessor::analyze_stored(source, dataset_id, compare_periods, config)
}
