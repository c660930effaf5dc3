use crate::anomalies::{detect_anomalies, AnomalyReport};
use crate::comparison::{compare_periods, ComparisonError, PeriodComparison};
use crate::config::AnalysisConfig;
use crate::dataset::Dataset;
use crate::ratios::{compute_ratios, RatioReport};
use crate::resolver::LineItemIndex;
use crate::schema::{AnalysisArtifact, CanonicalRecord, InsufficientData, Section};
use crate::trends::{compute_trends, TrendReport};
use log::{info, warn};

/// Runs the ratio, trend, anomaly and comparison engines over one record snapshot and
/// assembles their outputs. Engines share only immutable inputs and run in parallel;
/// a problem in one engine is confined to its own section of the artifact.
pub struct Analyzer<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> Analyzer<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn analyze(
        &self,
        records: &[CanonicalRecord],
        compare: Option<(&str, &str)>,
    ) -> AnalysisArtifact {
        let dataset = Dataset::from_records(records.to_vec(), self.config.duplicate_policy);
        self.analyze_dataset(&dataset, compare)
    }

    pub fn analyze_dataset(
        &self,
        dataset: &Dataset,
        compare: Option<(&str, &str)>,
    ) -> AnalysisArtifact {
        info!(
            "Analyzing {} records across {} periods",
            dataset.records().len(),
            dataset.periods().len()
        );

        let index = LineItemIndex::build(dataset, self.config);
        let unresolved = index.unresolved();
        if !unresolved.is_empty() {
            warn!("Unresolved concepts: {:?}", unresolved);
        }

        let ((ratios, trends), (anomalies, period_comparison)) = rayon::join(
            || {
                rayon::join(
                    || self.ratio_section(dataset, &index),
                    || self.trend_section(dataset),
                )
            },
            || {
                rayon::join(
                    || self.anomaly_section(dataset),
                    || self.comparison_section(dataset, compare),
                )
            },
        );

        info!(
            "Analysis complete: ratios {}, trends {}, anomalies {}, comparison {}",
            status(&ratios),
            status(&trends),
            status(&anomalies),
            status(&period_comparison)
        );

        AnalysisArtifact {
            summary: dataset.summary(),
            ratios,
            trends,
            anomalies,
            period_comparison,
        }
    }

    fn ratio_section(&self, dataset: &Dataset, index: &LineItemIndex) -> Section<RatioReport> {
        if dataset.periods().is_empty() {
            return not_enough_periods(1, 0);
        }
        Section::Complete {
            data: compute_ratios(dataset, index),
        }
    }

    fn trend_section(&self, dataset: &Dataset) -> Section<TrendReport> {
        let available = dataset.periods().len();
        if available < 2 {
            return not_enough_periods(2, available);
        }
        Section::Complete {
            data: compute_trends(dataset, self.config),
        }
    }

    fn anomaly_section(&self, dataset: &Dataset) -> Section<AnomalyReport> {
        let available = dataset.periods().len();
        if available < self.config.anomaly_min_periods {
            return not_enough_periods(self.config.anomaly_min_periods, available);
        }
        Section::Complete {
            data: detect_anomalies(dataset, self.config),
        }
    }

    fn comparison_section(
        &self,
        dataset: &Dataset,
        compare: Option<(&str, &str)>,
    ) -> Section<PeriodComparison> {
        match compare_periods(dataset, compare) {
            Ok(data) => Section::Complete { data },
            Err(ComparisonError::Insufficient(reason)) => Section::InsufficientData { reason },
            Err(ComparisonError::Failed(err)) => {
                warn!("Period comparison failed: {}", err);
                Section::Failed {
                    error: err.to_string(),
                }
            }
        }
    }
}

fn not_enough_periods<T>(required: usize, available: usize) -> Section<T> {
    Section::InsufficientData {
        reason: InsufficientData::NotEnoughPeriods {
            required,
            available,
        },
    }
}

fn status<T>(section: &Section<T>) -> &'static str {
    match section {
        Section::Complete { .. } => "complete",
        Section::InsufficientData { .. } => "insufficient data",
        Section::Failed { .. } => "failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<CanonicalRecord> {
        let mut records = Vec::new();
        for (period, revenue, cogs) in [
            ("Q1", 100.0, 40.0),
            ("Q2", 110.0, 45.0),
            ("Q3", 120.0, 47.0),
            ("Q4", 400.0, 50.0),
        ] {
            records.push(CanonicalRecord::new(period, "Income Statement", "Revenue", revenue));
            records.push(CanonicalRecord::new(period, "Income Statement", "COGS", cogs));
        }
        records
    }

    #[test]
    fn test_all_sections_complete() {
        let config = AnalysisConfig::default();
        let artifact = Analyzer::new(&config).analyze(&records(), None);

        assert!(artifact.ratios.is_complete());
        assert!(artifact.trends.is_complete());
        assert!(artifact.anomalies.is_complete());
        assert!(artifact.period_comparison.is_complete());
        assert_eq!(artifact.summary.periods, vec!["Q1", "Q2", "Q3", "Q4"]);
    }

    #[test]
    fn test_unknown_period_only_fails_comparison() {
        let config = AnalysisConfig::default();
        let artifact = Analyzer::new(&config).analyze(&records(), Some(("Q1", "FY2030")));

        assert!(matches!(artifact.period_comparison, Section::Failed { .. }));
        assert!(artifact.ratios.is_complete());
        assert!(artifact.trends.is_complete());
        assert!(artifact.anomalies.is_complete());
    }

    #[test]
    fn test_empty_records_degrade_to_insufficient_data() {
        let config = AnalysisConfig::default();
        let artifact = Analyzer::new(&config).analyze(&[], None);

        assert!(artifact.summary.periods.is_empty());
        for section_ok in [
            matches!(artifact.ratios, Section::InsufficientData { .. }),
            matches!(artifact.trends, Section::InsufficientData { .. }),
            matches!(artifact.anomalies, Section::InsufficientData { .. }),
            matches!(artifact.period_comparison, Section::InsufficientData { .. }),
        ] {
            assert!(section_ok);
        }
    }

    #[test]
    fn test_repeated_analysis_is_identical() {
        let config = AnalysisConfig::default();
        let analyzer = Analyzer::new(&config);
        let first = serde_json::to_string(&analyzer.analyze(&records(), None)).unwrap();
        let second = serde_json::to_string(&analyzer.analyze(&records(), None)).unwrap();
        assert_eq!(first, second);
    }
}
