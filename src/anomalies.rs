use crate::config::AnalysisConfig;
use crate::dataset::Dataset;
use crate::schema::InsufficientData;
use crate::trends::SkippedSeries;
use crate::utils::{mean, population_std_dev, round2};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const ATTAINABLE_Z_FRACTION: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Anomaly {
    pub category: String,
    pub line_item: String,
    pub period: String,
    pub amount: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub z_score: f64,
    #[schemars(description = "High when |z| reaches anomaly_high_z, lowered to 95% of sqrt(n - 1) for series too short to ever reach it.")]
    pub severity: Severity,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnomalyReport {
    #[schemars(description = "Flagged observations ordered by absolute z-score, largest first.")]
    pub anomalies: Vec<Anomaly>,
    pub skipped: Vec<SkippedSeries>,
}

pub fn detect_anomalies(dataset: &Dataset, config: &AnalysisConfig) -> AnomalyReport {
    let periods = dataset.periods();
    let mut anomalies = Vec::new();
    let mut skipped = Vec::new();

    for series in dataset.series() {
        let skip = |reason| SkippedSeries {
            category: series.category.to_string(),
            line_item: series.line_item.to_string(),
            reason,
        };

        if series.observations.len() < config.anomaly_min_periods {
            skipped.push(skip(InsufficientData::NotEnoughPeriods {
                required: config.anomaly_min_periods,
                available: series.observations.len(),
            }));
            continue;
        }

        let amounts: Vec<f64> = series.observations.iter().map(|o| o.amount).collect();
        let (Some(avg), Some(std_dev)) = (mean(&amounts), population_std_dev(&amounts)) else {
            continue;
        };

        if std_dev == 0.0 || !std_dev.is_finite() {
            debug!(
                "Series '{}' / '{}' is constant; no anomalies",
                series.category, series.line_item
            );
            skipped.push(skip(InsufficientData::ConstantSeries));
            continue;
        }

        let high_z = high_threshold(config.anomaly_high_z, series.observations.len());

        for observation in &series.observations {
            let z = (observation.amount - avg) / std_dev;
            if z.abs() < config.anomaly_z_threshold {
                continue;
            }

            let severity = if z.abs() >= high_z {
                Severity::High
            } else {
                Severity::Medium
            };

            let period = &periods[observation.period_index];
            anomalies.push(Anomaly {
                category: series.category.to_string(),
                line_item: series.line_item.to_string(),
                period: period.clone(),
                amount: round2(observation.amount),
                mean: round2(avg),
                std_dev: round2(std_dev),
                z_score: round2(z),
                severity,
                description: describe(series.line_item, period, observation.amount, avg, z),
            });
        }
    }

    anomalies.sort_by(|a, b| b.z_score.abs().total_cmp(&a.z_score.abs()));

    AnomalyReport { anomalies, skipped }
}

// A population z-score over n points never exceeds sqrt(n - 1).
pub fn high_threshold(configured: f64, n: usize) -> f64 {
    let attainable = ((n.max(1) - 1) as f64).sqrt();
    configured.min(attainable * ATTAINABLE_Z_FRACTION)
}

fn describe(line_item: &str, period: &str, amount: f64, avg: f64, z: f64) -> String {
    let direction = if z > 0.0 { "above" } else { "below" };
    format!(
        "{} in {} is {:.2}, {} the series average of {:.2} by {:.1} standard deviations",
        line_item,
        period,
        amount,
        direction,
        avg,
        z.abs()
    )
}
