use crate::config::AnalysisConfig;
use crate::dataset::Dataset;
use crate::schema::InsufficientData;
use crate::utils::{finite, mean, round2};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PeriodValue {
    pub period: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PeriodChange {
    pub from: String,
    pub to: String,
    #[schemars(description = "Percent change from the previous observed period; absent when that value is zero.")]
    pub change_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Trend {
    pub category: String,
    pub line_item: String,
    pub values_by_period: Vec<PeriodValue>,
    pub period_changes: Vec<PeriodChange>,
    pub avg_change_pct: f64,
    pub direction: TrendDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SkippedSeries {
    pub category: String,
    pub line_item: String,
    pub reason: InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrendReport {
    #[schemars(description = "Trends ordered by absolute average change, largest first.")]
    pub trends: Vec<Trend>,
    pub skipped: Vec<SkippedSeries>,
}

impl TrendReport {
    pub fn find(&self, line_item: &str) -> Option<&Trend> {
        self.trends.iter().find(|t| t.line_item == line_item)
    }
}

pub fn classify_direction(avg_change_pct: f64, deadband_pct: f64) -> TrendDirection {
    if avg_change_pct > deadband_pct {
        TrendDirection::Increasing
    } else if avg_change_pct < -deadband_pct {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    }
}

/// Percent change between consecutive observations; `None` when the earlier value is zero.
pub fn percent_change(previous: f64, current: f64) -> Option<f64> {
    if previous == 0.0 {
        return None;
    }
    finite((current - previous) / previous.abs() * 100.0)
}

pub fn compute_trends(dataset: &Dataset, config: &AnalysisConfig) -> TrendReport {
    let periods = dataset.periods();
    let mut trends = Vec::new();
    let mut skipped = Vec::new();

    for series in dataset.series() {
        if series.observations.len() < 2 {
            skipped.push(SkippedSeries {
                category: series.category.to_string(),
                line_item: series.line_item.to_string(),
                reason: InsufficientData::NotEnoughPeriods {
                    required: 2,
                    available: series.observations.len(),
                },
            });
            continue;
        }

        let period_changes: Vec<PeriodChange> = series
            .observations
            .windows(2)
            .map(|pair| PeriodChange {
                from: periods[pair[0].period_index].clone(),
                to: periods[pair[1].period_index].clone(),
                change_pct: percent_change(pair[0].amount, pair[1].amount),
            })
            .collect();

        let defined: Vec<f64> = period_changes.iter().filter_map(|c| c.change_pct).collect();
        let avg_change_pct = mean(&defined).unwrap_or(0.0);

        trends.push(Trend {
            category: series.category.to_string(),
            line_item: series.line_item.to_string(),
            values_by_period: series
                .observations
                .iter()
                .map(|o| PeriodValue {
                    period: periods[o.period_index].clone(),
                    amount: round2(o.amount),
                })
                .collect(),
            period_changes: period_changes
                .into_iter()
                .map(|c| PeriodChange {
                    change_pct: c.change_pct.map(round2),
                    ..c
                })
                .collect(),
            avg_change_pct: round2(avg_change_pct),
            direction: classify_direction(avg_change_pct, config.trend_deadband_pct),
        });
    }

    // stable sort keeps first-appearance order among equal magnitudes
    trends.sort_by(|a, b| b.avg_change_pct.abs().total_cmp(&a.avg_change_pct.abs()));

    TrendReport { trends, skipped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DuplicatePolicy;
    use crate::schema::CanonicalRecord;

    fn series_records(item: &str, values: &[f64]) -> Vec<CanonicalRecord> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| CanonicalRecord::new(format!("P{}", i + 1), "IS", item, *v))
            .collect()
    }

    fn trends_for(records: Vec<CanonicalRecord>) -> TrendReport {
        let dataset = Dataset::from_records(records, DuplicatePolicy::Sum);
        compute_trends(&dataset, &AnalysisConfig::default())
    }

    #[test]
    fn test_increasing_series() {
        let report = trends_for(series_records("Revenue", &[100.0, 102.0, 104.0]));
        let trend = report.find("Revenue").unwrap();

        assert!((trend.avg_change_pct - 2.0).abs() < 0.05);
        assert_eq!(trend.direction, TrendDirection::Increasing);
        assert_eq!(trend.period_changes.len(), 2);
        assert_eq!(trend.period_changes[0].change_pct, Some(2.0));
        assert_eq!(trend.period_changes[1].from, "P2");
    }

    #[test]
    fn test_flat_series_is_stable() {
        let report = trends_for(series_records("Rent", &[100.0, 100.0, 100.0]));
        let trend = report.find("Rent").unwrap();
        assert_eq!(trend.avg_change_pct, 0.0);
        assert_eq!(trend.direction, TrendDirection::Stable);
    }

    #[test]
    fn test_deadband_and_decreasing() {
        assert_eq!(classify_direction(0.9, 1.0), TrendDirection::Stable);
        assert_eq!(classify_direction(-1.0, 1.0), TrendDirection::Stable);
        assert_eq!(classify_direction(-1.5, 1.0), TrendDirection::Decreasing);

        let report = trends_for(series_records("Opex", &[200.0, 150.0, 100.0]));
        assert_eq!(
            report.find("Opex").unwrap().direction,
            TrendDirection::Decreasing
        );
    }

    #[test]
    fn test_zero_previous_value_is_undefined() {
        let report = trends_for(series_records("Other Income", &[0.0, 50.0]));
        let trend = report.find("Other Income").unwrap();

        assert_eq!(trend.period_changes[0].change_pct, None);
        assert_eq!(trend.avg_change_pct, 0.0);
        assert_eq!(trend.direction, TrendDirection::Stable);
    }

    #[test]
    fn test_negative_base_uses_absolute_denominator() {
        assert_eq!(percent_change(-100.0, -50.0), Some(50.0));
        assert_eq!(percent_change(-100.0, -150.0), Some(-50.0));
    }

    #[test]
    fn test_single_period_series_is_skipped_and_order_by_magnitude() {
        let mut records = series_records("Revenue", &[100.0, 110.0]);
        records.extend(series_records("Cash", &[100.0, 300.0]));
        records.push(CanonicalRecord::new("P1", "BS", "Goodwill", 40.0));

        let report = trends_for(records);
        assert_eq!(report.trends[0].line_item, "Cash");
        assert_eq!(report.trends[1].line_item, "Revenue");
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(
            report.skipped[0].reason,
            InsufficientData::NotEnoughPeriods {
                required: 2,
                available: 1
            }
        );
    }
}
