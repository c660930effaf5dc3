use crate::dataset::Dataset;
use crate::error::{FinancialAnalysisError, Result};
use crate::schema::InsufficientData;
use crate::trends::percent_change;
use crate::utils::round2;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ComparisonItem {
    pub category: String,
    pub line_item: String,
    pub period_1_value: f64,
    pub period_2_value: f64,
    pub absolute_change: f64,
    #[schemars(description = "Percent change relative to |period_1_value|; absent when period_1_value is zero.")]
    pub percent_change: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PeriodComparison {
    pub period_1: String,
    pub period_2: String,
    #[schemars(description = "Items present in both periods, ordered by absolute change, largest first.")]
    pub items: Vec<ComparisonItem>,
    pub only_in_period_1: Vec<String>,
    pub only_in_period_2: Vec<String>,
}

/// What the comparison engine could not do, kept apart from hard errors so the
/// orchestrator can mark the section accordingly.
#[derive(Debug)]
pub enum ComparisonError {
    Insufficient(InsufficientData),
    Failed(FinancialAnalysisError),
}

impl From<FinancialAnalysisError> for ComparisonError {
    fn from(err: FinancialAnalysisError) -> Self {
        ComparisonError::Failed(err)
    }
}

/// Picks the explicit pair, or the two most recent periods in canonical order.
pub fn select_periods(
    dataset: &Dataset,
    requested: Option<(&str, &str)>,
) -> std::result::Result<(String, String), ComparisonError> {
    match requested {
        Some((first, second)) => {
            for label in [first, second] {
                if dataset.period_index(label).is_none() {
                    return Err(FinancialAnalysisError::UnknownPeriod(label.to_string()).into());
                }
            }
            Ok((first.to_string(), second.to_string()))
        }
        None => match dataset.periods() {
            [.., previous, latest] => Ok((previous.clone(), latest.clone())),
            periods => Err(ComparisonError::Insufficient(
                InsufficientData::NotEnoughPeriods {
                    required: 2,
                    available: periods.len(),
                },
            )),
        },
    }
}

pub fn compare_periods(
    dataset: &Dataset,
    requested: Option<(&str, &str)>,
) -> std::result::Result<PeriodComparison, ComparisonError> {
    let (period_1, period_2) = select_periods(dataset, requested)?;
    Ok(compare_selected(dataset, &period_1, &period_2)?)
}

fn compare_selected(dataset: &Dataset, period_1: &str, period_2: &str) -> Result<PeriodComparison> {
    let first = dataset
        .period_index(period_1)
        .ok_or_else(|| FinancialAnalysisError::UnknownPeriod(period_1.to_string()))?;
    let second = dataset
        .period_index(period_2)
        .ok_or_else(|| FinancialAnalysisError::UnknownPeriod(period_2.to_string()))?;

    let mut items = Vec::new();
    let mut only_in_period_1 = Vec::new();
    let mut only_in_period_2 = Vec::new();

    for series in dataset.series() {
        let at = |index: usize| {
            series
                .observations
                .iter()
                .find(|o| o.period_index == index)
                .map(|o| o.amount)
        };

        match (at(first), at(second)) {
            (Some(v1), Some(v2)) => items.push(ComparisonItem {
                category: series.category.to_string(),
                line_item: series.line_item.to_string(),
                period_1_value: round2(v1),
                period_2_value: round2(v2),
                absolute_change: round2(v2 - v1),
                percent_change: percent_change(v1, v2).map(round2),
            }),
            (Some(_), None) => only_in_period_1.push(series.line_item.to_string()),
            (None, Some(_)) => only_in_period_2.push(series.line_item.to_string()),
            (None, None) => {}
        }
    }

    items.sort_by(|a, b| b.absolute_change.abs().total_cmp(&a.absolute_change.abs()));

    Ok(PeriodComparison {
        period_1: period_1.to_string(),
        period_2: period_2.to_string(),
        items,
        only_in_period_1,
        only_in_period_2,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DuplicatePolicy;
    use crate::schema::CanonicalRecord;

    fn dataset() -> Dataset {
        Dataset::from_records(
            vec![
                CanonicalRecord::new("Q1", "IS", "Revenue", 100.0),
                CanonicalRecord::new("Q1", "IS", "COGS", 0.0),
                CanonicalRecord::new("Q1", "IS", "Legal Fees", 12.0),
                CanonicalRecord::new("Q2", "IS", "Revenue", 150.0),
                CanonicalRecord::new("Q2", "IS", "COGS", 30.0),
                CanonicalRecord::new("Q3", "IS", "Revenue", 90.0),
                CanonicalRecord::new("Q3", "IS", "Grants", 7.0),
            ],
            DuplicatePolicy::Sum,
        )
    }

    #[test]
    fn test_explicit_periods() {
        let comparison = compare_periods(&dataset(), Some(("Q1", "Q2"))).unwrap();

        let revenue = comparison
            .items
            .iter()
            .find(|i| i.line_item == "Revenue")
            .unwrap();
        assert_eq!(revenue.absolute_change, 50.0);
        assert_eq!(revenue.percent_change, Some(50.0));

        let cogs = comparison.items.iter().find(|i| i.line_item == "COGS").unwrap();
        assert_eq!(cogs.absolute_change, 30.0);
        assert_eq!(cogs.percent_change, None);

        assert_eq!(comparison.items[0].line_item, "Revenue");
        assert_eq!(comparison.only_in_period_1, vec!["Legal Fees"]);
        assert!(comparison.only_in_period_2.is_empty());
    }

    #[test]
    fn test_defaults_to_two_most_recent_periods() {
        let comparison = compare_periods(&dataset(), None).unwrap();

        assert_eq!(comparison.period_1, "Q2");
        assert_eq!(comparison.period_2, "Q3");
        assert_eq!(comparison.items.len(), 1);
        assert_eq!(comparison.items[0].percent_change, Some(-40.0));
        assert_eq!(comparison.only_in_period_1, vec!["COGS"]);
        assert_eq!(comparison.only_in_period_2, vec!["Grants"]);
    }

    #[test]
    fn test_unknown_period_fails() {
        match compare_periods(&dataset(), Some(("Q1", "Q9"))) {
            Err(ComparisonError::Failed(FinancialAnalysisError::UnknownPeriod(label))) => {
                assert_eq!(label, "Q9")
            }
            other => panic!("expected unknown period, got {:?}", other),
        }
    }

    #[test]
    fn test_single_period_is_insufficient() {
        let single = Dataset::from_records(
            vec![CanonicalRecord::new("FY", "IS", "Revenue", 1.0)],
            DuplicatePolicy::Sum,
        );
        assert!(matches!(
            compare_periods(&single, None),
            Err(ComparisonError::Insufficient(
                InsufficientData::NotEnoughPeriods { .. }
            ))
        ));
    }
}
