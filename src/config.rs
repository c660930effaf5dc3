use crate::error::{FinancialAnalysisError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How colliding `(period, category, line_item)` keys are merged.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    #[schemars(description = "Add the colliding amounts together. The record keeps the position of its first occurrence.")]
    #[default]
    Sum,

    #[schemars(description = "Keep the amount of the last occurrence. The record keeps the position of its first occurrence.")]
    LastWins,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct AnalysisConfig {
    #[schemars(description = "Merge policy for duplicate cells describing the same period, category and line item.")]
    pub duplicate_policy: DuplicatePolicy,

    #[schemars(description = "Category assigned when none can be read or inferred from the table.")]
    pub default_category: String,

    #[schemars(description = "Token-overlap (Jaccard) similarity a fuzzy line item match must exceed. Range (0, 1].")]
    pub match_threshold: f64,

    #[schemars(description = "Average percent change within +/- this band is classified as stable.")]
    pub trend_deadband_pct: f64,

    #[schemars(description = "Minimum number of observed periods before a series is screened for anomalies.")]
    pub anomaly_min_periods: usize,

    #[schemars(description = "Observations with |z| at or above this value are flagged.")]
    pub anomaly_z_threshold: f64,

    #[schemars(description = "Flagged observations with |z| at or above this value are high severity.")]
    pub anomaly_high_z: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::Sum,
            default_category: "Uncategorized".to_string(),
            match_threshold: 0.5,
            trend_deadband_pct: 1.0,
            anomaly_min_periods: 3,
            anomaly_z_threshold: 1.5,
            anomaly_high_z: 2.5,
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_category.trim().is_empty() {
            return Err(invalid("default_category", "must not be empty"));
        }

        if !(self.match_threshold > 0.0 && self.match_threshold <= 1.0) {
            return Err(invalid(
                "match_threshold",
                &format!("{} must be within (0, 1]", self.match_threshold),
            ));
        }

        if !self.trend_deadband_pct.is_finite() || self.trend_deadband_pct < 0.0 {
            return Err(invalid(
                "trend_deadband_pct",
                &format!("{} must be a non-negative number", self.trend_deadband_pct),
            ));
        }

        if self.anomaly_min_periods < 2 {
            return Err(invalid(
                "anomaly_min_periods",
                &format!("{} must be at least 2", self.anomaly_min_periods),
            ));
        }

        for (field, value) in [
            ("anomaly_z_threshold", self.anomaly_z_threshold),
            ("anomaly_high_z", self.anomaly_high_z),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid(
                    field,
                    &format!("{} must be a positive number", value),
                ));
            }
        }

        if self.anomaly_high_z < self.anomaly_z_threshold {
            return Err(invalid(
                "anomaly_high_z",
                &format!(
                    "{} must not be below anomaly_z_threshold ({})",
                    self.anomaly_high_z, self.anomaly_z_threshold
                ),
            ));
        }

        Ok(())
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = schemars::schema_for!(AnalysisConfig);
        serde_json::to_string_pretty(&schema)
    }
}

fn invalid(field: &str, details: &str) -> FinancialAnalysisError {
    FinancialAnalysisError::ValidationError {
        field: field.to_string(),
        details: details.to_string(),
    }
}
