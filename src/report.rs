use crate::anomalies::Severity;
use crate::ratios::{RatioOutcome, RatioUnit};
use crate::schema::{AnalysisArtifact, CanonicalRecord, Section};
use crate::trends::TrendDirection;

impl AnalysisArtifact {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str("# Financial Analysis\n\n");
        output.push_str(&format!(
            "**Periods:** {}\n\n",
            self.summary.periods.join(", ")
        ));
        output.push_str(&format!(
            "**Line items:** {} ({} records)\n\n",
            self.summary.line_item_count, self.summary.record_count
        ));
        if !self.summary.categories.is_empty() {
            output.push_str(&format!(
                "**Categories:** {}\n\n",
                self.summary.categories.join(", ")
            ));
        }

        output.push_str("## Ratios\n\n");
        match &self.ratios {
            Section::Complete { data } => match data.latest() {
                Some(latest) => {
                    output.push_str(&format!("Period: {}\n\n", latest.period));
                    for ratio in &latest.ratios {
                        match &ratio.outcome {
                            RatioOutcome::Computed { value } => {
                                let unit = match ratio.unit {
                                    RatioUnit::Percent => "%",
                                    RatioUnit::Multiple => "x",
                                };
                                output.push_str(&format!(
                                    "- {}: {:.2}{}\n",
                                    ratio.ratio.label(),
                                    value,
                                    unit
                                ));
                            }
                            RatioOutcome::InsufficientData { reason } => {
                                output.push_str(&format!(
                                    "- {}: insufficient data ({})\n",
                                    ratio.ratio.label(),
                                    reason
                                ));
                            }
                        }
                    }
                }
                None => output.push_str("No periods to report.\n"),
            },
            other => push_unavailable(&mut output, other),
        }
        output.push('\n');

        output.push_str("## Trends\n\n");
        match &self.trends {
            Section::Complete { data } => {
                for trend in &data.trends {
                    let arrow = match trend.direction {
                        TrendDirection::Increasing => "↑",
                        TrendDirection::Decreasing => "↓",
                        TrendDirection::Stable => "→",
                    };
                    output.push_str(&format!(
                        "- {} {}: {:?} (avg {:+.1}% per period)\n",
                        arrow, trend.line_item, trend.direction, trend.avg_change_pct
                    ));
                }
                if data.trends.is_empty() {
                    output.push_str("No series spans two or more periods.\n");
                }
            }
            other => push_unavailable(&mut output, other),
        }
        output.push('\n');

        output.push_str("## Anomalies\n\n");
        match &self.anomalies {
            Section::Complete { data } => {
                for anomaly in &data.anomalies {
                    let marker = match anomaly.severity {
                        Severity::High => "**[HIGH]**",
                        Severity::Medium => "[MEDIUM]",
                    };
                    output.push_str(&format!(
                        "- {} {} (z = {:.2})\n",
                        marker, anomaly.description, anomaly.z_score
                    ));
                }
                if data.anomalies.is_empty() {
                    output.push_str("No anomalies detected.\n");
                }
            }
            other => push_unavailable(&mut output, other),
        }
        output.push('\n');

        output.push_str("## Period Comparison\n\n");
        match &self.period_comparison {
            Section::Complete { data } => {
                output.push_str(&format!("{} vs {}\n\n", data.period_1, data.period_2));
                output.push_str("| Line Item | Period 1 | Period 2 | Change | Change % |\n");
                output.push_str("|---|---:|---:|---:|---:|\n");
                for item in &data.items {
                    let pct = item
                        .percent_change
                        .map(|p| format!("{:+.2}%", p))
                        .unwrap_or_else(|| "n/a".to_string());
                    output.push_str(&format!(
                        "| {} | {:.2} | {:.2} | {:+.2} | {} |\n",
                        item.line_item,
                        item.period_1_value,
                        item.period_2_value,
                        item.absolute_change,
                        pct
                    ));
                }
            }
            other => push_unavailable(&mut output, other),
        }

        output
    }
}

fn push_unavailable<T>(output: &mut String, section: &Section<T>) {
    match section {
        Section::InsufficientData { reason } => {
            output.push_str(&format!("Insufficient data: {}\n", reason))
        }
        Section::Failed { error } => output.push_str(&format!("Failed: {}\n", error)),
        Section::Complete { .. } => {}
    }
}

/// Canonical records as CSV with a header row, in record order.
pub fn records_to_csv(records: &[CanonicalRecord]) -> String {
    let mut output = String::new();
    output.push_str("period,category,line_item,amount\n");

    for record in records {
        output.push_str(&format!(
            "{},{},{},{}\n",
            csv_field(&record.period),
            csv_field(&record.category),
            csv_field(&record.line_item),
            record.amount
        ));
    }

    output
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
