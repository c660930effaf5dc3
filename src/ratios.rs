use crate::dataset::Dataset;
use crate::resolver::{Concept, LineItemIndex};
use crate::schema::InsufficientData;
use crate::utils::{finite, round2};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RatioKind {
    GrossMargin,
    OperatingMargin,
    NetMargin,
    EbitdaMargin,
    ReturnOnAssets,
    ReturnOnEquity,
    CurrentRatio,
    QuickRatio,
    CashRatio,
    DebtToEquity,
    DebtToAssets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RatioGroup {
    Profitability,
    Liquidity,
    Leverage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RatioUnit {
    #[schemars(description = "Value is a percentage, e.g. 42.5 means 42.5%.")]
    Percent,
    #[schemars(description = "Value is a multiple, e.g. 1.8 means 1.8x.")]
    Multiple,
}

impl RatioKind {
    pub const ALL: [RatioKind; 11] = [
        RatioKind::GrossMargin,
        RatioKind::OperatingMargin,
        RatioKind::NetMargin,
        RatioKind::EbitdaMargin,
        RatioKind::ReturnOnAssets,
        RatioKind::ReturnOnEquity,
        RatioKind::CurrentRatio,
        RatioKind::QuickRatio,
        RatioKind::CashRatio,
        RatioKind::DebtToEquity,
        RatioKind::DebtToAssets,
    ];

    pub fn group(&self) -> RatioGroup {
        match self {
            RatioKind::GrossMargin
            | RatioKind::OperatingMargin
            | RatioKind::NetMargin
            | RatioKind::EbitdaMargin
            | RatioKind::ReturnOnAssets
            | RatioKind::ReturnOnEquity => RatioGroup::Profitability,
            RatioKind::CurrentRatio | RatioKind::QuickRatio | RatioKind::CashRatio => {
                RatioGroup::Liquidity
            }
            RatioKind::DebtToEquity | RatioKind::DebtToAssets => RatioGroup::Leverage,
        }
    }

    pub fn unit(&self) -> RatioUnit {
        match self.group() {
            RatioGroup::Profitability => RatioUnit::Percent,
            RatioGroup::Liquidity | RatioGroup::Leverage => RatioUnit::Multiple,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RatioKind::GrossMargin => "Gross Margin",
            RatioKind::OperatingMargin => "Operating Margin",
            RatioKind::NetMargin => "Net Margin",
            RatioKind::EbitdaMargin => "EBITDA Margin",
            RatioKind::ReturnOnAssets => "Return on Assets (ROA)",
            RatioKind::ReturnOnEquity => "Return on Equity (ROE)",
            RatioKind::CurrentRatio => "Current Ratio",
            RatioKind::QuickRatio => "Quick Ratio",
            RatioKind::CashRatio => "Cash Ratio",
            RatioKind::DebtToEquity => "Debt to Equity",
            RatioKind::DebtToAssets => "Debt to Assets",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RatioOutcome {
    Computed { value: f64 },
    InsufficientData { reason: InsufficientData },
}

impl RatioOutcome {
    pub fn value(&self) -> Option<f64> {
        match self {
            RatioOutcome::Computed { value } => Some(*value),
            RatioOutcome::InsufficientData { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RatioValue {
    pub ratio: RatioKind,
    pub group: RatioGroup,
    pub unit: RatioUnit,
    pub outcome: RatioOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PeriodRatios {
    pub period: String,
    pub ratios: Vec<RatioValue>,
}

impl PeriodRatios {
    pub fn get(&self, kind: RatioKind) -> Option<&RatioOutcome> {
        self.ratios
            .iter()
            .find(|r| r.ratio == kind)
            .map(|r| &r.outcome)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RatioReport {
    #[schemars(description = "Raw line item chosen for each resolved concept.")]
    pub resolved_items: BTreeMap<Concept, String>,
    pub unresolved_concepts: Vec<Concept>,
    #[schemars(description = "Ratios per period, in canonical period order.")]
    pub periods: Vec<PeriodRatios>,
}

impl RatioReport {
    pub fn for_period(&self, period: &str) -> Option<&PeriodRatios> {
        self.periods.iter().find(|p| p.period == period)
    }

    pub fn latest(&self) -> Option<&PeriodRatios> {
        self.periods.last()
    }
}

pub fn compute_ratios(dataset: &Dataset, index: &LineItemIndex) -> RatioReport {
    let periods = dataset
        .periods()
        .iter()
        .map(|period| {
            let inputs = PeriodInputs {
                dataset,
                index,
                period,
            };
            PeriodRatios {
                period: period.clone(),
                ratios: RatioKind::ALL
                    .iter()
                    .map(|kind| RatioValue {
                        ratio: *kind,
                        group: kind.group(),
                        unit: kind.unit(),
                        outcome: inputs.compute(*kind),
                    })
                    .collect(),
            }
        })
        .collect();

    RatioReport {
        resolved_items: index.resolved(),
        unresolved_concepts: index.unresolved(),
        periods,
    }
}

struct PeriodInputs<'a> {
    dataset: &'a Dataset,
    index: &'a LineItemIndex,
    period: &'a str,
}

impl PeriodInputs<'_> {
    /// Values for every concept, or the reason at least one is unavailable.
    fn require<const N: usize>(
        &self,
        concepts: [Concept; N],
    ) -> std::result::Result<[f64; N], InsufficientData> {
        let unresolved: Vec<Concept> = concepts
            .iter()
            .copied()
            .filter(|c| self.index.resolve(*c).is_none())
            .collect();
        if !unresolved.is_empty() {
            return Err(InsufficientData::UnresolvedConcepts {
                concepts: unresolved,
            });
        }

        let mut values = [0.0; N];
        let mut missing = Vec::new();
        for (slot, concept) in values.iter_mut().zip(concepts) {
            match self.index.value(self.dataset, concept, self.period) {
                Some(value) => *slot = value,
                None => missing.push(concept),
            }
        }
        if !missing.is_empty() {
            return Err(InsufficientData::MissingValues { concepts: missing });
        }

        Ok(values)
    }

    fn compute(&self, kind: RatioKind) -> RatioOutcome {
        let result = match kind {
            RatioKind::GrossMargin => self.gross_margin(),
            RatioKind::OperatingMargin => self
                .require([Concept::OperatingIncome, Concept::Revenue])
                .and_then(|[op, rev]| divide(op, rev, 100.0)),
            RatioKind::NetMargin => self
                .require([Concept::NetIncome, Concept::Revenue])
                .and_then(|[ni, rev]| divide(ni, rev, 100.0)),
            RatioKind::EbitdaMargin => self
                .require([Concept::Ebitda, Concept::Revenue])
                .and_then(|[ebitda, rev]| divide(ebitda, rev, 100.0)),
            RatioKind::ReturnOnAssets => self
                .require([Concept::NetIncome, Concept::TotalAssets])
                .and_then(|[ni, ta]| divide(ni, ta, 100.0)),
            RatioKind::ReturnOnEquity => self.return_on_equity(),
            RatioKind::CurrentRatio => self
                .require([Concept::CurrentAssets, Concept::CurrentLiabilities])
                .and_then(|[ca, cl]| divide(ca, cl, 1.0)),
            RatioKind::QuickRatio => self
                .require([
                    Concept::CurrentAssets,
                    Concept::Inventory,
                    Concept::CurrentLiabilities,
                ])
                .and_then(|[ca, inv, cl]| divide(ca - inv, cl, 1.0)),
            RatioKind::CashRatio => self
                .require([Concept::Cash, Concept::CurrentLiabilities])
                .and_then(|[cash, cl]| divide(cash, cl, 1.0)),
            RatioKind::DebtToEquity => self
                .require([Concept::TotalLiabilities, Concept::TotalAssets])
                .and_then(|[tl, ta]| divide(tl, ta - tl, 1.0)),
            RatioKind::DebtToAssets => self
                .require([Concept::TotalLiabilities, Concept::TotalAssets])
                .and_then(|[tl, ta]| divide(tl, ta, 1.0)),
        };

        match result {
            Ok(value) => RatioOutcome::Computed { value },
            Err(reason) => {
                debug!("{:?} for {} skipped: {}", kind, self.period, reason);
                RatioOutcome::InsufficientData { reason }
            }
        }
    }

    // Falls back to a reported gross profit line when cost of sales is not itemised.
    fn gross_margin(&self) -> std::result::Result<f64, InsufficientData> {
        let cogs_resolved = self.index.resolve(Concept::Cogs).is_some();
        let gross_profit_resolved = self.index.resolve(Concept::GrossProfit).is_some();

        if !cogs_resolved && gross_profit_resolved {
            return self
                .require([Concept::GrossProfit, Concept::Revenue])
                .and_then(|[gp, rev]| divide(gp, rev, 100.0));
        }

        self.require([Concept::Revenue, Concept::Cogs])
            .and_then(|[rev, cogs]| divide(rev - cogs, rev, 100.0))
    }

    // Reported equity when available, otherwise assets less liabilities.
    fn return_on_equity(&self) -> std::result::Result<f64, InsufficientData> {
        if self.index.resolve(Concept::TotalEquity).is_some() {
            return self
                .require([Concept::NetIncome, Concept::TotalEquity])
                .and_then(|[ni, equity]| divide(ni, equity, 100.0));
        }

        self.require([
            Concept::NetIncome,
            Concept::TotalAssets,
            Concept::TotalLiabilities,
        ])
        .and_then(|[ni, ta, tl]| divide(ni, ta - tl, 100.0))
    }
}

fn divide(numerator: f64, denominator: f64, scale: f64) -> std::result::Result<f64, InsufficientData> {
    if denominator == 0.0 {
        return Err(InsufficientData::ZeroDenominator);
    }
    finite(numerator / denominator * scale)
        .map(round2)
        .ok_or(InsufficientData::ZeroDenominator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnalysisConfig, DuplicatePolicy};
    use crate::schema::CanonicalRecord;

    fn report_for(records: Vec<CanonicalRecord>) -> RatioReport {
        let dataset = Dataset::from_records(records, DuplicatePolicy::Sum);
        let index = LineItemIndex::build(&dataset, &AnalysisConfig::default());
        compute_ratios(&dataset, &index)
    }

    fn statement(period: &str, revenue: f64) -> Vec<CanonicalRecord> {
        vec![
            CanonicalRecord::new(period, "Income Statement", "Total Revenue", revenue),
            CanonicalRecord::new(period, "Income Statement", "Cost of Goods Sold", 60.0),
            CanonicalRecord::new(period, "Income Statement", "Net Income", 15.0),
            CanonicalRecord::new(period, "Balance Sheet", "Total Current Assets", 80.0),
            CanonicalRecord::new(period, "Balance Sheet", "Inventory", 20.0),
            CanonicalRecord::new(period, "Balance Sheet", "Total Current Liabilities", 40.0),
            CanonicalRecord::new(period, "Balance Sheet", "Total Assets", 300.0),
            CanonicalRecord::new(period, "Balance Sheet", "Total Liabilities", 100.0),
        ]
    }

    #[test]
    fn test_core_ratios() {
        let report = report_for(statement("FY2023", 100.0));
        let period = report.for_period("FY2023").unwrap();

        let value = |kind| period.get(kind).and_then(RatioOutcome::value);
        assert_eq!(value(RatioKind::GrossMargin), Some(40.0));
        assert_eq!(value(RatioKind::NetMargin), Some(15.0));
        assert_eq!(value(RatioKind::ReturnOnAssets), Some(5.0));
        assert_eq!(value(RatioKind::CurrentRatio), Some(2.0));
        assert_eq!(value(RatioKind::QuickRatio), Some(1.5));
        assert_eq!(value(RatioKind::DebtToEquity), Some(0.5));
        assert_eq!(value(RatioKind::DebtToAssets), Some(0.33));
        assert_eq!(value(RatioKind::ReturnOnEquity), Some(7.5));
    }

    #[test]
    fn test_zero_revenue_marks_margins_insufficient() {
        let report = report_for(statement("Q1", 0.0));
        let period = report.latest().unwrap();

        for kind in [RatioKind::GrossMargin, RatioKind::NetMargin] {
            assert_eq!(
                period.get(kind),
                Some(&RatioOutcome::InsufficientData {
                    reason: InsufficientData::ZeroDenominator
                })
            );
        }
        assert_eq!(
            period.get(RatioKind::CurrentRatio).and_then(RatioOutcome::value),
            Some(2.0)
        );
    }

    #[test]
    fn test_unresolved_concepts_are_named() {
        let report = report_for(vec![CanonicalRecord::new("Q1", "IS", "Revenue", 100.0)]);
        let period = report.latest().unwrap();

        match period.get(RatioKind::OperatingMargin) {
            Some(RatioOutcome::InsufficientData {
                reason: InsufficientData::UnresolvedConcepts { concepts },
            }) => assert_eq!(concepts, &vec![Concept::OperatingIncome]),
            other => panic!("expected unresolved concepts, got {:?}", other),
        }
        assert!(report.unresolved_concepts.contains(&Concept::Cogs));
        assert_eq!(
            report.resolved_items.get(&Concept::Revenue).map(String::as_str),
            Some("Revenue")
        );
    }

    #[test]
    fn test_missing_value_in_one_period() {
        let mut records = statement("Q1", 100.0);
        records.push(CanonicalRecord::new("Q2", "Income Statement", "Total Revenue", 120.0));
        let report = report_for(records);

        let q2 = report.for_period("Q2").unwrap();
        match q2.get(RatioKind::NetMargin) {
            Some(RatioOutcome::InsufficientData {
                reason: InsufficientData::MissingValues { concepts },
            }) => assert_eq!(concepts, &vec![Concept::NetIncome]),
            other => panic!("expected missing values, got {:?}", other),
        }
    }

    #[test]
    fn test_gross_margin_falls_back_to_gross_profit() {
        let report = report_for(vec![
            CanonicalRecord::new("Q1", "IS", "Sales", 200.0),
            CanonicalRecord::new("Q1", "IS", "Gross Profit", 50.0),
        ]);
        assert_eq!(
            report
                .latest()
                .and_then(|p| p.get(RatioKind::GrossMargin))
                .and_then(RatioOutcome::value),
            Some(25.0)
        );
    }

    #[test]
    fn test_gap_in_resolved_label_is_not_filled_from_another_item() {
        let report = report_for(vec![
            CanonicalRecord::new("Q1", "IS", "Product Revenue", 100.0),
            CanonicalRecord::new("Q1", "IS", "Net Income", 10.0),
            CanonicalRecord::new("Q2", "IS", "Service Revenue", 5.0),
            CanonicalRecord::new("Q2", "IS", "Net Income", 10.0),
        ]);

        assert_eq!(
            report.resolved_items.get(&Concept::Revenue).map(String::as_str),
            Some("Product Revenue")
        );
        assert_eq!(
            report
                .for_period("Q1")
                .and_then(|p| p.get(RatioKind::NetMargin))
                .and_then(RatioOutcome::value),
            Some(10.0)
        );
        assert_eq!(
            report.for_period("Q2").and_then(|p| p.get(RatioKind::NetMargin)),
            Some(&RatioOutcome::InsufficientData {
                reason: InsufficientData::MissingValues {
                    concepts: vec![Concept::Revenue]
                }
            })
        );
    }

    #[test]
    fn test_sales_tax_is_not_used_as_revenue() {
        let report = report_for(vec![
            CanonicalRecord::new("FY", "IS", "Product Revenues", 1000.0),
            CanonicalRecord::new("FY", "IS", "Sales Tax", 80.0),
            CanonicalRecord::new("FY", "IS", "Net Income", 100.0),
        ]);

        assert_eq!(
            report.resolved_items.get(&Concept::Revenue).map(String::as_str),
            Some("Product Revenues")
        );
        assert_eq!(
            report
                .latest()
                .and_then(|p| p.get(RatioKind::NetMargin))
                .and_then(RatioOutcome::value),
            Some(10.0)
        );
    }
}
