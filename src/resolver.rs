use crate::config::AnalysisConfig;
use crate::dataset::Dataset;
use crate::utils::{contains_phrase, label_tokens, normalize_label, token_overlap};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Tokens that mark a label as derived (a ratio or a growth figure) rather than an amount.
const DERIVED_TOKENS: &[&str] = &["margin", "ratio", "percent", "pct", "growth", "yoy"];

/// Tokens too generic to identify a concept on their own.
const GENERIC_TOKENS: &[&str] = &["net", "total", "gross", "other", "operating", "current"];

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Concept {
    Revenue,
    Cogs,
    GrossProfit,
    OperatingIncome,
    Ebitda,
    NetIncome,
    TotalAssets,
    TotalLiabilities,
    TotalEquity,
    CurrentAssets,
    CurrentLiabilities,
    Cash,
    Inventory,
}

impl Concept {
    pub const ALL: [Concept; 13] = [
        Concept::Revenue,
        Concept::Cogs,
        Concept::GrossProfit,
        Concept::OperatingIncome,
        Concept::Ebitda,
        Concept::NetIncome,
        Concept::TotalAssets,
        Concept::TotalLiabilities,
        Concept::TotalEquity,
        Concept::CurrentAssets,
        Concept::CurrentLiabilities,
        Concept::Cash,
        Concept::Inventory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Concept::Revenue => "revenue",
            Concept::Cogs => "cogs",
            Concept::GrossProfit => "gross_profit",
            Concept::OperatingIncome => "operating_income",
            Concept::Ebitda => "ebitda",
            Concept::NetIncome => "net_income",
            Concept::TotalAssets => "total_assets",
            Concept::TotalLiabilities => "total_liabilities",
            Concept::TotalEquity => "total_equity",
            Concept::CurrentAssets => "current_assets",
            Concept::CurrentLiabilities => "current_liabilities",
            Concept::Cash => "cash",
            Concept::Inventory => "inventory",
        }
    }

    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Concept::Revenue => &[
                "revenue",
                "revenues",
                "total revenue",
                "net revenue",
                "sales",
                "net sales",
                "total sales",
                "turnover",
            ],
            Concept::Cogs => &[
                "cogs",
                "cost of goods sold",
                "cost of revenue",
                "cost of sales",
                "cost of goods",
            ],
            Concept::GrossProfit => &["gross profit", "gross income"],
            Concept::OperatingIncome => &[
                "operating income",
                "operating profit",
                "ebit",
                "income from operations",
            ],
            Concept::Ebitda => &["ebitda"],
            Concept::NetIncome => &[
                "net income",
                "net profit",
                "net earnings",
                "profit after tax",
            ],
            Concept::TotalAssets => &["total assets"],
            Concept::TotalLiabilities => &["total liabilities"],
            Concept::TotalEquity => &[
                "total equity",
                "shareholders equity",
                "stockholders equity",
                "total shareholders equity",
                "owners equity",
            ],
            Concept::CurrentAssets => &["current assets", "total current assets"],
            Concept::CurrentLiabilities => &["current liabilities", "total current liabilities"],
            Concept::Cash => &["cash", "cash and cash equivalents", "cash and equivalents"],
            Concept::Inventory => &["inventory", "inventories"],
        }
    }

    /// Tokens that disqualify a label even when it contains an alias, e.g. "cost" keeps
    /// "Cost of Revenue" from resolving to revenue.
    fn excluded_tokens(&self) -> &'static [&'static str] {
        match self {
            Concept::Revenue => &[
                "cost",
                "costs",
                "deferred",
                "unearned",
                "receivable",
                "tax",
                "taxes",
                "expense",
                "expenses",
                "marketing",
                "commission",
                "commissions",
                "returns",
                "discounts",
            ],
            Concept::OperatingIncome => &["non", "expense", "expenses"],
            Concept::NetIncome => &["before", "comprehensive", "per", "share"],
            Concept::TotalAssets => &["current", "non", "noncurrent"],
            Concept::TotalLiabilities => &["current", "non", "noncurrent", "equity"],
            Concept::TotalEquity => &["liabilities", "debt"],
            Concept::CurrentAssets | Concept::CurrentLiabilities => {
                &["non", "noncurrent", "other"]
            }
            Concept::Cash => &["flow", "flows", "restricted", "paid", "used", "provided"],
            Concept::Inventory => &["change", "changes"],
            Concept::Cogs | Concept::GrossProfit | Concept::Ebitda => &[],
        }
    }
}

impl std::fmt::Display for Concept {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    TokenOverlap,
    Substring,
    Exact,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MatchScore {
    pub tier: MatchTier,
    pub similarity: f64,
}

impl MatchScore {
    fn cmp_strength(&self, other: &MatchScore) -> Ordering {
        self.tier
            .cmp(&other.tier)
            .then_with(|| self.similarity.total_cmp(&other.similarity))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Resolution {
    pub concept: Concept,
    pub label: String,
    pub score: MatchScore,
}

/// Scores one raw label against a concept. `None` when no alias clears any tier.
pub fn score_label(concept: Concept, raw_label: &str, threshold: f64) -> Option<MatchScore> {
    let normalized = normalize_label(raw_label);
    let tokens = label_tokens(&normalized);
    if tokens.is_empty() {
        return None;
    }

    if tokens
        .iter()
        .any(|t| DERIVED_TOKENS.contains(t) || concept.excluded_tokens().contains(t))
    {
        return None;
    }

    if tokens.iter().all(|t| GENERIC_TOKENS.contains(t)) {
        return None;
    }

    // A label that is verbatim another concept's phrasing belongs to that concept.
    let own_alias = concept.aliases().contains(&normalized.as_str());
    let other_alias = Concept::ALL
        .iter()
        .any(|other| *other != concept && other.aliases().contains(&normalized.as_str()));
    if other_alias && !own_alias {
        return None;
    }

    concept
        .aliases()
        .iter()
        .filter_map(|alias| {
            let alias_tokens = label_tokens(alias);
            let similarity = token_overlap(&tokens, &alias_tokens);

            if normalized == *alias {
                Some(MatchScore {
                    tier: MatchTier::Exact,
                    similarity: 1.0,
                })
            } else if contains_phrase(&normalized, alias) || contains_phrase(alias, &normalized) {
                Some(MatchScore {
                    tier: MatchTier::Substring,
                    similarity,
                })
            } else if similarity > threshold {
                Some(MatchScore {
                    tier: MatchTier::TokenOverlap,
                    similarity,
                })
            } else {
                None
            }
        })
        .max_by(|a, b| a.cmp_strength(b))
}

pub fn rank_candidates(concept: Concept, labels: &[&str], threshold: f64) -> Vec<Resolution> {
    let mut scored: Vec<(usize, Resolution)> = labels
        .iter()
        .enumerate()
        .filter_map(|(order, label)| {
            score_label(concept, label, threshold).map(|score| {
                (
                    order,
                    Resolution {
                        concept,
                        label: label.to_string(),
                        score,
                    },
                )
            })
        })
        .collect();

    scored.sort_by(|(order_a, a), (order_b, b)| {
        b.score
            .cmp_strength(&a.score)
            .then_with(|| a.label.chars().count().cmp(&b.label.chars().count()))
            .then_with(|| order_a.cmp(order_b))
    });

    scored.into_iter().map(|(_, resolution)| resolution).collect()
}

/// Best label for `concept` among `labels`, or `None` when nothing clears the threshold.
pub fn resolve_concept(concept: Concept, labels: &[&str], threshold: f64) -> Option<Resolution> {
    rank_candidates(concept, labels, threshold).into_iter().next()
}

pub fn best_concept(raw_label: &str, threshold: f64) -> Option<Concept> {
    Concept::ALL
        .iter()
        .filter_map(|concept| score_label(*concept, raw_label, threshold).map(|s| (*concept, s)))
        .max_by(|(ca, a), (cb, b)| a.cmp_strength(b).then_with(|| cb.cmp(ca)))
        .map(|(concept, _)| concept)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineItemIndex {
    entries: BTreeMap<Concept, Vec<Resolution>>,
}

impl LineItemIndex {
    pub fn build(dataset: &Dataset, config: &AnalysisConfig) -> Self {
        let labels = dataset.line_items();
        let mut entries = BTreeMap::new();

        for concept in Concept::ALL {
            let ranked = rank_candidates(concept, &labels, config.match_threshold);
            let Some(best) = ranked.first() else {
                debug!("Concept '{}' unresolved", concept);
                continue;
            };

            debug!(
                "Concept '{}' resolved to '{}' ({:?}, {:.2})",
                concept, best.label, best.score.tier, best.score.similarity
            );

            // Only respellings of the primary label may stand in for it.
            let primary = normalize_label(&best.label);
            let kept: Vec<Resolution> = ranked
                .into_iter()
                .filter(|r| normalize_label(&r.label) == primary)
                .collect();
            entries.insert(concept, kept);
        }

        Self { entries }
    }

    pub fn resolve(&self, concept: Concept) -> Option<&str> {
        self.entries
            .get(&concept)
            .and_then(|candidates| candidates.first())
            .map(|r| r.label.as_str())
    }

    pub fn candidates(&self, concept: Concept) -> &[Resolution] {
        self.entries
            .get(&concept)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Value of `concept` in `period` from the resolved label or a respelling of it.
    pub fn value(&self, dataset: &Dataset, concept: Concept, period: &str) -> Option<f64> {
        self.candidates(concept)
            .iter()
            .find_map(|r| dataset.amount(period, &r.label))
    }

    pub fn resolved(&self) -> BTreeMap<Concept, String> {
        self.entries
            .iter()
            .filter_map(|(concept, candidates)| {
                candidates.first().map(|r| (*concept, r.label.clone()))
            })
            .collect()
    }

    pub fn unresolved(&self) -> Vec<Concept> {
        Concept::ALL
            .into_iter()
            .filter(|c| !self.entries.contains_key(c))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DuplicatePolicy;
    use crate::schema::CanonicalRecord;

    const THRESHOLD: f64 = 0.5;

    #[test]
    fn test_inconsistent_spellings_resolve_to_revenue() {
        assert_eq!(best_concept("Total Revenue", THRESHOLD), Some(Concept::Revenue));
        assert_eq!(best_concept("total revenue ", THRESHOLD), Some(Concept::Revenue));
        assert_eq!(
            resolve_concept(Concept::Revenue, &["Gizmo Widgets"], THRESHOLD),
            None
        );
        assert_eq!(best_concept("Gizmo Widgets", THRESHOLD), None);
    }

    #[test]
    fn test_exact_beats_substring_and_shortest_breaks_ties() {
        let labels = ["Revenue from Services", "total revenue ", "Total Revenue"];
        let ranked = rank_candidates(Concept::Revenue, &labels, THRESHOLD);

        assert_eq!(ranked[0].label, "Total Revenue");
        assert_eq!(ranked[0].score.tier, MatchTier::Exact);
        assert_eq!(ranked[1].label, "total revenue ");
        assert_eq!(ranked[2].score.tier, MatchTier::Substring);
    }

    #[test]
    fn test_exclusions_prevent_false_matches() {
        assert!(score_label(Concept::Revenue, "Cost of Revenue", THRESHOLD).is_none());
        assert!(score_label(Concept::Revenue, "Deferred Revenue", THRESHOLD).is_none());
        assert!(score_label(Concept::TotalAssets, "Total Current Assets", THRESHOLD).is_none());
        assert!(score_label(Concept::Cash, "Cash Flow from Operations", THRESHOLD).is_none());
        assert!(score_label(Concept::Revenue, "Revenue Growth %", THRESHOLD).is_none());
        assert!(score_label(Concept::Cogs, "Sales", THRESHOLD).is_none());
        assert_eq!(
            best_concept("Cost of Revenue", THRESHOLD),
            Some(Concept::Cogs)
        );
        assert_eq!(
            best_concept("Total Current Assets", THRESHOLD),
            Some(Concept::CurrentAssets)
        );
    }

    #[test]
    fn test_token_overlap_tier() {
        let score = score_label(Concept::Cogs, "Goods Sold Cost", THRESHOLD).unwrap();
        assert_eq!(score.tier, MatchTier::TokenOverlap);
        assert!(score.similarity > THRESHOLD);

        // half of the tokens shared is not enough
        assert!(score_label(Concept::Cogs, "Goods Cost Freight Duty", THRESHOLD).is_none());
        let score = score_label(Concept::Cogs, "Goods Cost Freight Duty", 0.4).unwrap();
        assert_eq!(score.tier, MatchTier::TokenOverlap);
        assert_eq!(score.similarity, 0.5);

        assert!(score_label(Concept::NetIncome, "Operating Income", THRESHOLD).is_none());
    }

    #[test]
    fn test_generic_label_does_not_match() {
        assert!(score_label(Concept::Revenue, "Net", THRESHOLD).is_none());
        assert!(score_label(Concept::TotalAssets, "Total", THRESHOLD).is_none());
    }

    #[test]
    fn test_index_falls_back_to_respelled_label() {
        let dataset = Dataset::from_records(
            vec![
                CanonicalRecord::new("Q1", "IS", "Total Revenue", 100.0),
                CanonicalRecord::new("Q2", "IS", "total revenue ", 150.0),
                CanonicalRecord::new("Q1", "IS", "Gizmo Widgets", 5.0),
            ],
            DuplicatePolicy::Sum,
        );
        let index = LineItemIndex::build(&dataset, &AnalysisConfig::default());

        assert_eq!(index.resolve(Concept::Revenue), Some("Total Revenue"));
        assert_eq!(index.value(&dataset, Concept::Revenue, "Q1"), Some(100.0));
        assert_eq!(index.value(&dataset, Concept::Revenue, "Q2"), Some(150.0));
        assert!(index.unresolved().contains(&Concept::Cogs));
        assert_eq!(index.resolved().len(), 1);
    }

    #[test]
    fn test_index_does_not_substitute_a_different_line_item() {
        let dataset = Dataset::from_records(
            vec![
                CanonicalRecord::new("Q1", "IS", "Product Revenue", 100.0),
                CanonicalRecord::new("Q2", "IS", "Service Revenue", 5.0),
            ],
            DuplicatePolicy::Sum,
        );
        let index = LineItemIndex::build(&dataset, &AnalysisConfig::default());

        assert_eq!(index.resolve(Concept::Revenue), Some("Product Revenue"));
        assert_eq!(index.candidates(Concept::Revenue).len(), 1);
        assert_eq!(index.value(&dataset, Concept::Revenue, "Q1"), Some(100.0));
        assert_eq!(index.value(&dataset, Concept::Revenue, "Q2"), None);
    }

    #[test]
    fn test_expense_and_tax_lines_are_not_revenue() {
        for label in [
            "Sales Tax",
            "Sales & Marketing",
            "Sales Commissions",
            "Sales Returns",
            "Revenue Taxes",
            "Selling Expenses",
        ] {
            assert!(
                score_label(Concept::Revenue, label, THRESHOLD).is_none(),
                "{} should not resolve to revenue",
                label
            );
        }

        let labels = ["Product Revenues", "Sales Tax"];
        let best = resolve_concept(Concept::Revenue, &labels, THRESHOLD).unwrap();
        assert_eq!(best.label, "Product Revenues");
    }
}
