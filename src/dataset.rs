use crate::config::DuplicatePolicy;
use crate::error::{FinancialAnalysisError, Result};
use crate::schema::{CanonicalRecord, DatasetSummary, PeriodTotal};
use crate::utils::round2;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub period_index: usize,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series<'a> {
    pub category: &'a str,
    pub line_item: &'a str,
    pub observations: Vec<Observation>,
}

/// Periods are ordered by first appearance in the records, which in turn follows the
/// row order of long tables and the column order of wide tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    records: Vec<CanonicalRecord>,
    periods: Vec<String>,
}

impl Dataset {
    /// Builds a dataset from records in insertion order. Colliding keys are merged
    /// with `policy`; the merged record keeps the position of the first occurrence.
    pub fn from_records(records: Vec<CanonicalRecord>, policy: DuplicatePolicy) -> Self {
        let (records, _) = merge_duplicates(records, policy);

        let mut periods: Vec<String> = Vec::new();
        for record in &records {
            if !periods.contains(&record.period) {
                periods.push(record.period.clone());
            }
        }

        Self { records, periods }
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<CanonicalRecord> {
        self.records
    }

    pub fn periods(&self) -> &[String] {
        &self.periods
    }

    pub fn period_index(&self, period: &str) -> Option<usize> {
        self.periods.iter().position(|p| p == period)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> = Vec::new();
        for record in &self.records {
            let category = record.category.as_str();
            if !category.trim().is_empty() && !categories.contains(&category) {
                categories.push(category);
            }
        }
        categories
    }

    pub fn line_items(&self) -> Vec<&str> {
        let mut items: Vec<&str> = Vec::new();
        for record in &self.records {
            let item = record.line_item.as_str();
            if !items.contains(&item) {
                items.push(item);
            }
        }
        items
    }

    /// Amount of `line_item` in `period`. When the label appears under several
    /// categories the first-seen record wins.
    pub fn amount(&self, period: &str, line_item: &str) -> Option<f64> {
        self.records
            .iter()
            .find(|r| r.period == period && r.line_item == line_item)
            .map(|r| r.amount)
    }

    /// Records matching every given filter, in record order. Period matches exactly,
    /// category ignores case, and the keyword is a case-insensitive substring of the
    /// line item.
    pub fn query(
        &self,
        period: Option<&str>,
        category: Option<&str>,
        item_keyword: Option<&str>,
    ) -> Vec<&CanonicalRecord> {
        let period = period.map(str::trim);
        let category = category.map(|c| c.trim().to_lowercase());
        let keyword = item_keyword.map(|k| k.trim().to_lowercase());

        self.records
            .iter()
            .filter(|r| period.map_or(true, |p| r.period == p))
            .filter(|r| {
                category
                    .as_deref()
                    .map_or(true, |c| r.category.to_lowercase() == c)
            })
            .filter(|r| {
                keyword
                    .as_deref()
                    .map_or(true, |k| r.line_item.to_lowercase().contains(k))
            })
            .collect()
    }

    pub fn series(&self) -> Vec<Series<'_>> {
        let mut order: Vec<(&str, &str)> = Vec::new();
        let mut grouped: HashMap<(&str, &str), Vec<Observation>> = HashMap::new();

        for record in &self.records {
            let key = (record.category.as_str(), record.line_item.as_str());
            let Some(period_index) = self.period_index(&record.period) else {
                continue;
            };

            grouped
                .entry(key)
                .or_insert_with(|| {
                    order.push(key);
                    Vec::new()
                })
                .push(Observation {
                    period_index,
                    amount: record.amount,
                });
        }

        order
            .into_iter()
            .map(|(category, line_item)| {
                let mut observations = grouped.remove(&(category, line_item)).unwrap_or_default();
                observations.sort_by_key(|o| o.period_index);
                Series {
                    category,
                    line_item,
                    observations,
                }
            })
            .collect()
    }

    pub fn summary(&self) -> DatasetSummary {
        let total_by_period = self
            .periods
            .iter()
            .map(|period| PeriodTotal {
                period: period.clone(),
                total: round2(
                    self.records
                        .iter()
                        .filter(|r| r.period == *period)
                        .map(|r| r.amount)
                        .sum(),
                ),
            })
            .collect();

        DatasetSummary {
            periods: self.periods.clone(),
            categories: self.categories().into_iter().map(str::to_string).collect(),
            line_item_count: self.line_items().len(),
            record_count: self.records.len(),
            total_by_period,
        }
    }
}

/// Collapses records sharing a `(period, category, line_item)` key.
/// Returns the merged records and, for each collision, the index in the input of the
/// record that was folded into an earlier one.
pub fn merge_duplicates(
    records: Vec<CanonicalRecord>,
    policy: DuplicatePolicy,
) -> (Vec<CanonicalRecord>, Vec<usize>) {
    let mut merged: Vec<CanonicalRecord> = Vec::with_capacity(records.len());
    let mut positions: HashMap<(String, String, String), usize> = HashMap::new();
    let mut collisions = Vec::new();

    for (idx, record) in records.into_iter().enumerate() {
        let key = (
            record.period.clone(),
            record.category.clone(),
            record.line_item.clone(),
        );

        match positions.get(&key) {
            Some(&pos) => {
                let existing = &mut merged[pos];
                match policy {
                    DuplicatePolicy::Sum => existing.amount += record.amount,
                    DuplicatePolicy::LastWins => existing.amount = record.amount,
                }
                collisions.push(idx);
            }
            None => {
                positions.insert(key, merged.len());
                merged.push(record);
            }
        }
    }

    (merged, collisions)
}

/// Dataset-scoped record retrieval supplied by the hosting layer.
pub trait RecordSource {
    fn fetch_records(&self, dataset_id: &str) -> Result<Vec<CanonicalRecord>>;
}

/// Process-local record store. Datasets are write-once: storing under an existing id
/// is rejected, so a re-upload always creates a new dataset.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    datasets: BTreeMap<String, Vec<CanonicalRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        dataset_id: impl Into<String>,
        records: Vec<CanonicalRecord>,
    ) -> Result<()> {
        let dataset_id = dataset_id.into();
        if self.datasets.contains_key(&dataset_id) {
            return Err(FinancialAnalysisError::DatasetExists(dataset_id));
        }
        self.datasets.insert(dataset_id, records);
        Ok(())
    }

    pub fn dataset_ids(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }
}

impl RecordSource for InMemoryRecordStore {
    fn fetch_records(&self, dataset_id: &str) -> Result<Vec<CanonicalRecord>> {
        self.datasets
            .get(dataset_id)
            .cloned()
            .ok_or_else(|| FinancialAnalysisError::DatasetNotFound(dataset_id.to_string()))
    }
}
