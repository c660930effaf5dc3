use crate::config::AnalysisConfig;
use crate::dataset::merge_duplicates;
use crate::error::Result;
use crate::layout::{plan_layout, LayoutPlan};
use crate::schema::{CanonicalRecord, Layout, ParseWarning, RawTable, WarningKind};
use log::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTable {
    pub layout: Layout,
    pub records: Vec<CanonicalRecord>,
    pub warnings: Vec<ParseWarning>,
}

/// Converts raw tables into canonical records.
///
/// Never invents amounts: empty or unparseable cells produce no record, only a warning
/// where the cell was expected to hold a value.
pub struct Normalizer<'a> {
    config: &'a AnalysisConfig,
}

// Tracks where a record came from so duplicate merges can be reported per cell.
struct Emitted {
    record: CanonicalRecord,
    row: usize,
    column: String,
}

impl<'a> Normalizer<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn normalize(&self, table: &RawTable) -> Result<NormalizedTable> {
        let plan = plan_layout(table)?;
        let layout = plan.layout();

        let mut warnings: Vec<ParseWarning> = plan
            .ignored_columns()
            .iter()
            .map(|&col| ParseWarning {
                row: None,
                column: Some(table.columns[col].clone()),
                kind: WarningKind::IgnoredColumn,
                message: format!(
                    "Column '{}' does not map to a period, category, line item or amount",
                    table.columns[col]
                ),
            })
            .collect();

        let emitted = match &plan {
            LayoutPlan::Long {
                period,
                category,
                line_item,
                amount,
                ..
            } => self.normalize_long(
                table,
                *period,
                *category,
                *line_item,
                *amount,
                &mut warnings,
            ),
            LayoutPlan::Wide {
                label,
                category,
                periods,
                ..
            } => self.normalize_wide(table, *label, *category, periods, &mut warnings),
        };

        let origins: Vec<(usize, String)> = emitted
            .iter()
            .map(|e| (e.row, e.column.clone()))
            .collect();
        let (records, collisions) = merge_duplicates(
            emitted.into_iter().map(|e| e.record).collect(),
            self.config.duplicate_policy,
        );

        for idx in collisions {
            let (row, column) = &origins[idx];
            warnings.push(ParseWarning {
                row: Some(*row),
                column: Some(column.clone()),
                kind: WarningKind::DuplicateCell,
                message: format!(
                    "Duplicate period/category/line item cell merged using {:?} policy",
                    self.config.duplicate_policy
                ),
            });
        }

        info!(
            "Normalized {:?} table: {} rows -> {} records ({} warnings)",
            layout,
            table.row_count(),
            records.len(),
            warnings.len()
        );

        Ok(NormalizedTable {
            layout,
            records,
            warnings,
        })
    }

    fn normalize_long(
        &self,
        table: &RawTable,
        period_col: usize,
        category_col: Option<usize>,
        item_col: usize,
        amount_col: usize,
        warnings: &mut Vec<ParseWarning>,
    ) -> Vec<Emitted> {
        let mut emitted = Vec::new();

        for row in 0..table.row_count() {
            if table.rows[row].iter().all(|c| c.is_empty()) {
                continue;
            }

            let Some(period) = table.cell(row, period_col).as_label() else {
                warnings.push(missing_field(row, &table.columns[period_col], "period"));
                continue;
            };
            let Some(line_item) = table.cell(row, item_col).as_label() else {
                warnings.push(missing_field(row, &table.columns[item_col], "line item"));
                continue;
            };

            let amount_cell = table.cell(row, amount_col);
            if amount_cell.is_empty() {
                warnings.push(missing_field(row, &table.columns[amount_col], "amount"));
                continue;
            }
            let Some(amount) = amount_cell.as_amount() else {
                warnings.push(unparseable(row, &table.columns[amount_col], amount_cell));
                continue;
            };

            let category = category_col
                .and_then(|col| table.cell(row, col).as_label())
                .unwrap_or_else(|| self.config.default_category.clone());

            emitted.push(Emitted {
                record: CanonicalRecord {
                    period,
                    category,
                    line_item,
                    amount,
                },
                row,
                column: table.columns[amount_col].clone(),
            });
        }

        emitted
    }

    fn normalize_wide(
        &self,
        table: &RawTable,
        label_col: usize,
        category_col: Option<usize>,
        period_cols: &[usize],
        warnings: &mut Vec<ParseWarning>,
    ) -> Vec<Emitted> {
        let mut emitted = Vec::new();
        let mut section: Option<String> = None;
        let mut defaulted_rows = 0usize;

        for row in 0..table.row_count() {
            let has_values = period_cols
                .iter()
                .any(|&col| !table.cell(row, col).is_empty());

            let Some(label) = table.cell(row, label_col).as_label() else {
                if has_values {
                    warnings.push(missing_field(row, &table.columns[label_col], "line item"));
                }
                continue;
            };

            let explicit_category = category_col.and_then(|col| table.cell(row, col).as_label());

            if !has_values {
                if explicit_category.is_none() {
                    debug!("Row {} '{}' treated as section header", row, label);
                    section = Some(label);
                }
                continue;
            }

            let category = match explicit_category.or_else(|| section.clone()) {
                Some(category) => category,
                None => {
                    defaulted_rows += 1;
                    self.config.default_category.clone()
                }
            };

            for &col in period_cols {
                let cell = table.cell(row, col);
                if cell.is_empty() {
                    continue;
                }
                match cell.as_amount() {
                    Some(amount) => emitted.push(Emitted {
                        record: CanonicalRecord {
                            period: table.columns[col].trim().to_string(),
                            category: category.clone(),
                            line_item: label.clone(),
                            amount,
                        },
                        row,
                        column: table.columns[col].clone(),
                    }),
                    None => warnings.push(unparseable(row, &table.columns[col], cell)),
                }
            }
        }

        if defaulted_rows > 0 {
            warnings.push(ParseWarning {
                row: None,
                column: None,
                kind: WarningKind::CategoryDefaulted,
                message: format!(
                    "{} line item row(s) have no section header; category set to '{}'",
                    defaulted_rows, self.config.default_category
                ),
            });
        }

        emitted
    }
}

fn missing_field(row: usize, column: &str, what: &str) -> ParseWarning {
    ParseWarning {
        row: Some(row),
        column: Some(column.to_string()),
        kind: WarningKind::MissingField,
        message: format!("Row {} skipped: missing {}", row, what),
    }
}

fn unparseable(row: usize, column: &str, cell: &crate::schema::CellValue) -> ParseWarning {
    ParseWarning {
        row: Some(row),
        column: Some(column.to_string()),
        kind: WarningKind::UnparseableAmount,
        message: format!("Cell {:?} in row {} is not a number", cell, row),
    }
}

#[cfg(feature = "csv")]
impl RawTable {
    /// Decodes CSV with a header row. Every non-empty field becomes a text cell; the
    /// normalizer applies amount coercion later.
    pub fn from_csv_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        use crate::schema::CellValue;

        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let columns: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
        let mut table = RawTable::new(columns);

        for record in csv_reader.records() {
            let record = record?;
            table.push_row(record.iter().map(CellValue::from));
        }

        Ok(table)
    }
}
