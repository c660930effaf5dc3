use crate::anomalies::AnomalyReport;
use crate::comparison::PeriodComparison;
use crate::ratios::RatioReport;
use crate::resolver::Concept;
use crate::trends::TrendReport;
use crate::utils::{format_number_label, parse_amount};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

static EMPTY_CELL: CellValue = CellValue::Empty;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Empty,
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }

    /// The cell as a trimmed label. Numbers are rendered without a trailing `.0`
    /// so a `2023` header cell becomes the period `"2023"`.
    pub fn as_label(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(text) => {
                let trimmed = text.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            CellValue::Number(n) if n.is_finite() => Some(format_number_label(*n)),
            CellValue::Number(_) => None,
        }
    }

    pub fn as_amount(&self) -> Option<f64> {
        match self {
            CellValue::Empty => None,
            CellValue::Number(n) => n.is_finite().then_some(*n),
            CellValue::Text(text) => parse_amount(text),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value.to_string())
        }
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        if value.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value)
        }
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Empty)
    }
}

/// A decoded table: ordered, named columns and rows of cells aligned with them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl RawTable {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row<C: Into<CellValue>>(&mut self, row: impl IntoIterator<Item = C>) {
        self.rows.push(row.into_iter().map(Into::into).collect());
    }

    pub fn with_row<C: Into<CellValue>>(mut self, row: impl IntoIterator<Item = C>) -> Self {
        self.push_row(row);
        self
    }

    /// Builds a table from rows given as column-name/value mappings. Column order is the
    /// order in which names are first seen; missing cells are empty.
    pub fn from_mapped_rows(rows: Vec<Vec<(String, CellValue)>>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for (name, _) in row {
                if !columns.contains(name) {
                    columns.push(name.clone());
                }
            }
        }

        let rows = rows
            .into_iter()
            .map(|row| {
                let mut cells = vec![CellValue::Empty; columns.len()];
                for (name, value) in row {
                    if let Some(idx) = columns.iter().position(|c| *c == name) {
                        cells[idx] = value;
                    }
                }
                cells
            })
            .collect();

        Self { columns, rows }
    }

    pub fn cell(&self, row: usize, column: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .unwrap_or(&EMPTY_CELL)
    }

    pub fn column_cells(&self, column: usize) -> impl Iterator<Item = &CellValue> + '_ {
        (0..self.rows.len()).map(move |row| self.cell(row, column))
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    #[schemars(description = "Line items as rows, periods as columns.")]
    Wide,

    #[schemars(description = "One row per fact with explicit period, category, line item and amount columns.")]
    Long,
}

/// A normalized fact. `(period, category, line_item)` is unique within a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CanonicalRecord {
    pub period: String,
    pub category: String,
    pub line_item: String,
    pub amount: f64,
}

impl CanonicalRecord {
    pub fn new(
        period: impl Into<String>,
        category: impl Into<String>,
        line_item: impl Into<String>,
        amount: f64,
    ) -> Self {
        Self {
            period: period.into(),
            category: category.into(),
            line_item: line_item.into(),
            amount,
        }
    }

    pub fn key(&self) -> (&str, &str, &str) {
        (&self.period, &self.category, &self.line_item)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    UnparseableAmount,
    MissingField,
    DuplicateCell,
    CategoryDefaulted,
    IgnoredColumn,
}

/// Non-fatal normalization issue. `row` is the 0-based index into the table's rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ParseWarning {
    pub row: Option<usize>,
    pub column: Option<String>,
    pub kind: WarningKind,
    pub message: String,
}

/// Why a computation was skipped. Carried inside results, never raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum InsufficientData {
    UnresolvedConcepts { concepts: Vec<Concept> },
    MissingValues { concepts: Vec<Concept> },
    ZeroDenominator,
    NotEnoughPeriods { required: usize, available: usize },
    ConstantSeries,
}

impl std::fmt::Display for InsufficientData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = |concepts: &[Concept]| {
            concepts
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        match self {
            InsufficientData::UnresolvedConcepts { concepts } => {
                write!(f, "no line item matches {}", names(concepts))
            }
            InsufficientData::MissingValues { concepts } => {
                write!(f, "no value for {} in this period", names(concepts))
            }
            InsufficientData::ZeroDenominator => write!(f, "denominator is zero"),
            InsufficientData::NotEnoughPeriods {
                required,
                available,
            } => write!(f, "needs {} periods, found {}", required, available),
            InsufficientData::ConstantSeries => write!(f, "series is constant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Section<T> {
    Complete { data: T },
    InsufficientData { reason: InsufficientData },
    Failed { error: String },
}

impl<T> Section<T> {
    pub fn data(&self) -> Option<&T> {
        match self {
            Section::Complete { data } => Some(data),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Section::Complete { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PeriodTotal {
    pub period: String,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DatasetSummary {
    #[schemars(description = "Periods in canonical (first-seen) order.")]
    pub periods: Vec<String>,
    pub categories: Vec<String>,
    pub line_item_count: usize,
    pub record_count: usize,
    #[schemars(description = "Sum of all amounts per period, in canonical period order.")]
    pub total_by_period: Vec<PeriodTotal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisArtifact {
    pub summary: DatasetSummary,
    pub ratios: Section<RatioReport>,
    pub trends: Section<TrendReport>,
    pub anomalies: Section<AnomalyReport>,
    pub period_comparison: Section<PeriodComparison>,
}

impl AnalysisArtifact {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AnalysisArtifact)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
