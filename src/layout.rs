use crate::error::{FinancialAnalysisError, Result};
use crate::schema::{Layout, RawTable};
use crate::utils::normalize_header;
use log::debug;

const PERIOD_ALIASES: &[&str] = &[
    "period",
    "date",
    "year",
    "fiscal_period",
    "fiscal_year",
    "quarter",
    "month",
];
const CATEGORY_ALIASES: &[&str] = &["category", "type", "section", "statement", "group"];
const LINE_ITEM_ALIASES: &[&str] = &[
    "line_item",
    "item",
    "label",
    "account",
    "account_name",
    "description",
    "name",
];
const AMOUNT_ALIASES: &[&str] = &["amount", "value", "balance", "amt"];

/// Column roles resolved for a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutPlan {
    Long {
        period: usize,
        category: Option<usize>,
        line_item: usize,
        amount: usize,
        ignored: Vec<usize>,
    },
    Wide {
        label: usize,
        category: Option<usize>,
        periods: Vec<usize>,
        ignored: Vec<usize>,
    },
}

impl LayoutPlan {
    pub fn layout(&self) -> Layout {
        match self {
            LayoutPlan::Long { .. } => Layout::Long,
            LayoutPlan::Wide { .. } => Layout::Wide,
        }
    }

    pub fn ignored_columns(&self) -> &[usize] {
        match self {
            LayoutPlan::Long { ignored, .. } | LayoutPlan::Wide { ignored, .. } => ignored,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Numeric,
    Textual,
    Blank,
}

pub fn detect_layout(table: &RawTable) -> Result<Layout> {
    plan_layout(table).map(|plan| plan.layout())
}

pub fn plan_layout(table: &RawTable) -> Result<LayoutPlan> {
    if table.columns.is_empty() {
        return Err(FinancialAnalysisError::UnrecognizedLayout(
            "table has no columns".to_string(),
        ));
    }

    let headers: Vec<String> = table.columns.iter().map(|c| normalize_header(c)).collect();

    if let Some(plan) = plan_long(&headers) {
        debug!("Detected long layout from headers {:?}", table.columns);
        return Ok(plan);
    }

    if let Some(plan) = plan_wide(table, &headers) {
        debug!("Detected wide layout from headers {:?}", table.columns);
        return Ok(plan);
    }

    Err(FinancialAnalysisError::UnrecognizedLayout(format!(
        "columns {:?} neither name period/line_item/amount fields nor form a label column with at least two numeric period columns",
        table.columns
    )))
}

fn find_alias(headers: &[String], aliases: &[&str], taken: &[usize]) -> Option<usize> {
    aliases.iter().find_map(|alias| {
        headers
            .iter()
            .enumerate()
            .find(|(idx, header)| header.as_str() == *alias && !taken.contains(idx))
            .map(|(idx, _)| idx)
    })
}

fn plan_long(headers: &[String]) -> Option<LayoutPlan> {
    let mut taken = Vec::new();

    let amount = find_alias(headers, AMOUNT_ALIASES, &taken)?;
    taken.push(amount);
    let period = find_alias(headers, PERIOD_ALIASES, &taken)?;
    taken.push(period);
    let line_item = find_alias(headers, LINE_ITEM_ALIASES, &taken)?;
    taken.push(line_item);
    let category = find_alias(headers, CATEGORY_ALIASES, &taken);
    if let Some(idx) = category {
        taken.push(idx);
    }

    let ignored = (0..headers.len()).filter(|i| !taken.contains(i)).collect();

    Some(LayoutPlan::Long {
        period,
        category,
        line_item,
        amount,
        ignored,
    })
}

fn classify_column(table: &RawTable, column: usize) -> ColumnKind {
    let mut non_empty = 0usize;
    let mut numeric = 0usize;

    for cell in table.column_cells(column) {
        if cell.is_empty() {
            continue;
        }
        non_empty += 1;
        if cell.as_amount().is_some() {
            numeric += 1;
        }
    }

    if non_empty == 0 {
        ColumnKind::Blank
    } else if numeric * 2 > non_empty {
        ColumnKind::Numeric
    } else {
        ColumnKind::Textual
    }
}

fn plan_wide(table: &RawTable, headers: &[String]) -> Option<LayoutPlan> {
    let kinds: Vec<ColumnKind> = (0..table.columns.len())
        .map(|col| classify_column(table, col))
        .collect();

    let textual: Vec<usize> = kinds
        .iter()
        .enumerate()
        .filter(|(_, kind)| **kind == ColumnKind::Textual)
        .map(|(idx, _)| idx)
        .collect();

    let is_category = |idx: &usize| CATEGORY_ALIASES.contains(&headers[*idx].as_str());

    let label = textual
        .iter()
        .copied()
        .find(|idx| LINE_ITEM_ALIASES.contains(&headers[*idx].as_str()))
        .or_else(|| textual.iter().copied().find(|idx| !is_category(idx)))
        .or_else(|| textual.first().copied())?;

    let category = textual
        .iter()
        .copied()
        .find(|idx| *idx != label && is_category(idx));

    let periods: Vec<usize> = kinds
        .iter()
        .enumerate()
        .filter(|(idx, kind)| {
            **kind == ColumnKind::Numeric && !table.columns[*idx].trim().is_empty()
        })
        .map(|(idx, _)| idx)
        .collect();

    if periods.len() < 2 {
        return None;
    }

    let ignored = (0..table.columns.len())
        .filter(|idx| *idx != label && Some(*idx) != category && !periods.contains(idx))
        .collect();

    Some(LayoutPlan::Wide {
        label,
        category,
        periods,
        ignored,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CellValue;

    #[test]
    fn test_detects_long_with_aliases_case_insensitively() {
        let table = RawTable::new(["Period", "Category", "Line Item", "Amount"])
            .with_row([
                CellValue::from("Q1"),
                CellValue::from("Income"),
                CellValue::from("Revenue"),
                CellValue::from(100.0),
            ]);
        assert_eq!(detect_layout(&table).unwrap(), Layout::Long);

        let aliased = RawTable::new(["DATE", "Account", "Value", "Notes"]);
        match plan_layout(&aliased).unwrap() {
            LayoutPlan::Long {
                period,
                category,
                line_item,
                amount,
                ignored,
            } => {
                assert_eq!((period, line_item, amount), (0, 1, 2));
                assert_eq!(category, None);
                assert_eq!(ignored, vec![3]);
            }
            other => panic!("expected long plan, got {:?}", other),
        }
    }

    #[test]
    fn test_detects_wide_with_label_and_period_columns() {
        let table = RawTable::new(["Line Item", "Q1 2023", "Q2 2023", "Q3 2023"])
            .with_row([
                CellValue::from("Revenue"),
                CellValue::from("1,000"),
                CellValue::from(1100.0),
                CellValue::from("$1,250"),
            ])
            .with_row([
                CellValue::from("COGS"),
                CellValue::from("(400)"),
                CellValue::Empty,
                CellValue::from(450.0),
            ]);

        match plan_layout(&table).unwrap() {
            LayoutPlan::Wide {
                label,
                category,
                periods,
                ignored,
            } => {
                assert_eq!(label, 0);
                assert_eq!(category, None);
                assert_eq!(periods, vec![1, 2, 3]);
                assert!(ignored.is_empty());
            }
            other => panic!("expected wide plan, got {:?}", other),
        }
    }

    #[test]
    fn test_wide_category_column_is_recognised() {
        let table = RawTable::new(["Section", "Item", "2022", "2023", "Comment"])
            .with_row([
                CellValue::from("Income Statement"),
                CellValue::from("Revenue"),
                CellValue::from(10.0),
                CellValue::from(12.0),
                CellValue::from("audited"),
            ]);

        match plan_layout(&table).unwrap() {
            LayoutPlan::Wide {
                label,
                category,
                periods,
                ignored,
            } => {
                assert_eq!(label, 1);
                assert_eq!(category, Some(0));
                assert_eq!(periods, vec![2, 3]);
                assert_eq!(ignored, vec![4]);
            }
            other => panic!("expected wide plan, got {:?}", other),
        }
    }

    #[test]
    fn test_single_numeric_column_is_unrecognized() {
        let table = RawTable::new(["Item", "2023"])
            .with_row([CellValue::from("Revenue"), CellValue::from(10.0)]);

        assert!(matches!(
            detect_layout(&table),
            Err(FinancialAnalysisError::UnrecognizedLayout(_))
        ));
    }

    #[test]
    fn test_all_numeric_table_is_unrecognized() {
        let table = RawTable::new(["a", "b", "c"]).with_row([1.0, 2.0, 3.0]);
        assert!(detect_layout(&table).is_err());
        assert!(detect_layout(&RawTable::default()).is_err());
    }
}
