use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::separator::{Occurrence, SeparatorKind, clean, scan_cell};
use crate::table::{CellValue, Table};

/// A text cell that contains at least one separator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlaggedCell {
    /// 0-based data row.
    pub row: usize,
    pub column: usize,
    pub header: String,
    pub annotated: String,
    pub occurrences: Vec<Occurrence>,
}

/// A row with at least one flagged cell, as listed in the issue dialog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidRow {
    /// 1-based data row, as shown to users.
    pub row: usize,
    pub first_column: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LintReport {
    pub cells: Vec<FlaggedCell>,
    pub invalid_rows: Vec<InvalidRow>,
    pub issues_by_kind: BTreeMap<SeparatorKind, usize>,
    /// e.g. `"LS: 2, PS: 1"`
    pub summary: String,
}

impl LintReport {
    pub fn is_clean(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Scan every cell of a sheet for LS, PS and VT characters.
///
/// # Arguments
/// * `table` - Sheet to check; header cells are not scanned
///
/// # Returns
/// * `LintReport` - Flagged cells in row-major order, the rows that contain
///   them, per-kind counts and a summary such as `LS: 2, VT: 1`
pub fn lint_table(table: &Table) -> LintReport {
    let mut report = LintReport::default();
    let mut rows_with_issues = BTreeSet::new();

    for (row, cells) in table.rows.iter().enumerate() {
        for (column, value) in cells.iter().enumerate() {
            let result = scan_cell(value);
            if !result.found {
                continue;
            }

            for occurrence in &result.occurrences {
                *report.issues_by_kind.entry(occurrence.kind).or_insert(0) += 1;
            }
            rows_with_issues.insert(row);
            report.cells.push(FlaggedCell {
                row,
                column,
                header: table.headers.get(column).cloned().unwrap_or_default(),
                annotated: result.annotated,
                occurrences: result.occurrences,
            });
        }
    }

    report.invalid_rows = rows_with_issues
        .into_iter()
        .map(|row| InvalidRow {
            row: row + 1,
            first_column: table.cell(row, 0).to_string(),
        })
        .collect();

    report.summary = report
        .issues_by_kind
        .iter()
        .map(|(kind, count)| format!("{}: {}", kind, count))
        .collect::<Vec<_>>()
        .join(", ");

    report
}

/// Copy of `table` with every text cell passed through [`clean`].
pub fn clean_table(table: &Table) -> Table {
    Table {
        name: table.name.clone(),
        headers: table.headers.clone(),
        rows: table
            .rows
            .iter()
            .map(|cells| {
                cells
                    .iter()
                    .map(|value| match value {
                        CellValue::Text(text) => CellValue::Text(clean(text)),
                        other => other.clone(),
                    })
                    .collect()
            })
            .collect(),
    }
}
