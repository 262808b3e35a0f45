use chrono::{SecondsFormat, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::error::Result;
use crate::linter::clean_table;
use crate::settlement::SettlementOutputRow;
use crate::table::{CellValue, Table};

/// Sheet name used for settlement downloads.
pub const SETTLEMENT_SHEET_NAME: &str = "정산결과";

/// First preamble row of a cleaned export.
pub const PREAMBLE_TITLE: &str = "수정된 파일";

/// Second preamble row of a cleaned export.
pub const PREAMBLE_NOTICE: &str = "해당 파일은 시스템에 의해서 생성된 정보입니다.";

/// Column headers of the settlement export, in order.
pub const SETTLEMENT_COLUMNS: [&str; 13] = [
    "no",
    "creatorId",
    "creatorName",
    "walletAddress",
    "totalPoints",
    "totalMbx",
    "earlyBirdMbx",
    "earlyBirdPoints",
    "incentiveMbx",
    "incentivePoints",
    "seasonMbx",
    "seasonPoints",
    "lastUsedSeason",
];

enum ExportCell<'a> {
    Text(&'a str),
    Number(f64),
}

fn settlement_cells(row: &SettlementOutputRow) -> [ExportCell<'_>; 13] {
    let num = |d: Decimal| ExportCell::Number(d.to_f64().unwrap_or_default());
    [
        ExportCell::Number(row.no as f64),
        ExportCell::Text(&row.creator_id),
        ExportCell::Text(&row.creator_name),
        ExportCell::Text(&row.wallet_address),
        num(row.total_points),
        num(row.total_mbx),
        num(row.early_bird_mbx),
        num(row.early_bird_points),
        num(row.incentive_mbx),
        num(row.incentive_points),
        num(row.season_mbx),
        ExportCell::Text(&row.season_points),
        ExportCell::Number(row.last_used_season as f64),
    ]
}

/// Convert a settlement to XLSX format
///
/// Writes one sheet named [`SETTLEMENT_SHEET_NAME`] with a header row of
/// [`SETTLEMENT_COLUMNS`] followed by one row per creator. Points and MBX
/// amounts are written as numbers so the file can be summed in Excel.
///
/// # Arguments
/// * `rows` - Settlement rows to export
///
/// # Returns
/// * `Result<Vec<u8>>` - XLSX file content as bytes or an error
pub fn settlement_to_xlsx(rows: &[SettlementOutputRow]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name(SETTLEMENT_SHEET_NAME)?;

    for (c, header) in SETTLEMENT_COLUMNS.iter().enumerate() {
        worksheet.write_string(0, c as u16, *header)?;
    }

    for (r, row) in rows.iter().enumerate() {
        let excel_row = (r + 1) as u32;
        for (c, cell) in settlement_cells(row).iter().enumerate() {
            match cell {
                ExportCell::Text(text) => worksheet.write_string(excel_row, c as u16, *text)?,
                ExportCell::Number(n) => worksheet.write_number(excel_row, c as u16, *n)?,
            };
        }
    }

    workbook.push_worksheet(worksheet);
    Ok(workbook.save_to_buffer()?)
}

/// Convert a settlement to CSV format
///
/// Same columns as [`settlement_to_xlsx`]. Fields containing commas, quotes
/// or line breaks are quoted with embedded quotes doubled.
///
/// # Examples
/// ```
/// use sheetdesk::downloader::settlement_to_csv;
///
/// let csv = settlement_to_csv(&[]);
/// assert!(csv.starts_with("no,creatorId,"));
/// ```
pub fn settlement_to_csv(rows: &[SettlementOutputRow]) -> String {
    let mut csv_content = SETTLEMENT_COLUMNS.join(",");
    csv_content.push('\n');

    for row in rows {
        let fields: Vec<String> = vec![
            row.no.to_string(),
            escape_csv(&row.creator_id),
            escape_csv(&row.creator_name),
            escape_csv(&row.wallet_address),
            row.total_points.normalize().to_string(),
            row.total_mbx.to_string(),
            row.early_bird_mbx.to_string(),
            row.early_bird_points.normalize().to_string(),
            row.incentive_mbx.to_string(),
            row.incentive_points.normalize().to_string(),
            row.season_mbx.to_string(),
            escape_csv(&row.season_points),
            row.last_used_season.to_string(),
        ];
        csv_content.push_str(&fields.join(","));
        csv_content.push('\n');
    }

    csv_content
}

/// Export a linted sheet with its separators cleaned.
///
/// The sheet starts with a three-row preamble so it can be uploaded again
/// with the preamble header layout: a title row, a notice row and the header
/// row. Cleaned data rows follow.
pub fn cleaned_to_xlsx(table: &Table) -> Result<Vec<u8>> {
    let cleaned = clean_table(table);

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name(&sheet_name_for(&cleaned.name))?;

    for (c, header) in cleaned.headers.iter().enumerate() {
        let col = c as u16;
        worksheet.write_string(0, col, PREAMBLE_TITLE)?;
        worksheet.write_string(1, col, PREAMBLE_NOTICE)?;
        worksheet.write_string(2, col, header.as_str())?;
    }

    for (r, cells) in cleaned.rows.iter().enumerate() {
        let excel_row = (r + 3) as u32;
        for (c, value) in cells.iter().enumerate() {
            let col = c as u16;
            match value {
                CellValue::Empty => {}
                CellValue::Text(text) => {
                    worksheet.write_string(excel_row, col, text.as_str())?;
                }
                CellValue::Number(n) => {
                    worksheet.write_number(excel_row, col, *n)?;
                }
                CellValue::Bool(b) => {
                    worksheet.write_boolean(excel_row, col, *b)?;
                }
            }
        }
    }

    workbook.push_worksheet(worksheet);
    Ok(workbook.save_to_buffer()?)
}

/// `<prefix>_<UTC timestamp>.<extension>` with `:` and `.` in the timestamp
/// replaced so the name is valid on every filesystem.
pub fn timestamped_file_name(prefix: &str, extension: &str) -> String {
    let stamp = Utc::now()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("{}_{}.{}", prefix, stamp, extension)
}

/// Excel limits sheet names to 31 characters and forbids a few symbols.
fn sheet_name_for(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .take(31)
        .collect();
    let sanitized = sanitized.trim_matches('\'').to_string();
    if sanitized.trim().is_empty() {
        "Sheet1".to_string()
    } else {
        sanitized
    }
}

fn escape_csv(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
