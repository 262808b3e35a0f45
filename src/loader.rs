use calamine::{Reader, Sheets, open_workbook_auto_from_rs};
use log::{debug, info};
use std::fs;
use std::io::Cursor;
use std::path::Path;

use crate::error::{Result, SheetError};
use crate::table::{CellValue, Table};

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const XLS_MIME: &str = "application/vnd.ms-excel";
const CSV_SHEET_NAME: &str = "Sheet1";

/// Upload formats the tools accept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    Xlsx,
    Xls,
    Csv,
}

impl FileKind {
    /// Decide the format from the file name, falling back to the MIME type a
    /// browser sent along with a dropped file.
    ///
    /// # Examples
    /// ```
    /// use sheetdesk::loader::FileKind;
    ///
    /// assert_eq!(FileKind::detect("points.XLSX", None).unwrap(), FileKind::Xlsx);
    /// assert!(FileKind::detect("notes.txt", Some("text/plain")).is_err());
    /// ```
    pub fn detect(file_name: &str, content_type: Option<&str>) -> Result<Self> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());

        match extension.as_deref() {
            Some("xlsx") => return Ok(FileKind::Xlsx),
            Some("xls") => return Ok(FileKind::Xls),
            Some("csv") => return Ok(FileKind::Csv),
            _ => {}
        }

        match content_type {
            Some(XLSX_MIME) => Ok(FileKind::Xlsx),
            Some(XLS_MIME) => Ok(FileKind::Xls),
            Some("text/csv") => Ok(FileKind::Csv),
            _ => Err(SheetError::UnsupportedFileType(file_name.to_string())),
        }
    }
}

/// Where the header row sits in an uploaded sheet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum HeaderLayout {
    /// Row 1 holds the headers.
    #[default]
    FirstRow,
    /// Two description rows, then the header row.
    Preamble,
}

impl HeaderLayout {
    fn description_rows(self) -> usize {
        match self {
            HeaderLayout::FirstRow => 0,
            HeaderLayout::Preamble => 2,
        }
    }
}

/// Read every sheet of an uploaded file.
pub fn read_workbook(bytes: &[u8], kind: FileKind, layout: HeaderLayout) -> Result<Vec<Table>> {
    let tables = match kind {
        FileKind::Csv => {
            let text = String::from_utf8_lossy(bytes);
            let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
            vec![from_csv_text(CSV_SHEET_NAME, text, layout)]
        }
        FileKind::Xlsx | FileKind::Xls => from_excel_bytes(bytes, layout)?,
    };

    info!(
        "loaded {} sheet(s): {}",
        tables.len(),
        tables
            .iter()
            .map(|t| format!("{} ({} rows)", t.name, t.rows.len()))
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(tables)
}

/// Read a file from disk, detecting its format from the extension.
pub fn load_workbook(path: impl AsRef<Path>, layout: HeaderLayout) -> Result<Vec<Table>> {
    let path = path.as_ref();
    let kind = FileKind::detect(&path.to_string_lossy(), None)?;
    let bytes = fs::read(path)?;
    read_workbook(&bytes, kind, layout)
}

/// The first sheet of an upload, which must carry at least one data row.
pub fn first_sheet(tables: Vec<Table>) -> Result<Table> {
    let table = tables.into_iter().next().ok_or(SheetError::EmptyUpload)?;
    if table.is_empty() {
        return Err(SheetError::EmptyUpload);
    }
    Ok(table)
}

fn from_excel_bytes(bytes: &[u8], layout: HeaderLayout) -> Result<Vec<Table>> {
    let mut workbook: Sheets<_> = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

    let mut tables = Vec::new();
    for sheet_name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&sheet_name)?;
        let raw: Vec<Vec<CellValue>> = range
            .rows()
            .map(|row| row.iter().cloned().map(CellValue::from).collect())
            .collect();
        debug!("sheet {} has {} raw rows", sheet_name, raw.len());
        tables.push(build_table(sheet_name, raw, layout));
    }

    Ok(tables)
}

fn from_csv_text(name: &str, text: &str, layout: HeaderLayout) -> Table {
    let raw = parse_csv(text)
        .into_iter()
        .map(|record| record.iter().map(|field| csv_cell(field)).collect())
        .collect();
    build_table(name.to_string(), raw, layout)
}

/// CSV fields stay text; IDs such as `007` keep their leading zeros and
/// point columns are parsed as decimals later on.
fn csv_cell(field: &str) -> CellValue {
    if field.is_empty() {
        CellValue::Empty
    } else {
        CellValue::Text(field.to_string())
    }
}

/// Turn raw sheet rows into a table: pick the header row per `layout`, drop
/// columns without a header and rows without any value.
fn build_table(name: String, raw: Vec<Vec<CellValue>>, layout: HeaderLayout) -> Table {
    let mut rows = raw.into_iter().skip(layout.description_rows());

    let header_cells = rows.next().unwrap_or_default();
    let columns: Vec<(usize, String)> = header_cells
        .iter()
        .enumerate()
        .map(|(index, cell)| (index, cell.to_string().trim().to_string()))
        .filter(|(_, header)| !header.is_empty())
        .collect();

    let mut table = Table::new(name, columns.iter().map(|(_, h)| h.clone()).collect());
    for row in rows {
        let cells: Vec<CellValue> = columns
            .iter()
            .map(|(index, _)| row.get(*index).cloned().unwrap_or_default())
            .collect();
        if cells.iter().all(CellValue::is_empty) {
            continue;
        }
        table.push_row(cells);
    }
    table
}

// Parse CSV text into records of fields. Only a line break outside quotes
// ends a record, so quoted cells may span lines.
fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut current_field = String::new();
    let mut in_quotes = false;
    let mut started = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    // Double quote inside quoted field - add a single quote
                    current_field.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
                started = true;
            }
            ',' if !in_quotes => {
                record.push(std::mem::take(&mut current_field));
                started = true;
            }
            '\r' | '\n' if !in_quotes => {
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                record.push(std::mem::take(&mut current_field));
                records.push(std::mem::take(&mut record));
                started = false;
            }
            _ => {
                current_field.push(c);
                started = true;
            }
        }
    }

    // Add the last record when the text does not end with a line break
    if started {
        record.push(current_field);
        records.push(record);
    }
    records
}
