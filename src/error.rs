use crate::season::FieldError;
use thiserror::Error;

/// Errors raised while loading, settling, linting or exporting a sheet.
///
/// Every variant blocks a single user action; none of them is fatal to the
/// process.
#[derive(Debug, Error)]
pub enum SheetError {
    #[error("the uploaded sheet has no data rows")]
    EmptyUpload,

    #[error("unsupported file type: {0} (only .xlsx, .xls and .csv are accepted)")]
    UnsupportedFileType(String),

    #[error("season prices are incomplete: {}", join_field_errors(.0))]
    MissingPriceInput(Vec<FieldError>),

    #[error("season {season} has an MBX price of zero")]
    DivisionByZeroPrice { season: u32 },

    #[error("no season prices were supplied")]
    NoSeasonPrices,

    #[error("season {0} is priced more than once")]
    DuplicateSeason(u32),

    #[error("row {row}: {field} is negative")]
    NegativePoints { row: usize, field: String },

    #[error("row {row}: points or MBX amounts are too large to compute")]
    AmountOverflow { row: usize },

    #[error("row {row}: {field} is not a number: {value:?}")]
    InvalidNumber {
        row: usize,
        field: String,
        value: String,
    },

    #[error("failed to read workbook: {0}")]
    Workbook(String),

    #[error("failed to write workbook: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<calamine::Error> for SheetError {
    fn from(err: calamine::Error) -> Self {
        SheetError::Workbook(err.to_string())
    }
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, SheetError>;
