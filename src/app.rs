use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, multipart::MultipartError},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::downloader::{
    SETTLEMENT_SHEET_NAME, cleaned_to_xlsx, settlement_to_xlsx, timestamped_file_name,
};
use crate::error::SheetError;
use crate::linter::{LintReport, lint_table};
use crate::loader::{FileKind, HeaderLayout, first_sheet, read_workbook};
use crate::row::SettlementInputRow;
use crate::season::{
    FieldError, SeasonPriceInput, complete_price_inputs, extract_seasons, resolve_prices,
};
use crate::settlement::{SettlementOutputRow, SettlementSummary, compute_settlement, summarize};
use crate::table::Table;

const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub struct AppState {
    pub config: Config,
}

#[derive(Serialize)]
struct ErrorResponse {
    status: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<FieldError>>,
}

#[derive(Serialize)]
struct SettlementUploadResponse {
    status: String,
    table: Table,
    seasons: Vec<u32>,
}

#[derive(Deserialize)]
struct ComputeRequest {
    table: Table,
    prices: Vec<SeasonPriceInput>,
}

#[derive(Serialize)]
struct ComputeResponse {
    status: String,
    rows: Vec<SettlementOutputRow>,
    summary: SettlementSummary,
}

#[derive(Deserialize)]
struct ExportRequest {
    rows: Vec<SettlementOutputRow>,
}

#[derive(Serialize)]
struct LintedSheet {
    table: Table,
    report: LintReport,
}

#[derive(Serialize)]
struct LintUploadResponse {
    status: String,
    sheets: Vec<LintedSheet>,
}

#[derive(Deserialize)]
struct CleanRequest {
    table: Table,
}

/// A failed request, rendered as `{ "status": "error", "message": ... }`.
pub struct ApiError {
    status: StatusCode,
    message: String,
    errors: Option<Vec<FieldError>>,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            errors: None,
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError {
            status: err.status(),
            message: err.body_text(),
            errors: None,
        }
    }
}

impl From<SheetError> for ApiError {
    fn from(err: SheetError) -> Self {
        let status = match &err {
            SheetError::EmptyUpload | SheetError::Workbook(_) => StatusCode::BAD_REQUEST,
            SheetError::UnsupportedFileType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            SheetError::MissingPriceInput(_)
            | SheetError::DivisionByZeroPrice { .. }
            | SheetError::NoSeasonPrices
            | SheetError::DuplicateSeason(_)
            | SheetError::NegativePoints { .. }
            | SheetError::AmountOverflow { .. }
            | SheetError::InvalidNumber { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            SheetError::Xlsx(_) | SheetError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let errors = match &err {
            SheetError::MissingPriceInput(fields) => Some(fields.clone()),
            _ => None,
        };
        ApiError {
            status,
            message: err.to_string(),
            errors,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!("request failed: {}", self.message);
        }
        let body = ErrorResponse {
            status: "error".to_string(),
            message: self.message,
            errors: self.errors,
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Build the router with every page and API route.
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes();

    Router::new()
        .route("/", get(serve_landing))
        .route("/settlement", get(serve_settlement))
        .route("/linter", get(serve_linter))
        .route("/api/settlement/upload", post(upload_settlement))
        .route("/api/settlement/compute", post(compute))
        .route("/api/settlement/export", post(export_settlement))
        .route("/api/lint/upload", post(upload_lint))
        .route("/api/lint/clean", post(export_cleaned))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: Config) -> std::io::Result<()> {
    let addr = config.bind_addr();
    let app = router(Arc::new(AppState { config }));

    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    axum::serve(listener, app).await
}

async fn serve_landing() -> Html<&'static str> {
    Html(include_str!("./static/landing.html"))
}

async fn serve_settlement() -> Html<&'static str> {
    Html(include_str!("./static/settlement.html"))
}

async fn serve_linter() -> Html<&'static str> {
    Html(include_str!("./static/linter.html"))
}

struct Upload {
    file_name: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
    layout: Option<String>,
}

/// Pull the `file` part (and an optional `layout` part) out of a form upload.
async fn read_upload(mut multipart: Multipart) -> ApiResult<Upload> {
    let mut upload = None;
    let mut layout = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                upload = Some((file_name, content_type, bytes.to_vec()));
            }
            "layout" => {
                layout = Some(field.text().await?);
            }
            _ => {}
        }
    }

    let (file_name, content_type, bytes) = upload.ok_or(SheetError::EmptyUpload)?;
    if bytes.is_empty() {
        return Err(SheetError::EmptyUpload.into());
    }

    Ok(Upload {
        file_name,
        content_type,
        bytes,
        layout,
    })
}

fn parse_layout(value: Option<&str>, default: HeaderLayout) -> ApiResult<HeaderLayout> {
    match value.map(str::trim) {
        None | Some("") => Ok(default),
        Some("first_row") => Ok(HeaderLayout::FirstRow),
        Some("preamble") => Ok(HeaderLayout::Preamble),
        Some(other) => Err(ApiError::bad_request(format!(
            "unknown header layout: {}",
            other
        ))),
    }
}

async fn upload_settlement(multipart: Multipart) -> ApiResult<Json<SettlementUploadResponse>> {
    let upload = read_upload(multipart).await?;
    let kind = FileKind::detect(&upload.file_name, upload.content_type.as_deref())?;
    let layout = parse_layout(upload.layout.as_deref(), HeaderLayout::FirstRow)?;

    let table = first_sheet(read_workbook(&upload.bytes, kind, layout)?)?;
    // Surface unparseable point cells now rather than at compute time.
    SettlementInputRow::from_table(&table)?;
    let seasons = extract_seasons(&table.headers);
    info!(
        "settlement upload {}: {} rows, seasons {:?}",
        upload.file_name,
        table.rows.len(),
        seasons
    );

    Ok(Json(SettlementUploadResponse {
        status: "ok".to_string(),
        table,
        seasons,
    }))
}

async fn compute(Json(request): Json<ComputeRequest>) -> ApiResult<Json<ComputeResponse>> {
    let inputs = complete_price_inputs(&request.table.headers, &request.prices);
    let prices = resolve_prices(&inputs)?;
    let input = SettlementInputRow::from_table(&request.table)?;
    let rows = compute_settlement(&input, &prices)?;
    let summary = summarize(&rows)?;

    Ok(Json(ComputeResponse {
        status: "ok".to_string(),
        rows,
        summary,
    }))
}

async fn export_settlement(Json(request): Json<ExportRequest>) -> ApiResult<Response> {
    let bytes = settlement_to_xlsx(&request.rows)?;
    let file_name = timestamped_file_name(SETTLEMENT_SHEET_NAME, "xlsx");
    Ok(attachment(bytes, &file_name))
}

async fn upload_lint(multipart: Multipart) -> ApiResult<Json<LintUploadResponse>> {
    let upload = read_upload(multipart).await?;
    let kind = FileKind::detect(&upload.file_name, upload.content_type.as_deref())?;
    let layout = parse_layout(upload.layout.as_deref(), HeaderLayout::Preamble)?;

    let tables = read_workbook(&upload.bytes, kind, layout)?;
    if tables.iter().all(Table::is_empty) {
        return Err(SheetError::EmptyUpload.into());
    }

    let sheets: Vec<LintedSheet> = tables
        .into_iter()
        .map(|table| {
            let report = lint_table(&table);
            if !report.is_clean() {
                info!("sheet {}: {}", table.name, report.summary);
            }
            LintedSheet { table, report }
        })
        .collect();

    Ok(Json(LintUploadResponse {
        status: "ok".to_string(),
        sheets,
    }))
}

async fn export_cleaned(Json(request): Json<CleanRequest>) -> ApiResult<Response> {
    let bytes = cleaned_to_xlsx(&request.table)?;
    let file_name = timestamped_file_name("cleaned_data", "xlsx");
    Ok(attachment(bytes, &file_name))
}

fn attachment(bytes: Vec<u8>, file_name: &str) -> Response {
    let disposition = format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(file_name)
    );
    (
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response()
}
