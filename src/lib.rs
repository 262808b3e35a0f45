/*!
# Sheetdesk

Browser-based utilities for spreadsheet uploads, built in Rust.

## Overview

Two tools share one upload/export pipeline:

- **Settlement**: a creator point sheet plus per-season prices become an MBX
  payout per creator. Incentive and early-bird points are paid at the newest
  season's prices; season points are drawn newest season first. Every MBX
  amount is rounded to a lot of 100.
- **Line-separator linter**: cell text is scanned for U+2028 (LS), U+2029 (PS)
  and vertical tabs (VT), which look like line breaks but corrupt CSV and JSON
  consumers. Flagged cells are shown with inline markers and a cleaned copy
  of the sheet can be downloaded.

## Architecture

### Frontend Layer
- Static HTML pages served by the web binary (`/`, `/settlement`, `/linter`)
- Uploads go through `multipart/form-data`, edits and exports through JSON

### Backend Layer
- **Technologies**: Rust, axum, calamine, rust_xlsxwriter
- **Core Components**:
  - Loader - reads xlsx/xls/csv into [`table::Table`]s
  - Settlement Allocator - pure, deterministic allocation over season tiers
  - Scanner and Linter - find, mark and clean separators
  - Downloader - settlement and cleaned-sheet exports

Nothing is persisted; every request works on its own uploaded snapshot.

## Modules

- **error**: [`SheetError`], shared by every module
- **table**: cell values and the sheet model
- **separator**: line-separator scanning and cleaning
- **linter**: per-sheet reports built on the scanner
- **season**: season prices, price validation, season header detection
- **row**: header mapping from uploaded sheets to settlement rows
- **settlement**: the allocator and its summary
- **loader**: upload parsing (xlsx, xls, csv)
- **downloader**: export functionality (XLSX, CSV)
- **config**: server settings from flags and environment
- **app**: routing and handlers (feature `web`)

## REST API Endpoints

- `POST /api/settlement/upload` - Parses a point sheet and lists its seasons
- `POST /api/settlement/compute` - Runs the settlement for the given prices
- `POST /api/settlement/export` - Downloads settlement rows as XLSX
- `POST /api/lint/upload` - Lints every sheet of an upload
- `POST /api/lint/clean` - Downloads a cleaned sheet as XLSX
*/

pub mod config;
pub mod downloader;
pub mod error;
pub mod linter;
pub mod loader;
pub mod row;
pub mod season;
pub mod separator;
pub mod settlement;
pub mod table;

#[cfg(feature = "web")]
pub mod app;

pub use error::SheetError;
pub use linter::{LintReport, clean_table, lint_table};
pub use row::SettlementInputRow;
pub use season::{SeasonPrice, SeasonPriceInput, validate_prices};
pub use separator::{ScanResult, SeparatorKind, scan};
pub use settlement::{SettlementOutputRow, SettlementSummary, compute_settlement};
pub use table::{CellValue, Table};
