use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::{Result, SheetError};
use crate::season::season_of_header;
use crate::table::{CellValue, Table};

/// Columns the settlement understands, besides the per-season point columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KnownColumn {
    No,
    CreatorId,
    CreatorName,
    WalletAddress,
    TotalPoints,
    IncentivePoints,
    EarlyBirdPoints,
}

impl KnownColumn {
    const ALL: [KnownColumn; 7] = [
        KnownColumn::No,
        KnownColumn::CreatorId,
        KnownColumn::CreatorName,
        KnownColumn::WalletAddress,
        KnownColumn::TotalPoints,
        KnownColumn::IncentivePoints,
        KnownColumn::EarlyBirdPoints,
    ];

    fn aliases(self) -> &'static [&'static str] {
        match self {
            KnownColumn::No => &["no", "번호"],
            KnownColumn::CreatorId => &["creatorid", "크리에이터id"],
            KnownColumn::CreatorName => &["creatorname", "크리에이터명", "크리에이터이름"],
            KnownColumn::WalletAddress => &["walletaddress", "wallet", "지갑주소"],
            KnownColumn::TotalPoints => &[
                "totalpoints",
                "총포인트",
                "신청포인트",
                "총신청포인트",
            ],
            KnownColumn::IncentivePoints => &["incentivepoints", "인센티브포인트", "인센티브"],
            KnownColumn::EarlyBirdPoints => &[
                "earlybirdpoints",
                "사전모집포인트",
                "사전모집",
            ],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            KnownColumn::No => "no",
            KnownColumn::CreatorId => "creatorId",
            KnownColumn::CreatorName => "creatorName",
            KnownColumn::WalletAddress => "walletAddress",
            KnownColumn::TotalPoints => "totalPoints",
            KnownColumn::IncentivePoints => "incentivePoints",
            KnownColumn::EarlyBirdPoints => "earlyBirdPoints",
        }
    }

    /// Match a header against the known aliases, ignoring case, spaces,
    /// underscores and hyphens.
    pub fn from_header(header: &str) -> Option<Self> {
        let normalized = normalize_header(header);
        Self::ALL
            .into_iter()
            .find(|column| column.aliases().contains(&normalized.as_str()))
    }
}

fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Where each column of an upload goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnRole {
    Known(KnownColumn),
    Season(u32),
    Extra(String),
}

/// Decide what each header of an upload means.
///
/// Known aliases win over season numbers, so `totalPoints` never becomes a
/// season column even if a header happens to match both.
///
/// # Arguments
/// * `headers` - Header row of the upload, in column order
///
/// # Returns
/// * `Vec<ColumnRole>` - One role per header, same order and length
pub fn column_roles(headers: &[String]) -> Vec<ColumnRole> {
    headers
        .iter()
        .map(|header| {
            if let Some(known) = KnownColumn::from_header(header) {
                ColumnRole::Known(known)
            } else if let Some(season) = season_of_header(header) {
                ColumnRole::Season(season)
            } else {
                ColumnRole::Extra(header.clone())
            }
        })
        .collect()
}

/// One creator's row of the point upload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SettlementInputRow {
    pub no: Option<u32>,
    pub creator_id: String,
    pub creator_name: String,
    pub wallet_address: String,
    pub total_points: Decimal,
    pub incentive_points: Decimal,
    pub early_bird_points: Decimal,
    /// Points per season column, keyed by season number.
    pub season_points: BTreeMap<u32, Decimal>,
    /// Columns the settlement does not interpret, kept for display.
    pub extra: BTreeMap<String, CellValue>,
}

impl SettlementInputRow {
    /// Points recorded for `season`, or zero when the column is absent.
    pub fn points_for_season(&self, season: u32) -> Decimal {
        self.season_points
            .get(&season)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Map every data row of `table` onto the known fields.
    ///
    /// Several columns naming the same season are added together.
    ///
    /// # Arguments
    /// * `table` - Uploaded sheet with its header row already split off
    ///
    /// # Returns
    /// * `Result<Vec<SettlementInputRow>>` - One row per data row, or the first
    ///   `InvalidNumber`/`AmountOverflow` error. `row` numbers in errors are
    ///   1-based data-row numbers.
    pub fn from_table(table: &Table) -> Result<Vec<SettlementInputRow>> {
        let roles = column_roles(&table.headers);

        table
            .rows
            .iter()
            .enumerate()
            .map(|(index, cells)| {
                let row_number = index + 1;
                let mut row = SettlementInputRow::default();

                for (col, role) in roles.iter().enumerate() {
                    let value = cells.get(col).unwrap_or(&CellValue::Empty);
                    let header = &table.headers[col];
                    match role {
                        ColumnRole::Known(KnownColumn::No) => {
                            row.no = parse_decimal(value, row_number, header)?
                                .and_then(|n| n.trunc().to_u32());
                        }
                        ColumnRole::Known(KnownColumn::CreatorId) => {
                            row.creator_id = value.to_string();
                        }
                        ColumnRole::Known(KnownColumn::CreatorName) => {
                            row.creator_name = value.to_string();
                        }
                        ColumnRole::Known(KnownColumn::WalletAddress) => {
                            row.wallet_address = value.to_string();
                        }
                        ColumnRole::Known(KnownColumn::TotalPoints) => {
                            row.total_points = parse_points(value, row_number, header)?;
                        }
                        ColumnRole::Known(KnownColumn::IncentivePoints) => {
                            row.incentive_points = parse_points(value, row_number, header)?;
                        }
                        ColumnRole::Known(KnownColumn::EarlyBirdPoints) => {
                            row.early_bird_points = parse_points(value, row_number, header)?;
                        }
                        ColumnRole::Season(season) => {
                            let points = parse_points(value, row_number, header)?;
                            let entry = row.season_points.entry(*season).or_insert(Decimal::ZERO);
                            *entry = entry
                                .checked_add(points)
                                .ok_or(SheetError::AmountOverflow { row: row_number })?;
                        }
                        ColumnRole::Extra(name) => {
                            row.extra.insert(name.clone(), value.clone());
                        }
                    }
                }

                Ok(row)
            })
            .collect()
    }
}

fn parse_points(value: &CellValue, row: usize, field: &str) -> Result<Decimal> {
    Ok(parse_decimal(value, row, field)?.unwrap_or(Decimal::ZERO))
}

/// Read a cell as a decimal. Blank cells are `None`; text may carry
/// thousands separators (`"1,500"`).
pub fn parse_decimal(value: &CellValue, row: usize, field: &str) -> Result<Option<Decimal>> {
    let invalid = || SheetError::InvalidNumber {
        row,
        field: field.to_string(),
        value: value.to_string(),
    };

    match value {
        CellValue::Empty => Ok(None),
        CellValue::Number(n) => Decimal::from_f64(*n).map(Some).ok_or_else(invalid),
        CellValue::Bool(_) => Err(invalid()),
        CellValue::Text(text) => {
            let trimmed: String = text.trim().chars().filter(|c| *c != ',').collect();
            if trimmed.is_empty() {
                return Ok(None);
            }
            Decimal::from_str(&trimmed)
                .map(|d| Some(d.normalize()))
                .map_err(|_| invalid())
        }
    }
}
