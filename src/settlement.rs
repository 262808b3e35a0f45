//! Creator-payout settlement.
//!
//! Every creator row carries a point total plus a breakdown of where those
//! points came from: incentive points, early-bird points and one column per
//! season. Points are converted to MBX with the price tier of the season they
//! are drawn from, and every MBX amount is rounded to the nearest 100.
//!
//! Incentive and early-bird points are always paid at the newest season's
//! prices. Season points are then drawn newest season first until the
//! remaining total is used up.

use log::debug;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{Result, SheetError};
use crate::row::{KnownColumn, SettlementInputRow};
use crate::season::SeasonPrice;

/// MBX amounts are paid out in lots of this size.
pub const MBX_LOT: u32 = 100;

/// Settlement of one creator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementOutputRow {
    pub no: u32,
    pub creator_id: String,
    pub creator_name: String,
    pub wallet_address: String,
    pub total_points: Decimal,
    pub total_mbx: Decimal,
    pub early_bird_mbx: Decimal,
    pub early_bird_points: Decimal,
    pub incentive_mbx: Decimal,
    pub incentive_points: Decimal,
    pub season_mbx: Decimal,
    /// `season<N>:<points>` entries, newest season first.
    pub season_points: String,
    pub last_used_season: u32,
}

/// Totals shown above the settlement table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SettlementSummary {
    pub total_creators: usize,
    pub total_points: Decimal,
    pub total_mbx: Decimal,
    pub total_early_bird_mbx: Decimal,
    pub total_incentive_mbx: Decimal,
    pub total_season_mbx: Decimal,
}

/// Convert `points` to MBX at `price`, rounded half away from zero to the
/// nearest [`MBX_LOT`].
///
/// Returns `None` when an intermediate amount leaves the range `Decimal` can
/// represent, e.g. a very small MBX price applied to many points.
///
/// # Examples
/// ```
/// use rust_decimal::Decimal;
/// use sheetdesk::season::SeasonPrice;
/// use sheetdesk::settlement::mbx_for_points;
///
/// let price = SeasonPrice::new(1, Decimal::ONE, Decimal::ONE);
/// assert_eq!(mbx_for_points(Decimal::from(1049), &price), Some(Decimal::from(1000)));
/// assert_eq!(mbx_for_points(Decimal::from(1050), &price), Some(Decimal::from(1100)));
/// ```
pub fn mbx_for_points(points: Decimal, price: &SeasonPrice) -> Option<Decimal> {
    let lot = Decimal::from(MBX_LOT);
    let lots = points
        .checked_mul(price.point_price)?
        .checked_div(price.mbx_price)?
        .checked_div(lot)?;
    lots.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .checked_mul(lot)
}

/// Check that the price tiers can be used for allocation and return them
/// newest season first.
fn ordered_tiers(prices: &[SeasonPrice]) -> Result<Vec<&SeasonPrice>> {
    if prices.is_empty() {
        return Err(SheetError::NoSeasonPrices);
    }

    let mut seen = BTreeSet::new();
    for price in prices {
        if !seen.insert(price.season) {
            return Err(SheetError::DuplicateSeason(price.season));
        }
        if price.mbx_price.is_zero() {
            return Err(SheetError::DivisionByZeroPrice {
                season: price.season,
            });
        }
    }

    let mut tiers: Vec<&SeasonPrice> = prices.iter().collect();
    tiers.sort_by(|a, b| b.season.cmp(&a.season));
    Ok(tiers)
}

fn check_non_negative(rows: &[SettlementInputRow]) -> Result<()> {
    for (index, row) in rows.iter().enumerate() {
        let negative = |field: &str| SheetError::NegativePoints {
            row: index + 1,
            field: field.to_string(),
        };

        let fixed = [
            (KnownColumn::TotalPoints, row.total_points),
            (KnownColumn::IncentivePoints, row.incentive_points),
            (KnownColumn::EarlyBirdPoints, row.early_bird_points),
        ];
        if let Some((column, _)) = fixed.iter().find(|(_, points)| *points < Decimal::ZERO) {
            return Err(negative(column.label()));
        }
        if let Some((season, _)) = row
            .season_points
            .iter()
            .find(|(_, points)| **points < Decimal::ZERO)
        {
            return Err(negative(&format!("season{}", season)));
        }
    }
    Ok(())
}

/// Compute the settlement of every row.
///
/// The price tiers and all rows are validated before anything is allocated,
/// so an error never comes with partial output.
pub fn compute_settlement(
    rows: &[SettlementInputRow],
    prices: &[SeasonPrice],
) -> Result<Vec<SettlementOutputRow>> {
    let tiers = ordered_tiers(prices)?;
    check_non_negative(rows)?;

    let output = rows
        .iter()
        .enumerate()
        .map(|(index, row)| settle_row(index, row, &tiers))
        .collect::<Result<Vec<_>>>()?;

    debug!(
        "settled {} rows across {} season tiers",
        output.len(),
        tiers.len()
    );
    Ok(output)
}

/// `tiers` must be non-empty and sorted newest season first.
fn settle_row(
    index: usize,
    row: &SettlementInputRow,
    tiers: &[&SeasonPrice],
) -> Result<SettlementOutputRow> {
    let latest = tiers[0];
    let oldest = tiers[tiers.len() - 1];
    let overflow = || SheetError::AmountOverflow { row: index + 1 };

    let incentive_mbx = mbx_for_points(row.incentive_points, latest).ok_or_else(overflow)?;
    let early_bird_mbx = mbx_for_points(row.early_bird_points, latest).ok_or_else(overflow)?;
    let mut remaining = row
        .total_points
        .checked_sub(row.incentive_points)
        .and_then(|r| r.checked_sub(row.early_bird_points))
        .ok_or_else(overflow)?;

    let mut season_mbx = Decimal::ZERO;
    let mut drawn: Vec<(u32, Decimal)> = Vec::new();
    let mut last_used_season = oldest.season;

    for tier in tiers {
        // Depletion shows up at the start of the next tier, which is the one
        // recorded, even when incentive points pushed the total below zero.
        if remaining <= Decimal::ZERO {
            last_used_season = tier.season;
            break;
        }

        let points = row.points_for_season(tier.season);
        if points > Decimal::ZERO {
            let mbx = mbx_for_points(points, tier).ok_or_else(overflow)?;
            season_mbx = season_mbx.checked_add(mbx).ok_or_else(overflow)?;
            remaining = remaining.checked_sub(points).ok_or_else(overflow)?;
            drawn.push((tier.season, points));
        }
    }

    let total_mbx = season_mbx
        .checked_add(incentive_mbx)
        .and_then(|t| t.checked_add(early_bird_mbx))
        .ok_or_else(overflow)?;

    let season_points = drawn
        .iter()
        .map(|(season, points)| format!("season{}:{}", season, points.normalize()))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(SettlementOutputRow {
        no: row.no.unwrap_or((index + 1) as u32),
        creator_id: row.creator_id.clone(),
        creator_name: row.creator_name.clone(),
        wallet_address: row.wallet_address.clone(),
        total_points: row.total_points,
        total_mbx,
        early_bird_mbx,
        early_bird_points: row.early_bird_points,
        incentive_mbx,
        incentive_points: row.incentive_points,
        season_mbx,
        season_points,
        last_used_season,
    })
}

/// Sum up a settlement for the summary panel.
///
/// # Arguments
/// * `rows` - Output of [`compute_settlement`]
///
/// # Returns
/// * `Result<SettlementSummary>` - Column totals, or `AmountOverflow` naming
///   the row whose amounts pushed a total out of range
pub fn summarize(rows: &[SettlementOutputRow]) -> Result<SettlementSummary> {
    let mut summary = SettlementSummary::default();

    for (index, row) in rows.iter().enumerate() {
        let add = |total: Decimal, value: Decimal| {
            total
                .checked_add(value)
                .ok_or(SheetError::AmountOverflow { row: index + 1 })
        };
        summary.total_creators += 1;
        summary.total_points = add(summary.total_points, row.total_points)?;
        summary.total_mbx = add(summary.total_mbx, row.total_mbx)?;
        summary.total_early_bird_mbx = add(summary.total_early_bird_mbx, row.early_bird_mbx)?;
        summary.total_incentive_mbx = add(summary.total_incentive_mbx, row.incentive_mbx)?;
        summary.total_season_mbx = add(summary.total_season_mbx, row.season_mbx)?;
    }

    Ok(summary)
}
