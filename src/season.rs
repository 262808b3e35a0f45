use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{Result, SheetError};

lazy_static! {
    static ref SEASON_REGEX: Regex = Regex::new(r"(?i)(?:시즌|season)\s*(\d+)").unwrap();
}

/// Price tier of one season.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonPrice {
    pub season: u32,
    pub mbx_price: Decimal,
    pub point_price: Decimal,
}

impl SeasonPrice {
    pub fn new(season: u32, point_price: Decimal, mbx_price: Decimal) -> Self {
        SeasonPrice {
            season,
            mbx_price,
            point_price,
        }
    }
}

/// A season price as typed into the price form; `None` means not entered yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SeasonPriceInput {
    pub season: u32,
    #[serde(default)]
    pub point_price: Option<Decimal>,
    #[serde(default)]
    pub mbx_price: Option<Decimal>,
}

impl SeasonPriceInput {
    pub fn empty(season: u32) -> Self {
        SeasonPriceInput {
            season,
            ..Default::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PriceField {
    PointPrice,
    MbxPrice,
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceField::PointPrice => f.write_str("point price"),
            PriceField::MbxPrice => f.write_str("MBX price"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldProblem {
    Missing,
    Zero,
    Negative,
}

/// One invalid price field, addressed by season and field so the caller can
/// decide where to put focus and which message to show.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub season: u32,
    pub field: PriceField,
    pub problem: FieldProblem,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.problem {
            FieldProblem::Missing => {
                write!(f, "enter the {} for season {}", self.field, self.season)
            }
            FieldProblem::Zero => {
                write!(f, "the {} for season {} must not be zero", self.field, self.season)
            }
            FieldProblem::Negative => {
                write!(f, "the {} for season {} must not be negative", self.field, self.season)
            }
        }
    }
}

/// Check every price field and report all problems.
///
/// Point-price problems come first, then MBX-price problems, each group in
/// input order, so the first entry is the field a form should focus.
pub fn validate_prices(inputs: &[SeasonPriceInput]) -> Vec<FieldError> {
    let mut errors = Vec::new();

    for input in inputs {
        let problem = match input.point_price {
            None => Some(FieldProblem::Missing),
            Some(p) if p < Decimal::ZERO => Some(FieldProblem::Negative),
            Some(_) => None,
        };
        if let Some(problem) = problem {
            errors.push(FieldError {
                season: input.season,
                field: PriceField::PointPrice,
                problem,
            });
        }
    }

    for input in inputs {
        let problem = match input.mbx_price {
            None => Some(FieldProblem::Missing),
            Some(p) if p.is_zero() => Some(FieldProblem::Zero),
            Some(p) if p < Decimal::ZERO => Some(FieldProblem::Negative),
            Some(_) => None,
        };
        if let Some(problem) = problem {
            errors.push(FieldError {
                season: input.season,
                field: PriceField::MbxPrice,
                problem,
            });
        }
    }

    errors
}

/// Validate the form inputs and turn them into price tiers.
pub fn resolve_prices(inputs: &[SeasonPriceInput]) -> Result<Vec<SeasonPrice>> {
    let errors = validate_prices(inputs);
    if !errors.is_empty() {
        return Err(SheetError::MissingPriceInput(errors));
    }

    Ok(inputs
        .iter()
        .filter_map(|input| match (input.point_price, input.mbx_price) {
            (Some(point_price), Some(mbx_price)) => {
                Some(SeasonPrice::new(input.season, point_price, mbx_price))
            }
            _ => None,
        })
        .collect())
}

/// Season number named by a header such as `시즌3 포인트` or `Season 3`.
pub fn season_of_header(header: &str) -> Option<u32> {
    SEASON_REGEX
        .captures(header)
        .and_then(|captures| captures.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|season| *season >= 1)
}

/// Distinct seasons referenced by the headers, ascending.
///
/// # Arguments
/// * `headers` - Header row of a point upload
///
/// # Returns
/// * `Vec<u32>` - Season numbers (1 or higher) without duplicates, ascending;
///   empty when no header names a season
pub fn extract_seasons<S: AsRef<str>>(headers: &[S]) -> Vec<u32> {
    headers
        .iter()
        .filter_map(|h| season_of_header(h.as_ref()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// `inputs` plus an empty entry for every season in `headers` that has none.
///
/// Running the result through [`resolve_prices`] reports unpriced season
/// columns as missing fields instead of dropping their points.
pub fn complete_price_inputs<S: AsRef<str>>(
    headers: &[S],
    inputs: &[SeasonPriceInput],
) -> Vec<SeasonPriceInput> {
    let mut completed = inputs.to_vec();
    for season in extract_seasons(headers) {
        if !completed.iter().any(|input| input.season == season) {
            completed.push(SeasonPriceInput::empty(season));
        }
    }
    completed
}
