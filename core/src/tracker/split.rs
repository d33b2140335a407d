//! # Split Payment Planning
//!
//! Pure arithmetic over base units: take a total and a set of recipients
//! and produce the per-recipient amounts for a bulk send. Planning never
//! touches the provider; the [`TransactionTracker`](super::TransactionTracker)
//! executes a plan item by item.
//!
//! All division happens in base units, so a 10 SHM total split three ways
//! comes out exact to the wei-equivalent: two recipients get
//! 3.333333333333333333 and the first absorbs the remainder. Nothing is
//! ever lost to rounding.

use thiserror::Error;

use crate::provider::Address;
use crate::units::{format_shm, validate_amount, AmountError};

/// Basis points in a whole: percentage splits are specified in hundredths
/// of a percent and must sum to exactly this.
pub const TOTAL_BASIS_POINTS: u32 = 10_000;

/// One planned transfer within a split payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitItem {
    /// Who receives this share.
    pub recipient: Address,
    /// The share in base units.
    pub amount_base: u128,
}

impl SplitItem {
    /// The share as a decimal SHM display string.
    pub fn amount_display(&self) -> String {
        format_shm(self.amount_base)
    }
}

/// Errors from split planning.
#[derive(Debug, Error)]
pub enum SplitError {
    /// A split needs at least one recipient.
    #[error("split payment requires at least one recipient")]
    NoRecipients,

    /// Percentage shares must account for the whole amount.
    #[error("percentages must total 100%, got {}.{:02}%", got / 100, got % 100)]
    PercentagesMustTotal {
        /// Sum of the provided shares, in basis points.
        got: u32,
    },

    /// An amount failed validation.
    #[error(transparent)]
    Amount(#[from] AmountError),
}

/// Splits a total equally among recipients, remainder to the first.
///
/// The total is a decimal SHM string and goes through the same validation
/// as a single payment.
pub fn plan_equal(total: &str, recipients: &[Address]) -> Result<Vec<SplitItem>, SplitError> {
    if recipients.is_empty() {
        return Err(SplitError::NoRecipients);
    }
    let total_base = validate_amount(total)?;
    let count = recipients.len() as u128;
    let share = total_base / count;
    let remainder = total_base - share * count;

    Ok(recipients
        .iter()
        .enumerate()
        .map(|(i, recipient)| SplitItem {
            recipient: *recipient,
            amount_base: if i == 0 { share + remainder } else { share },
        })
        .collect())
}

/// Splits a total by percentage shares given in basis points.
///
/// Shares must sum to exactly [`TOTAL_BASIS_POINTS`]. Integer division
/// dust goes to the first recipient, so the plan always pays out the full
/// total.
pub fn plan_percentage(
    total: &str,
    shares: &[(Address, u32)],
) -> Result<Vec<SplitItem>, SplitError> {
    if shares.is_empty() {
        return Err(SplitError::NoRecipients);
    }
    let sum: u32 = shares.iter().map(|(_, bps)| bps).sum();
    if sum != TOTAL_BASIS_POINTS {
        return Err(SplitError::PercentagesMustTotal { got: sum });
    }
    let total_base = validate_amount(total)?;

    let mut items: Vec<SplitItem> = shares
        .iter()
        .map(|(recipient, bps)| SplitItem {
            recipient: *recipient,
            amount_base: total_base * u128::from(*bps) / u128::from(TOTAL_BASIS_POINTS),
        })
        .collect();

    let planned: u128 = items.iter().map(|item| item.amount_base).sum();
    items[0].amount_base += total_base - planned;
    Ok(items)
}

/// Builds a plan from explicit per-recipient amounts, validating each one.
pub fn plan_custom(amounts: &[(Address, String)]) -> Result<Vec<SplitItem>, SplitError> {
    if amounts.is_empty() {
        return Err(SplitError::NoRecipients);
    }
    amounts
        .iter()
        .map(|(recipient, amount)| {
            Ok(SplitItem {
                recipient: *recipient,
                amount_base: validate_amount(amount)?,
            })
        })
        .collect()
}
