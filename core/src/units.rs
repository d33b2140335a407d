//! # SHM Unit Conversion
//!
//! Exact decimal-string conversion between human SHM amounts and integer
//! base units (10^-18 SHM). No floating point on the money path: `1.5` in,
//! `1500000000000000000` out, byte for byte.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{MAX_PAYMENT_AMOUNT_SHM, NATIVE_DECIMALS};

/// Base units per whole SHM.
pub const BASE_UNITS_PER_SHM: u128 = 1_000_000_000_000_000_000;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitsError {
    #[error("empty amount string")]
    Empty,

    #[error("invalid character '{found}' in amount")]
    InvalidCharacter { found: char },

    #[error("too many decimal places: {got} (max {max})")]
    TooManyDecimals { got: usize, max: usize },

    #[error("amount overflows the native unit range")]
    Overflow,
}

/// Validation failures for user-supplied payment amounts. The messages are
/// surfaced verbatim in API responses, so keep them user-shaped.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmountError {
    #[error("Amount is required")]
    Required,

    #[error("Please enter a valid number")]
    NotANumber,

    #[error("Amount must be greater than 0")]
    NotPositive,

    #[error("Amount is too large")]
    TooLarge,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parses a decimal SHM string into base units.
///
/// Accepts `"1"`, `"1.5"`, `".5"`, and `"1."`. Rejects signs, exponents,
/// more than 18 fractional digits, and anything that isn't digits around a
/// single dot.
pub fn parse_shm(input: &str) -> Result<u128, UnitsError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed == "." {
        return Err(UnitsError::Empty);
    }

    let (whole, frac) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };

    if let Some(found) = whole.chars().chain(frac.chars()).find(|c| !c.is_ascii_digit()) {
        return Err(UnitsError::InvalidCharacter { found });
    }

    let max = NATIVE_DECIMALS as usize;
    if frac.len() > max {
        return Err(UnitsError::TooManyDecimals { got: frac.len(), max });
    }

    let whole_units: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| UnitsError::Overflow)?
    };

    // Right-pad the fractional digits out to 18 places.
    let mut frac_units: u128 = 0;
    if !frac.is_empty() {
        frac_units = frac.parse().map_err(|_| UnitsError::Overflow)?;
        for _ in 0..(max - frac.len()) {
            frac_units = frac_units.checked_mul(10).ok_or(UnitsError::Overflow)?;
        }
    }

    whole_units
        .checked_mul(BASE_UNITS_PER_SHM)
        .and_then(|w| w.checked_add(frac_units))
        .ok_or(UnitsError::Overflow)
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Formats base units as a decimal SHM string with trailing zeros trimmed.
/// Always keeps at least one fractional digit, so whole amounts render as
/// `"1.0"` rather than `"1"`.
pub fn format_shm(base_units: u128) -> String {
    let whole = base_units / BASE_UNITS_PER_SHM;
    let frac = base_units % BASE_UNITS_PER_SHM;

    let mut frac_str = format!("{:018}", frac);
    while frac_str.len() > 1 && frac_str.ends_with('0') {
        frac_str.pop();
    }
    format!("{}.{}", whole, frac_str)
}

/// Formats base units with exactly `places` fractional digits, rounding
/// half-up on the cut digit. Display-only; never feed the result back into
/// arithmetic.
pub fn format_shm_fixed(base_units: u128, places: usize) -> String {
    let max = NATIVE_DECIMALS as usize;
    let places = places.min(max);

    let mut scale: u128 = 1;
    for _ in 0..(max - places) {
        scale *= 10;
    }
    let rounded = (base_units + scale / 2) / scale;

    let mut unit: u128 = 1;
    for _ in 0..places {
        unit *= 10;
    }
    let whole = rounded / unit;
    if places == 0 {
        return whole.to_string();
    }
    let frac = rounded % unit;
    format!("{}.{:0width$}", whole, frac, width = places)
}

// ---------------------------------------------------------------------------
// Amount Validation
// ---------------------------------------------------------------------------

/// Validates a user-supplied amount string and converts it to base units.
///
/// Mirrors the form-level rules: present, numeric, strictly positive, and
/// at most 1,000,000 SHM.
pub fn validate_amount(input: &str) -> Result<u128, AmountError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Required);
    }

    let base = match parse_shm(trimmed) {
        Ok(base) => base,
        Err(UnitsError::Overflow) => return Err(AmountError::TooLarge),
        Err(_) => return Err(AmountError::NotANumber),
    };

    if base == 0 {
        return Err(AmountError::NotPositive);
    }

    let ceiling = (MAX_PAYMENT_AMOUNT_SHM as u128) * BASE_UNITS_PER_SHM;
    if base > ceiling {
        return Err(AmountError::TooLarge);
    }

    Ok(base)
}
