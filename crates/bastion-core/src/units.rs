//! Decimal amount parsing and formatting.
//!
//! Every amount goes through [`parse_units`] with [`TOKEN_DECIMALS`], whatever
//! token it is for. Native balances are shown with [`format_units`].

use alloy_primitives::U256;
use alloy_primitives::utils::{self, ParseUnits};

use crate::error::{Error, Result};

/// The decimals every approval amount is scaled by.
pub const TOKEN_DECIMALS: u8 = 18;

/// Parses a decimal string into base units, scaling by `10^decimals`.
///
/// Fraction digits beyond `decimals` are rounded half-up. The result must be
/// strictly positive.
///
/// # Errors
///
/// Returns [`Error::InvalidAmount`] if the string is not a plain decimal
/// number, is negative, overflows 256 bits, or scales to zero.
///
/// # Example
///
/// ```
/// use alloy_primitives::U256;
/// use bastion_core::units::parse_units;
///
/// assert_eq!(parse_units("1.5", 18).unwrap(), U256::from(1_500_000_000_000_000_000u64));
/// assert!(parse_units("0", 18).is_err());
/// ```
pub fn parse_units(input: &str, decimals: u8) -> Result<U256> {
    let input = input.trim();
    let invalid = |reason: &dyn std::fmt::Display| Error::InvalidAmount(format!("{input}: {reason}"));

    let value = match utils::parse_units(input, decimals).map_err(|e| invalid(&e))? {
        ParseUnits::U256(value) => value,
        ParseUnits::I256(_) => return Err(invalid(&"must be greater than 0")),
    };

    // alloy truncates excess fraction digits; the first dropped one decides.
    let round_up = input
        .split_once('.')
        .and_then(|(_, fraction)| fraction.as_bytes().get(usize::from(decimals)))
        .is_some_and(|digit| *digit >= b'5');
    let value = if round_up {
        value
            .checked_add(U256::from(1u8))
            .ok_or_else(|| invalid(&"too large"))?
    } else {
        value
    };

    if value.is_zero() {
        return Err(invalid(&"must be greater than 0"));
    }
    Ok(value)
}

/// Formats base units as a decimal string with `precision` fraction digits,
/// rounding half-up.
///
/// # Errors
///
/// Returns [`Error::InvalidAmount`] if `decimals` is not a valid unit.
///
/// # Example
///
/// ```
/// use alloy_primitives::U256;
/// use bastion_core::units::format_units;
///
/// let wei = U256::from(1_234_567_890_000_000_000u64);
/// assert_eq!(format_units(wei, 18, 6).unwrap(), "1.234568");
/// ```
pub fn format_units(value: U256, decimals: u8, precision: u8) -> Result<String> {
    let precision = precision.min(decimals);
    let scaled = match decimals - precision {
        0 => value,
        drop => {
            let divisor = U256::from(10u8).pow(U256::from(drop));
            value.saturating_add(divisor / U256::from(2u8)) / divisor
        }
    };
    if precision == 0 {
        return Ok(scaled.to_string());
    }
    utils::format_units(scaled, precision).map_err(|e| Error::InvalidAmount(e.to_string()))
}
