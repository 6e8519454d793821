//! Fixed-point helpers for native amounts and oracle prices.
//!
//! All amounts are integers in the smallest unit of their denomination. A
//! value `v` with `d` decimals represents `v / 10^d`.

use std::fmt::Display;
use thiserror::Error;

/// Decimals of the native asset (1 native unit = 10^18 smallest units).
pub const NATIVE_DECIMALS: u8 = 18;

/// A fixed-point number: `value / 10^decimals`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fixed {
    pub value: u128,
    pub decimals: u8,
}

impl Display for Fixed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format_units(self.value, self.decimals))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnitsError {
    #[error("invalid decimal amount: {0:?}")]
    Invalid(String),
    #[error("amount {amount:?} has more than {decimals} decimal places")]
    TooPrecise { amount: String, decimals: u8 },
    #[error("amount {0:?} does not fit into 128 bits")]
    Overflow(String),
}

/// Returns `10^exp`, or `None` when it does not fit into a `u128`.
pub fn pow10(exp: u8) -> Option<u128> {
    10u128.checked_pow(u32::from(exp))
}

/// Parses a decimal string such as `"0.01"` into smallest units.
pub fn parse_units(amount: &str, decimals: u8) -> Result<u128, UnitsError> {
    let trimmed = amount.trim();
    let (whole, fraction) = match trimmed.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (trimmed, ""),
    };

    let is_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !is_digits(whole) || !is_digits(fraction) {
        return Err(UnitsError::Invalid(amount.to_string()));
    }

    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > usize::from(decimals) {
        return Err(UnitsError::TooPrecise {
            amount: amount.to_string(),
            decimals,
        });
    }

    let overflow = || UnitsError::Overflow(amount.to_string());
    let scale = pow10(decimals).ok_or_else(overflow)?;
    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| overflow())?
    };
    let fraction_value: u128 = if fraction.is_empty() {
        0
    } else {
        let padding = decimals - fraction.len() as u8;
        let digits: u128 = fraction.parse().map_err(|_| overflow())?;
        digits
            .checked_mul(pow10(padding).ok_or_else(overflow)?)
            .ok_or_else(overflow)?
    };

    whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(fraction_value))
        .ok_or_else(overflow)
}

/// Parses an amount of native units (18 decimals).
pub fn parse_ether(amount: &str) -> Result<u128, UnitsError> {
    parse_units(amount, NATIVE_DECIMALS)
}

/// Renders `value` with `decimals` decimal places, dropping trailing zeros.
pub fn format_units(value: u128, decimals: u8) -> String {
    if decimals == 0 {
        return value.to_string();
    }
    let digits = format!("{:0>width$}", value, width = usize::from(decimals) + 1);
    let (whole, fraction) = digits.split_at(digits.len() - usize::from(decimals));
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    }
}

/// Renders an amount of native units (18 decimals).
pub fn format_ether(value: u128) -> String {
    format_units(value, NATIVE_DECIMALS)
}

/// Converts `amount` (with `amount_decimals`) to the quote currency using
/// `price` (with `price_decimals`). The result keeps `price_decimals`.
///
/// Returns `None` on overflow.
pub fn convert(amount: u128, amount_decimals: u8, price: u128) -> Option<u128> {
    amount
        .checked_mul(price)
        .and_then(|scaled| pow10(amount_decimals).map(|unit| scaled / unit))
}
