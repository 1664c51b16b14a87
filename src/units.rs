//! Conversions between native-unit decimal strings ("0.5" ETH) and
//! smallest-unit integers (wei, satoshi, lamport).

use crate::error::{ AppError, Result };

/// Parse a non-negative decimal string into smallest units.
pub fn parse_units(amount: &str, decimals: u8) -> Result<u128> {
    let amount = amount.trim();
    let invalid = || AppError::InvalidInput(format!("Invalid amount: {}", amount));

    let (whole, fraction) = match amount.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (amount, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    if fraction.len() > (decimals as usize) {
        return Err(
            AppError::InvalidInput(
                format!("Amount {} has more than {} decimal places", amount, decimals)
            )
        );
    }

    let scale = (10u128).checked_pow(decimals as u32).ok_or_else(invalid)?;

    let whole_units = if whole.is_empty() {
        0
    } else {
        whole.parse::<u128>().map_err(|_| invalid())?
    };

    let padded = format!("{:0<width$}", fraction, width = decimals as usize);
    let fraction_units = if padded.is_empty() { 0 } else { padded.parse::<u128>().map_err(|_| invalid())? };

    whole_units
        .checked_mul(scale)
        .and_then(|v| v.checked_add(fraction_units))
        .ok_or_else(invalid)
}

/// Format smallest units as a decimal string without trailing zeros.
pub fn format_units(value: u128, decimals: u8) -> String {
    if decimals == 0 {
        return value.to_string();
    }

    let scale = (10u128).pow(decimals as u32);
    let whole = value / scale;
    let fraction = value % scale;

    if fraction == 0 {
        return whole.to_string();
    }

    let fraction = format!("{:0>width$}", fraction, width = decimals as usize);
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}
