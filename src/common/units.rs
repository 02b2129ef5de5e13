// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! Exact conversions between smallest-unit integers and decimal strings.

use crate::domain::error::AppError;
use alloy::primitives::U256;

/// Formats `raw` with `decimals` fractional digits, dropping trailing zeros.
pub fn format_amount(raw: U256, decimals: u8) -> String {
    let digits = raw.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }

    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals + 1 - digits.len()), digits)
    } else {
        digits
    };
    let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
    let frac_trimmed = frac_part.trim_end_matches('0');
    if frac_trimmed.is_empty() {
        int_part.to_string()
    } else {
        format!("{int_part}.{frac_trimmed}")
    }
}

/// Parses a non-negative decimal string into smallest units.
pub fn parse_amount(text: &str, decimals: u8) -> Result<U256, AppError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("amount", "amount is empty"));
    }
    if trimmed.starts_with('-') {
        return Err(AppError::validation(
            "amount",
            format!("'{trimmed}' is negative"),
        ));
    }

    let (int_part, frac_part) = match trimmed.split_once('.') {
        Some((i, f)) => (i, f),
        None => (trimmed, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(AppError::validation("amount", format!("'{trimmed}' has no digits")));
    }
    if !int_part.chars().all(|c| c.is_ascii_digit()) || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(AppError::validation(
            "amount",
            format!("'{trimmed}' is not a decimal number"),
        ));
    }
    if frac_part.len() > decimals as usize {
        return Err(AppError::validation(
            "amount",
            format!("'{trimmed}' has more than {decimals} decimal places"),
        ));
    }

    let mut digits = String::with_capacity(int_part.len() + decimals as usize);
    digits.push_str(int_part);
    digits.push_str(frac_part);
    digits.push_str(&"0".repeat(decimals as usize - frac_part.len()));
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 10).map_err(|_| {
        AppError::validation("amount", format!("'{trimmed}' exceeds the representable range"))
    })
}
