// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Decimal-string amounts to chain base units and back.
//!
//! Both supported chains carry u64 amounts on the wire. Extra fractional
//! digits beyond the token's decimals are truncated, so a parsed amount is
//! never larger than what the user typed.

use crate::error::{WalletError, WalletResult};

/// Parse a human-readable amount (e.g. `"1.5"`) into base units.
pub fn parse_amount(amount: &str, decimals: u8) -> WalletResult<u64> {
    let amount = amount.trim();
    let (whole_str, frac_str) = match amount.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (amount, ""),
    };

    if whole_str.is_empty() && frac_str.is_empty() {
        return Err(invalid(amount, "empty amount"));
    }
    if !whole_str.chars().all(|c| c.is_ascii_digit())
        || !frac_str.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid(amount, "expected digits with an optional decimal point"));
    }

    let whole: u128 = if whole_str.is_empty() {
        0
    } else {
        whole_str
            .parse()
            .map_err(|_| invalid(amount, "whole part out of range"))?
    };

    let decimals = decimals as usize;
    let kept = &frac_str[..frac_str.len().min(decimals)];
    let fraction: u128 = if decimals == 0 {
        0
    } else {
        format!("{kept:0<decimals$}")
            .parse()
            .map_err(|_| invalid(amount, "invalid fractional part"))?
    };

    let multiplier = 10u128
        .checked_pow(decimals as u32)
        .ok_or_else(|| invalid(amount, "too many decimals"))?;
    let total = whole
        .checked_mul(multiplier)
        .and_then(|w| w.checked_add(fraction))
        .ok_or_else(|| invalid(amount, "amount overflow"))?;

    u64::try_from(total).map_err(|_| invalid(amount, "amount overflow"))
}

/// Format base units as a trimmed decimal string.
pub fn format_amount(amount: u64, decimals: u8) -> String {
    if decimals == 0 {
        return amount.to_string();
    }

    let divisor = 10u128.pow(decimals as u32);
    let amount = amount as u128;
    let whole = amount / divisor;
    let remainder = amount % divisor;

    if remainder == 0 {
        return whole.to_string();
    }
    let decimal_str = format!("{:0>width$}", remainder, width = decimals as usize);
    format!("{}.{}", whole, decimal_str.trim_end_matches('0'))
}

fn invalid(amount: &str, reason: &str) -> WalletError {
    WalletError::InvalidAmount(format!("`{amount}`: {reason}"))
}
