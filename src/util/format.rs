//! Human-readable rendering of ISK amounts and volumes.

use rust_decimal::{Decimal, RoundingStrategy};

/// `1234567.891` → `1,234,567.89 ISK`.
pub fn format_isk(amount: Decimal) -> String {
    format!("{} ISK", group_thousands(amount, 2))
}

/// `1250.5` → `1,251 m³`.
pub fn format_volume(volume: Decimal) -> String {
    format!("{} m³", group_thousands(volume, 0))
}

fn group_thousands(value: Decimal, decimals: u32) -> String {
    let rounded = value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.*}", decimals as usize, rounded.abs());
    let (int_part, frac_part) = match text.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (text.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3 + 4);
    for (idx, ch) in int_part.chars().enumerate() {
        if idx > 0 && (int_part.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if let Some(frac) = frac_part {
        grouped.push('.');
        grouped.push_str(frac);
    }

    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("-{grouped}")
    } else {
        grouped
    }
}
