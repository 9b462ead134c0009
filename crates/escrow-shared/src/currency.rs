//! Money helpers.
//!
//! Amounts at rest are always integer cents. Dollars only appear at the JSON
//! boundary as `f64`.

use crate::error::CurrencyError;

/// Largest magnitude in cents that `f64` still represents exactly.
const MAX_EXACT_CENTS: f64 = 9_007_199_254_740_991.0;

/// Convert a dollar amount to cents, rounding half away from zero.
pub fn dollars_to_cents(amount: f64) -> Result<i64, CurrencyError> {
    if !amount.is_finite() {
        return Err(CurrencyError::NotFinite);
    }
    let cents = (amount * 100.0).round();
    if cents.abs() > MAX_EXACT_CENTS {
        return Err(CurrencyError::OutOfRange);
    }
    Ok(cents as i64)
}

/// Cents back to dollars for response bodies.
pub fn cents_to_dollars(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Format cents the way the dashboard displays them: `$1,234.56`, `-$5.00`.
pub fn format_currency_from_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let magnitude = cents.unsigned_abs();
    let dollars = magnitude / 100;
    let remainder = magnitude % 100;
    format!("{sign}${}.{remainder:02}", group_thousands(dollars))
}

/// `$150.00 held` style label. An empty suffix yields just the amount.
pub fn format_amount_with_suffix(cents: i64, suffix: &str) -> String {
    format!("{} {}", format_currency_from_cents(cents), suffix)
        .trim()
        .to_string()
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
