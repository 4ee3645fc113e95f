pub mod money;
pub mod price;

pub use money::Money;
pub use price::Price;

use bigdecimal::{BigDecimal, ToPrimitive};
use std::str::FromStr;

/// Parse a decimal string into hundredths, rounding half-even to two places.
fn parse_hundredths(input: &str) -> Option<i64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let value = BigDecimal::from_str(trimmed).ok()?;
    (value.round(2) * BigDecimal::from(100_i64)).to_i64()
}

/// Convert a finite float into hundredths through its shortest decimal form.
fn f64_to_hundredths(value: f64) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    parse_hundredths(&value.to_string())
}

/// Render hundredths as a plain decimal string ("-12.05").
fn format_hundredths(value: i64) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}
