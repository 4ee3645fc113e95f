use super::{f64_to_hundredths, format_hundredths, parse_hundredths};
use crate::domain::errors::ValidationError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

/// Monetary amount held as integer minor units (cents)
///
/// Can be negative to represent losses. Arithmetic saturates instead of
/// wrapping, so sums over a ledger never overflow into the opposite sign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Whole currency units, e.g. `Money::from_units(100)` is 100.00
    pub const fn from_units(units: i64) -> Self {
        Money(units.saturating_mul(100))
    }

    /// Parse a decimal string, rounding half-even to cents
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        parse_hundredths(input)
            .map(Money)
            .ok_or_else(|| ValidationError::InvalidAmount(input.to_string()))
    }

    /// Convert from a float through its decimal representation
    ///
    /// # Errors
    /// Returns ValidationError::MustBeFinite for NaN or infinite values
    pub fn from_f64(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::MustBeFinite);
        }
        f64_to_hundredths(value)
            .map(Money)
            .ok_or_else(|| ValidationError::InvalidAmount(value.to_string()))
    }

    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Value in currency units, for ratio statistics
    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn is_profit(&self) -> bool {
        self.0 > 0
    }

    pub fn is_loss(&self) -> bool {
        self.0 < 0
    }

    pub fn abs(&self) -> Money {
        Money(self.0.saturating_abs())
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_hundredths(self.0))
    }
}

impl FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse(s)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Money(self.0.saturating_neg())
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Self) {
        *self = *self - other;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AmountRepr {
    Text(String),
    Number(f64),
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match AmountRepr::deserialize(deserializer)? {
            AmountRepr::Text(text) => Money::parse(&text),
            AmountRepr::Number(number) => Money::from_f64(number),
        }
        .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_parse() {
        assert_eq!(Money::parse("1000").unwrap(), Money::from_cents(100_000));
        assert_eq!(Money::parse("-50.25").unwrap(), Money::from_cents(-5025));
        assert!(Money::parse("ten dollars").is_err());
    }

    #[test]
    fn test_money_from_f64() {
        assert_eq!(Money::from_f64(0.1 + 0.2).unwrap(), Money::from_cents(30));
        assert_eq!(Money::from_f64(f64::INFINITY), Err(ValidationError::MustBeFinite));
    }

    #[test]
    fn test_money_arithmetic() {
        let a = Money::from_units(100);
        let b = Money::from_units(-50);
        assert_eq!(a + b, Money::from_units(50));
        assert_eq!(a - b, Money::from_units(150));
        assert_eq!(-a, Money::from_units(-100));

        let mut total = Money::ZERO;
        total += a;
        total -= Money::from_cents(1);
        assert_eq!(total, Money::from_cents(9999));
    }

    #[test]
    fn test_money_sum_has_no_float_drift() {
        let dimes = vec![Money::from_cents(10); 10];
        let total: Money = dimes.iter().sum();
        assert_eq!(total, Money::from_units(1));
    }

    #[test]
    fn test_money_saturates() {
        let max = Money::from_cents(i64::MAX);
        assert_eq!(max + Money::from_cents(1), max);
    }

    #[test]
    fn test_money_profit_loss() {
        assert!(Money::from_units(1).is_profit());
        assert!(Money::from_units(-1).is_loss());
        assert!(!Money::ZERO.is_profit());
        assert!(!Money::ZERO.is_loss());
        assert_eq!(Money::from_units(-3).abs(), Money::from_units(3));
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_cents(123_456).to_string(), "1234.56");
        assert_eq!(Money::from_cents(-78_912).to_string(), "-789.12");
    }

    #[test]
    fn test_money_serde() {
        let json = serde_json::to_string(&Money::from_units(950)).unwrap();
        assert_eq!(json, "\"950.00\"");

        let from_text: Money = serde_json::from_str("\"12.50\"").unwrap();
        let from_number: Money = serde_json::from_str("12.5").unwrap();
        assert_eq!(from_text, from_number);
        assert!(serde_json::from_str::<Money>("\"oops\"").is_err());
    }
}
