use super::{f64_to_hundredths, format_hundredths, parse_hundredths};
use crate::domain::errors::ValidationError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Non-negative instrument price in hundredths of a price unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(i64);

impl Price {
    /// Largest price the journal accepts
    pub const MAX: Price = Price(100_000_000);

    pub fn from_hundredths(value: i64) -> Result<Self, ValidationError> {
        if value < 0 {
            return Err(ValidationError::InvalidPrice(
                "Price must be non-negative".to_string(),
            ));
        }
        Ok(Price(value))
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let value = parse_hundredths(input)
            .ok_or_else(|| ValidationError::InvalidPrice(input.to_string()))?;
        Price::from_hundredths(value)
    }

    pub fn from_f64(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::MustBeFinite);
        }
        let value = f64_to_hundredths(value)
            .ok_or_else(|| ValidationError::InvalidPrice(value.to_string()))?;
        Price::from_hundredths(value)
    }

    pub const fn hundredths(&self) -> i64 {
        self.0
    }

    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Signed distance `self - other` in hundredths
    pub fn distance_from(&self, other: Price) -> i64 {
        self.0 - other.0
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_hundredths(self.0))
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PriceRepr {
    Text(String),
    Number(f64),
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match PriceRepr::deserialize(deserializer)? {
            PriceRepr::Text(text) => Price::parse(&text),
            PriceRepr::Number(number) => Price::from_f64(number),
        }
        .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_new_valid() {
        let price = Price::parse("1.0849").unwrap();
        assert_eq!(price.hundredths(), 108);
        assert_eq!(price.to_string(), "1.08");
    }

    #[test]
    fn test_price_new_negative() {
        let price = Price::parse("-10");
        assert!(price.is_err());
        assert_eq!(
            price.unwrap_err(),
            ValidationError::InvalidPrice("Price must be non-negative".to_string())
        );
    }

    #[test]
    fn test_price_new_zero() {
        let price = Price::from_f64(0.0).unwrap();
        assert_eq!(price.hundredths(), 0);
    }

    #[test]
    fn test_price_nan() {
        assert_eq!(Price::from_f64(f64::NAN), Err(ValidationError::MustBeFinite));
    }

    #[test]
    fn test_price_distance() {
        let entry = Price::parse("100.00").unwrap();
        let exit = Price::parse("102.50").unwrap();
        assert_eq!(exit.distance_from(entry), 250);
        assert_eq!(entry.distance_from(exit), -250);
    }

    #[test]
    fn test_price_serde() {
        let price: Price = serde_json::from_str("2350.5").unwrap();
        assert_eq!(serde_json::to_string(&price).unwrap(), "\"2350.50\"");
    }
}
