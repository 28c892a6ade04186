//! Type-safe price representation using decimal arithmetic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Error returned when a price is out of range.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceError {
    /// Negative amounts are not sellable.
    #[error("price cannot be negative")]
    Negative,
    /// More than two fractional digits.
    #[error("price cannot have more than 2 decimal places")]
    TooPrecise,
}

/// A non-negative catalog price in the shop's currency.
///
/// Serialized as a decimal string (`"19.99"`) so no precision is lost on the
/// way through JSON or the featured-products cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// Create a price, rejecting negative or sub-cent amounts.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError`] if the amount is negative or has more than two
    /// decimal places.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative);
        }
        if amount.normalize().scale() > 2 {
            return Err(PriceError::TooPrecise);
        }
        Ok(Self(amount))
    }

    /// The decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_cents() {
        let price = Price::new(Decimal::new(1999, 2)).unwrap();
        assert_eq!(price.to_string(), "19.99");
    }

    #[test]
    fn test_rejects_negative() {
        assert_eq!(Price::new(Decimal::new(-1, 0)), Err(PriceError::Negative));
    }

    #[test]
    fn test_rejects_sub_cent() {
        assert_eq!(
            Price::new(Decimal::new(10_005, 3)),
            Err(PriceError::TooPrecise)
        );
        // Trailing zeros are fine.
        assert!(Price::new(Decimal::new(10_000, 3)).is_ok());
    }

    #[test]
    fn test_serializes_as_string() {
        let price = Price::new(Decimal::new(500, 2)).unwrap();
        assert_eq!(serde_json::to_string(&price).unwrap(), "\"5.00\"");
        let back: Price = serde_json::from_str("\"5.00\"").unwrap();
        assert_eq!(back, price);
        assert!(serde_json::from_str::<Price>("\"-1\"").is_err());
    }
}
