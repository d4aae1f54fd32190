//! Money and quantity primitives.
//!
//! Amounts are fixed-precision decimals (`rust_decimal`), never floats. Both types are
//! non-negative by construction: every operation that could produce a negative value
//! or overflow returns a `DomainError` instead.

use core::fmt;
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Maximum number of fractional digits a `Money` value may carry.
pub const MONEY_SCALE: u32 = 4;

/// Non-negative monetary amount with at most [`MONEY_SCALE`] decimal places.
///
/// Serialized as a decimal string (`"1250.50"`) so no precision is lost in transit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Money(Decimal);

impl Default for Money {
    fn default() -> Self {
        Money::ZERO
    }
}

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Validate a raw decimal.
    pub fn new(value: Decimal) -> DomainResult<Self> {
        if value < Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "amount cannot be negative (got {value})"
            )));
        }
        let value = value.normalize();
        if value.scale() > MONEY_SCALE {
            return Err(DomainError::validation(format!(
                "amount has more than {MONEY_SCALE} decimal places (got {value})"
            )));
        }
        Ok(Self(value))
    }

    /// Amount expressed in minor units with a scale of 2 (e.g. cents).
    pub fn from_minor(minor: u64) -> Self {
        Self((Decimal::from(minor) / Decimal::ONE_HUNDRED).normalize())
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::invariant("amount overflow"))
    }

    /// Addition for replaying already validated facts, where failing is not an option.
    pub fn saturating_add(self, other: Money) -> Money {
        Money(self.0.saturating_add(other.0))
    }

    /// Subtract, refusing to go below zero.
    pub fn checked_sub(self, other: Money) -> DomainResult<Money> {
        if other.0 > self.0 {
            return Err(DomainError::invariant(format!(
                "amount would go negative ({} - {})",
                self.0, other.0
            )));
        }
        Ok(Money(self.0 - other.0))
    }

    /// Line total: `self × quantity`.
    pub fn times(self, quantity: Quantity) -> DomainResult<Money> {
        self.0
            .checked_mul(Decimal::from(quantity.get()))
            .map(Money)
            .ok_or_else(|| DomainError::invariant("line total overflow"))
    }

    pub fn sum<'a>(amounts: impl IntoIterator<Item = &'a Money>) -> DomainResult<Money> {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, m| acc.checked_add(*m))
    }
}

impl ValueObject for Money {}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for Money {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("amount cannot be empty"));
        }
        let value = Decimal::from_str_exact(trimmed)
            .map_err(|e| DomainError::validation(format!("invalid amount '{trimmed}': {e}")))?;
        Money::new(value)
    }
}

impl TryFrom<String> for Money {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Money> for String {
    fn from(value: Money) -> Self {
        value.0.to_string()
    }
}

/// Non-negative unit count.
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Quantity(u32);

impl Quantity {
    pub const ZERO: Quantity = Quantity(0);

    pub const fn new(units: u32) -> Self {
        Self(units)
    }

    pub const fn get(&self) -> u32 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Quantity) -> DomainResult<Quantity> {
        self.0
            .checked_add(other.0)
            .map(Quantity)
            .ok_or_else(|| DomainError::invariant("quantity overflow"))
    }

    pub const fn saturating_add(self, other: Quantity) -> Quantity {
        Quantity(self.0.saturating_add(other.0))
    }

    /// Subtract, refusing to go below zero (no negative stock).
    pub fn checked_sub(self, other: Quantity) -> DomainResult<Quantity> {
        self.0.checked_sub(other.0).map(Quantity).ok_or_else(|| {
            DomainError::invariant(format!("quantity would go negative ({} - {})", self.0, other.0))
        })
    }
}

impl ValueObject for Quantity {}

impl From<u32> for Quantity {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn default_is_zero() {
        assert_eq!(Money::default(), Money::ZERO);
        assert!(Money::default().is_zero());
    }

    #[test]
    fn parses_decimal_strings_without_float_drift() {
        let a: Money = "0.1".parse().unwrap();
        let b: Money = "0.2".parse().unwrap();
        assert_eq!(a.checked_add(b).unwrap().amount(), dec!(0.3));
    }

    #[test]
    fn rejects_negative_and_over_precise_amounts() {
        assert!(matches!(
            "-1".parse::<Money>(),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            "1.23456".parse::<Money>(),
            Err(DomainError::Validation(_))
        ));
        assert!("1.230000".parse::<Money>().is_ok());
        assert!("abc".parse::<Money>().is_err());
        assert!("  ".parse::<Money>().is_err());
    }

    #[test]
    fn line_total_multiplies_by_quantity() {
        let unit = Money::new(dec!(100)).unwrap();
        assert_eq!(unit.times(Quantity::new(10)).unwrap().amount(), dec!(1000));
        assert_eq!(Money::from_minor(12_345).amount(), dec!(123.45));
    }

    #[test]
    fn subtraction_never_goes_negative() {
        let small = Money::new(dec!(5)).unwrap();
        let big = Money::new(dec!(6)).unwrap();
        assert!(small.checked_sub(big).is_err());
        assert!(Quantity::new(3).checked_sub(Quantity::new(4)).is_err());
        assert!(Quantity::new(u32::MAX).checked_add(Quantity::new(1)).is_err());
    }

    #[test]
    fn serializes_as_string_and_validates_on_the_way_back() {
        let m = Money::new(dec!(1250.50)).unwrap();
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "\"1250.5\"");
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
        assert!(serde_json::from_str::<Money>("\"-3\"").is_err());
    }

    proptest! {
        #[test]
        fn add_then_sub_restores_original(a in 0u64..10_000_000, b in 0u64..10_000_000) {
            let ma = Money::from_minor(a);
            let mb = Money::from_minor(b);
            let sum = ma.checked_add(mb).unwrap();
            prop_assert_eq!(sum.checked_sub(mb).unwrap(), ma);
            prop_assert!(sum >= ma);
        }
    }
}
