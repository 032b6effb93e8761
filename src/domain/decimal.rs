//! Lossless decimal numeric type backed by rust_decimal.
//!
//! Quantities, prices and fees all flow through this type so that sums stay
//! exact regardless of fold order.

use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lamports per SOL, as a decimal scale.
const NATIVE_DECIMALS: u32 = 9;

/// Lossless decimal numeric type for financial calculations.
///
/// Serializes to a JSON number and accepts JSON numbers on input, which is the
/// shape market-data APIs return prices in.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Decimal(#[serde(with = "rust_decimal::serde::float")] RustDecimal);

impl Decimal {
    pub fn new(value: RustDecimal) -> Self {
        Decimal(value)
    }

    /// Parse a Decimal from a string losslessly.
    ///
    /// Plain notation is tried first; scientific notation (`1.5e-7`) is
    /// accepted as a fallback since RPC nodes and JSON encoders emit both.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        let trimmed = s.trim();
        RustDecimal::from_str(trimmed)
            .or_else(|_| RustDecimal::from_scientific(trimmed))
            .map(Decimal)
    }

    /// Build a decimal from a raw integer amount and its number of decimals.
    ///
    /// Returns `None` when `decimals` exceeds the 28-digit scale limit.
    pub fn from_raw_units(amount: u64, decimals: u32) -> Option<Self> {
        RustDecimal::try_from_i128_with_scale(amount as i128, decimals)
            .ok()
            .map(Decimal)
    }

    /// Convert a fee in lamports into native-currency units.
    pub fn from_lamports(lamports: u64) -> Self {
        // A u64 always fits the 96-bit mantissa at scale 9.
        Decimal(RustDecimal::from_i128_with_scale(
            lamports as i128,
            NATIVE_DECIMALS,
        ))
    }

    /// Format without exponent notation and without trailing zeros.
    pub fn to_canonical_string(&self) -> String {
        format!("{}", self.0.normalize())
    }

    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    pub fn one() -> Self {
        Decimal(RustDecimal::ONE)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the value is < 0.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    pub fn checked_add(self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_add(rhs.0).map(Decimal)
    }

    pub fn checked_sub(self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_sub(rhs.0).map(Decimal)
    }

    pub fn checked_mul(self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_mul(rhs.0).map(Decimal)
    }

    pub fn checked_div(self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_div(rhs.0).map(Decimal)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<RustDecimal> for Decimal {
    fn from(value: RustDecimal) -> Self {
        Decimal(value)
    }
}

impl From<Decimal> for RustDecimal {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Decimal(RustDecimal::from(value))
    }
}

impl std::ops::Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Decimal {
    fn add_assign(&mut self, rhs: Decimal) {
        self.0 += rhs.0;
    }
}

impl std::ops::Sub for Decimal {
    type Output = Decimal;

    fn sub(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 - rhs.0)
    }
}

impl std::ops::SubAssign for Decimal {
    fn sub_assign(&mut self, rhs: Decimal) {
        self.0 -= rhs.0;
    }
}

impl std::ops::Mul for Decimal {
    type Output = Decimal;

    fn mul(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 * rhs.0)
    }
}

impl std::ops::Neg for Decimal {
    type Output = Decimal;

    fn neg(self) -> Decimal {
        Decimal(-self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_parse_plain_and_scientific() {
        assert_eq!(d("0.000015"), d("1.5e-5"));
        assert_eq!(d(" 42 ").to_canonical_string(), "42");
    }

    #[test]
    fn test_canonical_string_strips_trailing_zeros() {
        assert_eq!(d("10.500").to_canonical_string(), "10.5");
        assert_eq!(d("100").to_canonical_string(), "100");
    }

    #[test]
    fn test_from_lamports() {
        assert_eq!(Decimal::from_lamports(5000), d("0.000005"));
        assert_eq!(Decimal::from_lamports(1_000_000_000), Decimal::one());
        assert_eq!(Decimal::from_lamports(0), Decimal::zero());
    }

    #[test]
    fn test_from_raw_units() {
        assert_eq!(Decimal::from_raw_units(1_234_567, 6), Some(d("1.234567")));
        assert_eq!(Decimal::from_raw_units(1, 40), None);
    }

    #[test]
    fn test_assign_ops() {
        let mut acc = Decimal::zero();
        acc += d("10");
        acc -= d("2.5");
        assert_eq!(acc, d("7.5"));
    }

    #[test]
    fn test_sign_predicates() {
        assert!(d("-1").is_negative());
        assert!(!d("1").is_negative());
        assert!(!Decimal::zero().is_negative());
    }

    #[test]
    fn test_checked_ops_overflow() {
        let max = Decimal::new(RustDecimal::MAX);
        assert_eq!(max.checked_mul(d("10")), None);
        assert_eq!(max.checked_add(d("1")), None);
        assert_eq!((-max).checked_sub(d("1")), None);
        assert_eq!(d("2").checked_mul(d("3")), Some(d("6")));
    }

    #[test]
    fn test_checked_div_by_zero() {
        assert_eq!(d("1").checked_div(Decimal::zero()), None);
        assert_eq!(d("1").checked_div(d("4")), Some(d("0.25")));
    }

    #[test]
    fn test_json_number_roundtrip() {
        let value: Decimal = serde_json::from_str("2.5").unwrap();
        assert_eq!(value, d("2.5"));
        assert!(serde_json::to_value(value).unwrap().is_number());
    }
}
