//! Decimal prices parsed from the catalog's formatted strings.
//!
//! The data endpoint stores prices as display strings (`"$24.99"`,
//! `"1,299"`, `"18 USD"`). Everything that computes with a price (sorting,
//! cart subtotals, order totals, revenue reports) goes through [`Price`].

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, Mul};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A non-currency-aware decimal amount in the store currency (USD).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from an integer number of cents.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// Parse a formatted price string.
    ///
    /// Keeps digits, the decimal point and a leading minus sign; currency
    /// symbols, thousands separators and trailing codes are dropped. Returns
    /// `None` when nothing numeric remains.
    ///
    /// ```
    /// use verdora_core::Price;
    ///
    /// assert_eq!(Price::parse("$1,299.50"), Some(Price::from_cents(129_950)));
    /// assert_eq!(Price::parse("18 USD"), Some(Price::from_cents(1_800)));
    /// assert_eq!(Price::parse("call us"), None);
    /// ```
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        let negative = trimmed.starts_with('-');
        let mut digits: String = trimmed
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        if digits.is_empty() || digits.chars().all(|c| c == '.') {
            return None;
        }
        if negative {
            digits.insert(0, '-');
        }
        Decimal::from_str(&digits).ok().map(Self)
    }

    /// Parse a formatted price, treating anything unparseable as zero.
    #[must_use]
    pub fn parse_or_zero(s: &str) -> Self {
        Self::parse(s).unwrap_or(Self::ZERO)
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Format as a bare two-decimal amount, the shape stored on records.
    #[must_use]
    pub fn to_plain_string(&self) -> String {
        format!("{:.2}", self.0)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Mul<u32> for Price {
    type Output = Self;

    fn mul(self, rhs: u32) -> Self {
        Self(self.0 * Decimal::from(rhs))
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_formats() {
        assert_eq!(Price::parse("25"), Some(Price::from_cents(2_500)));
        assert_eq!(Price::parse("$24.99"), Some(Price::from_cents(2_499)));
        assert_eq!(Price::parse(" 1,050.5 "), Some(Price::from_cents(105_050)));
        assert_eq!(Price::parse("-3.10"), Some(Price::from_cents(-310)));
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        assert_eq!(Price::parse(""), None);
        assert_eq!(Price::parse("$"), None);
        assert_eq!(Price::parse("..."), None);
        assert_eq!(Price::parse("1.2.3"), None);
        assert_eq!(Price::parse_or_zero("free"), Price::ZERO);
    }

    #[test]
    fn test_display_and_plain() {
        let price = Price::from_cents(1_250);
        assert_eq!(price.to_string(), "$12.50");
        assert_eq!(price.to_plain_string(), "12.50");
    }

    #[test]
    fn test_arithmetic() {
        let total: Price = [Price::from_cents(1_000) * 3, Price::from_cents(250)]
            .into_iter()
            .sum();
        assert_eq!(total, Price::from_cents(3_250));
    }

    #[test]
    fn test_serde_uses_decimal_string() {
        let price = Price::from_cents(4_200);
        assert_eq!(serde_json::to_string(&price).unwrap(), "\"42.00\"");
        let parsed: Price = serde_json::from_str("\"42.00\"").unwrap();
        assert_eq!(parsed, price);
    }
}
