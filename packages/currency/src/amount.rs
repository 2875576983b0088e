//! The `Currency` value type.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul};
use std::str::FromStr;

use num_bigint::BigUint;
use num_traits::Zero;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use crate::CurrencyError;

/// A non-negative amount of base units.
///
/// `Display` and serde both use the plain decimal count of base units
/// (`"1500"`), which is what counterpart signers expect in the interchange
/// format. Use [`crate::format`] for the unit-suffixed human form.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Currency(BigUint);

impl Currency {
    /// The zero amount.
    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    /// Wrap a raw base-unit count.
    pub fn from_base_units(units: BigUint) -> Self {
        Self(units)
    }

    /// Borrow the raw base-unit count.
    pub fn base_units(&self) -> &BigUint {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Subtract, returning `None` when the result would be negative.
    pub fn checked_sub(&self, rhs: &Currency) -> Option<Currency> {
        if self.0 < rhs.0 {
            None
        } else {
            Some(Currency(&self.0 - &rhs.0))
        }
    }

    /// Subtract, clamping at zero.
    pub fn saturating_sub(&self, rhs: &Currency) -> Currency {
        self.checked_sub(rhs).unwrap_or_default()
    }

    /// Raise to a power; used for unit magnitudes.
    pub fn pow(&self, exponent: u32) -> Currency {
        Currency(self.0.pow(exponent))
    }

    /// Big-endian magnitude with no leading zero bytes. Zero encodes as an
    /// empty slice.
    pub fn to_bytes_be(&self) -> Vec<u8> {
        if self.0.is_zero() {
            Vec::new()
        } else {
            self.0.to_bytes_be()
        }
    }

    /// Inverse of [`Currency::to_bytes_be`].
    pub fn from_bytes_be(bytes: &[u8]) -> Currency {
        Currency(BigUint::from_bytes_be(bytes))
    }

    /// Parse a plain decimal count of base units (no unit suffix).
    pub fn from_decimal(text: &str) -> Result<Currency, CurrencyError> {
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CurrencyError::MalformedNumber(text.to_string()));
        }
        BigUint::parse_bytes(text.as_bytes(), 10)
            .map(Currency)
            .ok_or_else(|| CurrencyError::MalformedNumber(text.to_string()))
    }
}

impl From<u64> for Currency {
    fn from(v: u64) -> Self {
        Currency(BigUint::from(v))
    }
}

impl From<BigUint> for Currency {
    fn from(v: BigUint) -> Self {
        Currency(v)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Currency {
    type Err = CurrencyError;

    /// Parses unit-suffixed text; see [`crate::parse`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::parse(s)
    }
}

impl Add for Currency {
    type Output = Currency;

    fn add(self, rhs: Currency) -> Currency {
        Currency(self.0 + rhs.0)
    }
}

impl<'a> Add<&'a Currency> for &'a Currency {
    type Output = Currency;

    fn add(self, rhs: &'a Currency) -> Currency {
        Currency(&self.0 + &rhs.0)
    }
}

impl AddAssign<&Currency> for Currency {
    fn add_assign(&mut self, rhs: &Currency) {
        self.0 += &rhs.0;
    }
}

impl Mul for Currency {
    type Output = Currency;

    fn mul(self, rhs: Currency) -> Currency {
        Currency(self.0 * rhs.0)
    }
}

impl Mul<u64> for &Currency {
    type Output = Currency;

    fn mul(self, rhs: u64) -> Currency {
        Currency(&self.0 * BigUint::from(rhs))
    }
}

impl<'a> Sum<&'a Currency> for Currency {
    fn sum<I: Iterator<Item = &'a Currency>>(iter: I) -> Self {
        iter.fold(Currency::zero(), |mut acc, c| {
            acc += c;
            acc
        })
    }
}

impl Serialize for Currency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Currency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DecimalVisitor;

        impl Visitor<'_> for DecimalVisitor {
            type Value = Currency;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal string of base units")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Currency, E> {
                Currency::from_decimal(v).map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Currency, E> {
                Ok(Currency::from(v))
            }
        }

        deserializer.deserialize_any(DecimalVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_sub_refuses_negative() {
        let a = Currency::from(5u64);
        let b = Currency::from(7u64);
        assert_eq!(a.checked_sub(&b), None);
        assert_eq!(b.checked_sub(&a), Some(Currency::from(2u64)));
        assert_eq!(a.saturating_sub(&b), Currency::zero());
    }

    #[test]
    fn zero_encodes_as_empty() {
        assert!(Currency::zero().to_bytes_be().is_empty());
        assert_eq!(Currency::from(256u64).to_bytes_be(), vec![1, 0]);
        assert_eq!(Currency::from_bytes_be(&[1, 0]), Currency::from(256u64));
    }

    #[test]
    fn sum_of_references() {
        let values = [Currency::from(1u64), Currency::from(2u64), Currency::from(3u64)];
        let total: Currency = values.iter().sum();
        assert_eq!(total, Currency::from(6u64));
    }

    #[test]
    fn serde_uses_decimal_strings() {
        let c = Currency::from(10u64).pow(30);
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, "\"1000000000000000000000000000000\"");
        let back: Currency = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn serde_rejects_garbage() {
        assert!(serde_json::from_str::<Currency>("\"12a\"").is_err());
        assert!(serde_json::from_str::<Currency>("\"-1\"").is_err());
    }

    #[test]
    fn from_decimal_rejects_empty() {
        assert!(matches!(
            Currency::from_decimal(""),
            Err(CurrencyError::MalformedNumber(_))
        ));
    }
}
