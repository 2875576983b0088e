//! Currency: exact, arbitrary-precision monetary amounts.
//!
//! Amounts are non-negative integers counted in the smallest indivisible
//! denomination (the *base unit*, written `H`). Human-readable text carries a
//! unit suffix:
//!
//! | Suffix | Base units |
//! |--------|------------|
//! | `pS`   | 10^12      |
//! | `nS`   | 10^15      |
//! | `uS`   | 10^18      |
//! | `mS`   | 10^21      |
//! | `SC`   | 10^24 (one whole coin) |
//! | `KS`   | 10^27      |
//! | `MS`   | 10^30      |
//! | `GS`   | 10^33      |
//! | `TS`   | 10^36      |
//!
//! # Examples
//!
//! ```
//! use renterbind_currency::{format, parse, Currency};
//!
//! let c = parse("1.5SC").unwrap();
//! assert_eq!(c, Currency::from(15u64) * Currency::from(10u64).pow(23));
//! assert_eq!(format(&c), "1.5SC");
//!
//! assert_eq!(parse("42H").unwrap(), Currency::from(42u64));
//! assert!(parse("5zZ").is_err());
//! ```

mod amount;
mod parse;

pub use amount::Currency;
pub use parse::{format, parse, unit_exponent, BASE_UNIT, CENTER_EXPONENT, UNITS};

use thiserror::Error;

/// Errors produced while parsing currency text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CurrencyError {
    /// Neither the base-unit marker nor a magnitude suffix was present.
    #[error("currency value is missing units")]
    MissingUnits,

    /// The numeric literal before the unit could not be parsed.
    #[error("malformed number: {0:?}")]
    MalformedNumber(String),

    /// The literal scaled by its unit is not a whole number of base units.
    #[error("non-integer result: {0:?} is not a whole number of base units")]
    NonInteger(String),
}

/// Result type alias for currency operations.
pub type Result<T> = std::result::Result<T, CurrencyError>;
