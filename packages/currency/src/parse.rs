//! Unit-suffixed text form of [`Currency`].
//!
//! Grammar: `<decimal-literal><unit>` where the literal is `digits`,
//! `digits.digits`, `digits.` or `.digits` (no sign, no exponent, no
//! separators) and the unit is [`BASE_UNIT`] or one of [`UNITS`].
//!
//! Scaling is exact: the literal is read as an integer numerator over a power
//! of ten and multiplied by the unit's magnitude, so no value is ever rounded.

use num_bigint::BigUint;
use num_traits::Zero;

use crate::{Currency, CurrencyError, Result};

/// Suffix for a literal count of base units.
pub const BASE_UNIT: &str = "H";

/// Magnitude suffixes, smallest first. `UNITS[4]` is one whole coin.
pub const UNITS: [&str; 9] = ["pS", "nS", "uS", "mS", "SC", "KS", "MS", "GS", "TS"];

/// Power of ten of the whole-coin unit.
pub const CENTER_EXPONENT: u32 = 24;

const WHOLE_COIN_INDEX: usize = 4;
const STEP: u32 = 3;

/// Power of ten (in base units) represented by `UNITS[index]`.
///
/// Panics if `index` is out of range; callers index from [`UNITS`].
pub fn unit_exponent(index: usize) -> u32 {
    assert!(index < UNITS.len(), "unit index {} out of range", index);
    if index >= WHOLE_COIN_INDEX {
        CENTER_EXPONENT + STEP * (index - WHOLE_COIN_INDEX) as u32
    } else {
        CENTER_EXPONENT - STEP * (WHOLE_COIN_INDEX - index) as u32
    }
}

/// Parse unit-suffixed currency text into an exact amount.
///
/// # Errors
///
/// - [`CurrencyError::MissingUnits`] if no recognized suffix is present.
/// - [`CurrencyError::MalformedNumber`] if the literal is not a plain decimal.
/// - [`CurrencyError::NonInteger`] if the scaled value has a fractional part.
pub fn parse(text: &str) -> Result<Currency> {
    let (literal, exponent) = split_unit(text)?;
    let decimal = Decimal::parse(literal)?;
    decimal
        .scale(exponent)
        .ok_or_else(|| CurrencyError::NonInteger(text.to_string()))
}

/// Render an amount with the largest unit that does not exceed it.
///
/// The fractional part is written out exactly with trailing zeros trimmed, so
/// `parse(&format(c)) == c` for every amount. Amounts below one `pS` use the
/// base-unit form.
pub fn format(amount: &Currency) -> String {
    let units = amount.base_units();
    let ten = BigUint::from(10u32);

    let chosen = (0..UNITS.len())
        .rev()
        .find(|&i| *units >= ten.pow(unit_exponent(i)));

    let Some(index) = chosen else {
        return format!("{}{}", units, BASE_UNIT);
    };

    let exponent = unit_exponent(index);
    let magnitude = ten.pow(exponent);
    let whole = units / &magnitude;
    let remainder = units % &magnitude;

    if remainder.is_zero() {
        return format!("{}{}", whole, UNITS[index]);
    }

    let mut frac = format!("{:0>width$}", remainder.to_string(), width = exponent as usize);
    while frac.ends_with('0') {
        frac.pop();
    }
    format!("{}.{}{}", whole, frac, UNITS[index])
}

/// Split `text` into its numeric literal and the unit's power of ten.
fn split_unit(text: &str) -> Result<(&str, u32)> {
    if let Some(literal) = text.strip_suffix(BASE_UNIT) {
        return Ok((literal, 0));
    }
    UNITS
        .iter()
        .enumerate()
        .find_map(|(i, unit)| {
            text.strip_suffix(unit)
                .map(|literal| (literal, unit_exponent(i)))
        })
        .ok_or(CurrencyError::MissingUnits)
}

/// A non-negative decimal literal held as `numerator / 10^frac_digits`.
#[derive(Debug, PartialEq, Eq)]
struct Decimal {
    numerator: BigUint,
    frac_digits: u32,
}

impl Decimal {
    fn parse(literal: &str) -> Result<Decimal> {
        let malformed = || CurrencyError::MalformedNumber(literal.to_string());

        let (int_part, frac_part) = match literal.split_once('.') {
            Some((i, f)) => (i, f),
            None => (literal, ""),
        };

        let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if (int_part.is_empty() && frac_part.is_empty())
            || !all_digits(int_part)
            || !all_digits(frac_part)
        {
            return Err(malformed());
        }

        let digits = format!("{}{}", int_part, frac_part);
        let numerator = BigUint::parse_bytes(digits.as_bytes(), 10).ok_or_else(malformed)?;
        let frac_digits = u32::try_from(frac_part.len()).map_err(|_| malformed())?;

        Ok(Decimal {
            numerator,
            frac_digits,
        })
    }

    /// Multiply by `10^exponent`; `None` if the product is not an integer.
    fn scale(&self, exponent: u32) -> Option<Currency> {
        let ten = BigUint::from(10u32);
        if exponent >= self.frac_digits {
            let factor = ten.pow(exponent - self.frac_digits);
            return Some(Currency::from_base_units(&self.numerator * factor));
        }
        let divisor = ten.pow(self.frac_digits - exponent);
        if !(&self.numerator % &divisor).is_zero() {
            return None;
        }
        Some(Currency::from_base_units(&self.numerator / divisor))
    }
}
