use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;

use crate::error::{LedgerError, Result};

/// Minimal units per whole token (8 decimal places).
pub const SCALE: u64 = 100_000_000;
const SCALE_DIGITS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount cannot be negative: {0}")]
    Negative(String),
    #[error("amount has more than 8 decimal places: {0}")]
    TooPrecise(String),
    #[error("amount out of range: {0}")]
    OutOfRange(String),
    #[error("malformed amount: {0:?}")]
    Malformed(String),
}

/// Non-negative fixed-point token quantity.
///
/// JSON form is a plain decimal number (`10`, `2.5`, `0.00000001`); the
/// value is held as minimal units so sums are exact.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);
    pub const MAX: Amount = Amount(u64::MAX);

    pub const fn from_units(units: u64) -> Self {
        Self(units)
    }

    /// Whole tokens. Saturates at [`Amount::MAX`].
    pub const fn whole(tokens: u64) -> Self {
        Self(tokens.saturating_mul(SCALE))
    }

    pub const fn units(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_integral(&self) -> bool {
        self.0 % SCALE == 0
    }

    /// Guarded subtraction: never produces a negative quantity.
    pub fn checked_sub(self, rhs: Amount) -> Result<Amount> {
        self.0.checked_sub(rhs.0).map(Amount).ok_or_else(|| {
            LedgerError::InsufficientFunds(format!("{self} available, {rhs} required"))
        })
    }

    /// Guarded addition: fails instead of wrapping.
    pub fn checked_add(self, rhs: Amount) -> Result<Amount> {
        self.0
            .checked_add(rhs.0)
            .map(Amount)
            .ok_or_else(|| LedgerError::Overflow(format!("{self} + {rhs} exceeds {}", Amount::MAX)))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / SCALE;
        let frac = self.0 % SCALE;
        if frac == 0 {
            return write!(f, "{whole}");
        }
        let digits = format!("{frac:0width$}", width = SCALE_DIGITS);
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let text = s.trim();
        if text.starts_with('-') {
            return Err(AmountError::Negative(text.to_string()));
        }
        if text.contains(['e', 'E']) {
            return parse_exponent(text);
        }
        parse_plain(text, text)
    }
}

/// Splits `text` at the decimal point; `None` unless both sides are digits.
fn split_decimal(text: &str) -> Option<(&str, &str)> {
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text, ""));
    let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty())
        || !all_digits(int_part)
        || !all_digits(frac_part)
    {
        return None;
    }
    Some((int_part, frac_part))
}

// Errors carry `original` so exponent input is reported as written.
fn parse_plain(text: &str, original: &str) -> std::result::Result<Amount, AmountError> {
    let (int_part, frac_part) =
        split_decimal(text).ok_or_else(|| AmountError::Malformed(original.to_string()))?;
    let frac_trimmed = frac_part.trim_end_matches('0');
    if frac_trimmed.len() > SCALE_DIGITS {
        return Err(AmountError::TooPrecise(original.to_string()));
    }
    let whole: u64 = if int_part.is_empty() {
        0
    } else {
        int_part
            .parse()
            .map_err(|_| AmountError::OutOfRange(original.to_string()))?
    };
    let frac: u64 = if frac_trimmed.is_empty() {
        0
    } else {
        format!("{frac_trimmed:0<width$}", width = SCALE_DIGITS)
            .parse()
            .map_err(|_| AmountError::Malformed(original.to_string()))?
    };
    whole
        .checked_mul(SCALE)
        .and_then(|units| units.checked_add(frac))
        .map(Amount)
        .ok_or_else(|| AmountError::OutOfRange(original.to_string()))
}

/// Exponent notation is legal JSON. The decimal point is shifted in the
/// digit string and the result parsed as a plain decimal, so no precision
/// is lost on the way.
fn parse_exponent(text: &str) -> std::result::Result<Amount, AmountError> {
    let malformed = || AmountError::Malformed(text.to_string());
    let (mantissa, exponent) = text.split_once(['e', 'E']).ok_or_else(malformed)?;
    let exponent: i64 = exponent.parse().map_err(|_| malformed())?;
    let (int_part, frac_part) = split_decimal(mantissa).ok_or_else(malformed)?;

    let digits = format!("{int_part}{frac_part}");
    let unpadded = digits.trim_start_matches('0');
    let significant = unpadded.trim_end_matches('0');
    if significant.is_empty() {
        return Ok(Amount::ZERO);
    }
    // Position of the decimal point measured from the first significant digit.
    let leading_zeros = (digits.len() - unpadded.len()) as i64;
    let point = (int_part.len() as i64 - leading_zeros).saturating_add(exponent);
    if (significant.len() as i64).saturating_sub(point) > SCALE_DIGITS as i64 {
        return Err(AmountError::TooPrecise(text.to_string()));
    }
    // u64::MAX has 20 digits.
    if point > 20 {
        return Err(AmountError::OutOfRange(text.to_string()));
    }

    let plain = if point <= 0 {
        format!("0.{}{significant}", "0".repeat(point.unsigned_abs() as usize))
    } else {
        let point = point as usize;
        if point >= significant.len() {
            format!("{significant}{}", "0".repeat(point - significant.len()))
        } else {
            let (whole, frac) = significant.split_at(point);
            format!("{whole}.{frac}")
        }
    };
    parse_plain(&plain, text)
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let raw = RawValue::from_string(self.to_string()).map_err(S::Error::custom)?;
        raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        raw.get()
            .trim_matches('"')
            .parse()
            .map_err(D::Error::custom)
    }
}
