use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Fixed-point decimal with 8 decimal places, stored as a scaled integer.
///
/// One unit is 10^-8 of a coin, so sums and comparisons are exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(i64);

/// Errors that can occur when parsing a decimal string into an [`Amount`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseAmountError {
    #[error("empty amount")]
    Empty,
    #[error("invalid digit in amount '{0}'")]
    InvalidDigit(String),
    #[error("amount '{0}' has more than 8 decimal places")]
    TooPrecise(String),
    #[error("amount '{0}' is out of range")]
    Overflow(String),
}

impl Amount {
    const SCALE: i64 = 100_000_000;
    const DECIMALS: usize = 8;

    pub const ZERO: Amount = Amount(0);

    /// Round `value` to the nearest unit; `None` if it is not finite or
    /// does not fit in an `i64` of units.
    pub fn from_float(value: f64) -> Option<Self> {
        let units = (value * Self::SCALE as f64).round();
        // i64::MAX as f64 rounds up to 2^63, which is itself out of range
        if units.is_finite() && units >= i64::MIN as f64 && units < i64::MAX as f64 {
            Some(Amount(units as i64))
        } else {
            None
        }
    }

    pub fn from_scaled(value: i64) -> Self {
        Amount(value)
    }

    pub fn to_float(self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    fn from_whole(value: i64) -> Option<Self> {
        value.checked_mul(Self::SCALE).map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = Self::SCALE as u64;
        let whole = abs / scale;
        let frac = abs % scale;
        write!(f, "{sign}{whole}.{frac:08}")
    }
}

impl FromStr for Amount {
    type Err = ParseAmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));

        if whole.is_empty() && frac.is_empty() {
            return Err(ParseAmountError::Empty);
        }
        let is_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if !is_digits(whole) || !is_digits(frac) {
            return Err(ParseAmountError::InvalidDigit(s.to_string()));
        }
        if frac.len() > Self::DECIMALS {
            return Err(ParseAmountError::TooPrecise(s.to_string()));
        }

        let overflow = || ParseAmountError::Overflow(s.to_string());
        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| overflow())?
        };
        // right-pad so "5" means 50000000 units
        let frac: i64 = if frac.is_empty() {
            0
        } else {
            format!("{frac:0<8}").parse().map_err(|_| overflow())?
        };

        let scaled = whole
            .checked_mul(Self::SCALE)
            .and_then(|w| w.checked_add(frac))
            .ok_or_else(overflow)?;
        Ok(Amount(if negative { -scaled } else { scaled }))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_float())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}

struct AmountVisitor;

impl Visitor<'_> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal number or decimal string")
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Amount, E> {
        Amount::from_float(value)
            .ok_or_else(|| E::custom(format!("amount {value} is out of range")))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Amount, E> {
        Amount::from_whole(value).ok_or_else(|| E::custom(format!("amount {value} is out of range")))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Amount, E> {
        i64::try_from(value)
            .ok()
            .and_then(Amount::from_whole)
            .ok_or_else(|| E::custom(format!("amount {value} is out of range")))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Amount, E> {
        value.parse().map_err(E::custom)
    }
}

impl std::ops::Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Amount(self.0 + rhs.0)
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |acc, amount| acc + amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_float_converts_correctly() {
        assert_eq!(Amount::from_float(100.0), Some(Amount::from_scaled(10_000_000_000)));
        assert_eq!(Amount::from_float(7.71), Some(Amount::from_scaled(771_000_000)));
        assert_eq!(Amount::from_float(0.00000001), Some(Amount::from_scaled(1)));
    }

    #[test]
    fn from_float_rounds_to_nearest_unit() {
        assert_eq!(Amount::from_float(1.234567891), Some(Amount::from_scaled(123_456_789)));
        assert_eq!(Amount::from_float(1.234567896), Some(Amount::from_scaled(123_456_790)));
    }

    #[test]
    fn display_always_prints_eight_decimals() {
        assert_eq!(Amount::from_scaled(771_000_000).to_string(), "7.71000000");
        assert_eq!(Amount::from_scaled(1).to_string(), "0.00000001");
        assert_eq!(Amount::ZERO.to_string(), "0.00000000");
        assert_eq!(Amount::from_scaled(-50_000_000).to_string(), "-0.50000000");
    }

    #[test]
    fn parse_exact_decimal() {
        assert_eq!("7.71".parse::<Amount>(), Ok(Amount::from_scaled(771_000_000)));
        assert_eq!("0.00000001".parse::<Amount>(), Ok(Amount::from_scaled(1)));
        assert_eq!("8".parse::<Amount>(), Ok(Amount::from_scaled(800_000_000)));
        assert_eq!(".5".parse::<Amount>(), Ok(Amount::from_scaled(50_000_000)));
        assert_eq!("-12.5".parse::<Amount>(), Ok(Amount::from_scaled(-1_250_000_000)));
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert_eq!("".parse::<Amount>(), Err(ParseAmountError::Empty));
        assert!(matches!(
            "1.2.3".parse::<Amount>(),
            Err(ParseAmountError::InvalidDigit(_))
        ));
        assert!(matches!(
            "0.000000001".parse::<Amount>(),
            Err(ParseAmountError::TooPrecise(_))
        ));
        assert!(matches!(
            "999999999999999".parse::<Amount>(),
            Err(ParseAmountError::Overflow(_))
        ));
    }

    #[test]
    fn deserialize_from_number_and_string() {
        let amounts: Vec<Amount> = serde_json::from_str(r#"[7.71, 8, "0.1", -0.5]"#).unwrap();
        assert_eq!(
            amounts,
            vec![
                Amount::from_scaled(771_000_000),
                Amount::from_scaled(800_000_000),
                Amount::from_scaled(10_000_000),
                Amount::from_scaled(-50_000_000),
            ]
        );
    }

    #[test]
    fn deserialize_rejects_floats_beyond_range() {
        // same magnitude as an integer is already rejected
        assert!(serde_json::from_str::<Amount>("100000000000").is_err());
        assert!(serde_json::from_str::<Amount>("100000000000.0").is_err());
        assert!(serde_json::from_str::<Amount>("-100000000000.0").is_err());
        assert!(serde_json::from_str::<Amount>("92233720368.0").is_ok());
    }

    #[test]
    fn from_float_rejects_unrepresentable_values() {
        assert_eq!(Amount::from_float(1e11), None);
        assert_eq!(Amount::from_float(-1e11), None);
        assert_eq!(Amount::from_float(f64::NAN), None);
        assert_eq!(Amount::from_float(f64::INFINITY), None);
    }

    #[test]
    fn serialize_as_number() {
        let json = serde_json::to_string(&Amount::from_scaled(771_000_000)).unwrap();
        assert_eq!(json, "7.71");
    }

    #[test]
    fn summation_has_no_float_drift() {
        // 0.1 added ten times drifts in f64
        let tenth = Amount::from_float(0.1).unwrap();
        let total: Amount = std::iter::repeat_n(tenth, 10).sum();
        assert_eq!(total, Amount::from_scaled(100_000_000));
    }

    #[test]
    fn checked_add_detects_overflow() {
        assert_eq!(Amount::from_scaled(i64::MAX).checked_add(Amount::from_scaled(1)), None);
        assert_eq!(
            Amount::from_scaled(1).checked_add(Amount::from_scaled(2)),
            Some(Amount::from_scaled(3))
        );
    }

    #[test]
    fn ordering() {
        let negative = Amount::from_scaled(-100);
        let positive = Amount::from_scaled(100);
        assert!(negative < Amount::ZERO);
        assert!(Amount::ZERO < positive);
        assert!(positive.is_positive());
        assert!(!Amount::ZERO.is_positive());
    }
}
