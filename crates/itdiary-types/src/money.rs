use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Fixed-point amount with two fraction digits, stored as whole cents.
///
/// Budgets and offer prices share the same column shape: at most
/// [`Money::MAX_INTEGER_DIGITS`] digits before the point and
/// [`Money::FRACTION_DIGITS`] after it, never negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("This field is required.")]
    Empty,
    #[error("Enter a number.")]
    Invalid,
    #[error("Ensure this value is greater than or equal to 0.")]
    Negative,
    #[error("Ensure that there are no more than 2 decimal places.")]
    TooManyDecimals,
    #[error("Ensure that there are no more than 8 digits before the decimal point.")]
    TooLarge,
}

impl Money {
    pub const FRACTION_DIGITS: usize = 2;
    pub const MAX_INTEGER_DIGITS: usize = 8;

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(MoneyError::Empty);
        }

        let (negative, unsigned) = match s.as_bytes()[0] {
            b'-' => (true, &s[1..]),
            b'+' => (false, &s[1..]),
            _ => (false, s),
        };

        let (whole, fraction) = match unsigned.split_once('.') {
            Some((w, f)) => (w, f),
            None => (unsigned, ""),
        };

        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && fraction.is_empty()) || !all_digits(whole) || !all_digits(fraction) {
            return Err(MoneyError::Invalid);
        }

        if fraction.len() > Self::FRACTION_DIGITS {
            return Err(MoneyError::TooManyDecimals);
        }

        let whole = whole.trim_start_matches('0');
        if whole.len() > Self::MAX_INTEGER_DIGITS {
            return Err(MoneyError::TooLarge);
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| MoneyError::Invalid)?
        };
        let mut fraction_cents: i64 = if fraction.is_empty() {
            0
        } else {
            fraction.parse().map_err(|_| MoneyError::Invalid)?
        };
        if fraction.len() == 1 {
            fraction_cents *= 10;
        }

        let cents = whole * 100 + fraction_cents;
        if negative && cents != 0 {
            return Err(MoneyError::Negative);
        }

        Ok(Self(cents))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MoneyVisitor;

        impl Visitor<'_> for MoneyVisitor {
            type Value = Money;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a decimal amount as a string or number")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
                self.visit_str(&v.to_string())
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
                self.visit_str(&v.to_string())
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
                self.visit_str(&v.to_string())
            }
        }

        deserializer.deserialize_any(MoneyVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whole_and_fractional_amounts() {
        assert_eq!("500".parse::<Money>().unwrap().cents(), 50_000);
        assert_eq!("450.5".parse::<Money>().unwrap().cents(), 45_050);
        assert_eq!("0.05".parse::<Money>().unwrap().cents(), 5);
        assert_eq!(".5".parse::<Money>().unwrap().cents(), 50);
        assert_eq!(" 12. ".parse::<Money>().unwrap().cents(), 1_200);
        assert_eq!("-0".parse::<Money>().unwrap().cents(), 0);
    }

    #[test]
    fn rejects_malformed_amounts() {
        assert_eq!("".parse::<Money>(), Err(MoneyError::Empty));
        assert_eq!("abc".parse::<Money>(), Err(MoneyError::Invalid));
        assert_eq!(".".parse::<Money>(), Err(MoneyError::Invalid));
        assert_eq!("1.2.3".parse::<Money>(), Err(MoneyError::Invalid));
        assert_eq!("1e3".parse::<Money>(), Err(MoneyError::Invalid));
        assert_eq!("-5".parse::<Money>(), Err(MoneyError::Negative));
        assert_eq!("1.005".parse::<Money>(), Err(MoneyError::TooManyDecimals));
        assert_eq!("1.500".parse::<Money>(), Err(MoneyError::TooManyDecimals));
        assert_eq!("123456789".parse::<Money>(), Err(MoneyError::TooLarge));
    }

    #[test]
    fn leading_zeros_do_not_count_as_digits() {
        assert_eq!("000012345678.99".parse::<Money>().unwrap().cents(), 1_234_567_899);
    }

    #[test]
    fn displays_two_fraction_digits() {
        assert_eq!(Money::from_cents(45_000).to_string(), "450.00");
        assert_eq!(Money::from_cents(7).to_string(), "0.07");
        assert_eq!(Money::from_cents(-150).to_string(), "-1.50");
    }

    #[test]
    fn serializes_as_decimal_string() {
        let json = serde_json::to_string(&Money::from_cents(10_050)).unwrap();
        assert_eq!(json, "\"100.50\"");

        let from_number: Money = serde_json::from_str("450.5").unwrap();
        assert_eq!(from_number.cents(), 45_050);
        let from_string: Money = serde_json::from_str("\"200\"").unwrap();
        assert_eq!(from_string.cents(), 20_000);
    }
}
