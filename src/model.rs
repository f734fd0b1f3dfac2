use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
}

/// Fixed-point amount with two fraction digits, stored as integer hundredths.
/// Serializes as a fixed 2-decimal string ("500.00", "4.67").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Decimal2(i64);

impl Decimal2 {
    pub fn from_hundredths(hundredths: i64) -> Self {
        Decimal2(hundredths)
    }

    pub fn hundredths(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Decimal2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("not a valid 2-decimal number: {0:?}")]
pub struct ParseDecimalError(pub String);

impl FromStr for Decimal2 {
    type Err = ParseDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseDecimalError(s.to_string());
        let (sign, body) = match s.strip_prefix('-') {
            Some(rest) => (-1i64, rest),
            None => (1i64, s),
        };

        let (whole, frac) = match body.split_once('.') {
            Some((w, f)) => (w, f),
            None => (body, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(err());
        }
        if frac.len() > 2 {
            return Err(err());
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| err())?
        };
        let frac: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| err())? * 10,
            _ => frac.parse().map_err(|_| err())?,
        };

        Ok(Decimal2(sign * (whole * 100 + frac)))
    }
}

impl Serialize for Decimal2 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

struct Decimal2Visitor;

impl<'de> Visitor<'de> for Decimal2Visitor {
    type Value = Decimal2;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a decimal string or number with at most 2 fraction digits")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Decimal2, E> {
        v.parse().map_err(de::Error::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Decimal2, E> {
        Ok(Decimal2(v * 100))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Decimal2, E> {
        self.visit_i64(v as i64)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Decimal2, E> {
        let hundredths = v * 100.0;
        if (hundredths - hundredths.round()).abs() > 1e-6 {
            return Err(de::Error::custom(ParseDecimalError(v.to_string())));
        }
        Ok(Decimal2(hundredths.round() as i64))
    }
}

impl<'de> Deserialize<'de> for Decimal2 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(Decimal2Visitor)
    }
}
