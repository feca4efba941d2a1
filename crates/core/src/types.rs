use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// An employee record as persisted and exposed over the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub salary: Salary,
    pub department: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated creation payload for a new employee.
///
/// Field presence and types are checked by the JSON extractor before this
/// struct ever reaches a handler; no further validation happens downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEmployee {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub salary: Salary,
    pub department: String,
}

/// Monetary amount with exactly two fractional digits.
///
/// Held as a count of minor units (cents) so storage and comparison stay
/// exact. Serializes as a decimal string with two fractional digits
/// (`50000` in, `"50000.00"` out); JSON numbers and decimal strings are
/// both accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Salary(i64);

impl Salary {
    /// Builds a salary from a raw count of minor units.
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns the amount in minor units.
    pub fn cents(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Salary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

/// Errors produced while parsing a decimal salary string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SalaryParseError {
    #[error("salary must not be empty")]
    Empty,
    #[error("salary contains a non-digit character: {0}")]
    InvalidDigit(String),
    #[error("salary has more than two decimal places: {0}")]
    TooPrecise(String),
    #[error("salary is out of range: {0}")]
    OutOfRange(String),
}

impl FromStr for Salary {
    type Err = SalaryParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        if digits.is_empty() {
            return Err(SalaryParseError::Empty);
        }

        let (whole, frac) = match digits.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (digits, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(SalaryParseError::Empty);
        }
        if frac.len() > 2 {
            return Err(SalaryParseError::TooPrecise(trimmed.to_string()));
        }
        let all_digits = |value: &str| value.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(whole) || !all_digits(frac) {
            return Err(SalaryParseError::InvalidDigit(trimmed.to_string()));
        }

        let whole_value: i64 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| SalaryParseError::OutOfRange(trimmed.to_string()))?
        };
        let mut frac_value: i64 = if frac.is_empty() {
            0
        } else {
            frac.parse()
                .map_err(|_| SalaryParseError::OutOfRange(trimmed.to_string()))?
        };
        if frac.len() == 1 {
            frac_value *= 10;
        }

        let cents = whole_value
            .checked_mul(100)
            .and_then(|value| value.checked_add(frac_value))
            .ok_or_else(|| SalaryParseError::OutOfRange(trimmed.to_string()))?;
        Ok(Self(if negative { -cents } else { cents }))
    }
}

impl Serialize for Salary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Salary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(SalaryVisitor)
    }
}

struct SalaryVisitor;

impl Visitor<'_> for SalaryVisitor {
    type Value = Salary;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a number or a decimal string with at most two fractional digits")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Salary, E> {
        value
            .checked_mul(100)
            .map(Salary::from_cents)
            .ok_or_else(|| E::custom(format!("salary is out of range: {value}")))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Salary, E> {
        i64::try_from(value)
            .ok()
            .and_then(|value| value.checked_mul(100))
            .map(Salary::from_cents)
            .ok_or_else(|| E::custom(format!("salary is out of range: {value}")))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Salary, E> {
        let cents = (value * 100.0).round();
        if !cents.is_finite() || cents < i64::MIN as f64 || cents > i64::MAX as f64 {
            return Err(E::custom(format!("salary is out of range: {value}")));
        }
        Ok(Salary::from_cents(cents as i64))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Salary, E> {
        value.parse().map_err(E::custom)
    }
}
