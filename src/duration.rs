use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use crate::errors::PagError;

const MS: u64 = 1;
const SECOND: u64 = 1000 * MS;
const MINUTE: u64 = 60 * SECOND;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;
const YEAR: u64 = 365 * DAY;

/// Units in the order they must appear, largest first.
const UNITS: [(&str, u64); 7] = [
    ("y", YEAR),
    ("w", WEEK),
    ("d", DAY),
    ("h", HOUR),
    ("m", MINUTE),
    ("s", SECOND),
    ("ms", MS),
];

/// Duration in the Prometheus config notation (`30s`, `1h30m`, `2w`)
///
/// Millisecond precision. A year is always 365 days and a week 7 days,
/// matching how Prometheus and Alertmanager read their own files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PromDuration(Duration);

impl PromDuration {
    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<Duration> for PromDuration {
    fn from(value: Duration) -> Self {
        Self(value)
    }
}

impl From<PromDuration> for Duration {
    fn from(value: PromDuration) -> Self {
        value.0
    }
}

impl FromStr for PromDuration {
    type Err = PagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PagError::InvalidDuration(s.to_string());

        if s == "0" {
            return Ok(Self::default());
        }
        if s.is_empty() {
            return Err(invalid());
        }

        let mut rest = s;
        let mut total: u64 = 0;
        // index into UNITS of the next unit allowed
        let mut next_unit = 0;

        while !rest.is_empty() {
            let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
            if digits == 0 {
                return Err(invalid());
            }
            let value: u64 = rest[..digits].parse().map_err(|_| invalid())?;
            rest = &rest[digits..];

            // "ms" has to be tried before "m"
            let (position, unit, factor) = UNITS
                .iter()
                .enumerate()
                .filter(|(_, (unit, _))| rest.starts_with(*unit))
                .max_by_key(|(_, (unit, _))| unit.len())
                .map(|(i, (unit, factor))| (i, *unit, *factor))
                .ok_or_else(invalid)?;

            if position < next_unit {
                return Err(invalid());
            }
            next_unit = position + 1;
            rest = &rest[unit.len()..];

            total = value
                .checked_mul(factor)
                .and_then(|v| total.checked_add(v))
                .ok_or_else(invalid)?;
        }

        Ok(Self(Duration::from_millis(total)))
    }
}

impl Display for PromDuration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut millis = self.0.as_millis() as u64;
        if millis == 0 {
            return write!(f, "0s");
        }

        for (unit, factor) in UNITS {
            let count = millis / factor;
            if count > 0 {
                write!(f, "{count}{unit}")?;
                millis -= count * factor;
            }
        }
        Ok(())
    }
}

impl Serialize for PromDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PromDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
