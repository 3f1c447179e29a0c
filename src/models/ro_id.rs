use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::ServiceError;

/// Highest sequence number a single period can hand out.
pub const MAX_SEQUENCE: u32 = 9999;

/// Year/month bucket that order sequences restart in, rendered as `YYMM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period {
    year: u16,
    month: u8,
}

impl Period {
    pub fn new(year: u16, month: u8) -> Result<Self, ServiceError> {
        if !(1..=12).contains(&month) {
            return Err(ServiceError::ValidationError(format!(
                "month {} is out of range",
                month
            )));
        }
        Ok(Self {
            year: year % 100,
            month,
        })
    }

    pub fn of(at: DateTime<Utc>) -> Self {
        Self {
            // rem_euclid keeps the value in 0..100
            year: at.year().rem_euclid(100) as u16,
            month: at.month() as u8,
        }
    }

    /// `YYMM`, e.g. `2603` for March 2026.
    pub fn code(&self) -> String {
        format!("{:02}{:02}", self.year, self.month)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}{:02}", self.year, self.month)
    }
}

/// Replenishment order identifier, `RO-<YYMM>-<NNNN>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoId {
    period: Period,
    sequence: u32,
}

impl RoId {
    pub fn new(period: Period, sequence: u32) -> Result<Self, ServiceError> {
        if sequence == 0 {
            return Err(ServiceError::ValidationError(
                "order sequence starts at 1".to_string(),
            ));
        }
        if sequence > MAX_SEQUENCE {
            return Err(ServiceError::SequenceExhausted(format!(
                "period {} has used all {} order numbers",
                period, MAX_SEQUENCE
            )));
        }
        Ok(Self { period, sequence })
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl fmt::Display for RoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RO-{}-{:04}", self.period, self.sequence)
    }
}

impl FromStr for RoId {
    type Err = ServiceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            ServiceError::ValidationError(format!(
                "'{}' is not a valid order id (expected RO-YYMM-NNNN)",
                value
            ))
        };

        let rest = value.strip_prefix("RO-").ok_or_else(invalid)?;
        let (period, sequence) = rest.split_once('-').ok_or_else(invalid)?;
        if period.len() != 4
            || sequence.len() != 4
            || !period.bytes().all(|b| b.is_ascii_digit())
            || !sequence.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let year: u16 = period[..2].parse().map_err(|_| invalid())?;
        let month: u8 = period[2..].parse().map_err(|_| invalid())?;
        let sequence: u32 = sequence.parse().map_err(|_| invalid())?;

        let period = Period::new(year, month).map_err(|_| invalid())?;
        RoId::new(period, sequence).map_err(|_| invalid())
    }
}

impl Serialize for RoId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RoId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
