//! Timestamp decoding for the two server dialects.
//!
//! Most endpoints emit RFC 3339 with a zone, while some older ones emit a
//! bare `YYYY-MM-DDTHH:MM:SS[.ffffff]` which is taken to be UTC. Empty strings
//! and the literal `"null"` mean "no time" and decode to the zero instant.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Which input form a [`FlexTime`] was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeFormat {
    #[default]
    Zero,
    Rfc3339,
    LocalFractional,
    LocalSeconds,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized timestamp: {0:?}")]
pub struct FlexTimeError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlexTime {
    instant: DateTime<Utc>,
    format: TimeFormat,
}

const LOCAL_FRACTIONAL: &str = "%Y-%m-%dT%H:%M:%S%.f";
const LOCAL_SECONDS: &str = "%Y-%m-%dT%H:%M:%S";

impl FlexTime {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Tries each supported form in priority order.
    pub fn parse(raw: &str) -> Result<Self, FlexTimeError> {
        let text = raw.trim();
        if text.is_empty() || text == "null" {
            return Ok(Self::zero());
        }

        if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
            return Ok(Self {
                instant: parsed.with_timezone(&Utc),
                format: TimeFormat::Rfc3339,
            });
        }

        if text.contains('.') {
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, LOCAL_FRACTIONAL) {
                return Ok(Self {
                    instant: naive.and_utc(),
                    format: TimeFormat::LocalFractional,
                });
            }
        } else if let Ok(naive) = NaiveDateTime::parse_from_str(text, LOCAL_SECONDS) {
            return Ok(Self {
                instant: naive.and_utc(),
                format: TimeFormat::LocalSeconds,
            });
        }

        Err(FlexTimeError(raw.to_string()))
    }

    pub fn is_zero(&self) -> bool {
        self.format == TimeFormat::Zero
    }

    pub fn instant(&self) -> Option<DateTime<Utc>> {
        (!self.is_zero()).then_some(self.instant)
    }

    #[cfg(test)]
    pub fn format(&self) -> TimeFormat {
        self.format
    }

    /// RFC 3339 rendering, keeping sub-second digits only when present.
    pub fn to_rfc3339(&self) -> Option<String> {
        self.instant()
            .map(|t| t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    /// Short human form for tables.
    pub fn short(&self) -> String {
        match self.instant() {
            Some(t) => t.format("%Y-%m-%d %H:%M").to_string(),
            None => "-".to_string(),
        }
    }

    /// Seconds elapsed between two instants, zero when either is unset.
    pub fn seconds_until(&self, later: &FlexTime) -> u64 {
        match (self.instant(), later.instant()) {
            (Some(start), Some(end)) if end > start => (end - start).num_seconds().max(0) as u64,
            _ => 0,
        }
    }
}

impl fmt::Display for FlexTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_rfc3339() {
            Some(text) => f.write_str(&text),
            None => f.write_str("-"),
        }
    }
}

impl Serialize for FlexTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.to_rfc3339() {
            Some(text) => serializer.serialize_str(&text),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for FlexTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(text) => FlexTime::parse(&text).map_err(serde::de::Error::custom),
            None => Ok(FlexTime::zero()),
        }
    }
}
