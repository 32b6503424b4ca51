use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

use crate::error::ThresholdError;

/// How the magnitude of a [`Threshold`] is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// An absolute quota: at most `magnitude` calls per key, ever.
    Count,
    /// A share of calls: `magnitude` out of every hundred calls per key.
    Percentage,
}

/// A parsed admission threshold.
///
/// Thresholds are immutable once built. Construction clamps the magnitude so
/// that a percentage never exceeds `100`, and negative inputs become `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Threshold {
    magnitude: u32,
    kind: Kind,
}

impl Threshold {
    const MAX_PERCENT: u32 = 100;

    /// An absolute quota of `magnitude` calls.
    pub fn count(magnitude: u32) -> Self {
        Self {
            magnitude,
            kind: Kind::Count,
        }
    }

    /// A share of `magnitude` percent, clamped to `100`.
    pub fn percentage(magnitude: u32) -> Self {
        Self {
            magnitude: magnitude.min(Self::MAX_PERCENT),
            kind: Kind::Percentage,
        }
    }

    fn clamped(value: i32, kind: Kind) -> Self {
        let magnitude = u32::try_from(value).unwrap_or(0);
        match kind {
            Kind::Count => Self::count(magnitude),
            Kind::Percentage => Self::percentage(magnitude),
        }
    }

    /// Leniently parse a raw configuration value.
    ///
    /// Absent, blank and malformed values all yield `None`, which callers treat
    /// as "no gating configured". Use [`str::parse`] to get the failure reason.
    ///
    /// ```rust
    /// use shot_gate::Threshold;
    ///
    /// assert_eq!(Threshold::parse(Some("10")), Some(Threshold::count(10)));
    /// assert_eq!(Threshold::parse(Some("150%")), Some(Threshold::percentage(100)));
    /// assert_eq!(Threshold::parse(Some("lots")), None);
    /// assert_eq!(Threshold::parse(None), None);
    /// ```
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        raw.and_then(|raw| raw.parse().ok())
    }

    pub fn magnitude(&self) -> u32 {
        self.magnitude
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// True if this threshold refuses every call without consulting a counter.
    pub fn is_closed(&self) -> bool {
        self.magnitude == 0
    }

    /// True if this threshold admits every call without consulting a counter.
    pub fn is_open(&self) -> bool {
        self.kind == Kind::Percentage && self.magnitude >= Self::MAX_PERCENT
    }
}

impl FromStr for Threshold {
    type Err = ThresholdError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw.trim().is_empty() {
            return Err(ThresholdError::Empty);
        }
        let (digits, kind) = match raw.strip_suffix('%') {
            Some(prefix) => (prefix.trim(), Kind::Percentage),
            None => (raw.trim(), Kind::Count),
        };
        let value = digits
            .parse::<i32>()
            .map_err(|source| ThresholdError::Invalid {
                raw: raw.to_string(),
                source,
            })?;
        Ok(Self::clamped(value, kind))
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            Kind::Count => write!(f, "{}", self.magnitude),
            Kind::Percentage => write!(f, "{}%", self.magnitude),
        }
    }
}

impl Serialize for Threshold {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Threshold {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // YAML hands bare numbers over as integers, not strings.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i64),
            Text(String),
        }

        let raw = match Raw::deserialize(deserializer)? {
            Raw::Number(n) => n.to_string(),
            Raw::Text(s) => s,
        };
        raw.parse().map_err(serde::de::Error::custom)
    }
}
