//! Funnel step windows, parsed from ISO-8601-style durations.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^P(?:(\d+)W)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$")
        .expect("duration pattern is valid")
});

/// A maximum elapsed time between two funnel steps, e.g. `P1D` or `PT2H30M`.
///
/// The original text is retained so requests round-trip byte-identically
/// through serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepWindow {
    raw: String,
    seconds: i64,
}

impl StepWindow {
    /// Parse an ISO-8601-style duration limited to weeks and smaller units.
    pub fn parse(input: &str) -> Result<Self, String> {
        let caps = DURATION_RE
            .captures(input)
            .ok_or_else(|| format!("invalid duration: '{input}'"))?;

        let part = |i: usize| -> i64 {
            caps.get(i)
                .and_then(|m| m.as_str().parse::<i64>().ok())
                .unwrap_or(0)
        };
        let weeks = part(1);
        let days = part(2);
        let hours = part(3);
        let minutes = part(4);
        let secs = part(5);

        let seconds =
            weeks * 7 * 86_400 + days * 86_400 + hours * 3_600 + minutes * 60 + secs;
        if seconds == 0 {
            return Err(format!("duration must be positive: '{input}'"));
        }

        Ok(Self {
            raw: input.to_string(),
            seconds,
        })
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for StepWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for StepWindow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for StepWindow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        StepWindow::parse(&raw).map_err(D::Error::custom)
    }
}
