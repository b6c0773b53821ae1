//! Expiration specs and age formatting.
//!
//! An expiration is written as `"<amount> <unit>"`, e.g. `300 SECONDS`,
//! `8 HOURS` or `2.5 DAYS`. The unit is one of SECONDS, MINUTES, HOURS or
//! DAYS (case-insensitive). An empty spec means "never auto-refresh".

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tracing::debug;

use crate::{MimirError, Result};

/// Units accepted in an expiration spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    fn millis(self) -> f64 {
        match self {
            TimeUnit::Seconds => 1_000.0,
            TimeUnit::Minutes => 60_000.0,
            TimeUnit::Hours => 3_600_000.0,
            TimeUnit::Days => 86_400_000.0,
        }
    }
}

impl FromStr for TimeUnit {
    type Err = MimirError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SECONDS" => Ok(TimeUnit::Seconds),
            "MINUTES" => Ok(TimeUnit::Minutes),
            "HOURS" => Ok(TimeUnit::Hours),
            "DAYS" => Ok(TimeUnit::Days),
            other => Err(MimirError::Configuration(format!(
                "unknown time unit '{other}' (expected SECONDS, MINUTES, HOURS or DAYS)"
            ))),
        }
    }
}

/// A parsed expiration spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiration {
    spec: String,
    duration: Duration,
}

impl Expiration {
    /// Parse an optional spec. Blank input yields `Ok(None)`.
    pub fn parse(spec: &str) -> Result<Option<Self>> {
        if spec.trim().is_empty() {
            return Ok(None);
        }
        spec.parse().map(Some)
    }

    /// The spec as written by the caller.
    pub fn spec(&self) -> &str {
        &self.spec
    }

    /// The spec converted to a duration.
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl FromStr for Expiration {
    type Err = MimirError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || {
            MimirError::Configuration(format!(
                "invalid expiration '{s}' (expected '<amount> <SECONDS|MINUTES|HOURS|DAYS>')"
            ))
        };

        let mut tokens = s.split_whitespace();
        let (Some(amount), Some(unit), None) = (tokens.next(), tokens.next(), tokens.next()) else {
            return Err(invalid());
        };

        let amount: f64 = amount.parse().map_err(|_| invalid())?;
        if !amount.is_finite() || amount < 0.0 {
            return Err(invalid());
        }
        let unit: TimeUnit = unit.parse()?;

        let millis = (amount * unit.millis()).round() as u64;
        debug!(expiration = s, millis, "expiration translated");
        Ok(Self {
            spec: s.trim().to_string(),
            duration: Duration::from_millis(millis),
        })
    }
}

impl fmt::Display for Expiration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spec)
    }
}

/// Human-readable elapsed time: `"H hours, M minutes, S seconds"`.
pub fn format_age(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!(
        "{} hours, {} minutes, {} seconds",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}
