//! Deadlines and their scope.

use crate::error::GrokError;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Which unit of work shares one timeout budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutScope {
    /// Every matcher attempt against every value gets a fresh budget.
    #[default]
    Pattern,
    /// All attempts for one field share a budget.
    Field,
    /// All attempts for one record share a budget.
    Event,
}

impl TimeoutScope {
    /// Whether several attempts draw from one budget.
    pub fn is_pooled(self) -> bool {
        !matches!(self, TimeoutScope::Pattern)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeoutScope::Pattern => "pattern",
            TimeoutScope::Field => "field",
            TimeoutScope::Event => "event",
        }
    }
}

impl fmt::Display for TimeoutScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeoutScope {
    type Err = GrokError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pattern" => Ok(TimeoutScope::Pattern),
            "field" => Ok(TimeoutScope::Field),
            "event" => Ok(TimeoutScope::Event),
            other => Err(GrokError::Config(format!(
                "unknown timeout_scope '{other}' (expected pattern, field or event)"
            ))),
        }
    }
}

/// Absolute point in time by which a unit of work must finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    /// No bound; matching runs to completion.
    Unbounded,
    At { started: Instant, expires: Instant },
}

impl Deadline {
    /// A deadline `timeout` from now, or [`Deadline::Unbounded`] when the
    /// timeout is absent or zero.
    pub fn after(timeout: Option<Duration>) -> Self {
        Self::starting_at(Instant::now(), timeout)
    }

    pub fn starting_at(started: Instant, timeout: Option<Duration>) -> Self {
        match timeout {
            Some(timeout) if !timeout.is_zero() => Deadline::At {
                started,
                expires: started + timeout,
            },
            _ => Deadline::Unbounded,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, Deadline::Unbounded)
    }

    pub fn expires(&self) -> Option<Instant> {
        match self {
            Deadline::Unbounded => None,
            Deadline::At { expires, .. } => Some(*expires),
        }
    }

    /// Time left before expiry, `Some(ZERO)` once expired.
    pub fn remaining(&self) -> Option<Duration> {
        self.expires()
            .map(|expires| expires.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.expires().is_some_and(|expires| Instant::now() >= expires)
    }
}
