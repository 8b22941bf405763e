//! Outcome of a single match attempt.

use serde_json::Value;
use std::time::Duration;

/// One named capture produced by a successful match.
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    /// Target field name.
    pub field: String,
    /// Coerced value, or `None` if the group did not participate in the match.
    pub value: Option<Value>,
}

impl Capture {
    pub fn new(field: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            field: field.into(),
            value,
        }
    }

    /// Whether the capture carries no usable text: the group did not
    /// participate, matched the empty string, or failed coercion.
    pub fn is_empty(&self) -> bool {
        match &self.value {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(_) => false,
        }
    }
}

/// Terminal state of one bounded match attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// The matcher matched; captures are in group order.
    Matched(Vec<Capture>),
    /// The matcher ran to completion without matching, or failed at runtime.
    NotMatched,
    /// The attempt overran its deadline after the given wall-clock time.
    TimedOut(Duration),
}

impl MatchOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchOutcome::Matched(_))
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, MatchOutcome::TimedOut(_))
    }

    /// Captures of a successful match.
    pub fn captures(&self) -> Option<&[Capture]> {
        match self {
            MatchOutcome::Matched(captures) => Some(captures),
            _ => None,
        }
    }
}
