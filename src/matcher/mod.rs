//! Compiled grok matchers and their outcomes.
//!
//! A [`CompiledMatcher`] is produced once by the
//! [`PatternCompiler`](crate::PatternCompiler) and is immutable afterwards, so
//! a single instance is shared (behind an `Arc`) by every worker thread and by
//! the match executors of the timeout enforcer.
//!
//! - [`CompiledMatcher`] - Composed regex plus the group-to-field side table
//! - [`MatchOutcome`] - Result of one bounded match attempt
//! - [`Capture`] - One extracted field value

pub mod compiled;
pub mod outcome;

pub use compiled::CompiledMatcher;
pub use outcome::{Capture, MatchOutcome};
