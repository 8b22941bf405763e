//! Compiled matcher shared by all matching operations.

use super::outcome::Capture;
use crate::compiler::CaptureField;
use crate::error::{GrokError, Result};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// A grok pattern compiled into a single regular expression.
///
/// Built once by the compiler and immutable afterwards. The capture table is
/// fixed at compilation time and lists every named group of the expression in
/// positional order together with the field it feeds.
///
/// # Examples
///
/// ```rust
/// use grok_engine::{PatternCompiler, PatternRegistry};
/// use serde_json::json;
///
/// let registry = PatternRegistry::with_builtins();
/// let matcher = PatternCompiler::new(&registry).compile("%{NUMBER:n:int}")?;
///
/// let captures = matcher.execute("took 42 ms")?.expect("matches");
/// assert_eq!(captures[0].field, "n");
/// assert_eq!(captures[0].value, Some(json!(42)));
/// # Ok::<(), grok_engine::GrokError>(())
/// ```
pub struct CompiledMatcher {
    source: String,
    expression: String,
    regex: regress::Regex,
    captures: Vec<CaptureField>,
}

impl CompiledMatcher {
    /// Compile an already expanded expression.
    pub fn new(
        source: impl Into<String>,
        expression: String,
        captures: Vec<CaptureField>,
    ) -> Result<Self> {
        let regex = regress::Regex::new(&expression).map_err(|e| GrokError::InvalidRegex {
            pattern: expression.clone(),
            message: e.to_string(),
        })?;

        Ok(Self {
            source: source.into(),
            expression,
            regex,
            captures,
        })
    }

    /// The user pattern this matcher was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The fully expanded regular expression.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn capture_fields(&self) -> &[CaptureField] {
        &self.captures
    }

    /// Run the matcher to completion against `text`.
    ///
    /// Returns `Ok(None)` when the text does not match, or the captures in
    /// group order when it does. A group that did not participate yields a
    /// capture with no value.
    ///
    /// # Errors
    ///
    /// A panic inside the regex engine is reported as
    /// [`GrokError::MatchRuntime`].
    pub fn execute(&self, text: &str) -> Result<Option<Vec<Capture>>> {
        let found = catch_unwind(AssertUnwindSafe(|| self.regex.find(text)))
            .map_err(|panic| GrokError::MatchRuntime(panic_message(panic.as_ref())))?;

        let Some(found) = found else {
            return Ok(None);
        };

        let captures = self
            .captures
            .iter()
            .map(|capture| {
                let value = found
                    .named_group(&capture.group)
                    .and_then(|range| text.get(range))
                    .map(|matched| capture.coercion.apply(matched));
                Capture::new(capture.field.clone(), value)
            })
            .collect();

        Ok(Some(captures))
    }

    /// Whether `text` matches, ignoring captures and runtime errors.
    pub fn is_match(&self, text: &str) -> bool {
        matches!(self.execute(text), Ok(Some(_)))
    }
}

impl fmt::Debug for CompiledMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledMatcher")
            .field("source", &self.source)
            .field("expression", &self.expression)
            .field("captures", &self.captures)
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "regex engine panicked".to_string()
    }
}
