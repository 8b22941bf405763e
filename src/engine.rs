//! Grok engine: the matching loop over fields, patterns and values.
//!
//! A [`GrokEngine`] is built once from a [`GrokConfig`]. Construction loads the
//! pattern registry, compiles every configured pattern and starts the timeout
//! monitor; any failure there aborts construction. After that the engine is
//! read-only and can filter records from any number of threads.
//!
//! For each record, fields are visited in configuration order. Every value of
//! a field (a multi-valued field contributes each element) is tried against
//! the field's patterns in order:
//!
//! - a match writes its captures into the record; with `break_on_match` the
//!   remaining patterns for that value are skipped, and once any field has
//!   matched the remaining fields are skipped too;
//! - a timeout stops the field and marks the record as timed out;
//! - a non-match moves on to the next pattern.
//!
//! Records are never dropped. They come back tagged according to the
//! [`FilterOutcome`].

use crate::compiler::PatternCompiler;
use crate::config::GrokConfig;
use crate::error::Result;
use crate::event::Event;
use crate::matcher::{Capture, CompiledMatcher, MatchOutcome};
use crate::patterns::PatternRegistry;
use crate::timeout::{Deadline, TimeoutEnforcer, TimeoutScope};
use rayon::prelude::*;
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Longest value prefix written to logs.
const MAX_LOGGED_VALUE_BYTES: usize = 255;

/// The compiled patterns configured for one field.
#[derive(Debug, Clone)]
pub struct FieldMatchers {
    field: String,
    matchers: Vec<Arc<CompiledMatcher>>,
}

impl FieldMatchers {
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn matchers(&self) -> &[Arc<CompiledMatcher>] {
        &self.matchers
    }
}

/// Outcome of matching one configured field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOutcome {
    /// At least one pattern matched at least one value.
    Matched,
    NotMatched,
    /// A match attempt overran its deadline.
    TimedOut,
    /// The record has no such field.
    Missing,
}

/// Per-record result of [`GrokEngine::filter`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOutcome {
    /// Outcome of every field that was attempted, in order.
    pub fields: Vec<(String, FieldOutcome)>,
}

impl FilterOutcome {
    pub fn is_matched(&self) -> bool {
        self.fields.iter().any(|(_, o)| *o == FieldOutcome::Matched)
    }

    pub fn is_timed_out(&self) -> bool {
        self.fields.iter().any(|(_, o)| *o == FieldOutcome::TimedOut)
    }

    /// Nothing matched, and either no field was attempted or at least one
    /// field failed for a reason other than a timeout.
    pub fn is_failed(&self) -> bool {
        !self.is_matched()
            && (self.fields.is_empty()
                || self
                    .fields
                    .iter()
                    .any(|(_, o)| matches!(o, FieldOutcome::NotMatched | FieldOutcome::Missing)))
    }

    pub fn field(&self, name: &str) -> Option<FieldOutcome> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, outcome)| *outcome)
    }
}

/// Extracts structured fields from records with grok patterns.
///
/// # Examples
///
/// ```rust
/// use grok_engine::{Event, GrokConfig, GrokEngine};
/// use serde_json::json;
///
/// let config = GrokConfig::new()
///     .with_match("message", ["%{IP:client} %{WORD:method} %{NUMBER:bytes:int}"]);
/// let engine = GrokEngine::new(config)?;
///
/// let mut event = Event::with_message("55.3.244.1 GET 15824");
/// let outcome = engine.filter(&mut event);
///
/// assert!(outcome.is_matched());
/// assert_eq!(event.get("client"), Some(&json!("55.3.244.1")));
/// assert_eq!(event.get("method"), Some(&json!("GET")));
/// assert_eq!(event.get("bytes"), Some(&json!(15824)));
/// assert!(event.tags().is_empty());
/// # Ok::<(), grok_engine::GrokError>(())
/// ```
#[derive(Debug)]
pub struct GrokEngine {
    config: GrokConfig,
    registry: PatternRegistry,
    fields: Vec<FieldMatchers>,
    enforcer: TimeoutEnforcer,
}

impl GrokEngine {
    /// Load patterns, compile every configured pattern and start the timeout
    /// monitor.
    ///
    /// # Errors
    ///
    /// Any pattern loading or compilation error, or a failure to start the
    /// monitor thread.
    pub fn new(config: GrokConfig) -> Result<Self> {
        config.validate()?;

        let registry = PatternRegistry::load(&config.registry_sources())?;
        let compiler =
            PatternCompiler::new(&registry).named_captures_only(config.named_captures_only);

        let mut fields = Vec::with_capacity(config.match_patterns.len());
        for (field, patterns) in &config.match_patterns {
            let mut matchers = Vec::with_capacity(patterns.len());
            for pattern in patterns {
                let matcher = compiler.compile(pattern)?;
                info!(
                    field = %field,
                    pattern = %pattern,
                    expression = matcher.expression(),
                    "Grok compiled"
                );
                matchers.push(Arc::new(matcher));
            }
            fields.push(FieldMatchers {
                field: field.clone(),
                matchers,
            });
        }

        let enforcer = match config.timeout() {
            Some(timeout) => {
                TimeoutEnforcer::new(timeout).with_monitor_interval(config.monitor_interval())
            }
            None => TimeoutEnforcer::disabled(),
        };
        enforcer.start()?;

        Ok(Self {
            config,
            registry,
            fields,
            enforcer,
        })
    }

    /// Build an engine from a YAML configuration document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::new(GrokConfig::from_yaml(yaml)?)
    }

    pub fn config(&self) -> &GrokConfig {
        &self.config
    }

    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    pub fn fields(&self) -> &[FieldMatchers] {
        &self.fields
    }

    pub fn enforcer(&self) -> &TimeoutEnforcer {
        &self.enforcer
    }

    /// Match `event` and write captures and tags into it.
    pub fn filter(&self, event: &mut Event) -> FilterOutcome {
        debug!(fields = self.fields.len(), "Running grok filter");

        let scope = self.config.timeout_scope;
        let event_deadline = match scope {
            TimeoutScope::Event => self.enforcer.deadline(),
            _ => Deadline::Unbounded,
        };

        let mut outcome = FilterOutcome::default();
        for field in &self.fields {
            let field_outcome = match event.get(&field.field).map(match_texts) {
                None => FieldOutcome::Missing,
                Some(texts) => {
                    let field_deadline = match scope {
                        TimeoutScope::Pattern => Deadline::Unbounded,
                        TimeoutScope::Field => self.enforcer.deadline(),
                        TimeoutScope::Event => event_deadline,
                    };
                    self.match_field(event, field, &texts, &field_deadline)
                }
            };
            outcome.fields.push((field.field.clone(), field_outcome));

            if field_outcome == FieldOutcome::Matched && self.config.break_on_match {
                break;
            }
        }

        if outcome.is_timed_out() {
            event.tag(&self.config.tag_on_timeout);
        }
        if outcome.is_failed() {
            for tag in &self.config.tag_on_failure {
                event.tag(tag);
            }
        }

        debug!(
            matched = outcome.is_matched(),
            timed_out = outcome.is_timed_out(),
            "Grok filter finished"
        );
        outcome
    }

    /// Filter many records on the rayon pool. Outcomes are returned in input
    /// order.
    pub fn filter_batch(&self, events: &mut [Event]) -> Vec<FilterOutcome> {
        events.par_iter_mut().map(|event| self.filter(event)).collect()
    }

    fn match_field(
        &self,
        event: &mut Event,
        field: &FieldMatchers,
        texts: &[String],
        pooled: &Deadline,
    ) -> FieldOutcome {
        let mut matched = false;

        for text in texts {
            for matcher in &field.matchers {
                let deadline = match self.config.timeout_scope {
                    TimeoutScope::Pattern => self.enforcer.deadline(),
                    _ => *pooled,
                };

                match self.enforcer.run(matcher, text, &deadline) {
                    MatchOutcome::Matched(captures) => {
                        self.apply_captures(event, captures);
                        matched = true;
                        if self.config.break_on_match {
                            break;
                        }
                    }
                    MatchOutcome::NotMatched => {}
                    MatchOutcome::TimedOut(elapsed) => {
                        warn!(
                            field = %field.field,
                            pattern = matcher.source(),
                            elapsed_ms = elapsed.as_millis() as u64,
                            value = %loggable_value(text),
                            "Timeout executing grok"
                        );
                        return FieldOutcome::TimedOut;
                    }
                }
            }
        }

        if matched {
            FieldOutcome::Matched
        } else {
            FieldOutcome::NotMatched
        }
    }

    fn apply_captures(&self, event: &mut Event, captures: Vec<Capture>) {
        // Fields captured by a participating group; sibling groups of the same
        // name that did not participate contribute nothing.
        let participated: HashSet<String> = captures
            .iter()
            .filter(|c| c.value.is_some())
            .map(|c| c.field.clone())
            .collect();

        for capture in captures {
            if capture.value.is_none() && participated.contains(&capture.field) {
                continue;
            }
            if capture.is_empty() && !self.config.keep_empty_captures {
                continue;
            }
            let value = capture.value.unwrap_or(Value::Null);
            if self.config.overwrites(&capture.field) {
                event.set(&capture.field, value);
            } else {
                event.merge(&capture.field, value);
            }
        }
    }
}

/// Texts to match for a field value. Arrays contribute each scalar element;
/// objects and nulls contribute nothing.
fn match_texts(value: &Value) -> Vec<String> {
    match value {
        Value::Array(values) => values.iter().filter_map(scalar_text).collect(),
        other => scalar_text(other).into_iter().collect(),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn loggable_value(value: &str) -> Cow<'_, str> {
    if value.len() <= MAX_LOGGED_VALUE_BYTES {
        return Cow::Borrowed(value);
    }
    let mut end = MAX_LOGGED_VALUE_BYTES;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    Cow::Owned(format!(
        "Value too large to output ({} bytes)! First {} chars are: {}",
        value.len(),
        MAX_LOGGED_VALUE_BYTES,
        &value[..end]
    ))
}
