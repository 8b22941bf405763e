//! Grok pattern compiler.
//!
//! The compiler expands a user pattern such as
//! `%{IP:client} %{WORD:method} %{NUMBER:bytes:int}` against a
//! [`PatternRegistry`] into one regular expression with named capture groups,
//! and compiles it into a [`CompiledMatcher`].
//!
//! The compiler is organized into two sub-modules:
//! - `reference` - Tokenization of `%{...}` references
//! - [`capture`] - Group naming, coercions and the group-to-field side table
//!
//! # Expansion rules
//!
//! - `%{SYNTAX:SEMANTIC}` becomes a named group that feeds field `SEMANTIC`.
//! - `%{SYNTAX:SEMANTIC:int}` / `:float` additionally coerces the captured text.
//! - `%{SYNTAX}` becomes a non-capturing group when only named captures are
//!   kept, otherwise a named group feeding field `SYNTAX`.
//! - `%{SYNTAX=REGEX}` defines `SYNTAX` for this pattern only and expands it in
//!   place.
//!
//! Expansion recurses into resolved bodies and is bounded by [`MAX_EXPANSION_DEPTH`].
//!
//! # Examples
//!
//! ```rust
//! use grok_engine::{PatternCompiler, PatternRegistry};
//!
//! let registry = PatternRegistry::with_builtins();
//! let compiler = PatternCompiler::new(&registry);
//! let matcher = compiler.compile("%{IP:client} %{WORD:method} %{NUMBER:bytes:int}")?;
//!
//! let fields: Vec<&str> = matcher.capture_fields().iter().map(|c| c.field.as_str()).collect();
//! assert_eq!(fields, vec!["client", "method", "bytes"]);
//! # Ok::<(), grok_engine::GrokError>(())
//! ```

pub mod capture;
pub(crate) mod reference;

pub use capture::{CaptureField, Coercion};

use crate::error::{GrokError, Result};
use crate::matcher::CompiledMatcher;
use crate::patterns::PatternRegistry;
use capture::{internal_group_name, named_groups, GROUP_PREFIX};
use reference::Reference;
use std::collections::HashMap;

/// Maximum nesting of pattern references before a pattern is considered cyclic.
pub const MAX_EXPANSION_DEPTH: usize = 64;

/// Compiles grok patterns against a registry.
#[derive(Debug, Clone, Copy)]
pub struct PatternCompiler<'r> {
    registry: &'r PatternRegistry,
    named_captures_only: bool,
}

impl<'r> PatternCompiler<'r> {
    /// Create a compiler that keeps only semantic-bearing captures.
    pub fn new(registry: &'r PatternRegistry) -> Self {
        Self {
            registry,
            named_captures_only: true,
        }
    }

    /// Set whether `%{SYNTAX}` references without a semantic are captured.
    pub fn named_captures_only(mut self, named_captures_only: bool) -> Self {
        self.named_captures_only = named_captures_only;
        self
    }

    pub fn registry(&self) -> &PatternRegistry {
        self.registry
    }

    /// Expand `pattern` into a regular expression and the group side table,
    /// without compiling it.
    pub fn expand(&self, pattern: &str) -> Result<(String, Vec<CaptureField>)> {
        let mut expansion = Expansion::new(self, pattern);
        expansion.collect_definitions(pattern);
        let expression = expansion.expand(pattern, &mut Vec::new())?;

        if let Some(offset) = reference::first_malformed(&expression) {
            let tail: String = expression[offset..].chars().take(32).collect();
            return Err(GrokError::InvalidReference(tail));
        }

        let captures = expansion.capture_table(&expression);
        Ok((expression, captures))
    }

    /// Compile `pattern` into a [`CompiledMatcher`].
    ///
    /// # Errors
    ///
    /// Returns [`GrokError::UnresolvedPattern`], [`GrokError::CyclicReference`],
    /// [`GrokError::UnknownCoercion`], [`GrokError::InvalidReference`] or
    /// [`GrokError::InvalidRegex`].
    pub fn compile(&self, pattern: &str) -> Result<CompiledMatcher> {
        let (expression, captures) = self.expand(pattern)?;
        CompiledMatcher::new(pattern, expression, captures)
    }
}

/// Compile `pattern` against `registry`.
pub fn compile(
    pattern: &str,
    registry: &PatternRegistry,
    named_captures_only: bool,
) -> Result<CompiledMatcher> {
    PatternCompiler::new(registry)
        .named_captures_only(named_captures_only)
        .compile(pattern)
}

/// State of one pattern expansion.
struct Expansion<'c, 'r> {
    compiler: &'c PatternCompiler<'r>,
    source: &'c str,
    /// Pattern-local `%{NAME=REGEX}` definitions, consulted before the registry.
    local: HashMap<String, String>,
    /// Generated group identifier -> (field, coercion).
    generated: HashMap<String, (String, Coercion)>,
    next_group: usize,
}

impl<'c, 'r> Expansion<'c, 'r> {
    fn new(compiler: &'c PatternCompiler<'r>, source: &'c str) -> Self {
        Self {
            compiler,
            source,
            local: HashMap::new(),
            generated: HashMap::new(),
            next_group: 0,
        }
    }

    /// Register the inline definitions of the top-level pattern so that plain
    /// references anywhere in it can use them.
    fn collect_definitions(&mut self, text: &str) {
        for reference in reference::scan(text) {
            if let Some(definition) = reference.definition {
                self.local
                    .insert(reference.syntax.to_string(), definition.to_string());
            }
        }
    }

    fn resolve(&self, name: &str) -> Option<String> {
        self.local
            .get(name)
            .map(String::as_str)
            .or_else(|| self.compiler.registry.resolve(name))
            .map(str::to_string)
    }

    /// Substitute every reference in `text`. `stack` holds the names being
    /// expanded on the current path.
    fn expand(&mut self, text: &str, stack: &mut Vec<String>) -> Result<String> {
        let references = reference::scan(text);
        if references.is_empty() {
            return Ok(text.to_string());
        }

        let mut out = String::with_capacity(text.len() * 2);
        let mut last = 0;
        for reference in references {
            out.push_str(&text[last..reference.span.start]);
            let expanded = self.expand_reference(&reference, stack)?;
            out.push_str(&expanded);
            last = reference.span.end;
        }
        out.push_str(&text[last..]);
        Ok(out)
    }

    fn expand_reference(&mut self, reference: &Reference<'_>, stack: &mut Vec<String>) -> Result<String> {
        let syntax = reference.syntax;

        if stack.iter().any(|name| name == syntax) || stack.len() >= MAX_EXPANSION_DEPTH {
            return Err(GrokError::CyclicReference {
                pattern: self.source.to_string(),
                passes: stack.len() + 1,
            });
        }

        let body = match reference.definition {
            Some(definition) => {
                self.local.insert(syntax.to_string(), definition.to_string());
                definition.to_string()
            }
            None => self.resolve(syntax).ok_or_else(|| GrokError::UnresolvedPattern {
                name: syntax.to_string(),
                pattern: self.source.to_string(),
            })?,
        };

        let target = match (reference.semantic, reference.coercion) {
            (Some(semantic), Some(suffix)) => {
                Some((semantic.to_string(), Coercion::parse(suffix, semantic)?))
            }
            (Some(semantic), None) => Some((semantic.to_string(), Coercion::None)),
            (None, _) if !self.compiler.named_captures_only => {
                Some((syntax.to_string(), Coercion::None))
            }
            (None, _) => None,
        };

        // The group is numbered before its body so outer groups precede inner ones.
        let group = target.map(|target| {
            let group = internal_group_name(self.next_group);
            self.next_group += 1;
            self.generated.insert(group.clone(), target);
            group
        });

        stack.push(syntax.to_string());
        let inner = self.expand(&body, stack);
        stack.pop();
        let inner = inner?;

        Ok(match group {
            Some(group) => format!("(?<{group}>{inner})"),
            None => format!("(?:{inner})"),
        })
    }

    /// Build the ordered side table from the named groups of `expression`.
    ///
    /// Groups written directly in pattern text (`(?<name>...)`) feed a field of
    /// the same name.
    fn capture_table(&self, expression: &str) -> Vec<CaptureField> {
        named_groups(expression)
            .into_iter()
            .map(|group| match self.generated.get(&group) {
                Some((field, coercion)) => CaptureField {
                    field: field.clone(),
                    coercion: *coercion,
                    group,
                },
                None => CaptureField {
                    field: group.clone(),
                    coercion: Coercion::None,
                    group,
                },
            })
            .filter(|capture| {
                !capture.group.starts_with(GROUP_PREFIX) || self.generated.contains_key(&capture.group)
            })
            .collect()
    }
}
