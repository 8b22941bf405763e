//! Named pattern registry.
//!
//! A [`PatternRegistry`] maps pattern names (the `SYNTAX` part of a
//! `%{SYNTAX:SEMANTIC}` reference) to raw pattern bodies. It is assembled once
//! from an ordered list of [`PatternSource`]s; a name declared by a later
//! source replaces the body declared by an earlier one, with no merging and no
//! error.

use super::builtin::BUILTIN_PATTERNS;
use crate::error::{GrokError, Result};
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

/// Glob that accepts every file in a pattern directory.
pub const DEFAULT_PATTERNS_GLOB: &str = "*";

/// One source of pattern definitions.
///
/// Sources are applied in order, so later sources take precedence.
#[derive(Debug, Clone, PartialEq)]
pub enum PatternSource {
    /// The built-in pattern library.
    Builtin,

    /// A directory of pattern files, or a single pattern file.
    ///
    /// For a directory, only regular files whose file name matches `glob` are
    /// loaded, in sorted file-name order. Sub-directories are ignored.
    Path { path: PathBuf, glob: String },

    /// Explicit `name -> body` definitions.
    Inline(Vec<(String, String)>),
}

impl PatternSource {
    /// A directory (or file) source that loads every file.
    pub fn dir(path: impl Into<PathBuf>) -> Self {
        Self::Path {
            path: path.into(),
            glob: DEFAULT_PATTERNS_GLOB.to_string(),
        }
    }

    /// A directory source filtered by a file-name glob.
    pub fn dir_with_glob(path: impl Into<PathBuf>, glob: impl Into<String>) -> Self {
        Self::Path {
            path: path.into(),
            glob: glob.into(),
        }
    }

    /// An inline source built from `(name, body)` pairs.
    pub fn inline<I, K, V>(definitions: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Inline(
            definitions
                .into_iter()
                .map(|(name, body)| (name.into(), body.into()))
                .collect(),
        )
    }
}

/// Mapping from pattern name to pattern body.
///
/// # Examples
///
/// ```rust
/// use grok_engine::{PatternRegistry, PatternSource};
///
/// let registry = PatternRegistry::load(&[
///     PatternSource::Builtin,
///     PatternSource::inline([("WORD", r"\b[0-1]\b")]),
/// ])?;
///
/// assert_eq!(registry.resolve("WORD"), Some(r"\b[0-1]\b"));
/// assert!(registry.resolve("NUMBER").is_some());
/// assert!(registry.resolve("NOT_A_PATTERN").is_none());
/// # Ok::<(), grok_engine::GrokError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternRegistry {
    patterns: HashMap<String, String>,
}

impl PatternRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding only the built-in patterns.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.add_patterns_from_str(BUILTIN_PATTERNS);
        registry
    }

    /// Build a registry from an ordered sequence of sources.
    ///
    /// # Errors
    ///
    /// Returns [`GrokError::PatternFileMissing`] if a configured path does not
    /// exist, [`GrokError::InvalidGlob`] for a malformed glob, and
    /// [`GrokError::Io`] if a pattern file cannot be read.
    pub fn load(sources: &[PatternSource]) -> Result<Self> {
        let mut registry = Self::new();
        for source in sources {
            registry.add_source(source)?;
        }
        info!(patterns = registry.len(), "Grok pattern registry loaded");
        Ok(registry)
    }

    /// Apply one source on top of the current definitions.
    pub fn add_source(&mut self, source: &PatternSource) -> Result<usize> {
        match source {
            PatternSource::Builtin => Ok(self.add_patterns_from_str(BUILTIN_PATTERNS)),
            PatternSource::Path { path, glob } => self.add_patterns_from_path(path, glob),
            PatternSource::Inline(definitions) => {
                for (name, body) in definitions {
                    self.add_pattern(name.clone(), body.clone());
                }
                Ok(definitions.len())
            }
        }
    }

    /// Define or replace a single pattern.
    pub fn add_pattern(&mut self, name: impl Into<String>, body: impl Into<String>) {
        self.patterns.insert(name.into(), body.into());
    }

    /// Parse pattern-file text and add every definition it contains.
    ///
    /// Each non-blank, non-comment line is `NAME` followed by whitespace and
    /// the pattern body. Lines without a body are skipped. Returns the number of
    /// definitions added.
    pub fn add_patterns_from_str(&mut self, text: &str) -> usize {
        let mut added = 0;
        for line in text.lines() {
            if let Some((name, body)) = parse_pattern_line(line) {
                self.add_pattern(name, body);
                added += 1;
            }
        }
        added
    }

    /// Load definitions from a single pattern file.
    pub fn add_patterns_from_file(&mut self, path: &Path) -> Result<usize> {
        if !path.exists() {
            return Err(GrokError::PatternFileMissing(path.to_path_buf()));
        }
        info!(path = %path.display(), "Grok loading patterns from file");
        let text = fs::read_to_string(path)?;
        Ok(self.add_patterns_from_str(&text))
    }

    /// Load definitions from a directory filtered by `glob`, or from `path`
    /// itself when it is a file.
    pub fn add_patterns_from_path(&mut self, path: &Path, glob: &str) -> Result<usize> {
        if !path.exists() {
            return Err(GrokError::PatternFileMissing(path.to_path_buf()));
        }
        if !path.is_dir() {
            return self.add_patterns_from_file(path);
        }

        let matcher = glob::Pattern::new(glob).map_err(|e| GrokError::InvalidGlob {
            glob: glob.to_string(),
            message: e.to_string(),
        })?;

        let mut files = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry_path = entry?.path();
            if !entry_path.is_file() {
                continue;
            }
            let matches = entry_path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| matcher.matches(name));
            if matches {
                files.push(entry_path);
            }
        }
        files.sort();
        debug!(dir = %path.display(), glob, files = files.len(), "Grok pattern directory scanned");

        let mut added = 0;
        for file in &files {
            added += self.add_patterns_from_file(file)?;
        }
        Ok(added)
    }

    /// Look up the body registered for `name`.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.patterns.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.patterns.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Registered pattern names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.patterns.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn pattern_line_regex() -> &'static Regex {
    static LINE: OnceLock<Regex> = OnceLock::new();
    LINE.get_or_init(|| {
        Regex::new(r"^\s*([^\s#][^\s]*)[ \t]+(.*?)[\r\n]*$").expect("pattern line regex is valid")
    })
}

/// Split a pattern-file line into `(name, body)`.
fn parse_pattern_line(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let captures = pattern_line_regex().captures(line)?;
    let name = captures.get(1)?.as_str();
    let body = captures.get(2)?.as_str();
    if body.is_empty() {
        return None;
    }
    Some((name, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_pattern_line() {
        assert_eq!(parse_pattern_line("WORD \\b\\w+\\b"), Some(("WORD", "\\b\\w+\\b")));
        assert_eq!(
            parse_pattern_line("  SPACED\t\t[a b]+ c"),
            Some(("SPACED", "[a b]+ c"))
        );
        assert_eq!(parse_pattern_line("CRLF \\d+\r"), Some(("CRLF", "\\d+")));
        assert_eq!(parse_pattern_line("# COMMENT .*"), None);
        assert_eq!(parse_pattern_line("   "), None);
        assert_eq!(parse_pattern_line("NAME_ONLY"), None);
    }

    #[test]
    fn test_builtins_loaded() {
        let registry = PatternRegistry::with_builtins();
        for name in ["WORD", "NUMBER", "IP", "IPV4", "SYSLOGLINE", "LOGLEVEL"] {
            assert!(registry.contains(name), "missing builtin {name}");
        }
        assert!(!registry.contains("USERNAME USER"));
    }

    #[test]
    fn test_last_definition_wins() {
        let registry = PatternRegistry::load(&[
            PatternSource::Builtin,
            PatternSource::inline([("WORD", "first")]),
            PatternSource::inline([("WORD", "second")]),
        ])
        .unwrap();
        assert_eq!(registry.resolve("WORD"), Some("second"));
    }

    #[test]
    fn test_missing_path_is_fatal() {
        let result = PatternRegistry::load(&[PatternSource::dir("/definitely/not/here")]);
        assert_eq!(
            result,
            Err(GrokError::PatternFileMissing(PathBuf::from(
                "/definitely/not/here"
            )))
        );
    }

    #[test]
    fn test_directory_glob_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = fs::File::create(dir.path().join("a.pattern")).unwrap();
        writeln!(a, "WORD \\b[0-1]\\b").unwrap();
        let mut b = fs::File::create(dir.path().join("b.pattern")).unwrap();
        writeln!(b, "WORD \\b[2-5]\\b\nEXTRA x+").unwrap();
        let mut old = fs::File::create(dir.path().join("b.pattern.old")).unwrap();
        writeln!(old, "WORD ignored").unwrap();
        fs::create_dir(dir.path().join("subdir")).unwrap();

        let mut registry = PatternRegistry::new();
        let added = registry
            .add_patterns_from_path(dir.path(), "*.pattern")
            .unwrap();

        assert_eq!(added, 3);
        assert_eq!(registry.resolve("WORD"), Some("\\b[2-5]\\b"));
        assert_eq!(registry.resolve("EXTRA"), Some("x+"));
    }

    #[test]
    fn test_invalid_glob() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = PatternRegistry::new();
        let result = registry.add_patterns_from_path(dir.path(), "[");
        assert!(matches!(result, Err(GrokError::InvalidGlob { .. })));
    }

    #[test]
    fn test_single_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("custom");
        fs::write(&file, "POSTFIX_QUEUEID [0-9A-F]{10,11}\n").unwrap();

        let registry = PatternRegistry::load(&[PatternSource::dir(&file)]).unwrap();
        assert_eq!(registry.resolve("POSTFIX_QUEUEID"), Some("[0-9A-F]{10,11}"));
    }

    #[test]
    fn test_names_sorted() {
        let mut registry = PatternRegistry::new();
        registry.add_pattern("B", "b");
        registry.add_pattern("A", "a");
        assert_eq!(registry.names(), vec!["A", "B"]);
    }
}
