//! Configuration for the grok engine.
//!
//! [`GrokConfig`] is the whole configuration surface: which patterns run
//! against which fields, where extra pattern definitions come from, how
//! captures are written back, and how match attempts are bounded in time. It
//! can be built in code with the `with_*` builder methods or deserialized from
//! YAML or JSON.

use crate::error::{GrokError, Result};
use crate::patterns::{PatternSource, DEFAULT_PATTERNS_GLOB};
use crate::timeout::{TimeoutScope, DEFAULT_MONITOR_INTERVAL};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default tag added to records that no pattern matched.
pub const DEFAULT_TAG_ON_FAILURE: &str = "_grokparsefailure";

/// Default tag added to records whose matching timed out.
pub const DEFAULT_TAG_ON_TIMEOUT: &str = "_groktimeout";

/// Default per-attempt budget in milliseconds.
pub const DEFAULT_TIMEOUT_MILLIS: u64 = 30_000;

/// Grok engine configuration.
///
/// # Defaults
///
/// | Option | Default |
/// |--------|---------|
/// | `match` | empty |
/// | `patterns_dir` | empty |
/// | `patterns_files_glob` | `"*"` |
/// | `pattern_definitions` | empty |
/// | `named_captures_only` | `true` |
/// | `keep_empty_captures` | `false` |
/// | `break_on_match` | `true` |
/// | `tag_on_failure` | `["_grokparsefailure"]` |
/// | `tag_on_timeout` | `"_groktimeout"` |
/// | `timeout_millis` | `30000` (`0` disables) |
/// | `timeout_scope` | `pattern` |
/// | `overwrite` | empty |
/// | `monitor_interval_millis` | `250` |
/// | `include_builtin_patterns` | `true` |
///
/// # Examples
///
/// ```rust
/// use grok_engine::{GrokConfig, TimeoutScope};
///
/// let config = GrokConfig::from_yaml(r#"
/// match:
///   message:
///     - "%{SYSLOGLINE}"
///     - "%{GREEDYDATA:message}"
///   path: "%{UNIXPATH:file}"
/// timeout_millis: 500
/// timeout_scope: event
/// overwrite: [message]
/// "#)?;
///
/// assert_eq!(config.match_patterns[0].0, "message");
/// assert_eq!(config.match_patterns[1].1, vec!["%{UNIXPATH:file}"]);
/// assert_eq!(config.timeout_scope, TimeoutScope::Event);
///
/// let config = GrokConfig::new()
///     .with_match("message", ["%{IP:client} %{WORD:method}"])
///     .with_break_on_match(false)
///     .without_timeout();
/// assert!(config.timeout().is_none());
/// # Ok::<(), grok_engine::GrokError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GrokConfig {
    /// Field name -> patterns tried against it, in declaration order.
    #[serde(rename = "match", deserialize_with = "deserialize_match")]
    pub match_patterns: Vec<(String, Vec<String>)>,

    /// Directories (or files) of additional pattern definitions, applied in
    /// order after the built-in patterns.
    pub patterns_dir: Vec<PathBuf>,

    /// File-name glob selecting which files of a pattern directory are loaded.
    pub patterns_files_glob: String,

    /// Inline pattern definitions; these take precedence over every file.
    pub pattern_definitions: BTreeMap<String, String>,

    /// Only `%{SYNTAX:SEMANTIC}` references produce captures.
    pub named_captures_only: bool,

    /// Keep captures that are empty or did not participate in the match.
    pub keep_empty_captures: bool,

    /// Stop at the first matching pattern of a field, and at the first
    /// matching field of a record.
    pub break_on_match: bool,

    #[serde(deserialize_with = "deserialize_one_or_many")]
    pub tag_on_failure: Vec<String>,

    pub tag_on_timeout: String,

    /// Match budget in milliseconds. `0` disables timeouts.
    pub timeout_millis: u64,

    pub timeout_scope: TimeoutScope,

    /// Fields whose existing value is replaced instead of merged.
    pub overwrite: Vec<String>,

    /// Cadence of the timeout monitor in milliseconds.
    pub monitor_interval_millis: u64,

    pub include_builtin_patterns: bool,
}

impl Default for GrokConfig {
    fn default() -> Self {
        Self {
            match_patterns: Vec::new(),
            patterns_dir: Vec::new(),
            patterns_files_glob: DEFAULT_PATTERNS_GLOB.to_string(),
            pattern_definitions: BTreeMap::new(),
            named_captures_only: true,
            keep_empty_captures: false,
            break_on_match: true,
            tag_on_failure: vec![DEFAULT_TAG_ON_FAILURE.to_string()],
            tag_on_timeout: DEFAULT_TAG_ON_TIMEOUT.to_string(),
            timeout_millis: DEFAULT_TIMEOUT_MILLIS,
            timeout_scope: TimeoutScope::default(),
            overwrite: Vec::new(),
            monitor_interval_millis: DEFAULT_MONITOR_INTERVAL.as_millis() as u64,
            include_builtin_patterns: true,
        }
    }
}

impl GrokConfig {
    /// Create a configuration with default settings and no patterns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    /// Check option values that the type system does not.
    pub fn validate(&self) -> Result<()> {
        for (field, patterns) in &self.match_patterns {
            if field.is_empty() {
                return Err(GrokError::Config("match field name is empty".to_string()));
            }
            if patterns.is_empty() {
                return Err(GrokError::Config(format!(
                    "match field '{field}' has no patterns"
                )));
            }
        }
        if self.monitor_interval_millis == 0 {
            return Err(GrokError::Config(
                "monitor_interval_millis must be greater than zero".to_string(),
            ));
        }
        glob::Pattern::new(&self.patterns_files_glob).map_err(|e| GrokError::InvalidGlob {
            glob: self.patterns_files_glob.clone(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Timeout budget, or `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_millis > 0).then(|| Duration::from_millis(self.timeout_millis))
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_millis)
    }

    /// Whether `field` is configured for overwrite.
    pub fn overwrites(&self, field: &str) -> bool {
        self.overwrite.iter().any(|f| f == field)
    }

    /// Pattern sources in precedence order: built-ins, then each pattern
    /// directory, then inline definitions.
    pub fn registry_sources(&self) -> Vec<PatternSource> {
        let mut sources = Vec::with_capacity(self.patterns_dir.len() + 2);
        if self.include_builtin_patterns {
            sources.push(PatternSource::Builtin);
        }
        for dir in &self.patterns_dir {
            sources.push(PatternSource::dir_with_glob(
                dir.clone(),
                self.patterns_files_glob.clone(),
            ));
        }
        if !self.pattern_definitions.is_empty() {
            sources.push(PatternSource::inline(self.pattern_definitions.clone()));
        }
        sources
    }

    /// Set the patterns for `field`, replacing earlier ones for that field.
    pub fn with_match<I, S>(mut self, field: impl Into<String>, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let field = field.into();
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        match self.match_patterns.iter_mut().find(|(f, _)| *f == field) {
            Some((_, existing)) => *existing = patterns,
            None => self.match_patterns.push((field, patterns)),
        }
        self
    }

    /// Append one pattern to `field`.
    pub fn with_pattern(mut self, field: impl Into<String>, pattern: impl Into<String>) -> Self {
        let field = field.into();
        let pattern = pattern.into();
        match self.match_patterns.iter_mut().find(|(f, _)| *f == field) {
            Some((_, existing)) => existing.push(pattern),
            None => self.match_patterns.push((field, vec![pattern])),
        }
        self
    }

    pub fn with_patterns_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.patterns_dir.push(dir.into());
        self
    }

    pub fn with_patterns_files_glob(mut self, glob: impl Into<String>) -> Self {
        self.patterns_files_glob = glob.into();
        self
    }

    pub fn with_pattern_definition(mut self, name: impl Into<String>, body: impl Into<String>) -> Self {
        self.pattern_definitions.insert(name.into(), body.into());
        self
    }

    pub fn with_named_captures_only(mut self, enable: bool) -> Self {
        self.named_captures_only = enable;
        self
    }

    pub fn with_keep_empty_captures(mut self, enable: bool) -> Self {
        self.keep_empty_captures = enable;
        self
    }

    pub fn with_break_on_match(mut self, enable: bool) -> Self {
        self.break_on_match = enable;
        self
    }

    pub fn with_tag_on_failure<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tag_on_failure = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tag_on_timeout(mut self, tag: impl Into<String>) -> Self {
        self.tag_on_timeout = tag.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_millis = timeout.as_millis() as u64;
        self
    }

    /// Disable match timeouts entirely.
    pub fn without_timeout(mut self) -> Self {
        self.timeout_millis = 0;
        self
    }

    pub fn with_timeout_scope(mut self, scope: TimeoutScope) -> Self {
        self.timeout_scope = scope;
        self
    }

    pub fn with_overwrite(mut self, field: impl Into<String>) -> Self {
        self.overwrite.push(field.into());
        self
    }

    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval_millis = (interval.as_millis() as u64).max(1);
        self
    }

    /// Do not load the built-in pattern library.
    pub fn without_builtin_patterns(mut self) -> Self {
        self.include_builtin_patterns = false;
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for Vec<String> {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(one) => vec![one],
            OneOrMany::Many(many) => many,
        }
    }
}

fn deserialize_one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    OneOrMany::deserialize(deserializer).map(Into::into)
}

/// Deserialize `match` as an ordered map, keeping document order.
fn deserialize_match<'de, D>(
    deserializer: D,
) -> std::result::Result<Vec<(String, Vec<String>)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct MatchVisitor;

    impl<'de> Visitor<'de> for MatchVisitor {
        type Value = Vec<(String, Vec<String>)>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a map of field name to pattern or list of patterns")
        }

        fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut fields: Vec<(String, Vec<String>)> = Vec::new();
            while let Some((field, patterns)) = map.next_entry::<String, OneOrMany>()? {
                if fields.iter().any(|(f, _)| *f == field) {
                    return Err(de::Error::custom(format!("duplicate match field '{field}'")));
                }
                fields.push((field, patterns.into()));
            }
            Ok(fields)
        }
    }

    deserializer.deserialize_map(MatchVisitor)
}
