//! Error types for the grok engine crate.
//!
//! Errors fall into two families. Initialization errors (everything a
//! [`GrokEngine`](crate::GrokEngine) can hit while loading patterns and
//! compiling matchers) abort engine construction. Runtime errors are recovered
//! inside the matching loop and never escape a filter call.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GrokError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GrokError {
    /// A `%{NAME}` reference names a pattern that is neither registered nor
    /// defined inline.
    #[error("Unresolved pattern %{{{name}}} in '{pattern}'")]
    UnresolvedPattern { name: String, pattern: String },

    /// Expansion did not reach a fixed point within the pass bound.
    #[error("Cyclic pattern reference in '{pattern}' (no fixed point after {passes} passes)")]
    CyclicReference { pattern: String, passes: usize },

    /// A `%{NAME:semantic:type}` reference used a type other than `int`/`float`.
    #[error("Unknown coercion '{coercion}' for field '{semantic}'")]
    UnknownCoercion { coercion: String, semantic: String },

    /// The composed expression was rejected by the regex engine.
    #[error("Invalid regex pattern '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },

    /// A `%{...}` reference could not be parsed.
    #[error("Invalid pattern reference: {0}")]
    InvalidReference(String),

    /// An explicitly configured pattern path does not exist.
    #[error("Grok pattern file does not exist: {}", .0.display())]
    PatternFileMissing(PathBuf),

    #[error("Invalid pattern file glob '{glob}': {message}")]
    InvalidGlob { glob: String, message: String },

    #[error("IO error: {0}")]
    Io(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The regex engine failed while evaluating a matcher.
    #[error("Match runtime error: {0}")]
    MatchRuntime(String),

    /// A match executor thread could not be started or went away.
    #[error("Match executor unavailable: {0}")]
    ExecutorUnavailable(String),
}

impl GrokError {
    /// Whether this error belongs to the pattern compilation family.
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            GrokError::UnresolvedPattern { .. }
                | GrokError::CyclicReference { .. }
                | GrokError::UnknownCoercion { .. }
                | GrokError::InvalidRegex { .. }
                | GrokError::InvalidReference(_)
        )
    }
}

impl From<std::io::Error> for GrokError {
    fn from(err: std::io::Error) -> Self {
        GrokError::Io(err.to_string())
    }
}

impl From<serde_yaml::Error> for GrokError {
    fn from(err: serde_yaml::Error) -> Self {
        GrokError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for GrokError {
    fn from(err: serde_json::Error) -> Self {
        GrokError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_unresolved_pattern_display() {
        let error = GrokError::UnresolvedPattern {
            name: "NOPE".to_string(),
            pattern: "%{NOPE:x}".to_string(),
        };
        assert_eq!(error.to_string(), "Unresolved pattern %{NOPE} in '%{NOPE:x}'");
        assert!(error.source().is_none());
    }

    #[test]
    fn test_pattern_file_missing_display() {
        let error = GrokError::PatternFileMissing(PathBuf::from("/nowhere/patterns"));
        assert_eq!(
            error.to_string(),
            "Grok pattern file does not exist: /nowhere/patterns"
        );
    }

    #[test]
    fn test_compile_error_family() {
        let compile_errors = vec![
            GrokError::UnresolvedPattern {
                name: "A".to_string(),
                pattern: "%{A}".to_string(),
            },
            GrokError::CyclicReference {
                pattern: "%{A}".to_string(),
                passes: 64,
            },
            GrokError::UnknownCoercion {
                coercion: "bool".to_string(),
                semantic: "flag".to_string(),
            },
            GrokError::InvalidRegex {
                pattern: "(".to_string(),
                message: "unbalanced".to_string(),
            },
            GrokError::InvalidReference("%{}".to_string()),
        ];
        for error in compile_errors {
            assert!(error.is_compile_error(), "{error:?}");
        }

        assert!(!GrokError::PatternFileMissing(PathBuf::from("x")).is_compile_error());
        assert!(!GrokError::MatchRuntime("boom".to_string()).is_compile_error());
        assert!(!GrokError::Io("denied".to_string()).is_compile_error());
    }

    #[test]
    fn test_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let grok_error: GrokError = io_error.into();

        match grok_error {
            GrokError::Io(msg) => assert!(msg.contains("access denied")),
            _ => panic!("Expected Io variant"),
        }
    }

    #[test]
    fn test_from_yaml_error() {
        let yaml_err = serde_yaml::from_str::<serde_yaml::Value>("invalid: yaml: content: [")
            .unwrap_err();
        let grok_error: GrokError = yaml_err.into();
        assert!(matches!(grok_error, GrokError::Config(_)));
    }

    #[test]
    fn test_error_clone_and_equality() {
        let error = GrokError::CyclicReference {
            pattern: "%{LOOP}".to_string(),
            passes: 64,
        };
        assert_eq!(error.clone(), error);
        assert_ne!(
            error,
            GrokError::CyclicReference {
                pattern: "%{LOOP}".to_string(),
                passes: 32,
            }
        );
    }
}
