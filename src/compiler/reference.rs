//! Tokenization of `%{SYNTAX:SEMANTIC:TYPE}` references.

use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

/// Marker that opens a pattern reference.
pub(crate) const REFERENCE_OPEN: &str = "%{";

/// One `%{...}` reference found in pattern text.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Reference<'t> {
    /// Byte range of the whole `%{...}` token.
    pub span: Range<usize>,
    /// Registered pattern name.
    pub syntax: &'t str,
    /// Target field name.
    pub semantic: Option<&'t str>,
    /// Coercion suffix, validated by the compiler.
    pub coercion: Option<&'t str>,
    /// Inline body for `%{SYNTAX=REGEX}`.
    pub definition: Option<&'t str>,
}

fn reference_regex() -> &'static Regex {
    static REFERENCE: OnceLock<Regex> = OnceLock::new();
    REFERENCE.get_or_init(|| {
        Regex::new(concat!(
            r"%\{",
            r"(?P<syntax>[A-Za-z0-9_]+)",
            r"(?::(?P<semantic>[@\[\]A-Za-z0-9_.\-]+)(?::(?P<coercion>[A-Za-z0-9_]+))?)?",
            r"(?:=(?P<definition>(?:[^{}\\]|\\.)+))?",
            r"\}",
        ))
        .expect("reference regex is valid")
    })
}

/// Scan `text` left to right for references.
pub(crate) fn scan(text: &str) -> Vec<Reference<'_>> {
    reference_regex()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(Reference {
                span: whole.range(),
                syntax: caps.name("syntax")?.as_str(),
                semantic: caps.name("semantic").map(|m| m.as_str()),
                coercion: caps.name("coercion").map(|m| m.as_str()),
                definition: caps.name("definition").map(|m| m.as_str()),
            })
        })
        .collect()
}

/// Byte offset of the first `%{` that does not start a well-formed reference.
pub(crate) fn first_malformed(text: &str) -> Option<usize> {
    let spans: Vec<Range<usize>> = scan(text).into_iter().map(|r| r.span).collect();
    text.match_indices(REFERENCE_OPEN)
        .map(|(offset, _)| offset)
        .find(|offset| !spans.iter().any(|span| span.start == *offset))
}
