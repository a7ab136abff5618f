//! Pattern matching over plain chat strings.
//!
//! Patterns are compiled once per filter instance: an invalid regex is
//! reported at construction time via [`PatternError`], never at match
//! time. Matches are enumerated left to right and never overlap. Span
//! indices are visible-character offsets, matching the positions the
//! style walker assigns.

use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use thiserror::Error;

/// Matching semantics for a filter pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindMode {
    /// Literal substring, case-sensitive.
    #[default]
    Plain,
    /// Literal substring, case-folded.
    #[serde(alias = "ignorecase")]
    PlainCaseInsensitive,
    /// Full regular expression, leftmost-first semantics.
    Regex,
}

/// A single non-overlapping match: visible-character offsets, end
/// exclusive, plus the matched text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSpan {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Pattern compilation failure, surfaced when a chain is built.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid regex pattern {pattern:?}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A pattern compiled for one [`FindMode`].
///
/// Case-insensitive literal patterns are compiled as escaped regexes so
/// Unicode case folding comes from the regex engine rather than ad hoc
/// lowercasing.
#[derive(Debug, Clone)]
pub enum CompiledPattern {
    /// The empty pattern: matches nothing, in any mode.
    Empty,
    Literal(String),
    Regex(Regex),
}

impl CompiledPattern {
    pub fn compile(pattern: &str, mode: FindMode) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Ok(Self::Empty);
        }
        match mode {
            FindMode::Plain => Ok(Self::Literal(pattern.to_owned())),
            FindMode::PlainCaseInsensitive => {
                let re = RegexBuilder::new(&regex::escape(pattern))
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| PatternError::InvalidRegex {
                        pattern: pattern.to_owned(),
                        source,
                    })?;
                Ok(Self::Regex(re))
            }
            FindMode::Regex => {
                let re = Regex::new(pattern).map_err(|source| PatternError::InvalidRegex {
                    pattern: pattern.to_owned(),
                    source,
                })?;
                Ok(Self::Regex(re))
            }
        }
    }

    /// The underlying regex, when this pattern has one. Used by replace
    /// filters to expand capture references.
    pub fn as_regex(&self) -> Option<&Regex> {
        match self {
            Self::Regex(re) => Some(re),
            _ => None,
        }
    }

    /// Cheap existence check; stops at the first match.
    pub fn is_match(&self, haystack: &str) -> bool {
        match self {
            Self::Empty => false,
            Self::Literal(needle) => haystack.contains(needle.as_str()),
            Self::Regex(re) => re.is_match(haystack),
        }
    }

    /// All non-overlapping matches, left to right. A zero-width regex
    /// match is dropped rather than reported, so degenerate patterns like
    /// `a*` cannot produce empty replace loops.
    pub fn find_matches(&self, haystack: &str) -> Vec<MatchSpan> {
        let byte_spans: Vec<(usize, usize)> = match self {
            Self::Empty => Vec::new(),
            Self::Literal(needle) => {
                let mut spans = Vec::new();
                let mut from = 0;
                while let Some(pos) = haystack[from..].find(needle.as_str()) {
                    let start = from + pos;
                    spans.push((start, start + needle.len()));
                    from = start + needle.len();
                }
                spans
            }
            Self::Regex(re) => re
                .find_iter(haystack)
                .filter(|m| !m.is_empty())
                .map(|m| (m.start(), m.end()))
                .collect(),
        };
        byte_spans
            .into_iter()
            .map(|(start, end)| MatchSpan {
                start: char_offset(haystack, start),
                end: char_offset(haystack, end),
                text: haystack[start..end].to_owned(),
            })
            .collect()
    }
}

/// Compile-free convenience used where a pattern is applied exactly once.
pub fn find_matches(
    haystack: &str,
    pattern: &str,
    mode: FindMode,
) -> Result<Vec<MatchSpan>, PatternError> {
    Ok(CompiledPattern::compile(pattern, mode)?.find_matches(haystack))
}

/// Existence-only variant of [`find_matches`].
pub fn is_match(haystack: &str, pattern: &str, mode: FindMode) -> Result<bool, PatternError> {
    Ok(CompiledPattern::compile(pattern, mode)?.is_match(haystack))
}

fn char_offset(haystack: &str, byte_offset: usize) -> usize {
    haystack[..byte_offset].chars().count()
}
