//! Compiled retention policy patterns.
//!
//! Patterns use the `glob` dialect (`*`, `?`, `[...]`, `[!...]`) extended
//! with brace alternation: `{main,release/*}` matches `main` and every name
//! under `release/`. Alternatives may nest. Braces inside a character class
//! are literal.

use crate::models::RetentionPolicy;
use crate::{Error, Result};
use glob::{MatchOptions, Pattern};
use std::collections::HashMap;

/// Options used for every policy match.
///
/// `*` crosses `/`, so `*` matches `feat/blank` and `ef/*` matches
/// `ef/feature-x/part-2`.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Upper bound on the alternatives one pattern may expand to.
const MAX_ALTERNATIVES: usize = 1024;

/// Policy patterns compiled once per repository scan, keyed by pattern text.
///
/// Policies sharing a pattern share one compiled matcher.
#[derive(Debug, Default)]
pub struct CompiledPatterns {
    patterns: HashMap<String, Vec<Pattern>>,
}

/// Returns the index of the `]` closing the class opened at `open`.
fn class_end(bytes: &[u8], open: usize) -> Option<usize> {
    let mut i = open + 1;
    if bytes.get(i) == Some(&b'!') {
        i += 1;
    }
    // A leading `]` is a class member.
    if bytes.get(i) == Some(&b']') {
        i += 1;
    }
    (i..bytes.len()).find(|&j| bytes[j] == b']')
}

/// Expands brace alternation into plain glob patterns.
fn expand_braces(pattern: &str) -> std::result::Result<Vec<String>, String> {
    let bytes = pattern.as_bytes();
    let mut open = None;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'[' => {
                if let Some(end) = class_end(bytes, i) {
                    i = end;
                }
            },
            b'{' => {
                open = Some(i);
                break;
            },
            b'}' => return Err(format!("unmatched `}}` at offset {i}")),
            _ => {},
        }
        i += 1;
    }
    let Some(open) = open else {
        return Ok(vec![pattern.to_string()]);
    };

    let mut depth = 0usize;
    let mut splits = vec![open];
    let mut close = None;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'[' => {
                if let Some(end) = class_end(bytes, i) {
                    i = end;
                }
            },
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(i);
                    break;
                }
            },
            b',' if depth == 1 => splits.push(i),
            _ => {},
        }
        i += 1;
    }
    let Some(close) = close else {
        return Err(format!("unmatched `{{` at offset {open}"));
    };
    splits.push(close);

    let prefix = &pattern[..open];
    let suffix = &pattern[close + 1..];
    let mut expanded = Vec::new();
    for bounds in splits.windows(2) {
        let alternative = &pattern[bounds[0] + 1..bounds[1]];
        for candidate in expand_braces(&format!("{prefix}{alternative}{suffix}"))? {
            if expanded.len() == MAX_ALTERNATIVES {
                return Err(format!("expands to more than {MAX_ALTERNATIVES} alternatives"));
            }
            expanded.push(candidate);
        }
    }
    Ok(expanded)
}

/// Compiles one policy pattern into its alternatives.
fn compile_pattern(pattern: &str) -> std::result::Result<Vec<Pattern>, String> {
    expand_braces(pattern)?
        .iter()
        .map(|alternative| Pattern::new(alternative).map_err(|e| e.to_string()))
        .collect()
}

impl CompiledPatterns {
    /// Compiles the pattern of every policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] for the first policy whose pattern
    /// does not compile. The whole set is rejected: ignoring one unusable
    /// policy could expire uploads it was meant to keep.
    pub fn compile<'a>(policies: impl IntoIterator<Item = &'a RetentionPolicy>) -> Result<Self> {
        let mut patterns = HashMap::new();
        for policy in policies {
            if patterns.contains_key(&policy.pattern) {
                continue;
            }

            let compiled = compile_pattern(&policy.pattern).map_err(|cause| Error::InvalidPattern {
                policy_id: policy.id,
                pattern: policy.pattern.clone(),
                cause,
            })?;
            patterns.insert(policy.pattern.clone(), compiled);
        }

        Ok(Self { patterns })
    }

    /// Number of distinct patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Returns `true` if no pattern was compiled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns `true` if `pattern` matches `value`.
    ///
    /// `pattern` must have been compiled; asking for an unknown pattern is a
    /// caller bug and never matches.
    #[must_use]
    pub fn matches(&self, pattern: &str, value: &str) -> bool {
        let compiled = self.patterns.get(pattern);
        debug_assert!(compiled.is_some(), "pattern `{pattern}` was not compiled");
        compiled.is_some_and(|alternatives| {
            alternatives
                .iter()
                .any(|p| p.matches_with(value, MATCH_OPTIONS))
        })
    }

    /// Returns `true` if `pattern` matches at least one of `values`.
    #[must_use]
    pub fn matches_any<'v>(&self, pattern: &str, values: impl IntoIterator<Item = &'v str>) -> bool {
        values.into_iter().any(|value| self.matches(pattern, value))
    }
}
