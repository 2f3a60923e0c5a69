//! Path Exclusions
//!
//! Matches request paths against exclusion patterns so health endpoints,
//! static assets and similar routes are always served locally instead of
//! being forwarded. Three pattern classes, evaluated in a fixed order:
//! exact paths, glob patterns, regular expressions.
//!
//! Glob semantics: `*` matches within one path segment, `**` matches
//! across segments, `?` matches a single character. Globs are anchored to
//! the whole path.

use std::collections::BTreeSet;

use regex::Regex;

use crate::config::{ConfigError, ConfigResult, ForwardingSettings};

/// Compiled exclusion set.
pub struct PathExclusionMatcher {
    exact: BTreeSet<String>,
    globs: Vec<Regex>,
    regexes: Vec<Regex>,
}

impl PathExclusionMatcher {
    pub fn new(
        exact: BTreeSet<String>,
        glob_patterns: &[String],
        regex_patterns: &[String],
    ) -> ConfigResult<Self> {
        let globs = glob_patterns
            .iter()
            .map(|pattern| compile_glob(pattern))
            .collect::<ConfigResult<Vec<_>>>()?;
        let regexes = regex_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| {
                    ConfigError::invalid_value("excluded_regex", "a valid regex", e.to_string())
                })
            })
            .collect::<ConfigResult<Vec<_>>>()?;
        Ok(Self {
            exact,
            globs,
            regexes,
        })
    }

    pub fn from_settings(settings: &ForwardingSettings) -> ConfigResult<Self> {
        Self::new(
            settings.excluded_exact.clone(),
            &settings.excluded_glob,
            &settings.excluded_regex,
        )
    }

    /// An empty matcher that excludes nothing.
    pub fn empty() -> Self {
        Self {
            exact: BTreeSet::new(),
            globs: Vec::new(),
            regexes: Vec::new(),
        }
    }

    /// Whether the path is excluded from forwarding.
    pub fn is_excluded(&self, path: &str) -> bool {
        if self.exact.contains(path) {
            return true;
        }
        if self.globs.iter().any(|glob| glob.is_match(path)) {
            return true;
        }
        self.regexes.iter().any(|regex| regex.is_match(path))
    }
}

/// Translate a glob pattern into an anchored regex.
fn compile_glob(pattern: &str) -> ConfigResult<Regex> {
    let mut translated = String::with_capacity(pattern.len() + 8);
    translated.push('^');

    let mut chars = pattern.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    translated.push_str(".*");
                } else {
                    translated.push_str("[^/]*");
                }
            }
            '?' => translated.push_str("[^/]"),
            other => translated.push_str(&regex::escape(&other.to_string())),
        }
    }
    translated.push('$');

    Regex::new(&translated).map_err(|e| {
        ConfigError::invalid_value("excluded_glob", "a valid glob pattern", e.to_string())
    })
}
