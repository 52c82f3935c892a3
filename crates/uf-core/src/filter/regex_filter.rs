//! Regex-backed filters: linear-time engine first, backtracking engine second.

use std::fmt;

/// Compiled expression of a regex filter.
#[derive(Clone)]
pub enum RegexEngine {
    /// `regex` crate, linear time
    Linear(regex::Regex),
    /// `fancy-regex`, for lookaround and backreferences
    Backtracking(fancy_regex::Regex),
}

impl RegexEngine {
    /// Compile with the linear engine, falling back to the backtracking one.
    ///
    /// On failure both engines' messages are returned.
    pub fn compile(pattern: &str, ignore_case: bool) -> Result<Self, (String, String)> {
        match Self::linear(pattern, ignore_case) {
            Ok(engine) => Ok(engine),
            Err(linear) => Self::backtracking(pattern, ignore_case)
                .map_err(|backtracking| (linear, backtracking)),
        }
    }

    pub fn linear(pattern: &str, ignore_case: bool) -> Result<Self, String> {
        regex::RegexBuilder::new(pattern)
            .case_insensitive(ignore_case)
            .build()
            .map(Self::Linear)
            .map_err(|e| e.to_string())
    }

    pub fn backtracking(pattern: &str, ignore_case: bool) -> Result<Self, String> {
        let source = if ignore_case {
            format!("(?i){pattern}")
        } else {
            pattern.to_string()
        };
        fancy_regex::Regex::new(&source)
            .map(Self::Backtracking)
            .map_err(|e| e.to_string())
    }

    pub fn is_backtracking(&self) -> bool {
        matches!(self, Self::Backtracking(_))
    }

    /// Whether the expression matches anywhere in `haystack`.
    ///
    /// Backtracking engine errors (step limit exceeded) count as no match.
    #[inline]
    pub fn is_match(&self, haystack: &str) -> bool {
        match self {
            Self::Linear(re) => re.is_match(haystack),
            Self::Backtracking(re) => re.is_match(haystack).unwrap_or(false),
        }
    }
}

impl fmt::Debug for RegexEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear(re) => write!(f, "Linear({})", re.as_str()),
            Self::Backtracking(re) => write!(f, "Backtracking({})", re.as_str()),
        }
    }
}

/// Regex filter matcher, optionally restricted to the request host.
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    pub engine: RegexEngine,
    pub host_only: bool,
}
