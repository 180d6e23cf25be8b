use regex::{Regex, RegexBuilder};

use crate::error::{PolicyError, PolicyResult};
use crate::types::DEFAULT_MAX_PATTERN_LENGTH;

/// Compiled-size ceiling for regex patterns.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Characters that make a pattern a regular expression. `.` is one of them:
/// `acc-...` matches `acc-123`, and a dotted name such as
/// `org.example.CreateVmMsg` is a regex that also matches itself.
const REGEX_META: &[char] = &[
    '\\', '.', '^', '$', '|', '?', '*', '+', '(', ')', '[', ']', '{', '}',
];

/// A parsed action or principal pattern.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// `*`
    Any,
    /// Plain literal, matched by equality.
    Exact(String),
    /// `literal*`
    Prefix(String),
    /// `*literal`
    Suffix(String),
    /// Anything else, matched against the whole candidate. A candidate equal
    /// to the source text matches without running the regex.
    Regex { source: String, regex: Regex },
}

impl Pattern {
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Pattern::Any => true,
            Pattern::Exact(literal) => candidate == literal,
            Pattern::Prefix(prefix) => candidate.starts_with(prefix.as_str()),
            Pattern::Suffix(suffix) => candidate.ends_with(suffix.as_str()),
            Pattern::Regex { source, regex } => {
                candidate == source.as_str() || regex.is_match(candidate)
            }
        }
    }
}

fn is_literal(s: &str) -> bool {
    !s.contains(REGEX_META)
}

/// Compiles action and principal patterns.
///
/// The matcher holds only limits; it has no cache and no interior
/// mutability. Policies are compiled once when loaded (see
/// [`crate::snapshot::PolicySnapshot`]) and evaluation only runs the
/// resulting [`Pattern`] values.
#[derive(Debug, Clone, Copy)]
pub struct PatternMatcher {
    max_pattern_length: usize,
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PATTERN_LENGTH)
    }
}

impl PatternMatcher {
    pub fn new(max_pattern_length: usize) -> Self {
        Self { max_pattern_length }
    }

    pub fn max_pattern_length(&self) -> usize {
        self.max_pattern_length
    }

    /// Parse a pattern string.
    ///
    /// Classes, in order: `*`, plain literal, `literal*`, `*literal`, and
    /// finally an anchored regex. A pattern that is too long or does not
    /// compile is a configuration error.
    pub fn compile(&self, pattern: &str) -> PolicyResult<Pattern> {
        if pattern.len() > self.max_pattern_length {
            return Err(PolicyError::PatternTooLong {
                max: self.max_pattern_length,
                length: pattern.len(),
            });
        }

        if pattern == "*" {
            return Ok(Pattern::Any);
        }
        if is_literal(pattern) {
            return Ok(Pattern::Exact(pattern.to_string()));
        }
        if let Some(prefix) = pattern.strip_suffix('*') {
            if !prefix.is_empty() && is_literal(prefix) {
                return Ok(Pattern::Prefix(prefix.to_string()));
            }
        }
        if let Some(suffix) = pattern.strip_prefix('*') {
            if !suffix.is_empty() && is_literal(suffix) {
                return Ok(Pattern::Suffix(suffix.to_string()));
            }
        }

        let regex = RegexBuilder::new(&format!("^(?:{})$", pattern))
            .size_limit(REGEX_SIZE_LIMIT)
            .build()
            .map_err(|e| PolicyError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Pattern::Regex {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Compile `pattern` and match it against `candidate`.
    ///
    /// One-off convenience; the engine matches precompiled patterns. A
    /// malformed pattern is an error even when it equals the candidate.
    pub fn matches(&self, pattern: &str, candidate: &str) -> PolicyResult<bool> {
        Ok(self.compile(pattern)?.matches(candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(pattern: &str, candidate: &str) -> bool {
        PatternMatcher::default().matches(pattern, candidate).unwrap()
    }

    #[test]
    fn test_exact_match() {
        assert!(m("CreateVmMsg", "CreateVmMsg"));
        assert!(!m("CreateVmMsg", "CreateVmMsgX"));
        assert!(!m("CreateVmMsg", "DeleteVmMsg"));
    }

    #[test]
    fn test_dot_is_a_regex_wildcard() {
        assert!(m("Create.mMsg", "CreateVmMsg"));
        assert!(m("acc-...", "acc-123"));
        assert!(!m("acc-...", "acc-1234"));
        assert!(matches!(
            PatternMatcher::default().compile("acc-...").unwrap(),
            Pattern::Regex { .. }
        ));
    }

    #[test]
    fn test_dotted_name_matches_itself() {
        assert!(m("org.example.vm.CreateVmMsg", "org.example.vm.CreateVmMsg"));
        assert!(!m("org.example.vm.CreateVmMsg", "org.example.vm.DeleteVmMsg"));
    }

    #[test]
    fn test_wildcard_any() {
        assert!(m("*", "CreateVmMsg"));
        assert!(m("*", ""));
    }

    #[test]
    fn test_trailing_wildcard() {
        assert!(m("Query*", "QueryVmMsg"));
        assert!(m("org.example.vm.*", "org.example.vm.CreateVmMsg"));
        assert!(!m("org.example.vm.*", "org.example.host.AddHostMsg"));
        assert!(!m("Query*", "CreateVmMsg"));
    }

    #[test]
    fn test_leading_wildcard() {
        assert!(m("*VmMsg", "CreateVmMsg"));
        assert!(!m("*VmMsg", "CreateHostMsg"));
    }

    #[test]
    fn test_regex_pattern() {
        assert!(m("abc-.*", "abc-123"));
        assert!(!m("abc-.*", "xabc-123"));
        assert!(m("(Create|Delete)VmMsg", "DeleteVmMsg"));
        assert!(!m("(Create|Delete)VmMsg", "UpdateVmMsg"));
    }

    #[test]
    fn test_regex_is_anchored() {
        assert!(!m("Vm", "CreateVmMsg"));
        assert!(!m("Create.+", "xCreateVm"));
        assert!(m("Create.+", "CreateVm"));
    }

    #[test]
    fn test_compile_classes() {
        let matcher = PatternMatcher::default();
        assert!(matches!(matcher.compile("*").unwrap(), Pattern::Any));
        assert!(matches!(matcher.compile("Foo").unwrap(), Pattern::Exact(_)));
        assert!(matches!(matcher.compile("Foo*").unwrap(), Pattern::Prefix(_)));
        assert!(matches!(matcher.compile("*Foo").unwrap(), Pattern::Suffix(_)));
        assert!(matches!(matcher.compile("Fo+").unwrap(), Pattern::Regex { .. }));
        assert!(matches!(matcher.compile("a.*").unwrap(), Pattern::Regex { .. }));
        assert!(matches!(matcher.compile("a.b*").unwrap(), Pattern::Regex { .. }));
    }

    #[test]
    fn test_malformed_regex_is_error() {
        let result = PatternMatcher::default().matches("(unclosed", "anything");
        assert!(matches!(result, Err(PolicyError::InvalidPattern { .. })));
    }

    #[test]
    fn test_malformed_regex_equal_to_candidate_is_error() {
        let result = PatternMatcher::default().matches("(oops", "(oops");
        assert!(matches!(result, Err(PolicyError::InvalidPattern { .. })));
    }

    #[test]
    fn test_regex_source_matches_itself() {
        let pattern = PatternMatcher::default().compile("a+b").unwrap();
        assert!(pattern.matches("aab"));
        assert!(pattern.matches("a+b"));
        assert!(!pattern.matches("b"));
    }

    #[test]
    fn test_pattern_too_long() {
        let matcher = PatternMatcher::new(8);
        let result = matcher.matches("ABCDEFGHIJ*", "ABCDEFGHIJK");
        assert!(matches!(
            result,
            Err(PolicyError::PatternTooLong { max: 8, length: 11 })
        ));
    }

    #[test]
    fn test_empty_pattern_matches_only_empty() {
        assert!(m("", ""));
        assert!(!m("", "CreateVmMsg"));
    }
}
