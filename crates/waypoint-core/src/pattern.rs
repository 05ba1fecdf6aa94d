//! Subscription pattern compiler.
//!
//! A pattern is a dot-separated list of segments. Each segment is either a
//! literal token or the wildcard `*`, which matches exactly one segment of
//! an event name. A pattern matches an event name when the name's leading
//! segments satisfy every pattern segment in order; any remaining suffix of
//! the name must start with a dot.
//!
//! | pattern     | matches                                   | does not match        |
//! |-------------|-------------------------------------------|-----------------------|
//! | `render`    | `render`, `render.component.layout`       | `renderer`            |
//! | `render.*`  | `render.component`, `render.a.b`          | `render`, `foo.render`|
//! | `*.flush`   | `db.flush`, `cache.flush.sync`            | `flush`, `db.flushed` |
//!
//! Patterns are compiled once, at subscribe time, into an anchored regular
//! expression.

use std::fmt;
use std::str::FromStr;

use regex::Regex;

use crate::error::{PatternError, PatternResult};

/// The wildcard segment.
pub const WILDCARD: &str = "*";

/// Separator between segments of event names and patterns.
pub const SEPARATOR: char = '.';

/// A compiled subscription pattern.
///
/// # Example
///
/// ```
/// use waypoint_core::Pattern;
///
/// let pattern = Pattern::compile("render.*").unwrap();
/// assert!(pattern.matches("render.component"));
/// assert!(pattern.matches("render.component.layout"));
/// assert!(!pattern.matches("render"));
/// assert!(!pattern.matches("renderer.component"));
/// ```
#[derive(Clone)]
pub struct Pattern {
    source: String,
    matcher: Regex,
}

impl Pattern {
    /// Compile a pattern.
    ///
    /// The empty pattern is accepted and matches the empty name together
    /// with any name whose first segment is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if a non-empty pattern has an empty segment, if a
    /// wildcard shares a segment with other characters, or if the generated
    /// matcher fails to compile.
    pub fn compile(pattern: &str) -> PatternResult<Self> {
        let mut expr = String::with_capacity(pattern.len() * 2 + 16);
        expr.push('^');

        // The empty pattern has one empty segment, which only the empty
        // leading segment of a name satisfies.
        let segments = pattern.split(SEPARATOR).enumerate().filter(|_| !pattern.is_empty());
        for (index, segment) in segments {
            if segment.is_empty() {
                return Err(PatternError::EmptySegment {
                    pattern: pattern.to_string(),
                    index,
                });
            }
            if index > 0 {
                expr.push_str(r"\.");
            }
            if segment == WILDCARD {
                expr.push_str(r"[^.]+");
            } else if segment.contains(WILDCARD) {
                return Err(PatternError::MixedWildcard {
                    pattern: pattern.to_string(),
                    segment: segment.to_string(),
                });
            } else {
                expr.push_str(&regex::escape(segment));
            }
        }

        // The name may continue past the pattern, but only at a segment boundary.
        expr.push_str(r"(?:\..*)?$");

        let matcher = Regex::new(&expr)?;
        Ok(Self {
            source: pattern.to_string(),
            matcher,
        })
    }

    /// Check whether an event name is accepted by this pattern.
    pub fn matches(&self, name: &str) -> bool {
        self.matcher.is_match(name)
    }

    /// The pattern as written by the subscriber.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Iterate over the pattern's segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.source.split(SEPARATOR)
    }

    /// Whether any segment is a wildcard.
    pub fn has_wildcard(&self) -> bool {
        self.segments().any(|s| s == WILDCARD)
    }
}

impl FromStr for Pattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

impl TryFrom<&str> for Pattern {
    type Error = PatternError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::compile(s)
    }
}

impl TryFrom<String> for Pattern {
    type Error = PatternError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::compile(&s)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Pattern {
        Pattern::compile(s).unwrap()
    }

    #[test]
    fn test_literal_pattern_matches_itself_and_descendants() {
        let pattern = p("render");
        assert!(pattern.matches("render"));
        assert!(pattern.matches("render.component"));
        assert!(pattern.matches("render.foo.bar"));
        assert!(!pattern.matches("renderer"));
        assert!(!pattern.matches("foo.render"));
        assert!(!pattern.matches(""));
    }

    #[test]
    fn test_wildcard_requires_a_segment() {
        let pattern = p("render.*");
        assert!(pattern.matches("render.foo"));
        assert!(pattern.matches("render.foo.bar"));
        assert!(!pattern.matches("render"));
        assert!(!pattern.matches("render."));
        assert!(!pattern.matches("renderer.foo"));
        assert!(!pattern.matches("foo.render.bar"));
    }

    #[test]
    fn test_leading_wildcard() {
        let pattern = p("*.flush");
        assert!(pattern.matches("db.flush"));
        assert!(pattern.matches("cache.flush.sync"));
        assert!(!pattern.matches("flush"));
        assert!(!pattern.matches("db.flushed"));
        assert!(!pattern.matches("a.b.flush"));
    }

    #[test]
    fn test_bare_wildcard_matches_any_nonempty_name() {
        let pattern = p("*");
        assert!(pattern.matches("render"));
        assert!(pattern.matches("render.component"));
        assert!(!pattern.matches(""));
    }

    #[test]
    fn test_name_shorter_than_pattern_never_matches() {
        let pattern = p("render.component.layout");
        assert!(!pattern.matches("render"));
        assert!(!pattern.matches("render.component"));
        assert!(pattern.matches("render.component.layout"));
    }

    #[test]
    fn test_literal_segments_are_escaped() {
        let pattern = p("a+b.c(d)");
        assert!(pattern.matches("a+b.c(d)"));
        assert!(!pattern.matches("aab.c(d)"));
        assert!(!pattern.matches("a+b.cd"));
    }

    #[test]
    fn test_empty_pattern_matches_empty_leading_segment() {
        let pattern = p("");
        assert_eq!(pattern.as_str(), "");
        assert!(pattern.matches(""));
        assert!(pattern.matches(".render"));
        assert!(pattern.matches(".render.component"));
        assert!(!pattern.matches("render"));
        assert!(!pattern.matches("render.component"));
        assert!(!pattern.has_wildcard());
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(matches!(
            Pattern::compile(".render"),
            Err(PatternError::EmptySegment { index: 0, .. })
        ));
        assert!(matches!(
            Pattern::compile("render..component"),
            Err(PatternError::EmptySegment { index: 1, .. })
        ));
        assert!(matches!(
            Pattern::compile("render."),
            Err(PatternError::EmptySegment { index: 1, .. })
        ));
        assert!(matches!(
            Pattern::compile("ren*"),
            Err(PatternError::MixedWildcard { .. })
        ));
    }

    #[test]
    fn test_pattern_accessors() {
        let pattern: Pattern = "db.*.query".parse().unwrap();
        assert_eq!(pattern.as_str(), "db.*.query");
        assert_eq!(pattern.to_string(), "db.*.query");
        assert_eq!(pattern.segments().count(), 3);
        assert!(pattern.has_wildcard());
        assert!(!p("db.query").has_wildcard());
    }
}
