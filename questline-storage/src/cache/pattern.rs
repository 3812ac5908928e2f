//! Key patterns for bulk invalidation.

use questline_core::StorageError;
use regex::Regex;
use std::fmt;

/// Selects cache keys for [`CacheStore::invalidate_by_pattern`](super::CacheStore::invalidate_by_pattern).
#[derive(Debug, Clone)]
pub enum KeyPattern {
    /// Keys starting with the given string.
    Prefix(String),
    /// Keys matching a regular expression (unanchored unless the expression anchors itself).
    Regex(Regex),
    /// Keys matching a glob where `*` matches any run of characters.
    Glob { pattern: String, compiled: Regex },
}

impl KeyPattern {
    pub fn prefix(prefix: impl Into<String>) -> Self {
        KeyPattern::Prefix(prefix.into())
    }

    pub fn regex(expr: &str) -> Result<Self, StorageError> {
        Regex::new(expr)
            .map(KeyPattern::Regex)
            .map_err(|e| StorageError::InvalidPattern {
                pattern: expr.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn glob(pattern: &str) -> Result<Self, StorageError> {
        let body = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let compiled = Regex::new(&format!("^{body}$")).map_err(|e| {
            StorageError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(KeyPattern::Glob {
            pattern: pattern.to_string(),
            compiled,
        })
    }

    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyPattern::Prefix(prefix) => key.starts_with(prefix.as_str()),
            KeyPattern::Regex(re) => re.is_match(key),
            KeyPattern::Glob { compiled, .. } => compiled.is_match(key),
        }
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPattern::Prefix(prefix) => write!(f, "prefix:{prefix}"),
            KeyPattern::Regex(re) => write!(f, "regex:{}", re.as_str()),
            KeyPattern::Glob { pattern, .. } => write!(f, "glob:{pattern}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix() {
        let p = KeyPattern::prefix("leaderboard:weekly:");
        assert!(p.matches("leaderboard:weekly:all:10:0"));
        assert!(!p.matches("leaderboard:all-time:all:10:0"));
    }

    #[test]
    fn test_regex() {
        let p = KeyPattern::regex(r"^user-rank:[0-9a-f-]+:weekly:").unwrap();
        assert!(p.matches("user-rank:0190a1b2-0000-7000-8000-000000000000:weekly:all"));
        assert!(!p.matches("user-rank:0190a1b2:all-time:all"));
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        match KeyPattern::regex("(unclosed") {
            Err(StorageError::InvalidPattern { pattern, .. }) => assert_eq!(pattern, "(unclosed"),
            other => panic!("expected InvalidPattern, got {other:?}"),
        }
    }

    #[test]
    fn test_glob_wildcards_and_escaping() {
        let p = KeyPattern::glob("leaderboard:*:Game Development:*").unwrap();
        assert!(p.matches("leaderboard:weekly:Game Development:10:0"));
        assert!(!p.matches("leaderboard:weekly:Art:10:0"));

        // Regex metacharacters in the glob are literal
        let dotted = KeyPattern::glob("widget:top.users:*").unwrap();
        assert!(dotted.matches("widget:top.users:5"));
        assert!(!dotted.matches("widget:topXusers:5"));
    }

    #[test]
    fn test_glob_is_anchored() {
        let p = KeyPattern::glob("widget:*").unwrap();
        assert!(!p.matches("old-widget:top:5"));
        assert_eq!(p.to_string(), "glob:widget:*");
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: a glob ending in `*` selects the same keys as the prefix before it.
        #[test]
        fn prop_trailing_star_glob_equals_prefix(
            prefix in "[a-z:.+()-]{0,12}",
            key in "[a-z:.+()-]{0,24}",
        ) {
            let glob = KeyPattern::glob(&format!("{prefix}*")).unwrap();
            let by_prefix = KeyPattern::prefix(prefix.clone());
            prop_assert_eq!(glob.matches(&key), by_prefix.matches(&key));
            let full = format!("{prefix}{key}");
            prop_assert!(glob.matches(&full));
        }
    }
}
