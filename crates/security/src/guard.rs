//! Input guard — screens raw user text before it enters the conversation.
//!
//! Rejects empty input, input over the length ceiling, and input shaped like
//! SQL injection. Accepted input is stripped of control characters and
//! surrounding whitespace.

use regex_lite::Regex;
use std::sync::LazyLock;

/// Default length ceiling, in characters.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 1000;

static DANGEROUS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i);\s*drop\s+table",
        r"(?i);\s*delete\s+from",
        r"(?i);\s*update\s+.*\s+set",
        r"(?i)union\s+select",
        r"(?i)--\s*$",
        r"(?i)/\*.*\*/",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("dangerous-input pattern compiles"))
    .collect()
});

/// Why the guard refused an input. The display text is shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("Empty input")]
    Empty,

    #[error("Input too long (max {max} characters)")]
    TooLong { max: usize },

    #[error("Potentially dangerous input detected")]
    Dangerous,
}

/// Pattern-based validator and sanitizer for user text.
#[derive(Debug, Clone)]
pub struct InputGuard {
    max_chars: usize,
}

impl Default for InputGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_INPUT_CHARS)
    }
}

impl InputGuard {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// Validate raw text without modifying it.
    pub fn validate(&self, text: &str) -> Result<(), Rejection> {
        if text.is_empty() {
            return Err(Rejection::Empty);
        }
        if text.chars().count() > self.max_chars {
            return Err(Rejection::TooLong {
                max: self.max_chars,
            });
        }
        if DANGEROUS_PATTERNS.iter().any(|re| re.is_match(text)) {
            return Err(Rejection::Dangerous);
        }
        Ok(())
    }

    /// Strip C0/C1 control characters (0x00–0x1F, 0x7F–0x9F) and surrounding
    /// whitespace.
    pub fn sanitize(&self, text: &str) -> String {
        text.chars()
            .filter(|c| !is_control(*c))
            .collect::<String>()
            .trim()
            .to_string()
    }

    /// Validate, then sanitize. Text that is empty once sanitized is rejected.
    pub fn check(&self, text: &str) -> Result<String, Rejection> {
        self.validate(text)?;
        let sanitized = self.sanitize(text);
        if sanitized.is_empty() {
            return Err(Rejection::Empty);
        }
        Ok(sanitized)
    }
}

fn is_control(c: char) -> bool {
    matches!(c as u32, 0x00..=0x1F | 0x7F..=0x9F)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_question() {
        let guard = InputGuard::default();
        assert_eq!(
            guard.check("Show me 5 critical gaps").unwrap(),
            "Show me 5 critical gaps"
        );
    }

    #[test]
    fn rejects_empty_input() {
        let guard = InputGuard::default();
        assert_eq!(guard.validate(""), Err(Rejection::Empty));
        assert_eq!(Rejection::Empty.to_string(), "Empty input");
    }

    #[test]
    fn whitespace_only_is_empty_after_sanitizing() {
        let guard = InputGuard::default();
        assert_eq!(guard.check("  \t\n "), Err(Rejection::Empty));
    }

    #[test]
    fn rejects_input_over_ceiling() {
        let guard = InputGuard::default();
        let long = "a".repeat(1001);
        let err = guard.check(&long).unwrap_err();
        assert_eq!(err.to_string(), "Input too long (max 1000 characters)");

        let exact = "a".repeat(1000);
        assert!(guard.check(&exact).is_ok());
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let guard = InputGuard::new(5);
        assert!(guard.validate("ééééé").is_ok());
        assert!(guard.validate("éééééé").is_err());
    }

    #[test]
    fn rejects_sql_injection_shapes() {
        let guard = InputGuard::default();
        for text in [
            "'; DROP TABLE x; --",
            "x; delete   from patients",
            "a; UPDATE patients SET name = 1",
            "1 UNION SELECT password",
            "find patient --",
            "find /* comment */ patient",
        ] {
            assert_eq!(guard.check(text), Err(Rejection::Dangerous), "{text}");
        }
    }

    #[test]
    fn inner_dashes_are_fine() {
        let guard = InputGuard::default();
        assert!(guard.check("gaps for 2024--2025 season please").is_ok());
    }

    #[test]
    fn sanitize_strips_control_characters() {
        let guard = InputGuard::default();
        assert_eq!(guard.sanitize("  find\u{0007} patient\u{0085}  "), "find patient");
        assert_eq!(guard.sanitize("tab\there"), "tabhere");
    }
}
