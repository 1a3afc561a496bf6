//! Error code definitions for lexer and parser diagnostics
//!
//! Error codes follow a naming convention: E{category}{number}
//! - E01xx: Lexical errors
//! - E02xx: Token-level parse errors
//! - E09xx: Parser limits

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Characters no terminal or keyword matches
    E0101,
    /// Token that cannot continue the current rule
    E0201,
    /// Expected token missing, parsing continued as if present
    E0202,
    /// Input left over after the entry rule completed
    E0203,
    /// Rule nesting exceeded the configured depth
    E0901,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E0101 => "E0101",
            Self::E0201 => "E0201",
            Self::E0202 => "E0202",
            Self::E0203 => "E0203",
            Self::E0901 => "E0901",
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            Self::E0101 => "unexpected character",
            Self::E0201 => "unexpected token",
            Self::E0202 => "missing token",
            Self::E0203 => "unexpected input after end of document",
            Self::E0901 => "nesting too deep",
        }
    }

    /// Whether the error came from the lexer rather than the parser.
    pub fn is_lexical(&self) -> bool {
        matches!(self, Self::E0101)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(format!("{}", ErrorCode::E0201), "E0201");
        assert_eq!(ErrorCode::E0101.default_message(), "unexpected character");
    }

    #[test]
    fn test_is_lexical() {
        assert!(ErrorCode::E0101.is_lexical());
        assert!(!ErrorCode::E0202.is_lexical());
    }
}
