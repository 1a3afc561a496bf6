//! Syntax kinds for the Rowan-based CST
//!
//! Kinds are not a fixed enum of one language: they are derived from the
//! compiled grammar. A kind is packed into rowan's `u16` with a two-bit tag:
//!
//! ```text
//! 00  error token (0) / error node (1)
//! 01  keyword, by keyword-list index
//! 10  terminal token, by rule index
//! 11  rule node, by rule index
//! ```

use crate::grammar::RuleId;

const TAG_SHIFT: u16 = 14;
const INDEX_MASK: u16 = (1 << TAG_SHIFT) - 1;
const TAG_ERROR: u16 = 0;
const TAG_KEYWORD: u16 = 1;
const TAG_TERMINAL: u16 = 2;
const TAG_RULE: u16 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SyntaxKind {
    /// Characters the lexer could not match.
    ErrorToken,
    /// Tokens skipped during error recovery.
    ErrorNode,
    Keyword(u32),
    Terminal(RuleId),
    /// One parser or data type rule invocation.
    Rule(RuleId),
}

impl SyntaxKind {
    pub fn is_error(self) -> bool {
        matches!(self, Self::ErrorToken | Self::ErrorNode)
    }

    pub fn rule(self) -> Option<RuleId> {
        match self {
            Self::Rule(rule) | Self::Terminal(rule) => Some(rule),
            _ => None,
        }
    }

    pub fn to_raw(self) -> u16 {
        let (tag, index) = match self {
            Self::ErrorToken => (TAG_ERROR, 0),
            Self::ErrorNode => (TAG_ERROR, 1),
            Self::Keyword(index) => (TAG_KEYWORD, index as u16),
            Self::Terminal(rule) => (TAG_TERMINAL, rule.0 as u16),
            Self::Rule(rule) => (TAG_RULE, rule.0 as u16),
        };
        (tag << TAG_SHIFT) | (index & INDEX_MASK)
    }

    pub fn from_raw(raw: u16) -> Self {
        let index = raw & INDEX_MASK;
        match raw >> TAG_SHIFT {
            TAG_KEYWORD => Self::Keyword(u32::from(index)),
            TAG_TERMINAL => Self::Terminal(RuleId(u32::from(index))),
            TAG_RULE => Self::Rule(RuleId(u32::from(index))),
            _ if index == 1 => Self::ErrorNode,
            _ => Self::ErrorToken,
        }
    }
}

impl From<SyntaxKind> for rowan::SyntaxKind {
    fn from(kind: SyntaxKind) -> Self {
        rowan::SyntaxKind(kind.to_raw())
    }
}

/// Rowan language tag for trees built from any compiled grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GrammarLanguage {}

impl rowan::Language for GrammarLanguage {
    type Kind = SyntaxKind;

    fn kind_from_raw(raw: rowan::SyntaxKind) -> Self::Kind {
        SyntaxKind::from_raw(raw.0)
    }

    fn kind_to_raw(kind: Self::Kind) -> rowan::SyntaxKind {
        kind.into()
    }
}

/// Type aliases for convenience
pub type SyntaxNode = rowan::SyntaxNode<GrammarLanguage>;
pub type SyntaxToken = rowan::SyntaxToken<GrammarLanguage>;
pub type SyntaxElement = rowan::SyntaxElement<GrammarLanguage>;
