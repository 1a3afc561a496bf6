//! Grammar-driven lexer
//!
//! The token vocabulary comes from the compiled grammar: its keyword list and
//! its reachable terminal rules. At every position each candidate is tried
//! and the longest match wins. On equal length a keyword beats a terminal,
//! and among terminals the one declared first wins. Unmatched characters are
//! collected into a single error token, so lexing always covers the whole
//! input.

use text_size::{TextRange, TextSize};

use crate::base::{LineIndex, Span};
use crate::grammar::{Grammar, RuleId};

use super::errors::{ErrorCode, SyntaxError};
use super::syntax_kind::SyntaxKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Keyword(u32),
    Terminal(RuleId),
    Error,
}

impl TokenKind {
    pub fn syntax_kind(self) -> SyntaxKind {
        match self {
            Self::Keyword(index) => SyntaxKind::Keyword(index),
            Self::Terminal(rule) => SyntaxKind::Terminal(rule),
            Self::Error => SyntaxKind::ErrorToken,
        }
    }
}

/// A lexed token with its byte range and line/column span
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub range: TextRange,
    pub span: Span,
    /// Matched by a hidden terminal; never seen by the parser.
    pub hidden: bool,
}

impl Token {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.range]
    }

    /// Whether the parser skips this token (hidden or lexer error).
    pub fn is_trivia(&self) -> bool {
        self.hidden || self.kind == TokenKind::Error
    }
}

#[derive(Debug, Clone, Default)]
pub struct LexResult {
    /// All tokens in source order, hidden and error tokens included.
    pub tokens: Vec<Token>,
    pub errors: Vec<SyntaxError>,
}

impl LexResult {
    pub fn visible_tokens(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter().filter(|t| !t.is_trivia())
    }

    pub fn hidden_tokens(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter().filter(|t| t.hidden)
    }
}

pub struct Lexer<'g> {
    grammar: &'g Grammar,
    case_insensitive: bool,
}

impl<'g> Lexer<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        Self {
            grammar,
            case_insensitive: false,
        }
    }

    /// Match keywords ignoring ASCII case.
    pub fn case_insensitive(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }

    pub fn tokenize(&self, text: &str) -> LexResult {
        let lines = LineIndex::new(text);
        let mut result = LexResult::default();
        let mut pos = 0usize;
        let mut error_start: Option<usize> = None;

        while pos < text.len() {
            match self.longest_match(text, pos) {
                Some((len, kind, hidden)) => {
                    if let Some(start) = error_start.take() {
                        Self::push_error(&mut result, &lines, text, start, pos);
                    }
                    result.tokens.push(Self::token(&lines, kind, pos, pos + len, hidden));
                    pos += len;
                }
                None => {
                    error_start.get_or_insert(pos);
                    pos += text[pos..].chars().next().map_or(1, char::len_utf8);
                }
            }
        }
        if let Some(start) = error_start {
            Self::push_error(&mut result, &lines, text, start, pos);
        }

        tracing::trace!(
            tokens = result.tokens.len(),
            errors = result.errors.len(),
            "lexed document"
        );
        result
    }

    fn longest_match(&self, text: &str, pos: usize) -> Option<(usize, TokenKind, bool)> {
        let rest = &text[pos..];
        let mut best: Option<(usize, TokenKind, bool)> = None;

        for (index, keyword) in self.grammar.keywords().iter().enumerate() {
            let len = keyword.len();
            if len == 0 || len > rest.len() || !rest.is_char_boundary(len) {
                continue;
            }
            let candidate = &rest[..len];
            let matched = if self.case_insensitive {
                candidate.eq_ignore_ascii_case(keyword)
            } else {
                candidate == keyword.as_str()
            };
            if matched && best.is_none_or(|(best_len, _, _)| len > best_len) {
                best = Some((len, TokenKind::Keyword(index as u32), false));
            }
        }

        // Strictly longer only: keywords and earlier terminals keep ties.
        for terminal in self.grammar.lexer_terminals() {
            let Some(found) = terminal.regex.find(rest) else {
                continue;
            };
            let len = found.end();
            if len == 0 {
                continue;
            }
            if best.is_none_or(|(best_len, _, _)| len > best_len) {
                best = Some((len, TokenKind::Terminal(terminal.rule), terminal.hidden));
            }
        }
        best
    }

    fn token(lines: &LineIndex, kind: TokenKind, start: usize, end: usize, hidden: bool) -> Token {
        let range = TextRange::new(TextSize::new(start as u32), TextSize::new(end as u32));
        Token {
            kind,
            range,
            span: lines.span(range),
            hidden,
        }
    }

    fn push_error(result: &mut LexResult, lines: &LineIndex, text: &str, start: usize, end: usize) {
        let token = Self::token(lines, TokenKind::Error, start, end, false);
        result.errors.push(SyntaxError::new(
            format!("Unexpected character(s) '{}'.", &text[start..end]),
            token.range,
            ErrorCode::E0101,
        ));
        result.tokens.push(token);
    }
}
