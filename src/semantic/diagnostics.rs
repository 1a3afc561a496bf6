//! Document diagnostics.
//!
//! Lexer, parser, linker, validation and worker problems all surface as
//! [`Diagnostic`] values attached to a document. Nothing in the build
//! pipeline reports problems any other way.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use text_size::TextRange;

use crate::base::{LineIndex, Span};
use crate::parser::SyntaxError;

/// Well-known diagnostic codes.
pub mod codes {
    pub const LEXING_ERROR: &str = "lexing-error";
    pub const PARSING_ERROR: &str = "parsing-error";
    pub const LINKING_ERROR: &str = "linking-error";
    pub const WORKER_FAILURE: &str = "worker-failure";
    pub const VALIDATION_FAILURE: &str = "validation-failure";
}

/// Severity level of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

impl Severity {
    /// Convert to LSP severity number.
    pub fn to_lsp(self) -> u32 {
        match self {
            Severity::Error => 1,
            Severity::Warning => 2,
            Severity::Info => 3,
            Severity::Hint => 4,
        }
    }
}

/// Pipeline stage that produced a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticSource {
    Lexer,
    Parser,
    Linker,
    Validation,
    Worker,
}

/// A diagnostic message with location.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub range: TextRange,
    pub span: Span,
    /// Error/warning code (e.g., "linking-error").
    pub code: Option<SmolStr>,
    pub source: DiagnosticSource,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        message: impl Into<String>,
        range: TextRange,
        lines: &LineIndex,
        source: DiagnosticSource,
    ) -> Self {
        Self {
            severity,
            message: message.into(),
            range,
            span: lines.span(range),
            code: None,
            source,
        }
    }

    pub fn with_code(mut self, code: impl Into<SmolStr>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Converts a lexer or parser error.
    pub fn from_syntax_error(error: &SyntaxError, lines: &LineIndex) -> Self {
        let (source, code) = if error.code.is_lexical() {
            (DiagnosticSource::Lexer, codes::LEXING_ERROR)
        } else {
            (DiagnosticSource::Parser, codes::PARSING_ERROR)
        };
        Self::new(Severity::Error, error.message.clone(), error.range, lines, source).with_code(code)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Orders diagnostics by position; ties keep their pipeline order.
pub fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by_key(|d| (d.range.start(), d.range.end()));
}
