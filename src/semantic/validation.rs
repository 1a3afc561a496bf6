//! Validation checks registered per node type.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use smol_str::SmolStr;
use text_size::TextRange;

use crate::base::LineIndex;
use crate::grammar::Grammar;
use crate::syntax::{Ast, AstId};

use super::diagnostics::{Diagnostic, DiagnosticSource, Severity, codes};

/// Collects the diagnostics emitted by checks.
pub struct ValidationAcceptor<'a> {
    lines: &'a LineIndex,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> ValidationAcceptor<'a> {
    fn new(lines: &'a LineIndex) -> Self {
        Self {
            lines,
            diagnostics: Vec::new(),
        }
    }

    /// Records a diagnostic and returns it for further adjustment.
    pub fn accept(
        &mut self,
        severity: Severity,
        message: impl Into<String>,
        range: TextRange,
    ) -> &mut Diagnostic {
        let diagnostic =
            Diagnostic::new(severity, message, range, self.lines, DiagnosticSource::Validation);
        self.diagnostics.push(diagnostic);
        let last = self.diagnostics.len() - 1;
        &mut self.diagnostics[last]
    }

    pub fn error(&mut self, message: impl Into<String>, range: TextRange) -> &mut Diagnostic {
        self.accept(Severity::Error, message, range)
    }

    pub fn warning(&mut self, message: impl Into<String>, range: TextRange) -> &mut Diagnostic {
        self.accept(Severity::Warning, message, range)
    }
}

pub type ValidationCheck = Arc<dyn Fn(&Ast, AstId, &mut ValidationAcceptor<'_>) + Send + Sync>;

#[derive(Clone, Default)]
pub struct ValidationRegistry {
    checks: Vec<(SmolStr, ValidationCheck)>,
}

impl std::fmt::Debug for ValidationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.checks.iter().map(|(node_type, _)| node_type))
            .finish()
    }
}

impl ValidationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `check` on every node of type `node_type` or one of its subtypes.
    pub fn register<F>(&mut self, node_type: impl Into<SmolStr>, check: F)
    where
        F: Fn(&Ast, AstId, &mut ValidationAcceptor<'_>) + Send + Sync + 'static,
    {
        self.checks.push((node_type.into(), Arc::new(check)));
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Runs every applicable check over the tree, in document order.
    ///
    /// A panicking check becomes an error diagnostic on the node it was
    /// checking; the remaining checks still run.
    pub fn validate(&self, grammar: &Grammar, ast: &Ast, lines: &LineIndex) -> Vec<Diagnostic> {
        let mut acceptor = ValidationAcceptor::new(lines);
        if self.checks.is_empty() || ast.is_empty() {
            return acceptor.diagnostics;
        }
        for node in ast.descendants(ast.root()) {
            let node_type = &ast.node(node).node_type;
            for (target, check) in &self.checks {
                if !grammar.is_subtype(node_type, target) {
                    continue;
                }
                let outcome = catch_unwind(AssertUnwindSafe(|| check(ast, node, &mut acceptor)));
                if let Err(payload) = outcome {
                    let message = panic_message(payload.as_ref());
                    tracing::warn!(%node_type, %message, "validation check panicked");
                    let range = ast.node(node).range().unwrap_or_default();
                    acceptor
                        .error(format!("An error occurred during validation: {message}"), range)
                        .code = Some(SmolStr::new(codes::VALIDATION_FAILURE));
                }
            }
        }
        acceptor.diagnostics
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
