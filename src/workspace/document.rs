//! Documents and their build state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::base::{DocumentId, LineIndex};
use crate::semantic::{
    Diagnostic, DiagnosticSource, LocalSymbols, Severity, codes, sort_diagnostics,
};
use crate::syntax::{Ast, ParseResult, Resolution};

/// Progress of one document through a build cycle. Totally ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BuildState {
    Changed,
    Parsed,
    IndexedContent,
    ComputedScopes,
    Linked,
    Validated,
}

impl BuildState {
    pub const ALL: [BuildState; 6] = [
        BuildState::Changed,
        BuildState::Parsed,
        BuildState::IndexedContent,
        BuildState::ComputedScopes,
        BuildState::Linked,
        BuildState::Validated,
    ];
}

impl std::fmt::Display for BuildState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BuildState::Changed => "changed",
            BuildState::Parsed => "parsed",
            BuildState::IndexedContent => "indexed-content",
            BuildState::ComputedScopes => "computed-scopes",
            BuildState::Linked => "linked",
            BuildState::Validated => "validated",
        };
        f.write_str(name)
    }
}

/// One source unit and everything computed from it.
#[derive(Debug)]
pub struct Document {
    id: DocumentId,
    uri: String,
    text: Arc<str>,
    version: u32,
    pub(crate) state: BuildState,
    lines: LineIndex,
    pub(crate) parse: Option<ParseResult>,
    pub(crate) locals: LocalSymbols,
    /// Raw dependency URIs reported by the language's dependency hook.
    pub(crate) dependency_uris: Vec<String>,
    pub(crate) validation: Vec<Diagnostic>,
    pub(crate) worker_failure: Option<Diagnostic>,
    diagnostics: Vec<Diagnostic>,
}

impl Document {
    pub(crate) fn new(id: DocumentId, uri: String, text: &str) -> Self {
        Self {
            id,
            uri,
            text: Arc::from(text),
            version: 0,
            state: BuildState::Changed,
            lines: LineIndex::new(text),
            parse: None,
            locals: LocalSymbols::default(),
            dependency_uris: Vec::new(),
            validation: Vec::new(),
            worker_failure: None,
            diagnostics: Vec::new(),
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub(crate) fn shared_text(&self) -> Arc<str> {
        self.text.clone()
    }

    /// Number of edits applied since the document was opened.
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.lines
    }

    /// `None` until the document has been parsed in a build.
    pub fn parse_result(&self) -> Option<&ParseResult> {
        self.parse.as_ref()
    }

    pub fn ast(&self) -> Option<&Ast> {
        self.parse.as_ref().map(|parse| &parse.ast)
    }

    pub fn dependency_uris(&self) -> &[String] {
        &self.dependency_uris
    }

    /// Diagnostics as of the last completed phase, ordered by position.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Whether any cross-reference failed to resolve.
    pub fn has_link_errors(&self) -> bool {
        self.ast()
            .is_some_and(|ast| ast.references().any(|(_, reference)| reference.is_failed()))
    }

    /// Replaces the text and drops everything derived from it.
    pub(crate) fn replace_text(&mut self, text: &str) {
        self.text = Arc::from(text);
        self.lines = LineIndex::new(text);
        self.version += 1;
        self.reset();
    }

    pub(crate) fn reset(&mut self) {
        self.state = BuildState::Changed;
        self.parse = None;
        self.locals = LocalSymbols::default();
        self.dependency_uris.clear();
        self.validation.clear();
        self.worker_failure = None;
        self.diagnostics.clear();
    }

    /// Rebuilds the diagnostic list from syntax errors, failed references,
    /// validation results and worker failures.
    pub(crate) fn refresh_diagnostics(&mut self) {
        let mut diagnostics = Vec::new();
        if let Some(failure) = &self.worker_failure {
            diagnostics.push(failure.clone());
        }
        if let Some(parse) = &self.parse {
            diagnostics.extend(
                parse
                    .errors()
                    .map(|error| Diagnostic::from_syntax_error(error, &self.lines)),
            );
            for (_, reference) in parse.ast.references() {
                if let Resolution::Failed(message) = &reference.resolution {
                    diagnostics.push(
                        Diagnostic::new(
                            Severity::Error,
                            message.clone(),
                            reference.range,
                            &self.lines,
                            DiagnosticSource::Linker,
                        )
                        .with_code(codes::LINKING_ERROR),
                    );
                }
            }
        }
        diagnostics.extend(self.validation.iter().cloned());
        sort_diagnostics(&mut diagnostics);
        self.diagnostics = diagnostics;
    }
}
