//! The workspace build orchestrator.
//!
//! A build cycle moves the documents that need work through the build
//! states, one phase at a time:
//!
//! ```text
//! Changed ──parse──► Parsed ──exports──► IndexedContent ──locals──► ComputedScopes
//!                                                                        │
//!                 Validated ◄──validate── Linked ◄──link (dependency order)┘
//! ```
//!
//! Export and local-symbol computation run in parallel across documents.
//! Linking runs one document at a time in dependency order, reading the
//! export lists published by the index phase. Cancellation is checked
//! between documents and between phases; a document only ever moves to a
//! state once the work for that state is complete.

use std::sync::Arc;

use indexmap::IndexMap;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use text_size::TextRange;
use tokio_util::sync::CancellationToken;

use crate::base::DocumentId;
use crate::config::BuildOptions;
use crate::semantic::{
    Diagnostic, DiagnosticSource, IndexManager, LinkOutcome, Linker, LocalSymbols,
    ReferenceDescription, Severity, SymbolDescription, codes, compute_exports,
    describe_references,
};
use crate::syntax::{AstNode, NodeRef};

use super::document::{BuildState, Document};
use super::graph::DependencyGraph;
use super::language::Language;
use super::worker::ParserPool;

/// Called after each phase with the documents that reached `state`.
pub type PhaseListener = Box<dyn FnMut(BuildState, &[DocumentId]) + Send>;

/// Diagnostics of every document a completed cycle worked on, keyed by URI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    pub diagnostics: IndexMap<String, Vec<Diagnostic>>,
}

impl BuildReport {
    pub fn error_count(&self) -> usize {
        self.diagnostics
            .values()
            .flatten()
            .filter(|diagnostic| diagnostic.is_error())
            .count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    Completed(BuildReport),
    /// The cycle stopped early. Documents keep the last state they fully reached.
    Cancelled,
}

impl BuildOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BuildOutcome::Cancelled)
    }

    pub fn report(&self) -> Option<&BuildReport> {
        match self {
            BuildOutcome::Completed(report) => Some(report),
            BuildOutcome::Cancelled => None,
        }
    }
}

/// Marker for a phase interrupted by cancellation.
struct Interrupted;

pub struct Workspace {
    language: Arc<Language>,
    options: BuildOptions,
    /// Insertion order is the stable input order of every phase.
    documents: IndexMap<DocumentId, Document>,
    uris: FxHashMap<String, DocumentId>,
    next_id: u32,
    index: IndexManager,
    graph: DependencyGraph,
    pool: Option<ParserPool>,
    listeners: Vec<PhaseListener>,
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("language", &self.language)
            .field("documents", &self.documents.len())
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl Workspace {
    /// A workspace for `language`. Starts a parser pool when the language
    /// config asks for parser workers.
    pub fn new(language: impl Into<Arc<Language>>) -> Self {
        let language = language.into();
        let workers = language.config().parser_workers;
        let pool = (workers > 0).then(|| {
            ParserPool::for_grammar(workers, language.grammar().clone(), language.parse_options())
        });
        Self {
            language,
            options: BuildOptions::default(),
            documents: IndexMap::new(),
            uris: FxHashMap::default(),
            next_id: 0,
            index: IndexManager::new(),
            graph: DependencyGraph::new(),
            pool,
            listeners: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Parses through `pool` instead of on the build thread.
    pub fn with_parser_pool(mut self, pool: ParserPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn on_build_phase(&mut self, listener: impl FnMut(BuildState, &[DocumentId]) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    // -------------------------------------------------------------------------
    // Document lifecycle
    // -------------------------------------------------------------------------

    /// Adds a document, or replaces the text of an open one.
    pub fn open(&mut self, uri: impl Into<String>, text: &str) -> DocumentId {
        let uri = uri.into();
        if let Some(&id) = self.uris.get(&uri) {
            self.apply_edit(id, text);
            return id;
        }
        let id = DocumentId::new(self.next_id);
        self.next_id += 1;
        self.documents.insert(id, Document::new(id, uri.clone(), text));
        self.uris.insert(uri.clone(), id);

        // Documents waiting for this URI gain their edge; documents with
        // failed references may resolve against the newcomer.
        let mut affected = Vec::new();
        for document in self.documents.values() {
            if document.id() == id {
                continue;
            }
            if document.dependency_uris.iter().any(|dependency| *dependency == uri) {
                self.graph.add_dependency(document.id(), id);
                affected.push(document.id());
            } else if document.has_link_errors() {
                affected.push(document.id());
            }
        }
        tracing::debug!(%uri, %id, affected = affected.len(), "document opened");
        self.invalidate_links(&affected);
        id
    }

    /// Replaces the text of an open document. Unknown URIs are ignored.
    pub fn update(&mut self, uri: &str, text: &str) -> Option<DocumentId> {
        let id = *self.uris.get(uri)?;
        self.apply_edit(id, text);
        Some(id)
    }

    /// Removes a document and invalidates everything that could see it.
    pub fn close(&mut self, uri: &str) -> bool {
        let Some(id) = self.uris.remove(uri) else {
            return false;
        };
        let affected = self.affected_by(id);
        self.documents.shift_remove(&id);
        self.index.remove(id);
        self.graph.remove(id);
        tracing::debug!(%uri, %id, affected = affected.len(), "document closed");
        self.invalidate_links(&affected);
        true
    }

    fn apply_edit(&mut self, id: DocumentId, text: &str) {
        let affected = self.affected_by(id);
        if let Some(document) = self.documents.get_mut(&id) {
            document.replace_text(text);
        }
        self.index.remove(id);
        tracing::debug!(%id, affected = affected.len(), "document changed");
        self.invalidate_links(&affected);
    }

    /// Documents whose resolutions may change when `id` changes.
    fn affected_by(&self, id: DocumentId) -> Vec<DocumentId> {
        let changed: FxHashSet<DocumentId> = [id].into_iter().collect();
        let mut affected: FxHashSet<DocumentId> =
            self.graph.transitive_dependents(&[id]).into_iter().collect();
        affected.extend(self.index.referencing_documents(&changed));
        affected.extend(
            self.documents
                .values()
                .filter(|document| document.has_link_errors())
                .map(Document::id),
        );
        affected.remove(&id);
        self.documents
            .keys()
            .copied()
            .filter(|document| affected.contains(document))
            .collect()
    }

    /// Moves linked documents back to `IndexedContent` and clears their links.
    fn invalidate_links(&mut self, documents: &[DocumentId]) {
        for id in documents {
            let Some(document) = self.documents.get_mut(id) else {
                continue;
            };
            if document.state <= BuildState::IndexedContent {
                continue;
            }
            tracing::trace!(%id, from = %document.state, "invalidating links");
            document.state = BuildState::IndexedContent;
            if let Some(parse) = document.parse.as_mut() {
                Linker::unlink(&mut parse.ast);
            }
            document.validation.clear();
            document.refresh_diagnostics();
            self.index.remove_references(*id);
        }
    }

    // -------------------------------------------------------------------------
    // Build cycles
    // -------------------------------------------------------------------------

    /// Advances the documents at `uris` to `target`.
    ///
    /// Documents that have not been indexed yet are indexed along the way,
    /// since any of them may export a symbol the requested documents need.
    pub fn request_build<I, S>(
        &mut self,
        uris: I,
        target: BuildState,
        cancel: &CancellationToken,
    ) -> BuildOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut requested = Vec::new();
        for uri in uris {
            let uri = uri.as_ref();
            match self.uris.get(uri) {
                Some(&id) => requested.push(id),
                None => tracing::warn!(%uri, "build requested for unknown document"),
            }
        }
        self.build(&requested, target, cancel)
    }

    /// Advances every open document to `target`.
    pub fn build_all(&mut self, target: BuildState, cancel: &CancellationToken) -> BuildOutcome {
        let all: Vec<DocumentId> = self.documents.keys().copied().collect();
        self.build(&all, target, cancel)
    }

    fn build(
        &mut self,
        requested: &[DocumentId],
        target: BuildState,
        cancel: &CancellationToken,
    ) -> BuildOutcome {
        let mut goals: FxHashMap<DocumentId, BuildState> =
            requested.iter().map(|&id| (id, target)).collect();
        for document in self.documents.values() {
            if document.state < BuildState::IndexedContent {
                goals
                    .entry(document.id())
                    .or_insert(target.min(BuildState::IndexedContent));
            }
        }
        let work: Vec<DocumentId> = self
            .documents
            .keys()
            .copied()
            .filter(|id| goals.contains_key(id))
            .collect();
        tracing::debug!(documents = work.len(), %target, "build started");

        match self.run_phases(&work, &goals, cancel) {
            Ok(()) => {
                let diagnostics = work
                    .iter()
                    .filter_map(|id| self.documents.get(id))
                    .map(|document| (document.uri().to_string(), document.diagnostics().to_vec()))
                    .collect();
                tracing::debug!(documents = work.len(), %target, "build finished");
                BuildOutcome::Completed(BuildReport { diagnostics })
            }
            Err(Interrupted) => {
                tracing::debug!(%target, "build cancelled");
                BuildOutcome::Cancelled
            }
        }
    }

    fn run_phases(
        &mut self,
        work: &[DocumentId],
        goals: &FxHashMap<DocumentId, BuildState>,
        cancel: &CancellationToken,
    ) -> Result<(), Interrupted> {
        let select = |this: &Self, from: BuildState| -> Vec<DocumentId> {
            work.iter()
                .copied()
                .filter(|id| {
                    this.documents.get(id).is_some_and(|d| d.state == from)
                        && goals.get(id).is_some_and(|&goal| goal > from)
                })
                .collect()
        };

        checkpoint(cancel)?;
        let parse = select(self, BuildState::Changed);
        self.parse_phase(&parse, cancel)?;

        checkpoint(cancel)?;
        let index = select(self, BuildState::Parsed);
        self.index_phase(&index, cancel)?;

        checkpoint(cancel)?;
        let scopes = select(self, BuildState::IndexedContent);
        self.scope_phase(&scopes, cancel)?;

        checkpoint(cancel)?;
        let link = select(self, BuildState::ComputedScopes);
        self.link_phase(&link, cancel)?;

        checkpoint(cancel)?;
        let validate = select(self, BuildState::Linked);
        self.validate_phase(&validate, cancel)
    }

    fn parse_phase(
        &mut self,
        documents: &[DocumentId],
        cancel: &CancellationToken,
    ) -> Result<(), Interrupted> {
        if documents.is_empty() {
            return Ok(());
        }
        tracing::debug!(documents = documents.len(), pooled = self.pool.is_some(), "parse phase");
        let mut reached = Vec::new();
        let mut interrupted = false;

        if let Some(pool) = self.pool.as_mut() {
            let requests = documents
                .iter()
                .filter_map(|id| self.documents.get(id))
                .map(|document| (document.id(), document.shared_text()))
                .collect();
            for (id, result) in pool.parse_all(requests, cancel) {
                let Some(document) = self.documents.get_mut(&id) else {
                    continue;
                };
                match result {
                    Ok(parse) => {
                        document.parse = Some(parse);
                        document.worker_failure = None;
                        document.state = BuildState::Parsed;
                        reached.push(id);
                    }
                    Err(failure) => {
                        let diagnostic = Diagnostic::new(
                            Severity::Error,
                            failure.to_string(),
                            TextRange::default(),
                            document.line_index(),
                            DiagnosticSource::Worker,
                        )
                        .with_code(codes::WORKER_FAILURE);
                        document.worker_failure = Some(diagnostic);
                    }
                }
                document.refresh_diagnostics();
            }
            interrupted = cancel.is_cancelled();
        } else {
            for &id in documents {
                if cancel.is_cancelled() {
                    interrupted = true;
                    break;
                }
                let Some(document) = self.documents.get_mut(&id) else {
                    continue;
                };
                tracing::trace!(%id, "parsing");
                let parse = self.language.parse(document.text());
                document.parse = Some(parse);
                document.state = BuildState::Parsed;
                document.refresh_diagnostics();
                reached.push(id);
            }
        }
        self.notify(BuildState::Parsed, &reached);
        if interrupted { Err(Interrupted) } else { Ok(()) }
    }

    fn index_phase(
        &mut self,
        documents: &[DocumentId],
        cancel: &CancellationToken,
    ) -> Result<(), Interrupted> {
        if documents.is_empty() {
            return Ok(());
        }
        tracing::debug!(documents = documents.len(), "index phase");
        let language = &self.language;
        let policy = language.config().export_policy;
        let store = &self.documents;
        let outputs: Vec<(DocumentId, Vec<SymbolDescription>, Vec<String>)> = documents
            .par_iter()
            .filter_map(|&id| {
                if cancel.is_cancelled() {
                    return None;
                }
                let document = store.get(&id)?;
                let ast = document.ast()?;
                let exports =
                    compute_exports(id, ast, language.names(), policy, document.line_index());
                let dependencies = language
                    .dependency_provider()
                    .dependencies(document.uri(), ast);
                Some((id, exports, dependencies))
            })
            .collect();

        let mut reached = Vec::with_capacity(outputs.len());
        for (id, exports, dependency_uris) in outputs {
            let dependencies: Vec<DocumentId> = dependency_uris
                .iter()
                .filter_map(|uri| self.uris.get(uri).copied())
                .collect();
            if self.graph.set_dependencies(id, dependencies) {
                tracing::trace!(%id, "dependencies changed");
            }
            self.index.set_exports(id, exports);
            if let Some(document) = self.documents.get_mut(&id) {
                document.dependency_uris = dependency_uris;
                document.state = BuildState::IndexedContent;
            }
            reached.push(id);
        }
        let complete = reached.len() == documents.len();
        self.notify(BuildState::IndexedContent, &reached);
        if complete { Ok(()) } else { Err(Interrupted) }
    }

    fn scope_phase(
        &mut self,
        documents: &[DocumentId],
        cancel: &CancellationToken,
    ) -> Result<(), Interrupted> {
        if documents.is_empty() {
            return Ok(());
        }
        tracing::debug!(documents = documents.len(), "scope phase");
        let language = &self.language;
        let store = &self.documents;
        let outputs: Vec<(DocumentId, LocalSymbols)> = documents
            .par_iter()
            .filter_map(|&id| {
                if cancel.is_cancelled() {
                    return None;
                }
                let document = store.get(&id)?;
                let locals = LocalSymbols::compute(
                    id,
                    document.ast()?,
                    language.names(),
                    document.line_index(),
                );
                Some((id, locals))
            })
            .collect();

        let mut reached = Vec::with_capacity(outputs.len());
        for (id, locals) in outputs {
            if let Some(document) = self.documents.get_mut(&id) {
                document.locals = locals;
                document.state = BuildState::ComputedScopes;
                reached.push(id);
            }
        }
        let complete = reached.len() == documents.len();
        self.notify(BuildState::ComputedScopes, &reached);
        if complete { Ok(()) } else { Err(Interrupted) }
    }

    fn link_phase(
        &mut self,
        documents: &[DocumentId],
        cancel: &CancellationToken,
    ) -> Result<(), Interrupted> {
        if documents.is_empty() {
            return Ok(());
        }
        let order = self.graph.order(documents);
        tracing::debug!(documents = order.len(), "link phase");
        let language = &self.language;
        let linker = Linker::new(
            language.grammar(),
            language.scopes(),
            language.config().reference_case(),
        );
        let mut reached = Vec::new();
        let mut interrupted = false;
        for id in order {
            if cancel.is_cancelled() {
                interrupted = true;
                break;
            }
            let dependencies: Vec<DocumentId> = self.graph.dependencies(id).collect();
            let waiting = dependencies.iter().any(|dependency| {
                self.documents
                    .get(dependency)
                    .is_some_and(|d| d.state < BuildState::IndexedContent)
            });
            if waiting {
                tracing::trace!(%id, "dependencies not indexed, link deferred");
                continue;
            }
            let Some(document) = self.documents.get_mut(&id) else {
                continue;
            };
            let outcome = match document.parse.as_mut() {
                Some(parse) => {
                    linker.link(id, &mut parse.ast, &document.locals, &self.index, &dependencies)
                }
                None => LinkOutcome::default(),
            };
            tracing::trace!(%id, resolved = outcome.resolved, failed = outcome.failed, "linked");
            let references = document
                .ast()
                .map(|ast| describe_references(id, ast, document.line_index()))
                .unwrap_or_default();
            document.state = BuildState::Linked;
            document.refresh_diagnostics();
            self.index.set_references(id, references);
            reached.push(id);
        }
        self.notify(BuildState::Linked, &reached);
        if interrupted { Err(Interrupted) } else { Ok(()) }
    }

    fn validate_phase(
        &mut self,
        documents: &[DocumentId],
        cancel: &CancellationToken,
    ) -> Result<(), Interrupted> {
        if documents.is_empty() {
            return Ok(());
        }
        tracing::debug!(documents = documents.len(), enabled = self.options.validation, "validate phase");
        let language = &self.language;
        let mut reached = Vec::new();
        let mut interrupted = false;
        for &id in documents {
            if cancel.is_cancelled() {
                interrupted = true;
                break;
            }
            let Some(document) = self.documents.get_mut(&id) else {
                continue;
            };
            let validation = match (self.options.validation, document.ast()) {
                (true, Some(ast)) => {
                    language
                        .validation()
                        .validate(language.grammar(), ast, document.line_index())
                }
                _ => Vec::new(),
            };
            document.validation = validation;
            document.state = BuildState::Validated;
            document.refresh_diagnostics();
            reached.push(id);
        }
        self.notify(BuildState::Validated, &reached);
        if interrupted { Err(Interrupted) } else { Ok(()) }
    }

    fn notify(&mut self, state: BuildState, documents: &[DocumentId]) {
        if documents.is_empty() {
            return;
        }
        for listener in &mut self.listeners {
            listener(state, documents);
        }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn language(&self) -> &Arc<Language> {
        &self.language
    }

    pub fn options(&self) -> BuildOptions {
        self.options
    }

    pub fn document(&self, uri: &str) -> Option<&Document> {
        self.uris.get(uri).and_then(|id| self.documents.get(id))
    }

    pub fn document_by_id(&self, id: DocumentId) -> Option<&Document> {
        self.documents.get(&id)
    }

    pub fn document_id(&self, uri: &str) -> Option<DocumentId> {
        self.uris.get(uri).copied()
    }

    /// Open documents in opening order.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn diagnostics(&self, uri: &str) -> Option<&[Diagnostic]> {
        self.document(uri).map(Document::diagnostics)
    }

    /// Published exports of a document, in document order.
    pub fn find_exported_symbols(&self, id: DocumentId) -> &[SymbolDescription] {
        self.index.exports(id)
    }

    /// Resolved references to `target` from every linked document.
    pub fn find_references(&self, target: NodeRef) -> Vec<&ReferenceDescription> {
        self.index.find_references(target)
    }

    /// The AST node behind a workspace-wide node identity.
    pub fn node(&self, target: NodeRef) -> Option<&AstNode> {
        self.documents.get(&target.document)?.ast()?.get(target.node)
    }

    pub fn index(&self) -> &IndexManager {
        &self.index
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }
}

fn checkpoint(cancel: &CancellationToken) -> Result<(), Interrupted> {
    if cancel.is_cancelled() { Err(Interrupted) } else { Ok(()) }
}
