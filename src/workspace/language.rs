//! Everything that makes a grammar into a language the workspace can build.

use std::sync::Arc;

use crate::config::LanguageConfig;
use crate::grammar::{Grammar, GrammarError};
use crate::parser::{ParseOptions, parse_with};
use crate::semantic::{
    DefaultNameProvider, DefaultScopeProvider, NameProvider, ScopeProvider, ValidationRegistry,
};
use crate::syntax::{Ast, ParseResult};

/// Declares which other documents a document may reference.
///
/// Returned strings are document URIs; URIs that are not open in the
/// workspace are ignored until they are.
pub trait DependencyProvider: Send + Sync {
    fn dependencies(&self, uri: &str, ast: &Ast) -> Vec<String>;
}

impl<F> DependencyProvider for F
where
    F: Fn(&str, &Ast) -> Vec<String> + Send + Sync,
{
    fn dependencies(&self, uri: &str, ast: &Ast) -> Vec<String> {
        self(uri, ast)
    }
}

/// No declared dependencies; references still reach the global index.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDependencies;

impl DependencyProvider for NoDependencies {
    fn dependencies(&self, _uri: &str, _ast: &Ast) -> Vec<String> {
        Vec::new()
    }
}

/// A compiled grammar plus the services built on it.
#[derive(Clone)]
pub struct Language {
    grammar: Arc<Grammar>,
    config: LanguageConfig,
    names: Arc<dyn NameProvider>,
    dependencies: Arc<dyn DependencyProvider>,
    scopes: Arc<dyn ScopeProvider>,
    validation: ValidationRegistry,
}

impl std::fmt::Debug for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Language")
            .field("grammar", self.grammar.name())
            .field("config", &self.config)
            .field("validation", &self.validation)
            .finish_non_exhaustive()
    }
}

impl Language {
    pub fn new(grammar: impl Into<Arc<Grammar>>, config: LanguageConfig) -> Self {
        let grammar = grammar.into();
        for target_type in config.reference_case_insensitive.keys() {
            if !grammar.has_node_type(target_type) {
                tracing::warn!(
                    grammar = %grammar.name(),
                    %target_type,
                    "reference case override names an unknown type"
                );
            }
        }
        Self {
            grammar,
            config,
            names: Arc::new(DefaultNameProvider),
            dependencies: Arc::new(NoDependencies),
            scopes: Arc::new(DefaultScopeProvider),
            validation: ValidationRegistry::new(),
        }
    }

    /// Compiles grammar-language text with default services.
    pub fn from_grammar_text(text: &str, config: LanguageConfig) -> Result<Self, GrammarError> {
        Ok(Self::new(Grammar::parse(text)?, config))
    }

    pub fn with_name_provider(mut self, names: impl NameProvider + 'static) -> Self {
        self.names = Arc::new(names);
        self
    }

    pub fn with_dependency_provider(mut self, provider: impl DependencyProvider + 'static) -> Self {
        self.dependencies = Arc::new(provider);
        self
    }

    pub fn with_scope_provider(mut self, scopes: impl ScopeProvider + 'static) -> Self {
        self.scopes = Arc::new(scopes);
        self
    }

    pub fn with_validation(mut self, validation: ValidationRegistry) -> Self {
        self.validation = validation;
        self
    }

    pub fn grammar(&self) -> &Arc<Grammar> {
        &self.grammar
    }

    pub fn config(&self) -> &LanguageConfig {
        &self.config
    }

    pub fn names(&self) -> &dyn NameProvider {
        self.names.as_ref()
    }

    pub fn dependency_provider(&self) -> &dyn DependencyProvider {
        self.dependencies.as_ref()
    }

    pub fn scopes(&self) -> &dyn ScopeProvider {
        self.scopes.as_ref()
    }

    pub fn validation(&self) -> &ValidationRegistry {
        &self.validation
    }

    pub fn parse_options(&self) -> ParseOptions {
        self.config.parse_options()
    }

    /// Parses on the calling thread.
    pub fn parse(&self, text: &str) -> ParseResult {
        parse_with(&self.grammar, text, &self.parse_options())
    }
}
