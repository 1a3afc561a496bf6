//! Workspace builders.

use strand::config::LanguageConfig;
use strand::syntax::{Ast, Value};
use strand::workspace::{BuildOutcome, BuildReport, BuildState, Language, Workspace};
use tokio_util::sync::CancellationToken;

use super::source_fixtures::{MODULES_GRAMMAR, PEOPLE_GRAMMAR, module_uri};

pub fn people_language() -> Language {
    Language::from_grammar_text(PEOPLE_GRAMMAR, LanguageConfig::default())
        .expect("people grammar compiles")
}

pub fn modules_language(config: LanguageConfig) -> Language {
    Language::from_grammar_text(MODULES_GRAMMAR, config)
        .expect("modules grammar compiles")
        .with_dependency_provider(module_imports)
}

/// Each `import "x"` declares a dependency on `file:///x.mod`.
pub fn module_imports(_uri: &str, ast: &Ast) -> Vec<String> {
    if ast.is_empty() {
        return Vec::new();
    }
    ast.descendants(ast.root())
        .into_iter()
        .map(|id| ast.node(id))
        .filter(|node| node.node_type == "Import")
        .filter_map(|node| node.get("module").and_then(Value::as_str))
        .map(module_uri)
        .collect()
}

/// A modules workspace with `(name, text)` documents opened in order.
pub fn modules_workspace(documents: &[(&str, &str)]) -> Workspace {
    let mut workspace = Workspace::new(modules_language(LanguageConfig::default()));
    for (name, text) in documents {
        workspace.open(module_uri(name), text);
    }
    workspace
}

/// Builds everything to `Validated`, failing the test on cancellation.
pub fn build_all(workspace: &mut Workspace) -> BuildReport {
    match workspace.build_all(BuildState::Validated, &CancellationToken::new()) {
        BuildOutcome::Completed(report) => report,
        BuildOutcome::Cancelled => panic!("build was cancelled"),
    }
}

/// Resolution of every `use` in a module, as `Some(target name)` or `None`.
pub fn use_targets(workspace: &Workspace, name: &str) -> Vec<Option<String>> {
    let document = workspace
        .document(&module_uri(name))
        .expect("document is open");
    let ast = document.ast().expect("document is parsed");
    ast.references()
        .map(|(_, reference)| {
            reference
                .target()
                .and_then(|target| workspace.node(target))
                .and_then(|node| node.get_str("name"))
                .map(str::to_string)
        })
        .collect()
}
