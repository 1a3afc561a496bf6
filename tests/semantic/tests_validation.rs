#![allow(clippy::unwrap_used)]

use strand::config::{BuildOptions, LanguageConfig};
use strand::semantic::{DiagnosticSource, Severity, ValidationRegistry, codes};
use strand::workspace::{BuildState, Workspace};
use tokio_util::sync::CancellationToken;

use crate::helpers::diagnostic_helpers::messages;
use crate::helpers::source_fixtures::module_uri;
use crate::helpers::workspace_helpers::{build_all, modules_language};

fn uppercase_checks() -> ValidationRegistry {
    let mut registry = ValidationRegistry::new();
    registry.register("Element", |ast, node, acceptor| {
        let node = ast.node(node);
        if let Some(name) = node.get_str("name") {
            if !name.starts_with(|c: char| c.is_ascii_uppercase()) {
                let range = node.feature_range("name").unwrap_or_default();
                acceptor
                    .warning(format!("'{name}' should start with a capital"), range)
                    .code = Some("lowercase-name".into());
            }
        }
    });
    registry
}

#[test]
fn checks_run_on_subtypes_and_merge_in_position_order() {
    let language = modules_language(LanguageConfig::default()).with_validation(uppercase_checks());
    let mut workspace = Workspace::new(language);
    workspace.open(module_uri("a"), "module a def lower use missing def Upper");
    let report = build_all(&mut workspace);
    let diagnostics = &report.diagnostics[&module_uri("a")];
    assert_eq!(
        messages(diagnostics),
        vec![
            "'lower' should start with a capital",
            "Could not resolve reference to Def named 'missing'.",
        ]
    );
    assert_eq!(diagnostics[0].severity, Severity::Warning);
    assert_eq!(diagnostics[0].source, DiagnosticSource::Validation);
    assert_eq!(diagnostics[1].code.as_deref(), Some(codes::LINKING_ERROR));
}

#[test]
fn disabled_validation_still_reaches_validated() {
    let language = modules_language(LanguageConfig::default()).with_validation(uppercase_checks());
    let mut workspace =
        Workspace::new(language).with_options(BuildOptions { validation: false });
    workspace.open(module_uri("a"), "module a def lower");
    let report = build_all(&mut workspace);
    assert!(report.diagnostics[&module_uri("a")].is_empty());
    assert_eq!(
        workspace.document(&module_uri("a")).unwrap().state(),
        BuildState::Validated
    );
}

#[test]
fn panicking_check_becomes_a_diagnostic() {
    let mut registry = ValidationRegistry::new();
    registry.register("Def", |_, _, _| panic!("boom"));
    let language = modules_language(LanguageConfig::default()).with_validation(registry);
    let mut workspace = Workspace::new(language);
    workspace.open(module_uri("a"), "module a def x");
    let outcome = workspace.build_all(BuildState::Validated, &CancellationToken::new());
    let report = outcome.report().unwrap();
    let diagnostics = &report.diagnostics[&module_uri("a")];
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0].message,
        "An error occurred during validation: boom"
    );
    assert_eq!(diagnostics[0].code.as_deref(), Some(codes::VALIDATION_FAILURE));
}
