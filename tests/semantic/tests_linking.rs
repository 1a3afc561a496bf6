#![allow(clippy::unwrap_used)]

use strand::config::LanguageConfig;
use strand::semantic::{ExportPolicy, Linker, codes};
use strand::syntax::Resolution;
use strand::workspace::{BuildState, Language, Workspace};
use tokio_util::sync::CancellationToken;

use crate::helpers::diagnostic_helpers::{assert_no_errors, codes as diagnostic_codes, messages};
use crate::helpers::source_fixtures::{GREETINGS, module_uri};
use crate::helpers::workspace_helpers::{
    build_all, modules_language, modules_workspace, people_language, use_targets,
};

#[test]
fn greetings_resolve_within_one_document() {
    let mut workspace = Workspace::new(people_language());
    workspace.open("file:///greetings.people", GREETINGS);
    let report = build_all(&mut workspace);
    assert_no_errors(&report.diagnostics["file:///greetings.people"]);

    let document = workspace.document("file:///greetings.people").unwrap();
    let ast = document.ast().unwrap();
    let targets: Vec<&str> = ast
        .references()
        .map(|(_, r)| {
            let target = r.target().unwrap();
            assert_eq!(target.document, document.id());
            ast.node(target.node).get_str("name").unwrap()
        })
        .collect();
    assert_eq!(targets, vec!["Alice", "Bob"]);
}

#[test]
fn container_declaration_shadows_global_one() {
    let mut workspace = modules_workspace(&[
        ("a", "module a def x"),
        ("b", "module b block k { def x use x } use x"),
    ]);
    build_all(&mut workspace);

    let b = workspace.document(&module_uri("b")).unwrap();
    let ast = b.ast().unwrap();
    let targets: Vec<_> = ast.references().map(|(_, r)| r.target().unwrap()).collect();
    // The use inside the block sees the block's own `x`.
    let inner = targets[0];
    assert_eq!(inner.document, b.id());
    let container = ast.container_of(inner.node).unwrap();
    assert_eq!(ast.node(container).get_str("name"), Some("k"));
    // The top-level use has no local `x` and falls back to the index.
    assert_eq!(use_targets(&workspace, "b"), vec![Some("x".into()), Some("x".into())]);
}

#[test]
fn declared_dependencies_win_over_other_documents() {
    let mut workspace = modules_workspace(&[
        ("a", "module a def x"),
        ("c", "module c def x"),
        ("b", "module b import \"c\" use x"),
    ]);
    build_all(&mut workspace);
    let b = workspace.document(&module_uri("b")).unwrap();
    let c = workspace.document_id(&module_uri("c")).unwrap();
    let (_, reference) = b.ast().unwrap().references().next().unwrap();
    assert_eq!(reference.target().unwrap().document, c);
}

#[test]
fn unresolved_reference_gets_a_linking_error() {
    let mut workspace = modules_workspace(&[("a", "module a use nowhere")]);
    let report = build_all(&mut workspace);
    let diagnostics = &report.diagnostics[&module_uri("a")];
    assert_eq!(
        messages(diagnostics),
        vec!["Could not resolve reference to Def named 'nowhere'."]
    );
    assert_eq!(diagnostic_codes(diagnostics), vec![codes::LINKING_ERROR]);
}

#[test]
fn references_only_bind_to_their_target_type() {
    // `k` is a Block, not a Def.
    let mut workspace = modules_workspace(&[("a", "module a block k { } use k")]);
    build_all(&mut workspace);
    assert_eq!(use_targets(&workspace, "a"), vec![None]);
}

#[test]
fn linking_twice_gives_identical_resolutions() {
    let mut workspace = modules_workspace(&[
        ("a", "module a def x def y"),
        ("b", "module b use x use y use z"),
    ]);
    build_all(&mut workspace);
    let snapshot = |workspace: &Workspace| -> Vec<Resolution> {
        let document = workspace.document(&module_uri("b")).unwrap();
        document
            .ast()
            .unwrap()
            .references()
            .map(|(_, r)| r.resolution.clone())
            .collect()
    };
    let first = snapshot(&workspace);

    // A second cycle over an unchanged workspace does no link work.
    let outcome = workspace.build_all(BuildState::Validated, &CancellationToken::new());
    assert!(!outcome.is_cancelled());
    assert_eq!(snapshot(&workspace), first);

    // Relinking from scratch reproduces the same resolutions.
    let mut reopened = modules_workspace(&[
        ("a", "module a def x def y"),
        ("b", "module b use x use y use z"),
    ]);
    build_all(&mut reopened);
    assert_eq!(snapshot(&reopened), first);
    assert!(matches!(first[2], Resolution::Failed(_)));
}

#[test]
fn unlink_resets_every_slot() {
    let mut workspace = modules_workspace(&[("a", "module a def x use x use y")]);
    build_all(&mut workspace);
    let mut ast = workspace.document(&module_uri("a")).unwrap().ast().unwrap().clone();
    Linker::unlink(&mut ast);
    assert!(ast.references().all(|(_, r)| r.resolution == Resolution::Unresolved));
}

#[test]
fn case_insensitive_references() {
    let config = LanguageConfig {
        case_insensitive_references: Some(true),
        ..LanguageConfig::default()
    };
    let mut workspace = Workspace::new(modules_language(config));
    workspace.open(module_uri("a"), "module a def Thing use thing");
    build_all(&mut workspace);
    assert_eq!(use_targets(&workspace, "a"), vec![Some("Thing".into())]);
}

const CATALOG_GRAMMAR: &str = r#"
grammar Catalog
entry Catalog: (tags+=Tag | items+=Item | labels+=Label)*;
Tag: 'tag' name=ID;
Item: 'item' name=ID;
Label: 'label' tag=[Tag:ID] 'on' item=[Item:ID];
hidden terminal WS: /\s+/;
terminal ID: /[_a-zA-Z][\w_]*/;
"#;

#[test]
fn case_override_differs_between_reference_types() {
    let config = LanguageConfig::from_json_str(
        r#"{"caseInsensitiveReferences": false, "referenceCaseInsensitive": {"Tag": true}}"#,
    )
    .unwrap();
    let language = Language::from_grammar_text(CATALOG_GRAMMAR, config).unwrap();
    let mut workspace = Workspace::new(language);
    workspace.open("file:///shop.catalog", "tag Urgent item Box label urgent on box");
    let report = build_all(&mut workspace);

    let ast = workspace.document("file:///shop.catalog").unwrap().ast().unwrap();
    let resolved: Vec<(&str, bool)> = ast
        .references()
        .map(|(_, r)| (r.target_type.as_str(), r.target().is_some()))
        .collect();
    assert_eq!(resolved, vec![("Tag", true), ("Item", false)]);
    assert_eq!(
        messages(&report.diagnostics["file:///shop.catalog"]),
        vec!["Could not resolve reference to Item named 'box'."]
    );
}

#[test]
fn top_level_export_policy_hides_nested_declarations() {
    let config = LanguageConfig {
        export_policy: ExportPolicy::TopLevel,
        ..LanguageConfig::default()
    };
    let mut workspace = Workspace::new(modules_language(config));
    let a = workspace.open(module_uri("a"), "module a def top block k { def inner }");
    workspace.open(module_uri("b"), "module b use top use inner");
    build_all(&mut workspace);

    let exported: Vec<&str> = workspace
        .find_exported_symbols(a)
        .iter()
        .map(|symbol| symbol.name.as_str())
        .collect();
    assert_eq!(exported, vec!["top", "k"]);
    assert_eq!(use_targets(&workspace, "b"), vec![Some("top".into()), None]);
}

#[test]
fn find_references_spans_documents() {
    let mut workspace = modules_workspace(&[
        ("a", "module a def x use x"),
        ("b", "module b use x"),
        ("c", "module c use y"),
    ]);
    build_all(&mut workspace);
    let a = workspace.document(&module_uri("a")).unwrap();
    let symbol = workspace
        .find_exported_symbols(a.id())
        .iter()
        .find(|s| s.name == "x")
        .unwrap()
        .clone();
    let sources: Vec<_> = workspace
        .find_references(symbol.target)
        .into_iter()
        .map(|r| r.source.document)
        .collect();
    let b = workspace.document_id(&module_uri("b")).unwrap();
    assert_eq!(sources, vec![a.id(), b]);
}
