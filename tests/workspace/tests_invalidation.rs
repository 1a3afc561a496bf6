#![allow(clippy::unwrap_used)]

use rstest::rstest;
use strand::workspace::BuildState;
use tokio_util::sync::CancellationToken;

use crate::helpers::diagnostic_helpers::messages;
use crate::helpers::source_fixtures::module_uri;
use crate::helpers::workspace_helpers::{build_all, modules_workspace, use_targets};

fn state(workspace: &strand::workspace::Workspace, name: &str) -> BuildState {
    workspace.document(&module_uri(name)).unwrap().state()
}

#[rstest]
#[case::declared_import("module b import \"a\" use X")]
#[case::global_index("module b use X")]
fn renaming_an_export_breaks_its_references(#[case] b_text: &str) {
    let mut workspace = modules_workspace(&[("a", "module a def X"), ("b", b_text)]);
    build_all(&mut workspace);
    assert_eq!(use_targets(&workspace, "b"), vec![Some("X".into())]);

    workspace.update(&module_uri("a"), "module a def Y");
    assert_eq!(state(&workspace, "a"), BuildState::Changed);
    assert_eq!(state(&workspace, "b"), BuildState::IndexedContent);
    assert!(
        workspace
            .document(&module_uri("b"))
            .unwrap()
            .ast()
            .unwrap()
            .references()
            .all(|(_, r)| r.target().is_none())
    );

    let outcome = workspace.request_build(
        [module_uri("b")],
        BuildState::Validated,
        &CancellationToken::new(),
    );
    let report = outcome.report().unwrap();
    assert_eq!(use_targets(&workspace, "b"), vec![None]);
    assert_eq!(
        messages(&report.diagnostics[&module_uri("b")]),
        vec!["Could not resolve reference to Def named 'X'."]
    );
}

#[test]
fn restoring_a_name_repairs_failed_references() {
    let mut workspace = modules_workspace(&[("a", "module a def Y"), ("b", "module b use X")]);
    build_all(&mut workspace);
    assert_eq!(use_targets(&workspace, "b"), vec![None]);

    workspace.update(&module_uri("a"), "module a def X");
    assert_eq!(state(&workspace, "b"), BuildState::IndexedContent);
    let report = build_all(&mut workspace);
    assert_eq!(report.error_count(), 0);
    assert_eq!(use_targets(&workspace, "b"), vec![Some("X".into())]);
}

#[test]
fn unrelated_documents_keep_their_state() {
    let mut workspace = modules_workspace(&[
        ("a", "module a def x"),
        ("b", "module b use x"),
        ("c", "module c def c use c"),
    ]);
    build_all(&mut workspace);
    workspace.update(&module_uri("a"), "module a def x def more");
    assert_eq!(state(&workspace, "b"), BuildState::IndexedContent);
    assert_eq!(state(&workspace, "c"), BuildState::Validated);
}

#[test]
fn opening_a_declared_dependency_relinks_the_importer() {
    let mut workspace = modules_workspace(&[("b", "module b import \"c\" use z")]);
    build_all(&mut workspace);
    assert_eq!(use_targets(&workspace, "b"), vec![None]);
    assert!(workspace.graph().dependencies(workspace.document_id(&module_uri("b")).unwrap()).next().is_none());

    workspace.open(module_uri("c"), "module c def z");
    assert_eq!(state(&workspace, "b"), BuildState::IndexedContent);
    let b = workspace.document_id(&module_uri("b")).unwrap();
    let c = workspace.document_id(&module_uri("c")).unwrap();
    assert_eq!(workspace.graph().dependencies(b).collect::<Vec<_>>(), vec![c]);

    build_all(&mut workspace);
    assert_eq!(use_targets(&workspace, "b"), vec![Some("z".into())]);
}

#[test]
fn closing_a_document_removes_its_symbols() {
    let mut workspace = modules_workspace(&[("a", "module a def x"), ("b", "module b use x")]);
    build_all(&mut workspace);
    let a = workspace.document_id(&module_uri("a")).unwrap();

    assert!(workspace.close(&module_uri("a")));
    assert!(workspace.find_exported_symbols(a).is_empty());
    assert_eq!(state(&workspace, "b"), BuildState::IndexedContent);

    let report = build_all(&mut workspace);
    assert_eq!(report.error_count(), 1);
    assert_eq!(use_targets(&workspace, "b"), vec![None]);
}

#[test]
fn transitive_importers_are_invalidated() {
    let mut workspace = modules_workspace(&[
        ("a", "module a def x"),
        ("b", "module b import \"a\" def y"),
        ("c", "module c import \"b\" use y"),
    ]);
    build_all(&mut workspace);
    workspace.update(&module_uri("a"), "module a def x2");
    assert_eq!(state(&workspace, "b"), BuildState::IndexedContent);
    assert_eq!(state(&workspace, "c"), BuildState::IndexedContent);
    build_all(&mut workspace);
    assert_eq!(use_targets(&workspace, "c"), vec![Some("y".into())]);
}
