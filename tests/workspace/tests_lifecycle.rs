#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use strand::workspace::{BuildState, Workspace};
use tokio_util::sync::CancellationToken;

use crate::helpers::source_fixtures::module_uri;
use crate::helpers::workspace_helpers::{build_all, modules_workspace, people_language};

#[test]
fn documents_start_changed_and_reach_the_target() {
    let mut workspace = modules_workspace(&[("a", "module a def x")]);
    let a = workspace.document(&module_uri("a")).unwrap();
    assert_eq!(a.state(), BuildState::Changed);
    assert!(a.ast().is_none());

    build_all(&mut workspace);
    let a = workspace.document(&module_uri("a")).unwrap();
    assert_eq!(a.state(), BuildState::Validated);
    assert!(a.diagnostics().is_empty());
}

#[test]
fn partial_target_indexes_everything_else() {
    let mut workspace = modules_workspace(&[("a", "module a def x"), ("b", "module b use x")]);
    let outcome = workspace.request_build(
        [module_uri("b")],
        BuildState::Linked,
        &CancellationToken::new(),
    );
    let report = outcome.report().unwrap();
    assert_eq!(report.diagnostics.len(), 2);
    assert_eq!(
        workspace.document(&module_uri("a")).unwrap().state(),
        BuildState::IndexedContent
    );
    assert_eq!(
        workspace.document(&module_uri("b")).unwrap().state(),
        BuildState::Linked
    );
    assert_eq!(report.error_count(), 0);
}

#[test]
fn unknown_uris_are_ignored() {
    let mut workspace = modules_workspace(&[]);
    let outcome = workspace.request_build(
        ["file:///missing.mod"],
        BuildState::Validated,
        &CancellationToken::new(),
    );
    assert!(outcome.report().unwrap().diagnostics.is_empty());
}

#[test]
fn update_bumps_version_and_resets_state() {
    let mut workspace = modules_workspace(&[("a", "module a def x")]);
    build_all(&mut workspace);
    let id = workspace.update(&module_uri("a"), "module a def y").unwrap();
    let a = workspace.document_by_id(id).unwrap();
    assert_eq!(a.version(), 1);
    assert_eq!(a.text(), "module a def y");
    assert_eq!(a.state(), BuildState::Changed);
    assert!(workspace.find_exported_symbols(id).is_empty());
    assert!(workspace.update("file:///nope.mod", "").is_none());
}

#[test]
fn reopening_an_open_uri_updates_it() {
    let mut workspace = modules_workspace(&[("a", "module a def x")]);
    let first = workspace.document_id(&module_uri("a")).unwrap();
    let again = workspace.open(module_uri("a"), "module a def y");
    assert_eq!(first, again);
    assert_eq!(workspace.len(), 1);
    assert_eq!(workspace.document_by_id(first).unwrap().version(), 1);
}

#[test]
fn closed_ids_are_not_reused() {
    let mut workspace = modules_workspace(&[("a", "module a")]);
    let a = workspace.document_id(&module_uri("a")).unwrap();
    assert!(workspace.close(&module_uri("a")));
    assert!(!workspace.close(&module_uri("a")));
    let reopened = workspace.open(module_uri("a"), "module a");
    assert_ne!(a, reopened);
    assert!(workspace.document_by_id(a).is_none());
}

#[test]
fn exported_symbols_are_in_document_order() {
    let mut workspace = modules_workspace(&[("a", "module a def x block k { def y } def z")]);
    build_all(&mut workspace);
    let id = workspace.document_id(&module_uri("a")).unwrap();
    let symbols: Vec<(&str, &str)> = workspace
        .find_exported_symbols(id)
        .iter()
        .map(|symbol| (symbol.name.as_str(), symbol.node_type.as_str()))
        .collect();
    assert_eq!(
        symbols,
        vec![("x", "Def"), ("k", "Block"), ("y", "Def"), ("z", "Def")]
    );
    let y = &workspace.find_exported_symbols(id)[2];
    assert_eq!(y.span.start.line, 0);
    assert_eq!(y.span.start.column, 29);
}

#[test]
fn listeners_see_each_phase_once() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut workspace = Workspace::new(people_language());
    let recorded = Arc::clone(&events);
    workspace.on_build_phase(move |state, documents| {
        recorded.lock().unwrap().push((state, documents.len()));
    });
    workspace.open("file:///one.people", "person A");
    workspace.open("file:///two.people", "hello A!");
    build_all(&mut workspace);
    assert_eq!(
        *events.lock().unwrap(),
        vec![
            (BuildState::Parsed, 2),
            (BuildState::IndexedContent, 2),
            (BuildState::ComputedScopes, 2),
            (BuildState::Linked, 2),
            (BuildState::Validated, 2),
        ]
    );

    events.lock().unwrap().clear();
    build_all(&mut workspace);
    assert!(events.lock().unwrap().is_empty());
}

#[test]
fn dependencies_link_first() {
    let linked = Arc::new(Mutex::new(Vec::new()));
    let mut workspace = modules_workspace(&[
        ("b", "module b import \"a\" use x"),
        ("a", "module a def x"),
    ]);
    let recorded = Arc::clone(&linked);
    workspace.on_build_phase(move |state, documents| {
        if state == BuildState::Linked {
            recorded.lock().unwrap().extend_from_slice(documents);
        }
    });
    build_all(&mut workspace);
    let a = workspace.document_id(&module_uri("a")).unwrap();
    let b = workspace.document_id(&module_uri("b")).unwrap();
    assert_eq!(*linked.lock().unwrap(), vec![a, b]);
    assert_eq!(workspace.graph().dependencies(b).collect::<Vec<_>>(), vec![a]);
}

#[test]
fn import_cycles_still_link() {
    let mut workspace = modules_workspace(&[
        ("a", "module a import \"b\" def x use y"),
        ("b", "module b import \"a\" def y use x"),
    ]);
    let report = build_all(&mut workspace);
    assert_eq!(report.error_count(), 0);
}
