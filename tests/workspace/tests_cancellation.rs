#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::thread;

use strand::workspace::{BuildState, SharedWorkspace};
use tokio_util::sync::CancellationToken;

use crate::helpers::source_fixtures::module_uri;
use crate::helpers::workspace_helpers::{build_all, modules_workspace, use_targets};

#[test]
fn cancelled_before_start_changes_nothing() {
    let mut workspace = modules_workspace(&[("a", "module a def x")]);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = workspace.build_all(BuildState::Validated, &cancel);
    assert!(outcome.is_cancelled());
    assert!(outcome.report().is_none());
    assert_eq!(
        workspace.document(&module_uri("a")).unwrap().state(),
        BuildState::Changed
    );
}

#[rstest::rstest]
#[case(BuildState::Parsed)]
#[case(BuildState::IndexedContent)]
#[case(BuildState::ComputedScopes)]
#[case(BuildState::Linked)]
fn cancelling_after_a_phase_keeps_that_phase(#[case] stop_after: BuildState) {
    let mut workspace = modules_workspace(&[("a", "module a def x"), ("b", "module b use x")]);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    workspace.on_build_phase(move |state, _| {
        if state == stop_after {
            trigger.cancel();
        }
    });

    let outcome = workspace.build_all(BuildState::Validated, &cancel);
    assert!(outcome.is_cancelled());
    for document in workspace.documents() {
        assert_eq!(document.state(), stop_after, "{}", document.uri());
    }

    // A fresh cycle picks up where the cancelled one stopped.
    let outcome = workspace.build_all(BuildState::Validated, &CancellationToken::new());
    assert!(!outcome.is_cancelled());
    assert!(workspace.documents().all(|d| d.state() == BuildState::Validated));
    assert_eq!(use_targets(&workspace, "b"), vec![Some("x".into())]);
}

#[test]
fn edits_through_the_shared_workspace_interleave_with_builds() {
    let shared = Arc::new(SharedWorkspace::new(modules_workspace(&[
        ("a", "module a def x"),
        ("b", "module b use x"),
    ])));

    let editor = {
        let shared = Arc::clone(&shared);
        thread::spawn(move || {
            for round in 0..20 {
                let name = if round % 2 == 0 { "y" } else { "x" };
                shared.update(&module_uri("a"), &format!("module a def {name}"));
            }
        })
    };
    for _ in 0..20 {
        let _ = shared.build([module_uri("a"), module_uri("b")], BuildState::Validated);
    }
    editor.join().unwrap();

    // Whatever interleaving happened, a final uncancelled build settles on
    // the last text.
    let outcome = shared.build([module_uri("a"), module_uri("b")], BuildState::Validated);
    assert!(!outcome.is_cancelled());
    shared.read(|workspace| {
        assert_eq!(use_targets(workspace, "b"), vec![Some("x".into())]);
        assert!(workspace.documents().all(|d| d.state() == BuildState::Validated));
    });
}

#[test]
fn build_with_a_fresh_token_after_cancel_completes() {
    let mut workspace = modules_workspace(&[("a", "module a def x")]);
    let cancel = CancellationToken::new();
    cancel.cancel();
    assert!(workspace.build_all(BuildState::Validated, &cancel).is_cancelled());
    build_all(&mut workspace);
    assert_eq!(
        workspace.document(&module_uri("a")).unwrap().state(),
        BuildState::Validated
    );
}
