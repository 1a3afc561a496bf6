#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use strand::config::LanguageConfig;
use strand::parser::parse_with;
use strand::semantic::{DiagnosticSource, codes};
use strand::workspace::{BuildState, ParseFn, ParserPool, Workspace};

use crate::helpers::source_fixtures::module_uri;
use crate::helpers::workspace_helpers::{build_all, modules_language, use_targets};

#[test]
fn configured_workers_parse_off_thread() {
    let config = LanguageConfig {
        parser_workers: 2,
        ..LanguageConfig::default()
    };
    let mut workspace = Workspace::new(modules_language(config));
    for (name, text) in [
        ("a", "module a def x"),
        ("b", "module b use x"),
        ("c", "module c import \"a\" use x"),
    ] {
        workspace.open(module_uri(name), text);
    }
    let report = build_all(&mut workspace);
    assert_eq!(report.error_count(), 0);
    assert_eq!(use_targets(&workspace, "b"), vec![Some("x".into())]);
    assert_eq!(use_targets(&workspace, "c"), vec![Some("x".into())]);
}

#[test]
fn crashing_parse_fails_only_its_document() {
    let language = modules_language(LanguageConfig::default());
    let grammar = Arc::clone(language.grammar());
    let options = language.parse_options();
    let parse: ParseFn = Arc::new(move |text: &str| {
        if text.contains("crash") {
            panic!("parser crashed");
        }
        parse_with(&grammar, text, &options).flatten()
    });
    let mut workspace = Workspace::new(language).with_parser_pool(ParserPool::new(1, parse));
    workspace.open(module_uri("a"), "module a def x");
    workspace.open(module_uri("bad"), "module crash");
    workspace.open(module_uri("b"), "module b use x");

    let report = build_all(&mut workspace);
    let bad = &report.diagnostics[&module_uri("bad")];
    assert_eq!(bad.len(), 1);
    assert_eq!(bad[0].code.as_deref(), Some(codes::WORKER_FAILURE));
    assert_eq!(bad[0].source, DiagnosticSource::Worker);
    assert!(bad[0].message.contains("parser crashed"));
    assert_eq!(
        workspace.document(&module_uri("bad")).unwrap().state(),
        BuildState::Changed
    );
    assert_eq!(use_targets(&workspace, "b"), vec![Some("x".into())]);

    workspace.update(&module_uri("bad"), "module fine");
    let report = build_all(&mut workspace);
    assert!(report.diagnostics[&module_uri("bad")].is_empty());
    assert_eq!(
        workspace.document(&module_uri("bad")).unwrap().state(),
        BuildState::Validated
    );
}
