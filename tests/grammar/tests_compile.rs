#![allow(clippy::unwrap_used)]

use rstest::rstest;
use strand::grammar::{Grammar, GrammarError, RuleKind};

use crate::helpers::source_fixtures::{MODULES_GRAMMAR, PEOPLE_GRAMMAR, PERSONS_GRAMMAR};

#[rstest]
#[case::people(PEOPLE_GRAMMAR)]
#[case::persons(PERSONS_GRAMMAR)]
#[case::modules(MODULES_GRAMMAR)]
fn compiling_twice_gives_the_same_grammar(#[case] text: &str) {
    let first = Grammar::parse(text).unwrap();
    let second = Grammar::parse(text).unwrap();
    assert_eq!(first.reachable_rules(), second.reachable_rules());
    assert_eq!(first.keywords(), second.keywords());
    assert_eq!(
        first.node_types().collect::<Vec<_>>(),
        second.node_types().collect::<Vec<_>>()
    );
}

#[test]
fn keywords_are_sorted() {
    let grammar = Grammar::parse(PEOPLE_GRAMMAR).unwrap();
    let keywords: Vec<&str> = grammar.keywords().iter().map(|k| k.as_str()).collect();
    assert_eq!(keywords, vec!["!", "hello", "person"]);
}

#[test]
fn unresolved_rule_reference_names_the_rule() {
    let err = Grammar::parse("grammar G entry Foo: Bar;").unwrap_err();
    match &err {
        GrammarError::UnresolvedRule { name, .. } => assert_eq!(name, "Bar"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("`Bar`"));
}

#[rstest]
#[case::duplicate_rule("grammar G entry A: name=ID; A: 'b'; terminal ID: /[a-z]+/;", "DuplicateRule")]
#[case::missing_entry("grammar G A: name=ID; terminal ID: /[a-z]+/;", "MissingEntryRule")]
#[case::recursive_terminal("grammar G entry A: name=ID; terminal ID: ID 'a';", "RecursiveTerminal")]
#[case::left_recursion(
    "grammar G entry A: items+=B; B: B name=ID; terminal ID: /[a-z]+/;",
    "LeftRecursion"
)]
#[case::unknown_type("grammar G entry A: x=[Missing:ID]; terminal ID: /[a-z]+/;", "UnknownType")]
#[case::invalid_regex("grammar G entry A: x=T; terminal T: /(/;", "InvalidRegex")]
#[case::unknown_parameter(
    "grammar G entry A<P>: <Q> name=ID; terminal ID: /[a-z]+/;",
    "UnknownParameter"
)]
#[case::too_many_arguments(
    "grammar G entry A: x=B<true, false>; B<P>: name=ID; terminal ID: /[a-z]+/;",
    "InvalidArguments"
)]
#[case::unknown_named_argument(
    "grammar G entry A: x=B<Q=true>; B<P>: name=ID; terminal ID: /[a-z]+/;",
    "InvalidArguments"
)]
#[case::invalid_negation("grammar G entry A: x=T; terminal T: !'ab';", "InvalidNegation")]
fn fatal_grammar_errors(#[case] text: &str, #[case] expected: &str) {
    let err = Grammar::parse(text).unwrap_err();
    let variant = format!("{err:?}");
    assert!(
        variant.starts_with(expected),
        "expected {expected}, got {variant}"
    );
}

#[test]
fn delegating_rules_are_supertypes() {
    let grammar = Grammar::parse(MODULES_GRAMMAR).unwrap();
    for sub in ["Block", "Def", "Use"] {
        assert!(grammar.is_subtype(sub, "Element"), "{sub} should be an Element");
    }
    assert!(grammar.is_subtype("Def", "Def"));
    assert!(!grammar.is_subtype("Element", "Def"));
    assert!(grammar.has_node_type("Module"));
}

#[test]
fn unused_rules_are_reported_but_allowed() {
    let grammar = Grammar::parse(
        "grammar G entry A: name=ID; Orphan: 'orphan' name=ID; terminal ID: /[a-z]+/;",
    )
    .unwrap();
    let unused: Vec<&str> = grammar.unused_rules().iter().map(|n| n.as_str()).collect();
    assert_eq!(unused, vec!["Orphan"]);
    assert!(!grammar.keywords().iter().any(|k| k == "orphan"));
}

#[test]
fn data_type_rules_are_inferred() {
    let grammar = Grammar::parse(
        r#"
        grammar Q
        entry Model: names+=QualifiedName*;
        QualifiedName: ID ('.' ID)*;
        hidden terminal WS: /\s+/;
        terminal ID: /[a-z]+/;
        "#,
    )
    .unwrap();
    let rule = grammar.rule_id("QualifiedName").unwrap();
    assert_eq!(grammar.rule_kind(rule), RuleKind::DataType);
    let model = grammar.rule_id("Model").unwrap();
    assert_eq!(grammar.rule_kind(model), RuleKind::Parser);
}
