#![allow(clippy::unwrap_used)]

use strand::grammar::Grammar;
use strand::parser::{ErrorCode, ParseOptions, parse, parse_with};
use strand::syntax::{FlatParse, Value, leaves};

use crate::helpers::source_fixtures::{GREETINGS, PEOPLE_GRAMMAR, PERSONS_GRAMMAR};

fn person_names(grammar: &Grammar, text: &str) -> Vec<String> {
    let result = parse(grammar, text);
    let ast = &result.ast;
    ast.node(ast.root())
        .get("persons")
        .and_then(Value::as_list)
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_node)
        .filter_map(|id| ast.node(id).get_str("name").map(str::to_string))
        .collect()
}

#[test]
fn persons_scenario() {
    let grammar = Grammar::parse(PERSONS_GRAMMAR).unwrap();
    let result = parse(&grammar, "Person Alice Person Bob");
    assert_eq!(result.errors().count(), 0);
    assert_eq!(person_names(&grammar, "Person Alice Person Bob"), vec!["Alice", "Bob"]);
}

#[test]
fn greetings_produce_reference_slots() {
    let grammar = Grammar::parse(PEOPLE_GRAMMAR).unwrap();
    let result = parse(&grammar, GREETINGS);
    assert!(!result.has_errors(), "{:?}", result.parse_errors);
    let texts: Vec<&str> = result
        .ast
        .references()
        .map(|(_, reference)| reference.text.as_str())
        .collect();
    assert_eq!(texts, vec!["Alice", "Bob"]);
    assert!(result.ast.references().all(|(_, r)| r.target().is_none()));
}

#[test]
fn comments_are_kept_in_the_tree() {
    let grammar = Grammar::parse(PEOPLE_GRAMMAR).unwrap();
    let text = "person Alice // the first\nhello Alice!";
    let result = parse(&grammar, text);
    assert!(!result.has_errors());
    let rebuilt: String = leaves(&result.syntax()).map(|t| t.text().to_string()).collect();
    assert_eq!(rebuilt, text);
}

#[test]
fn recovery_keeps_later_nodes() {
    let grammar = Grammar::parse(PEOPLE_GRAMMAR).unwrap();
    let result = parse(&grammar, "person Alice hello ! person Bob");
    assert!(result.has_errors());
    assert!(result.parse_errors.iter().any(|e| e.code == ErrorCode::E0202));
    assert_eq!(
        person_names(&grammar, "person Alice hello ! person Bob"),
        vec!["Alice", "Bob"]
    );
}

#[test]
fn nesting_depth_is_bounded() {
    let grammar = Grammar::parse(
        r#"
        grammar Nest
        entry Box: '(' inner=Box? ')';
        "#,
    )
    .unwrap();
    let text = format!("{}{}", "(".repeat(64), ")".repeat(64));
    let options = ParseOptions {
        max_depth: 16,
        ..ParseOptions::default()
    };
    let result = parse_with(&grammar, &text, &options);
    assert!(result.parse_errors.iter().any(|e| e.code == ErrorCode::E0901));
    let rebuilt: String = leaves(&result.syntax()).map(|t| t.text().to_string()).collect();
    assert_eq!(rebuilt, text);
}

#[test]
fn default_depth_limit_is_reached_on_a_small_caller_stack() {
    let grammar = Grammar::parse(
        r#"
        grammar Boxes
        entry Box: '(' inner=Box? ')';
        hidden terminal WS: /\s+/;
        "#,
    )
    .unwrap();
    let nested = |depth: usize| format!("{}{}", "(".repeat(depth), ")".repeat(depth));
    let outcome = std::thread::Builder::new()
        .stack_size(2 << 20)
        .spawn(move || {
            let shallow = parse(&grammar, &nested(450));
            let deep = parse(&grammar, &nested(600));
            (shallow.parse_errors, deep.parse_errors)
        })
        .unwrap()
        .join()
        .expect("parsing must not overflow the caller's stack");
    let (shallow, deep) = outcome;
    assert!(shallow.is_empty(), "{shallow:?}");
    assert!(deep.iter().any(|e| e.code == ErrorCode::E0901));
}

#[test]
fn stack_size_follows_the_depth_limit() {
    let small = ParseOptions {
        max_depth: 16,
        ..ParseOptions::default()
    };
    let default = ParseOptions::default();
    assert!(small.stack_size() < default.stack_size());
    let huge = ParseOptions {
        max_depth: usize::MAX,
        ..ParseOptions::default()
    };
    assert!(huge.depth_limit() < huge.max_depth);
    assert!(huge.stack_size() <= 256 << 20);
}

#[test]
fn delegated_nodes_span_the_calling_rule() {
    let grammar = Grammar::parse(
        r#"
grammar Nested
entry Model: items+=Primary*;
Primary: '(' Inner ')' | name=ID;
Inner: name=ID;
hidden terminal WS: /\s+/;
terminal ID: /[a-z]+/;
"#,
    )
    .unwrap();
    let text = "( a ) b";
    let result = parse(&grammar, text);
    assert!(!result.has_errors(), "{:?}", result.parse_errors);

    let ast = &result.ast;
    let items: Vec<_> = ast
        .node(ast.root())
        .get("items")
        .and_then(Value::as_list)
        .unwrap()
        .iter()
        .filter_map(Value::as_node)
        .collect();
    let inner = ast.node(items[0]);
    assert_eq!(inner.node_type, "Inner");
    let range = inner.range().unwrap();
    assert_eq!(&text[range], "( a )");
    assert_eq!(&text[ast.node(items[1]).range().unwrap()], "b");
}

#[test]
fn flat_parse_survives_json_and_hydrates() {
    let grammar = Grammar::parse(PEOPLE_GRAMMAR).unwrap();
    let result = parse(&grammar, "person Alice hello Alice! junk");
    let flat = result.flatten();
    let json = serde_json::to_string(&flat).unwrap();
    let restored: FlatParse = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, flat);

    let hydrated = restored.hydrate().unwrap();
    assert_eq!(hydrated.green(), result.green());
    assert_eq!(hydrated.ast, result.ast);
    assert_eq!(hydrated.parse_errors, result.parse_errors);
}
