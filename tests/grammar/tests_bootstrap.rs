#![allow(clippy::unwrap_used)]

use strand::grammar::{GRAMMAR_LANGUAGE, Grammar, grammar_language};
use strand::parser::parse;
use strand::syntax::Value;

const SURFACE: &str = r#"
grammar Name
entry Model: persons+=Person* refs+=Ref* counts+=INT*;
Person: 'Person' name=ID;
Ref: 'ref' target=[Person:ID];
hidden terminal WS: /\s+/;
terminal fragment DIGIT: '0'..'9';
terminal INT returns number: DIGIT+;
terminal ID: /[_a-zA-Z][\w_]*/;
"#;

#[test]
fn grammar_language_compiles_from_its_own_text() {
    let built = grammar_language().unwrap();
    let parsed = Grammar::parse(GRAMMAR_LANGUAGE).unwrap();
    let names = |g: &Grammar| g.rules().iter().map(|r| r.name().clone()).collect::<Vec<_>>();
    assert_eq!(names(built), names(&parsed));
    assert_eq!(built.keywords(), parsed.keywords());
}

#[test]
fn surface_syntax_compiles() {
    let grammar = Grammar::parse(SURFACE).unwrap();
    let digit = grammar.rule_id("DIGIT").unwrap();
    assert!(grammar.rule(digit).is_fragment());
    assert!(grammar.unused_rules().is_empty());
    // Fragments are inlined into the terminals that call them.
    assert!(!grammar
        .lexer_terminals()
        .iter()
        .any(|terminal| terminal.rule == digit));
}

#[test]
fn number_terminals_convert_their_values() {
    let grammar = Grammar::parse(SURFACE).unwrap();
    let result = parse(&grammar, "Person Ann ref Ann 12 7");
    assert!(!result.has_errors(), "{:?}", result.parse_errors);
    let root = result.ast.node(result.ast.root());
    assert_eq!(
        root.get("counts"),
        Some(&Value::List(vec![Value::Number(12.0), Value::Number(7.0)]))
    );
    let (_, reference) = result.ast.references().next().unwrap();
    assert_eq!(reference.text, "Ann");
    assert_eq!(reference.target_type, "Person");
}
