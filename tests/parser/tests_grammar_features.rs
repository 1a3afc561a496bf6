//! Actions, unordered groups, rule parameters and terminal operators.

#![allow(clippy::unwrap_used)]

use strand::grammar::Grammar;
use strand::parser::{ErrorCode, SyntaxKind, parse};
use strand::syntax::{Ast, AstId, Value, leaves};

const ARITHMETIC: &str = r#"
grammar Arithmetic
entry Expression: Addition;
Addition: Primary ({BinaryExpr.left=current} operator=('+' | '-') right=Primary)*;
Primary: value=INT | '(' Addition ')';
hidden terminal WS: /\s+/;
terminal INT returns number: /[0-9]+/;
"#;

const CARDS: &str = r#"
grammar Cards
entry Deck: cards+=Card*;
Card: 'card' name=ID ('color' color=ID & 'size' size=INT);
hidden terminal WS: /\s+/;
terminal ID: /[a-z]+/;
terminal INT returns number: /[0-9]+/;
"#;

const TYPED: &str = r#"
grammar Typed
entry Model: 'strict' strict=Item<true> 'loose' loose=Item<Typed=false> values+=Value<true>;
Item<Typed>: name=ID (<Typed> ':' type=ID)?;
Value<Num>: <Num> number=INT | <!Num> text=ID;
hidden terminal WS: /\s+/;
terminal ID: /[a-zA-Z]+/;
terminal INT returns number: /[0-9]+/;
"#;

const TEXTS: &str = r#"
grammar Texts
entry Model: values+=TEXT*;
hidden terminal WS: /\s+/;
hidden terminal ML_COMMENT: '/*' -> '*/';
terminal TEXT: '"' (!'"')* '"';
"#;

fn child(ast: &Ast, node: AstId, feature: &str) -> AstId {
    ast.node(node).get(feature).and_then(Value::as_node).unwrap()
}

fn number(ast: &Ast, node: AstId) -> f64 {
    ast.node(node).get("value").and_then(Value::as_number).unwrap()
}

#[test]
fn actions_build_left_nested_trees() {
    let grammar = Grammar::parse(ARITHMETIC).unwrap();
    let text = "1 - 2 - 3";
    let result = parse(&grammar, text);
    assert!(!result.has_errors(), "{:?}", result.parse_errors);

    let ast = &result.ast;
    let root = ast.root();
    assert_eq!(ast.node(root).node_type, "BinaryExpr");
    assert_eq!(ast.node(root).get_str("operator"), Some("-"));
    assert_eq!(number(ast, child(ast, root, "right")), 3.0);

    let left = child(ast, root, "left");
    assert_eq!(ast.node(left).node_type, "BinaryExpr");
    assert_eq!(ast.container_of(left), Some(root));
    assert_eq!(number(ast, child(ast, left, "left")), 1.0);
    assert_eq!(number(ast, child(ast, left, "right")), 2.0);

    let syntax = result.syntax();
    let node = ast.node(left).cst.unwrap().to_node(&syntax).unwrap();
    assert_eq!(node.text().to_string(), "1 - 2");
    let rebuilt: String = leaves(&syntax).map(|t| t.text().to_string()).collect();
    assert_eq!(rebuilt, text);

    assert!(grammar.is_subtype("BinaryExpr", "Addition"));
    assert!(grammar.is_subtype("BinaryExpr", "Expression"));
}

#[test]
fn action_without_repetition_keeps_the_delegate() {
    let grammar = Grammar::parse(ARITHMETIC).unwrap();
    let result = parse(&grammar, "(7)");
    assert!(!result.has_errors(), "{:?}", result.parse_errors);
    let root = result.ast.node(result.ast.root());
    assert_eq!(root.node_type, "Primary");
    assert_eq!(root.get("value"), Some(&Value::Number(7.0)));
}

#[test]
fn unordered_group_members_come_in_any_order() {
    let grammar = Grammar::parse(CARDS).unwrap();
    let result = parse(&grammar, "card a size 3 color red card b color blue size 4");
    assert!(!result.has_errors(), "{:?}", result.parse_errors);
    let ast = &result.ast;
    let cards: Vec<(String, String, f64)> = ast
        .node(ast.root())
        .get("cards")
        .and_then(Value::as_list)
        .unwrap()
        .iter()
        .filter_map(Value::as_node)
        .map(|id| {
            let card = ast.node(id);
            (
                card.get_str("name").unwrap().to_string(),
                card.get_str("color").unwrap().to_string(),
                card.get("size").and_then(Value::as_number).unwrap(),
            )
        })
        .collect();
    assert_eq!(
        cards,
        vec![
            ("a".to_string(), "red".to_string(), 3.0),
            ("b".to_string(), "blue".to_string(), 4.0),
        ]
    );
}

#[test]
fn unordered_group_reports_missing_members() {
    let grammar = Grammar::parse(CARDS).unwrap();
    let result = parse(&grammar, "card a size 3");
    assert_eq!(result.parse_errors.len(), 1, "{:?}", result.parse_errors);
    assert_eq!(result.parse_errors[0].code, ErrorCode::E0202);
    assert_eq!(
        result.parse_errors[0].message,
        "Expecting keyword 'color' but found end of input."
    );
}

#[test]
fn guards_follow_rule_arguments() {
    let grammar = Grammar::parse(TYPED).unwrap();
    let result = parse(&grammar, "strict a : T loose b 42");
    assert!(!result.has_errors(), "{:?}", result.parse_errors);
    let ast = &result.ast;
    let root = ast.root();
    assert_eq!(ast.node(child(ast, root, "strict")).get_str("type"), Some("T"));
    assert_eq!(ast.node(child(ast, root, "loose")).get("type"), None);
    let values = ast.node(root).get("values").and_then(Value::as_list).unwrap();
    let value = ast.node(values[0].as_node().unwrap());
    assert_eq!(value.get("number"), Some(&Value::Number(42.0)));
}

#[test]
fn false_guard_disables_its_branch() {
    let grammar = Grammar::parse(TYPED).unwrap();
    let result = parse(&grammar, "strict a loose b : T 1");
    assert!(
        result.parse_errors.iter().any(|e| e.message.contains("found ':'")),
        "{:?}",
        result.parse_errors
    );

    let result = parse(&grammar, "strict a loose b word");
    assert!(result.has_errors());
}

#[test]
fn until_and_negated_tokens() {
    let grammar = Grammar::parse(TEXTS).unwrap();
    let text = r#""a*/b" /* skip "this" ** */ "c""#;
    let result = parse(&grammar, text);
    assert!(!result.has_errors(), "{:?}", result.errors().collect::<Vec<_>>());
    let values = result.ast.node(result.ast.root()).get("values").and_then(Value::as_list).unwrap();
    let texts: Vec<&str> = values.iter().filter_map(Value::as_str).collect();
    assert_eq!(texts, vec![r#""a*/b""#, r#""c""#]);

    let comment = grammar.rule_id("ML_COMMENT").unwrap();
    let comments: Vec<String> = leaves(&result.syntax())
        .filter(|token| token.kind() == SyntaxKind::Terminal(comment))
        .map(|token| token.text().to_string())
        .collect();
    assert_eq!(comments, vec![r#"/* skip "this" ** */"#]);
}
