#![allow(clippy::unwrap_used)]

use rstest::rstest;
use strand::grammar::Grammar;
use strand::parser::{Lexer, TokenKind};

fn describe(grammar: &Grammar, text: &str) -> Vec<String> {
    let lexed = Lexer::new(grammar).tokenize(text);
    lexed
        .visible_tokens()
        .map(|token| match token.kind {
            TokenKind::Keyword(_) => format!("'{}'", token.text(text)),
            TokenKind::Terminal(rule) => {
                format!("{}({})", grammar.rule_name(rule), token.text(text))
            }
            TokenKind::Error => format!("error({})", token.text(text)),
        })
        .collect()
}

#[test]
fn single_two_character_token_beats_two_short_ones() {
    let grammar = Grammar::parse(
        r#"
        grammar G
        entry M: (pairs+=AB | singles+=A)*;
        terminal AB: /ab/;
        terminal A: /[ab]/;
        "#,
    )
    .unwrap();
    assert_eq!(describe(&grammar, "ab"), vec!["AB(ab)"]);
    assert_eq!(describe(&grammar, "ba"), vec!["A(b)", "A(a)"]);
}

#[rstest]
#[case::keyword("foo", &["'foo'"])]
#[case::longer_identifier("food", &["ID(food)"])]
#[case::prefix("fo", &["ID(fo)"])]
#[case::separated("foo foo", &["'foo'", "'foo'"])]
fn keyword_and_identifier_ties(#[case] text: &str, #[case] expected: &[&str]) {
    let grammar = Grammar::parse(
        r#"
        grammar G
        entry M: (foos+='foo' | ids+=ID)*;
        hidden terminal WS: /\s+/;
        terminal ID: /[a-z]+/;
        "#,
    )
    .unwrap();
    assert_eq!(describe(&grammar, text), expected);
}

#[test]
fn unmatched_run_is_one_error_and_lexing_continues() {
    let grammar = Grammar::parse(
        r#"
        grammar G
        entry M: ids+=ID*;
        hidden terminal WS: /\s+/;
        terminal ID: /[a-z]+/;
        "#,
    )
    .unwrap();
    let lexed = Lexer::new(&grammar).tokenize("abc @#$ def");
    assert_eq!(lexed.errors.len(), 1);
    assert_eq!(
        describe(&grammar, "abc @#$ def"),
        vec!["ID(abc)", "error(@#$)", "ID(def)"]
    );
}
