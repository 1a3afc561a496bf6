//! Conversion of token text into AST property values.
//!
//! Well-known terminal names get dedicated treatment; anything else is
//! converted by the declared value type of its rule.

use smol_str::SmolStr;

use crate::grammar::{Grammar, Rule, RuleId};
use crate::syntax::Value;

pub fn convert_value(grammar: &Grammar, rule: RuleId, text: &str) -> Value {
    let declared = match grammar.rule(rule) {
        Rule::Terminal(terminal) => terminal.value_type.as_deref(),
        Rule::Parser(parser) => parser.return_type.as_deref(),
    };
    match grammar.rule_name(rule).to_ascii_uppercase().as_str() {
        "INT" => number(text),
        "STRING" => Value::String(SmolStr::new(unquote(text))),
        "ID" => Value::String(SmolStr::new(text.strip_prefix('^').unwrap_or(text))),
        "REGEXLITERAL" => Value::String(SmolStr::new(strip_delimiters(text))),
        _ => match declared {
            Some("number") => number(text),
            Some("boolean") => Value::Bool(text.eq_ignore_ascii_case("true")),
            _ => Value::String(SmolStr::new(text)),
        },
    }
}

fn number(text: &str) -> Value {
    text.trim()
        .parse::<f64>()
        .map(Value::Number)
        .unwrap_or_else(|_| Value::String(SmolStr::new(text)))
}

fn strip_delimiters(text: &str) -> &str {
    let mut chars = text.chars();
    match (chars.next(), chars.next_back()) {
        (Some(_), Some(_)) => chars.as_str(),
        _ => text,
    }
}

/// Strips the surrounding quotes and resolves backslash escapes.
pub fn unquote(text: &str) -> String {
    let inner = strip_delimiters(text);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('v') => out.push('\u{b}'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
