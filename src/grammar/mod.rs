//! Grammar model, compilation and the grammar language.
//!
//! A language is defined by a [`Grammar`]: parser rules that shape the
//! syntax tree and terminal rules that shape the tokens. Grammars are
//! built either in code, with the builder functions re-exported here, or
//! from text with [`Grammar::parse`].
//!
//! ```text
//! grammar People
//! entry Model: persons+=Person*;
//! Person: 'person' name=ID;
//! hidden terminal ML_COMMENT: '/*' -> '*/';
//! hidden terminal WS: /\s+/;
//! terminal ID: /[_a-zA-Z][\w_]*/;
//! ```

mod bootstrap;
mod compile;
mod convert;
mod error;
mod model;
mod token_set;

pub use bootstrap::{GRAMMAR_LANGUAGE, grammar_language};
pub use compile::{FeatureDefault, Grammar, GrammarBuilder, LexerTerminal};
pub use error::GrammarError;
pub use model::{
    AssignOp, Cardinality, Condition, Element, ElementId, ElementKind, ParserRule, Rule,
    RuleArgument, RuleId, RuleKind, RuleRef, TerminalElement, TerminalKind, TerminalRule, action,
    action_assign, alternatives, assign, assign_add, assign_flag, assignment, call, call_with,
    char_range, cross_ref, cross_ref_via, group, keyword, literal, negated, param, parser_rule,
    regex, terminal_alternatives, terminal_call, terminal_group, terminal_rule, unordered, until,
    wildcard,
};
pub use token_set::{TokenKey, TokenSet};
