//! Lexer and parser tests

pub mod tests_grammar_features;
pub mod tests_lexer;
pub mod tests_parse;
pub mod tests_properties;
