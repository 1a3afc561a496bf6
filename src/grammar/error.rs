//! Grammar compilation errors.
//!
//! Every variant is fatal: a grammar that fails compilation never produces
//! a parser.

use smol_str::SmolStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("rule `{name}` is declared more than once")]
    DuplicateRule { name: SmolStr },

    #[error("`{name}` is not a valid rule name")]
    InvalidRuleName { name: SmolStr },

    #[error("could not resolve rule reference `{name}` in rule `{referenced_from}`")]
    UnresolvedRule {
        name: SmolStr,
        referenced_from: SmolStr,
    },

    #[error("grammar has no entry rule")]
    MissingEntryRule,

    #[error("grammar declares more than one entry rule: {}", .rules.join(", "))]
    MultipleEntryRules { rules: Vec<SmolStr> },

    #[error("entry rule `{rule}` must produce an AST node")]
    InvalidEntryRule { rule: SmolStr },

    #[error("terminal rule `{rule}` calls non-terminal rule `{callee}`")]
    TerminalCallsNonTerminal { rule: SmolStr, callee: SmolStr },

    #[error("parser rule `{rule}` calls terminal fragment `{callee}`")]
    ParserCallsTerminalFragment { rule: SmolStr, callee: SmolStr },

    #[error("terminal rule `{rule}` is recursive")]
    RecursiveTerminal { rule: SmolStr },

    #[error("terminal rule `{rule}` has an invalid pattern: {message}")]
    InvalidRegex { rule: SmolStr, message: String },

    #[error("invalid character range `{from}..{to}` in terminal rule `{rule}`")]
    InvalidCharRange {
        rule: SmolStr,
        from: SmolStr,
        to: SmolStr,
    },

    #[error("cross-reference in rule `{rule}` targets unknown type `{target_type}`")]
    UnknownType {
        rule: SmolStr,
        target_type: SmolStr,
    },

    #[error("cross-reference in rule `{rule}` uses `{token}`, which is neither a terminal nor a data type rule")]
    InvalidCrossReferenceToken { rule: SmolStr, token: SmolStr },

    #[error("cross-reference in rule `{rule}` must be the value of an assignment")]
    MisplacedCrossReference { rule: SmolStr },

    #[error("invalid value for assignment `{feature}` in rule `{rule}`")]
    InvalidAssignment { rule: SmolStr, feature: SmolStr },

    #[error("rule `{rule}` uses undeclared parameter `{parameter}`")]
    UnknownParameter { rule: SmolStr, parameter: SmolStr },

    #[error("call to `{callee}` in rule `{rule}` has invalid arguments: {message}")]
    InvalidArguments {
        rule: SmolStr,
        callee: SmolStr,
        message: String,
    },

    #[error("negated token in terminal rule `{rule}` must match exactly one character")]
    InvalidNegation { rule: SmolStr },

    #[error("rule `{rule}` is left-recursive")]
    LeftRecursion { rule: SmolStr },

    #[error("grammar declares too many {what} ({count})")]
    TooLarge { what: &'static str, count: usize },

    #[error("grammar text has errors:\n{}", .messages.join("\n"))]
    Syntax { messages: Vec<String> },
}

impl GrammarError {
    pub(crate) fn unresolved(name: &SmolStr, referenced_from: &SmolStr) -> Self {
        Self::UnresolvedRule {
            name: name.clone(),
            referenced_from: referenced_from.clone(),
        }
    }
}
