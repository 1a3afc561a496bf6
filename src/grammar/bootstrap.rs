//! The grammar language, described with the engine's own rule model.
//!
//! [`grammar_language`] is built in code; [`GRAMMAR_LANGUAGE`] is the same
//! grammar written in its own notation, which the built-in grammar must be
//! able to parse and reproduce.

use std::sync::LazyLock;

use super::compile::{Grammar, GrammarBuilder};
use super::error::GrammarError;
use super::model::{
    AssignOp, Element, action_assign, alternatives, assign, assign_add, assign_flag, call, group,
    keyword, literal, parser_rule, regex, terminal_group, terminal_rule, until,
};

/// Textual form of the grammar language.
pub const GRAMMAR_LANGUAGE: &str = r#"grammar GrammarLanguage

entry Grammar:
    'grammar' name=ID rules+=AbstractRule*;

AbstractRule:
    ParserRule | TerminalRule;

ParserRule:
    (isEntry?='entry' | isFragment?='fragment')? name=ID
    ('<' parameters+=ID (',' parameters+=ID)* '>')?
    ('returns' returnType=ID)?
    ':' definition=Alternatives ';';

Alternatives:
    elements+=UnorderedGroup ('|' elements+=UnorderedGroup)*;

UnorderedGroup:
    elements+=Group ('&' elements+=Group)*;

Group:
    ('<' guard=Disjunction '>')? elements+=AbstractElement+;

AbstractElement:
    Keyword | NamedElement | ParenthesizedElement | Action;

Keyword:
    value=STRING cardinality=('?' | '*' | '+')?;

NamedElement:
    name=ID (Arguments | operator=('=' | '+=' | '?=') value=Assignable)? cardinality=('?' | '*' | '+')?;

ParenthesizedElement:
    '(' alternatives=Alternatives ')' cardinality=('?' | '*' | '+')?;

Action:
    '{' type=ID ('.' feature=ID operator=('=' | '+=') 'current')? '}';

fragment Arguments:
    '<' arguments+=NamedArgument (',' arguments+=NamedArgument)* '>';

NamedArgument:
    condition=Disjunction ('=' value=Disjunction)?;

Disjunction:
    Conjunction ({Disjunction.left=current} '|' right=Conjunction)*;

Conjunction:
    Negation ({Conjunction.left=current} '&' right=Negation)*;

Negation:
    '!' value=Negation | Atom;

Atom:
    ParameterReference | '(' Disjunction ')' | LiteralCondition;

ParameterReference:
    parameter=ID;

LiteralCondition:
    isTrue?='true' | 'false';

Assignable:
    KeywordValue | RuleValue | CrossReference | AssignableAlternatives;

KeywordValue:
    value=STRING;

RuleValue:
    rule=ID Arguments?;

CrossReference:
    '[' type=ID (':' terminal=ID)? ']';

AssignableAlternatives:
    '(' elements+=Assignable ('|' elements+=Assignable)* ')';

TerminalRule:
    isHidden?='hidden'? 'terminal' isFragment?='fragment'? name=ID ('returns' valueType=ID)?
    ':' definition=TerminalAlternatives ';';

TerminalAlternatives:
    elements+=TerminalGroup ('|' elements+=TerminalGroup)*;

TerminalGroup:
    elements+=TerminalToken+;

TerminalToken:
    RegexToken | CharacterRange | TerminalRuleCall | TerminalParenthesized | Wildcard
    | NegatedToken | UntilToken;

RegexToken:
    regex=RegexLiteral cardinality=('?' | '*' | '+')?;

CharacterRange:
    left=STRING ('..' right=STRING)? cardinality=('?' | '*' | '+')?;

TerminalRuleCall:
    rule=ID cardinality=('?' | '*' | '+')?;

TerminalParenthesized:
    '(' alternatives=TerminalAlternatives ')' cardinality=('?' | '*' | '+')?;

Wildcard:
    wildcard?='.' cardinality=('?' | '*' | '+')?;

NegatedToken:
    '!' terminal=TerminalToken;

UntilToken:
    '->' terminal=TerminalToken;

hidden terminal WS: /\s+/;
hidden terminal ML_COMMENT: '/*' -> '*/';
hidden terminal SL_COMMENT: /\/\/[^\n\r]*/;
terminal ID: /\^?[_a-zA-Z]\w*/;
terminal STRING: /"(\\.|[^"\\])*"|'(\\.|[^'\\])*'/;
terminal RegexLiteral: /\/(?:[^\s*\/\\\[]|\\.|\[(?:[^\]\\\n]|\\.)*\])(?:[^\n\/\\\[]|\\.|\[(?:[^\]\\\n]|\\.)*\])*\//;
"#;

static GRAMMAR_LANGUAGE_RULES: LazyLock<Result<Grammar, GrammarError>> =
    LazyLock::new(build_grammar_language);

/// The compiled grammar language, built once per process.
pub fn grammar_language() -> Result<&'static Grammar, GrammarError> {
    GRAMMAR_LANGUAGE_RULES.as_ref().map_err(Clone::clone)
}

fn cardinality() -> Element {
    assign(
        "cardinality",
        alternatives([keyword("?"), keyword("*"), keyword("+")]),
    )
    .opt()
}

/// `feature+=Item (separator feature+=Item)*`
fn separated(feature: &str, item: &str, separator: &str) -> Element {
    group([
        assign_add(feature, call(item)),
        group([keyword(separator), assign_add(feature, call(item))]).many(),
    ])
}

/// `Operand ({Type.left=current} operator right=Operand)*`
fn binary(node_type: &str, operand: &str, operator: &str) -> Element {
    group([
        call(operand),
        group([
            action_assign(node_type, "left", AssignOp::Assign),
            keyword(operator),
            assign("right", call(operand)),
        ])
        .many(),
    ])
}

fn build_grammar_language() -> Result<Grammar, GrammarError> {
    GrammarBuilder::new("GrammarLanguage")
        .rule(
            parser_rule(
                "Grammar",
                group([
                    keyword("grammar"),
                    assign("name", call("ID")),
                    assign_add("rules", call("AbstractRule")).many(),
                ]),
            )
            .entry(),
        )
        .rule(parser_rule(
            "AbstractRule",
            alternatives([call("ParserRule"), call("TerminalRule")]),
        ))
        .rule(parser_rule(
            "ParserRule",
            group([
                alternatives([
                    assign_flag("isEntry", keyword("entry")),
                    assign_flag("isFragment", keyword("fragment")),
                ])
                .opt(),
                assign("name", call("ID")),
                group([
                    keyword("<"),
                    separated("parameters", "ID", ","),
                    keyword(">"),
                ])
                .opt(),
                group([keyword("returns"), assign("returnType", call("ID"))]).opt(),
                keyword(":"),
                assign("definition", call("Alternatives")),
                keyword(";"),
            ]),
        ))
        .rule(parser_rule(
            "Alternatives",
            separated("elements", "UnorderedGroup", "|"),
        ))
        .rule(parser_rule("UnorderedGroup", separated("elements", "Group", "&")))
        .rule(parser_rule(
            "Group",
            group([
                group([
                    keyword("<"),
                    assign("guard", call("Disjunction")),
                    keyword(">"),
                ])
                .opt(),
                assign_add("elements", call("AbstractElement")).at_least_one(),
            ]),
        ))
        .rule(parser_rule(
            "AbstractElement",
            alternatives([
                call("Keyword"),
                call("NamedElement"),
                call("ParenthesizedElement"),
                call("Action"),
            ]),
        ))
        .rule(parser_rule(
            "Keyword",
            group([assign("value", call("STRING")), cardinality()]),
        ))
        .rule(parser_rule(
            "NamedElement",
            group([
                assign("name", call("ID")),
                alternatives([
                    call("Arguments"),
                    group([
                        assign(
                            "operator",
                            alternatives([keyword("="), keyword("+="), keyword("?=")]),
                        ),
                        assign("value", call("Assignable")),
                    ]),
                ])
                .opt(),
                cardinality(),
            ]),
        ))
        .rule(parser_rule(
            "ParenthesizedElement",
            group([
                keyword("("),
                assign("alternatives", call("Alternatives")),
                keyword(")"),
                cardinality(),
            ]),
        ))
        .rule(parser_rule(
            "Action",
            group([
                keyword("{"),
                assign("type", call("ID")),
                group([
                    keyword("."),
                    assign("feature", call("ID")),
                    assign("operator", alternatives([keyword("="), keyword("+=")])),
                    keyword("current"),
                ])
                .opt(),
                keyword("}"),
            ]),
        ))
        .rule(
            parser_rule(
                "Arguments",
                group([
                    keyword("<"),
                    separated("arguments", "NamedArgument", ","),
                    keyword(">"),
                ]),
            )
            .fragment(),
        )
        .rule(parser_rule(
            "NamedArgument",
            group([
                assign("condition", call("Disjunction")),
                group([keyword("="), assign("value", call("Disjunction"))]).opt(),
            ]),
        ))
        .rule(parser_rule(
            "Disjunction",
            binary("Disjunction", "Conjunction", "|"),
        ))
        .rule(parser_rule(
            "Conjunction",
            binary("Conjunction", "Negation", "&"),
        ))
        .rule(parser_rule(
            "Negation",
            alternatives([
                group([keyword("!"), assign("value", call("Negation"))]),
                call("Atom"),
            ]),
        ))
        .rule(parser_rule(
            "Atom",
            alternatives([
                call("ParameterReference"),
                group([keyword("("), call("Disjunction"), keyword(")")]),
                call("LiteralCondition"),
            ]),
        ))
        .rule(parser_rule(
            "ParameterReference",
            assign("parameter", call("ID")),
        ))
        .rule(parser_rule(
            "LiteralCondition",
            alternatives([assign_flag("isTrue", keyword("true")), keyword("false")]),
        ))
        .rule(parser_rule(
            "Assignable",
            alternatives([
                call("KeywordValue"),
                call("RuleValue"),
                call("CrossReference"),
                call("AssignableAlternatives"),
            ]),
        ))
        .rule(parser_rule("KeywordValue", assign("value", call("STRING"))))
        .rule(parser_rule(
            "RuleValue",
            group([assign("rule", call("ID")), call("Arguments").opt()]),
        ))
        .rule(parser_rule(
            "CrossReference",
            group([
                keyword("["),
                assign("type", call("ID")),
                group([keyword(":"), assign("terminal", call("ID"))]).opt(),
                keyword("]"),
            ]),
        ))
        .rule(parser_rule(
            "AssignableAlternatives",
            group([
                keyword("("),
                separated("elements", "Assignable", "|"),
                keyword(")"),
            ]),
        ))
        .rule(parser_rule(
            "TerminalRule",
            group([
                assign_flag("isHidden", keyword("hidden")).opt(),
                keyword("terminal"),
                assign_flag("isFragment", keyword("fragment")).opt(),
                assign("name", call("ID")),
                group([keyword("returns"), assign("valueType", call("ID"))]).opt(),
                keyword(":"),
                assign("definition", call("TerminalAlternatives")),
                keyword(";"),
            ]),
        ))
        .rule(parser_rule(
            "TerminalAlternatives",
            separated("elements", "TerminalGroup", "|"),
        ))
        .rule(parser_rule(
            "TerminalGroup",
            assign_add("elements", call("TerminalToken")).at_least_one(),
        ))
        .rule(parser_rule(
            "TerminalToken",
            alternatives([
                call("RegexToken"),
                call("CharacterRange"),
                call("TerminalRuleCall"),
                call("TerminalParenthesized"),
                call("Wildcard"),
                call("NegatedToken"),
                call("UntilToken"),
            ]),
        ))
        .rule(parser_rule(
            "RegexToken",
            group([assign("regex", call("RegexLiteral")), cardinality()]),
        ))
        .rule(parser_rule(
            "CharacterRange",
            group([
                assign("left", call("STRING")),
                group([keyword(".."), assign("right", call("STRING"))]).opt(),
                cardinality(),
            ]),
        ))
        .rule(parser_rule(
            "TerminalRuleCall",
            group([assign("rule", call("ID")), cardinality()]),
        ))
        .rule(parser_rule(
            "TerminalParenthesized",
            group([
                keyword("("),
                assign("alternatives", call("TerminalAlternatives")),
                keyword(")"),
                cardinality(),
            ]),
        ))
        .rule(parser_rule(
            "Wildcard",
            group([assign_flag("wildcard", keyword(".")), cardinality()]),
        ))
        .rule(parser_rule(
            "NegatedToken",
            group([keyword("!"), assign("terminal", call("TerminalToken"))]),
        ))
        .rule(parser_rule(
            "UntilToken",
            group([keyword("->"), assign("terminal", call("TerminalToken"))]),
        ))
        .rule(terminal_rule("WS", regex(r"\s+")).hidden())
        .rule(
            terminal_rule(
                "ML_COMMENT",
                terminal_group([literal("/*"), until(literal("*/"))]),
            )
            .hidden(),
        )
        .rule(terminal_rule("SL_COMMENT", regex(r"\/\/[^\n\r]*")).hidden())
        .rule(terminal_rule("ID", regex(r"\^?[_a-zA-Z]\w*")))
        .rule(terminal_rule(
            "STRING",
            regex(r#""(\\.|[^"\\])*"|'(\\.|[^'\\])*'"#),
        ))
        .rule(terminal_rule(
            "RegexLiteral",
            regex(r"\/(?:[^\s*\/\\\[]|\\.|\[(?:[^\]\\\n]|\\.)*\])(?:[^\n\/\\\[]|\\.|\[(?:[^\]\\\n]|\\.)*\])*\/"),
        ))
        .compile()
}
