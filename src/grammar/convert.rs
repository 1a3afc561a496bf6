//! Conversion of a parsed grammar document into rule definitions.

use smol_str::SmolStr;

use crate::base::LineIndex;
use crate::parser::parse;
use crate::syntax::{Ast, AstId, AstNode, Value};

use super::bootstrap::grammar_language;
use super::compile::{Grammar, GrammarBuilder};
use super::error::GrammarError;
use super::model::{
    AssignOp, Cardinality, Condition, Element, ParserRule, RuleArgument, TerminalElement,
    TerminalKind, TerminalRule, action, action_assign, alternatives, assignment, call_with,
    char_range, cross_ref, cross_ref_via, group, keyword, literal, negated, param, regex,
    terminal_alternatives, terminal_call, terminal_group, unordered, until, wildcard,
};

impl Grammar {
    /// Parses grammar-language text and compiles it.
    ///
    /// Syntax errors are reported as [`GrammarError::Syntax`] with one
    /// message per error, prefixed by its 1-based line and column.
    pub fn parse(text: &str) -> Result<Grammar, GrammarError> {
        let language = grammar_language()?;
        let result = parse(language, text);
        if result.has_errors() {
            let lines = LineIndex::new(text);
            let messages = result
                .errors()
                .map(|error| format!("{}: {}", lines.position(error.range.start()), error.message))
                .collect();
            return Err(GrammarError::Syntax { messages });
        }
        tracing::debug!(rules = result.ast.len(), "converting parsed grammar");
        Converter { ast: &result.ast }.grammar()?.compile()
    }
}

struct Converter<'a> {
    ast: &'a Ast,
}

impl Converter<'_> {
    fn grammar(&self) -> Result<GrammarBuilder, GrammarError> {
        let root = self.ast.node(self.ast.root());
        let mut builder = GrammarBuilder::new(self.required(root, "name")?);
        for rule in self.nodes(root, "rules") {
            let node = self.ast.node(rule);
            match node.node_type.as_str() {
                "ParserRule" => builder.push(self.parser_rule(node)?),
                "TerminalRule" => builder.push(self.terminal_rule(node)?),
                other => return Err(malformed(format!("unexpected rule node `{other}`"))),
            }
        }
        Ok(builder)
    }

    fn parser_rule(&self, node: &AstNode) -> Result<ParserRule, GrammarError> {
        let definition = self.child(node, "definition")?;
        Ok(ParserRule {
            name: self.required(node, "name")?,
            parameters: node
                .get("parameters")
                .and_then(Value::as_list)
                .unwrap_or_default()
                .iter()
                .filter_map(Value::as_str)
                .map(SmolStr::new)
                .collect(),
            entry: flag(node, "isEntry"),
            fragment: flag(node, "isFragment"),
            return_type: node.get_str("returnType").map(SmolStr::new),
            definition: self.alternatives(definition)?,
        })
    }

    fn terminal_rule(&self, node: &AstNode) -> Result<TerminalRule, GrammarError> {
        let definition = self.child(node, "definition")?;
        let name = self.required(node, "name")?;
        Ok(TerminalRule {
            definition: self.terminal_alternatives(&name, definition)?,
            name,
            hidden: flag(node, "isHidden"),
            fragment: flag(node, "isFragment"),
            value_type: node.get_str("valueType").map(SmolStr::new),
        })
    }

    // -------------------------------------------------------------------------
    // Parser rule bodies
    // -------------------------------------------------------------------------

    fn alternatives(&self, id: AstId) -> Result<Element, GrammarError> {
        let node = self.ast.node(id);
        let groups = self
            .nodes(node, "elements")
            .map(|group| self.unordered_group(group))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(collapse(groups, alternatives))
    }

    fn unordered_group(&self, id: AstId) -> Result<Element, GrammarError> {
        let node = self.ast.node(id);
        let groups = self
            .nodes(node, "elements")
            .map(|group| self.group(group))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(collapse(groups, unordered))
    }

    fn group(&self, id: AstId) -> Result<Element, GrammarError> {
        let node = self.ast.node(id);
        let items = self
            .nodes(node, "elements")
            .map(|item| self.element(item))
            .collect::<Result<Vec<_>, _>>()?;
        let element = collapse(items, group);
        let Some(guard) = node.get("guard").and_then(Value::as_node) else {
            return Ok(element);
        };
        let guard = self.condition(guard)?;
        Ok(match element.guard {
            Some(_) => group([element]).when(guard),
            None => element.when(guard),
        })
    }

    fn element(&self, id: AstId) -> Result<Element, GrammarError> {
        let node = self.ast.node(id);
        let cardinality = cardinality(node);
        let element = match node.node_type.as_str() {
            "Keyword" => keyword(self.required(node, "value")?),
            "NamedElement" => {
                let name = self.required(node, "name")?;
                match node.get_str("operator") {
                    Some(operator) => {
                        let op = match operator {
                            "+=" => AssignOp::Append,
                            "?=" => AssignOp::Flag,
                            _ => AssignOp::Assign,
                        };
                        let value = self.assignable(self.child(node, "value")?)?;
                        assignment(name, op, value)
                    }
                    None => call_with(name, self.arguments(node)?),
                }
            }
            "ParenthesizedElement" => {
                let inner = self.alternatives(self.child(node, "alternatives")?)?;
                return Ok(wrap(inner, cardinality));
            }
            "Action" => {
                let node_type = self.required(node, "type")?;
                match node.get_str("feature") {
                    Some(feature) => {
                        let op = match node.get_str("operator") {
                            Some("+=") => AssignOp::Append,
                            _ => AssignOp::Assign,
                        };
                        action_assign(node_type, feature, op)
                    }
                    None => action(node_type),
                }
            }
            other => return Err(malformed(format!("unexpected element node `{other}`"))),
        };
        Ok(element.with_cardinality(cardinality))
    }

    fn assignable(&self, id: AstId) -> Result<Element, GrammarError> {
        let node = self.ast.node(id);
        match node.node_type.as_str() {
            "KeywordValue" => Ok(keyword(self.required(node, "value")?)),
            "RuleValue" => Ok(call_with(self.required(node, "rule")?, self.arguments(node)?)),
            "CrossReference" => {
                let target = self.required(node, "type")?;
                Ok(match node.get_str("terminal") {
                    Some(token) => cross_ref_via(target, token),
                    None => cross_ref(target),
                })
            }
            "AssignableAlternatives" => {
                let items = self
                    .nodes(node, "elements")
                    .map(|item| self.assignable(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(collapse(items, alternatives))
            }
            other => Err(malformed(format!("unexpected assignable node `{other}`"))),
        }
    }

    fn arguments(&self, node: &AstNode) -> Result<Vec<RuleArgument>, GrammarError> {
        self.nodes(node, "arguments")
            .map(|id| {
                let argument = self.ast.node(id);
                let condition = self.child(argument, "condition")?;
                let Some(value) = argument.get("value").and_then(Value::as_node) else {
                    return Ok(RuleArgument::positional(self.condition(condition)?));
                };
                let parameter = self.ast.node(condition);
                if parameter.node_type != "ParameterReference" {
                    return Err(malformed("named argument must start with a parameter name".into()));
                }
                Ok(RuleArgument::named(
                    self.required(parameter, "parameter")?,
                    self.condition(value)?,
                ))
            })
            .collect()
    }

    fn condition(&self, id: AstId) -> Result<Condition, GrammarError> {
        let node = self.ast.node(id);
        match node.node_type.as_str() {
            "Disjunction" => Ok(self
                .condition(self.child(node, "left")?)?
                .or(self.condition(self.child(node, "right")?)?)),
            "Conjunction" => Ok(self
                .condition(self.child(node, "left")?)?
                .and(self.condition(self.child(node, "right")?)?)),
            "Negation" => Ok(self.condition(self.child(node, "value")?)?.not()),
            "ParameterReference" => Ok(param(self.required(node, "parameter")?)),
            "LiteralCondition" => Ok(Condition::Literal(flag(node, "isTrue"))),
            other => Err(malformed(format!("unexpected condition node `{other}`"))),
        }
    }

    // -------------------------------------------------------------------------
    // Terminal rule bodies
    // -------------------------------------------------------------------------

    fn terminal_alternatives(&self, rule: &str, id: AstId) -> Result<TerminalElement, GrammarError> {
        let node = self.ast.node(id);
        let groups = self
            .nodes(node, "elements")
            .map(|group| self.terminal_group(rule, group))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(collapse(groups, terminal_alternatives))
    }

    fn terminal_group(&self, rule: &str, id: AstId) -> Result<TerminalElement, GrammarError> {
        let node = self.ast.node(id);
        let items = self
            .nodes(node, "elements")
            .map(|item| self.terminal_token(rule, item))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(collapse(items, terminal_group))
    }

    fn terminal_token(&self, rule: &str, id: AstId) -> Result<TerminalElement, GrammarError> {
        let node = self.ast.node(id);
        let cardinality = cardinality(node);
        let token = match node.node_type.as_str() {
            "RegexToken" => regex(self.required(node, "regex")?),
            "CharacterRange" => {
                let left = self.required(node, "left")?;
                match node.get_str("right") {
                    None => literal(left),
                    Some(right) => match (single_char(&left), single_char(right)) {
                        (Some(from), Some(to)) => char_range(from, to),
                        _ => {
                            return Err(GrammarError::InvalidCharRange {
                                rule: SmolStr::new(rule),
                                from: left.clone(),
                                to: SmolStr::new(right),
                            });
                        }
                    },
                }
            }
            "TerminalRuleCall" => terminal_call(self.required(node, "rule")?),
            "TerminalParenthesized" => {
                let inner = self.terminal_alternatives(rule, self.child(node, "alternatives")?)?;
                return Ok(wrap_terminal(inner, cardinality));
            }
            "Wildcard" => wildcard(),
            // `!'a'*` repeats the negation, so the operand's cardinality moves outward.
            "NegatedToken" | "UntilToken" => {
                let inner = self.terminal_token(rule, self.child(node, "terminal")?)?;
                let repeat = inner.cardinality;
                let inner = inner.with_cardinality(Cardinality::One);
                let token = if node.node_type == "NegatedToken" {
                    negated(inner)
                } else {
                    until(inner)
                };
                return Ok(token.with_cardinality(repeat));
            }
            other => return Err(malformed(format!("unexpected terminal node `{other}`"))),
        };
        Ok(token.with_cardinality(cardinality))
    }

    // -------------------------------------------------------------------------
    // Property access
    // -------------------------------------------------------------------------

    fn required(&self, node: &AstNode, property: &str) -> Result<SmolStr, GrammarError> {
        node.get_str(property)
            .map(SmolStr::new)
            .ok_or_else(|| malformed(format!("`{}` without `{property}`", node.node_type)))
    }

    fn child(&self, node: &AstNode, property: &str) -> Result<AstId, GrammarError> {
        node.get(property)
            .and_then(Value::as_node)
            .ok_or_else(|| malformed(format!("`{}` without `{property}`", node.node_type)))
    }

    fn nodes<'n>(&self, node: &'n AstNode, property: &str) -> impl Iterator<Item = AstId> + 'n {
        node.get(property)
            .and_then(Value::as_list)
            .unwrap_or_default()
            .iter()
            .filter_map(Value::as_node)
    }
}

fn flag(node: &AstNode, property: &str) -> bool {
    node.get(property).and_then(Value::as_bool).unwrap_or(false)
}

fn cardinality(node: &AstNode) -> Cardinality {
    node.get_str("cardinality")
        .and_then(Cardinality::from_suffix)
        .unwrap_or(Cardinality::One)
}

fn single_char(text: &str) -> Option<char> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

/// A one-item list stands for its item.
fn collapse<T>(mut items: Vec<T>, combine: impl FnOnce(Vec<T>) -> T) -> T {
    if items.len() == 1 {
        items.remove(0)
    } else {
        combine(items)
    }
}

fn wrap(inner: Element, cardinality: Cardinality) -> Element {
    match (cardinality, inner.cardinality) {
        (Cardinality::One, _) => inner,
        (_, Cardinality::One) => inner.with_cardinality(cardinality),
        _ => group([inner]).with_cardinality(cardinality),
    }
}

fn wrap_terminal(inner: TerminalElement, cardinality: Cardinality) -> TerminalElement {
    match (cardinality, inner.cardinality) {
        (Cardinality::One, _) => inner,
        (_, Cardinality::One) => inner.with_cardinality(cardinality),
        _ => TerminalElement::new(TerminalKind::Group(vec![inner])).with_cardinality(cardinality),
    }
}

fn malformed(message: String) -> GrammarError {
    GrammarError::Syntax {
        messages: vec![message],
    }
}
