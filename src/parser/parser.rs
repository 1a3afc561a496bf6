//! Rule-driven recursive descent parser
//!
//! The parser interprets the compiled grammar directly. It walks a rule's
//! element tree against the visible token stream, predicting alternatives
//! and loop continuations with one token of lookahead against the FIRST
//! sets computed at compilation.
//!
//! Two trees are built at once:
//! - the CST, as a rowan green tree with one node per rule invocation and
//!   every token (hidden ones included) as a leaf
//! - the AST, in an index arena, with one node per invocation of a rule
//!   that declares a node type
//!
//! ## Error recovery
//!
//! On an unexpected token the parser records a diagnostic, then either
//! treats the expected token as missing (when the current token can follow)
//! or skips tokens into an ERROR node until it reaches the expected token or
//! something the enclosing rules can continue with. Every skip consumes at
//! least one token, so parsing always terminates.
//!
//! ## Stack
//!
//! Rule nesting maps onto native recursion. [`parse_with`] runs the parser
//! on a scoped thread whose stack is sized from
//! [`ParseOptions::stack_size`], so the depth limit is reached before the
//! stack runs out regardless of the caller's own stack.

use std::thread;

use rowan::{Checkpoint, GreenNodeBuilder};
use smol_str::SmolStr;
use text_size::{TextRange, TextSize};

use crate::grammar::{
    AssignOp, Cardinality, Condition, Element, ElementKind, FeatureDefault, Grammar, Rule, RuleId,
    RuleArgument, RuleKind, RuleRef, TokenKey, TokenSet,
};
use crate::syntax::{Ast, AstId, AstNode, Containment, CrossRef, CstPtr, ParseResult, Resolution, Value};

use super::errors::{ErrorCode, SyntaxError};
use super::lexer::{Lexer, Token, TokenKind};
use super::syntax_kind::SyntaxKind;
use super::value::convert_value;

/// Options for one parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Match keywords ignoring ASCII case.
    pub case_insensitive: bool,
    /// Maximum rule nesting before the parser gives up on a branch.
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            case_insensitive: false,
            max_depth: 512,
        }
    }
}

/// Stack reserved for everything but rule recursion.
const STACK_BASE: usize = 1 << 20;
/// Stack reserved per level of rule nesting.
const STACK_PER_LEVEL: usize = 64 << 10;
const MAX_STACK: usize = 256 << 20;
/// Depth limit used when no parser thread can be started.
const FALLBACK_DEPTH: usize = 64;

impl ParseOptions {
    /// The depth limit actually enforced: `max_depth`, capped so that its
    /// stack fits in the largest stack the parser will request.
    pub fn depth_limit(&self) -> usize {
        self.max_depth.min((MAX_STACK - STACK_BASE) / STACK_PER_LEVEL)
    }

    /// Stack needed to reach [`ParseOptions::depth_limit`].
    pub fn stack_size(&self) -> usize {
        STACK_BASE + self.depth_limit() * STACK_PER_LEVEL
    }
}

/// Parse `text` with the grammar's entry rule.
pub fn parse(grammar: &Grammar, text: &str) -> ParseResult {
    parse_with(grammar, text, &ParseOptions::default())
}

/// Parses on a thread with a stack of [`ParseOptions::stack_size`].
///
/// A panic in the parser is resumed on the calling thread.
pub fn parse_with(grammar: &Grammar, text: &str, options: &ParseOptions) -> ParseResult {
    let joined = thread::scope(|scope| {
        thread::Builder::new()
            .name("strand-parse".to_string())
            .stack_size(options.stack_size())
            .spawn_scoped(scope, || parse_on_current_stack(grammar, text, options))
            .map(|handle| handle.join())
    });
    match joined {
        Ok(Ok(result)) => result,
        Ok(Err(payload)) => std::panic::resume_unwind(payload),
        Err(err) => {
            tracing::warn!(%err, depth = FALLBACK_DEPTH, "no parser thread, parsing inline");
            let fallback = ParseOptions {
                max_depth: options.max_depth.min(FALLBACK_DEPTH),
                ..options.clone()
            };
            parse_on_current_stack(grammar, text, &fallback)
        }
    }
}

/// Parses on the calling thread, which must have at least
/// [`ParseOptions::stack_size`] bytes of stack left.
pub fn parse_on_current_stack(grammar: &Grammar, text: &str, options: &ParseOptions) -> ParseResult {
    let lexed = Lexer::new(grammar)
        .case_insensitive(options.case_insensitive)
        .tokenize(text);
    let parser = TreeParser::new(grammar, text, &lexed.tokens, options.depth_limit());
    let (green, ast, parse_errors) = parser.parse_document();
    tracing::trace!(
        grammar = %grammar.name(),
        nodes = ast.len(),
        references = ast.reference_count(),
        errors = lexed.errors.len() + parse_errors.len(),
        "parsed document"
    );
    ParseResult::new(green, ast, lexed.errors, parse_errors)
}

/// Result of one rule invocation.
enum Outcome {
    Node(AstId),
    Data { text: String, value: Value },
    Nothing,
}

/// AST state of the rule invocation currently being parsed.
struct Frame {
    node_type: Option<SmolStr>,
    properties: indexmap::IndexMap<SmolStr, Value>,
    feature_ranges: Vec<(SmolStr, TextRange)>,
    /// Node produced by an unassigned rule call; this frame merges into it.
    delegate: Option<AstId>,
    /// Visible token text, for data type rules.
    text: Option<String>,
}

impl Frame {
    fn node(node_type: SmolStr, defaults: &[(SmolStr, FeatureDefault)]) -> Self {
        let properties = defaults
            .iter()
            .map(|(feature, default)| {
                let value = match default {
                    FeatureDefault::EmptyList => Value::List(Vec::new()),
                    FeatureDefault::False => Value::Bool(false),
                };
                (feature.clone(), value)
            })
            .collect();
        Self {
            node_type: Some(node_type),
            properties,
            feature_ranges: Vec::new(),
            delegate: None,
            text: None,
        }
    }

    fn data_type() -> Self {
        Self {
            node_type: None,
            properties: indexmap::IndexMap::new(),
            feature_ranges: Vec::new(),
            delegate: None,
            text: Some(String::new()),
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(buffer) = &mut self.text {
            buffer.push_str(text);
        }
    }

    fn assign(&mut self, feature: &SmolStr, op: AssignOp, value: Value, range: Option<TextRange>) {
        match op {
            AssignOp::Assign => {
                self.properties.insert(feature.clone(), value);
            }
            AssignOp::Append => match self.properties.get_mut(feature) {
                Some(Value::List(items)) => items.push(value),
                _ => {
                    self.properties.insert(feature.clone(), Value::List(vec![value]));
                }
            },
            AssignOp::Flag => {
                self.properties.insert(feature.clone(), Value::Bool(true));
            }
        }
        if let Some(range) = range {
            if !self.feature_ranges.iter().any(|(name, _)| name == feature) {
                self.feature_ranges.push((feature.clone(), range));
            }
        }
    }
}

/// Invocation of the parser rule whose elements are being parsed.
struct RuleContext {
    /// Rule whose parameters the arguments bind; a fragment inside a call.
    rule: RuleId,
    /// Rule owning the CST node and the AST frame.
    node_rule: RuleId,
    arguments: Vec<bool>,
    /// Visible position where the node rule started.
    start: usize,
    checkpoint: Checkpoint,
}

struct TreeParser<'a> {
    grammar: &'a Grammar,
    text: &'a str,
    tokens: &'a [Token],
    /// Indexes into `tokens` of the tokens the parser sees.
    visible: Vec<usize>,
    /// Position in `visible`.
    pos: usize,
    /// Number of raw tokens already added to the green tree.
    emitted: usize,
    builder: GreenNodeBuilder<'static>,
    ast: Ast,
    errors: Vec<SyntaxError>,
    depth: usize,
    max_depth: usize,
    depth_reported: bool,
    contexts: Vec<RuleContext>,
}

impl<'a> TreeParser<'a> {
    fn new(grammar: &'a Grammar, text: &'a str, tokens: &'a [Token], max_depth: usize) -> Self {
        let visible = tokens
            .iter()
            .enumerate()
            .filter(|(_, token)| !token.is_trivia())
            .map(|(index, _)| index)
            .collect();
        Self {
            grammar,
            text,
            tokens,
            visible,
            pos: 0,
            emitted: 0,
            builder: GreenNodeBuilder::new(),
            ast: Ast::new(),
            errors: Vec::new(),
            depth: 0,
            max_depth,
            depth_reported: false,
            contexts: Vec::new(),
        }
    }

    fn parse_document(mut self) -> (rowan::GreenNode, Ast, Vec<SyntaxError>) {
        let grammar = self.grammar;
        let entry = grammar.entry_rule();
        let eof = TokenSet::single(grammar.eof_key());

        self.builder.start_node(SyntaxKind::Rule(entry).into());
        self.flush_trivia();
        let checkpoint = self.builder.checkpoint();
        let arguments = self.call_arguments(&[], entry);
        let root = match self.rule_body(entry, arguments, checkpoint, &eof) {
            Outcome::Node(id) => id,
            _ => {
                let node_type = grammar.node_type(entry).cloned().unwrap_or_default();
                self.ast.alloc_node(AstNode::new(node_type))
            }
        };

        if !self.at_eof() {
            let message = format!(
                "Expecting end of input but found '{}'.",
                self.current_text()
            );
            self.error(message, self.current_range(), ErrorCode::E0203);
            self.skip_until(|_| false);
        }
        self.flush_trivia_to(self.tokens.len());
        self.builder.finish_node();

        let whole = TextRange::up_to(TextSize::of(self.text));
        self.ast.node_mut(root).cst = Some(CstPtr::new(SyntaxKind::Rule(entry), whole));
        self.ast.set_root(root);
        (self.builder.finish(), self.ast, self.errors)
    }

    // -------------------------------------------------------------------------
    // Token stream
    // -------------------------------------------------------------------------

    fn at_eof(&self) -> bool {
        self.pos >= self.visible.len()
    }

    fn current_token(&self) -> Option<&Token> {
        self.visible.get(self.pos).map(|index| &self.tokens[*index])
    }

    fn current_key(&self) -> TokenKey {
        match self.current_token().map(|t| t.kind) {
            Some(TokenKind::Keyword(index)) => self.grammar.keyword_key(index),
            Some(TokenKind::Terminal(rule)) => self.grammar.terminal_key(rule),
            Some(TokenKind::Error) | None => self.grammar.eof_key(),
        }
    }

    fn current_text(&self) -> &'a str {
        let text = self.text;
        self.current_token().map_or("", |t| t.text(text))
    }

    fn current_range(&self) -> TextRange {
        match self.current_token() {
            Some(token) => token.range,
            None => TextRange::empty(TextSize::of(self.text)),
        }
    }

    fn at(&self, set: &TokenSet) -> bool {
        !self.at_eof() && set.contains(self.current_key())
    }

    fn flush_trivia_to(&mut self, end: usize) {
        while self.emitted < end {
            let token = self.tokens[self.emitted];
            self.builder
                .token(token.kind.syntax_kind().into(), token.text(self.text));
            self.emitted += 1;
        }
    }

    /// Emits trivia preceding the current visible token.
    fn flush_trivia(&mut self) {
        let end = self
            .visible
            .get(self.pos)
            .copied()
            .unwrap_or(self.tokens.len());
        self.flush_trivia_to(end);
    }

    /// Consumes the current visible token and returns it.
    fn bump(&mut self) -> Token {
        self.flush_trivia();
        let index = self.visible[self.pos];
        let token = self.tokens[index];
        self.builder
            .token(token.kind.syntax_kind().into(), token.text(self.text));
        self.emitted = index + 1;
        self.pos += 1;
        token
    }

    /// Range covered by the visible tokens consumed since `start`.
    fn range_since(&self, start: usize) -> Option<TextRange> {
        if self.pos <= start {
            return None;
        }
        let first = self.tokens[self.visible[start]].range;
        let last = self.tokens[self.visible[self.pos - 1]].range;
        Some(first.cover(last))
    }

    // -------------------------------------------------------------------------
    // Errors and recovery
    // -------------------------------------------------------------------------

    fn error(&mut self, message: String, range: TextRange, code: ErrorCode) {
        self.errors.push(SyntaxError::new(message, range, code));
    }

    fn found(&self) -> String {
        if self.at_eof() {
            "end of input".to_string()
        } else {
            format!("'{}'", self.current_text())
        }
    }

    /// Skips tokens into an ERROR node until `stop` holds or input ends.
    fn skip_until(&mut self, stop: impl Fn(TokenKey) -> bool) -> bool {
        if self.at_eof() || stop(self.current_key()) {
            return false;
        }
        self.flush_trivia();
        self.builder.start_node(SyntaxKind::ErrorNode.into());
        while !self.at_eof() && !stop(self.current_key()) {
            self.bump();
        }
        self.builder.finish_node();
        true
    }

    /// Consumes a token of kind `key`, recovering if it is not there.
    fn expect(&mut self, key: TokenKey, follow: &TokenSet) -> Option<Token> {
        if !self.at_eof() && self.current_key() == key {
            return Some(self.bump());
        }
        let insert = self.at_eof() || follow.contains(self.current_key());
        let message = format!(
            "Expecting {} but found {}.",
            self.grammar.describe_key(key),
            self.found()
        );
        let code = if insert { ErrorCode::E0202 } else { ErrorCode::E0201 };
        self.error(message, self.current_range(), code);
        if insert {
            return None;
        }
        self.skip_until(|current| current == key || follow.contains(current));
        if !self.at_eof() && self.current_key() == key {
            Some(self.bump())
        } else {
            None
        }
    }

    fn report_no_alternative(&mut self, expected: &TokenSet) {
        let mut names: Vec<String> = expected
            .iter()
            .map(|key| self.grammar.describe_key(key))
            .collect();
        names.sort();
        let message = format!(
            "Expecting one of [{}] but found {}.",
            names.join(", "),
            self.found()
        );
        self.error(message, self.current_range(), ErrorCode::E0201);
    }

    // -------------------------------------------------------------------------
    // Rules
    // -------------------------------------------------------------------------

    /// Parses a rule invocation wrapped in its own CST node.
    fn call_rule(&mut self, callee: &RuleRef, follow: &TokenSet) -> (Outcome, Option<TextRange>) {
        let rule = callee.id();
        if self.too_deep(rule) {
            return (Outcome::Nothing, None);
        }
        self.flush_trivia();
        let checkpoint = self.builder.checkpoint();
        let start = self.pos;

        let arguments = self.call_arguments(&callee.arguments, rule);
        let outcome = self.rule_body(rule, arguments, checkpoint, follow);

        let range = self.range_since(start);
        if let Some(range) = range {
            self.builder
                .start_node_at(checkpoint, SyntaxKind::Rule(rule).into());
            self.builder.finish_node();
            if let Outcome::Node(id) = outcome {
                self.ast.node_mut(id).cst = Some(CstPtr::new(SyntaxKind::Rule(rule), range));
            }
        }
        (outcome, range)
    }

    /// Whether entering `rule` would exceed the depth limit; reported once.
    fn too_deep(&mut self, rule: RuleId) -> bool {
        if self.depth < self.max_depth {
            return false;
        }
        if !self.depth_reported {
            self.depth_reported = true;
            let message = format!(
                "Rule nesting deeper than {} levels at '{}'.",
                self.max_depth,
                self.grammar.rule_name(rule)
            );
            self.error(message, self.current_range(), ErrorCode::E0901);
        }
        true
    }

    /// Parses a rule's definition without opening a CST node.
    fn rule_body(
        &mut self,
        rule: RuleId,
        arguments: Vec<bool>,
        checkpoint: Checkpoint,
        follow: &TokenSet,
    ) -> Outcome {
        let grammar = self.grammar;
        let Rule::Parser(definition) = grammar.rule(rule) else {
            return Outcome::Nothing;
        };
        self.depth += 1;
        self.contexts.push(RuleContext {
            rule,
            node_rule: rule,
            arguments,
            start: self.pos,
            checkpoint,
        });
        let outcome = match grammar.rule_kind(rule) {
            RuleKind::DataType => {
                let mut frame = Frame::data_type();
                self.parse_element(&definition.definition, &mut frame, follow);
                let text = frame.text.unwrap_or_default();
                let value = convert_value(grammar, rule, &text);
                Outcome::Data { text, value }
            }
            RuleKind::Parser => {
                let node_type = grammar.node_type(rule).cloned().unwrap_or_default();
                let mut frame = Frame::node(node_type, grammar.feature_defaults(rule));
                self.parse_element(&definition.definition, &mut frame, follow);
                Outcome::Node(self.finish_frame(frame))
            }
            RuleKind::Terminal => Outcome::Nothing,
        };
        self.contexts.pop();
        self.depth -= 1;
        outcome
    }

    /// Argument values for a call of `rule`, one per declared parameter.
    /// Parameters without an argument are false.
    fn call_arguments(&self, arguments: &[RuleArgument], rule: RuleId) -> Vec<bool> {
        let parameters = self
            .grammar
            .rule(rule)
            .as_parser()
            .map_or(&[][..], |rule| rule.parameters.as_slice());
        let mut values = vec![false; parameters.len()];
        for (index, argument) in arguments.iter().enumerate() {
            let slot = match &argument.parameter {
                Some(name) => parameters.iter().position(|parameter| parameter == name),
                None => Some(index),
            };
            if let Some(value) = slot.and_then(|slot| values.get_mut(slot)) {
                *value = self.holds(&argument.value);
            }
        }
        values
    }

    /// Evaluates `condition` against the arguments of the current rule.
    fn holds(&self, condition: &Condition) -> bool {
        let Some(context) = self.contexts.last() else {
            return false;
        };
        let parameters = self
            .grammar
            .rule(context.rule)
            .as_parser()
            .map_or(&[][..], |rule| rule.parameters.as_slice());
        condition.eval(parameters, &context.arguments)
    }

    fn guard_holds(&self, element: &Element) -> bool {
        element.guard.as_ref().is_none_or(|guard| self.holds(guard))
    }

    /// Continues the current rule with a fresh `node_type` frame. With a
    /// feature, the node built so far becomes that feature's value and its
    /// CST prefix is wrapped in a node of its own.
    fn run_action(&mut self, node_type: &SmolStr, feature: Option<&(SmolStr, AssignOp)>, frame: &mut Frame) {
        let Some(context) = self.contexts.last() else {
            return;
        };
        let (node_rule, start, checkpoint) = (context.node_rule, context.start, context.checkpoint);
        let fresh = Frame::node(node_type.clone(), self.grammar.feature_defaults(node_rule));
        let previous = std::mem::replace(frame, fresh);
        let Some((feature, op)) = feature else {
            return;
        };
        let range = self.range_since(start);
        let id = self.finish_frame(previous);
        if let Some(range) = range {
            self.builder
                .start_node_at(checkpoint, SyntaxKind::Rule(node_rule).into());
            self.builder.finish_node();
            self.ast.node_mut(id).cst = Some(CstPtr::new(SyntaxKind::Rule(node_rule), range));
        }
        frame.assign(feature, *op, Value::Node(id), range);
    }

    fn finish_frame(&mut self, frame: Frame) -> AstId {
        if let Some(delegate) = frame.delegate {
            for (feature, value) in frame.properties {
                let replace = match self.ast.node(delegate).properties.get(&feature) {
                    None => true,
                    Some(existing) => existing.is_default() && !value.is_default(),
                };
                if replace {
                    self.attach(delegate, &feature, &value);
                    self.ast.node_mut(delegate).properties.insert(feature, value);
                }
            }
            let node = self.ast.node_mut(delegate);
            for (feature, range) in frame.feature_ranges {
                if node.feature_range(&feature).is_none() {
                    node.feature_ranges.push((feature, range));
                }
            }
            return delegate;
        }

        let mut node = AstNode::new(frame.node_type.unwrap_or_default());
        node.feature_ranges = frame.feature_ranges;
        let properties = frame.properties;
        let id = self.ast.alloc_node(node);
        for (feature, value) in &properties {
            self.attach(id, feature, value);
        }
        self.ast.node_mut(id).properties = properties;
        id
    }

    /// Points nested nodes and reference slots in `value` at their container.
    fn attach(&mut self, container: AstId, feature: &SmolStr, value: &Value) {
        let mut stack: Vec<(&Value, Option<usize>)> = vec![(value, None)];
        while let Some((value, index)) = stack.pop() {
            match value {
                Value::Node(child) => {
                    self.ast.node_mut(*child).container = Some(Containment {
                        node: container,
                        property: feature.clone(),
                        index,
                    });
                }
                Value::Reference(slot) => {
                    let reference = self.ast.reference_mut(*slot);
                    reference.container = container;
                    reference.property = feature.clone();
                }
                Value::List(items) => {
                    stack.extend(items.iter().enumerate().map(|(i, item)| (item, Some(i))));
                }
                Value::String(_) | Value::Number(_) | Value::Bool(_) => {}
            }
        }
    }

    // -------------------------------------------------------------------------
    // Elements
    // -------------------------------------------------------------------------

    fn predicts(&self, element: &Element) -> bool {
        self.guard_holds(element) && self.at(self.grammar.first(element))
    }

    /// What may follow `items[from..]` inside a group whose own follow is `outer`.
    fn follow_in_group(&self, items: &[Element], from: usize, outer: &TokenSet) -> TokenSet {
        let mut set = TokenSet::new();
        for item in &items[from..] {
            set.union_with(self.grammar.first(item));
            if !self.grammar.nullable(item) {
                return set;
            }
        }
        set.union_with(outer);
        set
    }

    fn parse_element(&mut self, element: &Element, frame: &mut Frame, follow: &TokenSet) {
        if !self.guard_holds(element) {
            return;
        }
        match element.cardinality {
            Cardinality::One => self.parse_once(element, frame, follow),
            Cardinality::Optional => {
                if self.predicts(element) {
                    self.parse_once(element, frame, follow);
                }
            }
            Cardinality::Many | Cardinality::AtLeastOne => {
                let grammar = self.grammar;
                let loop_follow = follow.union(grammar.first(element));
                if element.cardinality == Cardinality::AtLeastOne {
                    self.parse_once(element, frame, &loop_follow);
                }
                while !self.at_eof() {
                    if self.predicts(element) {
                        let before = self.pos;
                        self.parse_once(element, frame, &loop_follow);
                        if self.pos == before {
                            break;
                        }
                    } else if follow.contains(self.current_key()) {
                        break;
                    } else {
                        self.report_no_alternative(&loop_follow);
                        if !self.skip_until(|key| loop_follow.contains(key)) {
                            break;
                        }
                    }
                }
            }
        }
    }

    fn parse_once(&mut self, element: &Element, frame: &mut Frame, follow: &TokenSet) {
        let grammar = self.grammar;
        match &element.kind {
            ElementKind::Keyword(keyword) => {
                let key = match grammar.keyword_index(keyword) {
                    Some(index) => grammar.keyword_key(index),
                    None => return,
                };
                if let Some(token) = self.expect(key, follow) {
                    frame.push_text(token.text(self.text));
                }
            }
            ElementKind::RuleCall(callee) => match grammar.rule_kind(callee.id()) {
                RuleKind::Terminal => {
                    if let Some(token) = self.expect(grammar.terminal_key(callee.id()), follow) {
                        frame.push_text(token.text(self.text));
                    }
                }
                RuleKind::DataType => {
                    if let (Outcome::Data { text, .. }, _) = self.call_rule(callee, follow) {
                        frame.push_text(&text);
                    }
                }
                RuleKind::Parser if grammar.rule(callee.id()).is_fragment() => {
                    self.parse_fragment(callee, frame, follow);
                }
                RuleKind::Parser => {
                    if let (Outcome::Node(id), _) = self.call_rule(callee, follow) {
                        frame.delegate = Some(id);
                    }
                }
            },
            ElementKind::Action { node_type, feature } => {
                self.run_action(node_type, feature.as_ref(), frame);
            }
            ElementKind::Assignment { feature, op, value } => {
                let start = self.pos;
                if let Some(parsed) = self.parse_value(value, follow) {
                    let range = self.range_since(start);
                    frame.assign(feature, *op, parsed, range);
                }
            }
            ElementKind::CrossReference { .. } => {
                self.parse_value(element, follow);
            }
            ElementKind::Group(items) => {
                for (index, item) in items.iter().enumerate() {
                    let item_follow = self.follow_in_group(items, index + 1, follow);
                    self.parse_element(item, frame, &item_follow);
                }
            }
            ElementKind::Alternatives(items) => {
                if let Some(chosen) = self.choose(items, element, follow) {
                    self.parse_element(chosen, frame, follow);
                }
            }
            ElementKind::UnorderedGroup(items) => self.parse_unordered(items, element, frame, follow),
        }
    }

    /// Inlines a fragment's elements into the caller's frame.
    fn parse_fragment(&mut self, callee: &RuleRef, frame: &mut Frame, follow: &TokenSet) {
        let Rule::Parser(fragment) = self.grammar.rule(callee.id()) else {
            return;
        };
        if self.too_deep(callee.id()) {
            return;
        }
        let Some(context) = self.contexts.last() else {
            return;
        };
        let context = RuleContext {
            rule: callee.id(),
            node_rule: context.node_rule,
            arguments: self.call_arguments(&callee.arguments, callee.id()),
            start: context.start,
            checkpoint: context.checkpoint,
        };
        self.depth += 1;
        self.contexts.push(context);
        self.parse_element(&fragment.definition, frame, follow);
        self.contexts.pop();
        self.depth -= 1;
    }

    /// Parses members in whatever order they appear, each at most once, then
    /// reports the required members that never did.
    fn parse_unordered(&mut self, items: &[Element], element: &Element, frame: &mut Frame, follow: &TokenSet) {
        let grammar = self.grammar;
        let member_follow = follow.union(grammar.first(element));
        let mut seen = vec![false; items.len()];
        while let Some(index) = (0..items.len()).find(|&index| !seen[index] && self.predicts(&items[index])) {
            seen[index] = true;
            self.parse_element(&items[index], frame, &member_follow);
        }
        for (item, _) in items.iter().zip(&seen).filter(|(_, seen)| !**seen) {
            if !self.guard_holds(item) || grammar.nullable(item) {
                continue;
            }
            let expected = self.describe_set(grammar.first(item));
            let message = format!("Expecting {expected} but found {}.", self.found());
            self.error(message, self.current_range(), ErrorCode::E0202);
        }
    }

    fn describe_set(&self, set: &TokenSet) -> String {
        let mut names: Vec<String> = set.iter().map(|key| self.grammar.describe_key(key)).collect();
        names.sort();
        match names.as_slice() {
            [single] => single.clone(),
            _ => format!("one of [{}]", names.join(", ")),
        }
    }

    /// Picks the first alternative predicting the current token, recovering
    /// once if none does.
    fn choose<'e>(
        &mut self,
        items: &'e [Element],
        element: &Element,
        follow: &TokenSet,
    ) -> Option<&'e Element> {
        if let Some(item) = items.iter().find(|item| self.predicts(item)) {
            return Some(item);
        }
        if let Some(item) = items
            .iter()
            .find(|item| self.guard_holds(item) && self.grammar.nullable(item))
        {
            return Some(item);
        }
        let grammar = self.grammar;
        let first = grammar.first(element);
        self.report_no_alternative(first);
        self.skip_until(|key| first.contains(key) || follow.contains(key));
        items.iter().find(|item| self.predicts(item))
    }

    /// Parses the value side of an assignment.
    fn parse_value(&mut self, element: &Element, follow: &TokenSet) -> Option<Value> {
        let grammar = self.grammar;
        match &element.kind {
            ElementKind::Keyword(keyword) => {
                let key = grammar.keyword_key(grammar.keyword_index(keyword)?);
                self.expect(key, follow)
                    .map(|_| Value::String(keyword.clone()))
            }
            ElementKind::RuleCall(callee) => match grammar.rule_kind(callee.id()) {
                RuleKind::Terminal => {
                    let token = self.expect(grammar.terminal_key(callee.id()), follow)?;
                    Some(convert_value(grammar, callee.id(), token.text(self.text)))
                }
                RuleKind::DataType | RuleKind::Parser => match self.call_rule(callee, follow) {
                    (Outcome::Node(id), _) => Some(Value::Node(id)),
                    (Outcome::Data { value, .. }, _) => Some(value),
                    (Outcome::Nothing, _) => None,
                },
            },
            ElementKind::CrossReference { target_type, token } => {
                let callee = token.as_ref()?;
                let token = callee.id();
                let (text, range) = match grammar.rule_kind(token) {
                    RuleKind::Terminal => {
                        let lexed = self.expect(grammar.terminal_key(token), follow)?;
                        let value = convert_value(grammar, token, lexed.text(self.text));
                        (value_text(value, lexed.text(self.text)), lexed.range)
                    }
                    _ => match self.call_rule(callee, follow) {
                        (Outcome::Data { text, value }, Some(range)) => (value_text(value, &text), range),
                        _ => return None,
                    },
                };
                let slot = self.ast.alloc_reference(CrossRef {
                    text,
                    container: AstId::DETACHED,
                    property: SmolStr::default(),
                    target_type: target_type.clone(),
                    range,
                    resolution: Resolution::Unresolved,
                });
                Some(Value::Reference(slot))
            }
            ElementKind::Alternatives(items) => {
                let chosen = self.choose(items, element, follow)?;
                self.parse_value(chosen, follow)
            }
            ElementKind::Assignment { .. }
            | ElementKind::Action { .. }
            | ElementKind::Group(_)
            | ElementKind::UnorderedGroup(_) => None,
        }
    }
}

fn value_text(value: Value, raw: &str) -> SmolStr {
    match value {
        Value::String(text) => text,
        _ => SmolStr::new(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{
        GrammarBuilder, assign, assign_add, call, cross_ref, group, keyword, parser_rule, regex,
        terminal_rule,
    };

    fn people() -> Grammar {
        GrammarBuilder::new("People")
            .rule(parser_rule("Model", assign_add("persons", call("Person")).many()).entry())
            .rule(parser_rule(
                "Person",
                group([keyword("Person"), assign("name", call("ID"))]),
            ))
            .rule(terminal_rule("WS", regex(r"\s+")).hidden())
            .rule(terminal_rule("ID", regex("[_a-zA-Z][_a-zA-Z0-9]*")))
            .compile()
            .expect("grammar compiles")
    }

    fn names(result: &ParseResult) -> Vec<String> {
        let ast = &result.ast;
        let root = ast.node(ast.root());
        root.get("persons")
            .and_then(Value::as_list)
            .unwrap_or_default()
            .iter()
            .filter_map(Value::as_node)
            .map(|id| ast.node(id).get_str("name").unwrap_or("<none>").to_string())
            .collect()
    }

    #[test]
    fn parses_people() {
        let result = parse(&people(), "Person Alice Person Bob");
        assert!(!result.has_errors(), "{:?}", result.parse_errors);
        assert_eq!(names(&result), vec!["Alice", "Bob"]);
    }

    #[test]
    fn empty_input_yields_root_with_empty_list() {
        let result = parse(&people(), "");
        assert!(!result.has_errors());
        let root = result.ast.node(result.ast.root());
        assert_eq!(root.node_type, "Model");
        assert_eq!(root.get("persons"), Some(&Value::List(vec![])));
    }

    #[test]
    fn missing_name_is_reported_and_parsing_continues() {
        let result = parse(&people(), "Person Person Bob");
        assert_eq!(result.parse_errors.len(), 1);
        assert_eq!(result.parse_errors[0].code, ErrorCode::E0202);
        assert_eq!(names(&result), vec!["<none>", "Bob"]);
    }

    #[test]
    fn garbage_between_items_is_skipped() {
        let result = parse(&people(), "Person Alice junk more Person Bob");
        assert_eq!(names(&result), vec!["Alice", "Bob"]);
        assert_eq!(result.parse_errors.len(), 1);
        let errors = result
            .syntax()
            .descendants()
            .filter(|n| n.kind() == SyntaxKind::ErrorNode)
            .count();
        assert_eq!(errors, 1);
    }

    #[test]
    fn rule_nodes_exclude_surrounding_trivia() {
        let grammar = people();
        let result = parse(&grammar, "  Person Alice  ");
        let ast = &result.ast;
        let persons = ast.node(ast.root()).get("persons").and_then(Value::as_list).unwrap();
        let person = ast.node(persons[0].as_node().unwrap());
        let ptr = person.cst.unwrap();
        assert_eq!(ptr.range(), TextRange::new(TextSize::new(2), TextSize::new(14)));
        let node = ptr.to_node(&result.syntax()).expect("pointer resolves");
        assert_eq!(node.text().to_string(), "Person Alice");
        assert_eq!(
            person.feature_range("name"),
            Some(TextRange::new(TextSize::new(9), TextSize::new(14)))
        );
    }

    #[test]
    fn cross_reference_creates_unresolved_slot() {
        let grammar = GrammarBuilder::new("Refs")
            .rule(
                parser_rule("Model", group([assign_add("items", call("Item")).many()])).entry(),
            )
            .rule(parser_rule(
                "Item",
                group([
                    keyword("item"),
                    assign("name", call("ID")),
                    group([keyword("->"), assign("target", cross_ref("Item"))]).opt(),
                ]),
            ))
            .rule(terminal_rule("WS", regex(r"\s+")).hidden())
            .rule(terminal_rule("ID", regex("[a-z]+")))
            .compile()
            .expect("grammar compiles");
        let result = parse(&grammar, "item a -> b item b");
        assert!(!result.has_errors());
        let refs: Vec<_> = result.ast.references().collect();
        assert_eq!(refs.len(), 1);
        let (_, reference) = refs[0];
        assert_eq!(reference.text, "b");
        assert_eq!(reference.property, "target");
        assert_eq!(reference.resolution, Resolution::Unresolved);
        assert_eq!(result.ast.node(reference.container).get_str("name"), Some("a"));
    }
}
