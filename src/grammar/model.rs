//! Rule model of a grammar.
//!
//! A grammar is a list of [`Rule`]s. Parser rules describe a sequence of
//! [`Element`]s; terminal rules describe a regular pattern built from
//! [`TerminalElement`]s. Rule calls are stored by name in a [`RuleRef`] and
//! bound to a [`RuleId`] when the grammar is compiled.
//!
//! The free functions at the bottom of this module are the builder
//! vocabulary used by the bootstrap grammar and by tests:
//!
//! ```text
//! parser_rule("Person", group([keyword("Person"), assign("name", call("ID"))]))
//! ```

use smol_str::SmolStr;

/// Index of a rule inside its grammar, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuleId(pub u32);

impl RuleId {
    pub(crate) const UNBOUND: RuleId = RuleId(u32::MAX);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Preorder number of a parser-rule element, assigned at compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub u32);

impl ElementId {
    pub(crate) const UNBOUND: ElementId = ElementId(u32::MAX);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Cardinality {
    #[default]
    One,
    /// `?`
    Optional,
    /// `*`
    Many,
    /// `+`
    AtLeastOne,
}

impl Cardinality {
    pub fn is_optional(self) -> bool {
        matches!(self, Self::Optional | Self::Many)
    }

    pub fn is_repeated(self) -> bool {
        matches!(self, Self::Many | Self::AtLeastOne)
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Self::One => "",
            Self::Optional => "?",
            Self::Many => "*",
            Self::AtLeastOne => "+",
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "" => Some(Self::One),
            "?" => Some(Self::Optional),
            "*" => Some(Self::Many),
            "+" => Some(Self::AtLeastOne),
            _ => None,
        }
    }
}

/// Assignment operator of a feature assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignOp {
    /// `name=Value`
    Assign,
    /// `items+=Value`
    Append,
    /// `flag?='keyword'`
    Flag,
}

impl AssignOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assign => "=",
            Self::Append => "+=",
            Self::Flag => "?=",
        }
    }
}

/// Boolean expression over the parameters of the enclosing parser rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Literal(bool),
    Parameter(SmolStr),
    Not(Box<Condition>),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

impl Condition {
    pub fn not(self) -> Self {
        Condition::Not(Box::new(self))
    }

    pub fn and(self, other: Condition) -> Self {
        Condition::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Condition) -> Self {
        Condition::Or(Box::new(self), Box::new(other))
    }

    /// Evaluates against `arguments`, given positionally for `parameters`.
    /// Parameters without a value are false.
    pub fn eval(&self, parameters: &[SmolStr], arguments: &[bool]) -> bool {
        match self {
            Condition::Literal(value) => *value,
            Condition::Parameter(name) => parameters
                .iter()
                .position(|parameter| parameter == name)
                .and_then(|index| arguments.get(index).copied())
                .unwrap_or(false),
            Condition::Not(inner) => !inner.eval(parameters, arguments),
            Condition::And(left, right) => {
                left.eval(parameters, arguments) && right.eval(parameters, arguments)
            }
            Condition::Or(left, right) => {
                left.eval(parameters, arguments) || right.eval(parameters, arguments)
            }
        }
    }

    pub(crate) fn parameters(&self, out: &mut Vec<SmolStr>) {
        match self {
            Condition::Literal(_) => {}
            Condition::Parameter(name) => out.push(name.clone()),
            Condition::Not(inner) => inner.parameters(out),
            Condition::And(left, right) | Condition::Or(left, right) => {
                left.parameters(out);
                right.parameters(out);
            }
        }
    }
}

/// Value passed to a parameter of the called rule: `Rule<true, !p>` or `Rule<p=q>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleArgument {
    /// Target parameter for named arguments; positional otherwise.
    pub parameter: Option<SmolStr>,
    pub value: Condition,
}

impl RuleArgument {
    pub fn positional(value: Condition) -> Self {
        Self {
            parameter: None,
            value,
        }
    }

    pub fn named(parameter: impl Into<SmolStr>, value: Condition) -> Self {
        Self {
            parameter: Some(parameter.into()),
            value,
        }
    }
}

/// A call site naming another rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRef {
    pub name: SmolStr,
    pub arguments: Vec<RuleArgument>,
    pub(crate) id: RuleId,
}

impl RuleRef {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            arguments: Vec::new(),
            id: RuleId::UNBOUND,
        }
    }

    /// The called rule. Only meaningful on a compiled grammar.
    pub fn id(&self) -> RuleId {
        self.id
    }
}

// =============================================================================
// Parser rule elements
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub kind: ElementKind,
    pub cardinality: Cardinality,
    /// The element is skipped unless the guard holds for the rule's arguments.
    pub guard: Option<Condition>,
    pub(crate) id: ElementId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    Keyword(SmolStr),
    RuleCall(RuleRef),
    Assignment {
        feature: SmolStr,
        op: AssignOp,
        value: Box<Element>,
    },
    /// `[Type]` or `[Type:TOKEN]`; `token` defaults to the `ID` rule.
    CrossReference {
        target_type: SmolStr,
        token: Option<RuleRef>,
    },
    /// `{Type}` or `{Type.feature=current}`: continues the rule with a new
    /// node, optionally holding the node built so far.
    Action {
        node_type: SmolStr,
        feature: Option<(SmolStr, AssignOp)>,
    },
    Group(Vec<Element>),
    Alternatives(Vec<Element>),
    /// `a & b & c`: every member, in any order.
    UnorderedGroup(Vec<Element>),
}

impl Element {
    pub fn new(kind: ElementKind) -> Self {
        Self {
            kind,
            cardinality: Cardinality::One,
            guard: None,
            id: ElementId::UNBOUND,
        }
    }

    /// Preorder id assigned by compilation.
    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    pub fn opt(self) -> Self {
        self.with_cardinality(Cardinality::Optional)
    }

    pub fn many(self) -> Self {
        self.with_cardinality(Cardinality::Many)
    }

    pub fn at_least_one(self) -> Self {
        self.with_cardinality(Cardinality::AtLeastOne)
    }

    pub fn when(mut self, guard: Condition) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Direct child elements, in order.
    pub fn children(&self) -> &[Element] {
        match &self.kind {
            ElementKind::Group(items)
            | ElementKind::Alternatives(items)
            | ElementKind::UnorderedGroup(items) => items,
            ElementKind::Assignment { value, .. } => std::slice::from_ref(value.as_ref()),
            _ => &[],
        }
    }
}

// =============================================================================
// Terminal rule elements
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct TerminalElement {
    pub kind: TerminalKind,
    pub cardinality: Cardinality,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TerminalKind {
    /// Regular expression source, without the surrounding slashes.
    Regex(SmolStr),
    Literal(SmolStr),
    /// `'a'..'z'`
    CharRange(char, char),
    /// `.`
    Wildcard,
    RuleCall(RuleRef),
    Group(Vec<TerminalElement>),
    Alternatives(Vec<TerminalElement>),
    /// `-> end`: anything up to and including the first `end`.
    Until(Box<TerminalElement>),
    /// `!chars`: one character not matched by a single-character element.
    Negated(Box<TerminalElement>),
}

impl TerminalElement {
    pub fn new(kind: TerminalKind) -> Self {
        Self {
            kind,
            cardinality: Cardinality::One,
        }
    }

    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    pub fn opt(self) -> Self {
        self.with_cardinality(Cardinality::Optional)
    }

    pub fn many(self) -> Self {
        self.with_cardinality(Cardinality::Many)
    }

    pub fn at_least_one(self) -> Self {
        self.with_cardinality(Cardinality::AtLeastOne)
    }
}

// =============================================================================
// Rules
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ParserRule {
    pub name: SmolStr,
    pub parameters: Vec<SmolStr>,
    pub entry: bool,
    pub fragment: bool,
    pub return_type: Option<SmolStr>,
    pub definition: Element,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TerminalRule {
    pub name: SmolStr,
    pub hidden: bool,
    pub fragment: bool,
    pub value_type: Option<SmolStr>,
    pub definition: TerminalElement,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Parser(ParserRule),
    Terminal(TerminalRule),
}

impl Rule {
    pub fn name(&self) -> &SmolStr {
        match self {
            Rule::Parser(rule) => &rule.name,
            Rule::Terminal(rule) => &rule.name,
        }
    }

    pub fn is_fragment(&self) -> bool {
        match self {
            Rule::Parser(rule) => rule.fragment,
            Rule::Terminal(rule) => rule.fragment,
        }
    }

    pub fn as_parser(&self) -> Option<&ParserRule> {
        match self {
            Rule::Parser(rule) => Some(rule),
            Rule::Terminal(_) => None,
        }
    }

    pub fn as_terminal(&self) -> Option<&TerminalRule> {
        match self {
            Rule::Terminal(rule) => Some(rule),
            Rule::Parser(_) => None,
        }
    }
}

/// Compiled classification of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// Produces AST nodes.
    Parser,
    /// Parser rule producing a primitive value from its token text.
    DataType,
    Terminal,
}

// =============================================================================
// Builder vocabulary
// =============================================================================

pub fn keyword(value: impl Into<SmolStr>) -> Element {
    Element::new(ElementKind::Keyword(value.into()))
}

pub fn call(rule: impl Into<SmolStr>) -> Element {
    Element::new(ElementKind::RuleCall(RuleRef::new(rule)))
}

/// Rule call passing arguments to the callee's parameters.
pub fn call_with(rule: impl Into<SmolStr>, arguments: impl IntoIterator<Item = RuleArgument>) -> Element {
    let mut callee = RuleRef::new(rule);
    callee.arguments = arguments.into_iter().collect();
    Element::new(ElementKind::RuleCall(callee))
}

pub fn param(name: impl Into<SmolStr>) -> Condition {
    Condition::Parameter(name.into())
}

pub fn action(node_type: impl Into<SmolStr>) -> Element {
    Element::new(ElementKind::Action {
        node_type: node_type.into(),
        feature: None,
    })
}

/// `{Type.feature=current}` or `{Type.feature+=current}`.
pub fn action_assign(node_type: impl Into<SmolStr>, feature: impl Into<SmolStr>, op: AssignOp) -> Element {
    Element::new(ElementKind::Action {
        node_type: node_type.into(),
        feature: Some((feature.into(), op)),
    })
}

pub fn assign(feature: impl Into<SmolStr>, value: Element) -> Element {
    assignment(feature, AssignOp::Assign, value)
}

pub fn assign_add(feature: impl Into<SmolStr>, value: Element) -> Element {
    assignment(feature, AssignOp::Append, value)
}

pub fn assign_flag(feature: impl Into<SmolStr>, value: Element) -> Element {
    assignment(feature, AssignOp::Flag, value)
}

pub fn assignment(feature: impl Into<SmolStr>, op: AssignOp, value: Element) -> Element {
    Element::new(ElementKind::Assignment {
        feature: feature.into(),
        op,
        value: Box::new(value),
    })
}

pub fn cross_ref(target_type: impl Into<SmolStr>) -> Element {
    Element::new(ElementKind::CrossReference {
        target_type: target_type.into(),
        token: None,
    })
}

pub fn cross_ref_via(target_type: impl Into<SmolStr>, token: impl Into<SmolStr>) -> Element {
    Element::new(ElementKind::CrossReference {
        target_type: target_type.into(),
        token: Some(RuleRef::new(token)),
    })
}

pub fn group(elements: impl IntoIterator<Item = Element>) -> Element {
    Element::new(ElementKind::Group(elements.into_iter().collect()))
}

pub fn alternatives(elements: impl IntoIterator<Item = Element>) -> Element {
    Element::new(ElementKind::Alternatives(elements.into_iter().collect()))
}

pub fn unordered(elements: impl IntoIterator<Item = Element>) -> Element {
    Element::new(ElementKind::UnorderedGroup(elements.into_iter().collect()))
}

pub fn parser_rule(name: impl Into<SmolStr>, definition: Element) -> ParserRule {
    ParserRule {
        name: name.into(),
        parameters: Vec::new(),
        entry: false,
        fragment: false,
        return_type: None,
        definition,
    }
}

pub fn terminal_rule(name: impl Into<SmolStr>, definition: TerminalElement) -> TerminalRule {
    TerminalRule {
        name: name.into(),
        hidden: false,
        fragment: false,
        value_type: None,
        definition,
    }
}

pub fn regex(source: impl Into<SmolStr>) -> TerminalElement {
    TerminalElement::new(TerminalKind::Regex(source.into()))
}

pub fn literal(value: impl Into<SmolStr>) -> TerminalElement {
    TerminalElement::new(TerminalKind::Literal(value.into()))
}

pub fn char_range(from: char, to: char) -> TerminalElement {
    TerminalElement::new(TerminalKind::CharRange(from, to))
}

pub fn wildcard() -> TerminalElement {
    TerminalElement::new(TerminalKind::Wildcard)
}

pub fn terminal_call(rule: impl Into<SmolStr>) -> TerminalElement {
    TerminalElement::new(TerminalKind::RuleCall(RuleRef::new(rule)))
}

pub fn terminal_group(elements: impl IntoIterator<Item = TerminalElement>) -> TerminalElement {
    TerminalElement::new(TerminalKind::Group(elements.into_iter().collect()))
}

pub fn terminal_alternatives(
    elements: impl IntoIterator<Item = TerminalElement>,
) -> TerminalElement {
    TerminalElement::new(TerminalKind::Alternatives(elements.into_iter().collect()))
}

pub fn until(end: TerminalElement) -> TerminalElement {
    TerminalElement::new(TerminalKind::Until(Box::new(end)))
}

pub fn negated(element: TerminalElement) -> TerminalElement {
    TerminalElement::new(TerminalKind::Negated(Box::new(element)))
}

impl ParserRule {
    pub fn with_parameters(mut self, parameters: impl IntoIterator<Item = impl Into<SmolStr>>) -> Self {
        self.parameters = parameters.into_iter().map(Into::into).collect();
        self
    }

    pub fn entry(mut self) -> Self {
        self.entry = true;
        self
    }

    pub fn fragment(mut self) -> Self {
        self.fragment = true;
        self
    }

    pub fn returns(mut self, ty: impl Into<SmolStr>) -> Self {
        self.return_type = Some(ty.into());
        self
    }
}

impl TerminalRule {
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn fragment(mut self) -> Self {
        self.fragment = true;
        self
    }

    pub fn returns(mut self, ty: impl Into<SmolStr>) -> Self {
        self.value_type = Some(ty.into());
        self
    }
}

impl From<ParserRule> for Rule {
    fn from(rule: ParserRule) -> Self {
        Rule::Parser(rule)
    }
}

impl From<TerminalRule> for Rule {
    fn from(rule: TerminalRule) -> Self {
        Rule::Terminal(rule)
    }
}
