//! Grammar compilation.
//!
//! [`GrammarBuilder::compile`] validates a list of rules and computes every
//! derived fact the lexer and parser need. The result is an immutable
//! [`Grammar`]; nothing is computed lazily afterwards.
//!
//! ```text
//! rules ──► bind names ──► classify (parser / data type / terminal)
//!                │
//!                ├──► reachable rules ──► keyword list
//!                ├──► terminal patterns ──► lexer regexes
//!                ├──► FIRST sets ──► left-recursion check
//!                └──► node types ──► subtype relation
//! ```

use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

use super::error::GrammarError;
use super::model::{
    AssignOp, Cardinality, Condition, Element, ElementId, ElementKind, Rule, RuleId, RuleKind,
    RuleRef, TerminalElement, TerminalKind,
};
use super::token_set::{TokenKey, TokenSet};

/// Return types that mark a parser rule as a data type rule.
const PRIMITIVE_TYPES: &[&str] = &["string", "number", "boolean", "bigint", "Date"];

/// Upper bound imposed by the CST kind encoding (14 bits per class).
const MAX_KINDS: usize = 0x3FFF;

/// Initial value of a feature before any assignment runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureDefault {
    /// `+=` features start as an empty list.
    EmptyList,
    /// `?=` features start as `false`.
    False,
}

/// A lexer-visible terminal with its anchored pattern.
#[derive(Debug, Clone)]
pub struct LexerTerminal {
    pub rule: RuleId,
    pub hidden: bool,
    pub regex: Regex,
}

/// Collects rules and compiles them into a [`Grammar`].
#[derive(Debug, Clone, Default)]
pub struct GrammarBuilder {
    name: SmolStr,
    rules: Vec<Rule>,
}

impl GrammarBuilder {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
        }
    }

    pub fn rule(mut self, rule: impl Into<Rule>) -> Self {
        self.rules.push(rule.into());
        self
    }

    pub fn push(&mut self, rule: impl Into<Rule>) {
        self.rules.push(rule.into());
    }

    pub fn compile(self) -> Result<Grammar, GrammarError> {
        Compiler::new(self.name, self.rules)?.run()
    }
}

/// A compiled, immutable grammar.
#[derive(Debug, Clone)]
pub struct Grammar {
    name: SmolStr,
    rules: Vec<Rule>,
    kinds: Vec<RuleKind>,
    by_name: FxHashMap<SmolStr, RuleId>,
    entry: RuleId,
    reachable: Vec<bool>,
    keywords: Vec<SmolStr>,
    keyword_index: FxHashMap<SmolStr, u32>,
    patterns: Vec<Option<String>>,
    lexer_terminals: Vec<LexerTerminal>,
    node_types: IndexSet<SmolStr>,
    supertypes: FxHashMap<SmolStr, FxHashSet<SmolStr>>,
    rule_first: Vec<TokenSet>,
    rule_nullable: Vec<bool>,
    element_first: Vec<TokenSet>,
    element_nullable: Vec<bool>,
    defaults: Vec<Vec<(SmolStr, FeatureDefault)>>,
}

impl Grammar {
    pub fn name(&self) -> &SmolStr {
        &self.name
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.index()]
    }

    pub fn rule_id(&self, name: &str) -> Option<RuleId> {
        self.by_name.get(name).copied()
    }

    pub fn rule_name(&self, id: RuleId) -> &SmolStr {
        self.rules[id.index()].name()
    }

    pub fn rule_kind(&self, id: RuleId) -> RuleKind {
        self.kinds[id.index()]
    }

    pub fn entry_rule(&self) -> RuleId {
        self.entry
    }

    pub fn is_reachable(&self, id: RuleId) -> bool {
        self.reachable[id.index()]
    }

    /// Rules reachable from the entry rule or hidden terminals, in declaration order.
    pub fn reachable_rules(&self) -> Vec<RuleId> {
        self.rule_ids().filter(|id| self.is_reachable(*id)).collect()
    }

    pub fn unused_rules(&self) -> Vec<&SmolStr> {
        self.rule_ids()
            .filter(|id| !self.is_reachable(*id))
            .map(|id| self.rule_name(id))
            .collect()
    }

    /// Sorted, de-duplicated keywords of all reachable parser rules.
    pub fn keywords(&self) -> &[SmolStr] {
        &self.keywords
    }

    pub fn keyword_index(&self, keyword: &str) -> Option<u32> {
        self.keyword_index.get(keyword).copied()
    }

    /// Composed pattern of a terminal rule, fragments included.
    pub fn terminal_pattern(&self, id: RuleId) -> Option<&str> {
        self.patterns.get(id.index())?.as_deref()
    }

    /// Reachable non-fragment terminals, in declaration order.
    pub fn lexer_terminals(&self) -> &[LexerTerminal] {
        &self.lexer_terminals
    }

    /// AST node type created by a parser rule; `None` for data type and terminal rules.
    pub fn node_type(&self, id: RuleId) -> Option<&SmolStr> {
        match (&self.rules[id.index()], self.rule_kind(id)) {
            (Rule::Parser(rule), RuleKind::Parser) => {
                Some(rule.return_type.as_ref().unwrap_or(&rule.name))
            }
            _ => None,
        }
    }

    pub fn node_types(&self) -> impl Iterator<Item = &SmolStr> {
        self.node_types.iter()
    }

    pub fn has_node_type(&self, name: &str) -> bool {
        self.node_types.contains(name)
    }

    pub fn is_subtype(&self, sub: &str, sup: &str) -> bool {
        sub == sup
            || self
                .supertypes
                .get(sub)
                .is_some_and(|supers| supers.contains(sup))
    }

    pub fn keyword_key(&self, index: u32) -> TokenKey {
        TokenKey(index)
    }

    pub fn terminal_key(&self, rule: RuleId) -> TokenKey {
        TokenKey(self.keywords.len() as u32 + rule.0)
    }

    pub fn eof_key(&self) -> TokenKey {
        TokenKey((self.keywords.len() + self.rules.len()) as u32)
    }

    /// Human-readable name of a token key, used in parser diagnostics.
    pub fn describe_key(&self, key: TokenKey) -> String {
        let keywords = self.keywords.len() as u32;
        if key == self.eof_key() {
            "end of input".to_string()
        } else if key.0 < keywords {
            format!("keyword '{}'", self.keywords[key.0 as usize])
        } else {
            format!("token of type '{}'", self.rule_name(RuleId(key.0 - keywords)))
        }
    }

    pub fn first(&self, element: &Element) -> &TokenSet {
        &self.element_first[element.id().index()]
    }

    pub fn nullable(&self, element: &Element) -> bool {
        self.element_nullable[element.id().index()]
    }

    pub fn rule_first(&self, id: RuleId) -> &TokenSet {
        &self.rule_first[id.index()]
    }

    pub fn rule_nullable(&self, id: RuleId) -> bool {
        self.rule_nullable[id.index()]
    }

    /// Initial feature values for nodes created by this rule.
    pub fn feature_defaults(&self, id: RuleId) -> &[(SmolStr, FeatureDefault)] {
        &self.defaults[id.index()]
    }

    fn rule_ids(&self) -> impl Iterator<Item = RuleId> + '_ {
        (0..self.rules.len() as u32).map(RuleId)
    }
}

// =============================================================================
// Compiler
// =============================================================================

#[derive(Debug, Clone)]
struct RuleShape {
    terminal: bool,
    fragment: bool,
    parameters: Vec<SmolStr>,
}

struct Compiler {
    name: SmolStr,
    rules: Vec<Rule>,
    by_name: FxHashMap<SmolStr, RuleId>,
    element_count: u32,
}

enum PatternState {
    Pending,
    Visiting,
    Done(String),
}

impl Compiler {
    fn new(name: SmolStr, rules: Vec<Rule>) -> Result<Self, GrammarError> {
        let mut by_name = FxHashMap::default();
        for (index, rule) in rules.iter().enumerate() {
            let rule_name = rule.name();
            if !is_valid_rule_name(rule_name) {
                return Err(GrammarError::InvalidRuleName {
                    name: rule_name.clone(),
                });
            }
            if by_name.insert(rule_name.clone(), RuleId(index as u32)).is_some() {
                return Err(GrammarError::DuplicateRule {
                    name: rule_name.clone(),
                });
            }
        }
        if rules.len() > MAX_KINDS {
            return Err(GrammarError::TooLarge {
                what: "rules",
                count: rules.len(),
            });
        }
        Ok(Self {
            name,
            rules,
            by_name,
            element_count: 0,
        })
    }

    fn run(mut self) -> Result<Grammar, GrammarError> {
        self.bind()?;
        let kinds = self.classify();
        let entry = self.entry_rule(&kinds)?;
        self.check_cross_references(&kinds)?;

        let reachable = self.reachability(entry);
        for (index, rule) in self.rules.iter().enumerate() {
            if !reachable[index] {
                tracing::warn!(grammar = %self.name, rule = %rule.name(), "rule is unreachable");
            }
        }

        let keywords = self.keywords(&reachable);
        if keywords.len() > MAX_KINDS {
            return Err(GrammarError::TooLarge {
                what: "keywords",
                count: keywords.len(),
            });
        }
        let keyword_index = keywords
            .iter()
            .enumerate()
            .map(|(index, kw)| (kw.clone(), index as u32))
            .collect::<FxHashMap<_, _>>();

        let patterns = self.terminal_patterns()?;
        let lexer_terminals = self.lexer_terminals(&reachable, &patterns)?;

        let keys = KeyLayout {
            keyword_index: &keyword_index,
            keyword_count: keywords.len() as u32,
        };
        let (rule_first, rule_nullable) = self.rule_first_sets(&kinds, &keys);
        let mut element_first = vec![TokenSet::new(); self.element_count as usize];
        let mut element_nullable = vec![false; self.element_count as usize];
        for rule in &self.rules {
            if let Rule::Parser(rule) = rule {
                let facts = FirstFacts {
                    kinds: &kinds,
                    keys: &keys,
                    rule_first: &rule_first,
                    rule_nullable: &rule_nullable,
                };
                facts.record(&rule.definition, &mut element_first, &mut element_nullable);
            }
        }
        self.check_left_recursion(&rule_nullable)?;

        let (node_types, supertypes) = self.type_hierarchy(&kinds);
        let defaults = self.feature_defaults(&kinds);

        tracing::debug!(
            grammar = %self.name,
            rules = self.rules.len(),
            keywords = keywords.len(),
            terminals = lexer_terminals.len(),
            "compiled grammar"
        );

        Ok(Grammar {
            name: self.name,
            rules: self.rules,
            kinds,
            by_name: self.by_name,
            entry,
            reachable,
            keywords,
            keyword_index,
            patterns,
            lexer_terminals,
            node_types,
            supertypes,
            rule_first,
            rule_nullable,
            element_first,
            element_nullable,
            defaults,
        })
    }

    // -------------------------------------------------------------------------
    // Name binding and structural checks
    // -------------------------------------------------------------------------

    fn bind(&mut self) -> Result<(), GrammarError> {
        let shapes: Vec<RuleShape> = self
            .rules
            .iter()
            .map(|rule| RuleShape {
                terminal: matches!(rule, Rule::Terminal(_)),
                fragment: rule.is_fragment(),
                parameters: rule
                    .as_parser()
                    .map(|rule| rule.parameters.clone())
                    .unwrap_or_default(),
            })
            .collect();
        let mut binder = Binder {
            by_name: &self.by_name,
            shapes: &shapes,
            next_element: 0,
            rule_name: SmolStr::default(),
            parameters: &[],
        };
        for (rule, shape) in self.rules.iter_mut().zip(&shapes) {
            binder.rule_name = rule.name().clone();
            binder.parameters = &shape.parameters;
            match rule {
                Rule::Parser(rule) => binder.bind_element(&mut rule.definition, false)?,
                Rule::Terminal(rule) => binder.bind_terminal(&mut rule.definition)?,
            }
        }
        self.element_count = binder.next_element;
        Ok(())
    }

    /// Data type rules are the greatest fixed point of "no assignments and
    /// only calls to terminals or other data type rules".
    fn classify(&self) -> Vec<RuleKind> {
        let mut candidate: Vec<bool> = self
            .rules
            .iter()
            .map(|rule| match rule {
                Rule::Parser(rule) if !rule.fragment => {
                    rule.return_type
                        .as_deref()
                        .is_some_and(|ty| PRIMITIVE_TYPES.contains(&ty))
                        || !has_assignment(&rule.definition)
                }
                _ => false,
            })
            .collect();
        let calls: Vec<Vec<RuleId>> = self
            .rules
            .iter()
            .map(|rule| {
                let mut out = Vec::new();
                if let Rule::Parser(rule) = rule {
                    collect_calls(&rule.definition, &mut out);
                }
                out
            })
            .collect();

        loop {
            let mut changed = false;
            for index in 0..self.rules.len() {
                if !candidate[index] {
                    continue;
                }
                let declared_primitive = self.rules[index]
                    .as_parser()
                    .and_then(|rule| rule.return_type.as_deref())
                    .is_some_and(|ty| PRIMITIVE_TYPES.contains(&ty));
                if declared_primitive {
                    continue;
                }
                let calls_node_rule = calls[index].iter().any(|callee| {
                    matches!(self.rules[callee.index()], Rule::Parser(_)) && !candidate[callee.index()]
                });
                if calls_node_rule {
                    candidate[index] = false;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        self.rules
            .iter()
            .zip(candidate)
            .map(|(rule, data_type)| match rule {
                Rule::Terminal(_) => RuleKind::Terminal,
                Rule::Parser(_) if data_type => RuleKind::DataType,
                Rule::Parser(_) => RuleKind::Parser,
            })
            .collect()
    }

    fn entry_rule(&self, kinds: &[RuleKind]) -> Result<RuleId, GrammarError> {
        let entries: Vec<RuleId> = self
            .rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.as_parser().is_some_and(|r| r.entry))
            .map(|(index, _)| RuleId(index as u32))
            .collect();
        match entries.as_slice() {
            [] => Err(GrammarError::MissingEntryRule),
            [entry] => {
                let rule = &self.rules[entry.index()];
                if rule.is_fragment() || kinds[entry.index()] != RuleKind::Parser {
                    return Err(GrammarError::InvalidEntryRule {
                        rule: rule.name().clone(),
                    });
                }
                Ok(*entry)
            }
            many => Err(GrammarError::MultipleEntryRules {
                rules: many
                    .iter()
                    .map(|id| self.rules[id.index()].name().clone())
                    .collect(),
            }),
        }
    }

    fn check_cross_references(&self, kinds: &[RuleKind]) -> Result<(), GrammarError> {
        let mut node_types: FxHashSet<SmolStr> = self
            .rules
            .iter()
            .enumerate()
            .filter(|(index, rule)| kinds[*index] == RuleKind::Parser && !rule.is_fragment())
            .filter_map(|(_, rule)| rule.as_parser())
            .map(|rule| rule.return_type.clone().unwrap_or_else(|| rule.name.clone()))
            .collect();
        for rule in self.rules.iter().filter_map(Rule::as_parser) {
            node_types.extend(action_types(&rule.definition));
        }
        for rule in &self.rules {
            let Rule::Parser(parser_rule) = rule else {
                continue;
            };
            let mut failure = None;
            visit_elements(&parser_rule.definition, &mut |element| {
                if failure.is_some() {
                    return;
                }
                if let ElementKind::CrossReference { target_type, token } = &element.kind {
                    if !node_types.contains(target_type) {
                        failure = Some(GrammarError::UnknownType {
                            rule: parser_rule.name.clone(),
                            target_type: target_type.clone(),
                        });
                        return;
                    }
                    if let Some(token) = token {
                        let callee = &self.rules[token.id().index()];
                        let valid = match kinds[token.id().index()] {
                            RuleKind::Terminal => !callee.is_fragment(),
                            RuleKind::DataType => true,
                            RuleKind::Parser => false,
                        };
                        if !valid {
                            failure = Some(GrammarError::InvalidCrossReferenceToken {
                                rule: parser_rule.name.clone(),
                                token: token.name.clone(),
                            });
                        }
                    }
                }
            });
            if let Some(error) = failure {
                return Err(error);
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Reachability and keywords
    // -------------------------------------------------------------------------

    fn reachability(&self, entry: RuleId) -> Vec<bool> {
        let mut reachable = vec![false; self.rules.len()];
        let mut stack = vec![entry];
        for (index, rule) in self.rules.iter().enumerate() {
            if rule.as_terminal().is_some_and(|t| t.hidden && !t.fragment) {
                stack.push(RuleId(index as u32));
            }
        }
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut reachable[id.index()], true) {
                continue;
            }
            let mut callees = Vec::new();
            match &self.rules[id.index()] {
                Rule::Parser(rule) => collect_calls(&rule.definition, &mut callees),
                Rule::Terminal(rule) => collect_terminal_calls(&rule.definition, &mut callees),
            }
            stack.extend(callees.into_iter().filter(|c| !reachable[c.index()]));
        }
        reachable
    }

    fn keywords(&self, reachable: &[bool]) -> Vec<SmolStr> {
        let mut keywords = Vec::new();
        for (index, rule) in self.rules.iter().enumerate() {
            let Rule::Parser(rule) = rule else {
                continue;
            };
            if !reachable[index] {
                continue;
            }
            visit_elements(&rule.definition, &mut |element| {
                if let ElementKind::Keyword(kw) = &element.kind {
                    keywords.push(kw.clone());
                }
            });
        }
        keywords.sort();
        keywords.dedup();
        keywords
    }

    // -------------------------------------------------------------------------
    // Terminal patterns
    // -------------------------------------------------------------------------

    fn terminal_patterns(&self) -> Result<Vec<Option<String>>, GrammarError> {
        let mut states: Vec<PatternState> =
            self.rules.iter().map(|_| PatternState::Pending).collect();
        for (index, rule) in self.rules.iter().enumerate() {
            if matches!(rule, Rule::Terminal(_)) {
                self.terminal_pattern(RuleId(index as u32), &mut states)?;
            }
        }
        Ok(states
            .into_iter()
            .map(|state| match state {
                PatternState::Done(pattern) => Some(pattern),
                _ => None,
            })
            .collect())
    }

    fn terminal_pattern(
        &self,
        id: RuleId,
        states: &mut [PatternState],
    ) -> Result<String, GrammarError> {
        match &states[id.index()] {
            PatternState::Done(pattern) => return Ok(pattern.clone()),
            PatternState::Visiting => {
                return Err(GrammarError::RecursiveTerminal {
                    rule: self.rules[id.index()].name().clone(),
                });
            }
            PatternState::Pending => {}
        }
        let Rule::Terminal(rule) = &self.rules[id.index()] else {
            return Err(GrammarError::TerminalCallsNonTerminal {
                rule: self.rules[id.index()].name().clone(),
                callee: self.rules[id.index()].name().clone(),
            });
        };
        states[id.index()] = PatternState::Visiting;
        let pattern = self.compose(&rule.name, &rule.definition, states)?;
        states[id.index()] = PatternState::Done(pattern.clone());
        Ok(pattern)
    }

    fn compose(
        &self,
        rule: &SmolStr,
        element: &TerminalElement,
        states: &mut [PatternState],
    ) -> Result<String, GrammarError> {
        let body = match &element.kind {
            TerminalKind::Regex(source) => format!("(?:{source})"),
            TerminalKind::Literal(text) => regex::escape(text),
            TerminalKind::CharRange(from, to) => {
                format!("[\\x{{{:X}}}-\\x{{{:X}}}]", *from as u32, *to as u32)
            }
            TerminalKind::Wildcard => "(?s:.)".to_string(),
            TerminalKind::RuleCall(callee) => {
                format!("(?:{})", self.terminal_pattern(callee.id(), states)?)
            }
            TerminalKind::Group(items) => {
                let mut out = String::new();
                for item in items {
                    out.push_str(&self.compose(rule, item, states)?);
                }
                out
            }
            TerminalKind::Alternatives(items) => {
                let parts = items
                    .iter()
                    .map(|item| self.compose(rule, item, states))
                    .collect::<Result<Vec<_>, _>>()?;
                format!("(?:{})", parts.join("|"))
            }
            TerminalKind::Until(end) => {
                format!("(?s:.)*?{}", self.compose(rule, end, states)?)
            }
            TerminalKind::Negated(inner) => {
                let mut members = String::new();
                self.class_members(rule, inner, &mut Vec::new(), &mut members)?;
                if members.is_empty() {
                    return Err(GrammarError::InvalidNegation { rule: rule.clone() });
                }
                format!("[^{members}]")
            }
        };
        Ok(match element.cardinality {
            Cardinality::One => body,
            cardinality => format!("(?:{body}){}", cardinality.suffix()),
        })
    }

    /// Writes the characters matched by `element` as bracket class members.
    fn class_members(
        &self,
        rule: &SmolStr,
        element: &TerminalElement,
        visiting: &mut Vec<RuleId>,
        out: &mut String,
    ) -> Result<(), GrammarError> {
        let invalid = || GrammarError::InvalidNegation { rule: rule.clone() };
        if element.cardinality != Cardinality::One {
            return Err(invalid());
        }
        match &element.kind {
            TerminalKind::Literal(text) => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => out.push_str(&format!("\\x{{{:X}}}", c as u32)),
                    _ => return Err(invalid()),
                }
            }
            TerminalKind::CharRange(from, to) => {
                out.push_str(&format!("\\x{{{:X}}}-\\x{{{:X}}}", *from as u32, *to as u32));
            }
            TerminalKind::Regex(source) if is_class_pattern(source) => out.push_str(source),
            TerminalKind::Alternatives(items) => {
                for item in items {
                    self.class_members(rule, item, visiting, out)?;
                }
            }
            TerminalKind::Group(items) if items.len() == 1 => {
                self.class_members(rule, &items[0], visiting, out)?;
            }
            TerminalKind::RuleCall(callee) => {
                if visiting.contains(&callee.id()) {
                    return Err(GrammarError::RecursiveTerminal {
                        rule: callee.name.clone(),
                    });
                }
                let Rule::Terminal(terminal) = &self.rules[callee.id().index()] else {
                    return Err(invalid());
                };
                visiting.push(callee.id());
                self.class_members(rule, &terminal.definition, visiting, out)?;
                visiting.pop();
            }
            _ => return Err(invalid()),
        }
        Ok(())
    }

    fn lexer_terminals(
        &self,
        reachable: &[bool],
        patterns: &[Option<String>],
    ) -> Result<Vec<LexerTerminal>, GrammarError> {
        let mut out = Vec::new();
        for (index, rule) in self.rules.iter().enumerate() {
            let Rule::Terminal(terminal) = rule else {
                continue;
            };
            if terminal.fragment || !reachable[index] {
                continue;
            }
            let pattern = patterns[index].as_deref().unwrap_or_default();
            let regex =
                Regex::new(&format!("^(?:{pattern})")).map_err(|err| GrammarError::InvalidRegex {
                    rule: terminal.name.clone(),
                    message: err.to_string(),
                })?;
            out.push(LexerTerminal {
                rule: RuleId(index as u32),
                hidden: terminal.hidden,
                regex,
            });
        }
        Ok(out)
    }

    // -------------------------------------------------------------------------
    // FIRST sets and left recursion
    // -------------------------------------------------------------------------

    fn rule_first_sets(&self, kinds: &[RuleKind], keys: &KeyLayout<'_>) -> (Vec<TokenSet>, Vec<bool>) {
        let mut first = vec![TokenSet::new(); self.rules.len()];
        let mut nullable = vec![false; self.rules.len()];
        loop {
            let mut changed = false;
            for (index, rule) in self.rules.iter().enumerate() {
                let Rule::Parser(rule) = rule else {
                    continue;
                };
                let facts = FirstFacts {
                    kinds,
                    keys,
                    rule_first: &first,
                    rule_nullable: &nullable,
                };
                let (set, is_nullable) = facts.first_of(&rule.definition);
                if first[index].union_with(&set) {
                    changed = true;
                }
                if is_nullable && !nullable[index] {
                    nullable[index] = true;
                    changed = true;
                }
            }
            if !changed {
                return (first, nullable);
            }
        }
    }

    fn check_left_recursion(&self, rule_nullable: &[bool]) -> Result<(), GrammarError> {
        let leading: Vec<Vec<RuleId>> = self
            .rules
            .iter()
            .map(|rule| {
                let mut out = Vec::new();
                if let Rule::Parser(rule) = rule {
                    self.leading_calls(&rule.definition, rule_nullable, &mut out);
                }
                out
            })
            .collect();

        // 0 = unvisited, 1 = on stack, 2 = done
        let mut marks = vec![0u8; self.rules.len()];
        for start in 0..self.rules.len() {
            if marks[start] != 0 {
                continue;
            }
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            marks[start] = 1;
            while let Some(top) = stack.len().checked_sub(1) {
                let (node, next) = stack[top];
                if let Some(callee) = leading[node].get(next) {
                    stack[top].1 += 1;
                    let callee = callee.index();
                    match marks[callee] {
                        0 => {
                            marks[callee] = 1;
                            stack.push((callee, 0));
                        }
                        1 => {
                            return Err(GrammarError::LeftRecursion {
                                rule: self.rules[callee].name().clone(),
                            });
                        }
                        _ => {}
                    }
                } else {
                    marks[node] = 2;
                    stack.pop();
                }
            }
        }
        Ok(())
    }

    /// Parser rules callable before any token is consumed; returns nullability.
    fn leading_calls(&self, element: &Element, rule_nullable: &[bool], out: &mut Vec<RuleId>) -> bool {
        let nullable = match &element.kind {
            ElementKind::Keyword(_) => false,
            ElementKind::RuleCall(callee) => self.leading_call(callee, rule_nullable, out),
            ElementKind::CrossReference { token, .. } => token
                .as_ref()
                .is_some_and(|token| self.leading_call(token, rule_nullable, out)),
            ElementKind::Assignment { value, .. } => self.leading_calls(value, rule_nullable, out),
            ElementKind::Action { .. } => true,
            ElementKind::Group(items) => {
                let mut all = true;
                for item in items {
                    if !self.leading_calls(item, rule_nullable, out) {
                        all = false;
                        break;
                    }
                }
                all
            }
            ElementKind::Alternatives(items) => {
                let mut any = false;
                for item in items {
                    any |= self.leading_calls(item, rule_nullable, out);
                }
                any
            }
            // Any member may come first.
            ElementKind::UnorderedGroup(items) => {
                let mut all = true;
                for item in items {
                    all &= self.leading_calls(item, rule_nullable, out);
                }
                all
            }
        };
        nullable || element.cardinality.is_optional()
    }

    fn leading_call(&self, callee: &RuleRef, rule_nullable: &[bool], out: &mut Vec<RuleId>) -> bool {
        match self.rules[callee.id().index()] {
            Rule::Parser(_) => {
                out.push(callee.id());
                rule_nullable[callee.id().index()]
            }
            Rule::Terminal(_) => false,
        }
    }

    // -------------------------------------------------------------------------
    // Types and defaults
    // -------------------------------------------------------------------------

    fn type_hierarchy(
        &self,
        kinds: &[RuleKind],
    ) -> (IndexSet<SmolStr>, FxHashMap<SmolStr, FxHashSet<SmolStr>>) {
        let type_of = |id: RuleId| -> Option<SmolStr> {
            let rule = self.rules[id.index()].as_parser()?;
            (kinds[id.index()] == RuleKind::Parser && !rule.fragment)
                .then(|| rule.return_type.clone().unwrap_or_else(|| rule.name.clone()))
        };

        let mut node_types = IndexSet::new();
        let mut direct: IndexMap<SmolStr, IndexSet<SmolStr>> = IndexMap::new();
        for index in 0..self.rules.len() {
            let id = RuleId(index as u32);
            let Some(own) = type_of(id) else {
                continue;
            };
            node_types.insert(own.clone());
            let Some(rule) = self.rules[index].as_parser() else {
                continue;
            };
            let mut delegates = Vec::new();
            collect_unassigned_calls(&rule.definition, &mut delegates);
            for callee in delegates {
                if let Some(sub) = type_of(callee).filter(|sub| *sub != own) {
                    direct.entry(sub).or_default().insert(own.clone());
                }
            }
            for action in action_types(&rule.definition) {
                node_types.insert(action.clone());
                if action != own {
                    direct.entry(action).or_default().insert(own.clone());
                }
            }
        }

        let mut supertypes = FxHashMap::default();
        for ty in &node_types {
            let mut seen = FxHashSet::default();
            let mut stack: Vec<SmolStr> = direct
                .get(ty)
                .map(|s| s.iter().cloned().collect())
                .unwrap_or_default();
            while let Some(sup) = stack.pop() {
                if sup != *ty && seen.insert(sup.clone()) {
                    if let Some(next) = direct.get(&sup) {
                        stack.extend(next.iter().cloned());
                    }
                }
            }
            if !seen.is_empty() {
                supertypes.insert(ty.clone(), seen);
            }
        }
        (node_types, supertypes)
    }

    fn feature_defaults(&self, kinds: &[RuleKind]) -> Vec<Vec<(SmolStr, FeatureDefault)>> {
        self.rules
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                let mut out = IndexMap::new();
                if let (Rule::Parser(rule), RuleKind::Parser) = (rule, kinds[index]) {
                    let mut visited = FxHashSet::default();
                    visited.insert(index);
                    self.collect_defaults(&rule.definition, &mut visited, &mut out);
                }
                out.into_iter().collect()
            })
            .collect()
    }

    fn collect_defaults(
        &self,
        element: &Element,
        visited: &mut FxHashSet<usize>,
        out: &mut IndexMap<SmolStr, FeatureDefault>,
    ) {
        match &element.kind {
            ElementKind::Assignment { feature, op, .. } => match op {
                AssignOp::Append => {
                    out.entry(feature.clone()).or_insert(FeatureDefault::EmptyList);
                }
                AssignOp::Flag => {
                    out.entry(feature.clone()).or_insert(FeatureDefault::False);
                }
                AssignOp::Assign => {}
            },
            ElementKind::RuleCall(callee) => {
                if let Rule::Parser(rule) = &self.rules[callee.id().index()] {
                    if rule.fragment && visited.insert(callee.id().index()) {
                        self.collect_defaults(&rule.definition, visited, out);
                    }
                }
            }
            ElementKind::Group(items)
            | ElementKind::Alternatives(items)
            | ElementKind::UnorderedGroup(items) => {
                for item in items {
                    self.collect_defaults(item, visited, out);
                }
            }
            ElementKind::Keyword(_)
            | ElementKind::CrossReference { .. }
            | ElementKind::Action { .. } => {}
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

struct Binder<'a> {
    by_name: &'a FxHashMap<SmolStr, RuleId>,
    shapes: &'a [RuleShape],
    next_element: u32,
    rule_name: SmolStr,
    /// Parameters of the rule being bound.
    parameters: &'a [SmolStr],
}

impl Binder<'_> {
    fn bind_ref(&self, reference: &mut RuleRef) -> Result<(), GrammarError> {
        reference.id = *self
            .by_name
            .get(&reference.name)
            .ok_or_else(|| GrammarError::unresolved(&reference.name, &self.rule_name))?;
        Ok(())
    }

    fn check_condition(&self, condition: &Condition) -> Result<(), GrammarError> {
        let mut used = Vec::new();
        condition.parameters(&mut used);
        match used.into_iter().find(|name| !self.parameters.contains(name)) {
            Some(parameter) => Err(GrammarError::UnknownParameter {
                rule: self.rule_name.clone(),
                parameter,
            }),
            None => Ok(()),
        }
    }

    fn check_arguments(&self, callee: &RuleRef) -> Result<(), GrammarError> {
        if callee.arguments.is_empty() {
            return Ok(());
        }
        let invalid = |message: String| GrammarError::InvalidArguments {
            rule: self.rule_name.clone(),
            callee: callee.name.clone(),
            message,
        };
        let shape = &self.shapes[callee.id().index()];
        if shape.terminal {
            return Err(invalid("terminal rules take no arguments".into()));
        }
        let named = callee.arguments.iter().filter(|a| a.parameter.is_some()).count();
        if named != 0 && named != callee.arguments.len() {
            return Err(invalid("named and positional arguments are mixed".into()));
        }
        if callee.arguments.len() > shape.parameters.len() {
            return Err(invalid(format!(
                "expected at most {} arguments, found {}",
                shape.parameters.len(),
                callee.arguments.len()
            )));
        }
        for argument in &callee.arguments {
            if let Some(name) = &argument.parameter {
                if !shape.parameters.contains(name) {
                    return Err(invalid(format!("no parameter named `{name}`")));
                }
            }
            self.check_condition(&argument.value)?;
        }
        Ok(())
    }

    fn bind_element(&mut self, element: &mut Element, in_assignment: bool) -> Result<(), GrammarError> {
        element.id = ElementId(self.next_element);
        self.next_element += 1;
        if let Some(guard) = &element.guard {
            self.check_condition(guard)?;
        }
        match &mut element.kind {
            ElementKind::Keyword(_) => {}
            ElementKind::RuleCall(callee) => {
                self.bind_ref(callee)?;
                let shape = &self.shapes[callee.id().index()];
                if shape.terminal && shape.fragment {
                    return Err(GrammarError::ParserCallsTerminalFragment {
                        rule: self.rule_name.clone(),
                        callee: callee.name.clone(),
                    });
                }
                self.check_arguments(callee)?;
            }
            ElementKind::Action { feature, .. } => {
                if let Some((feature, AssignOp::Flag)) = feature {
                    return Err(GrammarError::InvalidAssignment {
                        rule: self.rule_name.clone(),
                        feature: feature.clone(),
                    });
                }
            }
            ElementKind::Assignment { feature, value, .. } => {
                self.bind_element(value, true)?;
                if !self.is_assignable(value) {
                    return Err(GrammarError::InvalidAssignment {
                        rule: self.rule_name.clone(),
                        feature: feature.clone(),
                    });
                }
            }
            ElementKind::CrossReference { token, .. } => {
                if !in_assignment {
                    return Err(GrammarError::MisplacedCrossReference {
                        rule: self.rule_name.clone(),
                    });
                }
                self.bind_ref(token.get_or_insert_with(|| RuleRef::new("ID")))?;
            }
            ElementKind::Group(items)
            | ElementKind::Alternatives(items)
            | ElementKind::UnorderedGroup(items) => {
                for item in items {
                    self.bind_element(item, in_assignment)?;
                }
            }
        }
        Ok(())
    }

    fn is_assignable(&self, element: &Element) -> bool {
        element.cardinality == Cardinality::One
            && match &element.kind {
                ElementKind::Keyword(_) | ElementKind::CrossReference { .. } => true,
                ElementKind::RuleCall(callee) => !self.shapes[callee.id().index()].fragment,
                ElementKind::Alternatives(items) => items.iter().all(|item| self.is_assignable(item)),
                ElementKind::Group(_)
                | ElementKind::UnorderedGroup(_)
                | ElementKind::Assignment { .. }
                | ElementKind::Action { .. } => false,
            }
    }

    fn bind_terminal(&mut self, element: &mut TerminalElement) -> Result<(), GrammarError> {
        match &mut element.kind {
            TerminalKind::RuleCall(callee) => {
                self.bind_ref(callee)?;
                if !self.shapes[callee.id().index()].terminal {
                    return Err(GrammarError::TerminalCallsNonTerminal {
                        rule: self.rule_name.clone(),
                        callee: callee.name.clone(),
                    });
                }
            }
            TerminalKind::CharRange(from, to) => {
                if from > to {
                    return Err(GrammarError::InvalidCharRange {
                        rule: self.rule_name.clone(),
                        from: SmolStr::new(from.to_string()),
                        to: SmolStr::new(to.to_string()),
                    });
                }
            }
            TerminalKind::Group(items) | TerminalKind::Alternatives(items) => {
                for item in items {
                    self.bind_terminal(item)?;
                }
            }
            TerminalKind::Until(inner) | TerminalKind::Negated(inner) => self.bind_terminal(inner)?,
            TerminalKind::Regex(_) | TerminalKind::Literal(_) | TerminalKind::Wildcard => {}
        }
        Ok(())
    }
}

struct KeyLayout<'a> {
    keyword_index: &'a FxHashMap<SmolStr, u32>,
    keyword_count: u32,
}

impl KeyLayout<'_> {
    fn keyword(&self, keyword: &str) -> Option<TokenKey> {
        self.keyword_index.get(keyword).map(|index| TokenKey(*index))
    }

    fn terminal(&self, rule: RuleId) -> TokenKey {
        TokenKey(self.keyword_count + rule.0)
    }
}

struct FirstFacts<'a> {
    kinds: &'a [RuleKind],
    keys: &'a KeyLayout<'a>,
    rule_first: &'a [TokenSet],
    rule_nullable: &'a [bool],
}

impl FirstFacts<'_> {
    fn first_of(&self, element: &Element) -> (TokenSet, bool) {
        let (set, nullable) = match &element.kind {
            ElementKind::Keyword(kw) => (self.keys.keyword(kw).into_iter().collect(), false),
            ElementKind::RuleCall(callee) => self.call(callee),
            ElementKind::CrossReference { token, .. } => match token {
                Some(token) => self.call(token),
                None => (TokenSet::new(), false),
            },
            ElementKind::Assignment { value, .. } => self.first_of(value),
            ElementKind::Group(items) => {
                let mut acc = TokenSet::new();
                let mut all_nullable = true;
                for item in items {
                    let (set, nullable) = self.first_of(item);
                    acc.union_with(&set);
                    if !nullable {
                        all_nullable = false;
                        break;
                    }
                }
                (acc, all_nullable)
            }
            ElementKind::Alternatives(items) => {
                let mut acc = TokenSet::new();
                let mut any_nullable = false;
                for item in items {
                    let (set, nullable) = self.first_of(item);
                    acc.union_with(&set);
                    any_nullable |= nullable;
                }
                (acc, any_nullable)
            }
            ElementKind::UnorderedGroup(items) => {
                let mut acc = TokenSet::new();
                let mut all_nullable = true;
                for item in items {
                    let (set, nullable) = self.first_of(item);
                    acc.union_with(&set);
                    all_nullable &= nullable;
                }
                (acc, all_nullable)
            }
            ElementKind::Action { .. } => (TokenSet::new(), true),
        };
        (set, nullable || element.cardinality.is_optional())
    }

    fn call(&self, callee: &RuleRef) -> (TokenSet, bool) {
        let index = callee.id().index();
        match self.kinds[index] {
            RuleKind::Terminal => (TokenSet::single(self.keys.terminal(callee.id())), false),
            RuleKind::Parser | RuleKind::DataType => {
                (self.rule_first[index].clone(), self.rule_nullable[index])
            }
        }
    }

    fn record(&self, element: &Element, first: &mut [TokenSet], nullable: &mut [bool]) {
        let (set, is_nullable) = self.first_of(element);
        first[element.id().index()] = set;
        nullable[element.id().index()] = is_nullable;
        for child in element.children() {
            self.record(child, first, nullable);
        }
    }
}

fn is_valid_rule_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c == '_' || unicode_ident::is_xid_start(c))
        && chars.all(unicode_ident::is_xid_continue)
}

fn visit_elements(element: &Element, visit: &mut impl FnMut(&Element)) {
    visit(element);
    for child in element.children() {
        visit_elements(child, visit);
    }
}

fn has_assignment(element: &Element) -> bool {
    let mut found = false;
    visit_elements(element, &mut |e| {
        found |= matches!(
            e.kind,
            ElementKind::Assignment { .. }
                | ElementKind::CrossReference { .. }
                | ElementKind::Action { .. }
        );
    });
    found
}

fn collect_calls(element: &Element, out: &mut Vec<RuleId>) {
    visit_elements(element, &mut |e| match &e.kind {
        ElementKind::RuleCall(callee) => out.push(callee.id()),
        ElementKind::CrossReference {
            token: Some(token), ..
        } => out.push(token.id()),
        _ => {}
    });
}

fn action_types(element: &Element) -> Vec<SmolStr> {
    let mut out = Vec::new();
    visit_elements(element, &mut |e| {
        if let ElementKind::Action { node_type, .. } = &e.kind {
            out.push(node_type.clone());
        }
    });
    out
}

/// Whether a regex source is one bracket class or one escape, usable
/// inside another class.
fn is_class_pattern(source: &str) -> bool {
    let bytes = source.as_bytes();
    if bytes.len() == 2 && bytes[0] == b'\\' && bytes[1].is_ascii_alphanumeric() {
        return true;
    }
    if bytes.first() != Some(&b'[') {
        return false;
    }
    let mut depth = 0usize;
    let mut escaped = false;
    for (index, byte) in bytes.iter().enumerate() {
        match byte {
            _ if escaped => escaped = false,
            b'\\' => escaped = true,
            b'[' => depth += 1,
            b']' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return index == bytes.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

/// Rule calls outside any assignment.
fn collect_unassigned_calls(element: &Element, out: &mut Vec<RuleId>) {
    match &element.kind {
        ElementKind::RuleCall(callee) => out.push(callee.id()),
        ElementKind::Group(items)
        | ElementKind::Alternatives(items)
        | ElementKind::UnorderedGroup(items) => {
            for item in items {
                collect_unassigned_calls(item, out);
            }
        }
        _ => {}
    }
}

fn collect_terminal_calls(element: &TerminalElement, out: &mut Vec<RuleId>) {
    match &element.kind {
        TerminalKind::RuleCall(callee) => out.push(callee.id()),
        TerminalKind::Group(items) | TerminalKind::Alternatives(items) => {
            for item in items {
                collect_terminal_calls(item, out);
            }
        }
        TerminalKind::Until(inner) | TerminalKind::Negated(inner) => {
            collect_terminal_calls(inner, out)
        }
        _ => {}
    }
}
