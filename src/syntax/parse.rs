//! Parse results and their worker-transferable form.
//!
//! A [`ParseResult`] holds a live rowan green tree. Green trees are not meant
//! to cross thread boundaries by serialization, so a parse produced on a
//! worker travels as a [`FlatParse`]: the CST as a flat event list plus the
//! AST arena (already index-based). [`FlatParse::hydrate`] rebuilds the
//! green tree on the receiving side.

use rowan::{GreenNode, GreenNodeBuilder, NodeOrToken, WalkEvent};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parser::{SyntaxError, SyntaxNode};

use super::ast::Ast;

#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult {
    green: GreenNode,
    pub ast: Ast,
    pub lex_errors: Vec<SyntaxError>,
    pub parse_errors: Vec<SyntaxError>,
}

impl ParseResult {
    pub(crate) fn new(
        green: GreenNode,
        ast: Ast,
        lex_errors: Vec<SyntaxError>,
        parse_errors: Vec<SyntaxError>,
    ) -> Self {
        Self {
            green,
            ast,
            lex_errors,
            parse_errors,
        }
    }

    pub fn green(&self) -> &GreenNode {
        &self.green
    }

    /// Root of the CST. Cheap: wraps the shared green tree.
    pub fn syntax(&self) -> SyntaxNode {
        SyntaxNode::new_root(self.green.clone())
    }

    /// Lexer errors followed by parser errors.
    pub fn errors(&self) -> impl Iterator<Item = &SyntaxError> {
        self.lex_errors.iter().chain(&self.parse_errors)
    }

    pub fn has_errors(&self) -> bool {
        !self.lex_errors.is_empty() || !self.parse_errors.is_empty()
    }

    pub fn flatten(&self) -> FlatParse {
        let mut events = Vec::new();
        for event in self.syntax().preorder_with_tokens() {
            match event {
                WalkEvent::Enter(NodeOrToken::Node(node)) => events.push(CstEvent::Start {
                    kind: node.kind().to_raw(),
                }),
                WalkEvent::Enter(NodeOrToken::Token(token)) => events.push(CstEvent::Token {
                    kind: token.kind().to_raw(),
                    text: token.text().to_string(),
                }),
                WalkEvent::Leave(NodeOrToken::Node(_)) => events.push(CstEvent::Finish),
                WalkEvent::Leave(NodeOrToken::Token(_)) => {}
            }
        }
        FlatParse {
            events,
            ast: self.ast.clone(),
            lex_errors: self.lex_errors.clone(),
            parse_errors: self.parse_errors.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CstEvent {
    Start { kind: u16 },
    Token { kind: u16, text: String },
    Finish,
}

/// Reference-free parse result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatParse {
    pub events: Vec<CstEvent>,
    pub ast: Ast,
    pub lex_errors: Vec<SyntaxError>,
    pub parse_errors: Vec<SyntaxError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedParse {
    #[error("CST event list does not start with a node")]
    MissingRoot,
    #[error("CST event {index} closes a node that was never opened")]
    UnbalancedFinish { index: usize },
    #[error("CST event {index} appears after the root node was closed")]
    TrailingEvent { index: usize },
    #[error("CST event list leaves {open} node(s) open")]
    Unclosed { open: usize },
}

impl FlatParse {
    /// Rebuilds the live tree; validates nesting first so the builder never panics.
    pub fn hydrate(self) -> Result<ParseResult, MalformedParse> {
        self.check_nesting()?;
        let mut builder = GreenNodeBuilder::new();
        for event in &self.events {
            match event {
                CstEvent::Start { kind } => builder.start_node(rowan::SyntaxKind(*kind)),
                CstEvent::Token { kind, text } => builder.token(rowan::SyntaxKind(*kind), text),
                CstEvent::Finish => builder.finish_node(),
            }
        }
        Ok(ParseResult::new(
            builder.finish(),
            self.ast,
            self.lex_errors,
            self.parse_errors,
        ))
    }

    fn check_nesting(&self) -> Result<(), MalformedParse> {
        if !matches!(self.events.first(), Some(CstEvent::Start { .. })) {
            return Err(MalformedParse::MissingRoot);
        }
        let mut depth = 0usize;
        for (index, event) in self.events.iter().enumerate() {
            if depth == 0 && index > 0 {
                return Err(MalformedParse::TrailingEvent { index });
            }
            match event {
                CstEvent::Start { .. } => depth += 1,
                CstEvent::Token { .. } => {}
                CstEvent::Finish => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or(MalformedParse::UnbalancedFinish { index })?;
                }
            }
        }
        match depth {
            0 => Ok(()),
            open => Err(MalformedParse::Unclosed { open }),
        }
    }
}
