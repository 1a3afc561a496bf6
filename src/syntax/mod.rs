//! Syntax trees produced by the parser.
//!
//! - [`Ast`] - index-based arena of typed nodes and cross-reference slots
//! - [`CstPtr`] - link from an AST node to its CST rule node
//! - [`ParseResult`] / [`FlatParse`] - live and worker-transferable parse output

pub mod ast;
pub mod cst;
pub mod parse;

pub use ast::{Ast, AstId, AstNode, Containment, CrossRef, NodeRef, RefId, Resolution, Value};
pub use cst::{CstPtr, leaves};
pub use parse::{CstEvent, FlatParse, MalformedParse, ParseResult};
