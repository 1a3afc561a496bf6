//! Lexer and parser error handling.
//!
//! Every error here is recoverable: the lexer and parser record a
//! [`SyntaxError`] and keep going, so a parse always yields a tree.

mod codes;
mod error;

pub use codes::ErrorCode;
pub use error::SyntaxError;
