//! Foundation types for the strand toolchain.
//!
//! This module provides fundamental types used throughout the engine:
//! - [`DocumentId`] - Stable per-workspace document identifiers
//! - [`TextRange`], [`TextSize`] - Source positions (byte offsets)
//! - [`LineIndex`] - Offset to line/column conversion
//! - [`Position`], [`Span`] - Line/column positions for tokens, nodes and diagnostics
//!
//! This module has NO dependencies on other strand modules.

mod document_id;
mod line_index;
mod position;

pub use document_id::DocumentId;
pub use line_index::LineIndex;
pub use position::{Position, Span};

pub use text_size::{TextRange, TextSize};
