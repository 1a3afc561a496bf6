//! Incremental workspace builds.
//!
//! - [`Workspace`] - owns the documents and drives build cycles
//! - [`SharedWorkspace`] - edit/build serialization with cancel-on-edit
//! - [`DependencyGraph`] - declared document dependencies and link order
//! - [`ParserPool`] - off-thread parsing with crash isolation

mod builder;
mod document;
mod graph;
mod language;
mod shared;
mod worker;

pub use builder::{BuildOutcome, BuildReport, PhaseListener, Workspace};
pub use document::{BuildState, Document};
pub use graph::DependencyGraph;
pub use language::{DependencyProvider, Language, NoDependencies};
pub use shared::SharedWorkspace;
pub use worker::{ParseFn, ParserPool, WorkerFailure};
