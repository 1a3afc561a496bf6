//! Workspace build tests
//!
//! - Document lifecycle and build states
//! - Invalidation after edits, opens and closes
//! - Cancellation between phases
//! - Off-thread parsing

pub mod tests_cancellation;
pub mod tests_invalidation;
pub mod tests_lifecycle;
pub mod tests_workers;
