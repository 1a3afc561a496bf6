//! Scope, linking and validation tests

pub mod tests_linking;
pub mod tests_validation;
