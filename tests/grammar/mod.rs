//! Grammar compilation tests

pub mod tests_bootstrap;
pub mod tests_compile;
