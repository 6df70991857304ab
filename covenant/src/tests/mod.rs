//! Scenario tests for guarded calls

#[cfg(test)]
pub(crate) mod support;

#[cfg(test)]
mod override_tests;
