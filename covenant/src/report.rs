//! Per-call record of what every check phase produced

use crate::contract::CheckOutcome;
use crate::errors::{ContractError, ContractResult, ContractViolation};

/// Outcomes of one level of a (possibly single-level) override chain
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelReport {
    pub name: String,
    pub entry_invariant: CheckOutcome,
    pub precondition: CheckOutcome,
    pub old_values: CheckOutcome,
    pub postcondition: CheckOutcome,
    pub except: CheckOutcome,
    pub exit_invariant: CheckOutcome,
}

impl LevelReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Combined outcomes of one guarded call
///
/// Phases never reached keep the `Skipped` outcome.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallReport {
    pub entry_invariant: CheckOutcome,
    pub precondition: CheckOutcome,
    pub old_values: CheckOutcome,
    pub postcondition: CheckOutcome,
    pub except: CheckOutcome,
    pub exit_invariant: CheckOutcome,
    pub levels: Vec<LevelReport>,
}

impl CallReport {
    pub fn new(level_names: impl IntoIterator<Item = String>) -> Self {
        Self {
            levels: level_names.into_iter().map(LevelReport::new).collect(),
            ..Self::default()
        }
    }

    /// Phase outcomes in check order
    pub fn phases(&self) -> [&CheckOutcome; 6] {
        [
            &self.entry_invariant,
            &self.precondition,
            &self.old_values,
            &self.postcondition,
            &self.except,
            &self.exit_invariant,
        ]
    }

    pub fn violations(&self) -> Vec<&ContractViolation> {
        self.phases()
            .into_iter()
            .filter_map(CheckOutcome::violation)
            .collect()
    }

    pub fn has_failure(&self) -> bool {
        self.phases().into_iter().any(CheckOutcome::is_failure)
    }

    /// The first failure, as an error
    pub fn into_result(self) -> ContractResult<()> {
        for outcome in self.phases() {
            match outcome {
                CheckOutcome::Violated(violation) => {
                    return Err(ContractError::Violation(violation.clone()))
                }
                CheckOutcome::UsageError { error, .. } => return Err(ContractError::Usage(error.clone())),
                _ => {}
            }
        }
        Ok(())
    }
}
