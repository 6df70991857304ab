//! Covenant runtime contract checking
//!
//! This crate checks preconditions, postconditions, class invariants and
//! exception guarantees around guarded calls, and combines the contracts
//! of overridden methods following the subcontracting rules: preconditions
//! may only be weakened, postconditions and invariants only strengthened.
//!
//! A call is guarded by building a [`Guard`] through one of the entry points
//! in [`guard`]. Failures are routed to the [`FailureHandlers`] of the
//! [`ContractContext`] the guard was built against.

pub mod boundary;
pub mod conditions;
pub mod config;
pub mod context;
pub mod contract;
pub mod errors;
pub mod guard;
pub mod handlers;
pub mod invariant;
pub mod old_values;
pub mod report;
pub mod subcontract;

pub use boundary::is_checking;
pub use conditions::{ConditionSet, Postcondition, ResultShape};
pub use config::CheckConfig;
pub use context::ContractContext;
pub use contract::{
    ensure, CheckOutcome, CheckPoint, CheckResult, ContractKind, ExitMode, InvariantPolicy,
    InvariantScope, LevelRef, Operation, Site, Verdict,
};
pub use errors::{CheckFailure, ContractError, ContractResult, ContractViolation, UsageError};
pub use guard::{Guard, GuardBuilder, GuardState};
pub use handlers::{FailureHandler, FailureHandlers, UsageHandler};
pub use invariant::{capabilities_of, BaseType, Capabilities, Contracted, InvariantChecker};
pub use old_values::OldValues;
pub use report::{CallReport, LevelReport};
pub use subcontract::{Level, SubcontractCoordinator};

#[cfg(test)]
mod tests;
