//! Contract-related error types

use thiserror::Error;

use crate::contract::{CheckPoint, ContractKind, Operation, Site};

/// Main contract error type
#[derive(Error, Debug)]
pub enum ContractError {
    /// Contract violation surfaced as an error
    #[error("Contract violation: {0}")]
    Violation(#[from] ContractViolation),

    /// Malformed contract declaration or use
    #[error("Contract usage error: {0}")]
    Usage(#[from] UsageError),

    /// Invalid checking configuration
    #[error("Invalid contract configuration: {0}")]
    Config(String),

    /// A process-wide context was installed twice
    #[error("Contract context already installed")]
    ContextAlreadyInstalled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a single check functor did not hold
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CheckFailure {
    /// A `contract_assert!` condition evaluated to false
    #[error("assertion `{code}` failed at {file}:{line}")]
    Assertion {
        code: String,
        file: &'static str,
        line: u32,
    },

    /// A check failed with a free-form message
    #[error("{0}")]
    Message(String),

    /// The functor panicked; the panic was contained at the check boundary
    #[error("check panicked: {0}")]
    Panicked(String),

    /// The functor misused the engine, e.g. read an old value never captured
    #[error(transparent)]
    Usage(#[from] UsageError),
}

/// Malformed registration or misuse of the engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    #[error("postcondition of a function with a result must accept the result")]
    ResultParameterRequired,

    #[error("postcondition of a function without a result must not accept one")]
    ResultParameterNotAllowed,

    #[error("{kind} cannot be declared for a {operation}")]
    NotAllowed {
        kind: ContractKind,
        operation: Operation,
    },

    #[error("subcontracting requires a public function, not a {0}")]
    SubcontractingNotAllowed(Operation),

    #[error("old value `{0}` was never captured")]
    MissingOldValue(String),

    #[error("old value `{id}` is not a `{expected}`")]
    OldValueTypeMismatch { id: String, expected: &'static str },

    #[error("old value `{0}` captured after the guarded body started")]
    CaptureAfterBodyStarted(String),

    #[error("old value `{0}` read before the guarded body finished")]
    ReadBeforeBodyFinished(String),
}

/// Represents a contract violation
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}{} violated in {site}: {failure}", point_label(.point))]
pub struct ContractViolation {
    pub kind: ContractKind,
    pub site: Site,
    /// Entry or exit, for invariants
    pub point: Option<CheckPoint>,
    pub failure: CheckFailure,
}

fn point_label(point: &Option<CheckPoint>) -> String {
    match point {
        Some(point) => format!(" ({})", point),
        None => String::new(),
    }
}

impl ContractViolation {
    /// Name of the guarded operation
    pub fn function_name(&self) -> &str {
        &self.site.name
    }

    /// Index of the subcontract level the violation is attributed to
    pub fn level(&self) -> Option<usize> {
        self.site.level.as_ref().map(|level| level.index)
    }
}

/// Result type for contract operations
pub type ContractResult<T> = Result<T, ContractError>;

#[cfg(test)]
#[path = "errors/errors_tests.rs"]
mod tests;
