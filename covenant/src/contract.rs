//! Core contract vocabulary
//!
//! This module defines the types shared by every part of the checking
//! engine: what kind of check ran, where it ran, and what came of it.
//!
//! # Check kinds
//!
//! ## Preconditions
//! - Evaluated when the guard is constructed, after the entry invariant
//! - Failure blames the caller
//!
//! ## Postconditions
//! - Evaluated when the guarded call returns normally
//! - May inspect the result (when the call has one) and the old values
//!   captured at entry
//! - Failure blames the implementation
//!
//! ## Invariants
//! - Checked at entry and exit of guarded calls on an instance or type
//! - Failure indicates corrupted object state
//!
//! ## Exception guarantees
//! - Evaluated instead of the postcondition when the guarded call exits
//!   abnormally (error return or panic)

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{CheckFailure, ContractViolation, UsageError};

/// Result returned by every check functor.
pub type CheckResult = Result<(), CheckFailure>;

/// Kinds of contract checks
///
/// Each kind has its own failure handler in [`crate::FailureHandlers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractKind {
    /// Precondition (requires)
    Precondition,

    /// Postcondition (ensures)
    Postcondition,

    /// Class invariant, static or instance
    Invariant,

    /// Exception guarantee, checked on abnormal exit
    ExceptionGuarantee,
}

impl ContractKind {
    /// All kinds, in reporting order
    pub const ALL: [ContractKind; 4] = [
        ContractKind::Precondition,
        ContractKind::Postcondition,
        ContractKind::Invariant,
        ContractKind::ExceptionGuarantee,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContractKind::Precondition => "precondition",
            ContractKind::Postcondition => "postcondition",
            ContractKind::Invariant => "invariant",
            ContractKind::ExceptionGuarantee => "exception guarantee",
        }
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of operation a guard protects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Free function, no invariants
    Function,
    /// Private or protected member function, no invariants
    PrivateFunction,
    /// Public member function, checks static and instance invariants
    PublicFunction,
    /// Public function without a live instance, checks static invariants
    StaticPublicFunction,
    /// Constructor, the constructed value is the guard's result
    Constructor,
    /// Destructor, preconditions are not allowed
    Destructor,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Function => "function",
            Operation::PrivateFunction => "private function",
            Operation::PublicFunction => "public function",
            Operation::StaticPublicFunction => "static public function",
            Operation::Constructor => "constructor",
            Operation::Destructor => "destructor",
        }
    }

    /// Which invariants this operation checks at each check point
    pub fn invariant_policy(&self) -> InvariantPolicy {
        use InvariantScope::{Full, Nothing, StaticOnly};

        match self {
            Operation::Function | Operation::PrivateFunction => InvariantPolicy {
                entry: Nothing,
                normal_exit: Nothing,
                failure_exit: Nothing,
            },
            Operation::PublicFunction => InvariantPolicy {
                entry: Full,
                normal_exit: Full,
                failure_exit: Full,
            },
            Operation::StaticPublicFunction => InvariantPolicy {
                entry: StaticOnly,
                normal_exit: StaticOnly,
                failure_exit: StaticOnly,
            },
            // No instance exists before the body or after a failed body.
            Operation::Constructor => InvariantPolicy {
                entry: StaticOnly,
                normal_exit: Full,
                failure_exit: StaticOnly,
            },
            // A destroyed object has no instance invariant left to hold.
            Operation::Destructor => InvariantPolicy {
                entry: Full,
                normal_exit: StaticOnly,
                failure_exit: Full,
            },
        }
    }

    /// Whether a check of `kind` may be declared for this operation
    pub fn allows(&self, kind: ContractKind) -> bool {
        !matches!(
            (self, kind),
            (Operation::Destructor, ContractKind::Precondition)
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which invariants run at a check point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvariantScope {
    Nothing,
    StaticOnly,
    Full,
}

impl InvariantScope {
    pub fn includes_instance(&self) -> bool {
        matches!(self, InvariantScope::Full)
    }

    pub fn includes_static(&self) -> bool {
        !matches!(self, InvariantScope::Nothing)
    }
}

/// Invariant scopes for the three check points of a guarded call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InvariantPolicy {
    pub entry: InvariantScope,
    pub normal_exit: InvariantScope,
    pub failure_exit: InvariantScope,
}

/// Where in the call an invariant was checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckPoint {
    Entry,
    Exit,
}

impl fmt::Display for CheckPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckPoint::Entry => f.write_str("entry"),
            CheckPoint::Exit => f.write_str("exit"),
        }
    }
}

/// How the guarded body left its scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitMode {
    /// Returned normally, postconditions apply
    Normal,
    /// Returned an error or panicked, exception guarantees apply
    Failure,
}

/// A level in a subcontracting chain, 0 being the most-derived override
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LevelRef {
    pub index: usize,
    pub name: String,
}

/// Identifies the guarded operation a check belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Site {
    pub operation: Operation,
    pub name: String,
    /// Set for checks attributed to one level of a subcontracted call
    pub level: Option<LevelRef>,
}

impl Site {
    pub fn new(operation: Operation, name: impl Into<String>) -> Self {
        Self {
            operation,
            name: name.into(),
            level: None,
        }
    }

    /// The same site, attributed to one level of the override chain
    pub fn at_level(&self, index: usize, name: &str) -> Self {
        Self {
            operation: self.operation,
            name: self.name.clone(),
            level: Some(LevelRef {
                index,
                name: name.to_string(),
            }),
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} `{}`", self.operation, self.name)?;
        if let Some(level) = &self.level {
            write!(f, " (level {}: `{}`)", level.index, level.name)?;
        }
        Ok(())
    }
}

/// Result of invoking one collaborator check
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Nothing was declared, so nothing could fail
    Vacuous,
    /// The check ran and held
    Held,
    /// The check ran and failed
    Failed(CheckFailure),
}

impl Verdict {
    pub fn is_failure(&self) -> bool {
        matches!(self, Verdict::Failed(_))
    }

    /// Conjunction: the first failure wins, otherwise `Held` beats `Vacuous`
    pub fn and(self, next: impl FnOnce() -> Verdict) -> Verdict {
        match self {
            Verdict::Failed(_) => self,
            Verdict::Vacuous => next(),
            Verdict::Held => match next() {
                Verdict::Vacuous => Verdict::Held,
                other => other,
            },
        }
    }
}

/// Outcome of one check phase of a guarded call
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CheckOutcome {
    Satisfied,
    Violated(ContractViolation),
    /// Disabled by configuration, not reached, or short-circuited
    #[default]
    Skipped,
    /// The check itself was malformed (e.g. read a missing old value)
    UsageError { site: Site, error: UsageError },
}

impl CheckOutcome {
    pub(crate) fn from_verdict(
        verdict: Verdict,
        kind: ContractKind,
        site: &Site,
        point: Option<CheckPoint>,
    ) -> Self {
        match verdict {
            Verdict::Vacuous | Verdict::Held => CheckOutcome::Satisfied,
            Verdict::Failed(CheckFailure::Usage(error)) => CheckOutcome::UsageError {
                site: site.clone(),
                error,
            },
            Verdict::Failed(failure) => CheckOutcome::Violated(ContractViolation {
                kind,
                site: site.clone(),
                point,
                failure,
            }),
        }
    }

    pub fn is_satisfied(&self) -> bool {
        matches!(self, CheckOutcome::Satisfied)
    }

    pub fn is_violated(&self) -> bool {
        matches!(self, CheckOutcome::Violated(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, CheckOutcome::Skipped)
    }

    pub fn is_usage_error(&self) -> bool {
        matches!(self, CheckOutcome::UsageError { .. })
    }

    /// True for outcomes that stop the guard
    pub fn is_failure(&self) -> bool {
        self.is_violated() || self.is_usage_error()
    }

    pub fn violation(&self) -> Option<&ContractViolation> {
        match self {
            CheckOutcome::Violated(violation) => Some(violation),
            _ => None,
        }
    }
}

/// Turn a boolean into a check result carrying `message` on failure
pub fn ensure(condition: bool, message: impl Into<String>) -> CheckResult {
    if condition {
        Ok(())
    } else {
        Err(CheckFailure::Message(message.into()))
    }
}

/// Assert a condition inside a check functor
///
/// Returns early from the enclosing functor with a [`CheckFailure`] naming
/// the failed expression and its location.
///
/// ```
/// use covenant::{contract_assert, CheckResult};
///
/// fn positive(x: i64) -> CheckResult {
///     contract_assert!(x > 0);
///     contract_assert!(x < 100, "x = {} out of range", x);
///     Ok(())
/// }
///
/// assert!(positive(5).is_ok());
/// assert!(positive(-5).is_err());
/// ```
#[macro_export]
macro_rules! contract_assert {
    ($cond:expr $(,)?) => {
        if !($cond) {
            return ::std::result::Result::Err($crate::CheckFailure::Assertion {
                code: ::std::string::String::from(stringify!($cond)),
                file: file!(),
                line: line!(),
            });
        }
    };
    ($cond:expr, $($arg:tt)+) => {
        if !($cond) {
            return ::std::result::Result::Err($crate::CheckFailure::Message(format!($($arg)+)));
        }
    };
}
