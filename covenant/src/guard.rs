//! Guards: the scope-bound state machine that runs a call's checks
//!
//! A guard is built with one of the entry points in this module, given its
//! contract through [`GuardBuilder`], and armed with [`GuardBuilder::check`],
//! which runs the entry checks. The caller then runs the body and leaves
//! through one of the exits:
//!
//! - [`Guard::finish`] returns normally with a result
//! - [`Guard::close`], or dropping the guard, returns normally without one
//! - [`Guard::abandon`], or dropping the guard while panicking, is a
//!   failure exit
//! - [`Guard::call`] picks the exit from the body's `Result`
//!
//! ```text
//! Armed --entry ok--> EntryChecked --exit--> ExitChecked
//!   |                      |
//!   +--failure--> Disarmed <--failure or disarm()
//! ```
//!
//! The first failure disarms the guard, so a broken call is reported once
//! and later checks are skipped.
//!
//! ```
//! use covenant::{contract_assert, guard, Capabilities, CheckResult, ContractContext, ContractResult, Contracted};
//!
//! struct Account {
//!     balance: i64,
//! }
//!
//! impl Contracted for Account {
//!     const CAPABILITIES: Capabilities = Capabilities::NONE.with_instance_invariant();
//!
//!     fn invariant(&self) -> CheckResult {
//!         contract_assert!(self.balance >= 0);
//!         Ok(())
//!     }
//! }
//!
//! impl Account {
//!     fn deposit(&mut self, ctx: &ContractContext, amount: i64) -> ContractResult<()> {
//!         let mut call = guard::public_function::<_, ()>(ctx, "deposit", self)
//!             .precondition(move |_| {
//!                 contract_assert!(amount > 0);
//!                 Ok(())
//!             })
//!             .old(|account, old| {
//!                 old.capture("balance", account.balance)?;
//!                 Ok(())
//!             })
//!             .postcondition_void(move |account, old| {
//!                 contract_assert!(account.balance == old.get::<i64>("balance")? + amount);
//!                 Ok(())
//!             })
//!             .check()?;
//!
//!         if let Some(account) = call.subject_mut() {
//!             account.balance += amount;
//!         }
//!         call.close().into_result()
//!     }
//! }
//!
//! let ctx = ContractContext::default();
//! let mut account = Account { balance: 10 };
//! account.deposit(&ctx, 5).unwrap();
//! assert_eq!(account.balance, 15);
//! ```

use std::any::type_name;
use std::fmt;
use std::mem;
use std::thread;

use tracing::{debug, trace};

use crate::boundary::is_checking;
use crate::conditions::ConditionSet;
use crate::context::ContractContext;
use crate::contract::{
    CheckOutcome, CheckPoint, CheckResult, ContractKind, ExitMode, InvariantScope, Operation, Site,
};
use crate::errors::{ContractError, ContractResult, UsageError};
use crate::invariant::{Contracted, InvariantChecker};
use crate::old_values::OldValues;
use crate::report::CallReport;
use crate::subcontract::{Level, SubcontractCoordinator};

/// Lifecycle of a guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardState {
    /// Built, entry checks not run yet
    Armed,
    /// Entry checks passed, the body may run
    EntryChecked,
    /// Exit checks ran and passed
    ExitChecked,
    /// Inert: a check failed, `disarm()` was called, or checks were suppressed
    Disarmed,
}

enum Subject<'a, T> {
    Shared(&'a T),
    Exclusive(&'a mut T),
}

impl<'a, T> Subject<'a, T> {
    fn get(&self) -> &T {
        match self {
            Subject::Shared(subject) => *subject,
            Subject::Exclusive(subject) => &**subject,
        }
    }

    fn get_mut(&mut self) -> Option<&mut T> {
        match self {
            Subject::Shared(_) => None,
            Subject::Exclusive(subject) => Some(&mut **subject),
        }
    }
}

/// Guard for a free function
pub fn function<'a, R: 'static>(ctx: &'a ContractContext, name: impl Into<String>) -> GuardBuilder<'a, (), R> {
    GuardBuilder::new(ctx, Site::new(Operation::Function, name), Subject::Shared(&()))
}

/// Guard for a private member function; no invariants are checked
pub fn private_function<'a, T, R: 'static>(
    ctx: &'a ContractContext,
    name: impl Into<String>,
    subject: &'a mut T,
) -> GuardBuilder<'a, T, R> {
    GuardBuilder::new(
        ctx,
        Site::new(Operation::PrivateFunction, name),
        Subject::Exclusive(subject),
    )
}

/// Guard for a private member function that only reads `subject`
pub fn private_function_shared<'a, T, R: 'static>(
    ctx: &'a ContractContext,
    name: impl Into<String>,
    subject: &'a T,
) -> GuardBuilder<'a, T, R> {
    GuardBuilder::new(ctx, Site::new(Operation::PrivateFunction, name), Subject::Shared(subject))
}

/// Guard for a public member function that may modify `subject`
///
/// Checks the static and instance invariants of `T` and of every base type
/// it declares. A base type that an override level already checks is left
/// to that level.
pub fn public_function<'a, T, R>(
    ctx: &'a ContractContext,
    name: impl Into<String>,
    subject: &'a mut T,
) -> GuardBuilder<'a, T, R>
where
    T: Contracted + 'static,
    R: 'static,
{
    GuardBuilder::new(
        ctx,
        Site::new(Operation::PublicFunction, name),
        Subject::Exclusive(subject),
    )
    .with_type_invariants()
}

/// Guard for a public member function that only reads `subject`
pub fn public_function_shared<'a, T, R>(
    ctx: &'a ContractContext,
    name: impl Into<String>,
    subject: &'a T,
) -> GuardBuilder<'a, T, R>
where
    T: Contracted + 'static,
    R: 'static,
{
    GuardBuilder::new(ctx, Site::new(Operation::PublicFunction, name), Subject::Shared(subject))
        .with_type_invariants()
}

/// Guard for a public function of `C` that has no instance
pub fn static_public_function<'a, C, R>(ctx: &'a ContractContext, name: impl Into<String>) -> GuardBuilder<'a, (), R>
where
    C: Contracted,
    R: 'static,
{
    let mut builder = GuardBuilder::new(
        ctx,
        Site::new(Operation::StaticPublicFunction, name),
        Subject::Shared(&()),
    );
    builder.invariants = InvariantChecker::statics_of::<C>();
    builder.level_name = type_name::<C>().to_string();
    builder
}

/// Guard for a constructor of `C`
///
/// No instance exists at entry; the constructed value is the guard's
/// result and receives the instance invariant on normal exit.
pub fn constructor<'a, C>(ctx: &'a ContractContext, name: impl Into<String>) -> GuardBuilder<'a, (), C>
where
    C: Contracted + 'static,
{
    let mut builder = GuardBuilder::new(ctx, Site::new(Operation::Constructor, name), Subject::Shared(&()));
    builder.invariants = InvariantChecker::statics_of::<C>();
    builder.result_invariants = InvariantChecker::of();
    builder.level_name = type_name::<C>().to_string();
    builder
}

/// Guard for the destruction of `subject`; preconditions are not allowed
pub fn destructor<'a, T>(ctx: &'a ContractContext, name: impl Into<String>, subject: &'a mut T) -> GuardBuilder<'a, T, ()>
where
    T: Contracted + 'static,
{
    let mut builder = GuardBuilder::new(ctx, Site::new(Operation::Destructor, name), Subject::Exclusive(subject));
    builder.invariants = InvariantChecker::of();
    builder
}

/// Collects the contract of one guarded call
///
/// Registration mistakes are remembered and returned by
/// [`GuardBuilder::check`] before any check runs.
pub struct GuardBuilder<'a, T, R> {
    ctx: &'a ContractContext,
    site: Site,
    subject: Subject<'a, T>,
    level_name: String,
    conditions: ConditionSet<'a, T, R>,
    invariants: InvariantChecker<'a, T>,
    result_invariants: InvariantChecker<'a, R>,
    bases: Vec<Level<'a, T, R>>,
    usage: Option<UsageError>,
}

impl<'a, T, R: 'static> GuardBuilder<'a, T, R> {
    fn new(ctx: &'a ContractContext, site: Site, subject: Subject<'a, T>) -> Self {
        Self {
            ctx,
            site,
            subject,
            level_name: type_name::<T>().to_string(),
            conditions: ConditionSet::new(),
            invariants: InvariantChecker::none(),
            result_invariants: InvariantChecker::none(),
            bases: Vec::new(),
            usage: None,
        }
    }
}

impl<'a, T: Contracted + 'static, R: 'static> GuardBuilder<'a, T, R> {
    fn with_type_invariants(mut self) -> Self {
        self.invariants = InvariantChecker::hierarchy();
        self
    }
}

impl<'a, T, R> GuardBuilder<'a, T, R> {
    fn record_usage(&mut self, error: UsageError) {
        if self.usage.is_none() {
            self.usage = Some(error);
        }
    }

    /// Name of the most-derived level in reports
    pub fn level_name(mut self, name: impl Into<String>) -> Self {
        self.level_name = name.into();
        self
    }

    pub fn precondition<F>(mut self, precondition: F) -> Self
    where
        F: Fn(&T) -> CheckResult + 'a,
    {
        let operation = self.site.operation;
        if operation.allows(ContractKind::Precondition) {
            self.conditions.set_precondition(precondition);
        } else {
            self.record_usage(UsageError::NotAllowed {
                kind: ContractKind::Precondition,
                operation,
            });
        }
        self
    }

    /// Snapshot state before the body runs
    pub fn old<F>(mut self, capture: F) -> Self
    where
        F: Fn(&T, &mut OldValues) -> CheckResult + 'a,
    {
        self.conditions.set_old(capture);
        self
    }

    /// Postcondition of a call with a result
    pub fn postcondition<F>(mut self, postcondition: F) -> Self
    where
        F: Fn(&T, Option<&R>, &OldValues) -> CheckResult + 'a,
    {
        if let Err(error) = self.conditions.set_postcondition(postcondition) {
            self.record_usage(error);
        }
        self
    }

    /// Postcondition of a call without a result
    pub fn postcondition_void<F>(mut self, postcondition: F) -> Self
    where
        F: Fn(&T, &OldValues) -> CheckResult + 'a,
    {
        if let Err(error) = self.conditions.set_postcondition_void(postcondition) {
            self.record_usage(error);
        }
        self
    }

    pub fn except<F>(mut self, except: F) -> Self
    where
        F: Fn(&T, &OldValues) -> CheckResult + 'a,
    {
        self.conditions.set_except(except);
        self
    }

    /// Append an overridden level, next towards the root of the hierarchy
    pub fn base_level(mut self, level: Level<'a, T, R>) -> Self {
        let operation = self.site.operation;
        if operation == Operation::PublicFunction {
            self.bases.push(level);
        } else {
            self.record_usage(UsageError::SubcontractingNotAllowed(operation));
        }
        self
    }

    /// Append the contract of the `B` method this call overrides
    ///
    /// `project` reaches the `B` part of the subject; the level checks the
    /// conditions against it, along with the invariants `B` declares.
    pub fn overrides<B>(self, name: impl Into<String>, project: fn(&T) -> &B, conditions: ConditionSet<'a, B, R>) -> Self
    where
        B: Contracted + 'a,
        T: 'a,
        R: 'a,
    {
        let level = Level::new(name, conditions.lift(project)).with_invariants(InvariantChecker::lifted(project));
        self.base_level(level)
    }

    /// Finish registration and run the entry checks
    ///
    /// Fails without running anything when the contract was declared
    /// incorrectly. Check failures do not fail this call; they go to the
    /// context's handlers and are recorded in the guard's report.
    pub fn check(self) -> ContractResult<Guard<'a, T, R>> {
        let GuardBuilder {
            ctx,
            site,
            subject,
            level_name,
            conditions,
            invariants,
            result_invariants,
            bases,
            usage,
        } = self;

        if let Some(error) = usage {
            debug!(site = %site, error = %error, "contract declared incorrectly");
            return Err(ContractError::Usage(error));
        }

        // Types an override level checks are left to that level
        let covered: Vec<&'static str> = bases
            .iter()
            .flat_map(|base| base.invariants().type_names())
            .collect();
        let level_invariants = invariants.without(&covered);
        let mut coordinator =
            SubcontractCoordinator::new(Level::new(level_name, conditions).with_invariants(level_invariants));
        for base in bases {
            coordinator.push_base(base);
        }

        Ok(Guard::enter(ctx, site, subject, coordinator, result_invariants))
    }
}

/// An armed guard around one call
///
/// Must stay on the thread and in the scope that created it.
pub struct Guard<'a, T, R> {
    ctx: &'a ContractContext,
    site: Site,
    subject: Subject<'a, T>,
    coordinator: SubcontractCoordinator<'a, T, R>,
    result_invariants: InvariantChecker<'a, R>,
    state: GuardState,
    report: CallReport,
}

impl<'a, T, R> Guard<'a, T, R> {
    fn enter(
        ctx: &'a ContractContext,
        site: Site,
        subject: Subject<'a, T>,
        coordinator: SubcontractCoordinator<'a, T, R>,
        result_invariants: InvariantChecker<'a, R>,
    ) -> Self {
        let report = CallReport::new(coordinator.level_names());
        let mut guard = Self {
            ctx,
            site,
            subject,
            coordinator,
            result_invariants,
            state: GuardState::Armed,
            report,
        };

        let config = *ctx.config();
        if config.disable_nested_checks && is_checking() {
            debug!(site = %guard.site, "guard built inside a running check, suppressed");
            guard.state = GuardState::Disarmed;
            return guard;
        }

        trace!(site = %guard.site, levels = guard.coordinator.len(), "entering guarded call");
        let scope = guard.site.operation.invariant_policy().entry;

        if config.enable_invariants && scope != InvariantScope::Nothing {
            let outcome =
                guard
                    .coordinator
                    .check_invariants(guard.subject.get(), CheckPoint::Entry, scope, &guard.site);
            guard.report.entry_invariant = outcome.clone();
            guard.settle(&outcome);
        }

        if guard.is_live() && config.enable_preconditions {
            let outcome = guard.coordinator.check_preconditions(guard.subject.get(), &guard.site);
            guard.report.precondition = outcome.clone();
            guard.settle(&outcome);
        }

        if guard.is_live() && config.captures_old_values() {
            let outcome = guard.coordinator.capture_old_values(guard.subject.get(), &guard.site);
            guard.report.old_values = outcome.clone();
            guard.settle(&outcome);
        }

        guard.coordinator.freeze_old_values();
        if guard.is_live() {
            guard.state = GuardState::EntryChecked;
        }
        guard
    }

    fn is_live(&self) -> bool {
        self.state != GuardState::Disarmed
    }

    /// Record the level outcomes, then route a failed outcome to its
    /// handler; the guard goes inert first
    fn settle(&mut self, outcome: &CheckOutcome) {
        self.report.levels = self.coordinator.reports().to_vec();
        match outcome {
            CheckOutcome::Violated(violation) => {
                debug!(kind = %violation.kind, site = %violation.site, "contract violated");
                self.state = GuardState::Disarmed;
                self.ctx.handlers().report(violation);
            }
            CheckOutcome::UsageError { site, error } => {
                debug!(site = %site, error = %error, "contract misused during check");
                self.state = GuardState::Disarmed;
                self.ctx.handlers().report_usage(site, error);
            }
            CheckOutcome::Satisfied | CheckOutcome::Skipped => {}
        }
    }

    fn exit(&mut self, mode: ExitMode, result: Option<&R>) {
        if self.state != GuardState::EntryChecked {
            return;
        }
        trace!(site = %self.site, mode = ?mode, "leaving guarded call");

        let config = *self.ctx.config();
        let policy = self.site.operation.invariant_policy();
        let scope = match mode {
            ExitMode::Normal => {
                if config.enable_postconditions {
                    let outcome = self
                        .coordinator
                        .check_postconditions(self.subject.get(), result, &self.site);
                    self.report.postcondition = outcome.clone();
                    self.settle(&outcome);
                }
                policy.normal_exit
            }
            ExitMode::Failure => {
                if config.enable_exception_guarantees {
                    let outcome = self.coordinator.check_excepts(self.subject.get(), &self.site);
                    self.report.except = outcome.clone();
                    self.settle(&outcome);
                }
                policy.failure_exit
            }
        };

        if self.is_live() && config.enable_invariants && scope != InvariantScope::Nothing {
            let mut outcome =
                self.coordinator
                    .check_invariants(self.subject.get(), CheckPoint::Exit, scope, &self.site);
            // A constructed result carries the instance invariant
            if outcome.is_satisfied() && scope.includes_instance() && !self.result_invariants.is_empty() {
                outcome = match result {
                    Some(result) => CheckOutcome::from_verdict(
                        self.result_invariants.check_instance(result),
                        ContractKind::Invariant,
                        &self.site,
                        Some(CheckPoint::Exit),
                    ),
                    // Nothing was constructed to check
                    None => CheckOutcome::Skipped,
                };
            }
            self.report.exit_invariant = outcome.clone();
            self.settle(&outcome);
        }

        if self.is_live() {
            self.state = GuardState::ExitChecked;
        }
    }

    /// Normal exit with the call's result
    pub fn finish(mut self, value: R) -> R {
        self.exit(ExitMode::Normal, Some(&value));
        value
    }

    /// Normal exit with the call's result, also returning the report
    pub fn finish_with_report(mut self, value: R) -> (R, CallReport) {
        self.exit(ExitMode::Normal, Some(&value));
        (value, mem::take(&mut self.report))
    }

    /// Normal exit without a result
    pub fn close(mut self) -> CallReport {
        self.exit(ExitMode::Normal, None);
        mem::take(&mut self.report)
    }

    /// Failure exit: exception guarantees instead of postconditions
    pub fn abandon(mut self) -> CallReport {
        self.exit(ExitMode::Failure, None);
        mem::take(&mut self.report)
    }

    /// Run `body` and leave through the exit its result selects
    ///
    /// A panicking body drops the guard during unwinding, which takes the
    /// failure exit.
    pub fn call<E, F>(mut self, body: F) -> Result<R, E>
    where
        F: FnOnce(&mut Self) -> Result<R, E>,
    {
        match body(&mut self) {
            Ok(value) => {
                self.exit(ExitMode::Normal, Some(&value));
                Ok(value)
            }
            Err(error) => {
                self.exit(ExitMode::Failure, None);
                Err(error)
            }
        }
    }

    /// Cancel every remaining check
    pub fn disarm(&mut self) {
        if self.is_live() {
            debug!(site = %self.site, state = ?self.state, "guard disarmed");
            self.state = GuardState::Disarmed;
        }
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    /// Whether a check of this guard failed
    pub fn has_failed(&self) -> bool {
        self.report.has_failure()
    }

    pub fn report(&self) -> &CallReport {
        &self.report
    }

    pub fn site(&self) -> &Site {
        &self.site
    }

    pub fn subject(&self) -> &T {
        self.subject.get()
    }

    /// Mutable access for the body, when the guard was built over `&mut T`
    pub fn subject_mut(&mut self) -> Option<&mut T> {
        self.subject.get_mut()
    }

    /// Number of override levels this call is checked against
    pub fn levels(&self) -> usize {
        self.coordinator.len()
    }
}

impl<'a, T, R> fmt::Debug for Guard<'a, T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard")
            .field("site", &self.site)
            .field("state", &self.state)
            .field("levels", &self.coordinator.level_names())
            .field("report", &self.report)
            .finish_non_exhaustive()
    }
}

impl<'a, T, R> Drop for Guard<'a, T, R> {
    fn drop(&mut self) {
        if self.state == GuardState::EntryChecked {
            let mode = if thread::panicking() {
                ExitMode::Failure
            } else {
                ExitMode::Normal
            };
            self.exit(mode, None);
        }
    }
}

#[cfg(test)]
#[path = "guard/guard_tests.rs"]
mod tests;
