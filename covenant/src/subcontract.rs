//! Subcontracting: combining contracts along an override chain
//!
//! A virtual call is checked against every override level that declares a
//! contract, ordered most-derived first. Levels live in one vector and are
//! addressed by index; the order is fixed when the chain is built.
//!
//! Combination rules:
//! - Preconditions are OR-ed. Evaluation stops at the first level that
//!   holds; the remaining levels stay `Skipped`. An override may only
//!   widen what callers are allowed to pass.
//! - Postconditions, exception guarantees and invariants are AND-ed.
//!   Evaluation stops at the first level that fails, so a violation is
//!   attributed to exactly one level. An override may only add guarantees.
//! - A level that declares nothing is vacuously satisfied.
//! - Each level owns its old values. A base postcondition sees what the
//!   base captured and nothing else.
//!
//! A non-virtual call is a chain of one level; the rules then reduce to
//! checking that level.

use crate::contract::{CheckOutcome, CheckPoint, ContractKind, InvariantScope, Site, Verdict};
use crate::conditions::ConditionSet;
use crate::invariant::InvariantChecker;
use crate::old_values::OldValues;
use crate::report::LevelReport;

/// The contract bundle of one override level
pub struct Level<'f, T, R> {
    name: String,
    conditions: ConditionSet<'f, T, R>,
    invariants: InvariantChecker<'f, T>,
    old: OldValues,
}

impl<'f, T, R> Level<'f, T, R> {
    pub fn new(name: impl Into<String>, conditions: ConditionSet<'f, T, R>) -> Self {
        Self {
            name: name.into(),
            conditions,
            invariants: InvariantChecker::none(),
            old: OldValues::new(),
        }
    }

    pub fn with_invariants(mut self, invariants: InvariantChecker<'f, T>) -> Self {
        self.invariants = invariants;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn invariants(&self) -> &InvariantChecker<'f, T> {
        &self.invariants
    }

    /// Old values captured by this level only
    pub fn old_values(&self) -> &OldValues {
        &self.old
    }
}

/// Walks an override chain and combines per-level outcomes
///
/// Keeps one [`LevelReport`] per level, updated by every check.
pub struct SubcontractCoordinator<'f, T, R> {
    levels: Vec<Level<'f, T, R>>,
    reports: Vec<LevelReport>,
}

impl<'f, T, R> SubcontractCoordinator<'f, T, R> {
    /// Start a chain at the most-derived override
    pub fn new(most_derived: Level<'f, T, R>) -> Self {
        Self {
            reports: vec![LevelReport::new(most_derived.name.clone())],
            levels: vec![most_derived],
        }
    }

    /// Append the next level towards the root of the hierarchy
    pub fn push_base(&mut self, level: Level<'f, T, R>) {
        self.reports.push(LevelReport::new(level.name.clone()));
        self.levels.push(level);
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn is_subcontracted(&self) -> bool {
        self.levels.len() > 1
    }

    pub fn level(&self, index: usize) -> Option<&Level<'f, T, R>> {
        self.levels.get(index)
    }

    pub fn level_names(&self) -> Vec<String> {
        self.levels.iter().map(|level| level.name.clone()).collect()
    }

    /// Outcomes recorded so far, one per level, in chain order
    pub fn reports(&self) -> &[LevelReport] {
        &self.reports
    }

    /// Disjunction, most-derived first, stopping at the first level that holds
    ///
    /// When no level holds, the violation of the last level evaluated (the
    /// root-most one) is returned.
    pub fn check_preconditions(&mut self, subject: &T, site: &Site) -> CheckOutcome {
        let subcontracted = self.is_subcontracted();
        let mut last = CheckOutcome::Skipped;
        for (index, (level, report)) in self.levels.iter().zip(self.reports.iter_mut()).enumerate() {
            let verdict = level.conditions.check_precondition(subject);
            let level_site = site_for(site, subcontracted, index, &level.name);
            let outcome = CheckOutcome::from_verdict(verdict, ContractKind::Precondition, &level_site, None);
            report.precondition = outcome.clone();
            match outcome {
                CheckOutcome::Satisfied => return CheckOutcome::Satisfied,
                CheckOutcome::UsageError { .. } => return outcome,
                _ => last = outcome,
            }
        }
        last
    }

    /// Run every level's old-value functor against its own bag, then seal
    /// the bags
    ///
    /// A capture failure is a postcondition failure of that level.
    pub fn capture_old_values(&mut self, subject: &T, site: &Site) -> CheckOutcome {
        let subcontracted = self.is_subcontracted();
        let mut combined = CheckOutcome::Satisfied;
        for (index, (level, report)) in self.levels.iter_mut().zip(self.reports.iter_mut()).enumerate() {
            let verdict = level.conditions.capture_old(subject, &mut level.old);
            let level_site = site_for(site, subcontracted, index, &level.name);
            let outcome = CheckOutcome::from_verdict(verdict, ContractKind::Postcondition, &level_site, None);
            report.old_values = outcome.clone();
            if outcome.is_failure() {
                combined = outcome;
                break;
            }
        }
        self.freeze_old_values();
        combined
    }

    /// Seal every level's old values so reads become legal
    pub fn freeze_old_values(&mut self) {
        for level in &mut self.levels {
            level.old.freeze();
        }
    }

    /// Conjunction, most-derived first, stopping at the first failure
    pub fn check_postconditions(&mut self, subject: &T, result: Option<&R>, site: &Site) -> CheckOutcome {
        self.conjunction(
            site,
            ContractKind::Postcondition,
            None,
            |report| &mut report.postcondition,
            |level| level.conditions.check_postcondition(subject, result, &level.old),
        )
    }

    /// Conjunction of every level's exception guarantee
    pub fn check_excepts(&mut self, subject: &T, site: &Site) -> CheckOutcome {
        self.conjunction(
            site,
            ContractKind::ExceptionGuarantee,
            None,
            |report| &mut report.except,
            |level| level.conditions.check_except(subject, &level.old),
        )
    }

    /// Conjunction of every level's invariants within `scope`
    pub fn check_invariants(
        &mut self,
        subject: &T,
        point: CheckPoint,
        scope: InvariantScope,
        site: &Site,
    ) -> CheckOutcome {
        let slot: fn(&mut LevelReport) -> &mut CheckOutcome = match point {
            CheckPoint::Entry => |report| &mut report.entry_invariant,
            CheckPoint::Exit => |report| &mut report.exit_invariant,
        };
        self.conjunction(
            site,
            ContractKind::Invariant,
            Some(point),
            slot,
            |level| level.invariants.check(subject, scope),
        )
    }

    fn conjunction<F>(
        &mut self,
        site: &Site,
        kind: ContractKind,
        point: Option<CheckPoint>,
        slot: fn(&mut LevelReport) -> &mut CheckOutcome,
        mut evaluate: F,
    ) -> CheckOutcome
    where
        F: FnMut(&Level<'f, T, R>) -> Verdict,
    {
        let subcontracted = self.is_subcontracted();
        for (index, (level, report)) in self.levels.iter().zip(self.reports.iter_mut()).enumerate() {
            let level_site = site_for(site, subcontracted, index, &level.name);
            let outcome = CheckOutcome::from_verdict(evaluate(level), kind, &level_site, point);
            *slot(report) = outcome.clone();
            if outcome.is_failure() {
                return outcome;
            }
        }
        CheckOutcome::Satisfied
    }
}

/// Attribute `site` to a level only when there is more than one
fn site_for(site: &Site, subcontracted: bool, index: usize, name: &str) -> Site {
    if subcontracted {
        site.at_level(index, name)
    } else {
        site.clone()
    }
}

#[cfg(test)]
#[path = "subcontract/subcontract_tests.rs"]
mod tests;
