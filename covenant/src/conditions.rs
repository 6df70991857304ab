//! Condition sets: the per-level storage for contract functors
//!
//! A [`ConditionSet`] owns at most one precondition, one old-value capture,
//! one postcondition and one exception guarantee. It knows nothing about
//! invariants or subcontracting; it stores functors and invokes them
//! behind the isolation boundary.
//!
//! The postcondition shape is fixed when the set is created: a set for a
//! call with a result only accepts postconditions taking the result, a set
//! for a call without one only accepts postconditions that do not.

use std::any::TypeId;
use std::fmt;

use crate::boundary::run_isolated;
use crate::contract::{CheckResult, Verdict};
use crate::errors::UsageError;
use crate::old_values::OldValues;

pub type Precondition<'f, T> = Box<dyn Fn(&T) -> CheckResult + 'f>;
pub type OldCapture<'f, T> = Box<dyn Fn(&T, &mut OldValues) -> CheckResult + 'f>;
pub type ExceptGuarantee<'f, T> = Box<dyn Fn(&T, &OldValues) -> CheckResult + 'f>;

/// A postcondition in one of the two legal shapes
pub enum Postcondition<'f, T, R> {
    WithResult(Box<dyn Fn(&T, Option<&R>, &OldValues) -> CheckResult + 'f>),
    NoResult(Box<dyn Fn(&T, &OldValues) -> CheckResult + 'f>),
}

/// Whether the guarded call produces a result for its postcondition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultShape {
    WithResult,
    NoResult,
}

impl ResultShape {
    /// `NoResult` for `()`, `WithResult` for everything else
    pub fn of<R: 'static>() -> Self {
        if TypeId::of::<R>() == TypeId::of::<()>() {
            ResultShape::NoResult
        } else {
            ResultShape::WithResult
        }
    }
}

/// Contract functors for one level of a guarded call
pub struct ConditionSet<'f, T, R> {
    shape: ResultShape,
    precondition: Option<Precondition<'f, T>>,
    old: Option<OldCapture<'f, T>>,
    postcondition: Option<Postcondition<'f, T, R>>,
    except: Option<ExceptGuarantee<'f, T>>,
}

impl<'f, T, R: 'static> ConditionSet<'f, T, R> {
    pub fn new() -> Self {
        Self {
            shape: ResultShape::of::<R>(),
            precondition: None,
            old: None,
            postcondition: None,
            except: None,
        }
    }
}

impl<'f, T, R: 'static> Default for ConditionSet<'f, T, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'f, T, R> ConditionSet<'f, T, R> {
    pub fn shape(&self) -> ResultShape {
        self.shape
    }

    pub fn set_precondition<F>(&mut self, precondition: F)
    where
        F: Fn(&T) -> CheckResult + 'f,
    {
        self.precondition = Some(Box::new(precondition));
    }

    pub fn set_old<F>(&mut self, capture: F)
    where
        F: Fn(&T, &mut OldValues) -> CheckResult + 'f,
    {
        self.old = Some(Box::new(capture));
    }

    /// Register a postcondition that inspects the call's result
    pub fn set_postcondition<F>(&mut self, postcondition: F) -> Result<(), UsageError>
    where
        F: Fn(&T, Option<&R>, &OldValues) -> CheckResult + 'f,
    {
        if self.shape == ResultShape::NoResult {
            return Err(UsageError::ResultParameterNotAllowed);
        }
        self.postcondition = Some(Postcondition::WithResult(Box::new(postcondition)));
        Ok(())
    }

    /// Register a postcondition for a call without a result
    pub fn set_postcondition_void<F>(&mut self, postcondition: F) -> Result<(), UsageError>
    where
        F: Fn(&T, &OldValues) -> CheckResult + 'f,
    {
        if self.shape == ResultShape::WithResult {
            return Err(UsageError::ResultParameterRequired);
        }
        self.postcondition = Some(Postcondition::NoResult(Box::new(postcondition)));
        Ok(())
    }

    pub fn set_except<F>(&mut self, except: F)
    where
        F: Fn(&T, &OldValues) -> CheckResult + 'f,
    {
        self.except = Some(Box::new(except));
    }

    pub fn has_precondition(&self) -> bool {
        self.precondition.is_some()
    }

    pub fn has_old(&self) -> bool {
        self.old.is_some()
    }

    pub fn has_postcondition(&self) -> bool {
        self.postcondition.is_some()
    }

    pub fn has_except(&self) -> bool {
        self.except.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !(self.has_precondition() || self.has_old() || self.has_postcondition() || self.has_except())
    }

    pub fn check_precondition(&self, subject: &T) -> Verdict {
        match &self.precondition {
            Some(precondition) => run_isolated(|| precondition(subject)),
            None => Verdict::Vacuous,
        }
    }

    pub fn capture_old(&self, subject: &T, old: &mut OldValues) -> Verdict {
        match &self.old {
            Some(capture) => run_isolated(|| capture(subject, old)),
            None => Verdict::Vacuous,
        }
    }

    /// `result` is `None` for calls without a result or whose result was
    /// never produced
    pub fn check_postcondition(&self, subject: &T, result: Option<&R>, old: &OldValues) -> Verdict {
        match &self.postcondition {
            Some(Postcondition::WithResult(postcondition)) => {
                run_isolated(|| postcondition(subject, result, old))
            }
            Some(Postcondition::NoResult(postcondition)) => run_isolated(|| postcondition(subject, old)),
            None => Verdict::Vacuous,
        }
    }

    pub fn check_except(&self, subject: &T, old: &OldValues) -> Verdict {
        match &self.except {
            Some(except) => run_isolated(|| except(subject, old)),
            None => Verdict::Vacuous,
        }
    }

    /// Re-target every functor at a `U` that contains this set's `T`
    ///
    /// Used to place a base type's conditions into a derived type's
    /// subcontracting chain.
    pub fn lift<U>(self, project: fn(&U) -> &T) -> ConditionSet<'f, U, R>
    where
        T: 'f,
        U: 'f,
        R: 'f,
    {
        let precondition = self.precondition.map(|precondition| -> Precondition<'f, U> {
            Box::new(move |derived: &U| precondition(project(derived)))
        });
        let old = self.old.map(|capture| -> OldCapture<'f, U> {
            Box::new(move |derived: &U, old: &mut OldValues| capture(project(derived), old))
        });
        let postcondition = self
            .postcondition
            .map(|postcondition| -> Postcondition<'f, U, R> {
                match postcondition {
                    Postcondition::WithResult(postcondition) => Postcondition::WithResult(Box::new(
                        move |derived: &U, result: Option<&R>, old: &OldValues| {
                            postcondition(project(derived), result, old)
                        },
                    )),
                    Postcondition::NoResult(postcondition) => Postcondition::NoResult(Box::new(
                        move |derived: &U, old: &OldValues| postcondition(project(derived), old),
                    )),
                }
            });
        let except = self.except.map(|except| -> ExceptGuarantee<'f, U> {
            Box::new(move |derived: &U, old: &OldValues| except(project(derived), old))
        });

        ConditionSet {
            shape: self.shape,
            precondition,
            old,
            postcondition,
            except,
        }
    }
}

impl<'f, T, R> fmt::Debug for ConditionSet<'f, T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionSet")
            .field("shape", &self.shape)
            .field("precondition", &self.has_precondition())
            .field("old", &self.has_old())
            .field("postcondition", &self.has_postcondition())
            .field("except", &self.has_except())
            .finish()
    }
}

#[cfg(test)]
#[path = "conditions/conditions_tests.rs"]
mod tests;
