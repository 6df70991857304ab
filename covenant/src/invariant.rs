//! Class invariants and the capability interface contracted types expose
//!
//! A contracted type implements [`Contracted`] and states through
//! [`Capabilities`] which of its members the engine should call. Nothing
//! declared means nothing checked: an [`InvariantChecker`] over a type with
//! no declared invariants reports [`Verdict::Vacuous`].
//!
//! Invariants may run on partially constructed or partially destroyed
//! objects (around constructors and destructors). Failures there are
//! reported like any other failure.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::boundary::run_isolated;
use crate::contract::{CheckResult, InvariantScope, Verdict};

/// What a contracted type declares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub instance_invariant: bool,
    pub static_invariant: bool,
    pub base_types: bool,
}

impl Capabilities {
    pub const NONE: Capabilities = Capabilities {
        instance_invariant: false,
        static_invariant: false,
        base_types: false,
    };

    pub const fn with_instance_invariant(mut self) -> Self {
        self.instance_invariant = true;
        self
    }

    pub const fn with_static_invariant(mut self) -> Self {
        self.static_invariant = true;
        self
    }

    pub const fn with_base_types(mut self) -> Self {
        self.base_types = true;
        self
    }
}

/// Capability interface for types whose operations carry contracts
///
/// ```
/// use covenant::{contract_assert, Capabilities, CheckResult, Contracted};
///
/// struct Account {
///     balance: i64,
/// }
///
/// impl Contracted for Account {
///     const CAPABILITIES: Capabilities = Capabilities::NONE.with_instance_invariant();
///
///     fn invariant(&self) -> CheckResult {
///         contract_assert!(self.balance >= 0);
///         Ok(())
///     }
/// }
/// ```
pub trait Contracted {
    const CAPABILITIES: Capabilities = Capabilities::NONE;

    /// Instance invariant, called only when declared in `CAPABILITIES`
    fn invariant(&self) -> CheckResult {
        Ok(())
    }

    /// Static invariant, called only when declared in `CAPABILITIES`
    fn static_invariant() -> CheckResult
    where
        Self: Sized,
    {
        Ok(())
    }

    /// Direct base types, most-derived first
    fn base_types() -> Vec<BaseType<Self>>
    where
        Self: Sized,
    {
        Vec::new()
    }
}

impl Contracted for () {}

/// Capability probe: what `T` declares
pub fn capabilities_of<T: Contracted>() -> Capabilities {
    T::CAPABILITIES
}

/// A base type of `T`, reached through a projection
///
/// Carries the base's own invariants and, recursively, its own bases.
pub struct BaseType<T> {
    name: &'static str,
    capabilities: Capabilities,
    instance: Rc<dyn Fn(&T) -> CheckResult>,
    statics: fn() -> CheckResult,
    bases: Vec<BaseType<T>>,
}

impl<T: 'static> BaseType<T> {
    /// Declare `B` as a base of `T`, reachable through `project`
    pub fn of<B>(project: fn(&T) -> &B) -> Self
    where
        B: Contracted + 'static,
    {
        Self {
            name: std::any::type_name::<B>(),
            capabilities: B::CAPABILITIES,
            instance: Rc::new(move |derived: &T| project(derived).invariant()),
            statics: B::static_invariant,
            bases: B::base_types()
                .into_iter()
                .map(|base| base.lift(project))
                .collect(),
        }
    }

    fn lift<U: 'static>(self, project: fn(&U) -> &T) -> BaseType<U> {
        let instance = self.instance;
        BaseType {
            name: self.name,
            capabilities: self.capabilities,
            instance: Rc::new(move |derived: &U| instance(project(derived))),
            statics: self.statics,
            bases: self
                .bases
                .into_iter()
                .map(|base| base.lift(project))
                .collect(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// This base followed by its ancestors, depth-first
    fn flatten<'b>(&'b self, into: &mut Vec<&'b BaseType<T>>) {
        into.push(self);
        for base in &self.bases {
            base.flatten(into);
        }
    }
}

struct InvariantEntry<'f, X> {
    type_name: &'static str,
    instance: Option<Rc<dyn Fn(&X) -> CheckResult + 'f>>,
    statics: Option<fn() -> CheckResult>,
}

/// Invokes the static and instance invariants of one or more types
///
/// Entries are checked in order (most-derived first); the first failure
/// stops the check.
pub struct InvariantChecker<'f, X> {
    entries: Vec<InvariantEntry<'f, X>>,
}

impl<'f, X> InvariantChecker<'f, X> {
    /// A checker with nothing to check
    pub fn none() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Static invariant of `C`, for guards without a live `C` instance
    pub fn statics_of<C: Contracted>() -> Self {
        let mut checker = Self::none();
        if C::CAPABILITIES.static_invariant {
            checker.entries.push(InvariantEntry {
                type_name: std::any::type_name::<C>(),
                instance: None,
                statics: Some(C::static_invariant),
            });
        }
        checker
    }

    /// A checker around an arbitrary instance predicate
    pub fn from_fn<F>(type_name: &'static str, invariant: F) -> Self
    where
        F: Fn(&X) -> CheckResult + 'f,
    {
        Self {
            entries: vec![InvariantEntry {
                type_name,
                instance: Some(Rc::new(invariant)),
                statics: None,
            }],
        }
    }

    /// Own invariants of `B`, checked on the `B` reached through `project`
    pub fn lifted<B>(project: fn(&X) -> &B) -> Self
    where
        B: Contracted,
        X: 'f,
        B: 'f,
    {
        let caps = B::CAPABILITIES;
        let mut checker = Self::none();
        if caps.instance_invariant || caps.static_invariant {
            let instance: Option<Rc<dyn Fn(&X) -> CheckResult + 'f>> = if caps.instance_invariant {
                Some(Rc::new(move |derived: &X| project(derived).invariant()))
            } else {
                None
            };
            checker.entries.push(InvariantEntry {
                type_name: std::any::type_name::<B>(),
                instance,
                statics: caps.static_invariant.then_some(B::static_invariant as fn() -> CheckResult),
            });
        }
        checker
    }

    /// Names of the types this checker covers, in check order
    pub fn type_names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|entry| entry.type_name).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop the entries of the named types
    pub fn without(mut self, type_names: &[&str]) -> Self {
        self.entries.retain(|entry| !type_names.contains(&entry.type_name));
        self
    }

    /// Check every static invariant
    pub fn check_static(&self) -> Verdict {
        self.entries.iter().fold(Verdict::Vacuous, |verdict, entry| {
            verdict.and(|| match entry.statics {
                Some(statics) => run_isolated(statics),
                None => Verdict::Vacuous,
            })
        })
    }

    /// Check every instance invariant on `subject`
    pub fn check_instance(&self, subject: &X) -> Verdict {
        self.entries.iter().fold(Verdict::Vacuous, |verdict, entry| {
            verdict.and(|| match &entry.instance {
                Some(instance) => run_isolated(|| instance(subject)),
                None => Verdict::Vacuous,
            })
        })
    }

    /// Static invariants, then instance invariants, as far as `scope` allows
    pub fn check(&self, subject: &X, scope: InvariantScope) -> Verdict {
        let statics = if scope.includes_static() {
            self.check_static()
        } else {
            Verdict::Vacuous
        };
        statics.and(|| {
            if scope.includes_instance() {
                self.check_instance(subject)
            } else {
                Verdict::Vacuous
            }
        })
    }
}

impl<'f, X: Contracted + 'static> InvariantChecker<'f, X> {
    /// Own invariants of `X`
    pub fn of() -> Self {
        let caps = X::CAPABILITIES;
        let mut checker = Self::none();
        if caps.instance_invariant || caps.static_invariant {
            let instance: Option<Rc<dyn Fn(&X) -> CheckResult + 'f>> = if caps.instance_invariant {
                Some(Rc::new(|subject: &X| subject.invariant()))
            } else {
                None
            };
            checker.entries.push(InvariantEntry {
                type_name: std::any::type_name::<X>(),
                instance,
                statics: caps.static_invariant.then_some(X::static_invariant as fn() -> CheckResult),
            });
        }
        checker
    }

    /// Own invariants of `X` followed by those of every declared base
    pub fn hierarchy() -> Self {
        let mut checker = Self::of();
        if !X::CAPABILITIES.base_types {
            return checker;
        }

        let bases = X::base_types();
        let mut flattened = Vec::new();
        for base in &bases {
            base.flatten(&mut flattened);
        }
        for base in flattened {
            let caps = base.capabilities;
            if !(caps.instance_invariant || caps.static_invariant) {
                continue;
            }
            let instance: Option<Rc<dyn Fn(&X) -> CheckResult + 'f>> = if caps.instance_invariant {
                Some(base.instance.clone())
            } else {
                None
            };
            checker.entries.push(InvariantEntry {
                type_name: base.name,
                instance,
                statics: caps.static_invariant.then_some(base.statics),
            });
        }
        checker
    }
}

#[cfg(test)]
#[path = "invariant/invariant_tests.rs"]
mod tests;
