//! Failure handlers
//!
//! One handler per [`ContractKind`] plus one for usage errors. Every
//! failure of a guard is routed to exactly one handler call. The defaults
//! report the failure and abort the process: a contract violation is a
//! programming defect, not a recoverable condition. Embedding code may
//! install handlers that log, count, or panic instead.

use std::fmt;
use std::sync::Arc;

use tracing::error;

use crate::contract::{ContractKind, Site};
use crate::errors::{ContractViolation, UsageError};

pub type FailureHandler = Arc<dyn Fn(&ContractViolation) + Send + Sync>;
pub type UsageHandler = Arc<dyn Fn(&Site, &UsageError) + Send + Sync>;

/// The handler table
#[derive(Clone)]
pub struct FailureHandlers {
    precondition: FailureHandler,
    postcondition: FailureHandler,
    invariant: FailureHandler,
    except: FailureHandler,
    usage: UsageHandler,
}

impl Default for FailureHandlers {
    fn default() -> Self {
        Self::new()
    }
}

impl FailureHandlers {
    /// Report-then-abort for every kind
    pub fn new() -> Self {
        let abort: FailureHandler = Arc::new(report_and_abort);
        Self {
            precondition: abort.clone(),
            postcondition: abort.clone(),
            invariant: abort.clone(),
            except: abort,
            usage: Arc::new(report_usage_and_abort),
        }
    }

    /// Translate every failure into a panic carrying its diagnostic
    pub fn panicking() -> Self {
        let raise: FailureHandler = Arc::new(|violation: &ContractViolation| {
            panic!("{}", violation);
        });
        Self {
            precondition: raise.clone(),
            postcondition: raise.clone(),
            invariant: raise.clone(),
            except: raise,
            usage: Arc::new(|site: &Site, usage: &UsageError| {
                panic!("contract usage error in {}: {}", site, usage);
            }),
        }
    }

    pub fn with_handler<F>(mut self, kind: ContractKind, handler: F) -> Self
    where
        F: Fn(&ContractViolation) + Send + Sync + 'static,
    {
        self.set_handler(kind, handler);
        self
    }

    /// Install `handler` for every kind
    pub fn with_all<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ContractViolation) + Send + Sync + 'static,
    {
        let handler: FailureHandler = Arc::new(handler);
        for kind in ContractKind::ALL {
            *self.slot_mut(kind) = handler.clone();
        }
        self
    }

    pub fn with_usage_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Site, &UsageError) + Send + Sync + 'static,
    {
        self.usage = Arc::new(handler);
        self
    }

    pub fn set_handler<F>(&mut self, kind: ContractKind, handler: F)
    where
        F: Fn(&ContractViolation) + Send + Sync + 'static,
    {
        *self.slot_mut(kind) = Arc::new(handler);
    }

    pub fn handler(&self, kind: ContractKind) -> &FailureHandler {
        match kind {
            ContractKind::Precondition => &self.precondition,
            ContractKind::Postcondition => &self.postcondition,
            ContractKind::Invariant => &self.invariant,
            ContractKind::ExceptionGuarantee => &self.except,
        }
    }

    fn slot_mut(&mut self, kind: ContractKind) -> &mut FailureHandler {
        match kind {
            ContractKind::Precondition => &mut self.precondition,
            ContractKind::Postcondition => &mut self.postcondition,
            ContractKind::Invariant => &mut self.invariant,
            ContractKind::ExceptionGuarantee => &mut self.except,
        }
    }

    /// Route a violation to the handler for its kind
    pub fn report(&self, violation: &ContractViolation) {
        (self.handler(violation.kind))(violation);
    }

    pub fn report_usage(&self, site: &Site, usage: &UsageError) {
        (self.usage)(site, usage);
    }
}

impl fmt::Debug for FailureHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureHandlers").finish_non_exhaustive()
    }
}

fn report_and_abort(violation: &ContractViolation) {
    error!(kind = %violation.kind, site = %violation.site, "{}", violation);
    eprintln!("contract failure: {}", violation);
    std::process::abort();
}

fn report_usage_and_abort(site: &Site, usage: &UsageError) {
    error!(site = %site, "contract usage error: {}", usage);
    eprintln!("contract usage error in {}: {}", site, usage);
    std::process::abort();
}
