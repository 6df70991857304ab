//! Recording handlers shared by the unit tests

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{CheckConfig, CheckPoint, ContractContext, ContractKind, ContractViolation, FailureHandlers, UsageError};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    Violation(ContractViolation),
    Usage(UsageError),
}

/// Collects every handler call of the contexts it builds
#[derive(Clone, Default)]
pub(crate) struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn context(&self) -> ContractContext {
        self.context_with(CheckConfig::all())
    }

    pub(crate) fn context_with(&self, config: CheckConfig) -> ContractContext {
        let violations = self.events.clone();
        let usages = self.events.clone();
        let handlers = FailureHandlers::new()
            .with_all(move |violation: &ContractViolation| {
                violations.lock().push(Event::Violation(violation.clone()))
            })
            .with_usage_handler(move |_, error: &UsageError| usages.lock().push(Event::Usage(error.clone())));
        ContractContext::new(config, handlers)
    }

    pub(crate) fn count(&self) -> usize {
        self.events.lock().len()
    }

    pub(crate) fn violations(&self) -> Vec<ContractViolation> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                Event::Violation(violation) => Some(violation.clone()),
                Event::Usage(_) => None,
            })
            .collect()
    }

    pub(crate) fn kinds(&self) -> Vec<ContractKind> {
        self.violations().iter().map(|violation| violation.kind).collect()
    }

    pub(crate) fn points(&self) -> Vec<Option<CheckPoint>> {
        self.violations().iter().map(|violation| violation.point).collect()
    }

    pub(crate) fn usage_errors(&self) -> Vec<UsageError> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                Event::Usage(error) => Some(error.clone()),
                Event::Violation(_) => None,
            })
            .collect()
    }
}
