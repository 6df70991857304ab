//! The context every guard is built against
//!
//! Configuration and handlers are passed explicitly to each guard entry
//! point. A process that prefers a single ambient context installs one at
//! startup; it cannot be replaced afterwards.

use once_cell::sync::OnceCell;

use crate::config::CheckConfig;
use crate::errors::{ContractError, ContractResult};
use crate::handlers::FailureHandlers;

static GLOBAL: OnceCell<ContractContext> = OnceCell::new();

/// Configuration plus failure handlers
#[derive(Debug, Clone, Default)]
pub struct ContractContext {
    config: CheckConfig,
    handlers: FailureHandlers,
}

impl ContractContext {
    pub fn new(config: CheckConfig, handlers: FailureHandlers) -> Self {
        Self { config, handlers }
    }

    pub fn with_config(mut self, config: CheckConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_handlers(mut self, handlers: FailureHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    pub fn handlers(&self) -> &FailureHandlers {
        &self.handlers
    }

    /// Make this the process-wide context; only the first call succeeds
    pub fn install(self) -> ContractResult<()> {
        GLOBAL
            .set(self)
            .map_err(|_| ContractError::ContextAlreadyInstalled)
    }

    /// The installed context, or the default one if none was installed
    pub fn global() -> &'static ContractContext {
        GLOBAL.get_or_init(ContractContext::default)
    }
}
