//! Checking configuration
//!
//! Read once at startup and carried by a [`crate::ContractContext`]. A
//! disabled kind makes every check of that kind report `Skipped`.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::contract::ContractKind;
use crate::errors::{ContractError, ContractResult};

/// Which categories of checks run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckConfig {
    pub enable_preconditions: bool,
    pub enable_postconditions: bool,
    pub enable_invariants: bool,
    pub enable_exception_guarantees: bool,

    /// Make guards built while another check is running inert
    ///
    /// Prevents contracted calls made from inside a check from recursing
    /// into their own checks.
    pub disable_nested_checks: bool,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self::all()
    }
}

impl CheckConfig {
    /// Every check enabled
    pub fn all() -> Self {
        Self {
            enable_preconditions: true,
            enable_postconditions: true,
            enable_invariants: true,
            enable_exception_guarantees: true,
            disable_nested_checks: true,
        }
    }

    /// Every check disabled
    pub fn none() -> Self {
        Self {
            enable_preconditions: false,
            enable_postconditions: false,
            enable_invariants: false,
            enable_exception_guarantees: false,
            disable_nested_checks: true,
        }
    }

    pub fn is_enabled(&self, kind: ContractKind) -> bool {
        match kind {
            ContractKind::Precondition => self.enable_preconditions,
            ContractKind::Postcondition => self.enable_postconditions,
            ContractKind::Invariant => self.enable_invariants,
            ContractKind::ExceptionGuarantee => self.enable_exception_guarantees,
        }
    }

    /// Builder-style toggle for one kind
    pub fn with(mut self, kind: ContractKind, enabled: bool) -> Self {
        match kind {
            ContractKind::Precondition => self.enable_preconditions = enabled,
            ContractKind::Postcondition => self.enable_postconditions = enabled,
            ContractKind::Invariant => self.enable_invariants = enabled,
            ContractKind::ExceptionGuarantee => self.enable_exception_guarantees = enabled,
        }
        self
    }

    /// Old values are only worth capturing when something can read them
    pub fn captures_old_values(&self) -> bool {
        self.enable_postconditions || self.enable_exception_guarantees
    }

    /// Parse a JSON object; missing keys keep their defaults
    pub fn from_json(json: &str) -> ContractResult<Self> {
        serde_json::from_str(json).map_err(|e| ContractError::Config(e.to_string()))
    }

    /// Load a JSON configuration file
    pub fn from_path(path: impl AsRef<Path>) -> ContractResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }
}
