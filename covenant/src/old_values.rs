//! Old values: snapshots taken before the guarded body runs
//!
//! Values are captured by the old-value functor at entry. The bag is then
//! frozen: captures fail from that point on and reads start to succeed, so
//! a postcondition can only ever see pre-call state.

use rustc_hash::FxHashMap;
use std::any::{type_name, Any};
use std::fmt;

use crate::errors::UsageError;

/// A keyed bag of pre-call snapshots owned by one guard level
#[derive(Default)]
pub struct OldValues {
    values: FxHashMap<String, Box<dyn Any>>,
    frozen: bool,
}

impl OldValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `id`, replacing any earlier capture
    pub fn capture<V: 'static>(&mut self, id: impl Into<String>, value: V) -> Result<(), UsageError> {
        let id = id.into();
        if self.frozen {
            return Err(UsageError::CaptureAfterBodyStarted(id));
        }
        self.values.insert(id, Box::new(value));
        Ok(())
    }

    /// Read the value captured under `id`
    ///
    /// Never falls back to a default: a missing id is a usage error.
    pub fn get<V: 'static>(&self, id: &str) -> Result<&V, UsageError> {
        if !self.frozen {
            return Err(UsageError::ReadBeforeBodyFinished(id.to_string()));
        }
        let value = self
            .values
            .get(id)
            .ok_or_else(|| UsageError::MissingOldValue(id.to_string()))?;
        value
            .downcast_ref::<V>()
            .ok_or_else(|| UsageError::OldValueTypeMismatch {
                id: id.to_string(),
                expected: type_name::<V>(),
            })
    }

    /// Seal the bag; called once the guarded body is about to start
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn contains(&self, id: &str) -> bool {
        self.values.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for OldValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&String> = self.values.keys().collect();
        ids.sort();
        f.debug_struct("OldValues")
            .field("ids", &ids)
            .field("frozen", &self.frozen)
            .finish()
    }
}

#[cfg(test)]
#[path = "old_values/old_values_tests.rs"]
mod tests;
