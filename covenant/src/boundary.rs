//! Isolation boundary around user check functors
//!
//! A functor that panics must never unwind into the guard's state machine.
//! The boundary also tracks whether a check is running on this thread so
//! guards built from inside a check can be suppressed.

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};

use crate::contract::{CheckResult, Verdict};
use crate::errors::CheckFailure;

thread_local! {
    static CHECKING: Cell<bool> = const { Cell::new(false) };
}

/// Whether a check functor is currently running on this thread
pub fn is_checking() -> bool {
    CHECKING.with(|checking| checking.get())
}

/// Run one check functor, containing panics
pub(crate) fn run_isolated<F>(check: F) -> Verdict
where
    F: FnOnce() -> CheckResult,
{
    let previous = CHECKING.with(|checking| checking.replace(true));
    let outcome = panic::catch_unwind(AssertUnwindSafe(check));
    CHECKING.with(|checking| checking.set(previous));

    match outcome {
        Ok(Ok(())) => Verdict::Held,
        Ok(Err(failure)) => Verdict::Failed(failure),
        Err(payload) => Verdict::Failed(CheckFailure::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
