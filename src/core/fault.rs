//! Fault boundary shared by jobs, entity updates, pool workers and the heartbeat.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use super::AppResult;

/// Run `f`, turning both an `Err` and a panic into a message.
///
/// State touched by `f` is not observed as broken after a panic: entity
/// cells use non-poisoning locks and jobs are retried from their own fields.
pub(crate) fn guard<F>(f: F) -> Result<(), String>
where
    F: FnOnce() -> AppResult<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(format!("{e:#}")),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

/// Extract a printable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked: unknown panic".to_string()
    }
}
