//! Failure boundary around extraction steps and plugin runs
//!
//! Work either runs inline under `catch_unwind`, or, when a timeout is set, on
//! a helper thread the caller stops waiting for once the limit passes. A timed
//! out helper is detached and its result dropped.
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crate::error::{PluginError, StepError};

/// Why bounded work did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interrupted {
    TimedOut(Duration),
    Aborted(String),
}

impl From<Interrupted> for StepError {
    fn from(interrupted: Interrupted) -> Self {
        match interrupted {
            Interrupted::TimedOut(limit) => StepError::TimedOut(limit),
            Interrupted::Aborted(msg) => StepError::Aborted(msg),
        }
    }
}

impl From<Interrupted> for PluginError {
    fn from(interrupted: Interrupted) -> Self {
        match interrupted {
            Interrupted::TimedOut(limit) => PluginError::TimedOut(limit),
            Interrupted::Aborted(msg) => PluginError::Aborted(msg),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

/// Run `work` behind a panic boundary and an optional time limit.
pub fn run_bounded<T, F>(timeout: Option<Duration>, work: F) -> Result<T, Interrupted>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let limit = match timeout {
        None => {
            return panic::catch_unwind(AssertUnwindSafe(work))
                .map_err(|payload| Interrupted::Aborted(panic_message(payload.as_ref())));
        }
        Some(limit) => limit,
    };

    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("diskreport-bounded".to_string())
        .spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(work));
            // The receiver is gone when the caller already timed out
            let _ = tx.send(outcome);
        })
        .map_err(|e| Interrupted::Aborted(format!("cannot spawn worker: {}", e)))?;

    match rx.recv_timeout(limit) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(payload)) => Err(Interrupted::Aborted(panic_message(payload.as_ref()))),
        Err(RecvTimeoutError::Timeout) => Err(Interrupted::TimedOut(limit)),
        Err(RecvTimeoutError::Disconnected) => {
            Err(Interrupted::Aborted("worker exited without a result".to_string()))
        }
    }
}
