//! Once-only initialization guards
//!
//! The compiled schema engine and the rule-artifact set are process-wide
//! singletons loaded lazily on first use. Both go through the same guard:
//! a fast path for an already-decided outcome, and a mutex-held slow path
//! taken at most once. Concurrent first callers block on the one
//! initialization and then observe the same outcome, success or failure.

use std::sync::{Arc, Mutex};
use std::time::Duration;

enum InitState<T> {
    NotStarted,
    Ready(Arc<T>),
    Failed(String),
}

/// Mutex-guarded lazy initialization cell
pub struct InitGuard<T> {
    state: Mutex<InitState<T>>,
}

impl<T> InitGuard<T> {
    /// Create a guard in the not-started state
    pub fn new() -> Self {
        Self {
            state: Mutex::new(InitState::NotStarted),
        }
    }

    /// Return the initialized value, running `init` at most once. The lock is
    /// held for the whole slow path, so callers arriving during
    /// initialization block until it finishes and see the same outcome.
    pub fn get_or_init<F>(&self, init: F) -> std::result::Result<Arc<T>, String>
    where
        F: FnOnce() -> std::result::Result<T, String>,
    {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match &*state {
            InitState::Ready(value) => Ok(Arc::clone(value)),
            InitState::Failed(message) => Err(message.clone()),
            InitState::NotStarted => match init() {
                Ok(value) => {
                    let value = Arc::new(value);
                    *state = InitState::Ready(Arc::clone(&value));
                    Ok(value)
                }
                Err(message) => {
                    *state = InitState::Failed(message.clone());
                    Err(message)
                }
            },
        }
    }

    /// Whether initialization has completed successfully
    pub fn is_ready(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        matches!(&*state, InitState::Ready(_))
    }

    /// Reset to the not-started state so the next call reinitializes from
    /// scratch. Used by shutdown and test teardown.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *state = InitState::NotStarted;
    }
}

impl<T> Default for InitGuard<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `attempt` up to `attempts` times with a fixed delay between failures,
/// returning the last error when the bound is exhausted.
pub fn retry_with_delay<T, F>(
    attempts: u32,
    delay: Duration,
    mut attempt: F,
) -> std::result::Result<T, String>
where
    F: FnMut() -> std::result::Result<T, String>,
{
    let attempts = attempts.max(1);
    let mut last = String::new();
    for n in 1..=attempts {
        match attempt() {
            Ok(value) => return Ok(value),
            Err(message) => {
                tracing::warn!(attempt = n, attempts, error = %message, "load attempt failed");
                last = message;
                if n < attempts {
                    std::thread::sleep(delay);
                }
            }
        }
    }
    Err(last)
}
