/// Task Runner with Circuit Breaker Pattern
///
/// Runs a periodic background task with retry, exponential backoff and
/// failure tracking, so a task that keeps failing stops loudly instead of
/// degrading silently.

use std::convert::Infallible;
use std::fmt::Display;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};

/// Circuit breaker configuration for background tasks
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Maximum number of consecutive failures before the runner gives up
    pub max_consecutive_failures: u32,
    /// Initial delay between retries
    pub initial_retry_delay: Duration,
    /// Maximum delay between retries
    pub max_retry_delay: Duration,
    /// Pause after a successful pass
    pub pass_interval: Duration,
}

/// The runner stopped after too many consecutive failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Task '{task_name}' exceeded maximum consecutive failures ({failures}). Last error: {last_error}")]
pub struct TaskFailed {
    pub task_name: String,
    pub failures: u32,
    pub last_error: String,
}

/// Internal state for circuit breaker
#[derive(Debug)]
struct CircuitBreakerState {
    consecutive_failures: u32,
    current_retry_delay: Duration,
}

impl CircuitBreakerState {
    fn new(initial_delay: Duration) -> Self {
        Self {
            consecutive_failures: 0,
            current_retry_delay: initial_delay,
        }
    }

    /// Returns the delay to wait before the next attempt
    fn record_failure(&mut self, max_delay: Duration) -> Duration {
        self.consecutive_failures += 1;
        let delay = self.current_retry_delay;
        // Exponential backoff with cap
        self.current_retry_delay = std::cmp::min(self.current_retry_delay * 2, max_delay);
        delay
    }

    fn reset(&mut self, initial_delay: Duration) {
        self.consecutive_failures = 0;
        self.current_retry_delay = initial_delay;
    }
}

/// Run a background task with circuit breaker protection
///
/// `task_fn` executes one pass of the task. After a successful pass the
/// runner waits `pass_interval`; after a failed one it backs off
/// exponentially. It never returns while passes keep succeeding.
///
/// # Errors
/// Returns `TaskFailed` after `max_consecutive_failures` consecutive
/// failures.
pub async fn run_with_circuit_breaker<F, Fut, E>(
    task_name: &str,
    config: CircuitBreakerConfig,
    mut task_fn: F,
) -> Result<Infallible, TaskFailed>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<(), E>>,
    E: Display,
{
    let mut state = CircuitBreakerState::new(config.initial_retry_delay);

    loop {
        match task_fn().await {
            Ok(()) => {
                // Reset circuit breaker on success
                if state.consecutive_failures > 0 {
                    warn!(
                        "Task '{}' recovered after {} failures",
                        task_name, state.consecutive_failures
                    );
                }
                state.reset(config.initial_retry_delay);
                debug!("Task '{}' pass complete, next in {:?}", task_name, config.pass_interval);
                sleep(config.pass_interval).await;
            }
            Err(e) => {
                let delay = state.record_failure(config.max_retry_delay);
                error!(
                    "Task '{}' failed (attempt {}/{}): {}",
                    task_name, state.consecutive_failures, config.max_consecutive_failures, e
                );

                if state.consecutive_failures >= config.max_consecutive_failures {
                    return Err(TaskFailed {
                        task_name: task_name.to_string(),
                        failures: state.consecutive_failures,
                        last_error: e.to_string(),
                    });
                }

                warn!("Task '{}' will retry in {:?}", task_name, delay);
                sleep(delay).await;
            }
        }
    }
}
