//! Deadline, retry and dispatch combined around one provider call.

use crate::dispatcher::{DispatcherConfig, RateLimitedDispatcher};
use crate::retry::{RetryConfig, RetryPolicy};
use crate::timeout::with_deadline;
use gateway_core::GatewayError;
use std::future::Future;
use std::time::Duration;

/// Per-call resilience options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Deadline for each attempt, including time spent queued
    pub timeout: Duration,
    /// Maximum retries for transient failures
    pub max_retries: u32,
    /// Base backoff delay
    pub base_delay: Duration,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(12),
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Runs operations through the dispatcher with deadlines and retries
#[derive(Debug, Clone)]
pub struct ResilienceWrapper {
    retry: RetryPolicy,
    dispatcher: RateLimitedDispatcher,
    defaults: ExecuteOptions,
}

impl ResilienceWrapper {
    /// Create a wrapper from its parts
    #[must_use]
    pub fn new(defaults: ExecuteOptions, retry: RetryConfig, dispatcher: RateLimitedDispatcher) -> Self {
        let retry = RetryPolicy::new(retry).with_budget(defaults.max_retries, defaults.base_delay);
        Self {
            retry,
            dispatcher,
            defaults,
        }
    }

    /// Create with default options and a fresh dispatcher
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(
            ExecuteOptions::default(),
            RetryConfig::default(),
            RateLimitedDispatcher::new(DispatcherConfig::default()),
        )
    }

    /// Default options
    #[must_use]
    pub const fn defaults(&self) -> ExecuteOptions {
        self.defaults
    }

    /// Execute with the default options
    ///
    /// # Errors
    /// See [`ResilienceWrapper::execute_with`]
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, GatewayError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        self.execute_with(self.defaults, operation).await
    }

    /// Execute an operation under explicit options.
    ///
    /// Every attempt waits for a dispatcher slot and then runs the operation,
    /// both under the per-attempt deadline.
    ///
    /// # Errors
    /// Returns the last error unchanged when retries are exhausted, or the
    /// first non-retryable error
    pub async fn execute_with<F, Fut, T>(&self, options: ExecuteOptions, operation: F) -> Result<T, GatewayError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let retry = self.retry.with_budget(options.max_retries, options.base_delay);
        let operation = &operation;

        retry
            .execute(|| with_deadline(options.timeout, self.dispatcher.enqueue(operation)))
            .await
    }
}
