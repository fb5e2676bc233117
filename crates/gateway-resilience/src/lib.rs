//! # Gateway Resilience
//!
//! Resilience patterns for the AI Request Gateway:
//! - Retry policy with exponential backoff and a grace retry
//! - Client-side deadlines
//! - Rate-limited FIFO dispatcher spacing provider calls
//! - A wrapper combining the three around each provider call

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dispatcher;
pub mod retry;
pub mod timeout;
pub mod wrapper;

// Re-export main types
pub use dispatcher::{DispatcherConfig, RateLimitedDispatcher};
pub use retry::{RetryConfig, RetryKind, RetryPolicy, RetryPolicyBuilder};
pub use timeout::with_deadline;
pub use wrapper::{ExecuteOptions, ResilienceWrapper};
