//! Rate-limited dispatcher.
//!
//! A single worker task drains a FIFO queue of tickets and releases one
//! caller at a time, at least `min_interval` after the previous release.
//! Released callers run their operation on their own task, so starts are
//! spaced but completions may overlap.

use gateway_core::GatewayError;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, trace};

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Minimum gap between two dispatch starts
    pub min_interval: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(100),
        }
    }
}

type Ticket = oneshot::Sender<()>;

/// FIFO dispatcher spacing operation starts
#[derive(Debug, Clone)]
pub struct RateLimitedDispatcher {
    queue: mpsc::UnboundedSender<Ticket>,
    config: DispatcherConfig,
}

impl RateLimitedDispatcher {
    /// Create a dispatcher and spawn its worker.
    ///
    /// Must be called from within a Tokio runtime. The worker stops once
    /// every handle has been dropped.
    #[must_use]
    pub fn new(config: DispatcherConfig) -> Self {
        let (queue, tickets) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(tickets, config.min_interval));
        Self { queue, config }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(DispatcherConfig::default())
    }

    /// Minimum gap between dispatch starts
    #[must_use]
    pub const fn min_interval(&self) -> Duration {
        self.config.min_interval
    }

    /// Wait for this caller's turn, then run the operation.
    ///
    /// Dropping the returned future while queued gives the slot back without
    /// consuming an interval.
    ///
    /// # Errors
    /// Returns the operation's error, or `Internal` if the worker is gone
    pub async fn enqueue<F, Fut, T>(&self, operation: F) -> Result<T, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let (ticket, released) = oneshot::channel();
        self.queue
            .send(ticket)
            .map_err(|_| GatewayError::internal("Dispatcher worker stopped"))?;
        released
            .await
            .map_err(|_| GatewayError::internal("Dispatcher worker stopped"))?;
        operation().await
    }
}

async fn run_worker(mut tickets: mpsc::UnboundedReceiver<Ticket>, min_interval: Duration) {
    let mut watermark: Option<Instant> = None;

    while let Some(ticket) = tickets.recv().await {
        if ticket.is_closed() {
            trace!("Skipping abandoned dispatch ticket");
            continue;
        }
        if let Some(last) = watermark {
            tokio::time::sleep_until(last + min_interval).await;
        }
        if ticket.send(()).is_err() {
            trace!("Caller left while waiting for its slot");
            continue;
        }
        watermark = Some(Instant::now());
    }

    debug!("Dispatcher worker stopped");
}
