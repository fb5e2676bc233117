//! Fire-and-forget usage recording.
//!
//! Invocations hand their [`UsageRecord`] to a bounded channel and move on.
//! A single writer task updates metrics and the ledger, then appends to the
//! usage sink. A full queue drops the record and counts the drop; a failing
//! sink is logged and never reaches the caller.

use crate::ledger::UsageLedger;
use crate::metrics::GatewayMetrics;
use gateway_core::{UsageRecord, UsageSink};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Recorder configuration
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Queue capacity before records are dropped
    pub channel_capacity: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

#[derive(Debug)]
enum Message {
    Record(Box<UsageRecord>),
    Flush(oneshot::Sender<()>),
}

/// Handle used by invocations to submit usage records
#[derive(Debug, Clone)]
pub struct UsageRecorder {
    queue: mpsc::Sender<Message>,
    metrics: Arc<GatewayMetrics>,
}

impl UsageRecorder {
    /// Spawn the writer task and return the handle plus the task
    #[must_use]
    pub fn spawn(
        config: &RecorderConfig,
        sink: Arc<dyn UsageSink>,
        ledger: Arc<UsageLedger>,
        metrics: Arc<GatewayMetrics>,
    ) -> (Self, JoinHandle<()>) {
        let (queue, inbox) = mpsc::channel(config.channel_capacity.max(1));
        let writer = tokio::spawn(run_writer(inbox, sink, ledger, Arc::clone(&metrics)));
        (Self { queue, metrics }, writer)
    }

    /// Submit a record without waiting
    pub fn record(&self, record: UsageRecord) {
        let feature = record.feature.clone();
        if let Err(e) = self.queue.try_send(Message::Record(Box::new(record))) {
            self.metrics.record_dropped();
            match e {
                mpsc::error::TrySendError::Full(_) => {
                    warn!(feature = %feature, "Usage queue full, dropping record");
                }
                mpsc::error::TrySendError::Closed(_) => {
                    warn!(feature = %feature, "Usage writer stopped, dropping record");
                }
            }
        }
    }

    /// Wait until every record submitted before this call has been written
    pub async fn flush(&self) {
        let (done, flushed) = oneshot::channel();
        if self.queue.send(Message::Flush(done)).await.is_ok() {
            let _ = flushed.await;
        }
    }
}

async fn run_writer(
    mut inbox: mpsc::Receiver<Message>,
    sink: Arc<dyn UsageSink>,
    ledger: Arc<UsageLedger>,
    metrics: Arc<GatewayMetrics>,
) {
    while let Some(message) = inbox.recv().await {
        match message {
            Message::Record(record) => {
                ledger.record(&record);
                metrics.observe(&record);
                if let Err(e) = sink.append_usage_record(&record).await {
                    warn!(feature = %record.feature, id = %record.id, error = %e, "Failed to persist usage record");
                }
            }
            Message::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Usage writer stopped");
}
