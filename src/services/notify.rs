// Notification channel between the scan job and its collaborator
//
// The scan loop never knows who listens. It hands events to an EventSink; the
// default sink forwards them over an unbounded tokio mpsc channel so they arrive
// in production order and nothing is dropped for backpressure.

use crate::metrics::ScanMetrics;
use crate::models::ScanEvent;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Failure to hand an event to the collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Event receiver has been dropped")]
    Closed,
}

/// Consumer of scan events
///
/// `deliver` is called synchronously from the scan worker thread, in the
/// exact order events are produced. Implementations must not block for long:
/// the scan loop waits for each call to return.
///
/// The state lock is not held during delivery, so a sink may read
/// [`ScanService::state`](crate::services::ScanService::state) or call
/// [`ScanService::is_active`](crate::services::ScanService::is_active).
/// It must not start or cancel a job from `deliver`: both wait for the
/// delivery in progress to return.
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: ScanEvent) -> Result<(), DeliveryError>;
}

/// [`EventSink`] backed by an unbounded tokio mpsc channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ScanEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver the collaborator reads from
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ScanEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn deliver(&self, event: ScanEvent) -> Result<(), DeliveryError> {
        self.tx.send(event).map_err(|_| DeliveryError::Closed)
    }
}

/// Delivers events to a sink and accounts for failures
///
/// A failed delivery never interrupts the job. It is counted in
/// [`ScanMetrics::delivery_failures`] and logged: the first failure at `warn`,
/// later ones at `trace`.
#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn EventSink>,
    metrics: Arc<ScanMetrics>,
}

impl Notifier {
    pub fn new(sink: Arc<dyn EventSink>, metrics: Arc<ScanMetrics>) -> Self {
        Self { sink, metrics }
    }

    /// Deliver one event; returns whether the sink accepted it
    pub fn emit(&self, event: ScanEvent) -> bool {
        tracing::trace!("Delivering scan event: {:?}", event);

        match self.sink.deliver(event) {
            Ok(()) => {
                self.metrics.record_event_delivered();
                true
            }
            Err(e) => {
                let previous = self.metrics.record_delivery_failure();
                if previous == 0 {
                    tracing::warn!("Scan event delivery failed, continuing without listener: {}", e);
                } else {
                    tracing::trace!("Scan event delivery failed ({} so far): {}", previous + 1, e);
                }
                false
            }
        }
    }

    pub fn metrics(&self) -> &Arc<ScanMetrics> {
        &self.metrics
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("delivery_failures", &self.metrics.delivery_failures())
            .finish_non_exhaustive()
    }
}
