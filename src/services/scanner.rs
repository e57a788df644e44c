//! The range scan loop and its control token.
//!
//! [`scan_segment`] is a plain synchronous loop with no knowledge of threads,
//! state managers or channels. It polls a [`Checkpoint`] for pause/cancel
//! requests and hands every event to a callback. The job layer
//! ([`crate::services::job`]) runs it on a blocking worker and settles the
//! returned [`SegmentOutcome`].

use super::primality::is_prime;
use crate::models::ScanEvent;
use tokio::sync::watch;

/// Requested behaviour of the scan loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Run,
    Pause,
    Cancel,
}

/// Sending half of a job's control token
///
/// Backed by a `tokio::sync::watch` channel: the loop only ever needs the
/// latest request, and reading it never blocks.
#[derive(Debug)]
pub struct ScanControl {
    tx: watch::Sender<ControlSignal>,
}

impl ScanControl {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ControlSignal::Run);
        Self { tx }
    }

    /// Replace the current request. Succeeds even with no checkpoint alive.
    pub fn signal(&self, signal: ControlSignal) {
        self.tx.send_replace(signal);
    }

    pub fn current(&self) -> ControlSignal {
        *self.tx.borrow()
    }

    /// Receiving half handed to the scan loop
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for ScanControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Where the scan loop observes pause and cancel requests
#[derive(Debug, Clone)]
pub struct Checkpoint {
    rx: watch::Receiver<ControlSignal>,
}

impl Checkpoint {
    pub fn signal(&self) -> ControlSignal {
        *self.rx.borrow()
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal() == ControlSignal::Cancel
    }

    pub fn is_pause_requested(&self) -> bool {
        self.signal() == ControlSignal::Pause
    }
}

/// How a segment of the scan loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentOutcome {
    /// Halted on a pause request; `resume_at` is the next untested integer
    Paused { resume_at: i64 },

    /// Halted on a cancel request without signalling completion
    Cancelled,

    /// Tested the last integer of the range and emitted `ScanCompleted`
    Completed,
}

/// Scan `from..=end`, emitting `PrimeFound` for each prime in ascending order.
///
/// Per integer `i`:
/// 1. cancel requested: stop, nothing further is emitted
/// 2. test `i`; if prime and still not cancelled, emit `PrimeFound(i)`
/// 3. `i == end`: emit `ScanCompleted` and stop
/// 4. pause requested: stop with `resume_at = i + 1`
///
/// Completion is checked before the pause request, so `i + 1` is only
/// computed for `i < end` and never overflows. A `from` past `end` (an empty
/// range) completes immediately.
pub fn scan_segment<F>(from: i64, end: i64, checkpoint: &Checkpoint, mut emit: F) -> SegmentOutcome
where
    F: FnMut(ScanEvent),
{
    if from > end {
        if checkpoint.is_cancelled() {
            return SegmentOutcome::Cancelled;
        }
        emit(ScanEvent::ScanCompleted);
        return SegmentOutcome::Completed;
    }

    let mut i = from;
    loop {
        if checkpoint.is_cancelled() {
            return SegmentOutcome::Cancelled;
        }

        if is_prime(i) {
            // The test may have taken a while; re-check before emitting
            if checkpoint.is_cancelled() {
                return SegmentOutcome::Cancelled;
            }
            emit(ScanEvent::PrimeFound(i));
        }

        if i == end {
            if checkpoint.is_cancelled() {
                return SegmentOutcome::Cancelled;
            }
            emit(ScanEvent::ScanCompleted);
            return SegmentOutcome::Completed;
        }

        if checkpoint.is_pause_requested() {
            return SegmentOutcome::Paused { resume_at: i + 1 };
        }

        i += 1;
    }
}
