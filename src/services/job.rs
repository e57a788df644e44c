// Scan job orchestration
//
// ScanService is the command surface a collaborator talks to. Each started job
// gets a JobHandle that owns its control token and drives the state machine:
//
//   Idle -> Running <-> Paused -> Cancelled -> Idle
//              \                                ^
//               `-------> Completed -------------'
//
// The scan loop itself runs in segments on tokio blocking workers. A segment
// ends on pause, cancel or completion; a supervising task settles the outcome
// (record the resume position, restart after a racing resume, or finish the job).
//
// Every write to the control signal happens while the StateManager write lock
// is held. Emissions are serialized by a separate gate: the state is updated
// under the lock, the lock is released, and the event is delivered while the
// gate is still held. cancel(), start() and the final reset take the same gate,
// so no prime slips out after cancel() returns and one job's ScanReset always
// precedes the next job's events. A sink is free to read the state from
// `deliver`.
//
// Lock order: emission gate, then the current-job slot, then the state lock.

use super::notify::{EventSink, Notifier};
use super::scanner::{scan_segment, ControlSignal, ScanControl, SegmentOutcome};
use crate::metrics::ScanMetrics;
use crate::models::{JobState, ScanError, ScanEvent, ScanRange, ScanState};
use crate::state::StateManager;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::watch;

/// Collaborator-facing command surface
///
/// Accepts the three input commands (`start_scan`, `pause_or_resume`,
/// `cancel`) and reports every outcome through the [`EventSink`] it was
/// built with. Only one job runs at a time; starting another while a job is
/// running, paused or winding down is rejected with
/// [`ScanError::AlreadyActive`].
///
/// # Example
/// ```ignore
/// let (sink, mut events) = ChannelSink::channel();
/// let service = ScanService::new(Arc::new(sink), runtime.handle().clone());
///
/// service.start_scan("1", "20")?;
/// while let Some(event) = events.recv().await {
///     // PrimeFound(2), PrimeFound(3), ... ScanCompleted, ScanReset
/// }
/// ```
pub struct ScanService {
    state: Arc<StateManager>,
    notifier: Notifier,
    runtime: Handle,
    current: Mutex<Option<JobHandle>>,
    emission: Arc<Mutex<()>>,
}

impl ScanService {
    /// Create a service with fresh state and metrics
    ///
    /// # Arguments
    /// * `sink` - Receives every scan event
    /// * `runtime` - Runtime the scan workers and their supervisors run on
    pub fn new(sink: Arc<dyn EventSink>, runtime: Handle) -> Self {
        Self::with_parts(
            Arc::new(StateManager::new()),
            sink,
            Arc::new(ScanMetrics::new()),
            runtime,
        )
    }

    /// Create a service around an existing state manager and metrics block
    pub fn with_parts(
        state: Arc<StateManager>,
        sink: Arc<dyn EventSink>,
        metrics: Arc<ScanMetrics>,
        runtime: Handle,
    ) -> Self {
        Self {
            state,
            notifier: Notifier::new(sink, metrics),
            runtime,
            current: Mutex::new(None),
            emission: Arc::new(Mutex::new(())),
        }
    }

    /// Parse the range text and start a scan
    ///
    /// Malformed text is reported twice: as an `InvalidInput` event for the
    /// collaborator's display and as the returned error. No job starts.
    pub fn start_scan(&self, start_text: &str, end_text: &str) -> Result<JobHandle, ScanError> {
        let range = match ScanRange::parse(start_text, end_text) {
            Ok(range) => range,
            Err(e) => {
                tracing::warn!("Rejected scan input: {}", e);
                self.notifier.emit(ScanEvent::InvalidInput(e.to_string()));
                return Err(e.into());
            }
        };

        self.start(range)
    }

    /// Start scanning `range`
    pub fn start(&self, range: ScanRange) -> Result<JobHandle, ScanError> {
        let _gate = lock_gate(&self.emission);
        let mut current = self.current_guard();

        let job_id = self.state.try_update(|s| {
            if s.is_busy() {
                return Err(ScanError::AlreadyActive { state: s.job_state });
            }
            Ok(s.begin_job(range))
        })?;

        let (finished, _) = watch::channel(None);
        let job = JobHandle {
            inner: Arc::new(JobInner {
                id: job_id,
                range,
                control: ScanControl::new(),
                state: Arc::clone(&self.state),
                notifier: self.notifier.clone(),
                runtime: self.runtime.clone(),
                emission: Arc::clone(&self.emission),
                terminal: OnceLock::new(),
                finished,
            }),
        };

        self.notifier.metrics().record_job_started();
        tracing::info!("Starting scan job {} over {}", job_id, range);

        *current = Some(job.clone());
        job.spawn_segment(range.start);

        Ok(job)
    }

    /// Pause a running scan or resume a paused one
    ///
    /// # Returns
    /// The state the job moved to (`Paused` or `Running`)
    pub fn pause_or_resume(&self) -> Result<JobState, ScanError> {
        let job = self.current_job();
        let state = self.state.read(|s| s.job_state);

        match (job, state) {
            (Some(job), JobState::Running) => {
                job.pause()?;
                Ok(JobState::Paused)
            }
            (Some(job), JobState::Paused) => {
                job.resume()?;
                Ok(JobState::Running)
            }
            (_, state) => Err(ScanError::InvalidTransition {
                command: "pause or resume",
                state,
            }),
        }
    }

    /// Cancel the running or paused scan
    pub fn cancel(&self) -> Result<(), ScanError> {
        match self.current_job() {
            Some(job) => job.cancel(),
            None => Err(ScanError::InvalidTransition {
                command: "cancel",
                state: JobState::Idle,
            }),
        }
    }

    /// A job is running or paused
    pub fn is_active(&self) -> bool {
        self.state.read(|s| s.job_state.is_active())
    }

    /// Handle of the most recently started job
    pub fn current_job(&self) -> Option<JobHandle> {
        self.current_guard().clone()
    }

    pub fn state(&self) -> &Arc<StateManager> {
        &self.state
    }

    pub fn metrics(&self) -> &Arc<ScanMetrics> {
        self.notifier.metrics()
    }

    fn current_guard(&self) -> MutexGuard<'_, Option<JobHandle>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ScanService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanService")
            .field("state", &self.state.snapshot())
            .finish_non_exhaustive()
    }
}

/// Handle to one scan job
///
/// Cheap to clone. Once the job has finished every command returns
/// [`ScanError::JobFinished`].
#[derive(Clone)]
pub struct JobHandle {
    inner: Arc<JobInner>,
}

struct JobInner {
    id: u64,
    range: ScanRange,
    control: ScanControl,
    state: Arc<StateManager>,
    notifier: Notifier,
    runtime: Handle,

    /// Shared with the service; held across every state-then-deliver step
    emission: Arc<Mutex<()>>,

    /// Written under the state lock when the job returns to idle
    terminal: OnceLock<JobState>,

    /// Set to the terminal state once `ScanReset` has been emitted
    finished: watch::Sender<Option<JobState>>,
}

fn lock_gate(gate: &Mutex<()>) -> MutexGuard<'_, ()> {
    gate.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What the supervisor does after a segment halts
enum FollowUp {
    /// Paused and still paused: wait for resume or cancel
    Hold,
    /// Resumed before the pause took effect: keep scanning from here
    Restart(i64),
    /// Emit `ScanReset` and return to idle
    Finish(JobState),
}

impl JobHandle {
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn range(&self) -> ScanRange {
        self.inner.range
    }

    /// Current lifecycle state of this job
    ///
    /// After the job finished this stays at its terminal state
    /// (`Completed` or `Cancelled`) even though the scanner itself is idle.
    pub fn state(&self) -> JobState {
        self.inner.state.read(|s| {
            if let Some(terminal) = self.inner.terminal.get() {
                *terminal
            } else if s.job_id == self.inner.id {
                s.job_state
            } else {
                JobState::Idle
            }
        })
    }

    /// Wait until the job has finished and been reset
    ///
    /// # Returns
    /// `Completed` or `Cancelled`
    pub async fn wait(&self) -> JobState {
        let mut rx = self.inner.finished.subscribe();
        match rx.wait_for(Option::is_some).await {
            Ok(terminal) => (*terminal).unwrap_or(JobState::Cancelled),
            // The sender lives as long as this handle
            Err(_) => JobState::Cancelled,
        }
    }

    /// Pause a running job
    ///
    /// The iteration in flight finishes (and may still emit its prime); the
    /// loop halts before testing the next integer.
    pub fn pause(&self) -> Result<(), ScanError> {
        self.inner.state.try_update(|s| {
            self.ensure_current(s)?;
            match s.job_state {
                JobState::Running => {
                    s.job_state = JobState::Paused;
                    self.inner.control.signal(ControlSignal::Pause);
                    Ok(())
                }
                state => Err(ScanError::InvalidTransition {
                    command: "pause",
                    state,
                }),
            }
        })?;

        self.inner.notifier.metrics().record_pause();
        tracing::info!("Scan job {} paused", self.inner.id);
        Ok(())
    }

    /// Resume a paused job from the next untested integer
    pub fn resume(&self) -> Result<(), ScanError> {
        let restart_from = self.inner.state.try_update(|s| {
            self.ensure_current(s)?;
            match s.job_state {
                JobState::Paused => {
                    s.job_state = JobState::Running;
                    self.inner.control.signal(ControlSignal::Run);

                    // A segment that has not halted yet simply keeps going
                    if s.segment_running {
                        return Ok(None);
                    }
                    s.segment_running = true;
                    Ok(Some(s.resume_at.unwrap_or(self.inner.range.start)))
                }
                state => Err(ScanError::InvalidTransition {
                    command: "resume",
                    state,
                }),
            }
        })?;

        self.inner.notifier.metrics().record_resume();

        match restart_from {
            Some(from) => {
                tracing::info!("Scan job {} resuming at {}", self.inner.id, from);
                self.spawn_segment(from);
            }
            None => {
                tracing::info!(
                    "Scan job {} resumed before its segment halted",
                    self.inner.id
                );
            }
        }

        Ok(())
    }

    /// Cancel a running or paused job
    ///
    /// No `PrimeFound` is delivered once this returns, and `ScanCompleted`
    /// never follows. `ScanReset` is emitted as soon as no segment is running.
    pub fn cancel(&self) -> Result<(), ScanError> {
        // Waits out a delivery in progress
        let _gate = lock_gate(&self.inner.emission);

        let finish_now = self.inner.state.try_update(|s| {
            self.ensure_current(s)?;
            match s.job_state {
                JobState::Running | JobState::Paused => {
                    s.job_state = JobState::Cancelled;
                    self.inner.control.signal(ControlSignal::Cancel);
                    Ok(!s.segment_running)
                }
                state => Err(ScanError::InvalidTransition {
                    command: "cancel",
                    state,
                }),
            }
        })?;

        self.inner.notifier.metrics().record_cancellation();
        tracing::info!("Scan job {} cancellation requested", self.inner.id);

        if finish_now {
            self.finish_gated(JobState::Cancelled);
        }

        Ok(())
    }

    fn ensure_current(&self, s: &ScanState) -> Result<(), ScanError> {
        if s.job_id != self.inner.id || self.inner.terminal.get().is_some() {
            return Err(ScanError::JobFinished {
                job_id: self.inner.id,
            });
        }
        Ok(())
    }

    fn spawn_segment(&self, from: i64) {
        let job = self.clone();
        tracing::debug!("Scan job {} segment starting at {}", self.inner.id, from);

        self.inner.runtime.spawn(async move {
            let worker = job.clone();
            let started = Instant::now();

            let outcome = match tokio::task::spawn_blocking(move || worker.run_segment(from)).await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Scan job {} worker failed: {}", job.inner.id, e);
                    SegmentOutcome::Cancelled
                }
            };

            job.inner.notifier.metrics().record_segment(started.elapsed());
            tracing::debug!(
                "Scan job {} segment from {} ended: {:?}",
                job.inner.id,
                from,
                outcome
            );

            job.settle(outcome);
        });
    }

    /// Body of one segment; runs on a blocking worker
    fn run_segment(&self, from: i64) -> SegmentOutcome {
        let checkpoint = self.inner.control.checkpoint();
        let inner = &self.inner;

        scan_segment(from, inner.range.end, &checkpoint, |event| {
            let _gate = lock_gate(&inner.emission);
            let mut deliver = false;

            inner.state.update(|s| {
                // cancel() may have landed after the loop's own check
                if s.job_id != inner.id || s.job_state == JobState::Cancelled {
                    return;
                }

                match &event {
                    ScanEvent::PrimeFound(prime) => {
                        s.record_prime(*prime);
                        inner.notifier.metrics().record_prime();
                        tracing::trace!("Scan job {} found prime {}", inner.id, prime);
                    }
                    ScanEvent::ScanCompleted => s.job_state = JobState::Completed,
                    _ => {}
                }
                deliver = true;
            });

            if deliver {
                inner.notifier.emit(event);
            }
        })
    }

    /// Apply a halted segment's outcome; runs on the supervising task
    fn settle(&self, outcome: SegmentOutcome) {
        let follow_up = self.inner.state.try_update(|s| {
            if s.job_id != self.inner.id {
                return Err(ScanError::JobFinished {
                    job_id: self.inner.id,
                });
            }

            s.segment_running = false;

            let follow_up = match (outcome, s.job_state) {
                // Covers a completion suppressed by a racing cancel
                (_, JobState::Cancelled) => FollowUp::Finish(JobState::Cancelled),
                (SegmentOutcome::Completed, _) => {
                    s.job_state = JobState::Completed;
                    FollowUp::Finish(JobState::Completed)
                }
                (SegmentOutcome::Cancelled, _) => {
                    s.job_state = JobState::Cancelled;
                    FollowUp::Finish(JobState::Cancelled)
                }
                (SegmentOutcome::Paused { resume_at }, JobState::Running) => {
                    s.resume_at = Some(resume_at);
                    s.segment_running = true;
                    FollowUp::Restart(resume_at)
                }
                (SegmentOutcome::Paused { resume_at }, _) => {
                    s.resume_at = Some(resume_at);
                    FollowUp::Hold
                }
            };

            Ok(follow_up)
        });

        match follow_up {
            Ok(FollowUp::Hold) => {
                tracing::debug!("Scan job {} halted for pause", self.inner.id);
            }
            Ok(FollowUp::Restart(from)) => self.spawn_segment(from),
            Ok(FollowUp::Finish(terminal)) => self.finish(terminal),
            Err(e) => tracing::warn!("Discarding segment outcome: {}", e),
        }
    }

    /// Return to idle, emit `ScanReset` and wake waiters
    fn finish(&self, terminal: JobState) {
        let _gate = lock_gate(&self.inner.emission);
        self.finish_gated(terminal);
    }

    /// [`finish`](Self::finish) for a caller already holding the emission gate
    fn finish_gated(&self, terminal: JobState) {
        let mut primes_found = None;

        self.inner.state.update(|s| {
            if s.job_id != self.inner.id || self.inner.terminal.get().is_some() {
                return;
            }
            primes_found = Some(s.primes_found);
            if terminal == JobState::Completed {
                self.inner.notifier.metrics().record_completion();
            }
            s.reset_job();
            let _ = self.inner.terminal.set(terminal);
        });

        let Some(primes_found) = primes_found else {
            return;
        };

        self.inner.notifier.emit(ScanEvent::ScanReset);
        self.inner.finished.send_replace(Some(terminal));

        tracing::info!(
            "Scan job {} over {} {} with {} primes found",
            self.inner.id,
            self.inner.range,
            terminal,
            primes_found
        );
    }
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.inner.id)
            .field("range", &self.inner.range)
            .finish_non_exhaustive()
    }
}
