use super::scan::{JobState, ScanRange};

/// Single source of truth for the scan job.
///
/// Holds the lifecycle state, the range being scanned, where the next segment
/// resumes, and the running tally of discovered primes.
///
/// # Thread Safety
///
/// `ScanState` is wrapped in `Arc<RwLock<ScanState>>` by
/// [`crate::state::StateManager`]. The scan loop, its supervisor and the
/// collaborator all go through the manager:
/// - [`read()`](crate::state::StateManager::read) for read-only access
/// - [`update()`](crate::state::StateManager::update) and
///   [`try_update()`](crate::state::StateManager::try_update) for mutations
///   with automatic change events
///
/// # Related Types
///
/// - [`crate::state::StateChange`]: Events emitted when this state changes
/// - [`crate::services::JobHandle`]: Drives the transitions
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanState {
    /// Identifier of the current (or last) job; 0 before the first start
    pub job_id: u64,
    pub job_state: JobState,
    pub range: Option<ScanRange>,

    /// Next integer to test when a segment (re)starts
    pub resume_at: Option<i64>,

    /// A scan loop segment is executing on a blocking worker
    pub segment_running: bool,

    pub primes_found: u64,
    pub last_prime: Option<i64>,
}

impl ScanState {
    /// True from `begin_job` until the job is reset to idle, including a
    /// cancelled job whose last segment has not yet halted.
    pub fn is_busy(&self) -> bool {
        self.job_state != JobState::Idle || self.segment_running
    }

    /// Progress through the range, following the last discovered prime.
    ///
    /// Returns `None` when no job has been started.
    pub fn progress_percent(&self) -> Option<f64> {
        let range = self.range?;
        if self.job_state == JobState::Completed {
            return Some(100.0);
        }
        Some(
            self.last_prime
                .map(|prime| range.percent_of(prime))
                .unwrap_or(0.0),
        )
    }

    /// Prepare the state for a new job.
    pub fn begin_job(&mut self, range: ScanRange) -> u64 {
        self.job_id += 1;
        self.job_state = JobState::Running;
        self.range = Some(range);
        self.resume_at = Some(range.start);
        self.segment_running = true;
        self.primes_found = 0;
        self.last_prime = None;
        self.job_id
    }

    /// Return to idle, keeping the job id and the results for inspection.
    pub fn reset_job(&mut self) {
        self.job_state = JobState::Idle;
        self.resume_at = None;
        self.segment_running = false;
    }

    pub fn record_prime(&mut self, prime: i64) {
        self.primes_found += 1;
        self.last_prime = Some(prime);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        let state = ScanState::default();
        assert_eq!(state.job_id, 0);
        assert_eq!(state.job_state, JobState::Idle);
        assert!(!state.is_busy());
        assert_eq!(state.progress_percent(), None);
    }

    #[test]
    fn test_begin_job() {
        let mut state = ScanState::default();
        state.record_prime(7);

        let id = state.begin_job(ScanRange::new(1, 20));

        assert_eq!(id, 1);
        assert_eq!(state.job_state, JobState::Running);
        assert_eq!(state.resume_at, Some(1));
        assert!(state.segment_running);
        assert_eq!(state.primes_found, 0);
        assert_eq!(state.last_prime, None);
        assert!(state.is_busy());
    }

    #[test]
    fn test_cancelled_job_busy_until_reset() {
        let mut state = ScanState::default();
        state.begin_job(ScanRange::new(1, 20));
        state.job_state = JobState::Cancelled;
        assert!(state.is_busy());

        state.segment_running = false;
        assert!(state.is_busy());

        state.reset_job();
        assert!(!state.is_busy());
    }

    #[test]
    fn test_reset_job_keeps_results() {
        let mut state = ScanState::default();
        state.begin_job(ScanRange::new(1, 20));
        state.record_prime(2);
        state.record_prime(3);

        state.reset_job();

        assert_eq!(state.job_state, JobState::Idle);
        assert_eq!(state.primes_found, 2);
        assert_eq!(state.last_prime, Some(3));
        assert_eq!(state.job_id, 1);
    }

    #[test]
    fn test_progress_percent() {
        let mut state = ScanState::default();
        state.begin_job(ScanRange::new(0, 100));
        assert_eq!(state.progress_percent(), Some(0.0));

        state.record_prime(53);
        assert_eq!(state.progress_percent(), Some(53.0));

        state.job_state = JobState::Completed;
        assert_eq!(state.progress_percent(), Some(100.0));
    }
}
