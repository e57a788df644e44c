// Scan metrics
//
// Lock-free counters describing what the scanner has done since startup

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters for scan activity and notification delivery
///
/// Uses atomic operations so the scan loop, its supervisor and the
/// collaborator can all record without locking.
#[derive(Debug)]
pub struct ScanMetrics {
    pub jobs_started: AtomicU64,
    pub segments_run: AtomicU64,
    pub pauses: AtomicU64,
    pub resumes: AtomicU64,
    pub cancellations: AtomicU64,
    pub completions: AtomicU64,
    pub primes_found: AtomicU64,

    /// Events accepted by the sink
    pub events_delivered: AtomicU64,

    /// Events the sink could not deliver (receiver gone)
    pub delivery_failures: AtomicU64,

    /// Wall time spent inside scan loop segments, in milliseconds
    pub total_scan_time_ms: AtomicU64,

    start_time: Instant,
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self {
            jobs_started: AtomicU64::new(0),
            segments_run: AtomicU64::new(0),
            pauses: AtomicU64::new(0),
            resumes: AtomicU64::new(0),
            cancellations: AtomicU64::new(0),
            completions: AtomicU64::new(0),
            primes_found: AtomicU64::new(0),
            events_delivered: AtomicU64::new(0),
            delivery_failures: AtomicU64::new(0),
            total_scan_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_job_started(&self) {
        self.jobs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_segment(&self, duration: Duration) {
        self.segments_run.fetch_add(1, Ordering::Relaxed);
        self.total_scan_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_pause(&self) {
        self.pauses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resume(&self) {
        self.resumes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancellation(&self) {
        self.cancellations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completion(&self) {
        self.completions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_prime(&self) {
        self.primes_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_delivered(&self) {
        self.events_delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed delivery and return how many failures preceded it
    pub fn record_delivery_failure(&self) -> u64 {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed)
    }

    pub fn delivery_failures(&self) -> u64 {
        self.delivery_failures.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average primes discovered per second of scan time
    pub fn primes_per_second(&self) -> f64 {
        let millis = self.total_scan_time_ms.load(Ordering::Relaxed);
        if millis == 0 {
            return 0.0;
        }
        self.primes_found.load(Ordering::Relaxed) as f64 * 1000.0 / millis as f64
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Scan Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Jobs: {} started, {} completed, {} cancelled ({} segments, {} pauses, {} resumes)",
            self.jobs_started.load(Ordering::Relaxed),
            self.completions.load(Ordering::Relaxed),
            self.cancellations.load(Ordering::Relaxed),
            self.segments_run.load(Ordering::Relaxed),
            self.pauses.load(Ordering::Relaxed),
            self.resumes.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Primes: {} found in {:.2}s of scanning ({:.1}/s)",
            self.primes_found.load(Ordering::Relaxed),
            self.total_scan_time_ms.load(Ordering::Relaxed) as f64 / 1000.0,
            self.primes_per_second()
        );
        tracing::info!(
            "Events: {} delivered, {} delivery failures",
            self.events_delivered.load(Ordering::Relaxed),
            self.delivery_failures.load(Ordering::Relaxed)
        );
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}
