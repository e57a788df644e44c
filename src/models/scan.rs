use std::fmt;
use std::num::{IntErrorKind, ParseIntError};
use thiserror::Error;

/// Inclusive interval of integers to scan for primes.
///
/// A range whose `start` is greater than its `end` is empty: scanning it
/// completes immediately without testing anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScanRange {
    pub start: i64,
    pub end: i64,
}

impl ScanRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Parse a range from the two text fields a collaborator supplies.
    ///
    /// Surrounding whitespace and a leading sign are accepted. Negative values
    /// parse fine; the primality predicate rejects them later.
    ///
    /// # Errors
    /// Returns [`InvalidRangeError`] naming the first field that is not a
    /// well-formed integer. The start field is checked first.
    pub fn parse(start_text: &str, end_text: &str) -> Result<Self, InvalidRangeError> {
        let start = parse_bound(start_text).map_err(|reason| InvalidRangeError::Start {
            input: start_text.to_string(),
            reason,
        })?;
        let end = parse_bound(end_text).map_err(|reason| InvalidRangeError::End {
            input: end_text.to_string(),
            reason,
        })?;

        Ok(Self { start, end })
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    /// Position of `value` within the range as a percentage in `0.0..=100.0`.
    ///
    /// Values outside the range are clamped.
    pub fn percent_of(&self, value: i64) -> f64 {
        if self.is_empty() || value >= self.end {
            return 100.0;
        }
        if value <= self.start {
            return 0.0;
        }

        let span = self.end.abs_diff(self.start) as f64;
        value.abs_diff(self.start) as f64 / span * 100.0
    }
}

impl fmt::Display for ScanRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

fn parse_bound(text: &str) -> Result<i64, String> {
    text.trim().parse::<i64>().map_err(|e| describe_parse_error(&e))
}

fn describe_parse_error(error: &ParseIntError) -> String {
    match error.kind() {
        IntErrorKind::Empty => "no number was entered".to_string(),
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
            "value is outside the supported 64-bit range".to_string()
        }
        _ => "input string was not in a correct format".to_string(),
    }
}

/// Lifecycle of a scan job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JobState {
    #[default]
    Idle,
    Running,
    Paused,
    Cancelled,
    Completed,
}

impl JobState {
    /// A job that still accepts pause/resume/cancel commands.
    pub fn is_active(&self) -> bool {
        matches!(self, JobState::Running | JobState::Paused)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Idle => "idle",
            JobState::Running => "running",
            JobState::Paused => "paused",
            JobState::Cancelled => "cancelled",
            JobState::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Events delivered to the collaborator over the notification channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A prime was discovered. Delivered in ascending order, never repeated.
    PrimeFound(i64),

    /// The scan reached the end of its range.
    ScanCompleted,

    /// The job finished (completed or cancelled); controls return to idle.
    ScanReset,

    /// The range text could not be parsed; no job was started.
    InvalidInput(String),
}

/// Start or end text is not a well-formed integer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidRangeError {
    #[error("Invalid start number {input:?}: {reason}")]
    Start { input: String, reason: String },

    #[error("Invalid end number {input:?}: {reason}")]
    End { input: String, reason: String },
}

/// Errors returned by scan commands.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error(transparent)]
    InvalidRange(#[from] InvalidRangeError),

    #[error("A scan is already in progress ({state}); cancel it before starting another")]
    AlreadyActive { state: JobState },

    #[error("Cannot {command} while the scan is {state}")]
    InvalidTransition {
        command: &'static str,
        state: JobState,
    },

    #[error("Scan job {job_id} has already finished")]
    JobFinished { job_id: u64 },
}
