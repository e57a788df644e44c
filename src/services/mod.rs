//! Services module - the scan job and everything it needs to run.
//!
//! The services are **UI-agnostic**: nothing here knows about terminals or
//! windows. A collaborator drives them through [`ScanService`] and listens on
//! an [`EventSink`].
//!
//! # Components
//!
//! - [`is_prime`]: naive trial-division predicate (divisors up to `n / 2`)
//! - [`scan_segment`]: the synchronous scan loop with pause/cancel checkpoints
//! - [`ScanControl`] / [`Checkpoint`]: explicit control token between the
//!   collaborator and the loop (a `tokio::sync::watch` channel)
//! - [`EventSink`], [`ChannelSink`], [`Notifier`]: the notification channel
//! - [`ScanService`], [`JobHandle`]: start/pause/resume/cancel and the job
//!   state machine
//!
//! # Threading
//!
//! Scan segments run on tokio's blocking pool (`spawn_blocking`) because a
//! single primality test can take a long time and never yields. A supervising
//! async task awaits each segment and applies its outcome.
//!
//! # Usage Example
//!
//! ```ignore
//! use primescan::services::{ChannelSink, ScanService};
//!
//! let (sink, mut events) = ChannelSink::channel();
//! let service = ScanService::new(Arc::new(sink), handle);
//!
//! let job = service.start_scan("1", "20")?;
//! service.pause_or_resume()?; // pause
//! service.pause_or_resume()?; // resume
//! let terminal = job.wait().await; // JobState::Completed
//! ```

pub mod job;
pub mod notify;
pub mod primality;
pub mod scanner;

pub use job::{JobHandle, ScanService};
pub use notify::{ChannelSink, DeliveryError, EventSink, Notifier};
pub use primality::is_prime;
pub use scanner::{scan_segment, Checkpoint, ControlSignal, ScanControl, SegmentOutcome};
