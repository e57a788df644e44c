//! Data models for PrimeScan.
//!
//! - [`ScanRange`], [`JobState`], [`ScanEvent`]: the vocabulary of a scan job
//! - [`ScanState`]: the central state container wrapped by
//!   [`StateManager`](crate::state::StateManager)
//! - [`UserConfig`]: settings loaded from `PrimeScan Config.yaml`
//! - [`InvalidRangeError`], [`ScanError`]: errors returned by scan commands

pub mod config;
pub mod scan;
pub mod scan_state;

pub use config::{ScanSettings, UserConfig};
pub use scan::{InvalidRangeError, JobState, ScanError, ScanEvent, ScanRange};
pub use scan_state::ScanState;
