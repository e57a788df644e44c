// PrimeScan - pausable, cancellable prime number range scanner
//
// This is the library crate containing the scan job, its state and the console
// front-end. The binary crate (main.rs) provides the command line entry point.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;
pub mod ui;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use metrics::ScanMetrics;
pub use models::{JobState, ScanError, ScanEvent, ScanRange, ScanState, UserConfig};
pub use services::{ChannelSink, EventSink, JobHandle, ScanService};
pub use state::{StateChange, StateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
